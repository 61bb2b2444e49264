//! Call-site metadata attached to every hand-off.
//!
//! A [`CallSite`] names the place where a callback was handed to another routine.
//! The inspector stores it verbatim; only `file` and `line` are required, and both
//! are checked when the callback is wrapped.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{InspectorError, Result};

/// Where a wrap request originated.
///
/// Usually built with the [`call_site!`](crate::call_site) macro, which fills in
/// `file!()`, `line!()`, `column!()` and the enclosing module path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    /// Informational name of the routine the callback was handed to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Source file of the hand-off (required, non-empty)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// 1-based source line of the hand-off (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Source column of the hand-off
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl CallSite {
    /// Create call-site metadata with the two required fields.
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            name: None,
            file: Some(file.into()),
            line: Some(line),
            column: None,
        }
    }

    /// Set the name of the receiving routine.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the source column.
    pub fn with_column(mut self, column: u32) -> Self {
        self.column = Some(column);
        self
    }

    /// Check that the site can be attributed.
    ///
    /// `file` must be present and non-empty, `line` must be present and non-zero.
    pub fn validate(&self) -> Result<()> {
        match self.file.as_deref() {
            Some(file) if !file.is_empty() => {}
            _ => return Err(InspectorError::MissingFile),
        }
        match self.line {
            Some(line) if line > 0 => Ok(()),
            _ => Err(InspectorError::MissingLine),
        }
    }

    /// Name of the receiving routine, or `<unknown>`.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unknown>")
    }

    /// `file:line`, as printed in reports.
    pub fn location(&self) -> String {
        format!(
            "{}:{}",
            self.file.as_deref().unwrap_or("<unknown>"),
            self.line.unwrap_or(0)
        )
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.location())?;
        if let Some(column) = self.column {
            write!(f, ":{}", column)?;
        }
        Ok(())
    }
}
