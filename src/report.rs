//! Human-readable reports.
//!
//! [`render`] turns snapshots into the text diagnostic; [`ExitReport`] prints it once,
//! when the guard is dropped at the end of `main`, unless every tracked callback has
//! been called back.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::registry::CallbackRegistry;
use crate::shape::CallbackShape;
use crate::snapshot::CallbackSnapshot;
use crate::InspectorError;

/// Which records a report or query covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    /// Records never called back
    #[default]
    Pending,
    /// Records called back at least once
    Complete,
    /// Every record
    All,
}

impl ReportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportMode::Pending => "pending",
            ReportMode::Complete => "complete",
            ReportMode::All => "all",
        }
    }

    /// Mode for a query path. Unrecognised paths fall back to `Pending`.
    pub fn from_path(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        match path.trim_matches('/') {
            "all" => ReportMode::All,
            "complete" => ReportMode::Complete,
            _ => ReportMode::Pending,
        }
    }

    /// Take the snapshot this mode describes.
    pub fn select(&self, registry: &CallbackRegistry) -> Vec<CallbackSnapshot> {
        match self {
            ReportMode::Pending => registry.pending_callbacks(),
            ReportMode::Complete => registry.complete_callbacks(),
            ReportMode::All => registry.all_callbacks(),
        }
    }
}

impl FromStr for ReportMode {
    type Err = InspectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ReportMode::Pending),
            "complete" => Ok(ReportMode::Complete),
            "all" => Ok(ReportMode::All),
            other => Err(InspectorError::UnknownReportMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for ReportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render snapshots as the text report.
pub fn render(snapshots: &[CallbackSnapshot]) -> String {
    let mut out = String::new();
    for snap in snapshots {
        let shape = CallbackShape::new(snap.name.as_str(), snap.arity);
        if snap.is_pending() {
            let _ = writeln!(
                out,
                "cb never called -- {} -- was passed to {} handler(s) (none called back)",
                shape,
                snap.handlers.len()
            );
        } else {
            let _ = writeln!(
                out,
                "cb called {} time(s) -- {} -- was passed to {} handler(s)",
                snap.total_called,
                shape,
                snap.handlers.len()
            );
        }

        for handler in &snap.handlers {
            let _ = write!(
                out,
                "    Passed to function {} at {}",
                handler.meta.display_name(),
                handler.meta.location()
            );
            if snap.is_pending() {
                out.push('\n');
            } else if handler.called == 0 {
                out.push_str(" -- never called\n");
            } else {
                let _ = writeln!(out, " -- called {} time(s)", handler.called);
            }
            for entry in &handler.log {
                let _ = writeln!(out, "        log: {}", entry);
            }
        }
    }
    out
}

/// True unless every record has been called at least once.
pub fn needs_report(registry: &CallbackRegistry) -> bool {
    registry.records().iter().any(|r| r.total_called() == 0)
}

/// Prints the final report when dropped.
///
/// Returned by `Inspector::report_on_exit`. Keep it alive in `main`; only the first
/// guard per inspector is armed, later ones do nothing. Nothing is printed when every
/// tracked callback was called back. Write errors are ignored.
#[must_use = "the report prints when this guard is dropped"]
pub struct ExitReport {
    registry: Option<Arc<CallbackRegistry>>,
    show_all: bool,
    sink: Box<dyn Write + Send>,
}

impl ExitReport {
    pub(crate) fn armed(registry: Arc<CallbackRegistry>, show_all: bool) -> Self {
        Self {
            registry: Some(registry),
            show_all,
            sink: Box::new(io::stderr()),
        }
    }

    pub(crate) fn disarmed() -> Self {
        Self {
            registry: None,
            show_all: false,
            sink: Box::new(io::sink()),
        }
    }

    /// Write the report to `writer` instead of stderr.
    pub fn with_writer(mut self, writer: impl Write + Send + 'static) -> Self {
        self.sink = Box::new(writer);
        self
    }

    pub fn is_armed(&self) -> bool {
        self.registry.is_some()
    }

    pub fn show_all(&self) -> bool {
        self.show_all
    }

    /// Drop without printing.
    pub fn disarm(&mut self) {
        self.registry = None;
    }

    /// The report that would be printed right now, if any.
    pub fn preview(&self) -> Option<String> {
        let registry = self.registry.as_ref()?;
        if !needs_report(registry) {
            return None;
        }
        let mode = if self.show_all {
            ReportMode::All
        } else {
            ReportMode::Pending
        };
        Some(render(&mode.select(registry)))
    }
}

impl std::fmt::Debug for ExitReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExitReport")
            .field("armed", &self.is_armed())
            .field("show_all", &self.show_all)
            .finish()
    }
}

impl Drop for ExitReport {
    fn drop(&mut self) {
        if let Some(report) = self.preview() {
            let _ = self.sink.write_all(report.as_bytes());
            let _ = self.sink.flush();
        }
    }
}
