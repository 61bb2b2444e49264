//! Environment configuration.
//!
//! | Variable | Effect |
//! |---|---|
//! | `CB_INSPECTOR_HOST` | Interface the query listener binds (default `127.0.0.1`) |
//! | `CB_INSPECTOR_PORT` | Start the query listener on this port |
//! | `CB_INSPECTOR_REPORT` | `pending` or `all` arms the exit report, `off` disables it; anything else is an error |

use serde::Deserialize;

use crate::report::ReportMode;
use crate::{InspectorError, Result};

pub const HOST_VAR: &str = "CB_INSPECTOR_HOST";
pub const PORT_VAR: &str = "CB_INSPECTOR_PORT";
pub const REPORT_VAR: &str = "CB_INSPECTOR_REPORT";

const DEFAULT_HOST: &str = "127.0.0.1";

/// What an inspector should start on its own.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    pub host: String,
    pub serve_port: Option<u16>,
    pub report_on_exit: bool,
    pub show_all: bool,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            serve_port: None,
            report_on_exit: false,
            show_all: false,
        }
    }
}

impl InspectorConfig {
    /// Read the configuration from the process environment.
    ///
    /// Unset variables keep their defaults. An unparsable port or report mode is an
    /// error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(host) = lookup(HOST_VAR).filter(|h| !h.trim().is_empty()) {
            config.host = host.trim().to_string();
        }

        if let Some(port) = lookup(PORT_VAR).filter(|p| !p.trim().is_empty()) {
            let port = port.trim().parse::<u16>().map_err(|_| {
                InspectorError::InvalidConfig(format!("{} is not a port: {}", PORT_VAR, port))
            })?;
            config.serve_port = Some(port);
        }

        if let Some(report) = lookup(REPORT_VAR).filter(|r| !r.trim().is_empty()) {
            if report.trim().eq_ignore_ascii_case("off") {
                config.report_on_exit = false;
            } else {
                config.show_all = match report.parse::<ReportMode>()? {
                    ReportMode::Pending => false,
                    ReportMode::All => true,
                    ReportMode::Complete => {
                        return Err(InspectorError::InvalidConfig(format!(
                            "{} must be pending, all or off, not complete",
                            REPORT_VAR
                        )))
                    }
                };
                config.report_on_exit = true;
            }
        }

        Ok(config)
    }
}
