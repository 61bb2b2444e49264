use std::io;

/// Result type for inspector operations
pub type Result<T> = std::result::Result<T, InspectorError>;

/// Errors surfaced by the inspector.
///
/// The metadata variants are caller contract violations: they are returned from
/// `wrap` before any record is created and should be treated as programming errors
/// at the hand-off site.
#[derive(Debug, thiserror::Error)]
pub enum InspectorError {
    #[error("cannot wrap callback without tracking data: .file property is required")]
    MissingFile,

    #[error("cannot wrap callback without tracking data: .line property is required")]
    MissingLine,

    #[error("unknown report mode: {0} (expected pending, complete or all)")]
    UnknownReportMode(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to bind query listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl InspectorError {
    /// True for errors caused by missing call-site metadata.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, InspectorError::MissingFile | InspectorError::MissingLine)
    }
}
