//! Error types for folio operations.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while converting a package.
///
/// Package and structure errors abort a conversion. Entry, unit and render
/// errors are scoped to a single content unit and the pipeline skips that
/// unit; see [`Error::is_recoverable`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid package: {0}")]
    InvalidPackage(String),

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("Unreadable content unit '{id}': {reason}")]
    UnreadableUnit { id: String, reason: String },

    #[error("Render did not finish within {0:?}")]
    RenderTimeout(Duration),

    #[error("Render engine failed: {0}")]
    RenderCrash(String),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot finalize output: {0}")]
    Output(String),

    #[error("Conversion cancelled")]
    Cancelled,
}

impl Error {
    /// Whether the pipeline may skip the affected content unit and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::EntryNotFound(_)
                | Error::UnreadableUnit { .. }
                | Error::RenderTimeout(_)
                | Error::RenderCrash(_)
                | Error::Pdf(_)
        )
    }

    /// Whether the render session must be relaunched before it is used again.
    pub fn poisons_session(&self) -> bool {
        matches!(self, Error::RenderCrash(_) | Error::RenderTimeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        assert!(Error::EntryNotFound("a.png".into()).is_recoverable());
        assert!(Error::RenderTimeout(Duration::from_secs(1)).is_recoverable());
        assert!(Error::RenderCrash("gone".into()).is_recoverable());
        assert!(!Error::InvalidPackage("bad zip".into()).is_recoverable());
        assert!(!Error::InvalidStructure("no opf".into()).is_recoverable());
        assert!(!Error::Output("disk full".into()).is_recoverable());
        assert!(!Error::Cancelled.is_recoverable());
    }

    #[test]
    fn test_session_poisoning() {
        assert!(Error::RenderCrash("gone".into()).poisons_session());
        assert!(!Error::EntryNotFound("x".into()).poisons_session());
    }
}
