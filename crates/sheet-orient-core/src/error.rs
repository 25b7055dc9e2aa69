//! Error types for sheet-orient-core

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using [`OrientError`]
pub type Result<T> = std::result::Result<T, OrientError>;

/// Errors that end (or prevent) a run
#[derive(Debug, Error)]
pub enum OrientError {
    /// The target directory does not exist
    #[error("target directory not found [{0}]")]
    DirectoryNotFound(PathBuf),

    /// The target path exists but is not a directory
    #[error("target is not a directory [{0}]")]
    NotADirectory(PathBuf),

    /// The orientation token is not `portrait` or `landscape`
    #[error("orientation is invalid [{0}]")]
    InvalidOrientation(String),

    /// The spreadsheet application could not be started
    #[error("failed to launch spreadsheet application: {0}")]
    Launch(#[source] HostError),

    /// Processing a workbook failed after it was opened
    #[error("failed to process workbook '{}': {source}", path.display())]
    Workbook {
        path: PathBuf,
        #[source]
        source: HostError,
    },

    /// The application itself failed while a workbook was being opened
    #[error("spreadsheet application failed while opening '{}': {source}", path.display())]
    HostLost {
        path: PathBuf,
        #[source]
        source: HostError,
    },

    /// Quitting the spreadsheet application failed at the end of a run
    #[error("failed to quit spreadsheet application: {0}")]
    Quit(#[source] HostError),
}

/// Failures reported by a [`SpreadsheetHost`](crate::SpreadsheetHost)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The application could not be started or reached
    #[error("spreadsheet application unavailable: {0}")]
    Unavailable(String),

    /// The workbook file does not exist
    #[error("file not found: {0}")]
    NotFound(String),

    /// The workbook file cannot be opened for writing
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The workbook file is held open by another process
    #[error("file is locked by another process: {0}")]
    Locked(String),

    /// The application process went away mid-run
    #[error("spreadsheet application disconnected: {0}")]
    Disconnected(String),

    /// The application did not answer in time
    #[error("spreadsheet application did not respond within {0:?}")]
    Timeout(Duration),

    /// The application rejected the call
    #[error("automation call failed: {0}")]
    Automation(String),

    /// Malformed exchange with the application
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl HostError {
    /// Whether the failure is about the application rather than one file.
    ///
    /// After such a failure no further workbook can be processed.
    pub fn is_host_failure(&self) -> bool {
        matches!(
            self,
            HostError::Unavailable(_)
                | HostError::Disconnected(_)
                | HostError::Timeout(_)
                | HostError::Protocol(_)
        )
    }
}
