//! Error type shared by the file services.

use thiserror::Error;

/// Errors that can occur while resolving, listing, indexing or archiving.
///
/// The `Display` text of `InvalidPath` and `NotFound` is deliberately free of
/// paths so it can be shown to clients as-is.
#[derive(Debug, Error)]
pub enum FileError {
    /// Traversal attempt, disallowed root or malformed input.
    #[error("invalid path")]
    InvalidPath,

    /// The resolved path does not exist or is not the expected type.
    #[error("not found")]
    NotFound,

    /// Unexpected filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The ZIP encoder failed for a reason other than plain I/O.
    #[error("archive error: {0}")]
    Archive(String),

    /// The archive receiver went away after bytes were already sent.
    #[error("archive stream aborted")]
    StreamAborted,
}

impl FileError {
    /// Short message safe to return to clients.
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::InvalidPath => "Invalid path",
            Self::NotFound => "Not found",
            Self::Io(_) | Self::Archive(_) => "Server error",
            Self::StreamAborted => "Stream aborted",
        }
    }

    /// Whether the caller can fix the request and try again.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidPath | Self::NotFound)
    }
}

impl From<async_zip::error::ZipError> for FileError {
    fn from(err: async_zip::error::ZipError) -> Self {
        FileError::Archive(err.to_string())
    }
}

/// Maps an I/O error to `NotFound` when the entry is missing.
pub(crate) fn not_found_or_io(err: std::io::Error) -> FileError {
    if err.kind() == std::io::ErrorKind::NotFound {
        FileError::NotFound
    } else {
        FileError::Io(err)
    }
}
