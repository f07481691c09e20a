use std::path::PathBuf;

use crate::integrity::IntegrityError;
use crate::range::RangeError;

/// Failure to open or parse an archive container.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Failed to read archive. Path: '{}'", .1.display())]
    Open(#[source] std::io::Error, PathBuf),

    #[error("Invalid archive header (is this an asar file?). Path: '{}'", .1.display())]
    Header(#[source] std::io::Error, PathBuf),

    #[error("Invalid JSON in archive header. Path: '{}'", .1.display())]
    Json(#[source] serde_json::Error, PathBuf),

    #[error("Malformed entry '{entry}' in archive header: {reason}")]
    MalformedEntry { entry: String, reason: &'static str },

    #[error("Archive build failed for a concurrent request: {reason}. Path: '{}'", .path.display())]
    Unavailable { path: PathBuf, reason: String },

    #[error("Entry '{entry}' lies outside the container ({end} > {container_len})")]
    OutOfBounds {
        entry: String,
        end: u64,
        container_len: u64,
    },
}

/// Terminal failure of a virtual file job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Not found. Path: '{}'", .0.display())]
    NotFound(PathBuf),

    #[error("Archive is unreadable")]
    ArchiveUnreadable(#[from] ArchiveError),

    #[error("Requested range not satisfiable")]
    RangeNotSatisfiable(#[from] RangeError),

    #[error("I/O failure")]
    IoFailure(#[from] std::io::Error),

    #[error("Internal invariant violated: {0}")]
    InternalInvariantViolation(String),

    #[error("Integrity check failed. Path: '{}'", .1.display())]
    IntegrityViolation(#[source] IntegrityError, PathBuf),
}

impl JobError {
    /// The HTTP-equivalent status a caller should report for this failure.
    pub fn status(&self) -> u16 {
        match self {
            JobError::NotFound(_) => 404,
            JobError::RangeNotSatisfiable(_) => 416,
            JobError::ArchiveUnreadable(_)
            | JobError::IoFailure(_)
            | JobError::InternalInvariantViolation(_)
            | JobError::IntegrityViolation(..) => 500,
        }
    }

    pub(crate) fn invariant(msg: impl Into<String>) -> JobError {
        JobError::InternalInvariantViolation(msg.into())
    }
}
