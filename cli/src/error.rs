use std::path::PathBuf;

use asar_vfs::{ArchiveError, JobError};

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum Error {
    #[error("Failed to open archive '{}'", path.display())]
    #[diagnostic(
        code(asar::open_archive),
        help("Check that the file exists and is an asar archive")
    )]
    OpenArchive {
        path: PathBuf,
        #[source]
        source: ArchiveError,
    },

    #[error("File not found in archive: {0}")]
    #[diagnostic(code(asar::file_not_found), help("Use `asar list` to see the archive's entries"))]
    FileNotFound(String),

    #[error("Invalid entry path: {0}")]
    #[diagnostic(code(asar::invalid_path))]
    InvalidPath(String),

    #[error("Failed to read '{}'", path.display())]
    #[diagnostic(code(asar::serve))]
    Serve {
        path: PathBuf,
        #[source]
        source: JobError,
    },

    #[error("Failed to create directory '{}'", path.display())]
    #[diagnostic(code(asar::create_directory))]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write '{}'", path.display())]
    #[diagnostic(code(asar::write_file))]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write output")]
    #[diagnostic(code(asar::io))]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize JSON")]
    #[diagnostic(code(asar::json))]
    Json(#[from] serde_json::Error),

    #[error("Background task failed")]
    #[diagnostic(code(asar::task))]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;
