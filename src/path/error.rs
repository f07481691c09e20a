use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntoEntryPathError {
    UnrepresentableStr,
    EscapesRoot,
    EmptyPath,
}

impl core::error::Error for IntoEntryPathError {}

impl fmt::Display for IntoEntryPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl IntoEntryPathError {
    pub fn as_str(&self) -> &str {
        match self {
            IntoEntryPathError::UnrepresentableStr => "unrepresentable string found in path",
            IntoEntryPathError::EscapesRoot => "path escapes the archive root",
            IntoEntryPathError::EmptyPath => "no path provided",
        }
    }

    pub fn as_io_error(&self) -> std::io::Error {
        use std::io::{Error, ErrorKind};
        Error::new(ErrorKind::InvalidInput, self.as_str())
    }
}

impl From<IntoEntryPathError> for std::io::Error {
    fn from(err: IntoEntryPathError) -> Self {
        err.as_io_error()
    }
}
