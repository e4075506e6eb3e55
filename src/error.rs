use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Negative `first`/`last`, or `orderBy`/`orderDirection` arity mismatch.
    InvalidArgument(String),
    /// The cursor could not be decoded. Cursors are never partially trusted.
    InvalidCursor(String),
    /// The accessor's cursor strategy cannot serve the request (offset cursors with `last`/`before`).
    NotSupported(String),
    Storage(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::InvalidCursor(msg) => write!(f, "Invalid cursor: {}", msg),
            Error::NotSupported(msg) => write!(f, "Not supported: {}", msg),
            Error::Storage(err) => write!(f, "Storage error: {}", err),
        }
    }
}

impl std::error::Error for Error {}
