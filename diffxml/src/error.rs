//! Error types for diffxml.

use thiserror::Error;

/// Result type alias for diffxml operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing, diffing or printing.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input.
    #[error("XML parse error: {0}")]
    Parse(String),

    /// The input holds no element at all.
    #[error("document has no root element")]
    NoRootElement,

    /// The edit script could not be generated.
    #[error("diff failed: {0}")]
    Diff(#[from] fmes::DiffError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML error from quick-xml.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Printed output was not valid UTF-8.
    #[error("output is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
