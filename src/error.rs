//! Error types for JSON flattening and workbook emission

use thiserror::Error;

/// Result type for sheetloom operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while flattening JSON or writing a workbook
#[derive(Debug, Error)]
pub enum Error {
    /// Input text is not well-formed JSON
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Top-level input is not an object or a sequence of objects
    #[error("expected an object or a sequence of objects, found {found}")]
    Shape { found: &'static str },

    /// Two sheets resolved to the same name
    #[error("duplicate sheet name: {name}")]
    NameCollision { name: String },

    /// A sheet is wider than the workbook format allows
    #[error("sheet {name} has {count} columns, the workbook format allows at most 16384")]
    TooManyColumns { name: String, count: usize },

    /// Workbook construction or serialization failed
    #[error("workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    /// IO error while persisting the output file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport failure while talking to the extraction endpoint
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Extraction endpoint answered with a non-success status
    #[error("extraction API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Extraction endpoint returned no usable message
    #[error("empty reply from extraction endpoint")]
    EmptyReply,
}
