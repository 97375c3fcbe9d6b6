//! # Sheetloom - nested JSON to linked-workbook converter
//!
//! A library for turning the arbitrarily nested JSON produced by a
//! receipt/invoice extractor into a single xlsx workbook of
//! cross-referenced sheets.
//!
//! ## Modules
//!
//! - **flatten**: lift nested JSON into flat, linked tabular sheets
//! - **workbook**: render the sheets as an xlsx file with working
//!   intra-document hyperlinks
//! - **extract**: the OCR-lines-to-JSON boundary (OpenAI-compatible chat)
//!
//! ## Quick Start
//!
//! ```no_run
//! use sheetloom::{json_to_workbook, FlattenConfig};
//!
//! # fn main() -> sheetloom::Result<()> {
//! let json = r#"{
//!     "title": "R1",
//!     "issuer": {"name": "X", "tel": "123"},
//!     "items": [
//!         {"sku": "A", "qty": 2},
//!         {"sku": "B", "qty": 1}
//!     ]
//! }"#;
//!
//! // Main gets one row; "issuer" and "items" become their own sheets,
//! // and the Main cells that held them now link there.
//! json_to_workbook(json, "receipt.xlsx", FlattenConfig::default())?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde_json::Value;

pub mod error;
pub mod extract;
pub mod flatten;
pub mod workbook;

// Re-export commonly used types for convenience
pub use error::{Error, Result};
pub use extract::{LlmEndpoint, OcrLine};
pub use flatten::{
    CellValue, Flattened, FlattenConfig, JsonFlattener, NamingStrategy, Row, Sheet,
};
pub use workbook::WorkbookEmitter;

/// Main entry point: parse JSON text, flatten it and persist the workbook.
///
/// Returns the flattened form so callers can inspect what was written.
pub fn json_to_workbook(
    text: &str,
    path: impl AsRef<Path>,
    config: FlattenConfig,
) -> Result<Flattened> {
    let flattened = JsonFlattener::new(config).flatten_str(text)?;
    WorkbookEmitter::new().write(&flattened, path)?;
    Ok(flattened)
}

/// Like [`json_to_workbook`] for an already-parsed JSON value
pub fn value_to_workbook(
    value: Value,
    path: impl AsRef<Path>,
    config: FlattenConfig,
) -> Result<Flattened> {
    let flattened = JsonFlattener::new(config).flatten_value(value)?;
    WorkbookEmitter::new().write(&flattened, path)?;
    Ok(flattened)
}
