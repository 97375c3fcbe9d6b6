//! JSON flattening - lift nested JSON into linked tabular sheets
//!
//! An object becomes one row. A value that is itself an object (or a
//! sequence of objects) is moved into its own named sheet and replaced in
//! the row by a structural reference, recursively, so nesting of any depth
//! ends up as a set of flat tables that point at each other.

pub mod flattener;
pub mod naming;
pub mod types;

pub use flattener::JsonFlattener;
pub use naming::{SheetNamer, MAIN_SHEET};
pub use types::{CellValue, Flattened, FlattenConfig, NamingStrategy, Row, Sheet};
