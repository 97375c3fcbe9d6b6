use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// A single cell in a flattened row.
///
/// A cell either holds a plain JSON value or stands in for a nested
/// structure that was lifted into its own sheet. References are resolved
/// structurally by the workbook emitter, so string data that happens to
/// look like a reference can never be mistaken for one.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// A scalar value kept inline (including arrays that were not lifted)
    Scalar(Value),

    /// Reference to the sheet holding the real value
    SheetRef(String),
}

impl CellValue {
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            CellValue::Scalar(v) => Some(v),
            CellValue::SheetRef(_) => None,
        }
    }

    pub fn as_sheet_ref(&self) -> Option<&str> {
        match self {
            CellValue::Scalar(_) => None,
            CellValue::SheetRef(name) => Some(name),
        }
    }

    pub fn is_sheet_ref(&self) -> bool {
        matches!(self, CellValue::SheetRef(_))
    }
}

impl From<Value> for CellValue {
    fn from(value: Value) -> Self {
        CellValue::Scalar(value)
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Scalar(v) => v.serialize(serializer),
            CellValue::SheetRef(name) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$sheet", name)?;
                map.end()
            }
        }
    }
}

/// One flattened record. Key order is insertion order and drives column order.
pub type Row = IndexMap<String, CellValue>;

/// A named table of flattened rows - one worksheet in the output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sheet {
    /// Unique sheet name, already valid for the workbook format
    pub name: String,

    /// Rows in input order. Rows may carry different key sets; the emitter
    /// unions them into one header.
    pub rows: Vec<Row>,
}

impl Sheet {
    pub fn new(name: String) -> Self {
        Sheet { name, rows: Vec::new() }
    }
}

/// The complete result of flattening one JSON document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Flattened {
    /// Top-level rows, rendered as the "Main" sheet
    pub main: Vec<Row>,

    /// Auxiliary sheets in discovery order (parents before their children)
    pub sheets: Vec<Sheet>,
}

impl Flattened {
    /// Look up an auxiliary sheet by name
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Names of all auxiliary sheets, in discovery order
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }
}

/// How auxiliary sheets are named
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingStrategy {
    /// Bare key name (terser, relies on the dedup registry for collisions)
    KeyOnly,

    /// Key prefixed by the parent sheet's name; top-level keys stay bare
    PathPrefixed,
}

/// Configuration for the flattening process
#[derive(Debug, Clone)]
pub struct FlattenConfig {
    /// Maximum nesting depth to lift into sheets (deeper structures are
    /// kept inline as serialized JSON)
    pub max_depth: usize,

    /// Separator between a parent sheet name and a nested key
    pub separator: String,

    /// Naming strategy for auxiliary sheets
    pub naming: NamingStrategy,

    /// Keys to always keep inline (never lift into a sheet)
    pub inline_fields: Vec<String>,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        FlattenConfig {
            max_depth: 10,
            separator: String::from("_"),
            naming: NamingStrategy::PathPrefixed,
            inline_fields: vec![],
        }
    }
}
