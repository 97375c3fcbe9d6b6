use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use rust_xlsxwriter::{Format, Url, Workbook, Worksheet};
use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};
use crate::flatten::naming::MAIN_SHEET;
use crate::flatten::types::{CellValue, Flattened, Row};

/// Widest sheet the xlsx format allows
const MAX_COLUMNS: usize = 16_384;

/// A reference cell recorded during the sheet pass, resolved into a
/// hyperlink only after every sheet exists
struct PendingLink {
    sheet_index: usize,
    row: u32,
    col: u16,
    target: String,
}

/// Renders a [`Flattened`] document as a single xlsx workbook.
///
/// Main is written first, then the auxiliary sheets in discovery order.
/// Each sheet gets a bold header row whose columns are the union of keys
/// across its rows in first-seen order; missing keys render blank. Cells
/// holding a sheet reference become intra-document hyperlinks to cell A1
/// of their target sheet. The file appears at the destination path only
/// on success: the workbook is written to a temporary file in the same
/// directory and renamed over the target.
pub struct WorkbookEmitter {
    header_format: Format,
}

impl WorkbookEmitter {
    pub fn new() -> Self {
        WorkbookEmitter {
            header_format: Format::new().set_bold(),
        }
    }

    /// Write the workbook to `path`, overwriting any existing file
    pub fn write(&self, flattened: &Flattened, path: impl AsRef<Path>) -> Result<()> {
        let mut workbook = Workbook::new();
        let mut names: HashSet<String> = HashSet::new();
        let mut lower: HashSet<String> = HashSet::new();
        let mut pending: Vec<PendingLink> = Vec::new();

        self.write_sheet(
            &mut workbook,
            0,
            MAIN_SHEET,
            &flattened.main,
            &mut names,
            &mut lower,
            &mut pending,
        )?;
        for (i, sheet) in flattened.sheets.iter().enumerate() {
            self.write_sheet(
                &mut workbook,
                i + 1,
                &sheet.name,
                &sheet.rows,
                &mut names,
                &mut lower,
                &mut pending,
            )?;
        }

        resolve_links(&mut workbook, &names, &pending)?;
        save_atomic(&mut workbook, path.as_ref())
    }

    #[allow(clippy::too_many_arguments)]
    fn write_sheet(
        &self,
        workbook: &mut Workbook,
        sheet_index: usize,
        name: &str,
        rows: &[Row],
        names: &mut HashSet<String>,
        lower: &mut HashSet<String>,
        pending: &mut Vec<PendingLink>,
    ) -> Result<()> {
        // Sheet names are case-insensitively unique in the format. The
        // flattener's registry guarantees this; hand-built input may not.
        if !lower.insert(name.to_lowercase()) {
            return Err(Error::NameCollision {
                name: name.to_string(),
            });
        }

        let worksheet = workbook.add_worksheet();
        worksheet.set_name(name)?;

        let columns = column_order(rows);
        if columns.len() > MAX_COLUMNS {
            return Err(Error::TooManyColumns {
                name: name.to_string(),
                count: columns.len(),
            });
        }

        for (ci, key) in columns.iter().enumerate() {
            worksheet.write_string_with_format(0, ci as u16, key, &self.header_format)?;
        }

        for (ri, row) in rows.iter().enumerate() {
            let r = ri as u32 + 1;
            for (ci, key) in columns.iter().enumerate() {
                match row.get(key) {
                    // Missing key: leave the cell blank
                    None => {}
                    Some(CellValue::SheetRef(target)) => pending.push(PendingLink {
                        sheet_index,
                        row: r,
                        col: ci as u16,
                        target: target.clone(),
                    }),
                    Some(CellValue::Scalar(value)) => {
                        write_scalar(worksheet, r, ci as u16, value)?;
                    }
                }
            }
        }

        names.insert(name.to_string());
        Ok(())
    }
}

impl Default for WorkbookEmitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Union of row keys in first-seen order - the sheet's column order
fn column_order(rows: &[Row]) -> Vec<String> {
    let mut columns = Vec::new();
    let mut seen = HashSet::new();
    for row in rows {
        for key in row.keys() {
            if seen.insert(key.clone()) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

fn write_scalar(worksheet: &mut Worksheet, row: u32, col: u16, value: &Value) -> Result<()> {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        Value::Number(n) => match n.as_f64() {
            Some(f) => {
                worksheet.write_number(row, col, f)?;
            }
            None => {
                worksheet.write_string(row, col, &n.to_string())?;
            }
        },
        Value::String(s) => {
            worksheet.write_string(row, col, s)?;
        }
        // Arrays and objects that stayed inline render as compact JSON text
        other => {
            worksheet.write_string(row, col, &other.to_string())?;
        }
    }
    Ok(())
}

/// Rewrite every recorded reference cell into a hyperlink to cell A1 of
/// its target sheet. Runs after all sheets exist, because a reference may
/// point at a sheet created later than the referencing cell. A target
/// with no matching sheet degrades to plain text instead of failing.
fn resolve_links(
    workbook: &mut Workbook,
    names: &HashSet<String>,
    pending: &[PendingLink],
) -> Result<()> {
    for link in pending {
        let worksheet = workbook.worksheet_from_index(link.sheet_index)?;
        if names.contains(&link.target) {
            let location = format!("internal:'{}'!A1", link.target.replace('\'', "''"));
            let url = Url::new(location).set_text(&link.target);
            worksheet.write_url(link.row, link.col, url)?;
        } else {
            warn!(target = %link.target, "reference to unknown sheet left as text");
            worksheet.write_string(link.row, link.col, &link.target)?;
        }
    }
    Ok(())
}

/// Serialize the workbook and move it into place in one rename, so a
/// failure part-way never leaves a truncated file at the destination
fn save_atomic(workbook: &mut Workbook, path: &Path) -> Result<()> {
    let buffer = workbook.save_to_buffer()?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&buffer)?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::types::Sheet;
    use crate::flatten::{FlattenConfig, JsonFlattener};
    use indexmap::IndexMap;
    use serde_json::json;

    fn row(pairs: Vec<(&str, CellValue)>) -> Row {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<IndexMap<_, _>>()
    }

    #[test]
    fn test_column_order_unions_in_first_seen_order() {
        let rows = vec![
            row(vec![("a", CellValue::Scalar(json!(1)))]),
            row(vec![
                ("a", CellValue::Scalar(json!(2))),
                ("b", CellValue::Scalar(json!(3))),
            ]),
        ];
        assert_eq!(column_order(&rows), vec!["a", "b"]);
    }

    #[test]
    fn test_writes_linked_workbook() {
        let flattened = JsonFlattener::new(FlattenConfig::default())
            .flatten_value(json!({
                "請求書": "御請求書",
                "合計金額": "¥550,000",
                "振込先": {"銀行名": "○○銀行", "口座番号": "1234567"},
                "明細": [
                    {"商品名": "システム開発支援", "金額": 500000},
                    {"商品名": "保守", "金額": 50000}
                ]
            }))
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.xlsx");
        WorkbookEmitter::new().write(&flattened, &path).unwrap();

        let metadata = std::fs::metadata(&path).unwrap();
        assert!(metadata.len() > 0);
    }

    #[test]
    fn test_overwrites_existing_file() {
        let flattened = JsonFlattener::new(FlattenConfig::default())
            .flatten_value(json!({"a": 1}))
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        std::fs::write(&path, b"stale").unwrap();

        WorkbookEmitter::new().write(&flattened, &path).unwrap();
        assert_ne!(std::fs::read(&path).unwrap(), b"stale");
    }

    #[test]
    fn test_unknown_reference_degrades_to_text() {
        let flattened = Flattened {
            main: vec![row(vec![(
                "orphan",
                CellValue::SheetRef("ghost".to_string()),
            )])],
            sheets: vec![],
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        WorkbookEmitter::new().write(&flattened, &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_duplicate_sheet_names_rejected() {
        let flattened = Flattened {
            main: vec![],
            sheets: vec![
                Sheet::new("dup".to_string()),
                Sheet::new("dup".to_string()),
            ],
        };

        let dir = tempfile::tempdir().unwrap();
        let err = WorkbookEmitter::new()
            .write(&flattened, dir.path().join("out.xlsx"))
            .unwrap_err();
        assert!(matches!(err, Error::NameCollision { name } if name == "dup"));
    }

    #[test]
    fn test_aux_sheet_shadowing_main_rejected() {
        let flattened = Flattened {
            main: vec![],
            sheets: vec![Sheet::new("main".to_string())],
        };

        let dir = tempfile::tempdir().unwrap();
        let err = WorkbookEmitter::new()
            .write(&flattened, dir.path().join("out.xlsx"))
            .unwrap_err();
        assert!(matches!(err, Error::NameCollision { .. }));
    }

    #[test]
    fn test_empty_sheets_are_written() {
        let flattened = Flattened {
            main: vec![row(vec![(
                "items",
                CellValue::SheetRef("items".to_string()),
            )])],
            sheets: vec![Sheet::new("items".to_string())],
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        WorkbookEmitter::new().write(&flattened, &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_failure_leaves_no_file_behind() {
        let flattened = Flattened {
            main: vec![],
            sheets: vec![
                Sheet::new("dup".to_string()),
                Sheet::new("dup".to_string()),
            ],
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        assert!(WorkbookEmitter::new().write(&flattened, &path).is_err());
        assert!(!path.exists());
    }
}
