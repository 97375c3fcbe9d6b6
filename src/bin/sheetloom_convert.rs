//! sheetloom-convert: turn nested JSON into a linked xlsx workbook
//!
//! Usage:
//!   # Read from file, write a workbook
//!   sheetloom-convert receipt.json -o receipt.xlsx
//!
//!   # Read from stdin
//!   cat receipt.json | sheetloom-convert -o receipt.xlsx
//!
//!   # No --output: dump the flattened sheets to stdout as NDJSON
//!   sheetloom-convert receipt.json

// Use MiMalloc allocator for better performance (recommended by simd-json)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use sheetloom::flatten::MAIN_SHEET;
use sheetloom::{Flattened, FlattenConfig, JsonFlattener, NamingStrategy, WorkbookEmitter};
use std::fs::File;
use std::io::{Read, Write};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sheetloom-convert")]
#[command(about = "Convert nested JSON into a linked xlsx workbook", long_about = None)]
struct Args {
    /// Input JSON file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Output workbook path
    /// If omitted, writes the flattened sheets to stdout as NDJSON with sheet metadata
    #[arg(long, short = 'o')]
    output: Option<String>,

    /// Maximum nesting depth to lift into sheets (default: 10)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Separator for nested sheet names (default: "_")
    #[arg(long)]
    separator: Option<String>,

    /// Name nested sheets by bare key instead of parent-prefixed path
    #[arg(long)]
    key_only_names: bool,

    /// Comma-separated keys to always keep inline, never lifted into sheets
    #[arg(long)]
    inline_fields: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let args = Args::parse();

    // Build config
    let mut config = FlattenConfig::default();
    if let Some(depth) = args.max_depth {
        config.max_depth = depth;
    }
    if let Some(sep) = args.separator {
        config.separator = sep;
    }
    if args.key_only_names {
        config.naming = NamingStrategy::KeyOnly;
    }
    if let Some(fields_str) = args.inline_fields {
        config.inline_fields = fields_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();
    }

    let value = read_value(args.input.as_deref())?;
    let flattened = JsonFlattener::new(config).flatten_value(value)?;

    match args.output {
        Some(path) => {
            WorkbookEmitter::new().write(&flattened, &path)?;
            info!(path = %path, sheets = flattened.sheets.len() + 1, "workbook written");
        }
        None => dump_to_stdout(&flattened)?,
    }

    Ok(())
}

/// Read the whole input and parse it, trying SIMD parsing first
fn read_value(input: Option<&str>) -> Result<Value> {
    let mut content = Vec::new();
    match input {
        Some(path) => {
            File::open(path)
                .with_context(|| format!("Failed to open file: {path}"))?
                .read_to_end(&mut content)
                .context("Failed to read input")?;
        }
        None => {
            std::io::stdin()
                .read_to_end(&mut content)
                .context("Failed to read stdin")?;
        }
    }

    // simd-json parses in place; keep the original bytes for the fallback
    let mut simd_buf = content.clone();
    match simd_json::serde::from_slice::<Value>(&mut simd_buf) {
        Ok(value) => Ok(value),
        Err(_) => serde_json::from_slice(&content).context("Failed to parse JSON"),
    }
}

/// Write every sheet's rows to stdout as newline-delimited JSON with a
/// `_sheet` field naming the sheet each row belongs to
fn dump_to_stdout(flattened: &Flattened) -> Result<()> {
    let mut stdout = std::io::stdout();

    let all_sheets = std::iter::once((MAIN_SHEET, &flattened.main))
        .chain(flattened.sheets.iter().map(|s| (s.name.as_str(), &s.rows)));

    for (sheet_name, rows) in all_sheets {
        for row in rows {
            let mut record = serde_json::Map::new();
            record.insert(
                "_sheet".to_string(),
                Value::String(sheet_name.to_string()),
            );
            if let Value::Object(fields) = serde_json::to_value(row)? {
                for (key, value) in fields {
                    record.insert(key, value);
                }
            }
            writeln!(stdout, "{}", Value::Object(record))?;
        }
    }

    Ok(())
}
