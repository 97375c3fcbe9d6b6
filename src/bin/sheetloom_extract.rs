//! sheetloom-extract: OCR lines in, linked workbook out
//!
//! Sends recognized receipt lines to an OpenAI-compatible endpoint, takes
//! the structured JSON reply and writes the cross-linked xlsx workbook.
//!
//! Usage:
//!   # lines.json holds [{"bbox": [l, t, r, b], "text": "..."}, ...]
//!   OPENAI_API_KEY=... sheetloom-extract lines.json -o receipt.xlsx
//!
//!   # Keep the raw extracted JSON next to the workbook
//!   OPENAI_API_KEY=... sheetloom-extract lines.json -o receipt.xlsx --json-out receipt.json

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Client;
use sheetloom::extract::{extract_receipt_json, LlmEndpoint, OcrLine};
use sheetloom::{json_to_workbook, FlattenConfig};
use std::fs::File;
use std::io::Read;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sheetloom-extract")]
#[command(about = "Extract receipt JSON from OCR lines and write a linked workbook", long_about = None)]
struct Args {
    /// OCR lines JSON file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Output workbook path
    #[arg(long, short = 'o', default_value = "receipt.xlsx")]
    output: String,

    /// Also write the raw extracted JSON to this path
    #[arg(long)]
    json_out: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long, default_value = "https://api.openai.com/v1")]
    base_url: String,

    /// Model to use for extraction
    #[arg(long, default_value = "gpt-4o")]
    model: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let args = Args::parse();

    let api_key =
        std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY env var required")?;

    let mut content = Vec::new();
    match &args.input {
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
    let lines: Vec<OcrLine> =
        serde_json::from_slice(&content).context("Failed to parse OCR lines")?;

    let endpoint = LlmEndpoint {
        base_url: args.base_url,
        model: args.model,
        api_key,
    };
    let client = Client::new();
    let json = extract_receipt_json(&client, &endpoint, &lines).await?;

    if let Some(path) = &args.json_out {
        std::fs::write(path, &json)
            .with_context(|| format!("Failed to write raw JSON: {path}"))?;
    }

    let flattened = json_to_workbook(&json, &args.output, FlattenConfig::default())?;
    info!(
        path = %args.output,
        sheets = flattened.sheets.len() + 1,
        "workbook written"
    );

    Ok(())
}
