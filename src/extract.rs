//! LLM-backed receipt extraction
//!
//! The OCR stage hands over recognized text lines with pixel-space
//! bounding boxes; an OpenAI-compatible chat endpoint turns them into the
//! structured receipt JSON that the flattener consumes. The endpoint is
//! explicit configuration - no process-global client, no retries.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::error::{Error, Result};

/// Instruction block sent as the user prompt, ahead of the OCR lines
const INSTRUCTION: &str = "You are a POS receipt data expert. Parse, detect and recognize the \
following receipt OCR result and convert it into a structured receipt data \
object. Do not make up values that are not in the input. The output must be \
a single well-formed JSON object that follows the structure of the input. \
Do not lose any information.";

const SYSTEM_PROMPT: &str = "You are a helpful assistant designed to output JSON.";

/// One recognized text line from the OCR stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrLine {
    /// Pixel-space left, top, right, bottom
    pub bbox: [f64; 4],
    pub text: String,
}

/// An OpenAI-compatible chat endpoint
#[derive(Debug, Clone)]
pub struct LlmEndpoint {
    /// Base URL up to and including the API version, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    pub model: String,
    pub api_key: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Render OCR lines the way the extractor expects them: a JSON sequence of
/// `[[left, top, right, bottom], text]` pairs
pub fn render_lines(lines: &[OcrLine]) -> String {
    let rendered: Vec<Value> = lines
        .iter()
        .map(|line| json!([line.bbox, line.text]))
        .collect();
    Value::Array(rendered).to_string()
}

/// Build the full user prompt for a page of OCR lines
pub fn build_prompt(lines: &[OcrLine]) -> String {
    format!(
        "### Instruction:\n{}\n\n### Input:\n{}\n\n### Output:\n",
        INSTRUCTION,
        render_lines(lines)
    )
}

/// Send OCR lines to the endpoint and return the raw receipt JSON string.
///
/// The reply is fence-stripped but not parsed; malformed JSON surfaces
/// from the flattener, where the parse actually happens.
pub async fn extract_receipt_json(
    client: &Client,
    endpoint: &LlmEndpoint,
    lines: &[OcrLine],
) -> Result<String> {
    let request = ChatRequest {
        model: endpoint.model.clone(),
        messages: vec![
            ChatMessage {
                role: "system".to_string(),
                content: SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: build_prompt(lines),
            },
        ],
        temperature: 0.0,
        response_format: ResponseFormat {
            kind: "json_object".to_string(),
        },
    };

    let url = format!(
        "{}/chat/completions",
        endpoint.base_url.trim_end_matches('/')
    );
    info!(model = %endpoint.model, lines = lines.len(), "requesting receipt extraction");

    let response = client
        .post(&url)
        .header("Authorization", format!("Bearer {}", endpoint.api_key))
        .json(&request)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Api { status, body });
    }

    let chat: ChatResponse = response.json().await?;
    let content = chat
        .choices
        .first()
        .map(|c| c.message.content.as_str())
        .ok_or(Error::EmptyReply)?;

    Ok(strip_fences(content).to_string())
}

/// Strip markdown fences if the model added them despite instructions
fn strip_fences(content: &str) -> &str {
    content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}
