//! Chat-completions wire types.

use serde::{Deserialize, Serialize};

use texcal_shared::{ExtractionPayload, GatewayError};

/// Request body for `POST /chat/completions`.
#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub response_format: ResponseFormat,
    pub messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
pub(crate) struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

impl<'a> ChatRequest<'a> {
    /// JSON-mode request with the instruction as system message.
    pub fn new(model: &'a str, instruction: &'a str, user_text: &'a str) -> Self {
        Self {
            model,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            messages: [
                ChatMessage {
                    role: "system",
                    content: instruction,
                },
                ChatMessage {
                    role: "user",
                    content: user_text,
                },
            ],
        }
    }
}

/// Response envelope. Only the fields we read are modelled.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Pull the extraction JSON out of a response body and decode it.
pub(crate) fn decode_envelope(body: &str) -> Result<ExtractionPayload, GatewayError> {
    let envelope: ChatResponse = serde_json::from_str(body)
        .map_err(|e| GatewayError::envelope(format!("response is not a chat completion: {e}")))?;

    let content = envelope
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::envelope("response has no choices"))?
        .message
        .content
        .ok_or_else(|| GatewayError::envelope("first choice has no message content"))?;

    ExtractionPayload::from_json(&content).map_err(|e| {
        GatewayError::envelope(format!(
            "message content is not a JSON object: {e} (got: {})",
            preview(&content)
        ))
    })
}

/// First 200 characters of a string, for error messages.
pub(crate) fn preview(s: &str) -> String {
    s.chars().take(200).collect()
}
