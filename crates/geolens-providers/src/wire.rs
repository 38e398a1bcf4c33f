//! Request and response bodies for each provider's HTTP API.

use geolens_core::TokenUsage;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::types::{CallOptions, ProviderKind};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A fully built HTTP request, reusable across retry attempts.
#[derive(Debug, Clone)]
pub(crate) struct WireRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: serde_json::Value,
}

/// The provider-neutral part of a successful reply.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WireReply {
    pub text: String,
    pub model: String,
    pub usage: TokenUsage,
}

// --- OpenAI-compatible chat completions (OpenAI, Perplexity) ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

// --- Anthropic messages ---

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<MessagesUsage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

// --- Gemini generateContent ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(rename = "system_instruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent<'a>>,
    contents: Vec<GeminiContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

fn to_body<T: Serialize>(kind: ProviderKind, body: &T) -> Result<serde_json::Value, ProviderError> {
    serde_json::to_value(body).map_err(|e| ProviderError::Deserialize {
        context: format!("{kind} request body"),
        source: e,
    })
}

/// Builds the HTTP request for one prompt.
pub(crate) fn build_request(
    kind: ProviderKind,
    base_url: &str,
    api_key: &str,
    model: &str,
    prompt: &str,
    options: &CallOptions,
) -> Result<WireRequest, ProviderError> {
    let root = base_url.trim_end_matches('/');
    let json_mode = options.json_mode && kind.capabilities().structured_output;

    match kind {
        ProviderKind::OpenAi | ProviderKind::Perplexity => {
            let mut messages = Vec::with_capacity(2);
            if let Some(system) = options.system.as_deref() {
                messages.push(ChatMessage {
                    role: "system",
                    content: system,
                });
            }
            messages.push(ChatMessage {
                role: "user",
                content: prompt,
            });
            let body = ChatRequest {
                model,
                messages,
                temperature: options.temperature,
                max_tokens: options.max_output_tokens,
                response_format: json_mode.then_some(ResponseFormat {
                    kind: "json_object",
                }),
            };
            let path = if kind == ProviderKind::OpenAi {
                "/v1/chat/completions"
            } else {
                "/chat/completions"
            };
            Ok(WireRequest {
                url: format!("{root}{path}"),
                headers: vec![("authorization", format!("Bearer {api_key}"))],
                body: to_body(kind, &body)?,
            })
        }
        ProviderKind::Anthropic => {
            let body = MessagesRequest {
                model,
                max_tokens: options.max_output_tokens,
                temperature: options.temperature,
                system: options.system.as_deref(),
                messages: vec![ChatMessage {
                    role: "user",
                    content: prompt,
                }],
            };
            Ok(WireRequest {
                url: format!("{root}/v1/messages"),
                headers: vec![
                    ("x-api-key", api_key.to_owned()),
                    ("anthropic-version", ANTHROPIC_VERSION.to_owned()),
                ],
                body: to_body(kind, &body)?,
            })
        }
        ProviderKind::Gemini => {
            let body = GenerateRequest {
                system_instruction: options.system.as_deref().map(|text| GeminiContent {
                    role: None,
                    parts: vec![GeminiPart { text }],
                }),
                contents: vec![GeminiContent {
                    role: Some("user"),
                    parts: vec![GeminiPart { text: prompt }],
                }],
                generation_config: GenerationConfig {
                    temperature: options.temperature,
                    max_output_tokens: options.max_output_tokens,
                    response_mime_type: json_mode.then_some("application/json"),
                },
            };
            Ok(WireRequest {
                url: format!("{root}/v1beta/models/{model}:generateContent"),
                headers: vec![("x-goog-api-key", api_key.to_owned())],
                body: to_body(kind, &body)?,
            })
        }
    }
}

/// Decodes a 2xx response body into text, model version and token usage.
pub(crate) fn parse_reply(
    kind: ProviderKind,
    body: &str,
    requested_model: &str,
) -> Result<WireReply, ProviderError> {
    let decode_err = |e| ProviderError::Deserialize {
        context: format!("{kind} response"),
        source: e,
    };

    let (text, model, usage) = match kind {
        ProviderKind::OpenAi | ProviderKind::Perplexity => {
            let resp: ChatResponse = serde_json::from_str(body).map_err(decode_err)?;
            let text = resp
                .choices
                .into_iter()
                .find_map(|c| c.message.content)
                .unwrap_or_default();
            let usage = resp
                .usage
                .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
                .unwrap_or_default();
            (text, resp.model, usage)
        }
        ProviderKind::Anthropic => {
            let resp: MessagesResponse = serde_json::from_str(body).map_err(decode_err)?;
            let text = resp
                .content
                .into_iter()
                .filter(|b| b.kind == "text")
                .filter_map(|b| b.text)
                .collect::<Vec<_>>()
                .join("");
            let usage = resp
                .usage
                .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens))
                .unwrap_or_default();
            (text, resp.model, usage)
        }
        ProviderKind::Gemini => {
            let resp: GenerateResponse = serde_json::from_str(body).map_err(decode_err)?;
            let text = resp
                .candidates
                .into_iter()
                .find_map(|c| c.content)
                .map(|c| {
                    c.parts
                        .into_iter()
                        .filter_map(|p| p.text)
                        .collect::<Vec<_>>()
                        .join("")
                })
                .unwrap_or_default();
            let usage = resp
                .usage_metadata
                .map(|u| TokenUsage::new(u.prompt_token_count, u.candidates_token_count))
                .unwrap_or_default();
            (text, resp.model_version, usage)
        }
    };

    if text.trim().is_empty() {
        return Err(ProviderError::EmptyResponse {
            provider: kind.to_string(),
        });
    }

    Ok(WireReply {
        text,
        model: model.unwrap_or_else(|| requested_model.to_owned()),
        usage,
    })
}
