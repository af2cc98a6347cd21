// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Vision OCR providers — request shaping per backend, selected by config.
//
// Every provider speaks JSON over HTTPS. Building the request body and pulling
// the model's text back out of the response is provider-specific and lives
// here; putting bytes on the wire is the injected `VisionTransport`'s job.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose};
use legible_core::config::{OcrConfig, OcrProvider};
use legible_core::error::{LegibleError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const GOOGLE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const MAX_OUTPUT_TOKENS: u32 = 4096;
const IMAGE_MIME: &str = "image/png";

/// A fully shaped provider request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisionRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

/// Sends a [`VisionRequest`] and returns the parsed JSON response body.
pub trait VisionTransport: Send + Sync {
    fn post_json(&self, request: &VisionRequest) -> Result<Value>;
}

/// One word as returned by a vision model, before validation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawWord {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub bbox: Vec<i32>,
    /// 0.0-1.0; zero when the model omitted it.
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Deserialize)]
struct WordsResponse {
    #[serde(default)]
    words: Vec<RawWord>,
}

/// Recognise handwritten words in one page image.
pub trait VisionOcr: Send + Sync {
    fn recognize(&self, page_image: &[u8]) -> Result<Vec<RawWord>>;

    /// Provider name for logs.
    fn name(&self) -> &'static str;

    fn model(&self) -> &str;
}

/// Build the vision client selected by `config`.
///
/// Validates the configuration first, so a missing key or endpoint fails at
/// construction rather than on the first page.
pub fn new_vision_ocr(
    config: &OcrConfig,
    prompt: String,
    transport: Arc<dyn VisionTransport>,
) -> Result<Arc<dyn VisionOcr>> {
    config.validate()?;
    let client = ProviderClient {
        provider: config.provider,
        model: config.effective_model().to_owned(),
        endpoint: config.endpoint.trim_end_matches('/').to_owned(),
        api_key: config.api_key.clone(),
        temperature: config.temperature,
        max_retries: config.max_retries,
        prompt,
        transport,
    };
    debug!(provider = %client.provider, model = %client.model, "vision client created");
    Ok(Arc::new(client))
}

/// Shared implementation for all four backends.
pub struct ProviderClient {
    provider: OcrProvider,
    model: String,
    endpoint: String,
    api_key: String,
    temperature: f64,
    max_retries: u32,
    prompt: String,
    transport: Arc<dyn VisionTransport>,
}

impl ProviderClient {
    /// Shape the request for this provider.
    pub fn build_request(&self, image_b64: &str) -> VisionRequest {
        match self.provider {
            OcrProvider::Ollama => VisionRequest {
                url: format!("{}/api/generate", self.endpoint),
                headers: Vec::new(),
                body: json!({
                    "model": self.model,
                    "prompt": self.prompt,
                    "images": [image_b64],
                    "stream": false,
                    "format": "json",
                    "options": { "temperature": self.temperature },
                }),
            },
            OcrProvider::OpenAi => VisionRequest {
                url: OPENAI_URL.to_owned(),
                headers: vec![("Authorization".into(), format!("Bearer {}", self.api_key))],
                body: json!({
                    "model": self.model,
                    "max_tokens": MAX_OUTPUT_TOKENS,
                    "temperature": self.temperature,
                    "response_format": { "type": "json_object" },
                    "messages": [{
                        "role": "user",
                        "content": [
                            { "type": "text", "text": self.prompt },
                            { "type": "image_url", "image_url": {
                                "url": format!("data:{IMAGE_MIME};base64,{image_b64}")
                            }},
                        ],
                    }],
                }),
            },
            OcrProvider::Anthropic => VisionRequest {
                url: ANTHROPIC_URL.to_owned(),
                headers: vec![
                    ("x-api-key".into(), self.api_key.clone()),
                    ("anthropic-version".into(), ANTHROPIC_VERSION.into()),
                ],
                body: json!({
                    "model": self.model,
                    "max_tokens": MAX_OUTPUT_TOKENS,
                    "temperature": self.temperature,
                    "messages": [{
                        "role": "user",
                        "content": [
                            { "type": "image", "source": {
                                "type": "base64",
                                "media_type": IMAGE_MIME,
                                "data": image_b64,
                            }},
                            { "type": "text", "text": self.prompt },
                        ],
                    }],
                }),
            },
            OcrProvider::Google => VisionRequest {
                url: format!("{GOOGLE_URL}/{}:generateContent", self.model),
                headers: vec![("x-goog-api-key".into(), self.api_key.clone())],
                body: json!({
                    "contents": [{
                        "parts": [
                            { "text": self.prompt },
                            { "inline_data": { "mime_type": IMAGE_MIME, "data": image_b64 } },
                        ],
                    }],
                    "generationConfig": {
                        "temperature": self.temperature,
                        "responseMimeType": "application/json",
                    },
                }),
            },
        }
    }

    /// Pull the model's text answer out of a provider response.
    pub fn extract_text(&self, response: &Value) -> Result<String> {
        let text = match self.provider {
            OcrProvider::Ollama => response.get("response").and_then(Value::as_str),
            OcrProvider::OpenAi => response
                .pointer("/choices/0/message/content")
                .and_then(Value::as_str),
            OcrProvider::Anthropic => response
                .get("content")
                .and_then(Value::as_array)
                .and_then(|blocks| {
                    blocks
                        .iter()
                        .find(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                })
                .and_then(|b| b.get("text"))
                .and_then(Value::as_str),
            OcrProvider::Google => response
                .pointer("/candidates/0/content/parts/0/text")
                .and_then(Value::as_str),
        };
        text.map(str::to_owned).ok_or_else(|| {
            LegibleError::Ocr(format!("no text content in {} response", self.provider))
        })
    }
}

impl VisionOcr for ProviderClient {
    #[instrument(skip_all, fields(provider = %self.provider, model = %self.model, image_bytes = page_image.len()))]
    fn recognize(&self, page_image: &[u8]) -> Result<Vec<RawWord>> {
        let request = self.build_request(&general_purpose::STANDARD.encode(page_image));

        let mut attempt = 0;
        let response = loop {
            match self.transport.post_json(&request) {
                Ok(response) => break response,
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(attempt, max_retries = self.max_retries, error = %e, "vision request failed, retrying");
                }
                Err(e) => {
                    return Err(LegibleError::Ocr(format!(
                        "{} request failed after {} attempt(s): {e}",
                        self.provider,
                        attempt + 1
                    )));
                }
            }
        };

        let text = self.extract_text(&response)?;
        let words = parse_words(&text)?;
        debug!(words = words.len(), "vision OCR completed");
        Ok(words)
    }

    fn name(&self) -> &'static str {
        self.provider.as_str()
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Parse `{"words": [...]}` from model output, tolerating a Markdown fence.
pub fn parse_words(text: &str) -> Result<Vec<RawWord>> {
    let body = strip_code_fence(text);
    serde_json::from_str::<WordsResponse>(body)
        .map(|r| r.words)
        .map_err(|e| LegibleError::Ocr(format!("failed to parse OCR response: {e}")))
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence line.
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Records requests and replays canned responses in order.
    struct ScriptedTransport {
        requests: Mutex<Vec<VisionRequest>>,
        responses: Mutex<Vec<Result<Value>>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<Value>>) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                responses: Mutex::new(responses),
            }
        }
    }

    impl VisionTransport for ScriptedTransport {
        fn post_json(&self, request: &VisionRequest) -> Result<Value> {
            self.requests.lock().expect("lock").push(request.clone());
            let mut responses = self.responses.lock().expect("lock");
            if responses.is_empty() {
                return Err(LegibleError::Remote("no scripted response".into()));
            }
            responses.remove(0)
        }
    }

    fn config(provider: OcrProvider) -> OcrConfig {
        OcrConfig {
            provider,
            api_key: "test-key".into(),
            ..OcrConfig::default()
        }
    }

    const WORDS: &str = r#"{"words":[{"text":"hello","bbox":[1,2,3,4],"confidence":0.9}]}"#;

    #[test]
    fn factory_rejects_cloud_provider_without_key() {
        let mut cfg = config(OcrProvider::OpenAi);
        cfg.api_key.clear();
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));
        assert!(new_vision_ocr(&cfg, "p".into(), transport).is_err());
    }

    #[test]
    fn factory_applies_default_model() {
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));
        let ocr = new_vision_ocr(&config(OcrProvider::Anthropic), "p".into(), transport).expect("client");
        assert_eq!(ocr.model(), "claude-3-5-sonnet-20241022");
        assert_eq!(ocr.name(), "anthropic");
    }

    #[test]
    fn ollama_round_trip() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(json!({ "response": WORDS }))]));
        let ocr = new_vision_ocr(&config(OcrProvider::Ollama), "prompt".into(), transport.clone())
            .expect("client");
        let words = ocr.recognize(b"png-bytes").expect("recognize");
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].bbox, vec![1, 2, 3, 4]);

        let requests = transport.requests.lock().expect("lock");
        assert_eq!(requests[0].url, "http://localhost:11434/api/generate");
        assert_eq!(
            requests[0].body["images"][0],
            general_purpose::STANDARD.encode(b"png-bytes")
        );
        assert_eq!(requests[0].body["model"], "llava");
    }

    #[test]
    fn each_cloud_provider_extracts_its_text() {
        let cases = [
            (
                OcrProvider::OpenAi,
                json!({ "choices": [{ "message": { "content": WORDS } }] }),
            ),
            (
                OcrProvider::Anthropic,
                json!({ "content": [{ "type": "text", "text": WORDS }] }),
            ),
            (
                OcrProvider::Google,
                json!({ "candidates": [{ "content": { "parts": [{ "text": WORDS }] } }] }),
            ),
        ];
        for (provider, response) in cases {
            let transport = Arc::new(ScriptedTransport::new(vec![Ok(response)]));
            let ocr = new_vision_ocr(&config(provider), "prompt".into(), transport.clone())
                .expect("client");
            let words = ocr.recognize(b"img").expect("recognize");
            assert_eq!(words[0].text, "hello", "provider {provider}");
            let requests = transport.requests.lock().expect("lock");
            assert!(
                requests[0].headers.iter().any(|(_, v)| v.contains("test-key")),
                "provider {provider} must send its key"
            );
        }
    }

    #[test]
    fn transient_failures_are_retried() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(LegibleError::Remote("503".into())),
            Ok(json!({ "response": WORDS })),
        ]));
        let ocr = new_vision_ocr(&config(OcrProvider::Ollama), "p".into(), transport.clone())
            .expect("client");
        assert_eq!(ocr.recognize(b"img").expect("recognize").len(), 1);
        assert_eq!(transport.requests.lock().expect("lock").len(), 2);
    }

    #[test]
    fn retries_are_bounded() {
        let mut cfg = config(OcrProvider::Ollama);
        cfg.max_retries = 1;
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));
        let ocr = new_vision_ocr(&cfg, "p".into(), transport.clone()).expect("client");
        let err = ocr.recognize(b"img").expect_err("all attempts fail");
        assert!(matches!(err, LegibleError::Ocr(_)));
        assert_eq!(transport.requests.lock().expect("lock").len(), 2);
    }

    #[test]
    fn code_fences_are_stripped() {
        let fenced = format!("```json\n{WORDS}\n```");
        assert_eq!(parse_words(&fenced).expect("parse").len(), 1);
        let bare_fence = format!("```\n{WORDS}\n```");
        assert_eq!(parse_words(&bare_fence).expect("parse").len(), 1);
        assert_eq!(parse_words(WORDS).expect("parse").len(), 1);
    }

    #[test]
    fn garbage_output_is_an_ocr_error() {
        assert!(matches!(parse_words("I see a cat"), Err(LegibleError::Ocr(_))));
        assert!(parse_words("{}").expect("empty object").is_empty());
    }
}
