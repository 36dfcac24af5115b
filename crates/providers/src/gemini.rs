//! Google Gemini provider.
//!
//! Talks to the native `generateContent` REST surface. Tool definitions are
//! not translated for this family, so the orchestrator never attaches them.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parley_core::error::ProviderError;
use parley_core::message::{Message, Role};
use parley_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::http::{build_client, error_for_status, network_error};
use crate::sse::{SseDecoder, SseLine};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url: GEMINI_BASE_URL.into(),
            api_key: api_key.into(),
            client: build_client(Duration::from_secs(120))?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request_body(request: &ProviderRequest) -> GenerateRequest {
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(Message::text)
            .collect();

        let contents = request
            .messages
            .iter()
            .filter_map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                    // tool traffic never reaches this family
                    Role::System | Role::Tool => return None,
                };
                if m.text().is_empty() {
                    return None;
                }
                Some(Content {
                    role: Some(role.into()),
                    parts: vec![Part {
                        text: Some(m.text().to_string()),
                    }],
                })
            })
            .collect();

        GenerateRequest {
            system_instruction: (!system.is_empty()).then(|| Content {
                role: None,
                parts: vec![Part {
                    text: Some(system.join("\n\n")),
                }],
            }),
            contents,
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                response_mime_type: request.json_mode.then(|| "application/json".into()),
            },
        }
    }

    async fn post(
        &self,
        request: &ProviderRequest,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = if stream {
            format!(
                "{}/models/{}:streamGenerateContent?alt=sse",
                self.base_url, request.model
            )
        } else {
            format!("{}/models/{}:generateContent", self.base_url, request.model)
        };

        debug!(provider = "google", model = %request.model, stream, "Sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(request))
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            return Err(error_for_status("google", response, false).await);
        }
        Ok(response)
    }
}

/// Concatenated text of the first candidate, plus its finish reason.
fn candidate_text(resp: &GenerateResponse) -> Option<(String, Option<FinishReason>)> {
    let candidate = resp.candidates.first()?;
    let text = candidate
        .content
        .as_ref()
        .map(|c| {
            c.parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<String>()
        })
        .unwrap_or_default();
    let reason = candidate
        .finish_reason
        .as_deref()
        .map(FinishReason::from_wire);
    Some((text, reason))
}

fn usage_of(resp: &GenerateResponse) -> Option<Usage> {
    resp.usage_metadata.as_ref().map(|u| Usage {
        prompt_tokens: u.prompt_token_count,
        completion_tokens: u.candidates_token_count,
        total_tokens: u.total_token_count,
    })
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn supports_tools(&self) -> bool {
        false
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        let response = self.post(&request, false).await?;

        let api_resp: GenerateResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse Gemini response: {e}"),
            })?;

        let (text, finish_reason) = candidate_text(&api_resp)
            .ok_or_else(|| ProviderError::RequestFailed("no candidates in response".into()))?;

        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: usage_of(&api_resp),
            model: api_resp.model_version.unwrap_or(model),
            finish_reason,
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<FragmentReceiver, ProviderError> {
        let response = self.post(&request, true).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(64);

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut decoder = SseDecoder::new();
            let mut finish = None;
            let mut usage = None;

            let mut ended = false;
            while !ended {
                let lines = match byte_stream.next().await {
                    Some(Ok(bytes)) => decoder.push(&bytes),
                    Some(Err(e)) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                    // the body may end on a line with no trailing newline
                    None => {
                        ended = true;
                        decoder.finish().into_iter().collect()
                    }
                };

                for line in lines {
                    let SseLine::Data(data) = line else { continue };
                    let chunk: GenerateResponse = match serde_json::from_str(&data) {
                        Ok(c) => c,
                        Err(e) => {
                            trace!(error = %e, "Ignoring unparseable Gemini chunk");
                            continue;
                        }
                    };

                    if let Some(u) = usage_of(&chunk) {
                        usage = Some(u);
                    }
                    if let Some((text, reason)) = candidate_text(&chunk) {
                        if reason.is_some() {
                            finish = reason;
                        }
                        if !text.is_empty() && tx.send(Ok(StreamFragment::content(text))).await.is_err() {
                            return;
                        }
                    }
                }
            }

            let _ = tx
                .send(Ok(StreamFragment::Finished {
                    reason: finish,
                    usage,
                }))
                .await;
        });

        Ok(rx)
    }
}

// --- Gemini API types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}
