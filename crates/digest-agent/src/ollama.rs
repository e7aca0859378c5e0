//! Ollama generation backend.
//!
//! Summaries go through `POST /api/chat` with streaming off. Before a run
//! the model can be checked with [`OllamaBackend::ensure_ready`]: list the
//! local models, pull the configured one if it is missing, then send a
//! short warm-up prompt so the first real request does not pay the load.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use pipeline::{GenerationBackend, GenerationError, GenerationOptions};

/// Summaries of large items on CPU-only hosts can take many minutes.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(900);

const WARM_UP_PROMPT: &str = "Hello, world!";

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ModelOptions {
    temperature: f64,
    top_p: f64,
    top_k: u32,
    repeat_penalty: f64,
    num_predict: u32,
}

impl From<&GenerationOptions> for ModelOptions {
    fn from(o: &GenerationOptions) -> Self {
        Self {
            temperature: o.temperature,
            top_p: o.top_p,
            top_k: o.top_k,
            repeat_penalty: o.repeat_penalty,
            num_predict: o.num_predict,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ModelOptions,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    model: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

fn request_error(e: reqwest::Error) -> GenerationError {
    if e.is_decode() {
        GenerationError::MalformedResponse(e.to_string())
    } else {
        GenerationError::Unreachable(e.to_string())
    }
}

// ── Backend ───────────────────────────────────────────────────────────────────

pub struct OllamaBackend {
    http: reqwest::Client,
    host: String,
    model: String,
}

impl OllamaBackend {
    pub fn new(host: &str, model: &str) -> Result<Self, GenerationError> {
        Self::with_timeout(host, model, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        host: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Unreachable(format!("client build failed: {e}")))?;
        Ok(Self {
            http,
            host: host.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<String, GenerationError> {
        let response = self
            .http
            .post(format!("{}{path}", self.host))
            .json(body)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(GenerationError::Backend {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }

    /// Names of the models the server has locally.
    pub async fn list_models(&self) -> Result<Vec<String>, GenerationError> {
        let response = self
            .http
            .get(format!("{}/api/tags", self.host))
            .send()
            .await
            .map_err(request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let tags: TagsResponse = response.json().await.map_err(request_error)?;
        Ok(tags
            .models
            .into_iter()
            .map(|m| if m.model.is_empty() { m.name } else { m.model })
            .collect())
    }

    fn is_listed(&self, models: &[String]) -> bool {
        let latest = format!("{}:latest", self.model);
        models.iter().any(|m| *m == self.model || *m == latest)
    }

    /// Whether the configured model is available locally. Never fails.
    pub async fn is_available(&self) -> bool {
        match self.list_models().await {
            Ok(models) => self.is_listed(&models),
            Err(e) => {
                debug!(error = %e, "model listing failed");
                false
            }
        }
    }

    /// List, pull when missing, then warm the model up.
    pub async fn ensure_ready(&self) -> Result<(), GenerationError> {
        let models = self.list_models().await?;
        info!(model = %self.model, available = ?models, "checking model");

        if self.is_listed(&models) {
            info!(model = %self.model, "model already available");
        } else {
            info!(model = %self.model, "model not found locally, pulling");
            self.post_json(
                "/api/pull",
                &serde_json::json!({ "model": self.model, "stream": false }),
            )
            .await
            .map_err(|e| GenerationError::ModelNotReady {
                model: self.model.clone(),
                reason: format!("pull failed: {e}"),
            })?;
            info!(model = %self.model, "model pulled");
        }

        let raw = self
            .post_json(
                "/api/generate",
                &serde_json::json!({
                    "model": self.model,
                    "prompt": WARM_UP_PROMPT,
                    "stream": false,
                }),
            )
            .await
            .map_err(|e| GenerationError::ModelNotReady {
                model: self.model.clone(),
                reason: format!("warm-up failed: {e}"),
            })?;

        let warm_up: GenerateResponse =
            serde_json::from_str(&raw).map_err(|e| GenerationError::ModelNotReady {
                model: self.model.clone(),
                reason: format!("unreadable warm-up response: {e}"),
            })?;
        if warm_up.response.trim().is_empty() {
            warn!(model = %self.model, "warm-up returned no text");
            return Err(GenerationError::ModelNotReady {
                model: self.model.clone(),
                reason: "model test failed, no response received".to_string(),
            });
        }

        info!(model = %self.model, "model initialized and tested");
        Ok(())
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    async fn generate(
        &self,
        system_prompt: &str,
        context: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: context,
                },
            ],
            stream: false,
            options: options.into(),
        };

        let raw = self.post_json("/api/chat", &request).await?;
        let response: ChatResponse = serde_json::from_str(&raw)
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        response
            .message
            .map(|m| m.content)
            .ok_or_else(|| GenerationError::MalformedResponse("response has no message".into()))
    }
}
