use std::time::Duration;

use super::gemini_types::{
    Content, ErrorEnvelope, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    LatLng, Part, RetrievalConfig, Tool, ToolConfig,
};
use super::types::{GatewayPrompt, InferenceGateway, OutputContract, RawServiceReply};
use super::AnalysisError;
use crate::config::{Config, ConfigError};

/// Pause between retries of a transient failure, multiplied by the attempt number.
const RETRY_BACKOFF_MS: u64 = 500;

/// Longest slice of an error body kept for diagnostics.
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Blocking HTTP client for the Gemini `generateContent` endpoint.
///
/// Transport only: the reply text comes back exactly as the service wrote it.
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
    max_retries: u32,
}

impl GeminiClient {
    /// Build a client from validated configuration.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.trim_start_matches("models/").to_string(),
            api_key: config.api_key.clone(),
            client,
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn send_once(&self, body: &GenerateContentRequest) -> Result<RawServiceReply, AnalysisError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(classify_http_failure(status.as_u16(), &body));
        }

        // A body cut off mid-read is a transport failure, not a bad reply.
        let body = response.bytes().map_err(|e| self.transport_error(e))?;

        let envelope: GenerateContentResponse = serde_json::from_slice(&body)
            .map_err(|e| AnalysisError::MalformedResponse(format!("unreadable envelope: {e}")))?;

        reply_from_envelope(&envelope)
    }

    fn transport_error(&self, e: reqwest::Error) -> AnalysisError {
        if e.is_timeout() {
            AnalysisError::ServiceUnavailable(format!(
                "request timed out after {}s",
                self.timeout_secs
            ))
        } else if e.is_connect() {
            AnalysisError::ServiceUnavailable(format!("cannot connect to {}", self.base_url))
        } else {
            AnalysisError::ServiceUnavailable(e.without_url().to_string())
        }
    }
}

impl InferenceGateway for GeminiClient {
    fn invoke(&self, prompt: &GatewayPrompt) -> Result<RawServiceReply, AnalysisError> {
        let body = build_request_body(prompt);
        let mut attempt: u32 = 0;

        loop {
            let start = std::time::Instant::now();
            match self.send_once(&body) {
                Ok(reply) => {
                    tracing::info!(
                        model = %self.model,
                        attempt = attempt + 1,
                        elapsed_ms = %start.elapsed().as_millis(),
                        reply_len = reply.as_str().len(),
                        "Inference call complete"
                    );
                    return Ok(reply);
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        model = %self.model,
                        attempt,
                        error = %e,
                        "Inference call failed, retrying"
                    );
                    std::thread::sleep(Duration::from_millis(RETRY_BACKOFF_MS * u64::from(attempt)));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Translate a gateway prompt into the REST body.
pub fn build_request_body(prompt: &GatewayPrompt) -> GenerateContentRequest {
    let mut parts = Vec::with_capacity(2);
    if let Some(image) = &prompt.image {
        parts.push(Part::inline(&image.mime_type, &image.data));
    }
    parts.push(Part::text(prompt.user.clone()));

    let generation_config = match &prompt.output {
        OutputContract::Schema(schema) => GenerationConfig {
            response_mime_type: Some("application/json".into()),
            response_schema: Some(schema.clone()),
            ..Default::default()
        },
        OutputContract::FencedJson => GenerationConfig::default(),
    };

    let (tools, tool_config) = match prompt.grounding {
        Some(point) => (
            vec![Tool::maps()],
            Some(ToolConfig {
                retrieval_config: RetrievalConfig {
                    lat_lng: LatLng {
                        latitude: point.latitude,
                        longitude: point.longitude,
                    },
                },
            }),
        ),
        None => (Vec::new(), None),
    };

    GenerateContentRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part::text(prompt.system.clone())],
        },
        contents: vec![Content {
            role: Some("user".into()),
            parts,
        }],
        generation_config,
        tools,
        tool_config,
    }
}

/// Map a non-success HTTP status to the error taxonomy.
///
/// 408 and 5xx are transient; every other status is a refusal of this request.
fn classify_http_failure(status: u16, body: &str) -> AnalysisError {
    let message = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) if !env.error.status.is_empty() => {
            format!("{}: {}", env.error.status, env.error.message)
        }
        Ok(env) => env.error.message,
        Err(_) => body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    };

    if status == 408 || (500..600).contains(&status) {
        AnalysisError::ServiceUnavailable(format!("HTTP {status}: {message}"))
    } else {
        AnalysisError::RequestRejected { status, message }
    }
}

fn reply_from_envelope(envelope: &GenerateContentResponse) -> Result<RawServiceReply, AnalysisError> {
    if let Some(reason) = envelope.block_reason() {
        return Err(AnalysisError::RequestRejected {
            status: 200,
            message: format!("prompt blocked: {reason}"),
        });
    }

    if let Some(text) = envelope.first_candidate_text() {
        return Ok(RawServiceReply(text));
    }

    match envelope
        .candidates
        .first()
        .and_then(|c| c.finish_reason.as_deref())
    {
        Some(reason) if reason != "STOP" => Err(AnalysisError::RequestRejected {
            status: 200,
            message: format!("generation stopped: {reason}"),
        }),
        _ => Err(AnalysisError::MalformedResponse("reply contained no text".into())),
    }
}
