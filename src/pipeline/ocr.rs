//! OCR client adapter: one encoded page in, the page's text (or nothing) out.
//!
//! [`TextDetector`] is the seam between the aggregator and the external
//! service. [`GoogleVisionDetector`] talks to Cloud Vision `images:annotate`
//! with a `TEXT_DETECTION` feature; [`crate::pipeline::llm::VisionLlmDetector`]
//! uses any vision-capable LLM instead. Tests plug in stubs.
//!
//! Detectors never retry. Every failure is reported as an
//! [`OcrServiceError`] and the aggregator aborts the request.

use crate::error::OcrServiceError;
use crate::pipeline::encode::EncodedPage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Detects the text on one page image.
#[async_trait]
pub trait TextDetector: Send + Sync {
    /// Return the page's text, or `None` when the service found none.
    async fn detect_text(&self, page: &EncodedPage) -> Result<Option<String>, OcrServiceError>;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}

// ── Google Cloud Vision ──────────────────────────────────────────────────

pub const DEFAULT_VISION_ENDPOINT: &str = "https://vision.googleapis.com";

/// How requests to Cloud Vision are authenticated.
#[derive(Clone, PartialEq, Eq)]
pub enum VisionAuth {
    /// `?key=` query parameter.
    ApiKey(String),
    /// `Authorization: Bearer` header (OAuth access token).
    BearerToken(String),
}

impl fmt::Debug for VisionAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisionAuth::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            VisionAuth::BearerToken(_) => f.write_str("BearerToken(<redacted>)"),
        }
    }
}

/// Connection settings for [`GoogleVisionDetector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionConfig {
    /// Base URL, without the `/v1/images:annotate` path.
    pub endpoint: String,
    pub auth: VisionAuth,
    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
}

impl VisionConfig {
    pub fn with_api_key(key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_VISION_ENDPOINT.to_string(),
            auth: VisionAuth::ApiKey(key.into()),
            timeout_secs: 60,
        }
    }

    pub fn with_access_token(token: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_VISION_ENDPOINT.to_string(),
            auth: VisionAuth::BearerToken(token.into()),
            timeout_secs: 60,
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs.max(1);
        self
    }

    /// Read `GOOGLE_VISION_API_KEY` (preferred) or `GOOGLE_CLOUD_ACCESS_TOKEN`,
    /// and an optional `GOOGLE_VISION_ENDPOINT` override.
    pub fn from_env() -> Result<Self, OcrServiceError> {
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let config = if let Some(key) = non_empty("GOOGLE_VISION_API_KEY") {
            Self::with_api_key(key)
        } else if let Some(token) = non_empty("GOOGLE_CLOUD_ACCESS_TOKEN") {
            Self::with_access_token(token)
        } else {
            return Err(OcrServiceError::NotConfigured(
                "set GOOGLE_VISION_API_KEY or GOOGLE_CLOUD_ACCESS_TOKEN".into(),
            ));
        };

        Ok(match non_empty("GOOGLE_VISION_ENDPOINT") {
            Some(endpoint) => config.endpoint(endpoint),
            None => config,
        })
    }

    fn annotate_url(&self) -> String {
        format!("{}/v1/images:annotate", self.endpoint.trim_end_matches('/'))
    }
}

/// Cloud Vision `TEXT_DETECTION` client.
#[derive(Debug, Clone)]
pub struct GoogleVisionDetector {
    client: reqwest::Client,
    config: VisionConfig,
}

impl GoogleVisionDetector {
    pub fn new(config: VisionConfig) -> Result<Self, OcrServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OcrServiceError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self, OcrServiceError> {
        Self::new(VisionConfig::from_env()?)
    }
}

#[async_trait]
impl TextDetector for GoogleVisionDetector {
    async fn detect_text(&self, page: &EncodedPage) -> Result<Option<String>, OcrServiceError> {
        let body = AnnotateRequest::text_detection(page.to_base64());

        let mut request = self.client.post(self.config.annotate_url()).json(&body);
        request = match &self.config.auth {
            VisionAuth::ApiKey(key) => request.query(&[("key", key)]),
            VisionAuth::BearerToken(token) => request.bearer_auth(token),
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                OcrServiceError::Timeout {
                    secs: self.config.timeout_secs,
                }
            } else {
                OcrServiceError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                OcrServiceError::Timeout {
                    secs: self.config.timeout_secs,
                }
            } else {
                OcrServiceError::Transport(e.to_string())
            }
        })?;

        if !status.is_success() {
            let err = classify_status(status.as_u16(), &text);
            warn!("Vision API returned HTTP {} for page {}", status, page.index);
            return Err(err);
        }

        let parsed: AnnotateResponse = serde_json::from_str(&text)
            .map_err(|e| OcrServiceError::InvalidResponse(e.to_string()))?;
        let result = first_annotation(parsed)?;
        debug!(
            "Vision page {}: {}",
            page.index,
            result
                .as_ref()
                .map(|t| format!("{} chars", t.len()))
                .unwrap_or_else(|| "no text".into())
        );
        Ok(result)
    }

    fn name(&self) -> &str {
        "google-vision"
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AnnotateRequest {
    requests: Vec<ImageRequest>,
}

#[derive(Debug, Serialize)]
struct ImageRequest {
    image: ImageContent,
    features: Vec<Feature>,
}

#[derive(Debug, Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Debug, Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
}

impl AnnotateRequest {
    fn text_detection(content: String) -> Self {
        Self {
            requests: vec![ImageRequest {
                image: ImageContent { content },
                features: vec![Feature {
                    kind: "TEXT_DETECTION",
                }],
            }],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    text_annotations: Vec<EntityAnnotation>,
    error: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct EntityAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct Status {
    #[serde(default)]
    code: Option<i32>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Status,
}

/// The first annotation is the whole-image text; the rest are per-word boxes.
fn first_annotation(response: AnnotateResponse) -> Result<Option<String>, OcrServiceError> {
    let Some(first) = response.responses.into_iter().next() else {
        return Ok(None);
    };

    if let Some(err) = first.error {
        if err.status.as_deref() == Some("RESOURCE_EXHAUSTED") {
            return Err(OcrServiceError::Quota {
                detail: err.message,
            });
        }
        return Err(OcrServiceError::Api {
            status: None,
            message: match err.code {
                Some(code) => format!("code {}: {}", code, err.message),
                None => err.message,
            },
        });
    }

    Ok(first
        .text_annotations
        .into_iter()
        .next()
        .map(|a| a.description)
        .filter(|d| !d.is_empty()))
}

/// Map a non-2xx HTTP answer to an [`OcrServiceError`].
fn classify_status(status: u16, body: &str) -> OcrServiceError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let message = envelope
        .as_ref()
        .map(|e| e.error.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.chars().take(200).collect());
    let exhausted = envelope
        .as_ref()
        .and_then(|e| e.error.status.as_deref())
        == Some("RESOURCE_EXHAUSTED");

    match status {
        401 | 403 => OcrServiceError::Auth {
            status,
            detail: message,
        },
        429 => OcrServiceError::Quota { detail: message },
        _ if exhausted => OcrServiceError::Quota { detail: message },
        _ => OcrServiceError::Api {
            status: Some(status),
            message,
        },
    }
}
