//! Google Cloud Vision text recognition (pipeline stage 1).

use base64::Engine as _;
use serde::Deserialize;

use crate::extract::{ProviderError, Recognized, Recognizer};

const DEFAULT_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Reported when the provider gives no per-word confidence.
const DEFAULT_CONFIDENCE: f32 = 0.8;

#[derive(Clone, Debug)]
pub struct VisionClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateResult>,
}

#[derive(Debug, Default, Deserialize)]
struct AnnotateResult {
    #[serde(rename = "textAnnotations", default)]
    text_annotations: Vec<TextAnnotation>,
    #[serde(default)]
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    description: String,
    #[serde(default)]
    confidence: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: String,
}

impl VisionClient {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key,
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }
}

impl Recognizer for VisionClient {
    async fn recognize(&self, image: &[u8]) -> Result<Recognized, ProviderError> {
        let content = base64::prelude::BASE64_STANDARD.encode(image);
        let body = serde_json::json!({
            "requests": [{
                "image": { "content": content },
                "features": [{ "type": "TEXT_DETECTION" }],
                // Receipts are Turkish; the hint noticeably improves accuracy.
                "imageContext": { "languageHints": ["tr"] }
            }]
        });

        let response = self
            .client
            .post(format!("{}?key={}", self.endpoint, self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::ocr(format!("request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::ocr(format!("provider returned {status}")));
        }

        let parsed: AnnotateResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::ocr(format!("invalid response: {err}")))?;

        let result = parsed
            .responses
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ocr("empty response"))?;

        if let Some(error) = result.error {
            return Err(ProviderError::ocr(error.message));
        }

        // The first annotation carries the full detected text; the rest are
        // individual words whose confidences we average.
        let mut annotations = result.text_annotations.into_iter();
        let Some(full) = annotations.next() else {
            return Err(ProviderError::ocr("no text detected in image"));
        };

        let word_confidences: Vec<f32> = annotations.filter_map(|a| a.confidence).collect();
        let confidence = if word_confidences.is_empty() {
            DEFAULT_CONFIDENCE
        } else {
            word_confidences.iter().sum::<f32>() / word_confidences.len() as f32
        };

        Ok(Recognized {
            text: full.description,
            confidence,
        })
    }
}
