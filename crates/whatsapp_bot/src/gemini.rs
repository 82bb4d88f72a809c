//! Gemini text structuring (pipeline stage 2).
//!
//! Sends the recognized text with a fixed extraction prompt and expects a
//! single JSON object back. Models love wrapping JSON in markdown fences, so
//! those are stripped before parsing. A response that still doesn't parse is
//! a structuring failure; the raw text is kept in the logs for diagnosis but
//! never retried.

use engine::RawReceipt;
use serde::Deserialize;

use crate::extract::{ProviderError, Structurer};

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const MODEL: &str = "gemini-1.5-flash";

#[derive(Clone, Debug)]
pub struct GeminiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Default, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

impl GeminiClient {
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

    fn prompt(ocr_text: &str) -> String {
        format!(
            "You are a Turkish receipt processing expert. Analyze this OCR text \
             from a Turkish receipt and return ONLY a valid JSON object with these \
             fields:\n\
             {{\n\
               \"merchant_name\": \"cleaned merchant/store name\",\n\
               \"total_amount\": float value in Turkish Lira,\n\
               \"date\": \"the receipt date; receipts print day-first (DD/MM/YYYY)\",\n\
               \"items\": [{{\"name\": \"item name\", \"quantity\": 1, \"price\": float}}],\n\
               \"receipt_number\": \"receipt/invoice number if found\",\n\
               \"tax_amount\": float value of KDV/tax if found,\n\
               \"confidence\": \"high/medium/low based on text quality\",\n\
               \"extraction_notes\": \"any issues or assumptions made\"\n\
             }}\n\n\
             Rules:\n\
             - Convert Turkish number format (25,40) to decimal (25.40)\n\
             - Clean the merchant name but keep it recognizable\n\
             - Handle Turkish characters properly (ç, ğ, ı, ö, ş, ü)\n\
             - Look for keywords: TOPLAM, FİŞ, TARİH, KDV, TUTAR\n\
             - If the total is not found, sum the individual items\n\
             - Be conservative with the confidence rating\n\n\
             OCR text:\n{ocr_text}\n\n\
             Return only valid JSON, no other text or explanation."
        )
    }
}

/// Strips optional ```json fences around a model response.
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

impl Structurer for GeminiClient {
    async fn structure(&self, text: &str) -> Result<RawReceipt, ProviderError> {
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": Self::prompt(text) }] }]
        });

        let url = format!(
            "{}/{}:generateContent?key={}",
            self.endpoint, MODEL, self.api_key
        );
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::llm(format!("request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::llm(format!("provider returned {status}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::llm(format!("invalid response: {err}")))?;

        let answer = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| ProviderError::llm("empty response"))?;

        let payload = strip_fences(&answer);
        serde_json::from_str(payload).map_err(|err| {
            tracing::warn!("unparseable structuring output: {payload}");
            ProviderError::llm(format!("invalid JSON response: {err}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fences_are_stripped() {
        assert_eq!(strip_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }
}
