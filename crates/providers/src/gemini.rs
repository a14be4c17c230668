use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use crate::generate::{GenerateError, GenerativeClient};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini REST client. The deterministic-JSON output mode and temperature are
/// part of the provider contract, not caller knobs.
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(http: Client, api_key: String) -> Self {
        Self {
            http,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

fn is_overload_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("503") || lower.contains("overloaded") || lower.contains("service unavailable")
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerateError> {
        let url = format!("{}/{}:generateContent", self.base_url, model);
        let payload = json!({
            "contents": [
                { "role": "user", "parts": [{ "text": prompt }] }
            ],
            "generationConfig": {
                "responseMimeType": "application/json",
                "temperature": 0.7
            }
        });

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                let message = err.to_string();
                if is_overload_message(&message) {
                    GenerateError::Overloaded(message)
                } else {
                    GenerateError::Fatal(message)
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| GenerateError::Fatal(err.to_string()))?;

        if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GenerateError::Overloaded(format!(
                "gemini status {}: {}",
                status.as_u16(),
                body
            )));
        }
        if !status.is_success() {
            return Err(GenerateError::Fatal(format!(
                "gemini status {}: {}",
                status.as_u16(),
                body
            )));
        }

        let parsed: Value = serde_json::from_str(&body)
            .map_err(|err| GenerateError::Malformed(err.to_string()))?;

        parsed
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| {
                GenerateError::Malformed("gemini response carried no candidate text".to_string())
            })
    }
}
