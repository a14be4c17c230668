use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};
use tripwise_core::{DayPlan, ItineraryDraft};
use tripwise_observability::AppMetrics;

/// Outcome classification for one provider call. Overload means capacity
/// exhaustion at the provider, worth retrying; malformed output is treated as
/// a transient generation glitch and retried on the same model; everything
/// else is fatal for that model.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("model overloaded: {0}")]
    Overloaded(String),

    #[error("malformed model response: {0}")]
    Malformed(String),

    #[error("model call failed: {0}")]
    Fatal(String),
}

impl GenerateError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Overloaded(_) | Self::Malformed(_))
    }
}

/// One generative provider call: prompt in, raw text out. Object-safe so
/// tests can substitute a scripted client.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerateError>;
}

#[derive(Debug, Clone)]
pub struct FallbackConfig {
    /// Model identifiers in priority order, first is most preferred.
    pub models: Vec<String>,
    /// Attempt ceiling per model, retries included.
    pub attempts_per_model: u32,
    /// Delay before retry attempt n is `backoff_base * n`.
    pub backoff_base: Duration,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            models: vec![
                "models/gemini-2.5-flash".to_string(),
                "models/gemini-2.5-flash-lite".to_string(),
                "models/gemini-flash-lite-latest".to_string(),
                "models/gemini-2.0-flash".to_string(),
                "models/gemini-2.0-flash-lite".to_string(),
            ],
            attempts_per_model: 3,
            backoff_base: Duration::from_millis(600),
        }
    }
}

/// Walks the model chain strictly sequentially: retry a model while its error
/// is retryable and attempts remain, otherwise advance to the next model. A
/// model is never revisited once passed.
pub struct FallbackEngine {
    config: FallbackConfig,
    client: Arc<dyn GenerativeClient>,
    metrics: Arc<AppMetrics>,
}

impl FallbackEngine {
    pub fn new(
        config: FallbackConfig,
        client: Arc<dyn GenerativeClient>,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            config,
            client,
            metrics,
        }
    }

    pub async fn generate_itinerary(&self, prompt: &str) -> Result<ItineraryDraft, GenerateError> {
        self.generate_value(prompt).await
    }

    pub async fn generate_day(&self, prompt: &str) -> Result<DayPlan, GenerateError> {
        self.generate_value(prompt).await
    }

    async fn generate_value<T: DeserializeOwned>(&self, prompt: &str) -> Result<T, GenerateError> {
        let mut last_error: Option<GenerateError> = None;

        for model in &self.config.models {
            for attempt in 1..=self.config.attempts_per_model.max(1) {
                self.metrics.inc_model_call();

                let outcome = match self.client.generate(model, prompt).await {
                    Ok(raw) => match serde_json::from_str::<T>(&raw) {
                        Ok(value) => {
                            debug!(model = %model, attempt, "model returned a valid structure");
                            return Ok(value);
                        }
                        Err(err) => GenerateError::Malformed(err.to_string()),
                    },
                    Err(err) => err,
                };

                let retryable = outcome.is_retryable();
                warn!(
                    model = %model,
                    attempt,
                    retryable,
                    error = %outcome,
                    "model attempt failed"
                );
                last_error = Some(outcome);

                if !retryable {
                    break;
                }
                if attempt < self.config.attempts_per_model {
                    self.metrics.inc_model_retry();
                    tokio::time::sleep(self.config.backoff_base * attempt).await;
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| GenerateError::Fatal("no models configured".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use parking_lot::Mutex;

    use super::*;

    const VALID_DAY: &str = r#"{
        "day": 1,
        "theme": "Beaches",
        "morning": ["Swim"],
        "afternoon": [],
        "evening": ["Sunset point"],
        "places": [{ "name": "Baga Beach", "category": "sightseeing" }]
    }"#;

    /// Replays a scripted sequence of outcomes and records which model each
    /// call hit.
    struct ScriptedClient {
        script: Mutex<VecDeque<Result<String, GenerateError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(script: Vec<Result<String, GenerateError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl GenerativeClient for ScriptedClient {
        async fn generate(&self, model: &str, _prompt: &str) -> Result<String, GenerateError> {
            self.calls.lock().push(model.to_string());
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(GenerateError::Fatal("script exhausted".to_string())))
        }
    }

    fn engine(models: &[&str], client: Arc<ScriptedClient>) -> FallbackEngine {
        FallbackEngine::new(
            FallbackConfig {
                models: models.iter().map(ToString::to_string).collect(),
                attempts_per_model: 3,
                backoff_base: Duration::ZERO,
            },
            client,
            AppMetrics::shared(),
        )
    }

    fn overloaded() -> Result<String, GenerateError> {
        Err(GenerateError::Overloaded("503 service unavailable".to_string()))
    }

    #[tokio::test]
    async fn overloaded_model_exhausts_ceiling_then_next_model_wins() {
        let client = ScriptedClient::new(vec![
            overloaded(),
            overloaded(),
            overloaded(),
            Ok(VALID_DAY.to_string()),
        ]);
        let engine = engine(&["model-a", "model-b"], client.clone());

        let day = engine.generate_day("prompt").await.expect("should succeed");
        assert_eq!(day.theme, "Beaches");

        let calls = client.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[..3], vec!["model-a"; 3]);
        assert_eq!(calls[3], "model-b");
    }

    #[tokio::test]
    async fn fatal_error_skips_remaining_attempts_of_that_model() {
        let client = ScriptedClient::new(vec![Err(GenerateError::Fatal(
            "invalid api key".to_string(),
        ))]);
        let engine = engine(&["model-a"], client.clone());

        let error = engine
            .generate_day("prompt")
            .await
            .expect_err("should fail");
        assert!(matches!(error, GenerateError::Fatal(_)));
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn fatal_error_still_advances_to_next_model() {
        let client = ScriptedClient::new(vec![
            Err(GenerateError::Fatal("bad prompt".to_string())),
            Ok(VALID_DAY.to_string()),
        ]);
        let engine = engine(&["model-a", "model-b"], client.clone());

        engine.generate_day("prompt").await.expect("should succeed");
        assert_eq!(client.calls(), vec!["model-a", "model-b"]);
    }

    #[tokio::test]
    async fn malformed_response_is_retried_on_same_model() {
        let client = ScriptedClient::new(vec![
            Ok("not json at all".to_string()),
            Ok(VALID_DAY.to_string()),
        ]);
        let engine = engine(&["model-a"], client.clone());

        engine.generate_day("prompt").await.expect("should succeed");
        assert_eq!(client.calls(), vec!["model-a", "model-a"]);
    }

    #[tokio::test]
    async fn exhaustion_surfaces_most_recent_error() {
        let client = ScriptedClient::new(vec![
            overloaded(),
            overloaded(),
            overloaded(),
            overloaded(),
            overloaded(),
            Err(GenerateError::Overloaded("model b melted".to_string())),
        ]);
        let engine = engine(&["model-a", "model-b"], client.clone());

        let error = engine
            .generate_day("prompt")
            .await
            .expect_err("should fail");
        match error {
            GenerateError::Overloaded(message) => assert_eq!(message, "model b melted"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(client.calls().len(), 6);
    }
}
