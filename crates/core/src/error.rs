use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Failure taxonomy of the planning pipeline. Validation, budget and
/// not-found outcomes are caller-actionable; upstream outcomes distinguish
/// "retry shortly" overload from permanent provider failures.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("invalid request")]
    Validation(Vec<FieldError>),

    #[error("budget too low for {destination}: minimum recommended budget is ₹{minimum} for {days} days")]
    BudgetTooLow {
        destination: String,
        minimum: i64,
        days: i64,
    },

    #[error("trip not found")]
    NotFound,

    #[error("itinerary models are overloaded: {0}")]
    UpstreamOverloaded(String),

    #[error("itinerary provider failed: {0}")]
    UpstreamFatal(String),

    #[error("storage failure")]
    Persistence(#[source] anyhow::Error),
}

impl PlanError {
    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }
}
