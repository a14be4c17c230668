use crate::error::PlanError;

/// Minimum per-day budget floors in rupees, picked by destination keyword.
const EXPENSIVE_MIN_PER_DAY: i64 = 9_000;
const MID_MIN_PER_DAY: i64 = 3_500;
const DEFAULT_MIN_PER_DAY: i64 = 1_500;

const EXPENSIVE_DESTINATIONS: &[&str] = &[
    "usa",
    "united states",
    "uk",
    "united kingdom",
    "london",
    "japan",
    "tokyo",
    "europe",
    "paris",
    "germany",
    "france",
    "italy",
    "switzerland",
    "canada",
    "australia",
];

const MID_DESTINATIONS: &[&str] = &[
    "thailand",
    "bali",
    "indonesia",
    "vietnam",
    "malaysia",
    "singapore",
    "dubai",
];

/// Budget realism gate: classifies the destination text by keyword and
/// rejects requests whose budget cannot cover the floor for the trip length.
#[derive(Debug, Clone, Default)]
pub struct BudgetPolicy;

impl BudgetPolicy {
    pub fn new() -> Self {
        Self
    }

    pub fn min_per_day(&self, destination: &str) -> i64 {
        let lower = destination.to_lowercase();
        if EXPENSIVE_DESTINATIONS.iter().any(|k| lower.contains(k)) {
            EXPENSIVE_MIN_PER_DAY
        } else if MID_DESTINATIONS.iter().any(|k| lower.contains(k)) {
            MID_MIN_PER_DAY
        } else {
            DEFAULT_MIN_PER_DAY
        }
    }

    pub fn evaluate(&self, destination: &str, budget: f64, days: i64) -> Result<(), PlanError> {
        let minimum = self.min_per_day(destination) * days;
        if budget < minimum as f64 {
            return Err(PlanError::BudgetTooLow {
                destination: destination.to_string(),
                minimum,
                days,
            });
        }
        Ok(())
    }
}
