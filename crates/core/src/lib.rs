pub mod error;
pub mod models;
pub mod policy;
pub mod prompt;

pub use error::{FieldError, PlanError};
pub use models::*;
pub use policy::BudgetPolicy;
pub use prompt::{render_day_prompt, render_itinerary_prompt};
