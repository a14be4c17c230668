use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{FieldError, PlanError};

/// Shape-level floor on the requested budget, below which the request is
/// rejected before any per-day policy runs.
pub const MIN_REQUEST_BUDGET: f64 = 1_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripStyle {
    Budget,
    Mid,
    Luxury,
}

impl TripStyle {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "budget" => Some(Self::Budget),
            "mid" => Some(Self::Mid),
            "luxury" => Some(Self::Luxury),
            _ => None,
        }
    }

    pub fn as_code(self) -> &'static str {
        match self {
            Self::Budget => "budget",
            Self::Mid => "mid",
            Self::Luxury => "luxury",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceCategory {
    Sightseeing,
    Food,
    Shopping,
    Adventure,
    Custom,
}

impl PlaceCategory {
    /// Generated drafts sometimes invent category labels; anything outside
    /// the known set degrades to sightseeing rather than failing the parse.
    pub fn normalize(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "food" => Self::Food,
            "shopping" => Self::Shopping,
            "adventure" => Self::Adventure,
            "custom" => Self::Custom,
            _ => Self::Sightseeing,
        }
    }
}

impl Default for PlaceCategory {
    fn default() -> Self {
        Self::Sightseeing
    }
}

impl<'de> Deserialize<'de> for PlaceCategory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::normalize(&raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceOrigin {
    Ai,
    User,
}

/// Caller-supplied trip parameters as they arrive on the wire, before any
/// field has been parsed or checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTripRequest {
    pub destination: String,
    pub start_date: String,
    pub end_date: String,
    pub budget: Option<f64>,
    pub trip_style: String,
    #[serde(default)]
    pub interests: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripRequest {
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub budget: f64,
    pub trip_style: TripStyle,
    pub interests: Vec<String>,
}

impl TripRequest {
    /// Validates the raw request field by field, collecting every problem
    /// instead of stopping at the first one.
    pub fn from_raw(raw: &RawTripRequest) -> Result<Self, PlanError> {
        let mut problems = Vec::new();

        let destination = raw.destination.trim().to_string();
        if destination.len() < 2 {
            problems.push(FieldError::new(
                "destination",
                "destination must be at least 2 characters",
            ));
        }

        let start_date = parse_date(&raw.start_date, "start_date", &mut problems);
        let end_date = parse_date(&raw.end_date, "end_date", &mut problems);
        if let (Some(start), Some(end)) = (start_date, end_date) {
            if end < start {
                problems.push(FieldError::new(
                    "end_date",
                    "end_date must not be before start_date",
                ));
            }
        }

        let budget = match raw.budget {
            Some(value) if value.is_finite() && value >= MIN_REQUEST_BUDGET => Some(value),
            Some(_) => {
                problems.push(FieldError::new(
                    "budget",
                    format!("budget must be a number of at least {}", MIN_REQUEST_BUDGET),
                ));
                None
            }
            None => {
                problems.push(FieldError::new("budget", "budget is required"));
                None
            }
        };

        let trip_style = TripStyle::parse(&raw.trip_style);
        if trip_style.is_none() {
            problems.push(FieldError::new(
                "trip_style",
                "trip_style must be one of budget, mid, luxury",
            ));
        }

        if !problems.is_empty() {
            return Err(PlanError::Validation(problems));
        }

        Ok(Self {
            destination,
            start_date: start_date.unwrap_or_default(),
            end_date: end_date.unwrap_or_default(),
            budget: budget.unwrap_or_default(),
            trip_style: trip_style.unwrap_or(TripStyle::Mid),
            interests: raw
                .interests
                .iter()
                .map(|tag| tag.trim().to_string())
                .filter(|tag| !tag.is_empty())
                .collect(),
        })
    }

    /// Whole trip length in days, inclusive of both endpoints. Never below 1.
    pub fn trip_days(&self) -> i64 {
        trip_length_days(self.start_date, self.end_date)
    }
}

pub fn trip_length_days(start: NaiveDate, end: NaiveDate) -> i64 {
    ((end - start).num_days() + 1).max(1)
}

fn parse_date(value: &str, field: &'static str, problems: &mut Vec<FieldError>) -> Option<NaiveDate> {
    match value.trim().parse::<NaiveDate>() {
        Ok(date) => Some(date),
        Err(_) => {
            problems.push(FieldError::new(field, "expected a YYYY-MM-DD date"));
            None
        }
    }
}

/// One AI-proposed place inside a day plan, not yet geocoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceCandidate {
    pub name: String,
    #[serde(default)]
    pub category: PlaceCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayPlan {
    pub day: u32,
    pub theme: String,
    #[serde(default)]
    pub morning: Vec<String>,
    #[serde(default)]
    pub afternoon: Vec<String>,
    #[serde(default)]
    pub evening: Vec<String>,
    #[serde(default)]
    pub places: Vec<PlaceCandidate>,
}

/// Structured itinerary as returned by the generative provider. Never
/// persisted on its own, only embedded inside a [`Trip`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItineraryDraft {
    pub title: String,
    pub overview: String,
    #[serde(default)]
    pub budget_breakdown: BTreeMap<String, f64>,
    #[serde(default)]
    pub transport_tips: Vec<String>,
    pub days: Vec<DayPlan>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// A place queued for geocoding, tagged with the day it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceSeed {
    pub name: String,
    pub day: u32,
    pub category: PlaceCategory,
    pub origin: PlaceOrigin,
}

impl PlaceSeed {
    /// The place as it would persist if geocoding resolves nothing.
    pub fn unresolved(&self) -> GeocodedPlace {
        GeocodedPlace {
            name: self.name.clone(),
            day: self.day,
            category: self.category,
            lat: None,
            lng: None,
            origin: self.origin,
        }
    }
}

/// Flattens every day's candidate list into a single ordered seed list,
/// tagged with its day number and an AI origin.
pub fn flatten_ai_places(days: &[DayPlan]) -> Vec<PlaceSeed> {
    days.iter()
        .flat_map(|plan| {
            plan.places.iter().map(|place| PlaceSeed {
                name: place.name.clone(),
                day: plan.day,
                category: place.category,
                origin: PlaceOrigin::Ai,
            })
        })
        .collect()
}

/// A place with resolved (or absent) coordinates. `lat` and `lng` are always
/// both present or both absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodedPlace {
    pub name: String,
    pub day: u32,
    pub category: PlaceCategory,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub origin: PlaceOrigin,
}

/// Fields of a user-submitted place, coordinates included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPlace {
    pub name: String,
    pub day: i64,
    pub category: Option<String>,
    pub lat: f64,
    pub lng: f64,
}

/// The persisted trip aggregate. Created once with itinerary and places
/// populated together; mutated afterwards only through day regeneration and
/// user place additions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub trip_id: String,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub budget: f64,
    pub trip_style: TripStyle,
    pub interests: Vec<String>,
    pub itinerary: ItineraryDraft,
    pub places: Vec<GeocodedPlace>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    pub fn create(request: TripRequest, itinerary: ItineraryDraft, places: Vec<GeocodedPlace>) -> Self {
        let now = Utc::now();
        Self {
            trip_id: Uuid::new_v4().to_string(),
            destination: request.destination,
            start_date: request.start_date,
            end_date: request.end_date,
            budget: request.budget,
            trip_style: request.trip_style,
            interests: request.interests,
            itinerary,
            places,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn day_count(&self) -> usize {
        self.itinerary.days.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_request() -> RawTripRequest {
        RawTripRequest {
            destination: "Goa".to_string(),
            start_date: "2024-01-10".to_string(),
            end_date: "2024-01-12".to_string(),
            budget: Some(20_000.0),
            trip_style: "mid".to_string(),
            interests: vec!["beaches".to_string()],
        }
    }

    #[test]
    fn parses_valid_request() {
        let request = TripRequest::from_raw(&raw_request()).expect("request should parse");
        assert_eq!(request.trip_style, TripStyle::Mid);
        assert_eq!(request.trip_days(), 3);
    }

    #[test]
    fn single_day_trip_counts_one_day() {
        let mut raw = raw_request();
        raw.end_date = raw.start_date.clone();
        let request = TripRequest::from_raw(&raw).expect("request should parse");
        assert_eq!(request.trip_days(), 1);
    }

    #[test]
    fn collects_every_field_problem() {
        let raw = RawTripRequest {
            destination: "x".to_string(),
            start_date: "not-a-date".to_string(),
            end_date: "2024-01-12".to_string(),
            budget: Some(50.0),
            trip_style: "royal".to_string(),
            interests: Vec::new(),
        };

        let error = TripRequest::from_raw(&raw).expect_err("request should be rejected");
        let PlanError::Validation(problems) = error else {
            panic!("expected a validation error");
        };
        let fields: Vec<&str> = problems.iter().map(|p| p.field).collect();
        assert!(fields.contains(&"destination"));
        assert!(fields.contains(&"start_date"));
        assert!(fields.contains(&"budget"));
        assert!(fields.contains(&"trip_style"));
    }

    #[test]
    fn rejects_end_before_start() {
        let mut raw = raw_request();
        raw.start_date = "2024-01-12".to_string();
        raw.end_date = "2024-01-10".to_string();
        assert!(TripRequest::from_raw(&raw).is_err());
    }

    #[test]
    fn unknown_place_category_degrades_to_sightseeing() {
        let place: PlaceCandidate =
            serde_json::from_str(r#"{ "name": "Louvre", "category": "museum" }"#).unwrap();
        assert_eq!(place.category, PlaceCategory::Sightseeing);
    }

    #[test]
    fn flatten_tags_places_with_their_day() {
        let days = vec![
            DayPlan {
                day: 1,
                theme: "Old town".to_string(),
                morning: Vec::new(),
                afternoon: Vec::new(),
                evening: Vec::new(),
                places: vec![PlaceCandidate {
                    name: "Fort".to_string(),
                    category: PlaceCategory::Sightseeing,
                }],
            },
            DayPlan {
                day: 2,
                theme: "Markets".to_string(),
                morning: Vec::new(),
                afternoon: Vec::new(),
                evening: Vec::new(),
                places: vec![PlaceCandidate {
                    name: "Bazaar".to_string(),
                    category: PlaceCategory::Shopping,
                }],
            },
        ];

        let seeds = flatten_ai_places(&days);
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0].day, 1);
        assert_eq!(seeds[1].day, 2);
        assert!(seeds.iter().all(|seed| seed.origin == PlaceOrigin::Ai));
    }
}
