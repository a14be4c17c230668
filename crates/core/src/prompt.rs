use crate::models::{Trip, TripRequest};

/// Renders the full-itinerary prompt. The schema block doubles as the output
/// contract the fallback engine validates against.
pub fn render_itinerary_prompt(request: &TripRequest) -> String {
    let interests = if request.interests.is_empty() {
        "general".to_string()
    } else {
        request.interests.join(", ")
    };

    format!(
        r#"Return ONLY valid JSON. No markdown. No explanation.

Schema:
{{
  "title": string,
  "overview": string,
  "budget_breakdown": {{ "stay": number, "food": number, "transport": number, "activities": number }},
  "transport_tips": string[],
  "days": [
    {{
      "day": number,
      "theme": string,
      "morning": string[],
      "afternoon": string[],
      "evening": string[],
      "places": [{{ "name": string, "category": "sightseeing"|"food"|"shopping"|"adventure" }}]
    }}
  ]
}}

Trip:
Destination: {destination}
Dates: {start} to {end}
Budget: {budget}
Style: {style}
Interests: {interests}

Rules:
- realistic plan
- not overloaded
- real places only
- budget_breakdown should roughly match total budget
"#,
        destination = request.destination,
        start = request.start_date,
        end = request.end_date,
        budget = request.budget,
        style = request.trip_style.as_code(),
        interests = interests,
    )
}

/// Renders the day-scoped prompt used by day regeneration. The existing plan
/// for that day is included as a non-binding reference.
pub fn render_day_prompt(trip: &Trip, day: u32) -> String {
    let interests = if trip.interests.is_empty() {
        "general".to_string()
    } else {
        trip.interests.join(", ")
    };

    let existing = trip
        .itinerary
        .days
        .iter()
        .find(|plan| plan.day == day)
        .and_then(|plan| serde_json::to_string_pretty(plan).ok())
        .unwrap_or_else(|| "{}".to_string());

    format!(
        r#"Return ONLY valid JSON. No markdown.

Rewrite ONLY Day {day} itinerary (do not return full itinerary).

Day object schema:
{{
  "day": number,
  "theme": string,
  "morning": string[],
  "afternoon": string[],
  "evening": string[],
  "places": [{{ "name": string, "category": "sightseeing"|"food"|"shopping"|"adventure" }}]
}}

Trip details:
Destination: {destination}
Budget: {budget}
Trip Style: {style}
Interests: {interests}

Existing Day {day} (reference):
{existing}

Rules:
- realistic, not overloaded
- must contain real places
- output ONLY the day object as JSON
"#,
        day = day,
        destination = trip.destination,
        budget = trip.budget,
        style = trip.trip_style.as_code(),
        interests = interests,
        existing = existing,
    )
}
