use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument};
use tripwise_core::{
    flatten_ai_places, render_day_prompt, render_itinerary_prompt, BudgetPolicy, DayPlan,
    GeocodedPlace, NewPlace, PlaceCategory, PlaceOrigin, PlanError, RawTripRequest, Trip,
    TripRequest,
};
use tripwise_observability::AppMetrics;
use tripwise_providers::{FallbackEngine, GenerateError, GeocodePool};
use tripwise_storage::TripRepository;

/// Drives the planning pipeline end to end: validation, budget policy, model
/// fallback, geocoding, and aggregate persistence. Providers and the store
/// are injected at construction so tests can substitute fakes.
pub struct TripPlanner<S: TripRepository> {
    engine: FallbackEngine,
    geocoder: GeocodePool,
    policy: BudgetPolicy,
    store: Arc<S>,
    metrics: Arc<AppMetrics>,
}

impl<S: TripRepository> TripPlanner<S> {
    pub fn new(
        engine: FallbackEngine,
        geocoder: GeocodePool,
        store: Arc<S>,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            engine,
            geocoder,
            policy: BudgetPolicy::new(),
            store,
            metrics,
        }
    }

    /// Turns a raw trip request into a persisted, geocoded trip and returns
    /// its identifier.
    #[instrument(skip(self, raw), fields(destination = %raw.destination))]
    pub async fn plan_trip(&self, raw: &RawTripRequest) -> Result<String, PlanError> {
        let started = Instant::now();
        self.metrics.inc_request();

        let request = TripRequest::from_raw(raw)?;
        let days = request.trip_days();
        self.policy
            .evaluate(&request.destination, request.budget, days)?;

        let prompt = render_itinerary_prompt(&request);
        let itinerary = self
            .engine
            .generate_itinerary(&prompt)
            .await
            .map_err(upstream_error)?;

        let seeds = flatten_ai_places(&itinerary.days);
        let places = self.geocoder.resolve(&seeds, &request.destination).await;

        let trip = Trip::create(request, itinerary, places);
        self.store
            .create_trip(&trip)
            .await
            .map_err(PlanError::Persistence)?;

        self.metrics.inc_plan_created();
        self.metrics.observe_latency(started.elapsed());
        info!(
            trip_id = %trip.trip_id,
            days,
            places = trip.places.len(),
            "trip plan created"
        );

        Ok(trip.trip_id)
    }

    pub async fn get_trip(&self, trip_id: &str) -> Result<Trip, PlanError> {
        self.metrics.inc_request();
        self.store
            .find_trip(trip_id)
            .await
            .map_err(PlanError::Persistence)?
            .ok_or(PlanError::NotFound)
    }

    /// Regenerates one day's plan and places, leaving every other day
    /// untouched. The merged aggregate is computed in full before the single
    /// persistence write.
    #[instrument(skip(self))]
    pub async fn regenerate_day(&self, trip_id: &str, day: i64) -> Result<DayPlan, PlanError> {
        let started = Instant::now();
        self.metrics.inc_request();

        if day < 1 {
            return Err(PlanError::field("day", "day must be a positive integer"));
        }

        let mut trip = self
            .store
            .find_trip(trip_id)
            .await
            .map_err(PlanError::Persistence)?
            .ok_or(PlanError::NotFound)?;

        // Range-checked before narrowing, so oversized wire values can never
        // wrap around onto a real day.
        let total_days = trip.day_count();
        if day > total_days as i64 {
            return Err(PlanError::field(
                "day",
                format!("trip has only {total_days} days"),
            ));
        }
        let day = day as u32;

        let prompt = render_day_prompt(&trip, day);
        let mut new_plan = self
            .engine
            .generate_day(&prompt)
            .await
            .map_err(upstream_error)?;
        // Keep the trip invariant even when the model mislabels the day.
        new_plan.day = day;

        let updated_days: Vec<DayPlan> = trip
            .itinerary
            .days
            .iter()
            .map(|existing| {
                if existing.day == day {
                    new_plan.clone()
                } else {
                    existing.clone()
                }
            })
            .collect();

        // Drops every place tagged with the day, user pins included.
        let mut updated_places: Vec<GeocodedPlace> = trip
            .places
            .iter()
            .filter(|place| place.day != day)
            .cloned()
            .collect();

        let seeds = flatten_ai_places(std::slice::from_ref(&new_plan));
        let regenerated = self.geocoder.resolve(&seeds, &trip.destination).await;
        updated_places.extend(regenerated);

        trip.itinerary.days = updated_days;
        trip.places = updated_places;
        trip.updated_at = Utc::now();
        self.store
            .save_trip(&trip)
            .await
            .map_err(PlanError::Persistence)?;

        self.metrics.inc_day_regen();
        self.metrics.observe_latency(started.elapsed());
        info!(trip_id = %trip.trip_id, day, "day regenerated");

        Ok(new_plan)
    }

    /// Appends a user-submitted place to the trip and returns the full place
    /// list. Duplicates are allowed by design.
    #[instrument(skip(self, place), fields(place = %place.name))]
    pub async fn add_place(
        &self,
        trip_id: &str,
        place: &NewPlace,
    ) -> Result<Vec<GeocodedPlace>, PlanError> {
        self.metrics.inc_request();

        if place.name.trim().is_empty() {
            return Err(PlanError::field("name", "place name is required"));
        }
        if place.day < 1 {
            return Err(PlanError::field("day", "day must be a positive integer"));
        }
        if !place.lat.is_finite() || !place.lng.is_finite() {
            return Err(PlanError::field("lat", "lat and lng must be finite numbers"));
        }

        let mut trip = self
            .store
            .find_trip(trip_id)
            .await
            .map_err(PlanError::Persistence)?
            .ok_or(PlanError::NotFound)?;

        let total_days = trip.day_count();
        if place.day > total_days as i64 {
            return Err(PlanError::field(
                "day",
                format!("trip has only {total_days} days"),
            ));
        }

        let category = place
            .category
            .as_deref()
            .map(PlaceCategory::normalize)
            .unwrap_or(PlaceCategory::Custom);

        trip.places.push(GeocodedPlace {
            name: place.name.trim().to_string(),
            day: place.day as u32,
            category,
            lat: Some(place.lat),
            lng: Some(place.lng),
            origin: PlaceOrigin::User,
        });
        trip.updated_at = Utc::now();

        self.store
            .save_trip(&trip)
            .await
            .map_err(PlanError::Persistence)?;

        self.metrics.inc_place_added();
        info!(trip_id = %trip.trip_id, day = place.day, "user place added");

        Ok(trip.places)
    }
}

fn upstream_error(error: GenerateError) -> PlanError {
    match error {
        GenerateError::Overloaded(message) => PlanError::UpstreamOverloaded(message),
        GenerateError::Malformed(message) | GenerateError::Fatal(message) => {
            PlanError::UpstreamFatal(message)
        }
    }
}
