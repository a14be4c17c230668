use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::RwLock;
use sqlx::{Row, SqlitePool};
use tripwise_core::{Trip, TripStyle};

/// Persistence boundary for the trip aggregate: create once, fetch by id,
/// replace in full on save.
pub trait TripRepository: Send + Sync {
    async fn create_trip(&self, trip: &Trip) -> Result<()>;
    async fn find_trip(&self, trip_id: &str) -> Result<Option<Trip>>;
    async fn save_trip(&self, trip: &Trip) -> Result<()>;
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    trips: Arc<RwLock<HashMap<String, Trip>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TripRepository for MemoryStore {
    async fn create_trip(&self, trip: &Trip) -> Result<()> {
        self.trips
            .write()
            .insert(trip.trip_id.clone(), trip.clone());
        Ok(())
    }

    async fn find_trip(&self, trip_id: &str) -> Result<Option<Trip>> {
        Ok(self.trips.read().get(trip_id).cloned())
    }

    async fn save_trip(&self, trip: &Trip) -> Result<()> {
        self.trips
            .write()
            .insert(trip.trip_id.clone(), trip.clone());
        Ok(())
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .with_context(|| format!("failed connecting to sqlite at {}", database_url))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trips (
              trip_id TEXT PRIMARY KEY,
              destination TEXT NOT NULL,
              start_date TEXT NOT NULL,
              end_date TEXT NOT NULL,
              budget REAL NOT NULL,
              trip_style TEXT NOT NULL,
              interests_json TEXT NOT NULL,
              itinerary_json TEXT NOT NULL,
              places_json TEXT NOT NULL,
              created_at TEXT NOT NULL,
              updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert(&self, trip: &Trip) -> Result<()> {
        let interests_json = serde_json::to_string(&trip.interests)?;
        let itinerary_json = serde_json::to_string(&trip.itinerary)?;
        let places_json = serde_json::to_string(&trip.places)?;

        sqlx::query(
            r#"
            INSERT INTO trips (
              trip_id, destination, start_date, end_date, budget, trip_style,
              interests_json, itinerary_json, places_json, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(trip_id) DO UPDATE SET
              destination=excluded.destination,
              start_date=excluded.start_date,
              end_date=excluded.end_date,
              budget=excluded.budget,
              trip_style=excluded.trip_style,
              interests_json=excluded.interests_json,
              itinerary_json=excluded.itinerary_json,
              places_json=excluded.places_json,
              updated_at=excluded.updated_at
            "#,
        )
        .bind(&trip.trip_id)
        .bind(&trip.destination)
        .bind(trip.start_date.to_string())
        .bind(trip.end_date.to_string())
        .bind(trip.budget)
        .bind(trip.trip_style.as_code())
        .bind(interests_json)
        .bind(itinerary_json)
        .bind(places_json)
        .bind(trip.created_at.to_rfc3339())
        .bind(trip.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl TripRepository for SqliteStore {
    async fn create_trip(&self, trip: &Trip) -> Result<()> {
        self.upsert(trip).await
    }

    async fn find_trip(&self, trip_id: &str) -> Result<Option<Trip>> {
        let row = sqlx::query(
            r#"
            SELECT trip_id, destination, start_date, end_date, budget, trip_style,
                   interests_json, itinerary_json, places_json, created_at, updated_at
            FROM trips
            WHERE trip_id = ?1
            "#,
        )
        .bind(trip_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let itinerary_json: String = row.get("itinerary_json");
        let places_json: String = row.get("places_json");
        let interests_json: String = row.get("interests_json");

        let trip = Trip {
            trip_id: row.get("trip_id"),
            destination: row.get("destination"),
            start_date: row
                .get::<String, _>("start_date")
                .parse()
                .context("persisted start_date does not parse")?,
            end_date: row
                .get::<String, _>("end_date")
                .parse()
                .context("persisted end_date does not parse")?,
            budget: row.get("budget"),
            trip_style: TripStyle::parse(&row.get::<String, _>("trip_style"))
                .unwrap_or(TripStyle::Mid),
            interests: serde_json::from_str(&interests_json)
                .context("persisted interests do not parse")?,
            itinerary: serde_json::from_str(&itinerary_json)
                .context("persisted itinerary does not parse")?,
            places: serde_json::from_str(&places_json)
                .context("persisted places do not parse")?,
            created_at: row
                .get::<String, _>("created_at")
                .parse()
                .unwrap_or_else(|_| Utc::now()),
            updated_at: row
                .get::<String, _>("updated_at")
                .parse()
                .unwrap_or_else(|_| Utc::now()),
        };

        Ok(Some(trip))
    }

    async fn save_trip(&self, trip: &Trip) -> Result<()> {
        self.upsert(trip).await
    }
}

#[derive(Clone)]
pub enum Store {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl Store {
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    pub async fn sqlite(database_url: &str) -> Result<Self> {
        let sqlite = SqliteStore::connect(database_url).await?;
        Ok(Self::Sqlite(sqlite))
    }
}

impl TripRepository for Store {
    async fn create_trip(&self, trip: &Trip) -> Result<()> {
        match self {
            Store::Memory(store) => store.create_trip(trip).await,
            Store::Sqlite(store) => store.create_trip(trip).await,
        }
    }

    async fn find_trip(&self, trip_id: &str) -> Result<Option<Trip>> {
        match self {
            Store::Memory(store) => store.find_trip(trip_id).await,
            Store::Sqlite(store) => store.find_trip(trip_id).await,
        }
    }

    async fn save_trip(&self, trip: &Trip) -> Result<()> {
        match self {
            Store::Memory(store) => store.save_trip(trip).await,
            Store::Sqlite(store) => store.save_trip(trip).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tripwise_core::{
        DayPlan, GeocodedPlace, ItineraryDraft, PlaceCategory, PlaceOrigin, RawTripRequest,
        TripRequest,
    };

    use super::*;

    fn sample_trip() -> Trip {
        let request = TripRequest::from_raw(&RawTripRequest {
            destination: "Goa".to_string(),
            start_date: "2024-01-10".to_string(),
            end_date: "2024-01-12".to_string(),
            budget: Some(20_000.0),
            trip_style: "mid".to_string(),
            interests: vec!["beaches".to_string()],
        })
        .expect("request should parse");

        let itinerary = ItineraryDraft {
            title: "Goa getaway".to_string(),
            overview: "Three laid-back days".to_string(),
            budget_breakdown: BTreeMap::from([("stay".to_string(), 8_000.0)]),
            transport_tips: vec!["rent a scooter".to_string()],
            days: vec![DayPlan {
                day: 1,
                theme: "Beaches".to_string(),
                morning: vec!["Swim".to_string()],
                afternoon: Vec::new(),
                evening: Vec::new(),
                places: Vec::new(),
            }],
        };

        let places = vec![GeocodedPlace {
            name: "Baga Beach".to_string(),
            day: 1,
            category: PlaceCategory::Sightseeing,
            lat: Some(15.55),
            lng: Some(73.75),
            origin: PlaceOrigin::Ai,
        }];

        Trip::create(request, itinerary, places)
    }

    #[tokio::test]
    async fn memory_store_round_trips_a_trip() {
        let store = MemoryStore::new();
        let trip = sample_trip();

        store.create_trip(&trip).await.unwrap();
        let loaded = store
            .find_trip(&trip.trip_id)
            .await
            .unwrap()
            .expect("trip should exist");

        assert_eq!(loaded.destination, "Goa");
        assert_eq!(loaded.places.len(), 1);
        assert!(store.find_trip("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sqlite_store_round_trips_a_trip() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        let trip = sample_trip();

        store.create_trip(&trip).await.unwrap();
        let loaded = store
            .find_trip(&trip.trip_id)
            .await
            .unwrap()
            .expect("trip should exist");

        assert_eq!(loaded.trip_id, trip.trip_id);
        assert_eq!(loaded.start_date, trip.start_date);
        assert_eq!(loaded.itinerary.days.len(), 1);
        assert_eq!(loaded.places[0].lat, Some(15.55));
    }

    #[tokio::test]
    async fn corrupt_places_column_surfaces_an_error() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        let trip = sample_trip();
        store.create_trip(&trip).await.unwrap();

        sqlx::query("UPDATE trips SET places_json = 'not json' WHERE trip_id = ?1")
            .bind(&trip.trip_id)
            .execute(store.pool())
            .await
            .unwrap();

        assert!(store.find_trip(&trip.trip_id).await.is_err());
    }

    #[tokio::test]
    async fn sqlite_save_replaces_mutable_fields() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        let mut trip = sample_trip();
        store.create_trip(&trip).await.unwrap();

        trip.places.clear();
        trip.itinerary.title = "Revised".to_string();
        trip.updated_at = Utc::now();
        store.save_trip(&trip).await.unwrap();

        let loaded = store.find_trip(&trip.trip_id).await.unwrap().unwrap();
        assert!(loaded.places.is_empty());
        assert_eq!(loaded.itinerary.title, "Revised");
    }
}
