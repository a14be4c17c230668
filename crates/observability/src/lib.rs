use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    plans_created_total: AtomicU64,
    day_regens_total: AtomicU64,
    places_added_total: AtomicU64,
    model_calls_total: AtomicU64,
    model_retries_total: AtomicU64,
    geocode_calls_total: AtomicU64,
    geocode_misses_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub plans_created_total: u64,
    pub day_regens_total: u64,
    pub places_added_total: u64,
    pub model_calls_total: u64,
    pub model_retries_total: u64,
    pub geocode_calls_total: u64,
    pub geocode_misses_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_plan_created(&self) {
        self.plans_created_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_day_regen(&self) {
        self.day_regens_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_place_added(&self) {
        self.places_added_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_model_call(&self) {
        self.model_calls_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_model_retry(&self) {
        self.model_retries_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_geocode_call(&self) {
        self.geocode_calls_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_geocode_miss(&self) {
        self.geocode_misses_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: requests,
            plans_created_total: self.plans_created_total.load(Ordering::Relaxed),
            day_regens_total: self.day_regens_total.load(Ordering::Relaxed),
            places_added_total: self.places_added_total.load(Ordering::Relaxed),
            model_calls_total: self.model_calls_total.load(Ordering::Relaxed),
            model_retries_total: self.model_retries_total.load(Ordering::Relaxed),
            geocode_calls_total: self.geocode_calls_total.load(Ordering::Relaxed),
            geocode_misses_total: self.geocode_misses_total.load(Ordering::Relaxed),
            avg_latency_millis: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,tripwise_api=info,tripwise_planner=info,tripwise_providers=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();
    });
}
