use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use tracing::debug;
use tripwise_core::{Coordinates, GeocodedPlace, PlaceSeed};
use tripwise_observability::AppMetrics;

/// One coordinate lookup: search query in, first match out. Errors are the
/// caller's concern; the pool absorbs them into unresolved places.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn lookup(&self, query: &str) -> anyhow::Result<Option<Coordinates>>;
}

#[derive(Debug, Clone)]
pub struct GeocodeConfig {
    /// Number of concurrent workers draining the shared seed list.
    pub concurrency: usize,
    /// Minimum pause each worker takes before issuing its network call,
    /// keeping the batch inside the provider's acceptable-use rate.
    pub call_delay: Duration,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            call_delay: Duration::from_millis(350),
        }
    }
}

/// Bounded-concurrency geocoding pool. Workers claim indexes from a shared
/// atomic cursor, so each seed is looked up exactly once and the result list
/// keeps the input order regardless of which worker finishes when.
pub struct GeocodePool {
    config: GeocodeConfig,
    client: Arc<dyn Geocoder>,
    metrics: Arc<AppMetrics>,
}

impl GeocodePool {
    pub fn new(config: GeocodeConfig, client: Arc<dyn Geocoder>, metrics: Arc<AppMetrics>) -> Self {
        Self {
            config,
            client,
            metrics,
        }
    }

    /// Resolves every seed to a place, unresolved on miss or lookup failure.
    /// `results[i]` always corresponds to `seeds[i]`.
    pub async fn resolve(&self, seeds: &[PlaceSeed], destination: &str) -> Vec<GeocodedPlace> {
        if seeds.is_empty() {
            return Vec::new();
        }

        let cursor = AtomicUsize::new(0);
        let slots: Mutex<Vec<Option<GeocodedPlace>>> = Mutex::new(vec![None; seeds.len()]);

        let worker_count = self.config.concurrency.max(1).min(seeds.len());
        let workers = (0..worker_count).map(|_| async {
            loop {
                let index = cursor.fetch_add(1, Ordering::SeqCst);
                if index >= seeds.len() {
                    break;
                }

                let seed = &seeds[index];
                tokio::time::sleep(self.config.call_delay).await;
                self.metrics.inc_geocode_call();

                let query = format!("{}, {}", seed.name, destination);
                let place = match self.client.lookup(&query).await {
                    Ok(Some(coords)) => GeocodedPlace {
                        lat: Some(coords.lat),
                        lng: Some(coords.lng),
                        ..seed.unresolved()
                    },
                    Ok(None) => {
                        self.metrics.inc_geocode_miss();
                        seed.unresolved()
                    }
                    Err(error) => {
                        self.metrics.inc_geocode_miss();
                        debug!(place = %seed.name, error = %error, "geocode lookup failed");
                        seed.unresolved()
                    }
                };

                slots.lock()[index] = Some(place);
            }
        });

        join_all(workers).await;

        slots
            .into_inner()
            .into_iter()
            .map(|slot| slot.expect("every index is claimed exactly once"))
            .collect()
    }
}
