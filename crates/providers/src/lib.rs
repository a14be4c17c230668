pub mod gemini;
pub mod generate;
pub mod geocode;
pub mod nominatim;

pub use gemini::GeminiClient;
pub use generate::{FallbackConfig, FallbackEngine, GenerateError, GenerativeClient};
pub use geocode::{GeocodeConfig, GeocodePool, Geocoder};
pub use nominatim::NominatimClient;
