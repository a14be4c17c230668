use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Client;
use tripwise_core::{NewPlace, RawTripRequest};
use tripwise_observability::{init_tracing, AppMetrics};
use tripwise_planner::TripPlanner;
use tripwise_providers::{
    FallbackConfig, FallbackEngine, GeminiClient, GeocodeConfig, GeocodePool, NominatimClient,
};
use tripwise_storage::Store;

#[derive(Debug, Parser)]
#[command(name = "tripwise")]
#[command(about = "TripWise trip planning CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Plan a new trip and print its identifier.
    Plan {
        #[arg(long)]
        destination: String,
        #[arg(long)]
        start_date: String,
        #[arg(long)]
        end_date: String,
        #[arg(long)]
        budget: f64,
        #[arg(long, default_value = "mid")]
        style: String,
        #[arg(long)]
        interest: Vec<String>,
    },
    /// Print a stored trip as JSON.
    Show { trip_id: String },
    /// Regenerate a single day of a stored trip.
    RegenerateDay {
        trip_id: String,
        #[arg(long)]
        day: i64,
    },
    /// Pin a custom place onto a stored trip.
    AddPlace {
        trip_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        day: i64,
        #[arg(long)]
        lat: f64,
        #[arg(long)]
        lng: f64,
        #[arg(long)]
        category: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("tripwise_cli");
    let cli = Cli::parse();

    let planner = build_planner().await?;

    match cli.command {
        Command::Plan {
            destination,
            start_date,
            end_date,
            budget,
            style,
            interest,
        } => {
            let trip_id = planner
                .plan_trip(&RawTripRequest {
                    destination,
                    start_date,
                    end_date,
                    budget: Some(budget),
                    trip_style: style,
                    interests: interest,
                })
                .await?;
            println!("{trip_id}");
        }
        Command::Show { trip_id } => {
            let trip = planner.get_trip(&trip_id).await?;
            println!("{}", serde_json::to_string_pretty(&trip)?);
        }
        Command::RegenerateDay { trip_id, day } => {
            let updated_day = planner.regenerate_day(&trip_id, day).await?;
            println!("{}", serde_json::to_string_pretty(&updated_day)?);
        }
        Command::AddPlace {
            trip_id,
            name,
            day,
            lat,
            lng,
            category,
        } => {
            let places = planner
                .add_place(
                    &trip_id,
                    &NewPlace {
                        name,
                        day,
                        category,
                        lat,
                        lng,
                    },
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&places)?);
        }
    }

    Ok(())
}

async fn build_planner() -> Result<TripPlanner<Store>> {
    let metrics = AppMetrics::shared();

    let store = if let Ok(database_url) = env::var("TRIPWISE_DATABASE_URL") {
        Store::sqlite(&database_url).await?
    } else {
        Store::memory()
    };

    let http_client = Client::builder()
        .connect_timeout(Duration::from_secs(6))
        .timeout(Duration::from_secs(60))
        .build()
        .context("failed to build HTTP client")?;

    let gemini_api_key = env::var("GEMINI_API_KEY").unwrap_or_default();
    let gemini = GeminiClient::new(http_client.clone(), gemini_api_key);

    let engine = FallbackEngine::new(
        FallbackConfig::default(),
        Arc::new(gemini),
        metrics.clone(),
    );
    let pool = GeocodePool::new(
        GeocodeConfig::default(),
        Arc::new(NominatimClient::new(http_client)),
        metrics.clone(),
    );

    Ok(TripPlanner::new(engine, pool, Arc::new(store), metrics))
}
