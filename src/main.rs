//! skymarket - airline market data aggregation service
//!
//! Demonstration entry point: resolves configuration, builds the provider
//! chain, runs a flight search and a market-demand query for a sample
//! route, then trains a demand model on the resulting series and reports
//! its holdout metrics.

use anyhow::Result;
use chrono::{Duration, Utc};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use skymarket::demand::{Algorithm, DemandObservation, DemandPredictor, TreeParams};
use skymarket::providers::FlightQuery;
use skymarket::{DataService, ServiceConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting skymarket");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::var("SKYMARKET_CONFIG").ok();
    let config = ServiceConfig::resolve(config_path.as_deref().map(std::path::Path::new))
        .map_err(|e| anyhow::anyhow!("configuration: {}", e))?;

    if !config.gds_configured() && !config.tracker_configured() && !config.aggregator_configured()
    {
        warn!("No provider credentials configured; all responses will be synthetic");
    }

    let service = DataService::from_config(&config);

    // Sample route: Sydney to Melbourne, departing in two weeks
    let departure = Utc::now().date_naive() + Duration::days(14);
    let query = FlightQuery::new("SYD", "MEL", departure);

    let flights = service.search_flights(&query).await?;
    info!(
        count = flights.count(),
        source = %flights.metadata.source,
        mock = flights.metadata.is_mock,
        fallback = flights.metadata.fallback,
        "Flight search complete"
    );
    for warning in &flights.metadata.warnings {
        warn!(%warning, "Source degradation");
    }
    if let Some(offer) = flights.data.first() {
        info!(
            id = %offer.id,
            price = offer.price_total,
            currency = %offer.currency,
            segments = offer.segments.len(),
            "Cheapest-listed offer"
        );
    }

    let market = service.get_market_data("SYD", "MEL", 90).await?;
    info!(
        days = market.count(),
        source = %market.metadata.source,
        "Market demand series ready"
    );

    let observations: Vec<DemandObservation> =
        market.data.iter().map(DemandObservation::from).collect();
    let predictor = DemandPredictor::train(
        &observations,
        Algorithm::RandomForest,
        &TreeParams::default(),
    )?;
    info!(
        mae = predictor.report.mae,
        rmse = predictor.report.rmse,
        r2 = predictor.report.r2,
        train = predictor.report.train_size,
        test = predictor.report.test_size,
        "Demand model trained"
    );

    if let Ok(path) = std::env::var("SKYMARKET_MODEL_PATH") {
        predictor.save(std::path::Path::new(&path))?;
        info!(path = %path, "Model artifact saved");
    }

    Ok(())
}
