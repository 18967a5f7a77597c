//! End-to-end service tests
//!
//! Exercise the public surface the way a consumer would: orchestrated
//! queries degrading to synthetic data, post-filters, and the demand model
//! trained on an orchestrated market series.

use chrono::{Duration, NaiveDate, Utc};

use skymarket::demand::{Algorithm, DemandObservation, DemandPredictor, TreeParams};
use skymarket::orchestrator::DataService;
use skymarket::providers::{AirportQuery, FlightQuery};
use skymarket::synthetic::SyntheticDataProvider;
use skymarket::ServiceError;

fn service() -> DataService {
    DataService::with_providers(Vec::new(), SyntheticDataProvider::with_seed(7))
}

#[tokio::test]
async fn flight_search_degrades_to_synthetic_with_provenance() {
    let svc = service();
    let date = Utc::now().date_naive() + Duration::days(7);
    let response = svc
        .search_flights(&FlightQuery::new("SYD", "MEL", date))
        .await
        .unwrap();

    assert!(!response.data.is_empty());
    assert!(response.metadata.is_mock);
    assert!(response.metadata.fallback);
    assert_eq!(response.metadata.source, "synthetic");
    assert!(!response.metadata.warnings.is_empty());

    for offer in &response.data {
        assert_eq!(offer.segments[0].origin, "SYD");
        assert_eq!(offer.segments[0].destination, "MEL");
        assert!(offer.price_total > 0.0);
    }
}

#[tokio::test]
async fn price_cap_filters_synthetic_offers_too() {
    let svc = service();
    let date = Utc::now().date_naive() + Duration::days(7);
    let mut query = FlightQuery::new("SYD", "MEL", date);
    query.max_price = Some(250.0);

    let response = svc.search_flights(&query).await.unwrap();
    assert!(response
        .data
        .iter()
        .all(|o| o.price_total <= 250.0 || o.price_total <= 0.0));
}

#[tokio::test]
async fn validation_errors_surface_instead_of_fallback() {
    let svc = service();
    let date = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();

    let err = svc
        .search_flights(&FlightQuery::new("12", "MEL", date))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let mut backwards = FlightQuery::new("SYD", "MEL", date);
    backwards.return_date = Some(date - Duration::days(3));
    assert!(svc.search_flights(&backwards).await.is_err());
}

#[tokio::test]
async fn airport_directory_serves_filtered_reference_data() {
    let svc = service();

    let all = svc.get_airports(&AirportQuery::default()).await.unwrap();
    assert_eq!(all.count(), 10);

    let by_code = svc
        .get_airports(&AirportQuery {
            iata: Some("MEL".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_code.count(), 1);
    assert_eq!(by_code.data[0].city, "Melbourne");
}

#[tokio::test]
async fn demand_model_trains_on_orchestrated_market_series() {
    let svc = service();
    let market = svc.get_market_data("SYD", "MEL", 90).await.unwrap();
    assert_eq!(market.count(), 90);

    let observations: Vec<DemandObservation> =
        market.data.iter().map(DemandObservation::from).collect();
    let predictor = DemandPredictor::train(
        &observations,
        Algorithm::GradientBoosting,
        &TreeParams {
            n_trees: 30,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(predictor.report.train_size, 72);
    assert_eq!(predictor.report.test_size, 18);
    assert!(predictor.report.rmse.is_finite());

    // Persist and restore through the artifact path
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    predictor.save(&path).unwrap();
    let restored = DemandPredictor::load(&path).unwrap();

    let before = predictor.predict(&observations);
    let after = restored.predict(&observations);
    assert_eq!(before.len(), 90);
    for (a, b) in before.iter().zip(&after) {
        assert!((a - b).abs() < 1e-9);
    }
}

#[tokio::test]
async fn historical_flights_feed_the_analytics_engine() {
    let svc = service();
    let records = svc.historical_flights("SYD", "MEL", 30, 200).unwrap();
    assert!(!records.is_empty());

    let trends = skymarket::analytics::calculate_market_trends(&records, "week").unwrap();
    assert!(!trends.is_empty());
    assert!(trends.iter().all(|t| t.price.is_some()));

    let anomalies = skymarket::analytics::detect_price_anomalies(&records, 7, 2.0);
    assert_eq!(anomalies.len(), records.len());
}

#[tokio::test]
async fn destination_analytics_fall_back_to_synthetic_insights() {
    let svc = service();
    let response = svc.get_destination_analytics("SYD", "2026-06").await.unwrap();
    assert!(response.metadata.is_mock);
    assert_eq!(response.count(), 5);
    assert!(response.data.iter().all(|i| i.destination != "SYD"));
}
