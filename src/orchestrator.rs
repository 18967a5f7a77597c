//! Fallback orchestrator
//!
//! Walks the configured providers in priority order and degrades to the
//! synthetic generator when every live source fails or returns nothing.
//! Provider errors never escape: the only errors callers see are input
//! validation failures. Every response carries provenance metadata so a
//! consumer can tell live, fallback and synthetic data apart.

use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};

use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    Airport, AirportAnalytics, FlightOffer, MarketDataPoint, ResponseMetadata, SourcedResponse,
};
use crate::providers::{
    AggregatorClient, AirportQuery, DestinationInsight, FlightProvider, FlightQuery, GdsClient,
    TrackerClient,
};
use crate::synthetic::SyntheticDataProvider;

/// Aggregates flight and market data across providers with synthetic
/// fallback.
pub struct DataService {
    providers: Vec<Arc<dyn FlightProvider>>,
    synthetic: SyntheticDataProvider,
    use_real_data: bool,
}

impl DataService {
    /// Build the provider chain from configuration. Providers without
    /// credentials (or whose client fails to construct) are left out of the
    /// chain; priority follows construction order (GDS, then tracker, then
    /// aggregator). Always succeeds: an empty chain just means every
    /// response is synthetic.
    pub fn from_config(config: &ServiceConfig) -> Self {
        let mut providers: Vec<Arc<dyn FlightProvider>> = Vec::new();

        match GdsClient::from_settings(&config.gds) {
            Ok(Some(client)) => providers.push(Arc::new(client)),
            Ok(None) => info!("GDS credentials absent, provider disabled"),
            Err(e) => warn!(error = %e, "GDS client construction failed, provider disabled"),
        }
        match TrackerClient::from_settings(&config.tracker) {
            Ok(Some(client)) => providers.push(Arc::new(client)),
            Ok(None) => info!("Tracker access key absent, provider disabled"),
            Err(e) => warn!(error = %e, "Tracker client construction failed, provider disabled"),
        }
        match AggregatorClient::from_settings(&config.aggregator) {
            Ok(Some(client)) => providers.push(Arc::new(client)),
            Ok(None) => info!("Aggregator API key absent, provider disabled"),
            Err(e) => warn!(error = %e, "Aggregator client construction failed, provider disabled"),
        }

        info!(
            providers = providers.len(),
            "Data service initialized"
        );

        Self {
            providers,
            synthetic: SyntheticDataProvider::new(),
            use_real_data: true,
        }
    }

    /// Test constructor with an explicit chain and seeded generator.
    pub fn with_providers(
        providers: Vec<Arc<dyn FlightProvider>>,
        synthetic: SyntheticDataProvider,
    ) -> Self {
        Self {
            providers,
            synthetic,
            use_real_data: true,
        }
    }

    /// When false, every operation goes straight to the synthetic generator.
    pub fn set_use_real_data(&mut self, enabled: bool) {
        self.use_real_data = enabled;
    }

    /// Search flight offers across the provider chain.
    ///
    /// An empty result from a provider counts as a failure and advances the
    /// chain; data availability problems never surface as errors.
    pub async fn search_flights(
        &self,
        query: &FlightQuery,
    ) -> ServiceResult<SourcedResponse<FlightOffer>> {
        validate_airport_code(&query.origin)?;
        validate_airport_code(&query.destination)?;
        if query.origin == query.destination {
            return Err(ServiceError::Validation(
                "origin and destination must differ".to_string(),
            ));
        }
        if let Some(return_date) = query.return_date {
            if return_date < query.departure_date {
                return Err(ServiceError::Validation(
                    "return date precedes departure date".to_string(),
                ));
            }
        }

        let mut warnings = Vec::new();

        if self.use_real_data {
            for provider in self.providers.iter().filter(|p| p.supports_flight_search()) {
                match provider.search_flights(query).await {
                    Ok(offers) if !offers.is_empty() => {
                        info!(
                            source = provider.name(),
                            count = offers.len(),
                            "Flight search served by live provider"
                        );
                        let mut metadata =
                            ResponseMetadata::live(provider.name(), !warnings.is_empty());
                        metadata.warnings = warnings;
                        return Ok(SourcedResponse::new(apply_filters(offers, query), metadata));
                    }
                    Ok(_) => {
                        warn!(source = provider.name(), "Provider returned no offers, falling back");
                        warnings.push(format!("{}: returned no offers", provider.name()));
                    }
                    Err(e) => {
                        warn!(source = provider.name(), error = %e, "Provider failed, falling back");
                        warnings.push(format!("{}: {}", provider.name(), e));
                    }
                }
            }
        } else {
            warnings.push("live providers disabled by configuration".to_string());
        }

        let until = query.return_date.unwrap_or(query.departure_date);
        let offers = self.synthetic.flight_offers(
            Some(&query.origin),
            Some(&query.destination),
            query.departure_date,
            until,
            query.max_results,
        );
        let mut metadata = ResponseMetadata::synthetic("no live flight data available");
        metadata.warnings.extend(warnings);
        Ok(SourcedResponse::new(apply_filters(offers, query), metadata))
    }

    /// Look up airports, falling back to the fixed synthetic reference list.
    pub async fn get_airports(
        &self,
        query: &AirportQuery,
    ) -> ServiceResult<SourcedResponse<Airport>> {
        if let Some(iata) = &query.iata {
            validate_airport_code(iata)?;
        }

        let mut warnings = Vec::new();

        if self.use_real_data {
            for provider in self.providers.iter().filter(|p| p.supports_airport_search()) {
                match provider.search_airports(query).await {
                    Ok(airports) if !airports.is_empty() => {
                        let mut metadata =
                            ResponseMetadata::live(provider.name(), !warnings.is_empty());
                        metadata.warnings = warnings;
                        return Ok(SourcedResponse::new(airports, metadata));
                    }
                    Ok(_) => {
                        warnings.push(format!("{}: returned no airports", provider.name()));
                    }
                    Err(e) => {
                        warn!(source = provider.name(), error = %e, "Airport lookup failed, falling back");
                        warnings.push(format!("{}: {}", provider.name(), e));
                    }
                }
            }
        } else {
            warnings.push("live providers disabled by configuration".to_string());
        }

        let mut airports = self.synthetic.airports();
        if let Some(iata) = &query.iata {
            let iata = iata.to_uppercase();
            airports.retain(|a| a.iata == iata);
        }
        if let Some(search) = &query.search {
            airports.retain(|a| a.matches_search(search));
        }
        if let Some(country) = &query.country {
            let country = country.to_lowercase();
            airports.retain(|a| a.country.to_lowercase() == country);
        }

        let mut metadata = ResponseMetadata::synthetic("no live airport data available");
        metadata.warnings.extend(warnings);
        Ok(SourcedResponse::new(airports, metadata))
    }

    /// Market-demand time series for a route. Served by the synthetic
    /// generator; no live provider exposes route demand directly.
    pub async fn get_market_data(
        &self,
        origin: &str,
        destination: &str,
        days: u32,
    ) -> ServiceResult<SourcedResponse<MarketDataPoint>> {
        validate_airport_code(origin)?;
        validate_airport_code(destination)?;
        validate_days(days)?;

        let points = self.synthetic.market_data(Some(origin), Some(destination), days);
        Ok(SourcedResponse::new(
            points,
            ResponseMetadata::synthetic("market demand series is modelled, not observed"),
        ))
    }

    /// Route traffic analytics, live when a provider supports it.
    pub async fn get_destination_analytics(
        &self,
        origin: &str,
        period: &str,
    ) -> ServiceResult<SourcedResponse<DestinationInsight>> {
        validate_airport_code(origin)?;

        let mut warnings = Vec::new();

        if self.use_real_data {
            for provider in self
                .providers
                .iter()
                .filter(|p| p.supports_destination_analytics())
            {
                match provider.destination_analytics(origin, period).await {
                    Ok(insights) if !insights.is_empty() => {
                        let mut metadata =
                            ResponseMetadata::live(provider.name(), !warnings.is_empty());
                        metadata.warnings = warnings;
                        return Ok(SourcedResponse::new(insights, metadata));
                    }
                    Ok(_) => {
                        warnings.push(format!("{}: returned no analytics", provider.name()));
                    }
                    Err(e) => {
                        warn!(source = provider.name(), error = %e, "Analytics failed, falling back");
                        warnings.push(format!("{}: {}", provider.name(), e));
                    }
                }
            }
        } else {
            warnings.push("live providers disabled by configuration".to_string());
        }

        // Derive synthetic insights from the generator's top destinations
        let analytics = self.synthetic.airport_analytics(origin, 30)?;
        let insights = analytics
            .top_destinations
            .into_iter()
            .map(|stat| DestinationInsight {
                destination: stat.airport.iata,
                score: Some(stat.flight_count as f64),
                price: Some(stat.average_price),
                data_source: "synthetic".to_string(),
            })
            .collect();

        let mut metadata = ResponseMetadata::synthetic("no live analytics available");
        metadata.warnings.extend(warnings);
        Ok(SourcedResponse::new(insights, metadata))
    }

    /// Airport-level analytics over a trailing window.
    pub async fn get_airport_analytics(
        &self,
        airport_code: &str,
        days: u32,
    ) -> ServiceResult<SourcedResponse<AirportAnalytics>> {
        validate_airport_code(airport_code)?;
        validate_days(days)?;

        let analytics = self.synthetic.airport_analytics(airport_code, days)?;
        Ok(SourcedResponse::new(
            vec![analytics],
            ResponseMetadata::synthetic("airport analytics are modelled, not observed"),
        ))
    }

    /// Canonical flight records for a route over the trailing `days` window,
    /// ready for the cleaning-free analytics path.
    pub fn historical_flights(
        &self,
        origin: &str,
        destination: &str,
        days: u32,
        limit: usize,
    ) -> ServiceResult<Vec<crate::models::FlightRecord>> {
        validate_airport_code(origin)?;
        validate_airport_code(destination)?;
        validate_days(days)?;

        let today = chrono::Utc::now().date_naive();
        let from = today - Duration::days(days as i64);
        Ok(self
            .synthetic
            .flights(Some(origin), Some(destination), from, today, limit))
    }
}

/// Post-filters applied to the winning offer set regardless of source.
/// Price filtering ignores unpriced (zero-total) schedule offers.
fn apply_filters(mut offers: Vec<FlightOffer>, query: &FlightQuery) -> Vec<FlightOffer> {
    if let Some(max_price) = query.max_price {
        offers.retain(|o| o.price_total <= 0.0 || o.price_total <= max_price);
    }
    if !query.include_airlines.is_empty() {
        offers.retain(|o| {
            o.carrier_codes()
                .iter()
                .any(|c| query.include_airlines.iter().any(|i| i.eq_ignore_ascii_case(c)))
        });
    }
    if !query.exclude_airlines.is_empty() {
        offers.retain(|o| {
            !o.carrier_codes()
                .iter()
                .any(|c| query.exclude_airlines.iter().any(|x| x.eq_ignore_ascii_case(c)))
        });
    }
    offers
}

fn validate_airport_code(code: &str) -> ServiceResult<()> {
    let code = code.trim();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        Err(ServiceError::Validation(format!(
            "invalid airport code: {:?} (expected 3 letters)",
            code
        )))
    }
}

fn validate_days(days: u32) -> ServiceResult<()> {
    if (1..=365).contains(&days) {
        Ok(())
    } else {
        Err(ServiceError::Validation(format!(
            "days must be between 1 and 365, got {}",
            days
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scripted provider for chain tests.
    struct StubProvider {
        name: &'static str,
        offers: Result<Vec<FlightOffer>, &'static str>,
        calls: AtomicU32,
    }

    impl StubProvider {
        fn serving(name: &'static str, count: usize) -> Self {
            let offers = (0..count)
                .map(|i| FlightOffer {
                    id: format!("{}-{}", name, i),
                    segments: vec![crate::models::FlightSegment {
                        origin: "SYD".into(),
                        destination: "MEL".into(),
                        departure_time: "2026-06-01T08:30:00".into(),
                        arrival_time: "2026-06-01T10:05:00".into(),
                        carrier_code: "QF".into(),
                        flight_number: "400".into(),
                        aircraft_code: None,
                        stops: 0,
                    }],
                    duration_minutes: Some(95),
                    price_total: 100.0 + i as f64,
                    currency: "AUD".into(),
                    bookable_seats: Some(4),
                    cabin_class: None,
                    data_source: name.into(),
                })
                .collect();
            Self {
                name,
                offers: Ok(offers),
                calls: AtomicU32::new(0),
            }
        }

        fn failing(name: &'static str, message: &'static str) -> Self {
            Self {
                name,
                offers: Err(message),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl FlightProvider for StubProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn search_flights(
            &self,
            _query: &FlightQuery,
        ) -> Result<Vec<FlightOffer>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.offers {
                Ok(offers) => Ok(offers.clone()),
                Err(message) => Err(ProviderError::RequestFailure {
                    status: 500,
                    body: message.to_string(),
                }),
            }
        }
    }

    fn query() -> FlightQuery {
        FlightQuery::new("SYD", "MEL", NaiveDate::from_ymd_opt(2026, 6, 1).unwrap())
    }

    fn service(providers: Vec<Arc<dyn FlightProvider>>) -> DataService {
        DataService::with_providers(providers, SyntheticDataProvider::with_seed(42))
    }

    #[tokio::test]
    async fn credential_less_config_builds_a_synthetic_only_service() {
        // No provider credentials means an empty chain, never an error
        let svc = DataService::from_config(&ServiceConfig::default());
        let response = svc.search_flights(&query()).await.unwrap();
        assert!(response.metadata.is_mock);
        assert_eq!(response.metadata.source, "synthetic");
        assert!(!response.data.is_empty());
    }

    #[tokio::test]
    async fn first_healthy_provider_wins_without_fallback_flag() {
        let svc = service(vec![Arc::new(StubProvider::serving("gds", 3))]);
        let response = svc.search_flights(&query()).await.unwrap();
        assert_eq!(response.metadata.source, "gds");
        assert!(!response.metadata.fallback);
        assert!(!response.metadata.is_mock);
        assert_eq!(response.count(), 3);
    }

    #[tokio::test]
    async fn failed_provider_advances_chain_and_flags_fallback() {
        let svc = service(vec![
            Arc::new(StubProvider::failing("gds", "boom")),
            Arc::new(StubProvider::serving("tracker", 2)),
        ]);
        let response = svc.search_flights(&query()).await.unwrap();
        assert_eq!(response.metadata.source, "tracker");
        assert!(response.metadata.fallback);
        assert!(!response.metadata.is_mock);
        assert_eq!(response.metadata.warnings.len(), 1);
        assert!(response.metadata.warnings[0].contains("gds"));
    }

    #[tokio::test]
    async fn empty_result_counts_as_failure() {
        let svc = service(vec![
            Arc::new(StubProvider::serving("gds", 0)),
            Arc::new(StubProvider::serving("tracker", 1)),
        ]);
        let response = svc.search_flights(&query()).await.unwrap();
        assert_eq!(response.metadata.source, "tracker");
        assert!(response.metadata.fallback);
    }

    #[tokio::test]
    async fn all_providers_failing_degrades_to_synthetic_not_error() {
        let svc = service(vec![
            Arc::new(StubProvider::failing("gds", "down")),
            Arc::new(StubProvider::failing("tracker", "down")),
        ]);
        let response = svc.search_flights(&query()).await.unwrap();
        assert!(response.metadata.is_mock);
        assert!(response.metadata.fallback);
        assert_eq!(response.metadata.source, "synthetic");
        assert!(!response.data.is_empty());
        // One warning per failed provider plus the synthetic notice
        assert!(response.metadata.warnings.len() >= 3);
    }

    #[tokio::test]
    async fn disabled_real_data_skips_providers_entirely() {
        let provider = Arc::new(StubProvider::serving("gds", 3));
        let mut svc = service(vec![provider.clone()]);
        svc.set_use_real_data(false);

        let response = svc.search_flights(&query()).await.unwrap();
        assert!(response.metadata.is_mock);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_codes_are_rejected_before_any_provider_call() {
        let provider = Arc::new(StubProvider::serving("gds", 3));
        let svc = service(vec![provider.clone()]);

        let mut bad = query();
        bad.origin = "SYDNEY".into();
        let err = svc.search_flights(&bad).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

        let mut same = query();
        same.destination = "SYD".into();
        assert!(svc.search_flights(&same).await.is_err());
    }

    #[tokio::test]
    async fn price_filter_ignores_unpriced_offers() {
        let mut provider = StubProvider::serving("gds", 3);
        if let Ok(offers) = &mut provider.offers {
            offers[0].price_total = 0.0; // schedule-only offer
            offers[1].price_total = 999.0;
            offers[2].price_total = 150.0;
        }
        let svc = service(vec![Arc::new(provider)]);

        let mut q = query();
        q.max_price = Some(200.0);
        let response = svc.search_flights(&q).await.unwrap();
        assert_eq!(response.count(), 2);
        assert!(response.data.iter().all(|o| o.price_total <= 200.0));
    }

    #[tokio::test]
    async fn airline_filters_apply_to_carrier_codes() {
        let svc = service(vec![Arc::new(StubProvider::serving("gds", 2))]);

        let mut q = query();
        q.exclude_airlines = vec!["QF".into()];
        let response = svc.search_flights(&q).await.unwrap();
        // Stub offers are all QF; excluding them leaves none, but the winning
        // source already answered so no further fallback occurs
        assert_eq!(response.count(), 0);
        assert_eq!(response.metadata.source, "gds");

        let mut q = query();
        q.include_airlines = vec!["qf".into()];
        let response = svc.search_flights(&q).await.unwrap();
        assert_eq!(response.count(), 2);
    }

    #[tokio::test]
    async fn market_data_is_always_synthetic_and_validated() {
        let svc = service(vec![]);
        let response = svc.get_market_data("SYD", "MEL", 30).await.unwrap();
        assert!(response.metadata.is_mock);
        assert_eq!(response.count(), 30);

        assert!(svc.get_market_data("SYD", "MEL", 0).await.is_err());
        assert!(svc.get_market_data("SYD", "MEL", 400).await.is_err());
    }

    #[tokio::test]
    async fn airport_analytics_validates_code() {
        let svc = service(vec![]);
        assert!(svc.get_airport_analytics("SYD", 30).await.is_ok());
        let err = svc.get_airport_analytics("ZZZ", 30).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn airport_lookup_falls_back_to_reference_list() {
        let svc = service(vec![]);
        let response = svc
            .get_airports(&AirportQuery {
                search: Some("sydney".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(response.metadata.is_mock);
        assert_eq!(response.count(), 1);
        assert_eq!(response.data[0].iata, "SYD");
    }
}
