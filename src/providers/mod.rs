//! Provider clients
//!
//! One client per upstream data source, all implementing [`FlightProvider`]
//! so the fallback orchestrator can treat them uniformly. Clients normalize
//! provider-specific response shapes into the canonical models and surface
//! failures as [`ProviderError`] for the orchestrator to catch.

pub mod aggregator;
pub mod gds;
pub mod tracker;

pub use aggregator::AggregatorClient;
pub use gds::GdsClient;
pub use tracker::TrackerClient;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::models::{Airport, CabinClass, FlightOffer};

/// Uniform flight search parameters, independent of any provider's
/// parameter naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightQuery {
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_date: Option<NaiveDate>,
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub infants: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub travel_class: Option<CabinClass>,
    pub non_stop: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Post-filter: drop priced offers above this total
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    /// Post-filter: keep only these carrier codes when non-empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_airlines: Vec<String>,
    /// Post-filter: drop offers from these carrier codes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_airlines: Vec<String>,
    pub max_results: usize,
}

impl FlightQuery {
    pub fn new(origin: &str, destination: &str, departure_date: NaiveDate) -> Self {
        Self {
            origin: origin.to_uppercase(),
            destination: destination.to_uppercase(),
            departure_date,
            return_date: None,
            adults: 1,
            children: 0,
            infants: 0,
            travel_class: None,
            non_stop: false,
            currency: None,
            max_price: None,
            include_airlines: Vec::new(),
            exclude_airlines: Vec::new(),
            max_results: 50,
        }
    }
}

/// Airport lookup parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AirportQuery {
    /// Free-text match against name, city or code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iata: Option<String>,
}

/// One row of route-level traffic analytics from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationInsight {
    pub destination: String,
    /// Relative traffic score, provider-defined scale
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    pub data_source: String,
}

/// A live data source the orchestrator can query.
///
/// Capability flags let the orchestrator skip providers that cannot answer a
/// given operation instead of calling them and discarding the error.
#[async_trait]
pub trait FlightProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn supports_flight_search(&self) -> bool {
        true
    }

    fn supports_airport_search(&self) -> bool {
        false
    }

    fn supports_destination_analytics(&self) -> bool {
        false
    }

    async fn search_flights(&self, query: &FlightQuery) -> Result<Vec<FlightOffer>, ProviderError>;

    async fn search_airports(&self, _query: &AirportQuery) -> Result<Vec<Airport>, ProviderError> {
        Err(ProviderError::RequestFailure {
            status: 0,
            body: format!("{} does not support airport search", self.name()),
        })
    }

    async fn destination_analytics(
        &self,
        _origin: &str,
        _period: &str,
    ) -> Result<Vec<DestinationInsight>, ProviderError> {
        Err(ProviderError::RequestFailure {
            status: 0,
            body: format!("{} does not support destination analytics", self.name()),
        })
    }
}
