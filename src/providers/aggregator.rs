//! Travel aggregator provider client
//!
//! Marketplace-style source authenticated with API key and host headers on
//! every request. Returns priced itineraries that normalize into multi-leg
//! flight offers.

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::config::AggregatorSettings;
use crate::error::ProviderError;
use crate::executor::RequestExecutor;
use crate::models::{FlightOffer, FlightSegment};
use crate::providers::{FlightProvider, FlightQuery};

const SOURCE: &str = "aggregator";
const SEARCH_ENDPOINT: &str = "/search";

pub struct AggregatorClient {
    executor: RequestExecutor,
    api_key: String,
    api_host: String,
}

impl AggregatorClient {
    /// Returns None when no API key is configured.
    pub fn from_settings(settings: &AggregatorSettings) -> Result<Option<Self>, ProviderError> {
        let Some(api_key) = &settings.api_key else {
            return Ok(None);
        };

        let executor =
            RequestExecutor::new(&settings.base_url, &settings.request, settings.rate_limit)?;

        Ok(Some(Self {
            executor,
            api_key: api_key.clone(),
            api_host: settings.api_host.clone(),
        }))
    }
}

#[async_trait]
impl FlightProvider for AggregatorClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn search_flights(&self, query: &FlightQuery) -> Result<Vec<FlightOffer>, ProviderError> {
        let mut params = vec![
            ("origin", query.origin.clone()),
            ("destination", query.destination.clone()),
            ("date", query.departure_date.to_string()),
            ("adults", query.adults.to_string()),
        ];
        if let Some(return_date) = query.return_date {
            params.push(("returnDate", return_date.to_string()));
        }
        if let Some(currency) = &query.currency {
            params.push(("currency", currency.clone()));
        }

        let body = self
            .executor
            .get_json(
                SEARCH_ENDPOINT,
                &params,
                &[
                    ("X-Api-Key", self.api_key.clone()),
                    ("X-Api-Host", self.api_host.clone()),
                ],
            )
            .await?;

        let mut offers = parse_itineraries(&body)?;
        offers.truncate(query.max_results);
        Ok(offers)
    }
}

fn parse_itineraries(body: &Value) -> Result<Vec<FlightOffer>, ProviderError> {
    let itineraries = body
        .pointer("/data/itineraries")
        .or_else(|| body.get("itineraries"))
        .and_then(Value::as_array)
        .ok_or_else(|| {
            ProviderError::ParseFailure("response lacks an itineraries array".to_string())
        })?;

    let offers = itineraries
        .iter()
        .filter_map(|itinerary| match parse_itinerary(itinerary) {
            Some(offer) => Some(offer),
            None => {
                warn!(id = ?itinerary.get("id"), "Skipping malformed aggregator itinerary");
                None
            }
        })
        .collect();
    Ok(offers)
}

fn parse_itinerary(itinerary: &Value) -> Option<FlightOffer> {
    let id = itinerary.get("id")?.as_str()?.to_string();
    let price_total = itinerary.pointer("/price/raw")?.as_f64()?;
    let currency = itinerary
        .pointer("/price/currency")
        .and_then(Value::as_str)
        .unwrap_or("USD")
        .to_string();

    let mut segments = Vec::new();
    let mut duration_minutes = 0u32;
    for leg in itinerary.get("legs")?.as_array()? {
        duration_minutes += leg
            .get("durationInMinutes")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;
        for segment in leg.get("segments")?.as_array()? {
            segments.push(parse_segment(segment)?);
        }
    }
    if segments.is_empty() {
        return None;
    }

    Some(FlightOffer {
        id,
        segments,
        duration_minutes: (duration_minutes > 0).then_some(duration_minutes),
        price_total,
        currency,
        bookable_seats: None,
        cabin_class: None,
        data_source: SOURCE.to_string(),
    })
}

fn parse_segment(segment: &Value) -> Option<FlightSegment> {
    Some(FlightSegment {
        origin: segment
            .pointer("/origin/displayCode")?
            .as_str()?
            .to_string(),
        destination: segment
            .pointer("/destination/displayCode")?
            .as_str()?
            .to_string(),
        departure_time: segment.get("departure")?.as_str()?.to_string(),
        arrival_time: segment.get("arrival")?.as_str()?.to_string(),
        carrier_code: segment
            .pointer("/marketingCarrier/alternateId")?
            .as_str()?
            .to_string(),
        flight_number: segment.get("flightNumber")?.as_str()?.to_string(),
        aircraft_code: None,
        stops: 0,
    })
}
