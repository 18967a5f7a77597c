//! Flight tracker provider client
//!
//! Schedule-oriented source authenticated by an access key in the query
//! string. Serves scheduled flights (no fares, so offers carry a zero price)
//! and a large airport directory. The upstream reports errors inside a 200
//! body, so responses are checked for an error object before parsing.

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::config::TrackerSettings;
use crate::error::ProviderError;
use crate::executor::RequestExecutor;
use crate::models::{Airport, FlightOffer, FlightSegment};
use crate::providers::{AirportQuery, FlightProvider, FlightQuery};

const SOURCE: &str = "tracker";

pub struct TrackerClient {
    executor: RequestExecutor,
    access_key: String,
}

impl TrackerClient {
    /// Returns None when no access key is configured.
    pub fn from_settings(settings: &TrackerSettings) -> Result<Option<Self>, ProviderError> {
        let Some(access_key) = &settings.access_key else {
            return Ok(None);
        };

        let executor =
            RequestExecutor::new(&settings.base_url, &settings.request, settings.rate_limit)?;

        Ok(Some(Self {
            executor,
            access_key: access_key.clone(),
        }))
    }

    async fn get(
        &self,
        endpoint: &str,
        mut params: Vec<(&'static str, String)>,
    ) -> Result<Value, ProviderError> {
        params.push(("access_key", self.access_key.clone()));
        let body = self.executor.get_json(endpoint, &params, &[]).await?;
        check_embedded_error(&body)?;
        Ok(body)
    }
}

#[async_trait]
impl FlightProvider for TrackerClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn supports_airport_search(&self) -> bool {
        true
    }

    async fn search_flights(&self, query: &FlightQuery) -> Result<Vec<FlightOffer>, ProviderError> {
        let params = vec![
            ("dep_iata", query.origin.clone()),
            ("arr_iata", query.destination.clone()),
            ("flight_date", query.departure_date.to_string()),
            ("limit", query.max_results.to_string()),
        ];

        let body = self.get("/flights", params).await?;
        parse_flights(&body)
    }

    async fn search_airports(&self, query: &AirportQuery) -> Result<Vec<Airport>, ProviderError> {
        let mut params = Vec::new();
        if let Some(search) = query.iata.clone().or_else(|| query.search.clone()) {
            params.push(("search", search));
        }

        let body = self.get("/airports", params).await?;
        let mut airports = parse_airports(&body)?;

        // Country filtering is not supported upstream
        if let Some(country) = &query.country {
            let country = country.to_lowercase();
            airports.retain(|a| a.country.to_lowercase() == country);
        }
        Ok(airports)
    }
}

/// The upstream wraps failures in a 200 response with an `error` object.
fn check_embedded_error(body: &Value) -> Result<(), ProviderError> {
    let Some(error) = body.get("error") else {
        return Ok(());
    };
    let code = error.get("code").and_then(Value::as_str).unwrap_or("unknown");
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("no message")
        .to_string();

    Err(match code {
        "invalid_access_key" | "missing_access_key" | "inactive_user" => {
            ProviderError::AuthenticationFailure(message)
        }
        "rate_limit_reached" | "usage_limit_reached" => {
            ProviderError::RateLimitExceeded { retry_after: None }
        }
        _ => ProviderError::RequestFailure {
            status: 0,
            body: format!("{}: {}", code, message),
        },
    })
}

fn data_array(body: &Value) -> Result<&Vec<Value>, ProviderError> {
    body.get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::ParseFailure("response lacks a data array".to_string()))
}

/// Scheduled flights have no fares: offers carry `price_total` 0.0 and the
/// orchestrator's price filter ignores unpriced offers.
fn parse_flights(body: &Value) -> Result<Vec<FlightOffer>, ProviderError> {
    let offers = data_array(body)?
        .iter()
        .filter_map(|flight| match parse_flight(flight) {
            Some(offer) => Some(offer),
            None => {
                warn!("Skipping malformed tracker flight entry");
                None
            }
        })
        .collect();
    Ok(offers)
}

fn parse_flight(flight: &Value) -> Option<FlightOffer> {
    let carrier = flight.pointer("/airline/iata")?.as_str()?.to_string();
    let number = flight.pointer("/flight/number")?.as_str()?.to_string();
    let origin = flight.pointer("/departure/iata")?.as_str()?.to_string();
    let destination = flight.pointer("/arrival/iata")?.as_str()?.to_string();
    let departure_time = flight
        .pointer("/departure/scheduled")?
        .as_str()?
        .to_string();
    let arrival_time = flight.pointer("/arrival/scheduled")?.as_str()?.to_string();

    Some(FlightOffer {
        id: format!("{}{}_{}_{}", carrier, number, origin, departure_time),
        segments: vec![FlightSegment {
            origin,
            destination,
            departure_time,
            arrival_time,
            carrier_code: carrier,
            flight_number: number,
            aircraft_code: flight
                .pointer("/aircraft/iata")
                .and_then(Value::as_str)
                .map(str::to_string),
            stops: 0,
        }],
        duration_minutes: None,
        price_total: 0.0,
        currency: String::new(),
        bookable_seats: None,
        cabin_class: None,
        data_source: SOURCE.to_string(),
    })
}

fn parse_airports(body: &Value) -> Result<Vec<Airport>, ProviderError> {
    let airports = data_array(body)?
        .iter()
        .filter_map(|airport| {
            Some(Airport {
                iata: airport.get("iata_code")?.as_str()?.to_string(),
                icao: airport
                    .get("icao_code")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                name: airport.get("airport_name")?.as_str()?.to_string(),
                city: airport
                    .get("city_iata_code")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                country: airport
                    .get("country_name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                latitude: parse_coord(airport.get("latitude"))?,
                longitude: parse_coord(airport.get("longitude"))?,
                timezone: airport
                    .get("timezone")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
        })
        .collect();
    Ok(airports)
}

/// Coordinates arrive as numbers or numeric strings depending on endpoint
/// version.
fn parse_coord(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}
