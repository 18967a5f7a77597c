//! GDS provider client
//!
//! Talks to a global distribution system API: OAuth2 client-credentials
//! authentication with a cached bearer token, flight offer search, airport
//! reference lookup and route traffic analytics. Search and analytics
//! endpoints carry their own rate limits on top of the provider default.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::GdsSettings;
use crate::error::ProviderError;
use crate::executor::RequestExecutor;
use crate::models::{Airport, CabinClass, FlightOffer, FlightSegment};
use crate::providers::{AirportQuery, DestinationInsight, FlightProvider, FlightQuery};

const SOURCE: &str = "gds";
const SEARCH_ENDPOINT: &str = "/v2/shopping/flight-offers";
const LOCATIONS_ENDPOINT: &str = "/v1/reference-data/locations";
const ANALYTICS_ENDPOINT: &str = "/v1/travel/analytics/air-traffic/traveled";

/// Refresh the token this long before its declared expiry.
const TOKEN_EXPIRY_SKEW: Duration = Duration::from_secs(300);

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct GdsClient {
    executor: RequestExecutor,
    auth_url: String,
    api_key: String,
    api_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl GdsClient {
    /// Returns None when credentials are absent; the orchestrator then skips
    /// this provider entirely.
    pub fn from_settings(settings: &GdsSettings) -> Result<Option<Self>, ProviderError> {
        let (Some(api_key), Some(api_secret)) = (&settings.api_key, &settings.api_secret) else {
            return Ok(None);
        };

        let executor = RequestExecutor::new(&settings.base_url, &settings.request, settings.rate_limit)?
            .with_endpoint_limit(SEARCH_ENDPOINT, settings.search_rate_limit)
            .with_endpoint_limit("/v1/travel/analytics", settings.analytics_rate_limit);

        Ok(Some(Self {
            executor,
            auth_url: settings.auth_url.clone(),
            api_key: api_key.clone(),
            api_secret: api_secret.clone(),
            token: Mutex::new(None),
        }))
    }

    /// Fetch or reuse the OAuth2 bearer token.
    ///
    /// The cache mutex is held across the refresh so concurrent callers
    /// single-flight through one token request instead of stampeding the
    /// auth endpoint.
    async fn bearer_token(&self) -> Result<String, ProviderError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.access_token.clone());
            }
            debug!("Cached GDS token expired, refreshing");
        }

        let body = self
            .executor
            .post_form(
                &self.auth_url,
                &[
                    ("grant_type", "client_credentials".to_string()),
                    ("client_id", self.api_key.clone()),
                    ("client_secret", self.api_secret.clone()),
                ],
            )
            .await
            .map_err(|e| match e {
                ProviderError::RequestFailure { status, body } if status == 401 || status == 400 => {
                    ProviderError::AuthenticationFailure(format!(
                        "token request rejected ({}): {}",
                        status, body
                    ))
                }
                other => other,
            })?;

        let access_token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProviderError::AuthenticationFailure("token response lacks access_token".to_string())
            })?
            .to_string();
        let expires_in = body
            .get("expires_in")
            .and_then(Value::as_u64)
            .unwrap_or(1799);

        let lifetime = Duration::from_secs(expires_in).saturating_sub(TOKEN_EXPIRY_SKEW);
        *cached = Some(CachedToken {
            access_token: access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        debug!(expires_in, "Obtained GDS access token");
        Ok(access_token)
    }
}

#[async_trait]
impl FlightProvider for GdsClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn supports_airport_search(&self) -> bool {
        true
    }

    fn supports_destination_analytics(&self) -> bool {
        true
    }

    async fn search_flights(&self, query: &FlightQuery) -> Result<Vec<FlightOffer>, ProviderError> {
        let token = self.bearer_token().await?;

        let mut params = vec![
            ("originLocationCode", query.origin.clone()),
            ("destinationLocationCode", query.destination.clone()),
            ("departureDate", query.departure_date.to_string()),
            ("adults", query.adults.to_string()),
            ("max", query.max_results.to_string()),
        ];
        if let Some(return_date) = query.return_date {
            params.push(("returnDate", return_date.to_string()));
        }
        if query.children > 0 {
            params.push(("children", query.children.to_string()));
        }
        if query.infants > 0 {
            params.push(("infants", query.infants.to_string()));
        }
        if let Some(class) = query.travel_class {
            params.push(("travelClass", cabin_param(class).to_string()));
        }
        if query.non_stop {
            params.push(("nonStop", "true".to_string()));
        }
        if let Some(currency) = &query.currency {
            params.push(("currencyCode", currency.clone()));
        }
        if let Some(max_price) = query.max_price {
            params.push(("maxPrice", (max_price as u64).to_string()));
        }

        let body = self
            .executor
            .get_json(
                SEARCH_ENDPOINT,
                &params,
                &[("Authorization", format!("Bearer {}", token))],
            )
            .await?;

        parse_flight_offers(&body)
    }

    async fn search_airports(&self, query: &AirportQuery) -> Result<Vec<Airport>, ProviderError> {
        let token = self.bearer_token().await?;

        let keyword = query
            .iata
            .clone()
            .or_else(|| query.search.clone())
            .unwrap_or_default();
        let params = vec![
            ("subType", "AIRPORT".to_string()),
            ("keyword", keyword),
            ("page[limit]", "50".to_string()),
        ];

        let body = self
            .executor
            .get_json(
                LOCATIONS_ENDPOINT,
                &params,
                &[("Authorization", format!("Bearer {}", token))],
            )
            .await?;

        parse_airports(&body)
    }

    async fn destination_analytics(
        &self,
        origin: &str,
        period: &str,
    ) -> Result<Vec<DestinationInsight>, ProviderError> {
        let token = self.bearer_token().await?;

        let body = self
            .executor
            .get_json(
                ANALYTICS_ENDPOINT,
                &[
                    ("originCityCode", origin.to_uppercase()),
                    ("period", period.to_string()),
                ],
                &[("Authorization", format!("Bearer {}", token))],
            )
            .await?;

        parse_destination_insights(&body)
    }
}

fn cabin_param(class: CabinClass) -> &'static str {
    match class {
        CabinClass::First => "FIRST",
        CabinClass::Business => "BUSINESS",
        CabinClass::Economy => "ECONOMY",
    }
}

fn cabin_from_str(value: &str) -> Option<CabinClass> {
    match value.to_uppercase().as_str() {
        "FIRST" => Some(CabinClass::First),
        "BUSINESS" => Some(CabinClass::Business),
        "ECONOMY" | "PREMIUM_ECONOMY" => Some(CabinClass::Economy),
        _ => None,
    }
}

fn data_array(body: &Value) -> Result<&Vec<Value>, ProviderError> {
    body.get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::ParseFailure("response lacks a data array".to_string()))
}

/// Normalize GDS flight offers. Offers missing required fields are skipped
/// with a warning rather than failing the whole batch.
fn parse_flight_offers(body: &Value) -> Result<Vec<FlightOffer>, ProviderError> {
    let offers = data_array(body)?
        .iter()
        .filter_map(|offer| match parse_offer(offer) {
            Some(parsed) => Some(parsed),
            None => {
                warn!(id = ?offer.get("id"), "Skipping malformed GDS offer");
                None
            }
        })
        .collect();
    Ok(offers)
}

fn parse_offer(offer: &Value) -> Option<FlightOffer> {
    let id = offer.get("id")?.as_str()?.to_string();
    let price = offer.get("price")?;
    let price_total = price.get("grandTotal")?.as_str()?.parse::<f64>().ok()?;
    let currency = price.get("currency")?.as_str()?.to_string();

    let mut segments = Vec::new();
    let mut duration_minutes = 0u32;
    for itinerary in offer.get("itineraries")?.as_array()? {
        for segment in itinerary.get("segments")?.as_array()? {
            let parsed = parse_segment(segment)?;
            segments.push(parsed);
        }
        if let Some(minutes) = itinerary
            .get("duration")
            .and_then(Value::as_str)
            .and_then(parse_iso_duration)
        {
            duration_minutes += minutes;
        }
    }
    if segments.is_empty() {
        return None;
    }

    let cabin_class = offer
        .pointer("/travelerPricings/0/fareDetailsBySegment/0/cabin")
        .and_then(Value::as_str)
        .and_then(cabin_from_str);

    Some(FlightOffer {
        id,
        segments,
        duration_minutes: (duration_minutes > 0).then_some(duration_minutes),
        price_total,
        currency,
        bookable_seats: offer
            .get("numberOfBookableSeats")
            .and_then(Value::as_u64)
            .map(|n| n as u32),
        cabin_class,
        data_source: SOURCE.to_string(),
    })
}

fn parse_segment(segment: &Value) -> Option<FlightSegment> {
    Some(FlightSegment {
        origin: segment.pointer("/departure/iataCode")?.as_str()?.to_string(),
        destination: segment.pointer("/arrival/iataCode")?.as_str()?.to_string(),
        departure_time: segment.pointer("/departure/at")?.as_str()?.to_string(),
        arrival_time: segment.pointer("/arrival/at")?.as_str()?.to_string(),
        carrier_code: segment.get("carrierCode")?.as_str()?.to_string(),
        flight_number: segment.get("number")?.as_str()?.to_string(),
        aircraft_code: segment
            .pointer("/aircraft/code")
            .and_then(Value::as_str)
            .map(str::to_string),
        stops: segment
            .get("numberOfStops")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32,
    })
}

/// Parse an ISO 8601 duration like `PT14H30M` into minutes. Date components
/// never appear in itinerary durations.
fn parse_iso_duration(value: &str) -> Option<u32> {
    let rest = value.strip_prefix("PT")?;
    let mut minutes = 0u32;
    let mut digits = String::new();
    for c in rest.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else {
            let n = digits.parse::<u32>().ok()?;
            digits.clear();
            match c {
                'H' => minutes += n * 60,
                'M' => minutes += n,
                'S' => {}
                _ => return None,
            }
        }
    }
    Some(minutes)
}

fn parse_airports(body: &Value) -> Result<Vec<Airport>, ProviderError> {
    let airports = data_array(body)?
        .iter()
        .filter_map(|location| {
            Some(Airport {
                iata: location.get("iataCode")?.as_str()?.to_string(),
                icao: None,
                name: location.get("name")?.as_str()?.to_string(),
                city: location
                    .pointer("/address/cityName")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                country: location
                    .pointer("/address/countryName")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                latitude: location
                    .pointer("/geoCode/latitude")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0),
                longitude: location
                    .pointer("/geoCode/longitude")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0),
                timezone: location
                    .get("timeZoneOffset")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
        })
        .collect();
    Ok(airports)
}

fn parse_destination_insights(body: &Value) -> Result<Vec<DestinationInsight>, ProviderError> {
    let insights = data_array(body)?
        .iter()
        .filter_map(|row| {
            Some(DestinationInsight {
                destination: row.get("destination")?.as_str()?.to_string(),
                score: row
                    .pointer("/analytics/travelers/score")
                    .and_then(Value::as_f64),
                price: None,
                data_source: SOURCE.to_string(),
            })
        })
        .collect();
    Ok(insights)
}
