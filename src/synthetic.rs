//! Synthetic data generator
//!
//! Fallback of last resort: deterministic in shape, random in content.
//! Outputs are always internally consistent (seats never exceed capacity,
//! prices never negative, dates within the requested range) and generation
//! never fails. Callers degrade to this source when every live provider
//! is unavailable.

use std::sync::Mutex;

use chrono::{Datelike, Duration, NaiveDate, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    Airport, AirportAnalytics, CabinClass, DestinationStat, FlightOffer, FlightRecord,
    FlightSegment, MarketDataPoint, TimeSeriesSet,
};

/// Australian airports used as the fixed reference list.
const AIRPORTS: &[(&str, &str, &str, &str, f64, f64, &str)] = &[
    ("SYD", "Sydney Airport", "Sydney", "Australia", -33.9399, 151.1753, "Australia/Sydney"),
    ("MEL", "Melbourne Airport", "Melbourne", "Australia", -37.6696, 144.8498, "Australia/Melbourne"),
    ("BNE", "Brisbane Airport", "Brisbane", "Australia", -27.3940, 153.1219, "Australia/Brisbane"),
    ("PER", "Perth Airport", "Perth", "Australia", -31.9522, 115.8589, "Australia/Perth"),
    ("ADL", "Adelaide Airport", "Adelaide", "Australia", -34.9285, 138.6007, "Australia/Adelaide"),
    ("CBR", "Canberra Airport", "Canberra", "Australia", -35.3069, 149.1950, "Australia/Sydney"),
    ("HBA", "Hobart Airport", "Hobart", "Australia", -42.8361, 147.5103, "Australia/Hobart"),
    ("DRW", "Darwin Airport", "Darwin", "Australia", -12.4083, 130.8727, "Australia/Darwin"),
    ("CNS", "Cairns Airport", "Cairns", "Australia", -16.8858, 145.7553, "Australia/Brisbane"),
    ("OOL", "Gold Coast Airport", "Gold Coast", "Australia", -28.1667, 153.5000, "Australia/Brisbane"),
];

/// Airlines operating the synthetic network.
const AIRLINES: &[(&str, &str)] = &[
    ("QF", "Qantas"),
    ("VA", "Virgin Australia"),
    ("JQ", "Jetstar"),
    ("TT", "Tigerair Australia"),
    ("NZ", "Air New Zealand"),
    ("EY", "Etihad Airways"),
    ("SQ", "Singapore Airlines"),
    ("CX", "Cathay Pacific"),
    ("EK", "Emirates"),
    ("LA", "LATAM"),
];

/// Aircraft types with seat capacity ranges.
const AIRCRAFT: &[(&str, u32, u32)] = &[
    ("A320", 150, 186),
    ("A330", 250, 300),
    ("A350", 300, 350),
    ("A380", 500, 853),
    ("B737", 130, 215),
    ("B747", 366, 416),
    ("B777", 301, 550),
    ("B787", 242, 330),
];

/// Generates synthetic airports, flights, market series and airport analytics.
///
/// Each construction seeds from fresh entropy unless a seed is fixed with
/// [`SyntheticDataProvider::with_seed`], which makes output reproducible for
/// tests.
pub struct SyntheticDataProvider {
    rng: Mutex<StdRng>,
}

impl Default for SyntheticDataProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticDataProvider {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// The fixed airport reference list.
    pub fn airports(&self) -> Vec<Airport> {
        AIRPORTS
            .iter()
            .map(|(iata, name, city, country, lat, lon, tz)| Airport {
                iata: (*iata).to_string(),
                icao: None,
                name: (*name).to_string(),
                city: (*city).to_string(),
                country: (*country).to_string(),
                latitude: *lat,
                longitude: *lon,
                timezone: Some((*tz).to_string()),
            })
            .collect()
    }

    fn lookup_airport(&self, code: Option<&str>) -> Option<Airport> {
        code.and_then(|c| {
            let c = c.to_uppercase();
            self.airports().into_iter().find(|a| a.iata == c)
        })
    }

    /// Generate canonical flight records for a date range.
    ///
    /// 1-5 flights per day; unknown or absent origin/destination codes fall
    /// back to random distinct airports.
    pub fn flights(
        &self,
        origin: Option<&str>,
        destination: Option<&str>,
        date_from: NaiveDate,
        date_to: NaiveDate,
        limit: usize,
    ) -> Vec<FlightRecord> {
        let airports = self.airports();
        let mut rng = self.rng.lock().expect("rng lock poisoned");

        let origin_airport = self.lookup_airport(origin).unwrap_or_else(|| {
            airports[rng.gen_range(0..airports.len())].clone()
        });
        let dest_airport = self
            .lookup_airport(destination)
            .filter(|a| a.iata != origin_airport.iata)
            .unwrap_or_else(|| loop {
                let candidate = &airports[rng.gen_range(0..airports.len())];
                if candidate.iata != origin_airport.iata {
                    break candidate.clone();
                }
            });

        let mut flights = Vec::new();
        let mut date = date_from;

        while date <= date_to && flights.len() < limit {
            for _ in 0..rng.gen_range(1..=5) {
                if flights.len() >= limit {
                    break;
                }

                let duration_minutes =
                    rng.gen_range(1..=6) as i64 * 60 + rng.gen_range(0..60) as i64;
                // On the final day, cap the departure hour so the arrival
                // still lands within the requested range.
                let max_hour = if date == date_to {
                    (((1439 - duration_minutes - 45) / 60) as u32).min(22)
                } else {
                    22
                };
                let departure = Utc
                    .with_ymd_and_hms(
                        date.year(),
                        date.month(),
                        date.day(),
                        rng.gen_range(6..=max_hour),
                        [0u32, 15, 30, 45][rng.gen_range(0..4)],
                        0,
                    )
                    .single()
                    .expect("valid synthetic departure time");
                let arrival = departure + Duration::minutes(duration_minutes);

                let (airline_code, _) = AIRLINES[rng.gen_range(0..AIRLINES.len())];
                let (_, cap_lo, cap_hi) = AIRCRAFT[rng.gen_range(0..AIRCRAFT.len())];
                let capacity = rng.gen_range(cap_lo..=cap_hi);
                let booked = rng.gen_range(capacity / 2..=(capacity * 9 / 10).max(capacity / 2));

                // base price + distance factor + demand noise, floored positive
                let base_price: f64 = rng.gen_range(100.0..300.0);
                let distance: f64 = rng.gen_range(500.0..4000.0);
                let price =
                    ((base_price + distance * 0.1 + rng.gen_range(-50.0..100.0)) * 100.0).round()
                        / 100.0;
                let price = price.max(1.0);

                flights.push(FlightRecord {
                    id: Some(Uuid::new_v4().to_string()),
                    flight_number: Some(rng.gen_range(100..=9999)),
                    operating_airline: Some(airline_code.to_string()),
                    marketing_airline: Some(airline_code.to_string()),
                    origin: Some(origin_airport.iata.clone()),
                    destination: Some(dest_airport.iata.clone()),
                    departure_time: Some(departure.fixed_offset()),
                    arrival_time: Some(arrival.fixed_offset()),
                    booking_date: None,
                    cabin_class: Some(CabinClass::Economy),
                    price: Some(price),
                    base_fare: Some((price * 0.7 * 100.0).round() / 100.0),
                    taxes: None,
                    fees: None,
                    available_seats: Some(capacity - booked),
                    total_seats: Some(capacity),
                    flight_duration: Some(duration_minutes as f64),
                    distance: Some(distance),
                    currency: Some("AUD".to_string()),
                    data_source: Some("synthetic".to_string()),
                    quarantine: Default::default(),
                });
            }
            date += Duration::days(1);
        }

        flights
    }

    /// Generate flight offers in the normalized search-result shape.
    pub fn flight_offers(
        &self,
        origin: Option<&str>,
        destination: Option<&str>,
        date_from: NaiveDate,
        date_to: NaiveDate,
        limit: usize,
    ) -> Vec<FlightOffer> {
        self.flights(origin, destination, date_from, date_to, limit)
            .into_iter()
            .map(|record| {
                let departure = record
                    .departure_time
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default();
                let arrival = record
                    .arrival_time
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default();
                FlightOffer {
                    id: record.id.clone().unwrap_or_default(),
                    segments: vec![FlightSegment {
                        origin: record.origin.clone().unwrap_or_default(),
                        destination: record.destination.clone().unwrap_or_default(),
                        departure_time: departure,
                        arrival_time: arrival,
                        carrier_code: record.operating_airline.clone().unwrap_or_default(),
                        flight_number: record
                            .flight_number
                            .map(|n| n.to_string())
                            .unwrap_or_default(),
                        aircraft_code: None,
                        stops: 0,
                    }],
                    duration_minutes: record.flight_duration.map(|d| d as u32),
                    price_total: record.price.unwrap_or(0.0),
                    currency: record.currency.clone().unwrap_or_else(|| "AUD".into()),
                    bookable_seats: record.available_seats,
                    cabin_class: record.cabin_class,
                    data_source: "synthetic".to_string(),
                }
            })
            .collect()
    }

    /// Generate a market-demand time series for a route, oldest day first.
    pub fn market_data(
        &self,
        origin: Option<&str>,
        destination: Option<&str>,
        days: u32,
    ) -> Vec<MarketDataPoint> {
        let airports = self.airports();
        let mut rng = self.rng.lock().expect("rng lock poisoned");

        let origin_code = self
            .lookup_airport(origin)
            .map(|a| a.iata)
            .unwrap_or_else(|| airports[rng.gen_range(0..airports.len())].iata.clone());
        let dest_code = self
            .lookup_airport(destination)
            .map(|a| a.iata)
            .filter(|c| *c != origin_code)
            .unwrap_or_else(|| loop {
                let candidate = airports[rng.gen_range(0..airports.len())].iata.clone();
                if candidate != origin_code {
                    break candidate;
                }
            });

        let today = Utc::now().date_naive();
        let mut points: Vec<MarketDataPoint> = (0..days)
            .map(|day| {
                let date = today - Duration::days(day as i64);
                let is_weekend = date.weekday().num_days_from_monday() >= 5;
                let weekend_boost = if is_weekend { 1.5 } else { 1.0 };

                let base_demand: f64 = rng.gen_range(50.0..200.0);
                let mut search_volume =
                    (base_demand * weekend_boost * rng.gen_range(0.8..1.2)) as u32;

                // Morning and evening search windows draw more traffic
                let hour = rng.gen_range(0..24);
                if (7..10).contains(&hour) || (17..21).contains(&hour) {
                    search_volume = (search_volume as f64 * 1.3) as u32;
                }

                // 10-40% of searches convert to bookings
                let booking_count = (search_volume as f64 * rng.gen_range(0.1..0.4)) as u32;
                let conversion_rate = if search_volume > 0 {
                    (booking_count as f64 / search_volume as f64 * 100.0 * 100.0).round() / 100.0
                } else {
                    0.0
                };

                let avg_price = (rng.gen_range(150.0f64..500.0)
                    * if is_weekend { 1.2 } else { 1.0 }
                    * 100.0)
                    .round()
                    / 100.0;

                MarketDataPoint {
                    origin: origin_code.clone(),
                    destination: dest_code.clone(),
                    date,
                    search_volume,
                    booking_count,
                    conversion_rate,
                    average_price: avg_price,
                    min_price: (avg_price * rng.gen_range(0.7..0.95) * 100.0).round() / 100.0,
                    max_price: (avg_price * rng.gen_range(1.05..1.3) * 100.0).round() / 100.0,
                    load_factor: (rng.gen_range(60.0..95.0) * 10.0f64).round() / 10.0,
                    data_source: "mock".to_string(),
                }
            })
            .collect();

        points.sort_by_key(|p| p.date);
        points
    }

    /// Generate analytics for one airport over the past `days` days.
    ///
    /// An unknown airport code is caller input error, not a data-availability
    /// failure.
    pub fn airport_analytics(&self, airport_code: &str, days: u32) -> ServiceResult<AirportAnalytics> {
        let airport = self
            .lookup_airport(Some(airport_code))
            .ok_or_else(|| {
                ServiceError::Validation(format!("unknown airport code: {}", airport_code))
            })?;

        let mut others: Vec<Airport> = self
            .airports()
            .into_iter()
            .filter(|a| a.iata != airport.iata)
            .collect();

        let mut rng = self.rng.lock().expect("rng lock poisoned");

        // Random top-5 destination sample
        for i in (1..others.len()).rev() {
            others.swap(i, rng.gen_range(0..=i));
        }
        let top_destinations: Vec<DestinationStat> = others
            .into_iter()
            .take(5)
            .map(|dest| DestinationStat {
                airport: dest,
                flight_count: rng.gen_range(50..=200),
                average_price: (rng.gen_range(150.0..500.0) * 100.0f64).round() / 100.0,
                load_factor: (rng.gen_range(60.0..95.0) * 10.0f64).round() / 10.0,
            })
            .collect();

        let today = Utc::now().date_naive();
        let dates: Vec<NaiveDate> = (0..days).map(|i| today - Duration::days(i as i64)).collect();

        // Bounded random walk: next = prev + prev * uniform(-vol, vol)
        let mut walk = |base: f64, volatility: f64| -> Vec<f64> {
            let mut series = vec![(base * rng.gen_range(0.9..1.1) * 100.0).round() / 100.0];
            for _ in 1..days.max(1) {
                let prev = *series.last().expect("series is non-empty");
                let next = prev + prev * rng.gen_range(-volatility..volatility);
                series.push((next * 100.0).round() / 100.0);
            }
            series
        };

        let time_series = TimeSeriesSet {
            flights: walk(100.0, 0.15),
            passengers: walk(1000.0, 0.2),
            load_factors: walk(80.0, 0.1),
            average_fares: walk(250.0, 0.15),
            dates,
        };

        Ok(AirportAnalytics {
            airport,
            time_period: format!("Last {} days", days),
            total_flights: rng.gen_range(1000..=5000),
            total_passengers: rng.gen_range(100_000..=500_000),
            average_load_factor: (rng.gen_range(70.0..90.0) * 10.0f64).round() / 10.0,
            on_time_performance: (rng.gen_range(75.0..95.0) * 10.0f64).round() / 10.0,
            top_destinations,
            time_series,
            data_source: "mock".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn airports_are_fixed_reference_data() {
        let provider = SyntheticDataProvider::with_seed(1);
        let airports = provider.airports();
        assert_eq!(airports.len(), 10);
        assert!(airports.iter().any(|a| a.iata == "SYD"));
        assert!(airports.iter().all(|a| a.iata.len() == 3));
    }

    #[test]
    fn flights_stay_internally_consistent() {
        let provider = SyntheticDataProvider::with_seed(42);
        let from = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let flights = provider.flights(Some("SYD"), Some("MEL"), from, to, 100);

        assert!(!flights.is_empty());
        for flight in &flights {
            let avail = flight.available_seats.unwrap();
            let total = flight.total_seats.unwrap();
            assert!(avail <= total, "available seats exceed capacity");
            assert!(flight.price.unwrap() > 0.0, "price must be positive");
            let dep = flight.departure_time.unwrap();
            assert!(dep.date_naive() >= from && dep.date_naive() <= to);
            let arr = flight.arrival_time.unwrap();
            assert!(arr > dep);
            assert!(arr.date_naive() <= to, "arrival spills past the range");
            assert_eq!(flight.origin.as_deref(), Some("SYD"));
            assert_eq!(flight.destination.as_deref(), Some("MEL"));
        }
    }

    #[test]
    fn flights_respect_limit_and_daily_range() {
        let provider = SyntheticDataProvider::with_seed(7);
        let from = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 3, 30).unwrap();
        let flights = provider.flights(None, None, from, to, 10);
        assert!(flights.len() <= 10);
    }

    #[test]
    fn last_day_arrivals_stay_within_range() {
        // A single-day range is the worst case: every flight departs on the
        // final day, so a late departure plus a long duration would push the
        // arrival past it.
        let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        for seed in 0..20 {
            let provider = SyntheticDataProvider::with_seed(seed);
            let flights = provider.flights(Some("SYD"), Some("MEL"), day, day, 50);
            assert!(!flights.is_empty());
            for flight in &flights {
                assert_eq!(flight.arrival_time.unwrap().date_naive(), day);
            }
        }
    }

    #[test]
    fn market_data_conversion_rate_is_consistent() {
        let provider = SyntheticDataProvider::with_seed(3);
        let points = provider.market_data(Some("SYD"), Some("MEL"), 30);
        assert_eq!(points.len(), 30);
        for p in &points {
            assert!(p.booking_count <= p.search_volume);
            assert!(p.min_price <= p.average_price);
            assert!(p.max_price >= p.average_price);
            if p.search_volume == 0 {
                assert_eq!(p.conversion_rate, 0.0);
            }
        }
        // Sorted oldest first
        assert!(points.windows(2).all(|w| w[0].date <= w[1].date));
    }

    #[test]
    fn airport_analytics_unknown_code_is_validation_error() {
        let provider = SyntheticDataProvider::with_seed(5);
        let err = provider.airport_analytics("ZZZ", 30).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn airport_analytics_has_top5_and_series() {
        let provider = SyntheticDataProvider::with_seed(5);
        let analytics = provider.airport_analytics("SYD", 30).unwrap();
        assert_eq!(analytics.top_destinations.len(), 5);
        assert_eq!(analytics.time_series.dates.len(), 30);
        assert_eq!(analytics.time_series.flights.len(), 30);
        assert_eq!(analytics.time_series.average_fares.len(), 30);
    }

    #[test]
    fn seeded_provider_is_reproducible() {
        let from = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        let a = SyntheticDataProvider::with_seed(99).flights(Some("SYD"), Some("MEL"), from, to, 20);
        let b = SyntheticDataProvider::with_seed(99).flights(Some("SYD"), Some("MEL"), from, to, 20);
        let prices_a: Vec<f64> = a.iter().map(|f| f.price.unwrap()).collect();
        let prices_b: Vec<f64> = b.iter().map(|f| f.price.unwrap()).collect();
        assert_eq!(prices_a, prices_b);
    }
}
