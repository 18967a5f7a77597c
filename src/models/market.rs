//! Market demand data shapes

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Airport;

/// One day of market demand for a route.
///
/// Derived data, recomputed per request; persistence is a caller concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataPoint {
    pub origin: String,
    pub destination: String,
    pub date: NaiveDate,
    pub search_volume: u32,
    pub booking_count: u32,
    /// Percentage, bookings / searches; 0 when search_volume is 0
    pub conversion_rate: f64,
    pub average_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    /// Percentage 0-100
    pub load_factor: f64,
    /// Provenance flag: "mock", "real" or "predicted"
    pub data_source: String,
}

/// Traffic summary for one destination out of an airport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationStat {
    pub airport: Airport,
    pub flight_count: u32,
    pub average_price: f64,
    pub load_factor: f64,
}

/// Day-indexed time series bundle for airport analytics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeriesSet {
    pub dates: Vec<NaiveDate>,
    pub flights: Vec<f64>,
    pub passengers: Vec<f64>,
    pub load_factors: Vec<f64>,
    pub average_fares: Vec<f64>,
}

/// Aggregate analytics for a single airport over a period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirportAnalytics {
    pub airport: Airport,
    pub time_period: String,
    pub total_flights: u32,
    pub total_passengers: u32,
    pub average_load_factor: f64,
    pub on_time_performance: f64,
    pub top_destinations: Vec<DestinationStat>,
    pub time_series: TimeSeriesSet,
    pub data_source: String,
}
