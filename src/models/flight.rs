//! Flight offer and flight record shapes
//!
//! `FlightOffer` is the normalized search-result shape every provider client
//! produces. `RawFlightRecord` is the loosely-typed input to the cleaning
//! pipeline; `FlightRecord` is its canonical, validated output with a
//! quarantine side-map for fields that failed validation.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cabin class derived from single-letter booking class codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CabinClass {
    First,
    Business,
    Economy,
}

impl CabinClass {
    /// Map a booking-class letter to a cabin, per the fixed IATA letter sets.
    /// Unmapped letters return `None` and the cabin is left unset.
    pub fn from_booking_class(code: &str) -> Option<Self> {
        let code = code.trim().to_uppercase();
        match code.as_str() {
            "F" | "A" | "P" => Some(CabinClass::First),
            "J" | "C" | "D" | "I" | "Z" => Some(CabinClass::Business),
            "W" | "E" | "Y" | "B" | "M" | "H" | "Q" | "K" | "L" | "V" | "S" | "N" => {
                Some(CabinClass::Economy)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CabinClass::First => "First",
            CabinClass::Business => "Business",
            CabinClass::Economy => "Economy",
        }
    }
}

/// One flight segment inside an offer itinerary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightSegment {
    pub origin: String,
    pub destination: String,
    pub departure_time: String,
    pub arrival_time: String,
    pub carrier_code: String,
    pub flight_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aircraft_code: Option<String>,
    pub stops: u32,
}

/// A normalized flight offer as returned by flight search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightOffer {
    pub id: String,
    pub segments: Vec<FlightSegment>,
    /// Total duration in minutes across the itinerary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    pub price_total: f64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bookable_seats: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cabin_class: Option<CabinClass>,
    /// Which provider produced this offer
    pub data_source: String,
}

impl FlightOffer {
    /// All marketing carrier codes appearing in the offer's segments.
    pub fn carrier_codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.segments.iter().map(|s| s.carrier_code.as_str()).collect();
        codes.dedup();
        codes
    }
}

/// A raw flight record before cleaning.
///
/// Every field is an untyped JSON value because upstream sources disagree on
/// formats: dates arrive as ISO strings or epoch numbers, prices as numbers
/// or currency strings, seat counts as numbers or numeric strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFlightRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flight_number: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_airline: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketing_airline: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_time: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival_time: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_date: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_class: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_fare: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxes: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fees: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_seats: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_seats: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flight_duration: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<Value>,
}

/// A canonical flight record after cleaning.
///
/// Invariants: every numeric field is non-negative; every timestamp parses as
/// RFC 3339. Fields that failed validation live in `quarantine` under a
/// `<field>_raw` key; the record itself is never dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlightRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flight_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operating_airline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marketing_airline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departure_time: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival_time: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_date: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cabin_class: Option<CabinClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_fare: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxes: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fees: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_seats: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_seats: Option<u32>,
    /// Duration in minutes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flight_duration: Option<f64>,
    /// Distance in kilometers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    /// Raw values for fields that failed validation, keyed `<field>_raw`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub quarantine: BTreeMap<String, Value>,
}

impl FlightRecord {
    /// Booked-seat percentage when both seat counts are present.
    pub fn load_factor(&self) -> Option<f64> {
        match (self.available_seats, self.total_seats) {
            (Some(avail), Some(total)) if total > 0 => {
                Some((total.saturating_sub(avail)) as f64 / total as f64 * 100.0)
            }
            _ => None,
        }
    }
}
