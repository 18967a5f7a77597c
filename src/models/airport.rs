//! Airport reference data

use serde::{Deserialize, Serialize};

/// An airport, keyed by its 3-letter IATA code.
///
/// Immutable reference data. Created once per session and used as a
/// join target by code; never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    /// 3-letter IATA code, uppercase (e.g. "SYD")
    pub iata: String,
    /// 4-letter ICAO code where known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icao: Option<String>,
    pub name: String,
    pub city: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    /// IANA timezone name (e.g. "Australia/Sydney")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl Airport {
    /// Case-insensitive match against name, city, country, IATA or ICAO code.
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.name.to_lowercase().contains(&term)
            || self.city.to_lowercase().contains(&term)
            || self.country.to_lowercase().contains(&term)
            || self.iata.to_lowercase() == term
            || self
                .icao
                .as_ref()
                .is_some_and(|icao| icao.to_lowercase() == term)
    }
}
