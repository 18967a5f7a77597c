//! Uniform response envelope
//!
//! Every orchestrated operation returns its data wrapped in provenance
//! metadata: which source produced it, whether it came from a fallback in
//! the priority chain, and whether it is synthetic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provenance metadata attached to every response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Name of the winning source (e.g. "gds", "tracker", "synthetic")
    pub source: String,
    /// True when the data came from the synthetic generator
    pub is_mock: bool,
    /// True when the winning source was not the first in the priority chain
    pub fallback: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl ResponseMetadata {
    pub fn live(source: &str, fallback: bool) -> Self {
        Self {
            source: source.to_string(),
            is_mock: false,
            fallback,
            warnings: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn synthetic(warning: impl Into<String>) -> Self {
        Self {
            source: "synthetic".to_string(),
            is_mock: true,
            fallback: true,
            warnings: vec![warning.into()],
            timestamp: Utc::now(),
        }
    }
}

/// A data payload plus its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcedResponse<T> {
    pub data: Vec<T>,
    pub metadata: ResponseMetadata,
}

impl<T> SourcedResponse<T> {
    pub fn new(data: Vec<T>, metadata: ResponseMetadata) -> Self {
        Self { data, metadata }
    }

    pub fn count(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_metadata_is_flagged_and_warned() {
        let meta = ResponseMetadata::synthetic("all live sources failed");
        assert!(meta.is_mock);
        assert!(meta.fallback);
        assert_eq!(meta.source, "synthetic");
        assert_eq!(meta.warnings.len(), 1);
    }

    #[test]
    fn live_metadata_has_no_warnings() {
        let meta = ResponseMetadata::live("gds", false);
        assert!(!meta.is_mock);
        assert!(!meta.fallback);
        assert!(meta.warnings.is_empty());
    }
}
