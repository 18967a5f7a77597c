//! Data models for skymarket
//!
//! Canonical shapes shared across providers, the cleaning pipeline and the
//! analytics engine, plus the uniform response envelope every orchestrated
//! operation returns.

pub mod airport;
pub mod envelope;
pub mod flight;
pub mod market;

pub use airport::Airport;
pub use envelope::{ResponseMetadata, SourcedResponse};
pub use flight::{CabinClass, FlightOffer, FlightRecord, FlightSegment, RawFlightRecord};
pub use market::{AirportAnalytics, DestinationStat, MarketDataPoint, TimeSeriesSet};
