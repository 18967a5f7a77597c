//! skymarket - airline market data aggregation
//!
//! Aggregates flight offers, airport reference data and market-demand
//! series from a chain of live providers with synthetic fallback, cleans
//! heterogeneous flight records into a canonical schema, computes market
//! analytics, and trains tree-ensemble demand models.

pub mod analytics;
pub mod cleaning;
pub mod config;
pub mod demand;
pub mod error;
pub mod executor;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod synthetic;

pub use crate::config::ServiceConfig;
pub use crate::error::{ProviderError, ServiceError, ServiceResult};
pub use crate::orchestrator::DataService;
