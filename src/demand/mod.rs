//! Demand prediction
//!
//! A small regression stack over market-demand observations: calendar and
//! lag feature engineering, a fitted feature transformer, tree-ensemble
//! regressors and a predictor facade with chronological evaluation and
//! artifact persistence.

pub mod features;
pub mod forest;
pub mod predictor;

pub use features::{DemandObservation, FeatureTransformer};
pub use forest::{GradientBoosting, RandomForest, TreeParams};
pub use predictor::{Algorithm, DemandPredictor, TrainingReport};
