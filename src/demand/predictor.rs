//! Demand predictor facade
//!
//! Trains a tree ensemble on engineered demand features with a
//! chronological train/test split, reports holdout error metrics, and
//! persists the fitted transformer and model as one JSON artifact written
//! atomically.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::demand::features::{self, DemandObservation, FeatureTransformer};
use crate::demand::forest::{GradientBoosting, RandomForest, TreeParams};
use crate::error::{ServiceError, ServiceResult};

const ARTIFACT_VERSION: u32 = 1;

/// Fewest observations accepted for training; below this the holdout split
/// is meaningless.
const MIN_TRAINING_SAMPLES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    RandomForest,
    GradientBoosting,
}

impl Algorithm {
    pub fn parse(name: &str) -> ServiceResult<Self> {
        match name.to_lowercase().replace(['-', '_'], "").as_str() {
            "randomforest" => Ok(Algorithm::RandomForest),
            "gradientboosting" => Ok(Algorithm::GradientBoosting),
            other => Err(ServiceError::Validation(format!(
                "unknown algorithm: {} (expected random_forest or gradient_boosting)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum FittedModel {
    Forest(RandomForest),
    Boosting(GradientBoosting),
}

impl FittedModel {
    fn predict(&self, row: &[f64]) -> f64 {
        match self {
            FittedModel::Forest(model) => model.predict(row),
            FittedModel::Boosting(model) => model.predict(row),
        }
    }
}

/// Holdout metrics from the chronological split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub algorithm: Algorithm,
    pub train_size: usize,
    pub test_size: usize,
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    pub r2: f64,
}

/// A trained demand model with its feature transformer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandPredictor {
    transformer: FeatureTransformer,
    model: FittedModel,
    pub report: TrainingReport,
}

/// On-disk shape of a persisted predictor.
#[derive(Debug, Serialize, Deserialize)]
struct ModelArtifact {
    format_version: u32,
    trained_at: DateTime<Utc>,
    predictor: DemandPredictor,
}

impl DemandPredictor {
    /// Train on a demand series. The holdout is the chronologically last 20%
    /// of the data, never a random sample: the model must predict forward.
    pub fn train(
        observations: &[DemandObservation],
        algorithm: Algorithm,
        params: &TreeParams,
    ) -> ServiceResult<Self> {
        if observations.len() < MIN_TRAINING_SAMPLES {
            return Err(ServiceError::Validation(format!(
                "need at least {} observations to train, got {}",
                MIN_TRAINING_SAMPLES,
                observations.len()
            )));
        }

        let rows = features::engineer_features(observations);
        let y = features::targets(observations);

        let split = (rows.len() * 4 / 5).max(1).min(rows.len() - 1);
        let transformer = FeatureTransformer::fit(&rows[..split])?;
        let x = transformer.transform_all(&rows);

        let (x_train, x_test) = x.split_at(split);
        let (y_train, y_test) = y.split_at(split);

        let model = match algorithm {
            Algorithm::RandomForest => {
                FittedModel::Forest(RandomForest::fit(x_train, y_train, params)?)
            }
            Algorithm::GradientBoosting => {
                FittedModel::Boosting(GradientBoosting::fit(x_train, y_train, params)?)
            }
        };

        let predicted: Vec<f64> = x_test.iter().map(|row| model.predict(row)).collect();
        let report = evaluate(algorithm, y_test, &predicted, x_train.len());

        info!(
            algorithm = ?algorithm,
            train = report.train_size,
            test = report.test_size,
            mae = report.mae,
            r2 = report.r2,
            "Trained demand model"
        );

        Ok(Self {
            transformer,
            model,
            report,
        })
    }

    /// Score a demand series. Callers include enough trailing history for
    /// the lag features; predictions are returned in chronological order.
    pub fn predict(&self, observations: &[DemandObservation]) -> Vec<f64> {
        let rows = features::engineer_features(observations);
        self.transformer
            .transform_all(&rows)
            .iter()
            .map(|row| self.model.predict(row))
            .collect()
    }

    /// Persist as JSON, written to a sibling temp file then renamed so a
    /// crash never leaves a truncated artifact.
    pub fn save(&self, path: &Path) -> ServiceResult<()> {
        let artifact = ModelArtifact {
            format_version: ARTIFACT_VERSION,
            trained_at: Utc::now(),
            predictor: self.clone(),
        };
        let json = serde_json::to_vec_pretty(&artifact)
            .map_err(|e| ServiceError::Model(format!("serialize model: {}", e)))?;

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json)
            .map_err(|e| ServiceError::Model(format!("write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, path)
            .map_err(|e| ServiceError::Model(format!("rename to {}: {}", path.display(), e)))?;

        info!(path = %path.display(), "Saved demand model artifact");
        Ok(())
    }

    pub fn load(path: &Path) -> ServiceResult<Self> {
        let json = fs::read(path)
            .map_err(|e| ServiceError::Model(format!("read {}: {}", path.display(), e)))?;
        let artifact: ModelArtifact = serde_json::from_slice(&json)
            .map_err(|e| ServiceError::Model(format!("parse {}: {}", path.display(), e)))?;

        if artifact.format_version != ARTIFACT_VERSION {
            return Err(ServiceError::Model(format!(
                "unsupported artifact version {} (expected {})",
                artifact.format_version, ARTIFACT_VERSION
            )));
        }
        Ok(artifact.predictor)
    }
}

fn evaluate(
    algorithm: Algorithm,
    actual: &[f64],
    predicted: &[f64],
    train_size: usize,
) -> TrainingReport {
    let n = actual.len() as f64;
    let mae = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / n;
    let mse = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p) * (a - p))
        .sum::<f64>()
        / n;

    let mean_actual = actual.iter().sum::<f64>() / n;
    let ss_tot = actual
        .iter()
        .map(|a| (a - mean_actual) * (a - mean_actual))
        .sum::<f64>();
    let ss_res = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p) * (a - p))
        .sum::<f64>();
    // A constant holdout has no variance to explain
    let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

    TrainingReport {
        algorithm,
        train_size,
        test_size: actual.len(),
        mae,
        mse,
        rmse: mse.sqrt(),
        r2,
    }
}
