//! Feature engineering for demand prediction
//!
//! Turns a chronological series of route-level demand observations into
//! numeric feature matrices: calendar features, an Australian-holiday and
//! seasonal demand factor, shifted 7-day rolling means and price momentum,
//! plus one-hot route encoding via a fitted transformer.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};
use crate::models::MarketDataPoint;

/// One labelled training row: a route-day with its realized demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandObservation {
    pub origin: String,
    pub destination: String,
    pub date: NaiveDate,
    /// Average fare observed for the route-day
    pub price: f64,
    /// Target: realized bookings for the route-day
    pub demand: f64,
}

impl From<&MarketDataPoint> for DemandObservation {
    fn from(point: &MarketDataPoint) -> Self {
        Self {
            origin: point.origin.clone(),
            destination: point.destination.clone(),
            date: point.date,
            price: point.average_price,
            demand: point.booking_count as f64,
        }
    }
}

/// Fixed-date Australian public holidays (month, day).
const HOLIDAYS: &[(u32, u32)] = &[
    (1, 1),   // New Year's Day
    (1, 26),  // Australia Day
    (4, 25),  // Anzac Day
    (12, 25), // Christmas Day
    (12, 26), // Boxing Day
];

pub fn is_holiday(date: NaiveDate) -> bool {
    HOLIDAYS.contains(&(date.month(), date.day()))
}

/// Demand multiplier for a calendar day: holidays dominate, then the
/// southern-summer school-holiday months, then the off-peak trough.
pub fn seasonal_factor(date: NaiveDate) -> f64 {
    if is_holiday(date) {
        1.5
    } else {
        match date.month() {
            12 | 1 => 1.3,
            2 | 5 | 8 => 0.8,
            _ => 1.0,
        }
    }
}

/// Names of the numeric features, in matrix column order (before one-hot
/// columns are appended).
pub const NUMERIC_FEATURES: &[&str] = &[
    "price",
    "day_of_week",
    "day_of_month",
    "month",
    "is_weekend",
    "is_holiday",
    "seasonal_factor",
    "price_7d_mean",
    "demand_7d_mean",
    "price_pct_change",
];

/// One engineered row before encoding. Lag features are `None` where the
/// route has no history yet; the transformer imputes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRow {
    pub numeric: Vec<Option<f64>>,
    pub origin: String,
    pub destination: String,
}

/// Engineer features for a chronological observation series.
///
/// Rolling windows are shifted by one day so a row never sees its own
/// target; windows are computed per route.
pub fn engineer_features(observations: &[DemandObservation]) -> Vec<FeatureRow> {
    let mut sorted: Vec<&DemandObservation> = observations.iter().collect();
    sorted.sort_by_key(|o| o.date);

    sorted
        .iter()
        .enumerate()
        .map(|(i, obs)| {
            // Trailing per-route history, excluding the current row
            let history: Vec<&&DemandObservation> = sorted[..i]
                .iter()
                .filter(|h| h.origin == obs.origin && h.destination == obs.destination)
                .collect();

            let window: Vec<&&&DemandObservation> = history
                .iter()
                .filter(|h| (obs.date - h.date).num_days() <= 7)
                .collect();

            let price_7d_mean = mean_of(window.iter().map(|h| h.price));
            let demand_7d_mean = mean_of(window.iter().map(|h| h.demand));
            let price_pct_change = history.last().and_then(|prev| {
                (prev.price != 0.0).then(|| (obs.price - prev.price) / prev.price)
            });

            let weekday = obs.date.weekday().num_days_from_monday();
            FeatureRow {
                numeric: vec![
                    Some(obs.price),
                    Some(weekday as f64),
                    Some(obs.date.day() as f64),
                    Some(obs.date.month() as f64),
                    Some(if weekday >= 5 { 1.0 } else { 0.0 }),
                    Some(if is_holiday(obs.date) { 1.0 } else { 0.0 }),
                    Some(seasonal_factor(obs.date)),
                    price_7d_mean,
                    demand_7d_mean,
                    price_pct_change,
                ],
                origin: obs.origin.clone(),
                destination: obs.destination.clone(),
            }
        })
        .collect()
}

/// Targets aligned with [`engineer_features`] output order.
pub fn targets(observations: &[DemandObservation]) -> Vec<f64> {
    let mut sorted: Vec<&DemandObservation> = observations.iter().collect();
    sorted.sort_by_key(|o| o.date);
    sorted.iter().map(|o| o.demand).collect()
}

fn mean_of(values: impl Iterator<Item = f64>) -> Option<f64> {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Fitted encoding state: numeric medians for imputation, means and standard
/// deviations for scaling, and route vocabularies for one-hot columns.
///
/// Unseen categories at transform time encode as all-zero one-hot blocks
/// rather than failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureTransformer {
    medians: Vec<f64>,
    means: Vec<f64>,
    stds: Vec<f64>,
    origins: Vec<String>,
    destinations: Vec<String>,
}

impl FeatureTransformer {
    pub fn fit(rows: &[FeatureRow]) -> ServiceResult<Self> {
        if rows.is_empty() {
            return Err(ServiceError::Validation(
                "cannot fit a transformer on zero rows".to_string(),
            ));
        }

        let width = NUMERIC_FEATURES.len();
        let mut medians = Vec::with_capacity(width);
        for col in 0..width {
            let mut present: Vec<f64> = rows.iter().filter_map(|r| r.numeric[col]).collect();
            present.sort_by(|a, b| a.partial_cmp(b).expect("no NaN features"));
            medians.push(match present.len() {
                0 => 0.0,
                n if n % 2 == 0 => (present[n / 2 - 1] + present[n / 2]) / 2.0,
                n => present[n / 2],
            });
        }

        let mut means = Vec::with_capacity(width);
        let mut stds = Vec::with_capacity(width);
        for col in 0..width {
            let values: Vec<f64> = rows
                .iter()
                .map(|r| r.numeric[col].unwrap_or(medians[col]))
                .collect();
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let variance =
                values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
            means.push(mean);
            // Constant columns scale by 1 so they encode as zeros
            stds.push(if variance > 0.0 { variance.sqrt() } else { 1.0 });
        }

        let mut origins: Vec<String> = rows.iter().map(|r| r.origin.clone()).collect();
        origins.sort();
        origins.dedup();
        let mut destinations: Vec<String> = rows.iter().map(|r| r.destination.clone()).collect();
        destinations.sort();
        destinations.dedup();

        Ok(Self {
            medians,
            means,
            stds,
            origins,
            destinations,
        })
    }

    /// Encoded width: scaled numerics plus both one-hot blocks.
    pub fn width(&self) -> usize {
        NUMERIC_FEATURES.len() + self.origins.len() + self.destinations.len()
    }

    pub fn transform(&self, row: &FeatureRow) -> Vec<f64> {
        let mut encoded = Vec::with_capacity(self.width());
        for col in 0..NUMERIC_FEATURES.len() {
            let value = row.numeric[col].unwrap_or(self.medians[col]);
            encoded.push((value - self.means[col]) / self.stds[col]);
        }
        for origin in &self.origins {
            encoded.push(if *origin == row.origin { 1.0 } else { 0.0 });
        }
        for destination in &self.destinations {
            encoded.push(if *destination == row.destination { 1.0 } else { 0.0 });
        }
        encoded
    }

    pub fn transform_all(&self, rows: &[FeatureRow]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.transform(r)).collect()
    }
}
