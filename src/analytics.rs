//! Market analytics engine
//!
//! Pure synchronous computations over cleaned flight records: time-bucketed
//! market trends, rolling z-score price anomaly detection, and demand
//! metrics relative to days-until-departure and advance purchase.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};
use crate::models::FlightRecord;

/// Time bucket for trend aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeBucket {
    Hour,
    Day,
    Week,
    Month,
}

impl TimeBucket {
    /// Parse a caller-supplied bucket name. Unknown names are a hard
    /// validation error, never silently defaulted.
    pub fn parse(name: &str) -> ServiceResult<Self> {
        match name.to_lowercase().as_str() {
            "hour" => Ok(TimeBucket::Hour),
            "day" => Ok(TimeBucket::Day),
            "week" => Ok(TimeBucket::Week),
            "month" => Ok(TimeBucket::Month),
            other => Err(ServiceError::Validation(format!(
                "invalid group_by value: {}. Must be one of: hour, day, week, month",
                other
            ))),
        }
    }

    /// Truncate a timestamp to the start of its bucket (weeks start Monday).
    fn bucket_start(&self, dt: DateTime<FixedOffset>) -> NaiveDateTime {
        let utc = dt.with_timezone(&Utc).naive_utc();
        match self {
            TimeBucket::Hour => utc
                .date()
                .and_hms_opt(utc.hour(), 0, 0)
                .expect("valid truncated hour"),
            TimeBucket::Day => utc.date().and_hms_opt(0, 0, 0).expect("valid midnight"),
            TimeBucket::Week => {
                let days_from_monday = utc.date().weekday().num_days_from_monday() as i64;
                (utc.date() - Duration::days(days_from_monday))
                    .and_hms_opt(0, 0, 0)
                    .expect("valid midnight")
            }
            TimeBucket::Month => utc
                .date()
                .with_day(1)
                .expect("day 1 exists in every month")
                .and_hms_opt(0, 0, 0)
                .expect("valid midnight"),
        }
    }
}

/// Distribution summary for prices in one bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub count: usize,
}

/// Seat availability summary for one bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatStats {
    pub sum: u64,
    pub mean: f64,
    pub count: usize,
}

/// Load factor summary for one bucket (requires both seat fields).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadFactorStats {
    pub mean: f64,
    pub median: f64,
}

/// Aggregates for one time bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendBucket {
    pub period_start: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<PriceStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_seats: Option<SeatStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_factor: Option<LoadFactorStats>,
}

/// Group cleaned records into time buckets and aggregate price, seat and
/// load-factor metrics. Records without a departure time cannot be bucketed
/// and are skipped.
pub fn calculate_market_trends(
    records: &[FlightRecord],
    group_by: &str,
) -> ServiceResult<Vec<TrendBucket>> {
    let bucket = TimeBucket::parse(group_by)?;

    let mut groups: BTreeMap<NaiveDateTime, Vec<&FlightRecord>> = BTreeMap::new();
    for record in records {
        if let Some(dep) = record.departure_time {
            groups.entry(bucket.bucket_start(dep)).or_default().push(record);
        }
    }

    let trends = groups
        .into_iter()
        .map(|(period_start, members)| {
            let prices: Vec<f64> = members.iter().filter_map(|r| r.price).collect();
            let seats: Vec<u32> = members.iter().filter_map(|r| r.available_seats).collect();
            let load_factors: Vec<f64> = members.iter().filter_map(|r| r.load_factor()).collect();

            TrendBucket {
                period_start,
                price: (!prices.is_empty()).then(|| PriceStats {
                    min: prices.iter().cloned().fold(f64::INFINITY, f64::min),
                    max: prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
                    mean: mean(&prices),
                    median: median(&prices),
                    count: prices.len(),
                }),
                available_seats: (!seats.is_empty()).then(|| SeatStats {
                    sum: seats.iter().map(|&s| s as u64).sum(),
                    mean: mean(&seats.iter().map(|&s| s as f64).collect::<Vec<_>>()),
                    count: seats.len(),
                }),
                load_factor: (!load_factors.is_empty()).then(|| LoadFactorStats {
                    mean: mean(&load_factors),
                    median: median(&load_factors),
                }),
            }
        })
        .collect();

    Ok(trends)
}

/// A priced record annotated with its rolling z-score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceAnomaly {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departure_time: Option<DateTime<FixedOffset>>,
    pub price: f64,
    /// None when the rolling window has no defined variance (single sample
    /// or constant prices), where no anomaly judgment is possible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_score: Option<f64>,
    pub is_anomaly: bool,
}

/// Detect price anomalies with a trailing rolling z-score.
///
/// Records are sorted by departure time; each price is scored against the
/// rolling mean/std of the trailing `window` prices (minimum one sample).
/// `|z| > threshold` flags an anomaly. A zero-variance window yields no
/// z-score and never flags.
pub fn detect_price_anomalies(
    records: &[FlightRecord],
    window: usize,
    threshold: f64,
) -> Vec<PriceAnomaly> {
    let window = window.max(1);

    let mut priced: Vec<&FlightRecord> = records.iter().filter(|r| r.price.is_some()).collect();
    priced.sort_by_key(|r| r.departure_time);

    let prices: Vec<f64> = priced
        .iter()
        .map(|r| r.price.expect("filtered to priced records"))
        .collect();

    priced
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let start = i.saturating_sub(window - 1);
            let slice = &prices[start..=i];
            let roll_mean = mean(slice);
            let roll_std = sample_std(slice);

            let z_score = match roll_std {
                Some(std) if std > 0.0 => Some((prices[i] - roll_mean) / std),
                _ => None,
            };

            PriceAnomaly {
                record_id: record.id.clone(),
                departure_time: record.departure_time,
                price: prices[i],
                z_score,
                is_anomaly: z_score.is_some_and(|z| z.abs() > threshold),
            }
        })
        .collect()
}

/// Mean/median/count of prices in one advance-purchase or
/// days-until-departure bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub mean: f64,
    pub median: f64,
    pub count: usize,
}

/// Demand metrics over a lookback window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DemandMetrics {
    /// Price statistics keyed by days until departure (relative to the
    /// reference date; past departures are negative)
    pub price_trend: BTreeMap<i64, CurvePoint>,
    /// Price statistics keyed by days booked in advance; empty when no
    /// booking dates are present
    pub booking_curve: BTreeMap<i64, CurvePoint>,
}

/// Compute demand metrics for records departing within `lookback_days`
/// before `reference_date`.
pub fn calculate_demand_metrics(
    records: &[FlightRecord],
    reference_date: NaiveDate,
    lookback_days: u32,
) -> DemandMetrics {
    let ref_start = reference_date - Duration::days(lookback_days as i64);

    let in_window: Vec<&FlightRecord> = records
        .iter()
        .filter(|r| {
            r.departure_time.is_some_and(|dep| {
                let d = dep.date_naive();
                d >= ref_start && d <= reference_date
            })
        })
        .collect();

    let mut price_trend: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
    let mut booking_curve: BTreeMap<i64, Vec<f64>> = BTreeMap::new();

    for record in &in_window {
        let Some(price) = record.price else { continue };
        let Some(dep) = record.departure_time else { continue };

        let days_until = (dep.date_naive() - reference_date).num_days();
        price_trend.entry(days_until).or_default().push(price);

        if let Some(booked) = record.booking_date {
            let advance = (dep.date_naive() - booked.date_naive()).num_days();
            booking_curve.entry(advance).or_default().push(price);
        }
    }

    DemandMetrics {
        price_trend: summarize(price_trend),
        booking_curve: summarize(booking_curve),
    }
}

fn summarize(groups: BTreeMap<i64, Vec<f64>>) -> BTreeMap<i64, CurvePoint> {
    groups
        .into_iter()
        .map(|(key, values)| {
            (
                key,
                CurvePoint {
                    mean: mean(&values),
                    median: median(&values),
                    count: values.len(),
                },
            )
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("no NaN prices"));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Sample standard deviation (ddof = 1). None for fewer than two samples.
fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}
