//! Data cleaning pipeline
//!
//! Pure, stateless, field-by-field normalization of raw flight records into
//! the canonical schema. A field that fails validation is moved into the
//! record's quarantine map under a `<field>_raw` key; the record itself is
//! always kept, so `clean_records(r).len() == r.len()` holds unconditionally.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::warn;

use crate::models::{CabinClass, FlightRecord, RawFlightRecord};

/// Clean a batch of raw records. Never drops a record.
pub fn clean_records(records: &[RawFlightRecord]) -> Vec<FlightRecord> {
    records.iter().map(clean_record).collect()
}

/// Clean one raw record field by field.
///
/// Rule order: dates, airport/airline codes, numeric fields, flight number,
/// then derived fields (id, duration, cabin class).
pub fn clean_record(raw: &RawFlightRecord) -> FlightRecord {
    let mut record = FlightRecord::default();

    // Dates: ISO-8601 strings or Unix epoch numbers
    record.departure_time = take_datetime(&mut record, "departure_time", &raw.departure_time);
    record.arrival_time = take_datetime(&mut record, "arrival_time", &raw.arrival_time);
    record.booking_date = take_datetime(&mut record, "booking_date", &raw.booking_date);

    // Airport and airline codes: 2-4 alphabetic characters, uppercased
    record.origin = take_code(&mut record, "origin", &raw.origin);
    record.destination = take_code(&mut record, "destination", &raw.destination);
    record.operating_airline = take_code(&mut record, "operating_airline", &raw.operating_airline);
    record.marketing_airline = take_code(&mut record, "marketing_airline", &raw.marketing_airline);

    // Numeric fields: strip currency junk, coerce, force non-negative
    record.price = take_number(&mut record, "price", &raw.price);
    record.base_fare = take_number(&mut record, "base_fare", &raw.base_fare);
    record.taxes = take_number(&mut record, "taxes", &raw.taxes);
    record.fees = take_number(&mut record, "fees", &raw.fees);
    record.flight_duration = take_number(&mut record, "flight_duration", &raw.flight_duration);
    record.distance = take_number(&mut record, "distance", &raw.distance);
    record.available_seats =
        take_number(&mut record, "available_seats", &raw.available_seats).map(|v| v.round() as u32);
    record.total_seats =
        take_number(&mut record, "total_seats", &raw.total_seats).map(|v| v.round() as u32);

    // Flight number: digits only
    record.flight_number = take_flight_number(&mut record, &raw.flight_number);

    // Pass-through fields
    record.id = raw.id.as_ref().and_then(value_to_string);
    record.currency = raw.currency.as_ref().and_then(value_to_string);
    record.data_source = raw.data_source.as_ref().and_then(value_to_string);

    // Derived: stable id from airline + flight number + origin + departure
    if record.id.is_none() {
        let parts: Vec<String> = [
            record.operating_airline.clone(),
            record.flight_number.map(|n| n.to_string()),
            record.origin.clone(),
            record.departure_time.map(|t| t.to_rfc3339()),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !parts.is_empty() {
            record.id = Some(parts.join("_"));
        }
    }

    // Derived: duration from arrival - departure when missing
    if record.flight_duration.is_none() {
        if let (Some(dep), Some(arr)) = (record.departure_time, record.arrival_time) {
            let minutes = (arr - dep).num_seconds() as f64 / 60.0;
            if minutes >= 0.0 {
                record.flight_duration = Some(minutes);
            }
        }
    }

    // Derived: cabin class from the booking-class letter
    if let Some(code) = raw.booking_class.as_ref().and_then(value_to_string) {
        record.cabin_class = CabinClass::from_booking_class(&code);
    }

    record
}

fn quarantine(record: &mut FlightRecord, field: &str, value: &Value) {
    record
        .quarantine
        .insert(format!("{}_raw", field), value.clone());
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn take_datetime(
    record: &mut FlightRecord,
    field: &str,
    value: &Option<Value>,
) -> Option<DateTime<FixedOffset>> {
    let value = value.as_ref()?;
    match parse_datetime(value) {
        Some(dt) => Some(dt),
        None => {
            warn!(field, raw = %value, "Unparseable date, quarantining");
            quarantine(record, field, value);
            None
        }
    }
}

/// Accept RFC 3339, a handful of common naive formats (assumed UTC), or a
/// Unix epoch number.
fn parse_datetime(value: &Value) -> Option<DateTime<FixedOffset>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt);
            }
            for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                    return Some(Utc.from_utc_datetime(&naive).fixed_offset());
                }
            }
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                let naive = date.and_hms_opt(0, 0, 0)?;
                return Some(Utc.from_utc_datetime(&naive).fixed_offset());
            }
            None
        }
        Value::Number(n) => {
            let secs = n.as_f64()?;
            Utc.timestamp_opt(secs as i64, 0)
                .single()
                .map(|dt| dt.fixed_offset())
        }
        _ => None,
    }
}

fn take_code(record: &mut FlightRecord, field: &str, value: &Option<Value>) -> Option<String> {
    let value = value.as_ref()?;
    let code = value_to_string(value)
        .map(|s| s.trim().to_uppercase())
        .filter(|c| (2..=4).contains(&c.len()) && c.chars().all(|ch| ch.is_ascii_alphabetic()));
    match code {
        Some(code) => Some(code),
        None => {
            warn!(field, raw = %value, "Invalid code, quarantining");
            quarantine(record, field, value);
            None
        }
    }
}

fn take_number(record: &mut FlightRecord, field: &str, value: &Option<Value>) -> Option<f64> {
    let value = value.as_ref()?;
    match parse_number(value) {
        Some(n) if n < 0.0 => {
            // Negative inputs are treated as sign errors, not semantic negatives
            warn!(field, value = n, "Negative numeric value, taking absolute value");
            Some(n.abs())
        }
        Some(n) => Some(n),
        None => {
            warn!(field, raw = %value, "Unparseable numeric value, quarantining");
            quarantine(record, field, value);
            None
        }
    }
}

/// Coerce a JSON number or a string with currency symbols / thousands
/// separators into a float.
fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let filtered: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            if filtered.is_empty() {
                return None;
            }
            filtered.parse::<f64>().ok().filter(|n| n.is_finite())
        }
        _ => None,
    }
}

fn take_flight_number(record: &mut FlightRecord, value: &Option<Value>) -> Option<u32> {
    let value = value.as_ref()?;
    let number = match value {
        Value::Number(n) => n.as_u64().map(|n| n as u32),
        Value::String(s) => {
            let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
            digits.parse::<u32>().ok()
        }
        _ => None,
    };
    match number {
        Some(n) => Some(n),
        None => {
            warn!(raw = %value, "Invalid flight number, quarantining");
            quarantine(record, "flight_number", value);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawFlightRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn cleans_the_typical_messy_record() {
        let record = clean_record(&raw(json!({
            "origin": "  syd  ",
            "price": "$199.99",
            "available_seats": "150",
            "flight_number": "QF400",
            "booking_class": "Y"
        })));

        assert_eq!(record.origin.as_deref(), Some("SYD"));
        assert_eq!(record.price, Some(199.99));
        assert_eq!(record.available_seats, Some(150));
        assert_eq!(record.flight_number, Some(400));
        assert_eq!(record.cabin_class, Some(CabinClass::Economy));
        assert!(record.quarantine.is_empty());
    }

    #[test]
    fn never_drops_a_record() {
        let records = vec![
            raw(json!({"origin": "SYD", "price": 100.0})),
            raw(json!({"origin": "not-a-code", "price": "free!!", "departure_time": "garbage"})),
            raw(json!({})),
        ];
        let cleaned = clean_records(&records);
        assert_eq!(cleaned.len(), records.len());
    }

    #[test]
    fn invalid_fields_are_quarantined_not_fatal() {
        let record = clean_record(&raw(json!({
            "origin": "x",
            "departure_time": "not a date",
            "price": "uh oh",
            "destination": "MEL"
        })));

        assert!(record.origin.is_none());
        assert!(record.departure_time.is_none());
        assert!(record.price.is_none());
        assert_eq!(record.destination.as_deref(), Some("MEL"));
        assert_eq!(record.quarantine.get("origin_raw"), Some(&json!("x")));
        assert_eq!(
            record.quarantine.get("departure_time_raw"),
            Some(&json!("not a date"))
        );
        assert_eq!(record.quarantine.get("price_raw"), Some(&json!("uh oh")));
    }

    #[test]
    fn negative_numbers_become_absolute() {
        let record = clean_record(&raw(json!({"price": -250.5, "taxes": "-10.00"})));
        assert_eq!(record.price, Some(250.5));
        assert_eq!(record.taxes, Some(10.0));
    }

    #[test]
    fn epoch_timestamps_normalize_to_rfc3339() {
        let record = clean_record(&raw(json!({"departure_time": 1717200000})));
        let dt = record.departure_time.unwrap();
        assert_eq!(dt.timestamp(), 1_717_200_000);
    }

    #[test]
    fn timezone_offsets_are_preserved() {
        let record = clean_record(&raw(json!({"departure_time": "2026-06-01T08:30:00+10:00"})));
        let dt = record.departure_time.unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 10 * 3600);
    }

    #[test]
    fn id_is_synthesized_from_parts_when_missing() {
        let record = clean_record(&raw(json!({
            "operating_airline": "QF",
            "flight_number": "QF400",
            "origin": "SYD",
            "departure_time": "2026-06-01T08:30:00+10:00"
        })));
        let id = record.id.unwrap();
        assert!(id.starts_with("QF_400_SYD_"));
    }

    #[test]
    fn duration_is_derived_from_timestamps() {
        let record = clean_record(&raw(json!({
            "departure_time": "2026-06-01T08:00:00+00:00",
            "arrival_time": "2026-06-01T09:30:00+00:00"
        })));
        assert_eq!(record.flight_duration, Some(90.0));
    }

    #[test]
    fn existing_duration_is_not_overwritten() {
        let record = clean_record(&raw(json!({
            "departure_time": "2026-06-01T08:00:00+00:00",
            "arrival_time": "2026-06-01T09:30:00+00:00",
            "flight_duration": 95
        })));
        assert_eq!(record.flight_duration, Some(95.0));
    }

    #[test]
    fn unmapped_booking_class_leaves_cabin_unset() {
        let record = clean_record(&raw(json!({"booking_class": "X"})));
        assert!(record.cabin_class.is_none());
        assert!(!record.quarantine.contains_key("booking_class_raw"));
    }
}
