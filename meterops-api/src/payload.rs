//! Request payload parsing and validation
//!
//! A sync batch is validated as a whole before anything is written: one bad
//! reading rejects the batch. Issues are collected for logging; clients only
//! see a generic message.

use chrono::{DateTime, Utc};
use meterops_common::db::{CaptureMethod, GpsPoint, ReadingStatus, ReviewDecision};
use meterops_common::time::parse_rfc3339;
use serde::Deserialize;

use crate::db::readings::NewReading;

/// Reading as sent by a capture device
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingPayload {
    pub reading_id: String,
    pub account_number: String,
    pub reading_value: f64,
    pub confidence: f64,
    pub method: CaptureMethod,
    pub status: ReadingStatus,
    #[serde(default)]
    pub flagged_for_ml: bool,
    pub image_url: String,
    pub captured_at: String,
    pub updated_at: String,
    /// May be omitted; `null` is rejected
    #[serde(default, deserialize_with = "present_gps")]
    pub gps: Option<GpsPoint>,
    pub device_id: String,
}

fn present_gps<'de, D>(deserializer: D) -> Result<Option<GpsPoint>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    GpsPoint::deserialize(deserializer).map(Some)
}

/// Body of `POST /readings/sync`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub readings: Vec<ReadingPayload>,
    /// Client high-water mark of its previous successful sync
    pub last_sync_at: String,
}

/// Body of `POST /readings/:reading_id/status`
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: ReviewDecision,
}

/// A sync batch that passed validation
#[derive(Debug, Clone)]
pub struct ValidatedSync {
    pub readings: Vec<NewReading>,
    pub last_sync_at: DateTime<Utc>,
}

/// Parse and validate a sync body
///
/// Returns every issue found, prefixed with the offending field path.
pub fn parse_sync_request(body: &[u8]) -> Result<ValidatedSync, Vec<String>> {
    let request: SyncRequest =
        serde_json::from_slice(body).map_err(|e| vec![format!("body: {}", e)])?;

    let mut issues = Vec::new();

    let last_sync_at = match parse_rfc3339(&request.last_sync_at) {
        Ok(ts) => Some(ts),
        Err(e) => {
            issues.push(format!("lastSyncAt: {}", e));
            None
        }
    };

    let mut readings = Vec::with_capacity(request.readings.len());
    for (index, payload) in request.readings.into_iter().enumerate() {
        match validate_reading(payload) {
            Ok(reading) => readings.push(reading),
            Err(reading_issues) => issues.extend(
                reading_issues
                    .into_iter()
                    .map(|issue| format!("readings[{}].{}", index, issue)),
            ),
        }
    }

    match last_sync_at {
        Some(last_sync_at) if issues.is_empty() => Ok(ValidatedSync {
            readings,
            last_sync_at,
        }),
        _ => Err(issues),
    }
}

/// Parse a status update body
pub fn parse_status_update(body: &[u8]) -> Result<ReviewDecision, String> {
    serde_json::from_slice::<StatusUpdateRequest>(body)
        .map(|request| request.status)
        .map_err(|e| e.to_string())
}

fn validate_reading(payload: ReadingPayload) -> Result<NewReading, Vec<String>> {
    let mut issues = Vec::new();

    for (field, value) in [
        ("readingId", &payload.reading_id),
        ("accountNumber", &payload.account_number),
        ("deviceId", &payload.device_id),
    ] {
        if value.trim().is_empty() {
            issues.push(format!("{}: must not be empty", field));
        }
    }

    if !payload.reading_value.is_finite() {
        issues.push("readingValue: must be a finite number".to_string());
    }

    if !(0.0..=1.0).contains(&payload.confidence) {
        issues.push(format!(
            "confidence: {} outside [0, 1]",
            payload.confidence
        ));
    }

    if let Err(e) = url::Url::parse(&payload.image_url) {
        issues.push(format!("imageUrl: {}", e));
    }

    if let Some(gps) = &payload.gps {
        if !(-90.0..=90.0).contains(&gps.lat) {
            issues.push(format!("gps.lat: {} outside [-90, 90]", gps.lat));
        }
        if !(-180.0..=180.0).contains(&gps.lng) {
            issues.push(format!("gps.lng: {} outside [-180, 180]", gps.lng));
        }
    }

    let captured_at = parse_rfc3339(&payload.captured_at)
        .map_err(|e| issues.push(format!("capturedAt: {}", e)))
        .ok();
    let updated_at = parse_rfc3339(&payload.updated_at)
        .map_err(|e| issues.push(format!("updatedAt: {}", e)))
        .ok();

    match (captured_at, updated_at) {
        (Some(captured_at), Some(updated_at)) if issues.is_empty() => Ok(NewReading {
            reading_id: payload.reading_id,
            account_number: payload.account_number,
            reading_value: payload.reading_value,
            confidence: payload.confidence,
            method: payload.method,
            status: payload.status,
            flagged_for_ml: payload.flagged_for_ml,
            image_url: payload.image_url,
            gps: payload.gps,
            device_id: payload.device_id,
            captured_at,
            updated_at,
        }),
        _ => Err(issues),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn reading(id: &str) -> Value {
        json!({
            "readingId": id,
            "accountNumber": "A1",
            "readingValue": 100,
            "confidence": 0.9,
            "method": "ocr",
            "status": "pending",
            "imageUrl": "https://x/y.jpg",
            "capturedAt": "2025-01-01T00:00:00Z",
            "updatedAt": "2025-01-01T00:00:00Z",
            "deviceId": "D1"
        })
    }

    fn body(readings: Vec<Value>) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "readings": readings,
            "lastSyncAt": "2025-01-01T00:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_example_payload_accepted() {
        let sync = parse_sync_request(&body(vec![reading("R1")])).unwrap();

        assert_eq!(sync.readings.len(), 1);
        let r = &sync.readings[0];
        assert_eq!(r.reading_id, "R1");
        assert_eq!(r.reading_value, 100.0);
        assert_eq!(r.method, CaptureMethod::Ocr);
        assert_eq!(r.status, ReadingStatus::Pending);
        assert!(!r.flagged_for_ml, "flaggedForMl defaults to false");
        assert!(r.gps.is_none());
    }

    #[test]
    fn test_empty_batch_accepted() {
        let sync = parse_sync_request(&body(vec![])).unwrap();
        assert!(sync.readings.is_empty());
    }

    #[test]
    fn test_confidence_bounds_inclusive() {
        for confidence in [0.0, 1.0] {
            let mut r = reading("R1");
            r["confidence"] = json!(confidence);
            assert!(parse_sync_request(&body(vec![r])).is_ok());
        }

        for confidence in [-0.01, 1.01] {
            let mut r = reading("R1");
            r["confidence"] = json!(confidence);
            let issues = parse_sync_request(&body(vec![r])).unwrap_err();
            assert!(issues[0].starts_with("readings[0].confidence"), "{:?}", issues);
        }
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let mut r = reading("R1");
        r.as_object_mut().unwrap().remove("deviceId");
        assert!(parse_sync_request(&body(vec![r])).is_err());
    }

    #[test]
    fn test_unknown_enum_values_rejected() {
        let mut r = reading("R1");
        r["method"] = json!("photo");
        assert!(parse_sync_request(&body(vec![r])).is_err());

        let mut r = reading("R1");
        r["status"] = json!("approved");
        assert!(parse_sync_request(&body(vec![r])).is_err());
    }

    #[test]
    fn test_one_bad_reading_rejects_batch() {
        let mut bad = reading("R2");
        bad["imageUrl"] = json!("not a url");

        let issues = parse_sync_request(&body(vec![reading("R1"), bad])).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].starts_with("readings[1].imageUrl"));
    }

    #[test]
    fn test_bad_timestamps_reported() {
        let mut r = reading("R1");
        r["capturedAt"] = json!("yesterday");
        let request = json!({ "readings": [r], "lastSyncAt": "later" });

        let issues = parse_sync_request(&serde_json::to_vec(&request).unwrap()).unwrap_err();
        assert!(issues.iter().any(|i| i.starts_with("lastSyncAt")));
        assert!(issues.iter().any(|i| i.starts_with("readings[0].capturedAt")));
    }

    #[test]
    fn test_gps_range_checked() {
        let mut r = reading("R1");
        r["gps"] = json!({ "lat": 91.0, "lng": 10.0 });
        assert!(parse_sync_request(&body(vec![r])).is_err());

        let mut r = reading("R1");
        r["gps"] = json!({ "lat": -33.9, "lng": 18.4 });
        let sync = parse_sync_request(&body(vec![r])).unwrap();
        assert_eq!(sync.readings[0].gps, Some(GpsPoint { lat: -33.9, lng: 18.4 }));
    }

    #[test]
    fn test_gps_optional_but_not_null() {
        let mut with_gps = reading("R1");
        with_gps["gps"] = json!({"lat": 12.5, "lng": -3.25});
        let sync = parse_sync_request(&body(vec![with_gps])).unwrap();
        assert_eq!(sync.readings[0].gps, Some(GpsPoint { lat: 12.5, lng: -3.25 }));

        let mut null_gps = reading("R1");
        null_gps["gps"] = Value::Null;
        assert!(parse_sync_request(&body(vec![null_gps])).is_err());
    }

    #[test]
    fn test_blank_identifiers_rejected() {
        let mut r = reading("  ");
        r["accountNumber"] = json!("");
        let issues = parse_sync_request(&body(vec![r])).unwrap_err();
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn test_not_json_rejected() {
        assert!(parse_sync_request(b"readings=1").is_err());
        assert!(parse_sync_request(b"{}").is_err());
    }

    #[test]
    fn test_status_update_parsing() {
        assert_eq!(
            parse_status_update(br#"{"status":"verified"}"#),
            Ok(ReviewDecision::Verified)
        );
        assert_eq!(
            parse_status_update(br#"{"status":"rejected"}"#),
            Ok(ReviewDecision::Rejected)
        );
        assert!(parse_status_update(br#"{"status":"pending"}"#).is_err());
        assert!(parse_status_update(br#"{"status":"synced"}"#).is_err());
        assert!(parse_status_update(b"").is_err());
    }
}
