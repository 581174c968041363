//! Database models
//!
//! JSON field names are camelCase to match what capture devices and the
//! dashboard exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// How a reading value was captured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMethod {
    Ocr,
    Manual,
}

impl CaptureMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureMethod::Ocr => "ocr",
            CaptureMethod::Manual => "manual",
        }
    }
}

impl FromStr for CaptureMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ocr" => Ok(CaptureMethod::Ocr),
            "manual" => Ok(CaptureMethod::Manual),
            other => Err(Error::InvalidInput(format!("Unknown capture method: {}", other))),
        }
    }
}

/// Reading lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingStatus {
    Pending,
    Verified,
    Synced,
    Rejected,
}

impl ReadingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingStatus::Pending => "pending",
            ReadingStatus::Verified => "verified",
            ReadingStatus::Synced => "synced",
            ReadingStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadingStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReadingStatus::Pending),
            "verified" => Ok(ReadingStatus::Verified),
            "synced" => Ok(ReadingStatus::Synced),
            "rejected" => Ok(ReadingStatus::Rejected),
            other => Err(Error::InvalidInput(format!("Unknown reading status: {}", other))),
        }
    }
}

/// Supervisor decision on a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Verified,
    Rejected,
}

impl From<ReviewDecision> for ReadingStatus {
    fn from(decision: ReviewDecision) -> Self {
        match decision {
            ReviewDecision::Verified => ReadingStatus::Verified,
            ReviewDecision::Rejected => ReadingStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A captured meter reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub id: String,
    /// Owner (capturing user) uid
    pub uid: String,
    pub account_number: String,
    pub reading_value: f64,
    pub confidence: f64,
    pub method: CaptureMethod,
    pub status: ReadingStatus,
    pub flagged_for_ml: bool,
    pub image_url: String,
    pub gps: Option<GpsPoint>,
    pub device_id: String,
    pub captured_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub supervisor_id: Option<String>,
}

/// Anomaly or process failure surfaced to supervisors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionRecord {
    pub exception_id: String,
    pub context: String,
    pub error_code: String,
    pub message: String,
    pub reading_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: String,
    pub action: String,
    pub user_id: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// Training pool sample mirrored from a flagged reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingCandidate {
    pub reading_id: String,
    pub account_number: String,
    pub image_url: String,
    pub captured_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_string_forms_agree_with_serde() {
        for status in [
            ReadingStatus::Pending,
            ReadingStatus::Verified,
            ReadingStatus::Synced,
            ReadingStatus::Rejected,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<ReadingStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!("approved".parse::<ReadingStatus>().is_err());
        assert!("Pending".parse::<ReadingStatus>().is_err());
    }

    #[test]
    fn test_review_decision_only_accepts_terminal_states() {
        assert!(serde_json::from_str::<ReviewDecision>("\"verified\"").is_ok());
        assert!(serde_json::from_str::<ReviewDecision>("\"rejected\"").is_ok());
        assert!(serde_json::from_str::<ReviewDecision>("\"pending\"").is_err());
        assert_eq!(
            ReadingStatus::from(ReviewDecision::Rejected),
            ReadingStatus::Rejected
        );
    }

    #[test]
    fn test_reading_serializes_camel_case() {
        let reading = Reading {
            id: "R1".to_string(),
            uid: "user-1".to_string(),
            account_number: "A1".to_string(),
            reading_value: 100.0,
            confidence: 0.9,
            method: CaptureMethod::Ocr,
            status: ReadingStatus::Pending,
            flagged_for_ml: false,
            image_url: "https://x/y.jpg".to_string(),
            gps: None,
            device_id: "D1".to_string(),
            captured_at: Utc::now(),
            updated_at: Utc::now(),
            supervisor_id: None,
        };

        let value = serde_json::to_value(&reading).unwrap();
        assert_eq!(value["accountNumber"], "A1");
        assert_eq!(value["flaggedForMl"], false);
        assert_eq!(value["method"], "ocr");
        assert!(value["gps"].is_null());
    }
}
