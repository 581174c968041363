//! Shared API request/response types

use serde::{Deserialize, Serialize};

// ========================================
// Error Response Types
// ========================================

/// JSON body returned with every non-2xx response
///
/// # Examples
///
/// ```
/// use meterops_common::api::types::ErrorResponse;
///
/// let error = ErrorResponse::new("bad_request", "Invalid payload");
/// assert_eq!(error.error, "bad_request");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error type identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_shape() {
        let error = ErrorResponse::new("unauthorized", "Missing Authorization header");

        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["error"], "unauthorized");
        assert_eq!(json["message"], "Missing Authorization header");
        assert_eq!(json.as_object().unwrap().len(), 2);
    }
}
