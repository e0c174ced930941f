use serde::{Deserialize, Serialize};

use crate::models::PaymentError;

/// Envelope for the query API. `status` 0 is success; errors carry the
/// machine-readable code from the error taxonomy so callers can branch
/// without parsing `msg`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: i32,
    pub code: String,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: 0,
            code: "OK".to_string(),
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn error(err: &PaymentError) -> Self {
        Self {
            status: 1,
            code: err.error_code().to_string(),
            msg: err.to_string(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope() {
        let resp = ApiResponse::success(42u64);
        assert_eq!(resp.status, 0);
        assert_eq!(resp.code, "OK");
        assert_eq!(resp.data, Some(42));

        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"data\":42"));
    }

    #[test]
    fn test_error_envelope_carries_code() {
        let err = PaymentError::OrderNotFound("topup_1_a0".to_string());
        let resp = ApiResponse::<u64>::error(&err);
        assert_eq!(resp.status, 1);
        assert_eq!(resp.code, "ORDER_NOT_FOUND");
        assert!(resp.data.is_none());

        // Absent data is omitted from the wire shape entirely
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("\"data\""));
    }
}
