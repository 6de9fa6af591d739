//! JSON body shared by every HTTP endpoint except `/health` and `/metrics`.

use serde::{Deserialize, Serialize};

/// `{"success", "message", "data"}` response body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request succeeded.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Payload, omitted on errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying `data`.
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// Failed response with no payload.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_includes_data() {
        let body = ApiResponse::success("ok", vec![1, 2]);
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"success": true, "message": "ok", "data": [1, 2]})
        );
    }

    #[test]
    fn error_omits_data() {
        let body = ApiResponse::error("nope");
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"success": false, "message": "nope"})
        );
    }
}
