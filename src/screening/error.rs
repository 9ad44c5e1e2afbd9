//! Error types for the screening API client.
//!
//! [`ApiError`] separates the failures the executor can see: remote business
//! errors (any 4xx/5xx other than 401), a 401 that survived a credential
//! refresh, a failed refresh, network-level failures and bodies that do not
//! match the expected schema.

use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The service answered with a 4xx/5xx status other than 401.
    #[error("Request {method} {endpoint} failed with status {status}: {body}")]
    Status {
        method: String,
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The reissued request was still unauthorized after a refresh.
    #[error("Request to {method} {endpoint} failed with 401 Unauthorized even after token refresh")]
    Unauthorized { method: String, endpoint: String },

    #[error("Failed to refresh tokens: {status} {body}")]
    RefreshFailed { status: u16, body: String },

    /// Transport failure. The message holds the whole source chain so that
    /// transient markers such as "Connection refused" stay visible.
    #[error("network error: {0}")]
    Network(String),

    /// The body did not match the expected response schema.
    #[error("Unexpected response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    /// A well-formed body lacked a field the workflow depends on.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Object storage upload failed with status {status}: {message}")]
    Upload { status: u16, message: String },
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        if err.is_timeout() && !message.contains("timed out") {
            message.push_str(": operation timed out");
        }
        ApiError::Network(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display() {
        let err = ApiError::Status {
            method: "PATCH".into(),
            endpoint: "/screen/applications/7".into(),
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(
            err.to_string(),
            "Request PATCH /screen/applications/7 failed with status 500: boom"
        );
    }

    #[test]
    fn unauthorized_display() {
        let err = ApiError::Unauthorized {
            method: "GET".into(),
            endpoint: "/screen/applications/7".into(),
        };
        assert!(err.to_string().contains("even after token refresh"));
    }

    #[tokio::test]
    async fn network_error_keeps_source_chain() {
        // Nothing listens on port 9 of the loopback interface.
        let err = reqwest::Client::new()
            .get("http://127.0.0.1:9/")
            .send()
            .await
            .unwrap_err();
        let api = ApiError::from(err);
        match api {
            ApiError::Network(message) => assert!(message.contains("Connection refused")),
            other => panic!("expected network error, got {other:?}"),
        }
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ApiError>();
    }
}
