use thiserror::Error;

use crate::poll::TimeoutError;
use crate::screening::ApiError;
use crate::workflow::Stage;

#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("{label} verification ({name}) not found in enroll response")]
    MissingVerification { label: String, name: String },

    #[error("Screening API error: {0}")]
    Api(#[from] ApiError),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    #[error("Invalid workflow transition from {from} to {to}")]
    InvalidTransition { from: Stage, to: Stage },

    #[error("A run is already in progress")]
    AlreadyRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn missing_verification_names_category() {
        let err = FactoryError::MissingVerification {
            label: "Combined income".into(),
            name: "combined_income".into(),
        };
        assert_eq!(
            err.to_string(),
            "Combined income verification (combined_income) not found in enroll response"
        );
    }

    #[test]
    fn timeout_is_transparent() {
        let err = FactoryError::from(TimeoutError {
            timeout: Duration::from_millis(1000),
        });
        assert_eq!(
            err.to_string(),
            "Timeout of 1000ms exceeded while waiting for condition"
        );
    }

    #[test]
    fn api_error_keeps_status_and_body() {
        let err = FactoryError::from(ApiError::Status {
            method: "POST".into(),
            endpoint: "/screen/assets".into(),
            status: 422,
            body: "{\"error\":\"bad url\"}".into(),
        });
        let text = err.to_string();
        assert!(text.contains("422"));
        assert!(text.contains("bad url"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FactoryError>();
    }
}
