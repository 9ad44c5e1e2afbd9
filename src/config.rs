//! Configuration loaded from `app-factory.toml`.
//!
//! [`FactoryConfig`] holds every tunable of a run. Fields missing from the
//! file fall back to defaults. `.env` is read through `dotenvy`, and
//! `APP_LOG_LEVEL` takes precedence over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FactoryError;
use crate::retry::RetryPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "app-factory.toml";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FactoryConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub paths: PathConfig,
    #[serde(default)]
    pub actors: ActorConfig,
    #[serde(default)]
    pub defaults: StepDefaults,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Explicit service address override. Unset by default, in which case
    /// every run talks to the environment its magic link points at.
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Request and wait timeouts, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_api_request_ms")]
    pub api_request_ms: u64,
    #[serde(default = "default_api_long_request_ms")]
    pub api_long_request_ms: u64,
    /// Grace period before the first identity verification check.
    #[serde(default = "default_identity_verification_wait_ms")]
    pub identity_verification_wait_ms: u64,
    /// Upper bound for polling the identity verification status.
    #[serde(default = "default_identity_verification_check_ms")]
    pub identity_verification_check_ms: u64,
    #[serde(default = "default_identity_verification_interval_ms")]
    pub identity_verification_interval_ms: u64,
}

fn default_api_request_ms() -> u64 {
    10_000
}

fn default_api_long_request_ms() -> u64 {
    60_000
}

fn default_identity_verification_wait_ms() -> u64 {
    15_000
}

fn default_identity_verification_check_ms() -> u64 {
    50_000
}

fn default_identity_verification_interval_ms() -> u64 {
    5_000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            api_request_ms: default_api_request_ms(),
            api_long_request_ms: default_api_long_request_ms(),
            identity_verification_wait_ms: default_identity_verification_wait_ms(),
            identity_verification_check_ms: default_identity_verification_check_ms(),
            identity_verification_interval_ms: default_identity_verification_interval_ms(),
        }
    }
}

impl TimeoutConfig {
    pub fn api_request(&self) -> Duration {
        Duration::from_millis(self.api_request_ms)
    }

    pub fn api_long_request(&self) -> Duration {
        Duration::from_millis(self.api_long_request_ms)
    }

    pub fn identity_verification_wait(&self) -> Duration {
        Duration::from_millis(self.identity_verification_wait_ms)
    }

    pub fn identity_verification_check(&self) -> Duration {
        Duration::from_millis(self.identity_verification_check_ms)
    }

    pub fn identity_verification_interval(&self) -> Duration {
        Duration::from_millis(self.identity_verification_interval_ms)
    }
}

/// Snapshot targets and input files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathConfig {
    #[serde(default = "default_current_app")]
    pub current_app: PathBuf,
    #[serde(default = "default_application_snapshot")]
    pub application_snapshot: PathBuf,
    #[serde(default = "default_applicant_snapshot")]
    pub applicant_snapshot: PathBuf,
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,
    #[serde(default = "default_paystub")]
    pub paystub: PathBuf,
    #[serde(default = "default_signature")]
    pub signature: PathBuf,
}

fn default_current_app() -> PathBuf {
    PathBuf::from("./current-app.json")
}

fn default_application_snapshot() -> PathBuf {
    PathBuf::from("./test-data/application.json")
}

fn default_applicant_snapshot() -> PathBuf {
    PathBuf::from("./test-data/applicant.json")
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_paystub() -> PathBuf {
    PathBuf::from("./test-data/Paystub.pdf")
}

fn default_signature() -> PathBuf {
    PathBuf::from("./test-data/signature.svg")
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            current_app: default_current_app(),
            application_snapshot: default_application_snapshot(),
            applicant_snapshot: default_applicant_snapshot(),
            logs_dir: default_logs_dir(),
            paystub: default_paystub(),
            signature: default_signature(),
        }
    }
}

/// How many additional parties are invited into the application.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActorConfig {
    #[serde(default)]
    pub co_applicants: u32,
    #[serde(default)]
    pub guarantors: u32,
}

/// Fixed answers for the personal details and housing steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefaults {
    #[serde(default = "no")]
    pub dependents: String,
    #[serde(default = "no")]
    pub pets: String,
    #[serde(default = "no")]
    pub vehicles: String,
    #[serde(default = "no")]
    pub military_first_responder_teacher: String,
    #[serde(default = "default_lead_source")]
    pub lead_source: String,
    #[serde(default = "default_housing_type")]
    pub housing_type: String,
    #[serde(default = "default_relationship")]
    pub emergency_contact_relationship: String,
}

fn no() -> String {
    "No".to_string()
}

fn default_lead_source() -> String {
    "Google".to_string()
}

fn default_housing_type() -> String {
    "Own my home".to_string()
}

fn default_relationship() -> String {
    "Other".to_string()
}

impl Default for StepDefaults {
    fn default() -> Self {
        Self {
            dependents: no(),
            pets: no(),
            vehicles: no(),
            military_first_responder_teacher: no(),
            lead_source: default_lead_source(),
            housing_type: default_housing_type(),
            emergency_contact_relationship: default_relationship(),
        }
    }
}

impl FactoryConfig {
    /// Loads the configuration from `path`, or `app-factory.toml` in the
    /// working directory. Uses defaults when the file does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self, FactoryError> {
        dotenvy::dotenv().ok();

        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Self::from_toml(&contents)?
        } else {
            Self::default()
        };

        // Environment takes precedence over the file.
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, FactoryError> {
        Ok(toml::from_str(contents)?)
    }

    pub(crate) fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup("APP_LOG_LEVEL").filter(|v| !v.trim().is_empty()) {
            self.telemetry.log_level = level;
        }
    }

    /// Deep-merges a JSON object of overrides into this configuration.
    pub fn apply_overrides(&mut self, overrides: &Value) -> Result<(), FactoryError> {
        if !overrides.is_object() {
            return Err(FactoryError::Config(
                "configuration overrides must be a JSON object".into(),
            ));
        }
        let mut merged = serde_json::to_value(&*self)?;
        merge(&mut merged, overrides);
        *self = serde_json::from_value(merged)?;
        Ok(())
    }
}

fn merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn default_config_values() {
        let config = FactoryConfig::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff_base_ms, 1000);
        assert_eq!(config.retry.backoff_max_ms, 10_000);
        assert_eq!(config.timeouts.identity_verification_check_ms, 50_000);
        assert_eq!(config.timeouts.identity_verification_interval_ms, 5_000);
        assert_eq!(config.defaults.lead_source, "Google");
        assert_eq!(config.actors.co_applicants, 0);
        assert!(config.api.base_url.is_none());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            [retry]
            max_attempts = 5

            [actors]
            guarantors = 1

            [defaults]
            pets = "Yes"
        "#;
        let config = FactoryConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.backoff_base_ms, 1000);
        assert_eq!(config.actors.guarantors, 1);
        assert_eq!(config.defaults.pets, "Yes");
        assert_eq!(config.defaults.vehicles, "No");
        assert_eq!(config.timeouts.api_request_ms, 10_000);
    }

    #[test]
    fn env_log_level_takes_precedence() {
        let env: HashMap<&str, &str> = [("APP_LOG_LEVEL", "debug")].into_iter().collect();

        let mut config = FactoryConfig::from_toml("[telemetry]\nlog_level = \"warn\"").unwrap();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.telemetry.log_level, "debug");
    }

    #[test]
    fn env_base_url_is_not_an_override() {
        let env: HashMap<&str, &str> = [("BASE_URL", "https://api.staging.example.com")]
            .into_iter()
            .collect();

        let mut config = FactoryConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));
        assert!(config.api.base_url.is_none());

        let mut config = FactoryConfig::from_toml("[api]\nbase_url = \"https://file\"").unwrap();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.api.base_url.as_deref(), Some("https://file"));
    }

    #[test]
    fn blank_env_is_ignored() {
        let mut config = FactoryConfig::default();
        config.apply_env(|_| Some("  ".to_string()));
        assert!(config.api.base_url.is_none());
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn overrides_merge_nested_sections() {
        let mut config = FactoryConfig::default();
        config
            .apply_overrides(&json!({
                "actors": {"co_applicants": 2},
                "timeouts": {"identity_verification_check_ms": 1000}
            }))
            .unwrap();

        assert_eq!(config.actors.co_applicants, 2);
        assert_eq!(config.actors.guarantors, 0);
        assert_eq!(config.timeouts.identity_verification_check_ms, 1000);
        assert_eq!(config.timeouts.api_request_ms, 10_000);
    }

    #[test]
    fn overrides_must_be_an_object() {
        let mut config = FactoryConfig::default();
        let err = config.apply_overrides(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, FactoryError::Config(_)));
    }

    #[test]
    fn overrides_with_wrong_types_are_rejected() {
        let mut config = FactoryConfig::default();
        let err = config
            .apply_overrides(&json!({"retry": {"max_attempts": "many"}}))
            .unwrap_err();
        assert!(matches!(err, FactoryError::Json(_)));
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn load_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = FactoryConfig::load(Some(&dir.path().join("missing.toml"))).unwrap();
        assert_eq!(config.retry.max_attempts, 3);
    }
}
