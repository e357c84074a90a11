//! Configuration module

use std::env;
use std::time::Duration;

/// Registered model served by this process
pub const MODEL_NAME: &str = "FraudDetectionModel";

/// Registry stage the model is resolved against
pub const MODEL_STAGE: &str = "Production";

/// Artifact file inside the registered model directory
pub const MODEL_ARTIFACT_FILE: &str = "model.onnx";

pub const DEFAULT_TRACKING_URI: &str = "http://host.docker.internal:5000";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Model registry (MLflow tracking server) base URI
    pub tracking_uri: String,

    /// Server port
    pub port: u16,

    /// Timeout applied to each registry request during startup
    pub registry_timeout: Duration,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            tracking_uri: lookup("MLFLOW_TRACKING_URI")
                .map(|uri| uri.trim().trim_end_matches('/').to_string())
                .filter(|uri| !uri.is_empty())
                .unwrap_or_else(|| DEFAULT_TRACKING_URI.to_string()),

            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),

            registry_timeout: lookup("REGISTRY_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(30)),

            log_format: match lookup("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_with(&[]);
        assert_eq!(config.tracking_uri, DEFAULT_TRACKING_URI);
        assert_eq!(config.port, 8000);
        assert_eq!(config.registry_timeout, Duration::from_secs(30));
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_overrides() {
        let config = config_with(&[
            ("MLFLOW_TRACKING_URI", "http://mlflow:5000/"),
            ("PORT", "9100"),
            ("REGISTRY_TIMEOUT_SECS", "5"),
            ("LOG_FORMAT", "json"),
        ]);
        assert_eq!(config.tracking_uri, "http://mlflow:5000");
        assert_eq!(config.port, 9100);
        assert_eq!(config.registry_timeout, Duration::from_secs(5));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = config_with(&[("PORT", "http"), ("MLFLOW_TRACKING_URI", "  ")]);
        assert_eq!(config.port, 8000);
        assert_eq!(config.tracking_uri, DEFAULT_TRACKING_URI);
    }
}
