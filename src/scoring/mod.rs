//! Scoring Module - model provider and request pipeline
//!
//! `registry` resolves and downloads the served model, `scorer` wraps it
//! behind [`FraudScorer`], `pipeline` ties scoring to the metrics store.

pub mod pipeline;
pub mod registry;
pub mod scorer;

pub use pipeline::{PipelineError, ScoringPipeline};
pub use registry::{ModelHandle, ModelUnavailableError, RegistryClient};
pub use scorer::{FraudScorer, OnnxScorer, ScoringError};

use crate::config::{Config, MODEL_ARTIFACT_FILE, MODEL_NAME, MODEL_STAGE};

/// Resolve the production model in the registry and build its scorer
pub async fn load_model(config: &Config) -> Result<(ModelHandle, OnnxScorer), ModelUnavailableError> {
    let registry = RegistryClient::new(&config.tracking_uri, config.registry_timeout)?;
    tracing::info!("Loading models:/{}/{} from {}", MODEL_NAME, MODEL_STAGE, registry.base_url());

    let (handle, bytes) = registry
        .fetch_model(MODEL_NAME, MODEL_STAGE, MODEL_ARTIFACT_FILE)
        .await?;
    let scorer = OnnxScorer::from_bytes(&bytes)?;

    Ok((handle, scorer))
}
