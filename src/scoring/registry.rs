//! Model registry client (MLflow REST API)
//!
//! Resolves a registered model name and stage to a model version, then
//! downloads the ONNX artifact of that version. Used once at startup.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;

const ARTIFACT_PROXY_SCHEME: &str = "mlflow-artifacts:";

/// Why a model could not be loaded. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ModelUnavailableError {
    #[error("model registry unreachable: {0}")]
    Unreachable(String),

    #[error("no version of model '{name}' in stage '{stage}'")]
    NotFound { name: String, stage: String },

    #[error("model registry returned {status}: {message}")]
    Registry { status: u16, message: String },

    #[error("unsupported artifact location: {0}")]
    UnsupportedArtifactUri(String),

    #[error("model artifact could not be loaded: {0}")]
    InvalidArtifact(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelVersion {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub current_stage: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LatestVersionsResponse {
    #[serde(default)]
    model_versions: Vec<ModelVersion>,
}

#[derive(Debug, Deserialize)]
struct DownloadUriResponse {
    artifact_uri: String,
}

/// Identity of the model the process is serving
#[derive(Debug, Clone)]
pub struct ModelHandle {
    pub name: String,
    pub stage: String,
    pub version: String,
    pub run_id: Option<String>,
    pub artifact_uri: String,
    pub size_bytes: usize,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: String,
    client: Client,
}

impl RegistryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ModelUnavailableError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelUnavailableError::Unreachable(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Latest version of `name` currently in `stage`
    pub async fn latest_version(
        &self,
        name: &str,
        stage: &str,
    ) -> Result<ModelVersion, ModelUnavailableError> {
        let url = format!(
            "{}/api/2.0/mlflow/registered-models/get-latest-versions",
            self.base_url
        );
        let req = self
            .client
            .get(url)
            .query(&[("name", name), ("stages", stage)]);

        let not_found = || ModelUnavailableError::NotFound {
            name: name.to_string(),
            stage: stage.to_string(),
        };

        let resp: LatestVersionsResponse = match self.get_json(req).await {
            Err(ModelUnavailableError::Registry { status: 404, .. }) => return Err(not_found()),
            other => other?,
        };

        resp.model_versions
            .into_iter()
            .find(|v| {
                v.current_stage
                    .as_deref()
                    .map_or(true, |s| s.eq_ignore_ascii_case(stage))
            })
            .ok_or_else(not_found)
    }

    /// Artifact location of a model version
    pub async fn download_uri(
        &self,
        name: &str,
        version: &str,
    ) -> Result<String, ModelUnavailableError> {
        let url = format!(
            "{}/api/2.0/mlflow/model-versions/get-download-uri",
            self.base_url
        );
        let req = self
            .client
            .get(url)
            .query(&[("name", name), ("version", version)]);

        let resp: DownloadUriResponse = self.get_json(req).await?;
        Ok(resp.artifact_uri)
    }

    /// Download `file` from inside the artifact directory `artifact_uri`
    pub async fn fetch_artifact(
        &self,
        artifact_uri: &str,
        file: &str,
    ) -> Result<Vec<u8>, ModelUnavailableError> {
        let url = artifact_url(&self.base_url, artifact_uri, file)?;
        tracing::debug!("Fetching model artifact from {}", url);

        let resp = self.send(self.client.get(url)).await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ModelUnavailableError::Unreachable(e.to_string()))?;

        if bytes.is_empty() {
            return Err(ModelUnavailableError::InvalidArtifact(format!(
                "{} is empty",
                file
            )));
        }
        Ok(bytes.to_vec())
    }

    /// Resolve `name`/`stage` and download its artifact
    pub async fn fetch_model(
        &self,
        name: &str,
        stage: &str,
        file: &str,
    ) -> Result<(ModelHandle, Vec<u8>), ModelUnavailableError> {
        let version = self.latest_version(name, stage).await?;
        tracing::info!(
            "Resolved model {} stage {} to version {}",
            name,
            stage,
            version.version
        );

        let artifact_uri = self.download_uri(name, &version.version).await?;
        let bytes = self.fetch_artifact(&artifact_uri, file).await?;

        let handle = ModelHandle {
            name: version.name,
            stage: stage.to_string(),
            version: version.version,
            run_id: version.run_id,
            artifact_uri,
            size_bytes: bytes.len(),
            loaded_at: Utc::now(),
        };
        Ok((handle, bytes))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
    ) -> Result<T, ModelUnavailableError> {
        let resp = self.send(req).await?;
        let status = resp.status();
        resp.json::<T>()
            .await
            .map_err(|e| ModelUnavailableError::Registry {
                status: status.as_u16(),
                message: format!("malformed response: {}", e),
            })
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, ModelUnavailableError> {
        let resp = req
            .send()
            .await
            .map_err(|e| ModelUnavailableError::Unreachable(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let message = resp.text().await.unwrap_or_default();
        Err(ModelUnavailableError::Registry {
            status: status.as_u16(),
            message: if message.is_empty() {
                status.canonical_reason().unwrap_or("no body").to_string()
            } else {
                message
            },
        })
    }
}

/// HTTP location of `file` inside an artifact directory.
///
/// `mlflow-artifacts:` locations go through the tracking server's artifact
/// proxy; plain HTTP(S) locations are fetched as-is.
pub fn artifact_url(
    base_url: &str,
    artifact_uri: &str,
    file: &str,
) -> Result<String, ModelUnavailableError> {
    if let Some(rest) = artifact_uri.strip_prefix(ARTIFACT_PROXY_SCHEME) {
        // mlflow-artifacts://host:port/path carries an authority we ignore
        let path = match rest.strip_prefix("//") {
            Some(with_authority) => with_authority
                .split_once('/')
                .map(|(_, path)| path)
                .unwrap_or(""),
            None => rest,
        };
        let path = path.trim_matches('/');
        if path.is_empty() {
            return Err(ModelUnavailableError::UnsupportedArtifactUri(
                artifact_uri.to_string(),
            ));
        }
        return Ok(format!(
            "{}/api/2.0/mlflow-artifacts/artifacts/{}/{}",
            base_url.trim_end_matches('/'),
            path,
            file
        ));
    }

    if artifact_uri.starts_with("http://") || artifact_uri.starts_with("https://") {
        return Ok(format!("{}/{}", artifact_uri.trim_end_matches('/'), file));
    }

    Err(ModelUnavailableError::UnsupportedArtifactUri(
        artifact_uri.to_string(),
    ))
}
