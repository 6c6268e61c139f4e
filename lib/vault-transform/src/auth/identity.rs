use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::context::RequestContext;
use crate::error::VaultError;
use crate::transport::client_error;

const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";
const WELL_KNOWN_CREDENTIALS: &str = "gcloud/application_default_credentials.json";

/// Ambient platform credentials that may name the service principal.
#[async_trait]
pub trait AmbientCredentials: Send + Sync {
    /// The principal email, or `None` when the credentials carry none.
    async fn principal_email(&self) -> Result<Option<String>, VaultError>;
}

/// Application-default credentials file (service account key or similar).
pub struct ApplicationDefaultCredentials {
    path: Option<PathBuf>,
}

impl ApplicationDefaultCredentials {
    /// Locate the credentials file from the environment or the gcloud config directory.
    pub fn discover() -> Self {
        let path = std::env::var_os(CREDENTIALS_ENV)
            .map(PathBuf::from)
            .or_else(|| {
                directories::BaseDirs::new()
                    .map(|dirs| dirs.config_dir().join(WELL_KNOWN_CREDENTIALS))
            });
        Self { path }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}

#[derive(Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    client_email: Option<String>,
}

#[async_trait]
impl AmbientCredentials for ApplicationDefaultCredentials {
    async fn principal_email(&self) -> Result<Option<String>, VaultError> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let credentials: CredentialsFile = serde_json::from_str(&content)?;
        Ok(credentials
            .client_email
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty()))
    }
}

/// Picks the identity presented at login: override, then ambient
/// credentials, then the metadata service.
pub struct IdentityResolver {
    override_identity: Option<String>,
    ambient: Option<Arc<dyn AmbientCredentials>>,
    metadata_url: String,
    http: reqwest::Client,
}

impl IdentityResolver {
    pub fn new(
        override_identity: Option<String>,
        ambient: Option<Arc<dyn AmbientCredentials>>,
        metadata_url: String,
        http: reqwest::Client,
    ) -> Self {
        Self {
            override_identity,
            ambient,
            metadata_url,
            http,
        }
    }

    pub async fn resolve(&self, ctx: &RequestContext) -> Result<String, VaultError> {
        if let Some(identity) = &self.override_identity {
            return Ok(identity.clone());
        }

        if let Some(ambient) = &self.ambient {
            match ambient.principal_email().await {
                Ok(Some(email)) => return Ok(email),
                Ok(None) => {
                    tracing::debug!("Ambient credentials carry no principal email");
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Ambient credential discovery failed, asking metadata service");
                }
            }
        }

        self.from_metadata(ctx).await
    }

    async fn from_metadata(&self, ctx: &RequestContext) -> Result<String, VaultError> {
        let mut request = self
            .http
            .get(&self.metadata_url)
            .header("Metadata-Flavor", "Google");
        if let Some(timeout) = ctx.budget("metadata identity lookup")? {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VaultError::Identity(format!("metadata request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(match client_error(response).await {
                VaultError::ClientError {
                    status, message, ..
                } => VaultError::MetadataStatus { status, message },
                other => other,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| VaultError::Identity(format!("metadata body unreadable: {e}")))?;
        let identity = body.trim();
        if identity.is_empty() {
            return Err(VaultError::Identity(
                "metadata service returned an empty identity".to_string(),
            ));
        }
        Ok(identity.to_string())
    }
}
