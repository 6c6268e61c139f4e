use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::context::RequestContext;
use crate::error::VaultError;
use crate::models::{BatchRequest, BatchTransformResponse, LoginRequest, Secret};

/// HTTP access to the vault API.
#[async_trait]
pub trait VaultApi: Send + Sync {
    /// Exchange a signed JWT for a vault token.
    async fn login(
        &self,
        ctx: &RequestContext,
        url: &str,
        request: &LoginRequest,
    ) -> Result<Secret, VaultError>;

    /// Run an authenticated batch transform.
    async fn transform(
        &self,
        ctx: &RequestContext,
        url: &str,
        token: &str,
        request: &BatchRequest,
    ) -> Result<BatchTransformResponse, VaultError>;
}

/// [`VaultApi`] over reqwest.
pub struct RestTransport {
    http: reqwest::Client,
    namespace: String,
}

impl RestTransport {
    pub fn new(http: reqwest::Client, namespace: impl Into<String>) -> Self {
        Self {
            http,
            namespace: namespace.into(),
        }
    }

    async fn send_json<B, R>(
        &self,
        ctx: &RequestContext,
        step: &'static str,
        request: reqwest::RequestBuilder,
        body: &B,
    ) -> Result<R, VaultError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let mut request = request
            .header("x-request-id", ctx.request_id())
            .json(body);
        if let Some(timeout) = ctx.budget(step)? {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|source| VaultError::Request {
            context: step,
            source,
        })?;

        if !response.status().is_success() {
            return Err(client_error(response).await);
        }

        let bytes = response.bytes().await.map_err(|source| VaultError::Request {
            context: step,
            source,
        })?;
        serde_json::from_slice(&bytes)
            .map_err(|e| VaultError::MalformedResponse(format!("{step}: {e}")))
    }
}

#[async_trait]
impl VaultApi for RestTransport {
    async fn login(
        &self,
        ctx: &RequestContext,
        url: &str,
        request: &LoginRequest,
    ) -> Result<Secret, VaultError> {
        self.send_json(ctx, "login", self.http.post(url), request)
            .await
    }

    async fn transform(
        &self,
        ctx: &RequestContext,
        url: &str,
        token: &str,
        request: &BatchRequest,
    ) -> Result<BatchTransformResponse, VaultError> {
        let builder = self
            .http
            .post(url)
            .header("X-Vault-Namespace", &self.namespace)
            .header("X-Vault-Token", token)
            .header("X-Vault-Request", "true");
        self.send_json(ctx, "transform", builder, request).await
    }
}

/// Turns a non-2xx response into [`VaultError::ClientError`], keeping the vault `errors` list.
pub(crate) async fn client_error(response: reqwest::Response) -> VaultError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let response_data = serde_json::from_str::<serde_json::Value>(&body).ok();
    let errors = response_data
        .as_ref()
        .and_then(|data| data.get("errors"))
        .and_then(|errors| errors.as_array())
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    VaultError::ClientError {
        status,
        message: body,
        errors,
        response_data,
    }
}
