use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::auth::{
    AmbientCredentials, ApplicationDefaultCredentials, AuthMethod, AuthState, IamSigner,
    IdentityResolver, JwtAuth, JwtSigner, RenewalHandle, RenewalLoop, StaticTokenAuth,
};
use crate::config::{Config, MAX_DURATION};
use crate::context::RequestContext;
use crate::error::VaultError;
use crate::models::{BatchRequest, TransformKind, TransformRequest, TransformResult};
use crate::transport::{RestTransport, VaultApi};

/// Batch encode/decode capability.
#[async_trait]
pub trait Transformer: Send + Sync {
    async fn transform(
        &self,
        ctx: &RequestContext,
        kind: TransformKind,
        role: &str,
        items: Vec<TransformRequest>,
    ) -> Result<Vec<TransformResult>, VaultError>;
}

pub struct VaultClientBuilder {
    config: Config,
    signer: Option<JwtSigner>,
    ambient: Option<Arc<dyn AmbientCredentials>>,
    transport: Option<Arc<dyn VaultApi>>,
    http: Option<reqwest::Client>,
}

impl VaultClientBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            signer: None,
            ambient: None,
            transport: None,
            http: None,
        }
    }

    pub fn signer(mut self, signer: JwtSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn ambient_credentials(mut self, ambient: Arc<dyn AmbientCredentials>) -> Self {
        self.ambient = Some(ambient);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn VaultApi>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    fn auth_method(
        config: &Config,
        signer: Option<JwtSigner>,
        ambient: Option<Arc<dyn AmbientCredentials>>,
        transport: Arc<dyn VaultApi>,
        http: &reqwest::Client,
    ) -> Arc<dyn AuthMethod> {
        if let Some(token) = &config.local_token {
            return Arc::new(StaticTokenAuth::new(token.clone()));
        }

        let ambient = if config.disable_ambient_credentials {
            None
        } else {
            Some(ambient.unwrap_or_else(|| Arc::new(ApplicationDefaultCredentials::discover())))
        };
        let identity = IdentityResolver::new(
            config.identity_override.clone(),
            ambient,
            config.metadata_url("email"),
            http.clone(),
        );
        let signer = signer.unwrap_or_else(|| {
            JwtSigner::Iam(IamSigner::new(http.clone(), config.metadata_url("token")))
        });

        Arc::new(JwtAuth::new(
            identity,
            signer,
            transport,
            config.login_url(),
            config.auth_role.clone(),
            config.token_lifetime,
        ))
    }

    /// Validates the config, logs in once and starts the renewal loop.
    ///
    /// Fails if the first login fails.
    pub async fn build(self) -> Result<VaultClient, VaultError> {
        let config = self.config;
        config.validate()?;

        let http = match self.http {
            Some(http) => http,
            None => reqwest::Client::builder()
                .timeout(config.request_timeout)
                .build()
                .map_err(|source| VaultError::Request {
                    context: "http client setup",
                    source,
                })?,
        };
        let transport = self.transport.unwrap_or_else(|| {
            Arc::new(RestTransport::new(http.clone(), config.namespace.clone()))
        });
        let auth_method = Self::auth_method(
            &config,
            self.signer,
            self.ambient,
            Arc::clone(&transport),
            &http,
        );

        let state = Arc::new(AuthState::new(config.block_for_token_time));
        let mut renewal = RenewalLoop::new(Arc::clone(&auth_method), Arc::clone(&state), &config);

        let ctx = RequestContext::new().with_timeout(config.request_timeout);
        let auth = auth_method.login(&ctx).await.inspect_err(|e| {
            tracing::error!(error = %e, reason = %e.reason(), "Initial vault login failed");
        })?;
        let first_renewal = renewal.apply(auth).await;
        tracing::info!(
            address = %config.address,
            zone = %config.zone,
            next_renewal_ms = first_renewal.as_millis() as u64,
            "Vault client logged in"
        );

        Ok(VaultClient {
            config: Arc::new(config),
            transport,
            state,
            renewal: renewal.spawn(first_renewal),
        })
    }
}

/// Vault transform client with a continuously renewed token.
pub struct VaultClient {
    config: Arc<Config>,
    transport: Arc<dyn VaultApi>,
    state: Arc<AuthState>,
    renewal: RenewalHandle,
}

impl VaultClient {
    pub fn builder(config: Config) -> VaultClientBuilder {
        VaultClientBuilder::new(config)
    }

    pub async fn from_env() -> Result<Self, VaultError> {
        VaultClientBuilder::new(Config::from_env()?).build().await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn is_token_valid(&self) -> bool {
        self.state.is_valid().await
    }

    /// Stop renewing. The current token stays usable until it expires.
    pub fn stop_renewal(&self) {
        self.renewal.stop();
    }

    /// Run a batch transform. Waits up to the block time for a valid token.
    ///
    /// Results are returned as vault sent them; matching them to requests is
    /// up to the caller.
    pub async fn transform(
        &self,
        ctx: &RequestContext,
        kind: TransformKind,
        role: &str,
        items: Vec<TransformRequest>,
    ) -> Result<Vec<TransformResult>, VaultError> {
        self.wait_for_token(ctx).await?;
        let token = self.state.get_token().await;

        let url = self.config.transform_url(kind, role);
        let requested = items.len();
        let response = self
            .transport
            .transform(ctx, &url, &token, &BatchRequest { batch_input: items })
            .await?;
        let results = response
            .into_results()
            .ok_or(VaultError::MissingResultData)?;

        tracing::debug!(
            kind = %kind,
            role,
            requested,
            returned = results.len(),
            request_id = ctx.request_id(),
            "Vault transform completed"
        );
        Ok(results)
    }

    async fn wait_for_token(&self, ctx: &RequestContext) -> Result<(), VaultError> {
        if self.state.is_valid().await {
            return Ok(());
        }

        let limit = ctx.bounded(self.state.block_time());
        let now = Instant::now();
        let deadline = now
            .checked_add(limit.min(MAX_DURATION))
            .unwrap_or(now);
        tracing::debug!(
            wait_ms = limit.as_millis() as u64,
            request_id = ctx.request_id(),
            "Auth token invalid, waiting for renewal"
        );

        // A wake-up only means a renewal happened; validity is re-checked each time.
        while !self.state.is_valid().await {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || !self.state.await_valid_token_for(remaining).await {
                return Err(VaultError::TokenTimeout { waited: limit });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Transformer for VaultClient {
    async fn transform(
        &self,
        ctx: &RequestContext,
        kind: TransformKind,
        role: &str,
        items: Vec<TransformRequest>,
    ) -> Result<Vec<TransformResult>, VaultError> {
        VaultClient::transform(self, ctx, kind, role, items).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BatchTransformResponse, LoginRequest, Secret, SecretAuth};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Transport that answers logins from a script and echoes transforms.
    struct ScriptedTransport {
        logins: Mutex<Vec<Result<Secret, VaultError>>>,
        transforms: Mutex<Vec<(String, String, usize)>>,
    }

    impl ScriptedTransport {
        fn new(logins: Vec<Result<Secret, VaultError>>) -> Arc<Self> {
            Arc::new(Self {
                logins: Mutex::new(logins),
                transforms: Mutex::new(Vec::new()),
            })
        }
    }

    fn secret(token: &str, lease: u64) -> Result<Secret, VaultError> {
        Ok(Secret {
            auth: Some(SecretAuth {
                client_token: token.to_string(),
                lease_duration: lease,
                renewable: true,
            }),
        })
    }

    #[async_trait]
    impl VaultApi for ScriptedTransport {
        async fn login(
            &self,
            _ctx: &RequestContext,
            _url: &str,
            _request: &LoginRequest,
        ) -> Result<Secret, VaultError> {
            let mut logins = self.logins.lock().unwrap();
            if logins.is_empty() {
                return Err(VaultError::MissingAuthData);
            }
            logins.remove(0)
        }

        async fn transform(
            &self,
            _ctx: &RequestContext,
            url: &str,
            token: &str,
            request: &BatchRequest,
        ) -> Result<BatchTransformResponse, VaultError> {
            self.transforms.lock().unwrap().push((
                url.to_string(),
                token.to_string(),
                request.batch_input.len(),
            ));
            let results = request
                .batch_input
                .iter()
                .map(|item| {
                    serde_json::json!({"encoded_value": item.value, "reference": item.reference})
                })
                .collect::<Vec<_>>();
            Ok(serde_json::from_value(serde_json::json!({"data": {"batch_results": results}}))?)
        }
    }

    fn config() -> Config {
        Config {
            address: "http://vault:8200".to_string(),
            auth_role: "tokenizer".to_string(),
            zone: "cards".to_string(),
            identity_override: Some("svc@example.com".to_string()),
            token_lifetime: Duration::from_secs(60),
            token_renew_buffer: Duration::from_secs(5),
            block_for_token_time: Duration::from_millis(200),
            token_error_retry_first_time: Duration::from_secs(10),
            token_error_retry_max_time: Duration::from_secs(10),
            ..Config::default()
        }
    }

    async fn client(transport: Arc<ScriptedTransport>, config: Config) -> Result<VaultClient, VaultError> {
        VaultClient::builder(config)
            .signer(JwtSigner::fixed("signed.jwt"))
            .transport(transport)
            .build()
            .await
    }

    fn items(values: &[&str]) -> Vec<TransformRequest> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| TransformRequest {
                value: v.to_string(),
                transformation: "card".to_string(),
                reference: i.to_string(),
                ..TransformRequest::default()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let transport = ScriptedTransport::new(vec![secret("hvs.1", 60)]);
        let mut config = config();
        config.zone.clear();
        let result = client(transport, config).await;
        assert!(matches!(result, Err(VaultError::MissingConfig { field: "zone" })));
    }

    #[tokio::test]
    async fn test_build_fails_when_first_login_fails() {
        let transport = ScriptedTransport::new(vec![Ok(Secret { auth: None })]);
        let result = client(transport, config()).await;
        assert!(matches!(result, Err(VaultError::MissingAuthData)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_build_survives_huge_lease() {
        let transport = ScriptedTransport::new(vec![secret("hvs.1", u64::MAX)]);
        let client = client(transport, config()).await.unwrap();

        assert!(client.is_token_valid().await);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(client.is_token_valid().await);
        assert!(!client.renewal.is_finished());
    }

    #[tokio::test]
    async fn test_transform_uses_current_token() {
        let transport = ScriptedTransport::new(vec![secret("hvs.1", 60)]);
        let client = client(transport.clone(), config()).await.unwrap();
        assert!(client.is_token_valid().await);

        let results = client
            .transform(
                &RequestContext::new(),
                TransformKind::Encode,
                "pan",
                items(&["4111111111111111", "5500000000000004"]),
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[1].reference, "1");
        let calls = transport.transforms.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![(
                "http://vault:8200/v1/int/au/transform/data/cards/encode/pan".to_string(),
                "hvs.1".to_string(),
                2
            )]
        );
    }

    #[tokio::test]
    async fn test_local_token_skips_jwt_login() {
        let transport = ScriptedTransport::new(vec![]);
        let mut config = config();
        config.local_token = Some("root".to_string());
        config.auth_role.clear();

        let client = client(transport.clone(), config).await.unwrap();
        client
            .transform(&RequestContext::new(), TransformKind::Decode, "pan", items(&["tok"]))
            .await
            .unwrap();

        assert_eq!(transport.transforms.lock().unwrap()[0].1, "root");
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_token_times_out() {
        // One-second lease, renewal failures afterwards.
        let transport = ScriptedTransport::new(vec![secret("hvs.1", 1)]);
        let mut config = config();
        config.token_renew_buffer = Duration::ZERO;
        let client = client(transport.clone(), config).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert!(!client.is_token_valid().await);

        let result = client
            .transform(&RequestContext::new(), TransformKind::Encode, "pan", items(&["4111"]))
            .await;
        match result {
            Err(e @ VaultError::TokenTimeout { .. }) => {
                assert_eq!(e.reason().code(), "VAULT_TOKEN_TIMEOUT");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(transport.transforms.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_caller_proceeds_after_renewal() {
        // Lease expires at 1s, the renewal then fails once and succeeds ~500ms later.
        let transport = ScriptedTransport::new(vec![
            secret("hvs.1", 1),
            Err(VaultError::MissingAuthData),
            secret("hvs.2", 60),
        ]);
        let mut config = config();
        config.token_renew_buffer = Duration::ZERO;
        config.block_for_token_time = Duration::from_secs(5);
        config.token_error_retry_first_time = Duration::from_millis(500);
        config.token_error_retry_max_time = Duration::from_millis(500);
        let client = client(transport.clone(), config).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert!(!client.is_token_valid().await);

        let results = client
            .transform(&RequestContext::new(), TransformKind::Encode, "pan", items(&["4111"]))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(transport.transforms.lock().unwrap()[0].1, "hvs.2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_renewal_keeps_current_token() {
        let transport = ScriptedTransport::new(vec![secret("hvs.1", 60)]);
        let client = client(transport, config()).await.unwrap();

        client.stop_renewal();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(client.is_token_valid().await);
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(!client.is_token_valid().await);
    }
}
