use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::{AuthMethod, Claims, IdentityResolver, JwtSigner};
use crate::VaultError;
use crate::context::RequestContext;
use crate::models::{LoginRequest, SecretAuth};
use crate::transport::VaultApi;

/// Vault JWT login: resolve the identity, sign a claim-set for it, exchange it for a token.
pub struct JwtAuth {
    identity: IdentityResolver,
    signer: JwtSigner,
    transport: Arc<dyn VaultApi>,
    login_url: String,
    role: String,
    audience: String,
    token_lifetime: Duration,
}

impl JwtAuth {
    pub fn new(
        identity: IdentityResolver,
        signer: JwtSigner,
        transport: Arc<dyn VaultApi>,
        login_url: String,
        role: String,
        token_lifetime: Duration,
    ) -> Self {
        Self {
            identity,
            signer,
            transport,
            login_url,
            audience: format!("vault/{role}"),
            role,
            token_lifetime,
        }
    }

    fn claims(&self, identity: &str) -> Claims {
        let lifetime = chrono::Duration::from_std(self.token_lifetime)
            .unwrap_or_else(|_| chrono::Duration::seconds(i64::from(u32::MAX)));
        Claims {
            sub: identity.to_string(),
            aud: self.audience.clone(),
            exp: (Utc::now() + lifetime).timestamp(),
        }
    }
}

#[async_trait]
impl AuthMethod for JwtAuth {
    async fn login(&self, ctx: &RequestContext) -> Result<SecretAuth, VaultError> {
        let identity = self.identity.resolve(ctx).await?;
        let claims = self.claims(&identity);
        let jwt = self.signer.sign(ctx, &identity, &claims).await?;

        let secret = self
            .transport
            .login(
                ctx,
                &self.login_url,
                &LoginRequest {
                    role: self.role.clone(),
                    jwt,
                },
            )
            .await?;

        let auth = secret.auth.ok_or(VaultError::MissingAuthData)?;
        tracing::debug!(
            identity = %identity,
            lease_secs = auth.lease_duration,
            request_id = ctx.request_id(),
            "Vault login succeeded"
        );
        Ok(auth)
    }
}
