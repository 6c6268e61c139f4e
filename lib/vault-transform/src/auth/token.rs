use super::AuthMethod;
use crate::VaultError;
use crate::context::RequestContext;
use crate::models::SecretAuth;
use async_trait::async_trait;

/// Static token authentication for stub environments
pub struct StaticTokenAuth {
    token: String,
}

impl StaticTokenAuth {
    pub fn new(token: String) -> Self {
        Self { token }
    }
}

#[async_trait]
impl AuthMethod for StaticTokenAuth {
    async fn login(&self, _ctx: &RequestContext) -> Result<SecretAuth, VaultError> {
        // Zero lease: the configured token lifetime applies.
        Ok(SecretAuth {
            client_token: self.token.clone(),
            lease_duration: 0,
            renewable: false,
        })
    }
}
