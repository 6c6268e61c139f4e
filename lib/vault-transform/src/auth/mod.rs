mod backoff;
mod identity;
mod jwt;
mod renewal;
mod signer;
mod state;
mod token;

pub use backoff::Backoff;
pub use identity::{AmbientCredentials, ApplicationDefaultCredentials, IdentityResolver};
pub use jwt::JwtAuth;
pub use renewal::{RenewalHandle, RenewalLoop, calculate_delay_with_buffer};
pub use signer::{Claims, IamSigner, JwtSigner};
pub use state::AuthState;
pub use token::StaticTokenAuth;

use crate::VaultError;
use crate::context::RequestContext;
use crate::models::SecretAuth;
use async_trait::async_trait;

/// Trait for login strategies
#[async_trait]
pub trait AuthMethod: Send + Sync {
    /// Obtain a fresh vault token
    async fn login(&self, ctx: &RequestContext) -> Result<SecretAuth, VaultError>;
}
