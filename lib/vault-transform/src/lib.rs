//! vault-transform - batch encode/decode through the Vault transform engine
//!
//! Authentication:
//! 1. VAULT_TOKEN → static token, no JWT login
//! 2. Otherwise → JWT login with a service-account identity signed via IAM
//!
//! The token is renewed in the background before it expires. Callers that
//! find it expired wait for the next renewal up to a bounded block time.

mod auth;
mod client;
mod config;
mod context;
mod error;
mod models;
mod transport;

pub use auth::{
    AmbientCredentials, ApplicationDefaultCredentials, AuthMethod, AuthState, Backoff, Claims,
    IamSigner, IdentityResolver, JwtAuth, JwtSigner, RenewalHandle, RenewalLoop, StaticTokenAuth,
    calculate_delay_with_buffer,
};
pub use client::{Transformer, VaultClient, VaultClientBuilder};
pub use config::Config;
pub use context::RequestContext;
pub use error::{ErrorReason, VaultError};
pub use models::{
    BatchRequest, BatchResults, BatchTransformResponse, LoginRequest, Secret, SecretAuth,
    TransformKind, TransformRequest, TransformResult,
};
pub use transport::{RestTransport, VaultApi};
