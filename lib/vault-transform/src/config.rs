use std::time::Duration;

use crate::error::VaultError;
use crate::models::TransformKind;

const DEFAULT_AUTH_PATH: &str = "v1/auth/gcp";
const DEFAULT_METADATA_ADDRESS: &str = "http://metadata.google.internal";
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(15 * 60);
const DEFAULT_TOKEN_RENEW_BUFFER: Duration = Duration::from_secs(60);
const DEFAULT_BLOCK_FOR_TOKEN_TIME: Duration = Duration::from_secs(5);
const DEFAULT_RETRY_FIRST_TIME: Duration = Duration::from_secs(1);
const DEFAULT_RETRY_MAX_TIME: Duration = Duration::from_secs(60);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for every configured duration and for server-issued leases.
pub const MAX_DURATION: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// Client configuration. Loaded once, never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub address: String,
    pub auth_role: String,
    /// Static token for stub environments; replaces the JWT login.
    pub local_token: Option<String>,
    pub auth_path: String,
    pub namespace: String,
    pub zone: String,
    pub metadata_address: String,
    pub identity_override: Option<String>,
    pub disable_ambient_credentials: bool,
    /// Assumed token validity when the server reports no lease.
    pub token_lifetime: Duration,
    pub token_renew_buffer: Duration,
    pub block_for_token_time: Duration,
    pub token_error_retry_first_time: Duration,
    pub token_error_retry_max_time: Duration,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: String::new(),
            auth_role: String::new(),
            local_token: None,
            auth_path: DEFAULT_AUTH_PATH.to_string(),
            namespace: String::new(),
            zone: String::new(),
            metadata_address: DEFAULT_METADATA_ADDRESS.to_string(),
            identity_override: None,
            disable_ambient_credentials: false,
            token_lifetime: DEFAULT_TOKEN_LIFETIME,
            token_renew_buffer: DEFAULT_TOKEN_RENEW_BUFFER,
            block_for_token_time: DEFAULT_BLOCK_FOR_TOKEN_TIME,
            token_error_retry_first_time: DEFAULT_RETRY_FIRST_TIME,
            token_error_retry_max_time: DEFAULT_RETRY_MAX_TIME,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, VaultError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, VaultError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let secs = |key: &'static str, default: Duration| -> Result<Duration, VaultError> {
            match non_empty(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| VaultError::InvalidConfig(format!("{key}={raw} is not a number of seconds"))),
                None => Ok(default),
            }
        };

        let disable_ambient_credentials = match non_empty("VAULT_DISABLE_AMBIENT_CREDENTIALS") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                VaultError::InvalidConfig(format!(
                    "VAULT_DISABLE_AMBIENT_CREDENTIALS={raw} is not a boolean"
                ))
            })?,
            None => defaults.disable_ambient_credentials,
        };

        Ok(Self {
            address: non_empty("VAULT_ADDR").ok_or(VaultError::MissingConfig {
                field: "VAULT_ADDR",
            })?,
            auth_role: non_empty("VAULT_AUTH_ROLE").unwrap_or_default(),
            local_token: non_empty("VAULT_LOCAL_TOKEN"),
            auth_path: non_empty("VAULT_AUTH_PATH").unwrap_or(defaults.auth_path),
            namespace: non_empty("VAULT_NAMESPACE").unwrap_or_default(),
            zone: non_empty("VAULT_ZONE").unwrap_or_default(),
            metadata_address: non_empty("VAULT_METADATA_ADDR").unwrap_or(defaults.metadata_address),
            identity_override: non_empty("VAULT_IDENTITY"),
            disable_ambient_credentials,
            token_lifetime: secs("VAULT_TOKEN_LIFETIME_SECS", defaults.token_lifetime)?,
            token_renew_buffer: secs("VAULT_TOKEN_RENEW_BUFFER_SECS", defaults.token_renew_buffer)?,
            block_for_token_time: secs("VAULT_BLOCK_FOR_TOKEN_SECS", defaults.block_for_token_time)?,
            token_error_retry_first_time: secs(
                "VAULT_TOKEN_RETRY_FIRST_SECS",
                defaults.token_error_retry_first_time,
            )?,
            token_error_retry_max_time: secs(
                "VAULT_TOKEN_RETRY_MAX_SECS",
                defaults.token_error_retry_max_time,
            )?,
            request_timeout: secs("VAULT_REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
        })
    }

    pub fn validate(&self) -> Result<(), VaultError> {
        if self.address.trim().is_empty() {
            return Err(VaultError::MissingConfig { field: "address" });
        }
        if self.local_token.is_none() && self.auth_role.trim().is_empty() {
            return Err(VaultError::MissingConfig { field: "auth_role" });
        }
        if self.zone.trim().is_empty() {
            return Err(VaultError::MissingConfig { field: "zone" });
        }
        if self.token_error_retry_first_time.is_zero() {
            return Err(VaultError::InvalidConfig(
                "token error retry first time must be greater than zero".to_string(),
            ));
        }
        if self.token_error_retry_first_time > self.token_error_retry_max_time {
            return Err(VaultError::InvalidConfig(format!(
                "token error retry first time {:?} exceeds max time {:?}",
                self.token_error_retry_first_time, self.token_error_retry_max_time
            )));
        }
        if self.token_lifetime.is_zero() {
            return Err(VaultError::InvalidConfig(
                "token lifetime must be greater than zero".to_string(),
            ));
        }
        for (name, value) in [
            ("token lifetime", self.token_lifetime),
            ("token renew buffer", self.token_renew_buffer),
            ("block for token time", self.block_for_token_time),
            ("token error retry max time", self.token_error_retry_max_time),
            ("request timeout", self.request_timeout),
        ] {
            if value > MAX_DURATION {
                return Err(VaultError::InvalidConfig(format!(
                    "{name} {value:?} exceeds {MAX_DURATION:?}"
                )));
            }
        }
        Ok(())
    }

    fn base_url(&self) -> &str {
        self.address.trim_end_matches('/')
    }

    pub fn login_url(&self) -> String {
        format!("{}/{}/login", self.base_url(), self.auth_path.trim_matches('/'))
    }

    pub fn transform_url(&self, kind: TransformKind, role: &str) -> String {
        format!(
            "{}/v1/int/au/transform/data/{}/{}/{}",
            self.base_url(),
            self.zone,
            kind.as_str(),
            role
        )
    }

    pub fn metadata_url(&self, suffix: &str) -> String {
        format!(
            "{}/computeMetadata/v1/instance/service-accounts/default/{}",
            self.metadata_address.trim_end_matches('/'),
            suffix
        )
    }

    /// JWT audience presented at login.
    pub fn audience(&self) -> String {
        format!("vault/{}", self.auth_role)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
