use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Missing required configuration: {field}")]
    MissingConfig { field: &'static str },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Identity resolution failed: {0}")]
    Identity(String),

    #[error("Metadata service returned {status}: {message}")]
    MetadataStatus { status: u16, message: String },

    #[error("JWT signing failed: {message}")]
    Signing {
        message: String,
        #[source]
        source: Option<Box<VaultError>>,
    },

    #[error("Vault request failed: {context}")]
    Request {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Vault client error ({status}): {message}")]
    ClientError {
        status: u16,
        message: String,
        errors: Vec<String>,
        response_data: Option<serde_json::Value>,
    },

    #[error("Login response has no auth data")]
    MissingAuthData,

    #[error("Waited {waited:?} for valid auth token but timed out")]
    TokenTimeout { waited: Duration },

    #[error("Request deadline exceeded before {0}")]
    DeadlineExceeded(&'static str),

    #[error("Malformed vault response: {0}")]
    MalformedResponse(String),

    #[error("Transform response missing result data")]
    MissingResultData,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Machine-checkable classification of a [`VaultError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorReason {
    Config,
    Identity,
    Signing,
    Transport,
    Status,
    Login,
    TokenTimeout,
    Deadline,
    MalformedResponse,
    MissingResult,
}

impl ErrorReason {
    pub const fn code(self) -> &'static str {
        match self {
            Self::Config => "VAULT_CONFIG",
            Self::Identity => "VAULT_IDENTITY",
            Self::Signing => "VAULT_SIGNING",
            Self::Transport => "VAULT_TRANSPORT",
            Self::Status => "VAULT_STATUS",
            Self::Login => "VAULT_LOGIN_NO_AUTH",
            Self::TokenTimeout => "VAULT_TOKEN_TIMEOUT",
            Self::Deadline => "VAULT_DEADLINE",
            Self::MalformedResponse => "VAULT_MALFORMED_RESPONSE",
            Self::MissingResult => "VAULT_MISSING_RESULT",
        }
    }
}

impl std::fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl VaultError {
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
            source: None,
        }
    }

    pub fn reason(&self) -> ErrorReason {
        match self {
            Self::MissingConfig { .. } | Self::InvalidConfig(_) => ErrorReason::Config,
            Self::Identity(_) | Self::MetadataStatus { .. } => ErrorReason::Identity,
            Self::Signing { .. } => ErrorReason::Signing,
            Self::Request { .. } | Self::Io(_) => ErrorReason::Transport,
            Self::ClientError { .. } => ErrorReason::Status,
            Self::MissingAuthData => ErrorReason::Login,
            Self::TokenTimeout { .. } => ErrorReason::TokenTimeout,
            Self::DeadlineExceeded(_) => ErrorReason::Deadline,
            Self::MalformedResponse(_) | Self::Json(_) => ErrorReason::MalformedResponse,
            Self::MissingResultData => ErrorReason::MissingResult,
        }
    }

    /// Whether a later attempt with the same input may succeed.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Request { .. } | Self::TokenTimeout { .. } | Self::Io(_) => true,
            Self::ClientError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
