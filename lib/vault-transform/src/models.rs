use serde::{Deserialize, Serialize};

/// Login request body for `POST {address}/{auth_path}/login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub role: String,
    pub jwt: String,
}

/// Vault login response. A missing `auth` block is a failed login.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secret {
    #[serde(default)]
    pub auth: Option<SecretAuth>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecretAuth {
    pub client_token: String,
    /// Lease in seconds; zero when the server does not say.
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformKind {
    Encode,
    Decode,
}

impl TransformKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Encode => "encode",
            Self::Decode => "decode",
        }
    }
}

impl std::fmt::Display for TransformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single item of a batch transform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformRequest {
    pub value: String,
    pub transformation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tweak: Option<String>,
    /// Caller-chosen correlator, echoed back in the result.
    pub reference: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchRequest {
    pub batch_input: Vec<TransformRequest>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TransformResult {
    #[serde(default)]
    pub encoded_value: Option<String>,
    #[serde(default)]
    pub decoded_value: Option<String>,
    #[serde(default)]
    pub reference: String,
    #[serde(default, rename = "errors", alias = "Errors")]
    pub errors: Option<String>,
}

impl TransformResult {
    /// The transformed value, whichever side of the transform produced it.
    pub fn value(&self) -> Option<&str> {
        self.encoded_value
            .as_deref()
            .or(self.decoded_value.as_deref())
            .filter(|v| !v.is_empty())
    }

    pub fn error(&self) -> Option<&str> {
        self.errors.as_deref().filter(|e| !e.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchTransformResponse {
    #[serde(default)]
    pub data: Option<BatchResults>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchResults {
    #[serde(default)]
    pub batch_results: Option<Vec<TransformResult>>,
}

impl BatchTransformResponse {
    pub fn into_results(self) -> Option<Vec<TransformResult>> {
        self.data.and_then(|data| data.batch_results)
    }
}
