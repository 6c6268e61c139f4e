use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::error::VaultError;
use crate::transport::client_error;

const DEFAULT_IAM_ADDRESS: &str = "https://iamcredentials.googleapis.com";

/// Claim-set presented to the vault JWT login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub aud: String,
    pub exp: i64,
}

/// Produces signed JWTs for the vault login.
pub enum JwtSigner {
    /// Platform identity-signing service.
    Iam(IamSigner),
    /// Canned value for stub environments and tests.
    Fixed(String),
}

impl JwtSigner {
    pub fn fixed(jwt: impl Into<String>) -> Self {
        Self::Fixed(jwt.into())
    }

    pub async fn sign(
        &self,
        ctx: &RequestContext,
        service_account: &str,
        claims: &Claims,
    ) -> Result<String, VaultError> {
        match self {
            Self::Iam(signer) => signer.sign(ctx, service_account, claims).await,
            Self::Fixed(jwt) => Ok(jwt.clone()),
        }
    }
}

/// Signs claim-sets through the IAM credentials `signJwt` API, authorised
/// with an access token from the metadata service.
pub struct IamSigner {
    http: reqwest::Client,
    iam_address: String,
    token_url: String,
}

#[derive(Deserialize)]
struct AccessToken {
    access_token: String,
}

#[derive(Serialize)]
struct SignJwtRequest<'a> {
    payload: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignJwtResponse {
    signed_jwt: String,
}

impl IamSigner {
    /// `token_url` is the metadata endpoint issuing access tokens for the default account.
    pub fn new(http: reqwest::Client, token_url: impl Into<String>) -> Self {
        Self {
            http,
            iam_address: DEFAULT_IAM_ADDRESS.to_string(),
            token_url: token_url.into(),
        }
    }

    pub fn with_iam_address(mut self, address: impl Into<String>) -> Self {
        self.iam_address = address.into();
        self
    }

    async fn access_token(&self, ctx: &RequestContext) -> Result<String, VaultError> {
        let mut request = self
            .http
            .get(&self.token_url)
            .header("Metadata-Flavor", "Google");
        if let Some(timeout) = ctx.budget("access token fetch")? {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|source| VaultError::Signing {
            message: "access token request failed".to_string(),
            source: Some(Box::new(VaultError::Request {
                context: "access token fetch",
                source,
            })),
        })?;
        if !response.status().is_success() {
            return Err(VaultError::Signing {
                message: "access token request rejected".to_string(),
                source: Some(Box::new(client_error(response).await)),
            });
        }

        let token: AccessToken = response
            .json()
            .await
            .map_err(|e| VaultError::signing(format!("invalid access token response: {e}")))?;
        Ok(token.access_token)
    }

    async fn sign(
        &self,
        ctx: &RequestContext,
        service_account: &str,
        claims: &Claims,
    ) -> Result<String, VaultError> {
        let payload = serde_json::to_string(claims)?;
        let access_token = self.access_token(ctx).await?;

        let url = format!(
            "{}/v1/projects/-/serviceAccounts/{}:signJwt",
            self.iam_address.trim_end_matches('/'),
            service_account
        );
        let mut request = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&SignJwtRequest { payload: &payload });
        if let Some(timeout) = ctx.budget("jwt signing")? {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|source| VaultError::Signing {
            message: "signJwt request failed".to_string(),
            source: Some(Box::new(VaultError::Request {
                context: "jwt signing",
                source,
            })),
        })?;
        if !response.status().is_success() {
            return Err(VaultError::Signing {
                message: format!("signJwt rejected for {service_account}"),
                source: Some(Box::new(client_error(response).await)),
            });
        }

        let signed: SignJwtResponse = response
            .json()
            .await
            .map_err(|e| VaultError::signing(format!("invalid signJwt response: {e}")))?;
        Ok(signed.signed_jwt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";
    const SIGN_PATH: &str = "/v1/projects/-/serviceAccounts/svc@example.com:signJwt";

    fn claims() -> Claims {
        Claims {
            sub: "svc@example.com".to_string(),
            aud: "vault/tokenizer".to_string(),
            exp: 1_700_000_000,
        }
    }

    fn iam(server: &MockServer) -> JwtSigner {
        JwtSigner::Iam(
            IamSigner::new(reqwest::Client::new(), format!("{}{}", server.uri(), TOKEN_PATH))
                .with_iam_address(server.uri()),
        )
    }

    #[tokio::test]
    async fn test_fixed_signer() {
        let signer = JwtSigner::fixed("canned.jwt.value");
        let jwt = signer
            .sign(&RequestContext::new(), "svc@example.com", &claims())
            .await
            .unwrap();
        assert_eq!(jwt, "canned.jwt.value");
    }

    #[tokio::test]
    async fn test_iam_signer_signs_claims() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TOKEN_PATH))
            .and(header("Metadata-Flavor", "Google"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.token",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let payload = serde_json::to_string(&claims()).unwrap();
        Mock::given(method("POST"))
            .and(path(SIGN_PATH))
            .and(header("authorization", "Bearer ya29.token"))
            .and(body_json(serde_json::json!({ "payload": payload })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "keyId": "key-1",
                "signedJwt": "header.payload.signature"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let jwt = iam(&server)
            .sign(&RequestContext::new(), "svc@example.com", &claims())
            .await
            .unwrap();
        assert_eq!(jwt, "header.payload.signature");
    }

    #[tokio::test]
    async fn test_iam_rejection_is_signing_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.token"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(SIGN_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
            .mount(&server)
            .await;

        let result = iam(&server)
            .sign(&RequestContext::new(), "svc@example.com", &claims())
            .await;

        match result {
            Err(VaultError::Signing { source: Some(source), .. }) => {
                assert!(matches!(*source, VaultError::ClientError { status: 403, .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
