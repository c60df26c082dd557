//! Client for the identity provider's REST API.
//!
//! The provider exposes one POST endpoint per operation under
//! `{base}/v1/accounts:<operation>?key=<api key>`. Successful responses carry
//! the user id, an id token and its lifetime in seconds.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::{AuthError, AuthMode};

// ============================================================================
// Constants
// ============================================================================

/// Base URL of the hosted identity toolkit.
pub const DEFAULT_IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com";

/// API version path segment.
const API_VERSION: &str = "v1";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    local_id: String,
    id_token: String,
    expires_in: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Credentials issued by the identity provider.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthGrant {
    pub user_id: String,
    pub token: String,
    pub expires_in: Duration,
}

impl fmt::Debug for AuthGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthGrant")
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Something that can exchange an email and password for an [`AuthGrant`].
pub trait IdentityProvider: Send + Sync + 'static {
    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<AuthGrant, AuthError>> + Send;

    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<AuthGrant, AuthError>> + Send;
}

/// HTTP client for the identity provider.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct IdentityClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl IdentityClient {
    /// Create a client against the hosted identity toolkit
    pub fn new(api_key: impl Into<String>) -> Result<Self, AuthError> {
        Self::build(Some(api_key.into()))
    }

    /// Create a client with no API key. Every request fails with
    /// [`AuthError::MissingApiKey`]; useful when only stored sessions are handled.
    pub fn without_key() -> Result<Self, AuthError> {
        Self::build(None)
    }

    fn build(api_key: Option<String>) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: DEFAULT_IDENTITY_BASE_URL.to_string(),
            api_key,
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Point the client at a different host (self-hosted emulator, test server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint_url(&self, mode: AuthMode) -> String {
        format!("{}/{}/{}", self.base_url, API_VERSION, mode.endpoint())
    }

    async fn request(
        &self,
        mode: AuthMode,
        email: &str,
        password: &str,
    ) -> Result<AuthGrant, AuthError> {
        let api_key = self.api_key.as_deref().ok_or(AuthError::MissingApiKey)?;
        let url = self.endpoint_url(mode);
        debug!(endpoint = mode.endpoint(), "Sending identity request");

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&AuthRequest {
                email,
                password,
                return_secure_token: true,
            })
            .send()
            .await?;

        let response = Self::check_response(mode, response).await?;
        let body = response.text().await?;
        Self::parse_grant(&body)
    }

    /// Check if response is successful, classifying the provider error if not.
    async fn check_response(
        mode: AuthMode,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, AuthError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(Self::classify_failure(mode, status, &body))
        }
    }

    fn classify_failure(mode: AuthMode, status: StatusCode, body: &str) -> AuthError {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => {
                let err = AuthError::from_provider_code(mode, &envelope.error.message);
                debug!(status = %status, error = %err, "Identity provider rejected request");
                err
            }
            Err(_) => {
                warn!(status = %status, "Unrecognized identity error response");
                AuthError::InvalidResponse(format!(
                    "Status {}: {}",
                    status,
                    AuthError::truncate_body(body)
                ))
            }
        }
    }

    fn parse_grant(body: &str) -> Result<AuthGrant, AuthError> {
        let parsed: AuthResponse = serde_json::from_str(body).map_err(|e| {
            AuthError::InvalidResponse(format!("Failed to parse auth response: {}", e))
        })?;

        let seconds: u64 = parsed.expires_in.trim().parse().map_err(|_| {
            AuthError::InvalidResponse(format!(
                "expiresIn is not a number of seconds: {:?}",
                parsed.expires_in
            ))
        })?;

        if parsed.local_id.is_empty() || parsed.id_token.is_empty() {
            return Err(AuthError::InvalidResponse(
                "Auth response is missing localId or idToken".to_string(),
            ));
        }

        Ok(AuthGrant {
            user_id: parsed.local_id,
            token: parsed.id_token,
            expires_in: Duration::from_secs(seconds),
        })
    }
}

impl IdentityProvider for IdentityClient {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthGrant, AuthError> {
        self.request(AuthMode::SignUp, email, password).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthGrant, AuthError> {
        self.request(AuthMode::SignIn, email, password).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url() {
        let client = IdentityClient::new("key")
            .expect("client")
            .with_base_url("http://localhost:9099/");
        assert_eq!(
            client.endpoint_url(AuthMode::SignUp),
            "http://localhost:9099/v1/accounts:signUp"
        );
        assert_eq!(
            client.endpoint_url(AuthMode::SignIn),
            "http://localhost:9099/v1/accounts:signInWithPassword"
        );
    }

    #[test]
    fn test_parse_grant() {
        let json = r#"{"kind":"identitytoolkit#SignupNewUserResponse","idToken":"tok-123","email":"a@b.c","refreshToken":"r","expiresIn":"3600","localId":"uid-1"}"#;
        let grant = IdentityClient::parse_grant(json).expect("grant");
        assert_eq!(grant.user_id, "uid-1");
        assert_eq!(grant.token, "tok-123");
        assert_eq!(grant.expires_in, Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_grant_rejects_bad_expiry() {
        let json = r#"{"idToken":"t","expiresIn":"soon","localId":"u"}"#;
        assert!(matches!(
            IdentityClient::parse_grant(json),
            Err(AuthError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_grant_rejects_missing_fields() {
        assert!(IdentityClient::parse_grant(r#"{"idToken":"t","expiresIn":"10"}"#).is_err());
        assert!(IdentityClient::parse_grant(r#"{"idToken":"","expiresIn":"10","localId":"u"}"#).is_err());
    }

    #[test]
    fn test_classify_failure() {
        let body = r#"{"error":{"code":400,"message":"EMAIL_EXISTS","errors":[]}}"#;
        assert!(matches!(
            IdentityClient::classify_failure(AuthMode::SignUp, StatusCode::BAD_REQUEST, body),
            AuthError::EmailExists
        ));

        let err = IdentityClient::classify_failure(
            AuthMode::SignIn,
            StatusCode::BAD_GATEWAY,
            "<html>bad gateway</html>",
        );
        assert!(matches!(err, AuthError::InvalidResponse(ref m) if m.contains("502")));
    }

    #[tokio::test]
    async fn test_request_without_key_fails_before_sending() {
        // Port 9 (discard) is never contacted: the key check comes first
        let client = IdentityClient::without_key()
            .expect("client")
            .with_base_url("http://127.0.0.1:9");
        assert!(!client.has_api_key());
        assert!(matches!(
            client.sign_in("a@b.c", "pw").await,
            Err(AuthError::MissingApiKey)
        ));
    }

    #[test]
    fn test_grant_debug_redacts_token() {
        let grant = AuthGrant {
            user_id: "u".into(),
            token: "secret-token".into(),
            expires_in: Duration::from_secs(1),
        };
        assert!(!format!("{:?}", grant).contains("secret-token"));
    }
}
