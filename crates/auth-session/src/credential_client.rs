//! Identity service client.
//!
//! Each operation is a single request/response exchange. No retries happen
//! here; callers decide.

use crate::claims::decode_unverified_claims;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::types::{LoginGrant, RefreshGrant, SignupData, User};
use crate::{AuthError, AuthResult};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use session_config_and_utils::Config;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;

const LOGIN_PATH: &str = "iam/login/";
const SIGNUP_PATH: &str = "iam/signup/";
const REFRESH_PATH: &str = "iam/token/refresh/";
const PROFILE_PATH: &str = "iam/me/";

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    access: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

/// Client for the identity service endpoints.
#[derive(Clone)]
pub struct CredentialClient {
    transport: Arc<dyn HttpTransport>,
    base_url: Url,
    token_lifetime: Duration,
}

impl CredentialClient {
    /// Create a client rooted at `base_url`.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        base_url: &str,
        token_lifetime: std::time::Duration,
    ) -> AuthResult<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let token_lifetime = Duration::from_std(token_lifetime).map_err(|e| {
            AuthError::Config(session_config_and_utils::CoreError::Config(format!(
                "token lifetime out of range: {}",
                e
            )))
        })?;

        Ok(Self {
            transport,
            base_url,
            token_lifetime,
        })
    }

    /// Create a client from configuration.
    pub fn from_config(config: &Config, transport: Arc<dyn HttpTransport>) -> AuthResult<Self> {
        Self::new(
            transport,
            &config.identity_base_url,
            config.token_lifetime(),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn token_lifetime(&self) -> Duration {
        self.token_lifetime
    }

    pub(crate) fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.transport
    }

    /// Expiry for a token issued now, at the millisecond precision the
    /// token store persists.
    fn expiry_from_now(&self) -> DateTime<Utc> {
        (Utc::now() + self.token_lifetime).trunc_subsecs(3)
    }

    fn endpoint(&self, path: &str) -> AuthResult<String> {
        Ok(self.base_url.join(path)?.to_string())
    }

    /// Exchange a username/password pair for a token pair.
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<LoginGrant> {
        let request = HttpRequest::post_json(
            self.endpoint(LOGIN_PATH)?,
            &LoginRequest { username, password },
        )?;

        let response = self.transport.execute(request).await?;

        if !response.is_success() {
            let body = response.text();
            if response.is_server_error() {
                error!(
                    status = response.status,
                    body_summary = %summarize_response_body(&body),
                    "Login failed with server error"
                );
                return Err(AuthError::NetworkError(format!(
                    "login failed: HTTP {}",
                    response.status
                )));
            }

            warn!(status = response.status, "Login rejected");
            let message = server_message(&response)
                .unwrap_or_else(|| format!("login rejected: HTTP {}", response.status));
            return Err(AuthError::InvalidCredentials(message));
        }

        let body: LoginResponse = response
            .json()
            .map_err(|e| AuthError::MalformedResponse(format!("login response: {}", e)))?;

        let access_token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::MalformedResponse("login response lacks accessToken".into()))?;
        let refresh_token = body.refresh_token.filter(|t| !t.is_empty()).ok_or_else(|| {
            AuthError::MalformedResponse("login response lacks refreshToken".into())
        })?;

        let user = decode_unverified_claims(&access_token)?;
        let expires_at = self.expiry_from_now();

        info!(user_id = %user.id, username = %user.username, "Login succeeded");

        Ok(LoginGrant {
            access_token,
            refresh_token,
            user,
            expires_at,
        })
    }

    /// Create an account. Does not sign in.
    pub async fn create_account(&self, data: &SignupData) -> AuthResult<()> {
        let request = HttpRequest::post_json(self.endpoint(SIGNUP_PATH)?, data)?;

        let response = self.transport.execute(request).await?;

        if !response.is_success() {
            let body = response.text();
            let body_summary = summarize_response_body(&body);
            error!(
                status = response.status,
                body_summary = %body_summary,
                "Account creation failed"
            );
            let reason = server_message(&response)
                .unwrap_or_else(|| format!("HTTP {} ({})", response.status, body_summary));
            return Err(AuthError::SignupFailed(reason));
        }

        info!(username = %data.username, "Account created");
        Ok(())
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<RefreshGrant> {
        let request = HttpRequest::post_json(
            self.endpoint(REFRESH_PATH)?,
            &RefreshRequest {
                refresh: refresh_token,
            },
        )?;

        let response = self.transport.execute(request).await?;

        if response.is_client_error() {
            warn!(status = response.status, "Refresh token rejected");
            let message = server_message(&response)
                .unwrap_or_else(|| format!("HTTP {}", response.status));
            return Err(AuthError::RefreshRejected(message));
        }

        if !response.is_success() {
            let body_summary = summarize_response_body(&response.text());
            error!(
                status = response.status,
                body_summary = %body_summary,
                "Token refresh failed"
            );
            return Err(AuthError::NetworkError(format!(
                "token refresh failed: HTTP {} ({})",
                response.status, body_summary
            )));
        }

        let body: RefreshResponse = response
            .json()
            .map_err(|e| AuthError::MalformedResponse(format!("refresh response: {}", e)))?;
        let access_token = body
            .access
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::MalformedResponse("refresh response lacks access".into()))?;

        debug!("Access token refreshed");

        Ok(RefreshGrant {
            access_token,
            expires_at: self.expiry_from_now(),
        })
    }

    /// Fetch the profile of the token's owner.
    pub async fn fetch_profile(&self, access_token: &str) -> AuthResult<User> {
        let request = HttpRequest::get(self.endpoint(PROFILE_PATH)?).with_bearer(access_token);

        let response = self.transport.execute(request).await?;

        if response.is_unauthorized() {
            debug!("Profile fetch unauthorized");
            return Err(AuthError::Unauthorized);
        }

        if !response.is_success() {
            let body_summary = summarize_response_body(&response.text());
            error!(
                status = response.status,
                body_summary = %body_summary,
                "Profile fetch failed"
            );
            let message = format!("profile fetch failed: HTTP {} ({})", response.status, body_summary);
            return Err(if response.is_server_error() {
                AuthError::NetworkError(message)
            } else {
                AuthError::MalformedResponse(message)
            });
        }

        let user: User = response
            .json()
            .map_err(|e| AuthError::MalformedResponse(format!("profile response: {}", e)))?;

        debug!(user_id = %user.id, "Fetched profile");
        Ok(user)
    }
}

fn server_message(response: &HttpResponse) -> Option<String> {
    let body: ErrorBody = response.json().ok()?;
    body.message
        .or(body.detail)
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
}
