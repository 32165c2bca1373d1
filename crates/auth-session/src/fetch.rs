//! Protected requests with transparent token refresh.

use crate::session_core::{EndReason, SessionCore};
use crate::transport::{HttpRequest, HttpResponse};
use crate::{AuthError, AuthResult};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Issues requests with the session's bearer token.
///
/// On a 401 the access token is refreshed (one refresh shared by all
/// concurrent callers) and the request is reissued exactly once. Whatever
/// the retry yields is returned as-is.
#[derive(Clone)]
pub struct AuthenticatedFetch {
    core: Arc<SessionCore>,
}

impl AuthenticatedFetch {
    pub(crate) fn new(core: Arc<SessionCore>) -> Self {
        Self { core }
    }

    /// Send `request` with the current access token.
    ///
    /// Relative URLs resolve against the identity service base URL.
    ///
    /// Restores the persisted session first if `initialize()` has not run.
    ///
    /// Fails with `SessionExpired` when there is no access token or the
    /// refresh was rejected, ending the session in both cases. Fails with
    /// `NetworkError` on transport failure or a transient refresh failure,
    /// keeping the session.
    pub async fn fetch_with_token_refresh(&self, request: HttpRequest) -> AuthResult<HttpResponse> {
        let request = self.resolve(request)?;

        // Hydrate from the store first; a no-op once restore has run.
        self.core.initialize().await;

        let Some(token) = self.core.state.access_token() else {
            warn!(url = %request.url, "No access token, ending session");
            self.core.end_session(EndReason::Revoked);
            return Err(AuthError::SessionExpired);
        };

        let transport = self.core.client.transport();
        let response = transport
            .execute(request.clone().with_bearer(&token))
            .await?;

        if !response.is_unauthorized() {
            return Ok(response);
        }

        debug!(method = %request.method, url = %request.url, "Request unauthorized, refreshing access token");

        let token = match self.core.refresh_access_token(Some(&token)).await {
            Ok(token) => token,
            Err(e) if e.forces_logout() => {
                debug!(error = %e, "Refresh rejected, session expired");
                return Err(AuthError::SessionExpired);
            }
            Err(e) => return Err(e),
        };

        let url = request.url.clone();
        let retried = transport.execute(request.with_bearer(&token)).await?;
        if retried.is_unauthorized() {
            warn!(url = %url, "Request still unauthorized after refresh");
        }
        Ok(retried)
    }

    fn resolve(&self, mut request: HttpRequest) -> AuthResult<HttpRequest> {
        match Url::parse(&request.url) {
            Ok(_) => Ok(request),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let relative = request.url.trim_start_matches('/');
                request.url = self.core.client.base_url().join(relative)?.to_string();
                Ok(request)
            }
            Err(e) => Err(e.into()),
        }
    }
}
