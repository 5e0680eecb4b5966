//! Bearer-token session verification
//!
//! Tokens are opaque: the identity provider decides whether a token is valid
//! and which user it belongs to. Protected routes get an [`AuthUser`]
//! extension; the raw token is kept so it can be forwarded to the caption
//! service.

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::AppState;

/// Authenticated caller, inserted as a request extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub access_token: String,
}

/// Session provider could not be asked
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session provider unavailable: {0}")]
    Unavailable(String),
}

/// Resolves a bearer token to a user id
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    /// `Ok(None)` when the token is not (or no longer) valid
    async fn verify(&self, token: &str) -> Result<Option<String>, SessionError>;
}

/// Verifier backed by the identity provider's `/auth/v1/user` endpoint
#[derive(Debug, Clone)]
pub struct RemoteSessionVerifier {
    http_client: reqwest::Client,
    user_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
}

impl RemoteSessionVerifier {
    pub fn new(http_client: reqwest::Client, auth_url: &str, api_key: Option<String>) -> Self {
        Self {
            http_client,
            user_url: format!("{}/auth/v1/user", auth_url.trim_end_matches('/')),
            api_key,
        }
    }
}

#[async_trait]
impl SessionVerifier for RemoteSessionVerifier {
    async fn verify(&self, token: &str) -> Result<Option<String>, SessionError> {
        let mut request = self.http_client.get(&self.user_url).bearer_auth(token);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SessionError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SessionError::Unavailable(format!(
                "identity provider returned {}",
                status
            )));
        }

        let user = response
            .json::<UserResponse>()
            .await
            .map_err(|e| SessionError::Unavailable(format!("invalid user response: {}", e)))?;
        Ok(Some(user.id).filter(|id| !id.is_empty()))
    }
}

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}

/// Authentication middleware
///
/// Applied to protected routes only; `/health` stays public.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = bearer_token(request.headers()) else {
        debug!(path = %request.uri().path(), "Missing bearer token");
        return Err(ApiError::AuthRequired);
    };

    let Some(user_id) = state.sessions.verify(&token).await? else {
        warn!(path = %request.uri().path(), "Rejected bearer token");
        return Err(ApiError::AuthRequired);
    };

    request.extensions_mut().insert(AuthUser {
        id: user_id,
        access_token: token,
    });
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def".to_string()));
        assert_eq!(bearer_token(&headers("bearer  xyz ")), Some("xyz".to_string()));
    }

    #[test]
    fn test_bearer_token_rejects_other_schemes() {
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&headers("Bearer")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_user_url_built_from_auth_url() {
        let verifier =
            RemoteSessionVerifier::new(reqwest::Client::new(), "https://auth.example/", None);
        assert_eq!(verifier.user_url, "https://auth.example/auth/v1/user");
    }
}
