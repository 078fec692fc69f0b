use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use crate::{
    error::{AppError, AppResult},
    models::UserId,
    services::providers::SpotifyClient,
};

use super::AppState;

/// Per-request identity: the caller's bearer token and the user it belongs to.
///
/// Built fresh for every request; nothing about the caller outlives it.
#[derive(Clone)]
pub struct Session {
    pub user_id: UserId,
    pub client: SpotifyClient,
}

/// Extracts the token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> AppResult<String> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("missing Authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("malformed Authorization header".to_string()))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim().to_string())
        }
        _ => Err(AppError::Unauthorized(
            "expected a bearer token".to_string(),
        )),
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> AppResult<Self> {
        let token = bearer_token(&parts.headers)?;

        let client = SpotifyClient::new(
            state.http_client.clone(),
            state.config.spotify_api_url.clone(),
            token,
        );
        let user_id = client.current_user().await?;

        tracing::debug!(user_id = %user_id, "Session resolved");

        Ok(Self { user_id, client })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc123")).unwrap(), "abc123");
        assert_eq!(bearer_token(&headers("bearer abc123")).unwrap(), "abc123");
    }

    #[test]
    fn test_bearer_token_rejections() {
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            bearer_token(&headers("Basic dXNlcjpwYXNz")),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            bearer_token(&headers("Bearer ")),
            Err(AppError::Unauthorized(_))
        ));
    }
}
