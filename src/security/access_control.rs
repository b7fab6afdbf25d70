//! Access control gate.
//!
//! Extracts `Authorization: Bearer <token>`, verifies it with the
//! [`TokenCodec`], and attaches the resulting [`Claims`] to the request.
//! The gate holds no state of its own.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use thiserror::Error;

use crate::auth::{Claims, TokenCodec};
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;

/// Why a request was rejected at the gate.
///
/// Codec failures all collapse into `InvalidToken`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("authorization header required")]
    MissingHeader,

    #[error("authorization format must be Bearer {{token}}")]
    InvalidFormat,

    #[error("invalid token")]
    InvalidToken,
}

impl AuthError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingHeader => "missing_header",
            AuthError::InvalidFormat => "invalid_format",
            AuthError::InvalidToken => "invalid_token",
        }
    }
}

/// Pull the token out of a `Bearer <token>` header. The scheme is case-insensitive.
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers.get(AUTHORIZATION).ok_or(AuthError::MissingHeader)?;
    let value = value.to_str().map_err(|_| AuthError::InvalidFormat)?;
    if value.is_empty() {
        return Err(AuthError::MissingHeader);
    }

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::InvalidFormat)?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::InvalidFormat);
    }

    Ok(token)
}

/// Verify the request's credential and attach the claims to its extensions.
pub fn verify_and_attach<B>(request: &mut Request<B>, codec: &TokenCodec) -> Result<Claims, AuthError> {
    let claims = {
        let token = extract_bearer(request.headers()).map_err(|e| {
            metrics::record_auth_rejected(e.reason());
            e
        })?;
        codec.verify(token).map_err(|e| {
            tracing::debug!(reason = e.reason(), "Credential rejected");
            metrics::record_auth_rejected(e.reason());
            AuthError::InvalidToken
        })?
    };

    request.extensions_mut().insert(claims.clone());
    Ok(claims)
}

/// Middleware guarding protected routes.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    verify_and_attach(&mut request, &state.codec)?;
    Ok(next.run(request).await)
}

/// The authenticated caller, as attached by [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Claims);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| ApiError::internal("credential missing from request context"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::codec::DEFAULT_TOKEN_TTL;
    use crate::auth::{Role, SigningSecret};
    use axum::http::HeaderValue;

    fn make_codec(secret: &str) -> TokenCodec {
        TokenCodec::new(&SigningSecret::resolve(Some(secret)), DEFAULT_TOKEN_TTL)
    }

    fn request_with(header: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/api/tasks");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_missing_header() {
        let req = request_with(None);
        assert_eq!(extract_bearer(req.headers()), Err(AuthError::MissingHeader));
    }

    #[test]
    fn test_empty_header() {
        let req = request_with(Some(""));
        assert_eq!(extract_bearer(req.headers()), Err(AuthError::MissingHeader));
    }

    #[test]
    fn test_wrong_scheme() {
        let req = request_with(Some("Token abc"));
        assert_eq!(extract_bearer(req.headers()), Err(AuthError::InvalidFormat));
    }

    #[test]
    fn test_empty_token() {
        let req = request_with(Some("Bearer "));
        assert_eq!(extract_bearer(req.headers()), Err(AuthError::InvalidFormat));

        let bare = request_with(Some("Bearer"));
        assert_eq!(extract_bearer(bare.headers()), Err(AuthError::InvalidFormat));
    }

    #[test]
    fn test_scheme_case_insensitive() {
        let req = request_with(Some("bEaReR abc.def.ghi"));
        assert_eq!(extract_bearer(req.headers()), Ok("abc.def.ghi"));
    }

    #[test]
    fn test_non_ascii_header_is_invalid_format() {
        let mut req = request_with(None);
        req.headers_mut().insert(
            AUTHORIZATION,
            HeaderValue::from_bytes(b"Bearer \xfftoken").unwrap(),
        );
        assert_eq!(extract_bearer(req.headers()), Err(AuthError::InvalidFormat));
    }

    #[test]
    fn test_verify_and_attach_success() {
        let codec = make_codec("gate-secret");
        let token = codec.issue(7, Role::User).unwrap();
        let mut req = request_with(Some(&format!("Bearer {}", token)));

        let claims = verify_and_attach(&mut req, &codec).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.role, Role::User);

        let attached = req.extensions().get::<Claims>().unwrap();
        assert_eq!(attached.user_id, 7);
        assert_eq!(attached.role, Role::User);
    }

    #[test]
    fn test_verification_failures_collapse() {
        let codec = make_codec("gate-secret");
        let foreign = make_codec("other-secret").issue(7, Role::Admin).unwrap();
        let expired = codec.issue_at(7, Role::User, 1_000).unwrap();

        for token in [foreign.as_str(), expired.as_str(), "garbage"] {
            let mut req = request_with(Some(&format!("Bearer {}", token)));
            assert_eq!(verify_and_attach(&mut req, &codec), Err(AuthError::InvalidToken));
            assert!(req.extensions().get::<Claims>().is_none());
        }
    }
}
