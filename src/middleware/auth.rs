use crate::{
    auth::{verify_jwt, Session},
    error::AppError,
    state::AppState,
};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, Request},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;

/// Attaches a [`Session`] to the request when it carries a valid bearer token.
///
/// Requests without a usable token pass through unauthenticated; handlers
/// decide whether that is fatal via [`AuthUser`] or tolerable via [`MaybeSession`].
pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    if let Some(token) = token {
        match verify_jwt(token, &state.config.jwt_secret).and_then(|c| Session::from_claims(&c)) {
            Ok(session) => {
                req.extensions_mut().insert(session);
            }
            Err(e) => tracing::debug!("Ignoring bearer token: {}", e),
        }
    }

    next.run(req).await
}

// Extractor for handlers that require an authenticated caller
pub struct AuthUser(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(AppError::no_session)
    }
}

// Extractor for handlers that degrade gracefully without a session
pub struct MaybeSession(pub Option<Session>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeSession(parts.extensions.get::<Session>().cloned()))
    }
}
