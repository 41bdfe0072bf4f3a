//! Trusted-header identity.
//!
//! An upstream proxy authenticates the caller and forwards their id in
//! `X-MS-CLIENT-PRINCIPAL-ID`. The middleware here only lifts that header
//! into request extensions; handlers ask for an [`AuthenticatedUser`] and
//! never look at headers themselves.

use axum::{
    extract::{FromRequestParts, Request},
    http::{HeaderName, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::{errors::AppError, services::diary_service::DiaryError};

/// Header carrying the caller id injected by the identity proxy.
pub const PRINCIPAL_ID_HEADER: HeaderName = HeaderName::from_static("x-ms-client-principal-id");

/// Identity of the caller, as vouched for by the upstream proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

/// Rejects with 401 when the middleware found no identity. Handlers should
/// list this extractor first so nothing else runs for anonymous callers.
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or_else(|| {
            tracing::warn!("{} {} without auth headers", parts.method, parts.uri.path());
            DiaryError::Unauthenticated.into()
        })
    }
}

/// Copies a non-empty principal id header, verbatim, into request
/// extensions. Requests without one pass through untouched.
pub async fn identity_middleware(mut request: Request, next: Next) -> Response {
    let user_id = request
        .headers()
        .get(&PRINCIPAL_ID_HEADER)
        .filter(|value| !value.is_empty())
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());

    if let Some(user_id) = user_id {
        request
            .extensions_mut()
            .insert(AuthenticatedUser { user_id });
    }

    next.run(request).await
}
