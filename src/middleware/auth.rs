use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use axum::response::{IntoResponse, Response};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use subtle::ConstantTimeEq;

use crate::error::ReporterError;
use crate::router::ReporterState;

fn key_matches(candidate: &str, expected: &str) -> bool {
    bool::from(candidate.as_bytes().ct_eq(expected.as_bytes()))
}

/// Ensure the inbound request carries the configured key.
/// Accepts either:
/// - Header: `Authorization: Bearer <key>`
/// - Header: `apikey: <key>`
///
/// With no key configured every request passes.
pub fn ensure_authorized(
    headers: &HeaderMap,
    bearer: Option<&str>,
    expected: Option<&str>,
) -> Result<(), ReporterError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    if let Some(token) = bearer
        && key_matches(token, expected)
    {
        return Ok(());
    }

    if let Some(hv) = headers.get("apikey").and_then(|v| v.to_str().ok())
        && key_matches(hv.trim(), expected)
    {
        return Ok(());
    }

    Err(ReporterError::Unauthorized)
}

#[derive(Debug, Clone, Copy)]
pub struct RequireKeyAuth;

impl FromRequestParts<ReporterState> for RequireKeyAuth {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ReporterState,
    ) -> Result<Self, Self::Rejection> {
        let bearer =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .ok();
        ensure_authorized(
            &parts.headers,
            bearer.as_ref().map(|TypedHeader(auth)| auth.token()),
            state.api_key.as_deref(),
        )
        .map_err(IntoResponse::into_response)?;
        Ok(Self)
    }
}
