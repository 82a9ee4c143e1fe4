use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    response::{IntoResponse, Response},
};

use crate::error::ReporterError;
use crate::types::run::RunRequest;

/// Trigger body. Schedulers often post nothing at all, and some send JSON
/// without a content type, so the body is read as bytes: empty means `{}`.
#[derive(Debug, Clone)]
pub struct ReportTrigger(pub RunRequest);

impl<S> FromRequest<S> for ReportTrigger
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        parse_trigger_body(&body)
            .map(ReportTrigger)
            .map_err(IntoResponse::into_response)
    }
}

pub fn parse_trigger_body(body: &[u8]) -> Result<RunRequest, ReporterError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RunRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ReporterError::InvalidRequest(format!("malformed JSON body: {e}")))
}
