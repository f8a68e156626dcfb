//! Translation of HTTP-level failures into [`Error`].

use super::types::ApiErrorBody;
use crate::error::ApiErrorKind;
use crate::Error;
use reqwest::StatusCode;
use std::time::Duration;

/// Maps a non-2xx reply to an error.
///
/// A recognized `error.code` in the body wins over the status-code mapping.
pub(crate) fn from_response(context: &str, status: StatusCode, body: &str) -> Error {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = parsed.error.as_ref().and_then(|e| e.code.clone());
    let message = parsed
        .error
        .and_then(|e| e.message)
        .or(parsed.message)
        .filter(|m| !m.trim().is_empty())
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_default();

    if let Some(kind) = code.as_deref().and_then(ApiErrorKind::from_code) {
        return Error::api(kind, status.as_u16(), kind.description());
    }

    let status_code = status.as_u16();
    match status_code {
        401 => Error::api(
            ApiErrorKind::InvalidToken,
            status_code,
            ApiErrorKind::InvalidToken.description(),
        ),
        429 => {
            let detail = if message.is_empty() {
                "retry later or check your daily quota".to_string()
            } else {
                message
            };
            Error::api(
                ApiErrorKind::RateLimitExceeded,
                status_code,
                format!("{}: {}", ApiErrorKind::RateLimitExceeded.description(), detail),
            )
        }
        400 => Error::api(
            ApiErrorKind::InvalidParameter,
            status_code,
            format!("{}: {}", ApiErrorKind::InvalidParameter.description(), message),
        ),
        500 | 502 | 503 => Error::api(
            ApiErrorKind::InternalError,
            status_code,
            format!("{}, please retry later", ApiErrorKind::InternalError.description()),
        ),
        _ => {
            let detail = if message.is_empty() {
                "no error details".to_string()
            } else {
                message
            };
            let suffix = code.map(|c| format!(" [{}]", c)).unwrap_or_default();
            Error::api(
                ApiErrorKind::Other,
                status_code,
                format!("ModelScope {} error ({}): {}{}", context, status_code, detail, suffix),
            )
        }
    }
}

/// Classifies a transport failure raised by reqwest.
pub(crate) fn from_transport(context: &'static str, timeout: Duration, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::RequestTimeout { context, timeout }
    } else if err.is_connect() || err.is_request() {
        Error::Network(err.to_string())
    } else {
        Error::Http(err)
    }
}
