//! JSON response helpers
//!
//! Every JSON response carries `Cache-Control: no-store`. Request bodies are
//! decoded by hand so that malformed JSON maps to a plain 400.

use axum::{
    body::Bytes,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::api::error::{ApiError, ApiResult};

/// Writes `value` as JSON with the given status
pub fn json<T: Serialize>(status: StatusCode, value: &T) -> ApiResult<Response> {
    let body = serde_json::to_vec(value)
        .map_err(|err| ApiError::Internal(format!("failed to encode response: {}", err)))?;

    Ok((
        status,
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
        .into_response())
}

/// Writes `value` as JSON with `200 OK`
pub fn ok<T: Serialize>(value: &T) -> ApiResult<Response> {
    json(StatusCode::OK, value)
}

/// Decodes a JSON request body
pub fn decode_json<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(body)
        .map_err(|err| ApiError::BadRequest(format!("invalid JSON body: {}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ciwi_core::dto::view::ClearQueueView;

    #[test]
    fn test_json_sets_headers() {
        let response = ok(&ClearQueueView { cleared: 2 }).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    }

    #[test]
    fn test_decode_json_rejects_garbage() {
        let result: ApiResult<ClearQueueView> = decode_json(&Bytes::from_static(b"{nope"));
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }
}
