use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use capability_registry::{ErrorKind, RegistryError};
use serde::Serialize;

#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    #[serde(rename = "type")]
    error_type: &'static str,
    code: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    param: Option<&'a str>,
}

pub const HEADER_X_REGISTRY_ERROR_CODE: &str = "X-Registry-Error-Code";

/// Handler error; renders a registry failure as a JSON error body.
#[derive(Debug)]
pub struct ApiError(pub RegistryError);

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let param = match &self.0 {
            RegistryError::Validation { field, .. } => Some(field.as_str()),
            _ => None,
        };
        create_error(status_for(kind), kind.as_str(), &self.0.to_string(), param)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::QuotaExceeded | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
    }
}

pub fn not_found(code: &str, message: &str) -> Response {
    create_error(StatusCode::NOT_FOUND, code, message, None)
}

pub fn create_error(
    status: StatusCode,
    code: &str,
    message: &str,
    param: Option<&str>,
) -> Response {
    let mut headers = HeaderMap::with_capacity(1);
    if let Ok(val) = HeaderValue::from_str(code) {
        headers.insert(HEADER_X_REGISTRY_ERROR_CODE, val);
    }

    (
        status,
        headers,
        Json(ErrorResponse {
            error: ErrorDetail {
                error_type: status_code_to_str(status),
                code,
                message,
                param,
            },
        }),
    )
        .into_response()
}

fn status_code_to_str(status_code: StatusCode) -> &'static str {
    status_code
        .canonical_reason()
        .unwrap_or("Unknown Status Code")
}

pub fn extract_error_code_from_response<B>(response: &Response<B>) -> &str {
    response
        .headers()
        .get(HEADER_X_REGISTRY_ERROR_CODE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use capability_registry::SlotId;

    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::QuotaExceeded), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::Conflict), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(
            status_for(ErrorKind::ValidationError),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_error_code_header() {
        let response = ApiError(RegistryError::QuotaExceeded { limit: 10 }).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(extract_error_code_from_response(&response), "quota_exceeded");

        let response = ApiError(RegistryError::NamespaceNotFound(SlotId::Numbered(2))).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(extract_error_code_from_response(&response), "not_found");
    }
}
