//! JSON body extractor that reports malformed bodies in the registry error
//! format instead of axum's plain-text rejections.

use std::{
    error::Error as _,
    ops::{Deref, DerefMut},
};

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use capability_registry::RegistryError;
use serde::de::DeserializeOwned;

use super::ApiError;

/// Field reported when a failure cannot be pinned to a body field.
const BODY_FIELD: &str = "body";

/// Drop-in replacement for [`axum::Json`] in handler arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(rejection_to_error)?;
        Ok(ApiJson(value))
    }
}

impl<T> Deref for ApiJson<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for ApiJson<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

fn rejection_to_error(rejection: JsonRejection) -> ApiError {
    let error = match &rejection {
        JsonRejection::JsonDataError(e) => {
            let detail = e
                .source()
                .map(ToString::to_string)
                .unwrap_or_else(|| e.body_text());
            let (field, message) = split_data_error(&detail);
            RegistryError::validation(field, format!("Invalid JSON data: {message}"))
        }
        JsonRejection::JsonSyntaxError(e) => {
            RegistryError::validation(BODY_FIELD, format!("JSON syntax error: {}", e.body_text()))
        }
        JsonRejection::MissingJsonContentType(_) => RegistryError::validation(
            BODY_FIELD,
            "Missing Content-Type: application/json header",
        ),
        _ => RegistryError::validation(BODY_FIELD, format!("Failed to parse JSON: {rejection}")),
    };
    ApiError(error)
}

/// Split a deserialization failure into the offending field and the reason.
///
/// Nested failures read `path.to.field: reason`; a missing top-level field
/// reads ``missing field `name` at ...``.
fn split_data_error(detail: &str) -> (String, &str) {
    if let Some(rest) = detail.strip_prefix("missing field `") {
        if let Some((field, _)) = rest.split_once('`') {
            return (field.to_string(), detail);
        }
    }
    match detail.split_once(": ") {
        Some((path, reason)) if !path.is_empty() && !path.contains(char::is_whitespace) => {
            (path.to_string(), reason)
        }
        _ => (BODY_FIELD.to_string(), detail),
    }
}
