//! HTTP routes for the registry API.
//!
//! Successful responses wrap their payload as `{"data": ...}`; failures use
//! the error body from [`error`].

pub mod capabilities;
pub mod data_stores;
pub mod error;
pub mod extract;
pub mod namespaces;
pub mod resources;
pub mod tools;

use axum::{http::StatusCode, routing::get, Json, Router};
use capability_registry::{LabelSelector, RegistryError, SlotId};
use serde::{Deserialize, Serialize};

pub use self::{error::ApiError, extract::ApiJson};
use crate::server::AppState;

/// Response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct Data<T> {
    pub data: T,
}

pub type ApiResult<T> = Result<Json<Data<T>>, ApiError>;

pub type CreatedResult<T> = Result<(StatusCode, Json<Data<T>>), ApiError>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(Data { data }))
}

pub fn created<T>(data: T) -> CreatedResult<T> {
    Ok((StatusCode::CREATED, Json(Data { data })))
}

/// `?namespace=` filter shared by the list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct NamespaceFilter {
    pub namespace: Option<String>,
}

impl NamespaceFilter {
    pub fn slot(&self) -> Result<Option<SlotId>, ApiError> {
        self.namespace.as_deref().map(parse_slot).transpose()
    }
}

/// `?namespace=&labelFilter=` filter for the labelled kinds.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelFilter {
    pub namespace: Option<String>,
    pub label_filter: Option<String>,
}

impl LabelFilter {
    pub fn slot(&self) -> Result<Option<SlotId>, ApiError> {
        self.namespace.as_deref().map(parse_slot).transpose()
    }

    pub fn selector(&self) -> Result<Option<LabelSelector>, ApiError> {
        self.label_filter
            .as_deref()
            .map(|expr| parse_selector("labelFilter", expr))
            .transpose()
    }
}

/// `?namespace=&labelExpression=` for bulk removal by label.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelExpressionQuery {
    pub namespace: Option<String>,
    pub label_expression: Option<String>,
}

impl LabelExpressionQuery {
    pub fn slot(&self) -> Result<Option<SlotId>, ApiError> {
        self.namespace.as_deref().map(parse_slot).transpose()
    }

    pub fn selector(&self) -> Result<LabelSelector, ApiError> {
        parse_selector(
            "labelExpression",
            required(&self.label_expression, "labelExpression")?,
        )
    }
}

pub fn parse_selector(field: &str, expression: &str) -> Result<LabelSelector, ApiError> {
    LabelSelector::parse(field, expression).map_err(ApiError::from)
}

pub fn parse_slot(raw: &str) -> Result<SlotId, ApiError> {
    raw.parse::<SlotId>().map_err(ApiError::from)
}

/// Unwrap a query parameter the route cannot do without.
pub fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, ApiError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| RegistryError::validation(field, "query parameter is required").into())
}

pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/namespaces", namespaces::router())
        .nest("/tools", tools::router())
        .nest("/resources", resources::router())
        .nest("/data-store", data_stores::router())
        .route("/capabilities", get(capabilities::list_capabilities))
        .route("/stats", get(capabilities::stats))
}
