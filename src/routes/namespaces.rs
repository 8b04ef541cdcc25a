use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use capability_registry::Namespace;
use serde::Deserialize;
use tracing::debug;

use super::{created, ok, parse_slot, ApiJson, ApiResult, CreatedResult};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNamespaceRequest {
    pub display_name: String,
    #[serde(default)]
    pub description: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_namespaces).post(create_namespace))
        .route("/{slot_id}", get(get_namespace).delete(delete_namespace))
}

async fn list_namespaces(State(state): State<AppState>) -> ApiResult<Vec<Namespace>> {
    let namespaces = state.registry.list_namespaces();
    debug!(count = namespaces.len(), "Listing namespaces");
    ok(namespaces)
}

async fn create_namespace(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateNamespaceRequest>,
) -> CreatedResult<Namespace> {
    let namespace = state
        .registry
        .create_namespace(request.display_name, request.description)?;
    created(namespace)
}

async fn get_namespace(
    State(state): State<AppState>,
    Path(slot_id): Path<String>,
) -> ApiResult<Namespace> {
    let slot = parse_slot(&slot_id)?;
    ok(state.registry.get_namespace(slot)?)
}

async fn delete_namespace(
    State(state): State<AppState>,
    Path(slot_id): Path<String>,
) -> ApiResult<()> {
    let slot = parse_slot(&slot_id)?;
    state.registry.delete_namespace(slot)?;
    ok(())
}
