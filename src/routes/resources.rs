use axum::{
    extract::{Query, State},
    routing::get,
    Router,
};
use capability_registry::ResourceReference;
use serde::Deserialize;

use super::{
    created, ok, parse_slot, required, ApiJson, ApiResult, CreatedResult, NamespaceFilter,
};
use crate::server::AppState;

/// Resources are keyed by URI, which does not fit in a path segment, so
/// lookups and removals take it as a query parameter.
#[derive(Debug, Deserialize)]
pub struct ResourceKeyQuery {
    pub namespace: Option<String>,
    pub uri: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_resources)
                .post(expose_resource)
                .delete(remove_resource),
        )
        .route("/lookup", get(get_resource))
}

async fn list_resources(
    State(state): State<AppState>,
    Query(filter): Query<NamespaceFilter>,
) -> ApiResult<Vec<ResourceReference>> {
    ok(state.registry.list_resources(filter.slot()?))
}

async fn expose_resource(
    State(state): State<AppState>,
    ApiJson(resource): ApiJson<ResourceReference>,
) -> CreatedResult<ResourceReference> {
    created(state.registry.expose_resource(resource)?)
}

async fn get_resource(
    State(state): State<AppState>,
    Query(query): Query<ResourceKeyQuery>,
) -> ApiResult<ResourceReference> {
    let slot = parse_slot(required(&query.namespace, "namespace")?)?;
    let uri = required(&query.uri, "uri")?;
    ok(state.registry.get_resource(slot, uri)?)
}

async fn remove_resource(
    State(state): State<AppState>,
    Query(query): Query<ResourceKeyQuery>,
) -> ApiResult<()> {
    let slot = parse_slot(required(&query.namespace, "namespace")?)?;
    let uri = required(&query.uri, "uri")?;
    state.registry.remove_resource(slot, uri)?;
    ok(())
}
