use axum::{
    extract::{Path, Query, State},
    routing::{delete, get},
    Router,
};
use capability_registry::DataStore;
use serde::Deserialize;

use super::{
    created, ok, parse_slot, required, ApiJson, ApiResult, CreatedResult, LabelExpressionQuery,
    LabelFilter,
};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct RemoveDataStoreQuery {
    pub namespace: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ByNameQuery {
    pub namespace: Option<String>,
    pub name: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_data_stores)
                .post(register_data_store)
                .put(update_data_store)
                .delete(remove_data_store),
        )
        .route(
            "/by-name",
            get(find_data_stores_by_name).delete(remove_data_stores_by_name),
        )
        .route("/by-label", delete(remove_data_stores_by_label))
        .route("/{namespace}/{id}", get(get_data_store))
}

async fn list_data_stores(
    State(state): State<AppState>,
    Query(filter): Query<LabelFilter>,
) -> ApiResult<Vec<DataStore>> {
    let slot = filter.slot()?;
    match filter.selector()? {
        Some(selector) => ok(state.registry.list_data_stores_matching(slot, &selector)),
        None => ok(state.registry.list_data_stores(slot)),
    }
}

async fn register_data_store(
    State(state): State<AppState>,
    ApiJson(data_store): ApiJson<DataStore>,
) -> CreatedResult<DataStore> {
    created(state.registry.register_data_store(data_store)?)
}

async fn update_data_store(
    State(state): State<AppState>,
    ApiJson(data_store): ApiJson<DataStore>,
) -> ApiResult<DataStore> {
    ok(state.registry.update_data_store(data_store)?)
}

async fn get_data_store(
    State(state): State<AppState>,
    Path((namespace, id)): Path<(String, String)>,
) -> ApiResult<DataStore> {
    let slot = parse_slot(&namespace)?;
    ok(state.registry.get_data_store(slot, &id)?)
}

async fn remove_data_store(
    State(state): State<AppState>,
    Query(query): Query<RemoveDataStoreQuery>,
) -> ApiResult<()> {
    let slot = parse_slot(required(&query.namespace, "namespace")?)?;
    let id = required(&query.id, "id")?;
    state.registry.remove_data_store(slot, id)?;
    ok(())
}

async fn find_data_stores_by_name(
    State(state): State<AppState>,
    Query(query): Query<ByNameQuery>,
) -> ApiResult<Vec<DataStore>> {
    let name = required(&query.name, "name")?;
    let slot = query.namespace.as_deref().map(parse_slot).transpose()?;
    ok(state.registry.find_data_stores_by_name(slot, name))
}

async fn remove_data_stores_by_name(
    State(state): State<AppState>,
    Query(query): Query<ByNameQuery>,
) -> ApiResult<usize> {
    let name = required(&query.name, "name")?;
    let slot = query.namespace.as_deref().map(parse_slot).transpose()?;
    ok(state.registry.remove_data_stores_by_name(slot, name))
}

async fn remove_data_stores_by_label(
    State(state): State<AppState>,
    Query(query): Query<LabelExpressionQuery>,
) -> ApiResult<usize> {
    let selector = query.selector()?;
    ok(state
        .registry
        .remove_data_stores_matching(query.slot()?, &selector))
}
