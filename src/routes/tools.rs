use axum::{
    extract::{Path, Query, State},
    routing::{delete, get},
    Router,
};
use capability_registry::ToolReference;
use serde::Deserialize;

use super::{
    created, ok, parse_slot, required, ApiJson, ApiResult, CreatedResult, LabelExpressionQuery,
    LabelFilter,
};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct RemoveToolQuery {
    pub namespace: Option<String>,
    pub name: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_tools)
                .post(expose_tool)
                .put(update_tool)
                .delete(remove_tool),
        )
        .route("/by-label", delete(remove_tools_by_label))
        .route("/{namespace}/{name}", get(get_tool))
}

async fn list_tools(
    State(state): State<AppState>,
    Query(filter): Query<LabelFilter>,
) -> ApiResult<Vec<ToolReference>> {
    let slot = filter.slot()?;
    match filter.selector()? {
        Some(selector) => ok(state.registry.list_tools_matching(slot, &selector)),
        None => ok(state.registry.list_tools(slot)),
    }
}

async fn expose_tool(
    State(state): State<AppState>,
    ApiJson(tool): ApiJson<ToolReference>,
) -> CreatedResult<ToolReference> {
    created(state.registry.expose_tool(tool)?)
}

async fn update_tool(
    State(state): State<AppState>,
    ApiJson(tool): ApiJson<ToolReference>,
) -> ApiResult<ToolReference> {
    ok(state.registry.update_tool(tool)?)
}

async fn get_tool(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<ToolReference> {
    let slot = parse_slot(&namespace)?;
    ok(state.registry.get_tool(slot, &name)?)
}

async fn remove_tool(
    State(state): State<AppState>,
    Query(query): Query<RemoveToolQuery>,
) -> ApiResult<()> {
    let slot = parse_slot(required(&query.namespace, "namespace")?)?;
    let name = required(&query.name, "name")?;
    state.registry.remove_tool(slot, name)?;
    ok(())
}

/// Responds with the number of tools removed.
async fn remove_tools_by_label(
    State(state): State<AppState>,
    Query(query): Query<LabelExpressionQuery>,
) -> ApiResult<usize> {
    let selector = query.selector()?;
    ok(state.registry.remove_tools_matching(query.slot()?, &selector))
}
