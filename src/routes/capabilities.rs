use axum::extract::{Query, State};
use capability_registry::{Capability, RegistryStats};
use tracing::debug;

use super::{ok, ApiResult, NamespaceFilter};
use crate::server::AppState;

pub async fn list_capabilities(
    State(state): State<AppState>,
    Query(filter): Query<NamespaceFilter>,
) -> ApiResult<Vec<Capability>> {
    let capabilities = state.registry.list_capabilities(filter.slot()?);
    debug!(count = capabilities.len(), "Listing capabilities");
    ok(capabilities)
}

pub async fn stats(State(state): State<AppState>) -> ApiResult<RegistryStats> {
    ok(state.registry.stats())
}
