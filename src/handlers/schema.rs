//! Schema administration: catalog stats and the admin-initiated rebuild.
//!
//! Reload swaps the published catalog reference atomically; in-flight
//! requests keep the snapshot they started with.

use std::sync::Arc;

use axum::{extract::State, Extension, Json};

use crate::middleware::AuthUser;
use crate::services::catalog::CatalogStats;
use crate::utils::{ApiError, ApiResult};
use crate::AppState;

fn require_super(user: &AuthUser) -> ApiResult<()> {
    if !user.role.is_super() {
        return Err(ApiError::forbidden("Schema administration requires the super_user role"));
    }
    Ok(())
}

pub async fn schema_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<CatalogStats>> {
    require_super(&user)?;
    Ok(Json(state.catalog.get().stats()))
}

pub async fn reload_schema(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<CatalogStats>> {
    require_super(&user)?;

    let stats = state.catalog.reload().map_err(|e| {
        tracing::error!("Schema reload failed: {}", e);
        ApiError::internal_error(format!("Schema reload failed: {}", e))
    })?;

    tracing::info!("Schema reloaded by {}", user.email);
    Ok(Json(stats))
}
