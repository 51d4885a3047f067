//! Usage reporting handler

use std::sync::Arc;

use axum::{extract::State, Extension, Json};

use ledgerlens_core::quota::{today_utc, UsageReport};

use crate::{AppError, AppState, AuthenticatedUser};

/// GET /api/usage - Today's (UTC) usage and limits for the caller
pub async fn get_usage(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Result<Json<UsageReport>, AppError> {
    let tier = state.search.db().get_tier(&user)?;
    let report = state.search.quota().report(&user, tier, today_utc())?;
    Ok(Json(report))
}
