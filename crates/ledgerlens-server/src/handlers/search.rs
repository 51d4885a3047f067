//! Natural-language search handler

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Response,
    Extension, Json,
};
use serde::Deserialize;
use tracing::debug;

use ledgerlens_core::response::Reply;
use ledgerlens_core::search::SearchError;

use crate::{search_reply, AppState, AuthenticatedUser};

/// Request body for POST /api/search
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
}

/// POST /api/search - Answer a question about the caller's ledger
pub async fn search(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Response {
    let query = match body {
        Ok(Json(request)) => request.query,
        Err(rejection) => {
            debug!(error = %rejection, "Rejected search body");
            return search_reply(Reply::from_error(&SearchError::InvalidInput(
                "Query is required".into(),
            )));
        }
    };

    search_reply(state.search.handle(Some(&user), &query).await)
}
