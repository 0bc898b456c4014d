//! Quote endpoint routes.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use quotesync_engine::{Quote, QuoteId};

use crate::error::Result;
use crate::handlers::{handle_get, handle_list, handle_upsert, ListQuery};
use crate::AppState;

/// Create quote routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/quotes", get(list_handler).post(upsert_handler))
        .route("/quotes/{id}", get(get_handler))
}

/// GET /quotes - List quotes sorted by key.
async fn list_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<Quote>> {
    Json(handle_list(&state.repo, query))
}

/// GET /quotes/{id} - Fetch one quote.
async fn get_handler(
    State(state): State<AppState>,
    Path(id): Path<QuoteId>,
) -> Result<Json<Quote>> {
    Ok(Json(handle_get(&state.repo, id)?))
}

/// POST /quotes - Create or replace a quote.
async fn upsert_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Quote>, JsonRejection>,
) -> Result<(StatusCode, Json<Quote>)> {
    let Json(quote) = payload?;
    let created = handle_upsert(&state.repo, quote.clone())?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(quote)))
}
