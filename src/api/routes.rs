//! HTTP route handlers

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{info, warn};

use crate::crawler::{CrawlScheduler, SchedulerError};
use crate::store::{SearchStore, StoreError};

use super::types::{CrawlRequest, CrawlResponse, ErrorResponse, StatusResponse};
use super::validate::{validate_keyword, validate_search_id};

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<CrawlScheduler>,
    pub store: Arc<dyn SearchStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/crawl", post(start_crawl))
        .route("/crawl/:id", get(crawl_status))
        .with_state(state)
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(message))).into_response()
}

/// POST /crawl — create a search for a keyword and start crawling it.
async fn start_crawl(
    State(state): State<AppState>,
    Json(request): Json<CrawlRequest>,
) -> Response {
    if let Err(message) = validate_keyword(&request.keyword) {
        return error(StatusCode::BAD_REQUEST, message);
    }
    let keyword = request.keyword.trim();

    let id = match state.store.create(keyword) {
        Ok(id) => id,
        Err(StoreError::DuplicateKeyword(_)) => {
            return error(
                StatusCode::CONFLICT,
                format!("a search for '{keyword}' already exists"),
            );
        }
        Err(e) => {
            warn!("failed to create search: {e}");
            return error(StatusCode::INTERNAL_SERVER_ERROR, "failed to create search");
        }
    };

    match state.scheduler.start_crawl(&id) {
        Ok(_) => {
            info!(search_id = %id, keyword, "crawl accepted");
            (StatusCode::OK, Json(CrawlResponse { id })).into_response()
        }
        Err(SchedulerError::ShuttingDown) => {
            error(StatusCode::SERVICE_UNAVAILABLE, "shutting down")
        }
        Err(e) => {
            warn!(search_id = %id, "failed to start crawl: {e}");
            error(StatusCode::INTERNAL_SERVER_ERROR, "failed to start crawl")
        }
    }
}

/// GET /crawl/:id — current status and matched URLs for a search.
async fn crawl_status(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    if let Err(message) = validate_search_id(&id) {
        return error(StatusCode::BAD_REQUEST, message);
    }

    match state.store.find_by_id(&id) {
        Ok(search) => (StatusCode::OK, Json(StatusResponse::from(search))).into_response(),
        Err(StoreError::NotFound(_)) => {
            error(StatusCode::NOT_FOUND, format!("search {id} not found"))
        }
        Err(e) => {
            warn!(search_id = %id, "status lookup failed: {e}");
            error(StatusCode::INTERNAL_SERVER_ERROR, "status lookup failed")
        }
    }
}
