//! Request and response bodies for the HTTP API

use serde::{Deserialize, Serialize};

use crate::store::{Search, SearchStatus};

#[derive(Debug, Deserialize)]
pub struct CrawlRequest {
    pub keyword: String,
}

#[derive(Debug, Serialize)]
pub struct CrawlResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub id: String,
    pub status: SearchStatus,
    pub urls: Vec<String>,
}

impl From<Search> for StatusResponse {
    fn from(search: Search) -> Self {
        Self {
            id: search.id,
            status: search.status,
            urls: search.urls.into_iter().collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { error: message.into() }
    }
}
