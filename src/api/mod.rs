//! HTTP API
//!
//! Two endpoints: `POST /crawl` accepts a keyword and starts a crawl,
//! `GET /crawl/:id` reports a search's status and matched URLs.

pub mod routes;
pub mod server;
pub mod types;
pub mod validate;

pub use routes::AppState;
pub use server::serve;
