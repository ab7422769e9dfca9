pub mod error;
pub mod messages;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;

use missive_db::{Context, Store};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: Store,
    /// Cancelled at shutdown; every request context derives from it.
    pub root: Context,
    /// Per-request deadline; `None` leaves requests bounded only by shutdown.
    pub request_timeout: Option<Duration>,
}

impl AppStateInner {
    pub fn request_context(&self) -> Context {
        match self.request_timeout {
            Some(timeout) => self.root.with_timeout(timeout),
            None => self.root.child(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/users", post(users::register))
        .route("/users/{username}", get(users::resolve))
        .route("/users/{username}/messages", post(messages::send_message))
        .route("/inbox/{user_id}", get(messages::list_messages))
        .route("/messages", post(messages::send_batch))
        .route("/messages/{id}", get(messages::get_message))
        .layer(RequestDecompressionLayer::new())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
