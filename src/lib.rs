pub mod error;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils {
    pub mod code;
}

use axum::{Extension, Router};
use sqlx::SqlitePool;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::state::RoomRegistry;

pub fn app(pool: SqlitePool, registry: RoomRegistry) -> Router {
    Router::new()
        .merge(routes::router())
        .fallback_service(ServeDir::new("static"))
        .layer(Extension(pool))
        .layer(Extension(registry))
        .layer(TraceLayer::new_for_http())
}
