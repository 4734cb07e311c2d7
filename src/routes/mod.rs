use axum::Router;

pub mod history;
pub mod rooms;
pub mod ws;

pub fn router() -> Router {
    Router::new()
        .nest("/api", rooms::router().merge(history::router()))
        .nest("/ws", ws::router())
}
