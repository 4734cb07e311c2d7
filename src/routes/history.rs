use axum::{
    extract::{Extension, Path},
    routing::get,
    Json, Router,
};
use sqlx::SqlitePool;

use crate::{error::AppResult, store};

pub fn router() -> Router {
    Router::new().route("/messages/:code", get(messages_by_room))
}

/// History survives the room: this answers for closed codes too, and the
/// code match is case-insensitive.
async fn messages_by_room(
    Extension(pool): Extension<SqlitePool>,
    Path(code): Path<String>,
) -> AppResult<Json<Vec<store::StoredMessage>>> {
    Ok(Json(store::list_by_room(&pool, &code).await?))
}
