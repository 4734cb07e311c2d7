//! Room creation/join entry points for the request layer. Validation happens
//! here, before any socket is opened; the membership change itself only
//! happens once the WebSocket connects.

use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppErr, AppResult},
    state::{RoomInfo, RoomRegistry},
    utils::code::CODE_LEN,
};

#[derive(Deserialize)]
struct CreateInput {
    name: String,
}

#[derive(Deserialize)]
struct JoinInput {
    name: String,
    code: String,
}

#[derive(Serialize)]
struct RoomCode {
    code: String,
}

pub fn router() -> Router {
    Router::new()
        .route("/rooms", post(create_room).get(list_rooms))
        .route("/rooms/join", post(join_room))
        .route("/rooms/:code", get(room_info))
}

async fn create_room(
    Extension(registry): Extension<RoomRegistry>,
    Json(input): Json<CreateInput>,
) -> AppResult<impl IntoResponse> {
    if input.name.trim().is_empty() {
        return Err(AppErr::Bad("please enter your name".into()));
    }
    let code = registry.create_room(CODE_LEN).await;
    tracing::info!(%code, name = %input.name, "room created");
    Ok((StatusCode::CREATED, Json(RoomCode { code })))
}

async fn join_room(
    Extension(registry): Extension<RoomRegistry>,
    Json(input): Json<JoinInput>,
) -> AppResult<Json<RoomCode>> {
    if input.name.trim().is_empty() {
        return Err(AppErr::Bad("please enter your name".into()));
    }
    if input.code.trim().is_empty() {
        return Err(AppErr::Bad("please enter a room code".into()));
    }
    let code = input.code.trim().to_uppercase();
    if !registry.exists(&code).await {
        return Err(AppErr::NotFound("no such room".into()));
    }
    Ok(Json(RoomCode { code }))
}

async fn list_rooms(
    Extension(registry): Extension<RoomRegistry>,
) -> Json<Vec<RoomInfo>> {
    Json(registry.snapshot().await)
}

async fn room_info(
    Extension(registry): Extension<RoomRegistry>,
    Path(code): Path<String>,
) -> AppResult<Json<RoomInfo>> {
    let code = code.to_uppercase();
    let members = registry
        .member_count(&code)
        .await
        .ok_or_else(|| AppErr::NotFound("no such room".into()))?;
    Ok(Json(RoomInfo { code, members }))
}
