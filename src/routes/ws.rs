//! The connection hub. Each socket goes Disconnected -> Joined ->
//! Disconnected; a socket that fails admission is never Joined and changes
//! nothing.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Query,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    error::{AppErr, AppResult},
    state::{ChatFrame, LeaveOutcome, RoomRegistry},
    store,
};

/// What the session layer claims about this connection. Passed in with the
/// request, never read from ambient state.
#[derive(Deserialize)]
struct WsQuery {
    code: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct Incoming {
    data: String,
}

pub fn router() -> Router {
    Router::new().route("/chat", get(ws_handler))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(q): Query<WsQuery>,
    Extension(registry): Extension<RoomRegistry>,
    Extension(pool): Extension<SqlitePool>,
) -> AppResult<impl IntoResponse> {
    let name = q
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| AppErr::Bad("missing name".into()))?;
    let code = q
        .code
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppErr::Bad("missing room code".into()))?
        .trim()
        .to_uppercase();
    if !registry.exists(&code).await {
        return Err(AppErr::NotFound("no such room".into()));
    }
    Ok(ws.on_upgrade(move |socket| participant_ws(socket, name, code, registry, pool)))
}

async fn participant_ws(
    socket: WebSocket,
    name: String,
    code: String,
    registry: RoomRegistry,
    pool: SqlitePool,
) {
    let conn_id = Uuid::new_v4();

    // The room can close between the upgrade check and here; the loser of
    // that race is simply never joined.
    let Some((mut rx, replay)) = registry.join(&code).await else {
        tracing::debug!(%conn_id, room = %code, "room closed before join");
        return;
    };
    tracing::info!(%conn_id, room = %code, name = %name, "joined");

    let (mut sender, mut receiver) = socket.split();

    // initial render: every chat message sent since the room opened
    for frame in replay {
        if sender.send(Message::Text(frame.to_json())).await.is_err() {
            break;
        }
    }

    registry
        .notify(&code, &ChatFrame::new(&name, "joined the room"))
        .await;

    let forward = tokio::spawn(async move {
        while let Ok(frame) = rx.recv().await {
            if sender.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(Message::Text(raw))) = receiver.next().await {
        let Ok(Incoming { data }) = serde_json::from_str::<Incoming>(&raw) else {
            continue;
        };
        // a closed room drops the message silently; the sender is not told
        if !registry
            .broadcast(&code, &ChatFrame::new(&name, &data))
            .await
        {
            continue;
        }
        if let Err(err) = store::append(&pool, &code, &name, &data).await {
            // best-effort persistence: the broadcast already went out
            tracing::error!(%conn_id, room = %code, %err, "failed to persist message");
        }
    }

    forward.abort();
    match registry.leave(&code).await {
        LeaveOutcome::Left => {
            registry
                .notify(&code, &ChatFrame::new(&name, "left the room"))
                .await;
            tracing::info!(%conn_id, room = %code, name = %name, "left");
        }
        LeaveOutcome::TornDown => {
            tracing::info!(%conn_id, room = %code, "last member left, room torn down");
        }
        LeaveOutcome::NotOpen => {}
    }
}
