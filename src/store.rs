use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::AppResult;

/// Durable copy of one chat message. Room codes are stored uppercase; the
/// referenced room may no longer be open.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoredMessage {
    pub id: i64,
    pub content: String,
    pub room_code: String,
    pub sender_name: String,
    pub created_at: DateTime<Utc>,
}

pub async fn init(pool: &SqlitePool) -> AppResult<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            content     TEXT NOT NULL,
            room_code   TEXT NOT NULL,
            sender_name TEXT NOT NULL,
            created_at  TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_room ON messages (room_code)")
        .execute(pool)
        .await?;
    Ok(())
}

/// Appends one message, assigning its id and timestamp. Failure here never
/// rolls back a broadcast; callers log and move on.
pub async fn append(
    pool: &SqlitePool,
    room_code: &str,
    sender_name: &str,
    content: &str,
) -> AppResult<StoredMessage> {
    let room_code = room_code.to_uppercase();
    let created_at = Utc::now();
    let result = sqlx::query(
        "INSERT INTO messages (content, room_code, sender_name, created_at) VALUES (?,?,?,?)",
    )
    .bind(content)
    .bind(&room_code)
    .bind(sender_name)
    .bind(created_at)
    .execute(pool)
    .await?;

    Ok(StoredMessage {
        id: result.last_insert_rowid(),
        content: content.to_owned(),
        room_code,
        sender_name: sender_name.to_owned(),
        created_at,
    })
}

/// All persisted messages for a code, oldest first. The code match is
/// case-insensitive; no rows is an empty vec, not an error.
pub async fn list_by_room(pool: &SqlitePool, room_code: &str) -> AppResult<Vec<StoredMessage>> {
    let messages = sqlx::query_as::<_, StoredMessage>(
        "SELECT id, content, room_code, sender_name, created_at
         FROM messages WHERE room_code = ? ORDER BY id",
    )
    .bind(room_code.to_uppercase())
    .fetch_all(pool)
    .await?;
    Ok(messages)
}
