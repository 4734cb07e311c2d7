use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use crate::utils::code;

pub type Tx = broadcast::Sender<String>;

const BROADCAST_CAPACITY: usize = 100;

/// One frame as room members see it: a chat line or a join/leave notice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFrame {
    pub name: String,
    pub message: String,
}

impl ChatFrame {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::json!({ "name": self.name, "message": self.message }).to_string()
    }
}

struct RoomState {
    tx: Tx,
    members: usize,
    cache: Vec<ChatFrame>,
}

impl RoomState {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            members: 0,
            cache: Vec::new(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Member count dropped but the room stays open.
    Left,
    /// Count reached zero; the room was removed from the table.
    TornDown,
    /// The code was not open. Duplicate leave signals land here.
    NotOpen,
}

#[derive(Debug, Serialize)]
pub struct RoomInfo {
    pub code: String,
    pub members: usize,
}

/// Authoritative table of open rooms. Every mutation runs under the table's
/// write lock, and broadcasts are sent inside that critical section, so for
/// any one room the order members observe equals the order the registry
/// admitted the operations.
#[derive(Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<String, RoomState>>>,
}

impl RoomRegistry {
    /// Samples codes until one is free, then inserts the room with zero
    /// members and an empty cache. Sampling and insertion happen under the
    /// same lock, so two concurrent creators can never be issued the same
    /// code. Collisions are resolved by resampling and never surfaced.
    pub async fn create_room(&self, length: usize) -> String {
        let mut rooms = self.rooms.write().await;
        let mut rng = rand::thread_rng();
        loop {
            let candidate = code::sample_code(&mut rng, length);
            if !rooms.contains_key(&candidate) {
                rooms.insert(candidate.clone(), RoomState::new());
                return candidate;
            }
        }
    }

    pub async fn exists(&self, code: &str) -> bool {
        self.rooms.read().await.contains_key(code)
    }

    /// Admits a connection into an open room: bumps the member count,
    /// subscribes to the room's channel, and snapshots the cache for initial
    /// render. Subscription and snapshot share the critical section, so the
    /// joiner misses nothing and sees nothing twice. Returns `None` if the
    /// room is not open, including when it is mid-teardown.
    pub async fn join(&self, code: &str) -> Option<(broadcast::Receiver<String>, Vec<ChatFrame>)> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(code)?;
        room.members += 1;
        Some((room.tx.subscribe(), room.cache.clone()))
    }

    /// Decrements the member count; at zero the room is removed in the same
    /// critical section. Unknown codes are a no-op, which makes duplicate
    /// disconnect signals harmless.
    pub async fn leave(&self, code: &str) -> LeaveOutcome {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else {
            return LeaveOutcome::NotOpen;
        };
        room.members = room.members.saturating_sub(1);
        if room.members == 0 {
            rooms.remove(code);
            LeaveOutcome::TornDown
        } else {
            LeaveOutcome::Left
        }
    }

    /// Fans a chat frame out to every member and appends it to the room's
    /// cache. Only frames that also go to the durable log belong here, so
    /// the cache stays a receipt-ordered subsequence of persisted messages.
    /// Returns `false` when the room has closed; callers on the real-time
    /// path treat that as a silent drop.
    pub async fn broadcast(&self, code: &str, frame: &ChatFrame) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else {
            return false;
        };
        // send can only fail when there are no receivers, which is fine
        let _ = room.tx.send(frame.to_json());
        room.cache.push(frame.clone());
        true
    }

    /// Delivers a system notice (join/leave) to every member without
    /// touching the cache; notices are never persisted, so caching them
    /// would put frames in a replay that no durable record backs.
    pub async fn notify(&self, code: &str, frame: &ChatFrame) -> bool {
        let rooms = self.rooms.write().await;
        let Some(room) = rooms.get(code) else {
            return false;
        };
        let _ = room.tx.send(frame.to_json());
        true
    }

    pub async fn member_count(&self, code: &str) -> Option<usize> {
        self.rooms.read().await.get(code).map(|r| r.members)
    }

    pub async fn snapshot(&self) -> Vec<RoomInfo> {
        self.rooms
            .read()
            .await
            .iter()
            .map(|(code, room)| RoomInfo {
                code: code.clone(),
                members: room.members,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_room_issues_unique_uppercase_codes() {
        let registry = RoomRegistry::default();
        // length 1 leaves only 26 possible codes, so the retry loop is
        // genuinely exercised here
        for _ in 0..26 {
            let code = registry.create_room(1).await;
            assert!(code.bytes().all(|b| b.is_ascii_uppercase()));
        }
        assert_eq!(registry.snapshot().await.len(), 26);
    }

    #[tokio::test]
    async fn join_and_leave_track_member_count() {
        let registry = RoomRegistry::default();
        let code = registry.create_room(4).await;
        assert_eq!(registry.member_count(&code).await, Some(0));

        let _a = registry.join(&code).await.expect("room open");
        let _b = registry.join(&code).await.expect("room open");
        assert_eq!(registry.member_count(&code).await, Some(2));

        assert_eq!(registry.leave(&code).await, LeaveOutcome::Left);
        assert_eq!(registry.member_count(&code).await, Some(1));
    }

    #[tokio::test]
    async fn last_leave_tears_the_room_down() {
        let registry = RoomRegistry::default();
        let code = registry.create_room(4).await;
        let _rx = registry.join(&code).await.expect("room open");

        assert_eq!(registry.leave(&code).await, LeaveOutcome::TornDown);
        assert!(!registry.exists(&code).await);
        assert!(registry.join(&code).await.is_none());
    }

    #[tokio::test]
    async fn duplicate_leave_is_a_no_op() {
        let registry = RoomRegistry::default();
        let code = registry.create_room(4).await;
        let _rx = registry.join(&code).await.expect("room open");

        assert_eq!(registry.leave(&code).await, LeaveOutcome::TornDown);
        assert_eq!(registry.leave(&code).await, LeaveOutcome::NotOpen);
        assert_eq!(registry.leave("ZZZZ").await, LeaveOutcome::NotOpen);
    }

    #[tokio::test]
    async fn broadcast_to_closed_room_reports_drop() {
        let registry = RoomRegistry::default();
        let frame = ChatFrame::new("Alice", "hi");
        assert!(!registry.broadcast("GONE", &frame).await);
        assert!(!registry.notify("GONE", &frame).await);
    }

    #[tokio::test]
    async fn notices_are_delivered_but_never_cached() {
        let registry = RoomRegistry::default();
        let code = registry.create_room(4).await;
        let (mut rx, _) = registry.join(&code).await.expect("room open");

        let notice = ChatFrame::new("Alice", "joined the room");
        assert!(registry.notify(&code, &notice).await);
        assert_eq!(rx.recv().await.expect("frame"), notice.to_json());

        // a later joiner replays chat frames only; nothing backs a notice
        // in the durable log
        let (_rx2, replay) = registry.join(&code).await.expect("room open");
        assert!(replay.is_empty());

        registry.broadcast(&code, &ChatFrame::new("Alice", "hi")).await;
        let (_rx3, replay) = registry.join(&code).await.expect("room open");
        assert_eq!(replay, vec![ChatFrame::new("Alice", "hi")]);
    }

    #[tokio::test]
    async fn members_see_broadcasts_in_identical_order() {
        let registry = RoomRegistry::default();
        let code = registry.create_room(4).await;
        let (mut rx_a, _) = registry.join(&code).await.expect("room open");
        let (mut rx_b, _) = registry.join(&code).await.expect("room open");

        for i in 0..5 {
            let frame = ChatFrame::new("Alice", format!("msg {i}"));
            assert!(registry.broadcast(&code, &frame).await);
        }

        let mut seen_a = Vec::new();
        let mut seen_b = Vec::new();
        for _ in 0..5 {
            seen_a.push(rx_a.recv().await.expect("frame"));
            seen_b.push(rx_b.recv().await.expect("frame"));
        }
        assert_eq!(seen_a, seen_b);
        assert!(seen_a[0].contains("msg 0") && seen_a[4].contains("msg 4"));
    }

    #[tokio::test]
    async fn join_snapshot_replays_earlier_frames_exactly_once() {
        let registry = RoomRegistry::default();
        let code = registry.create_room(4).await;
        let (_rx, _) = registry.join(&code).await.expect("room open");

        let before = ChatFrame::new("Alice", "early");
        registry.broadcast(&code, &before).await;

        let (mut rx, replay) = registry.join(&code).await.expect("room open");
        assert_eq!(replay, vec![before]);

        let after = ChatFrame::new("Alice", "late");
        registry.broadcast(&code, &after).await;
        let received = rx.recv().await.expect("frame");
        assert_eq!(received, after.to_json());
    }

    #[tokio::test]
    async fn concurrent_joins_and_leaves_keep_the_count_consistent() {
        let registry = RoomRegistry::default();
        let code = registry.create_room(4).await;
        let n = 32;

        let joins: Vec<_> = (0..n)
            .map(|_| {
                let registry = registry.clone();
                let code = code.clone();
                tokio::spawn(async move { registry.join(&code).await.is_some() })
            })
            .collect();
        for handle in joins {
            assert!(handle.await.expect("task"));
        }
        assert_eq!(registry.member_count(&code).await, Some(n));

        let leaves: Vec<_> = (0..n)
            .map(|_| {
                let registry = registry.clone();
                let code = code.clone();
                tokio::spawn(async move { registry.leave(&code).await })
            })
            .collect();
        let mut torn_down = 0;
        for handle in leaves {
            if handle.await.expect("task") == LeaveOutcome::TornDown {
                torn_down += 1;
            }
        }
        assert_eq!(torn_down, 1);
        assert!(!registry.exists(&code).await);
    }

    #[tokio::test]
    async fn code_is_reusable_after_teardown() {
        let registry = RoomRegistry::default();
        let code = registry.create_room(4).await;
        let (_rx, _) = registry.join(&code).await.expect("room open");
        registry.broadcast(&code, &ChatFrame::new("Alice", "hi")).await;
        registry.leave(&code).await;

        // codes are unique only among currently open rooms
        // (length 1 makes resampling the same letter plausible, but any
        // fresh room must start clean)
        let fresh = registry.create_room(4).await;
        let (_rx2, replay) = registry.join(&fresh).await.expect("room open");
        assert!(replay.is_empty());
    }
}
