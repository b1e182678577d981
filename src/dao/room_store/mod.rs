/// In-process backend used by the relay server and tests.
pub mod memory;

use std::fmt;

use futures::{future::BoxFuture, stream::BoxStream};
use serde::Serialize;
use serde_json::Value;

use crate::{dao::storage::StorageResult, state::room::RoomCode};

/// Room-scoped key inside the shared store (`rooms/{code}/timer`, `rooms/{code}/alarm`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomPath(String);

impl RoomPath {
    /// Path of the shared countdown record for `room`.
    pub fn timer(room: &RoomCode) -> Self {
        Self(format!("rooms/{room}/timer"))
    }

    /// Path of the shared alarm flag for `room`.
    pub fn alarm(room: &RoomCode) -> Self {
        Self(format!("rooms/{room}/alarm"))
    }

    /// Raw path string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State of a client's link to the shared store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Writes and notifications flow normally.
    Connected,
    /// Writes fail and notifications are withheld.
    Disconnected,
}

/// Item delivered by a store subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// Latest value at the subscribed path; `None` means deleted/absent.
    Value(Option<Value>),
    /// The link to the store changed state.
    Connection(ConnectionStatus),
}

/// Shared key-value store with change notification, keyed by room path.
///
/// Writes fully replace the value at a path (last write wins). A subscription
/// yields the current value immediately and again after every change; dropping
/// the stream unsubscribes.
pub trait RoomStore: Send + Sync {
    /// Replace the value at `path`; `None` deletes it.
    fn write(&self, path: &RoomPath, value: Option<Value>) -> BoxFuture<'static, StorageResult<()>>;
    /// Follow `path`, starting with its current value.
    fn subscribe(&self, path: &RoomPath) -> BoxStream<'static, StoreEvent>;
    /// Check that the store is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
