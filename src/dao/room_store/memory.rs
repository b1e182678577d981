//! In-process room store shared by every connection created from it.

use std::sync::Arc;

use async_stream::stream;
use dashmap::DashMap;
use futures::{future::BoxFuture, stream::BoxStream};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::dao::{
    room_store::{ConnectionStatus, RoomPath, RoomStore, StoreEvent},
    storage::{StorageError, StorageResult},
};

/// Backend holding the latest value of every room path.
///
/// Each path owns a `watch` channel, so subscribers always observe the most
/// recent write and intermediate values may be coalesced.
#[derive(Clone, Default)]
pub struct InMemoryRoomStore {
    entries: Arc<DashMap<String, watch::Sender<Option<Value>>>>,
}

impl InMemoryRoomStore {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a client connection to this backend. Connections start online.
    pub fn connect(&self) -> MemoryConnection {
        let (online, _rx) = watch::channel(true);
        MemoryConnection {
            backend: self.clone(),
            online: Arc::new(online),
        }
    }

    /// Current value stored at `path`.
    pub fn get(&self, path: &RoomPath) -> Option<Value> {
        self.entries
            .get(path.as_str())
            .and_then(|entry| entry.borrow().clone())
    }

    /// Number of paths currently holding a value or a subscriber.
    pub fn tracked_paths(&self) -> usize {
        self.entries.len()
    }

    fn put(&self, path: &RoomPath, value: Option<Value>) {
        match value {
            Some(value) => {
                self.entries
                    .entry(path.as_str().to_string())
                    .or_insert_with(|| watch::channel(None).0)
                    .send_replace(Some(value));
            }
            None => {
                if let Some(entry) = self.entries.get(path.as_str()) {
                    entry.send_replace(None);
                }
                self.release(path.as_str());
            }
        }
    }

    fn watch(&self, path: &RoomPath) -> PathWatch {
        let values = self
            .entries
            .entry(path.as_str().to_string())
            .or_insert_with(|| watch::channel(None).0)
            .subscribe();
        PathWatch {
            backend: self.clone(),
            key: path.as_str().to_string(),
            values: Some(values),
        }
    }

    /// Forget `key` once it holds no value and nobody watches it.
    fn release(&self, key: &str) {
        let removed = self
            .entries
            .remove_if(key, |_, entry| {
                entry.borrow().is_none() && entry.receiver_count() == 0
            })
            .is_some();
        if removed {
            debug!(path = key, "memory store path released");
        }
    }
}

/// Subscriber side of one path; releases the path when dropped.
struct PathWatch {
    backend: InMemoryRoomStore,
    key: String,
    values: Option<watch::Receiver<Option<Value>>>,
}

impl PathWatch {
    fn current(&mut self) -> Option<Value> {
        self.values
            .as_mut()
            .and_then(|values| values.borrow_and_update().clone())
    }

    async fn changed(&mut self) -> bool {
        match self.values.as_mut() {
            Some(values) => values.changed().await.is_ok(),
            None => false,
        }
    }
}

impl Drop for PathWatch {
    fn drop(&mut self) {
        // The receiver must be gone before the subscriber count is checked.
        self.values.take();
        self.backend.release(&self.key);
    }
}

/// One client's link to an [`InMemoryRoomStore`].
///
/// The link can be taken offline to exercise disconnection: writes then fail
/// with [`StorageError::Disconnected`] and subscriptions withhold values until
/// the link comes back, at which point the freshest value is delivered.
#[derive(Clone)]
pub struct MemoryConnection {
    backend: InMemoryRoomStore,
    online: Arc<watch::Sender<bool>>,
}

impl MemoryConnection {
    /// Drop the link to the store.
    pub fn disconnect(&self) {
        if self.online.send_replace(false) {
            info!("memory store connection lost");
        }
    }

    /// Restore the link to the store.
    pub fn reconnect(&self) {
        if !self.online.send_replace(true) {
            info!("memory store connection restored");
        }
    }

    /// Whether the link is currently up.
    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }
}

impl RoomStore for MemoryConnection {
    fn write(&self, path: &RoomPath, value: Option<Value>) -> BoxFuture<'static, StorageResult<()>> {
        let online = self.is_online();
        let backend = self.backend.clone();
        let path = path.clone();
        Box::pin(async move {
            if !online {
                return Err(StorageError::disconnected(path.as_str()));
            }
            debug!(%path, deleted = value.is_none(), "memory store write");
            backend.put(&path, value);
            Ok(())
        })
    }

    fn subscribe(&self, path: &RoomPath) -> BoxStream<'static, StoreEvent> {
        let mut values = self.backend.watch(path);
        let mut link = self.online.subscribe();

        Box::pin(stream! {
            let mut online = *link.borrow_and_update();
            if online {
                let current = values.current();
                yield StoreEvent::Value(current);
            } else {
                yield StoreEvent::Connection(ConnectionStatus::Disconnected);
            }

            loop {
                let next = tokio::select! {
                    changed = values.changed(), if online => {
                        if changed {
                            Some(StoreEvent::Value(values.current()))
                        } else {
                            None
                        }
                    },
                    changed = link.changed() => match changed {
                        Ok(()) => {
                            online = *link.borrow_and_update();
                            Some(StoreEvent::Connection(if online {
                                ConnectionStatus::Connected
                            } else {
                                ConnectionStatus::Disconnected
                            }))
                        }
                        Err(_) => None,
                    },
                };

                let Some(event) = next else { break };
                let reconnected = event == StoreEvent::Connection(ConnectionStatus::Connected);
                yield event;
                if reconnected {
                    let current = values.current();
                    yield StoreEvent::Value(current);
                }
            }
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let online = self.is_online();
        Box::pin(async move {
            if online {
                Ok(())
            } else {
                Err(StorageError::disconnected("health"))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use serde_json::json;

    use super::*;
    use crate::state::room::RoomCode;

    fn timer_path() -> RoomPath {
        RoomPath::timer(&RoomCode::parse("abc").unwrap())
    }

    #[tokio::test]
    async fn subscription_yields_current_value_first() {
        let store = InMemoryRoomStore::new();
        let conn = store.connect();
        conn.write(&timer_path(), Some(json!(1))).await.unwrap();

        let mut feed = conn.subscribe(&timer_path());
        assert_eq!(feed.next().await, Some(StoreEvent::Value(Some(json!(1)))));
    }

    #[tokio::test]
    async fn empty_path_yields_null_first() {
        let conn = InMemoryRoomStore::new().connect();
        let mut feed = conn.subscribe(&timer_path());
        assert_eq!(feed.next().await, Some(StoreEvent::Value(None)));
    }

    #[tokio::test]
    async fn writes_from_one_connection_reach_another() {
        let store = InMemoryRoomStore::new();
        let writer = store.connect();
        let reader = store.connect();

        let mut feed = reader.subscribe(&timer_path());
        assert_eq!(feed.next().await, Some(StoreEvent::Value(None)));

        writer.write(&timer_path(), Some(json!({"a": 1}))).await.unwrap();
        assert_eq!(
            feed.next().await,
            Some(StoreEvent::Value(Some(json!({"a": 1}))))
        );

        writer.write(&timer_path(), None).await.unwrap();
        assert_eq!(feed.next().await, Some(StoreEvent::Value(None)));
        assert_eq!(store.get(&timer_path()), None);
    }

    #[tokio::test]
    async fn offline_connection_rejects_writes() {
        let store = InMemoryRoomStore::new();
        let conn = store.connect();
        conn.disconnect();

        let err = conn.write(&timer_path(), Some(json!(true))).await.unwrap_err();
        assert_eq!(err, StorageError::disconnected("rooms/abc/timer"));
        assert!(conn.health_check().await.is_err());
        assert_eq!(store.get(&timer_path()), None);
    }

    #[tokio::test]
    async fn reconnect_delivers_freshest_value() {
        let store = InMemoryRoomStore::new();
        let writer = store.connect();
        let reader = store.connect();

        let mut feed = reader.subscribe(&timer_path());
        assert_eq!(feed.next().await, Some(StoreEvent::Value(None)));

        reader.disconnect();
        assert_eq!(
            feed.next().await,
            Some(StoreEvent::Connection(ConnectionStatus::Disconnected))
        );

        writer.write(&timer_path(), Some(json!(1))).await.unwrap();
        writer.write(&timer_path(), Some(json!(2))).await.unwrap();

        reader.reconnect();
        assert_eq!(
            feed.next().await,
            Some(StoreEvent::Connection(ConnectionStatus::Connected))
        );
        assert_eq!(feed.next().await, Some(StoreEvent::Value(Some(json!(2)))));
        assert!(reader.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn idle_paths_are_released() {
        let store = InMemoryRoomStore::new();
        let conn = store.connect();

        for n in 0..1_000 {
            let room = RoomCode::parse(&format!("room-{n}")).unwrap();
            let mut feed = conn.subscribe(&RoomPath::timer(&room));
            assert_eq!(feed.next().await, Some(StoreEvent::Value(None)));
            drop(feed);
            conn.write(&RoomPath::alarm(&room), None).await.unwrap();
        }

        assert_eq!(store.tracked_paths(), 0);
    }

    #[tokio::test]
    async fn paths_with_a_value_or_a_watcher_are_kept() {
        let store = InMemoryRoomStore::new();
        let conn = store.connect();

        conn.write(&timer_path(), Some(json!(1))).await.unwrap();
        let feed = conn.subscribe(&RoomPath::alarm(&RoomCode::parse("abc").unwrap()));
        assert_eq!(store.tracked_paths(), 2);

        conn.write(&timer_path(), None).await.unwrap();
        assert_eq!(store.tracked_paths(), 1);
        drop(feed);
        assert_eq!(store.tracked_paths(), 0);
    }

    #[tokio::test]
    async fn clearing_a_watched_path_keeps_notifying() {
        let store = InMemoryRoomStore::new();
        let conn = store.connect();
        let mut feed = conn.subscribe(&timer_path());
        assert_eq!(feed.next().await, Some(StoreEvent::Value(None)));

        conn.write(&timer_path(), Some(json!(3))).await.unwrap();
        assert_eq!(feed.next().await, Some(StoreEvent::Value(Some(json!(3)))));
        conn.write(&timer_path(), None).await.unwrap();
        assert_eq!(feed.next().await, Some(StoreEvent::Value(None)));
        conn.write(&timer_path(), Some(json!(4))).await.unwrap();
        assert_eq!(feed.next().await, Some(StoreEvent::Value(Some(json!(4)))));
    }
}
