/// Stored record definitions.
pub mod models;
/// Shared room store abstraction and its in-memory backend.
pub mod room_store;
/// Storage error types.
pub mod storage;
