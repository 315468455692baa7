//! Collaborator traits: storage, write-ahead log and the remote API

mod atlas;
mod storage;
mod wal;

#[cfg(test)]
pub use atlas::MockAtlasApi;
pub use atlas::{AtlasApi, ClientFactory};
pub use storage::Storage;
pub use wal::{WalEntry, WriteAheadLog};
