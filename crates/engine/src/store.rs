//! Remote store capability consumed by the engine.
//!
//! The engine never talks to a concrete backend. It only needs to subscribe to
//! full snapshots of a collection, create/update/delete documents, and obtain
//! the identity of the signed-in user. [`MemoryStore`] is the in-process
//! implementation used by the binary and the tests.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::StoreError;

pub use memory::{MemoryStore, Seed};

mod memory;

/// Untyped document body: the key/value mapping stored remotely.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Opaque identity of a remote document.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Opaque identity of the signed-in user, stamped as `creatorId`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A remote document as delivered inside a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<DocumentId>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// Complete, authoritative listing of a collection.
pub type Snapshot = Vec<Document>;

/// One delivery on a subscription.
pub type SnapshotResult = Result<Snapshot, StoreError>;

/// Live subscription to a collection.
///
/// The store pushes a full [`Snapshot`] every time the collection changes, or
/// a [`StoreError`] when the listener fails. Dropping the subscription (or
/// calling [`Subscription::cancel`]) detaches it from the store.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::UnboundedReceiver<SnapshotResult>,
}

impl Subscription {
    /// Creates a subscription together with the sender the store feeds.
    pub fn channel() -> (mpsc::UnboundedSender<SnapshotResult>, Self) {
        let (tx, events) = mpsc::unbounded_channel();
        (tx, Self { events })
    }

    /// Waits for the next delivery. `None` once the store closed the stream.
    pub async fn next(&mut self) -> Option<SnapshotResult> {
        self.events.recv().await
    }

    /// Detaches from the store; pending deliveries are discarded.
    pub fn cancel(mut self) {
        self.events.close();
    }
}

/// Subscribe / mutate capability of the remote store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Starts listening to `collection`.
    fn subscribe(&self, collection: &str) -> Subscription;

    /// Adds a document and returns its generated id.
    async fn create(&self, collection: &str, payload: Fields) -> Result<DocumentId, StoreError>;

    /// Merges `payload` into an existing document.
    async fn update(
        &self,
        collection: &str,
        id: &DocumentId,
        payload: Fields,
    ) -> Result<(), StoreError>;

    async fn delete(&self, collection: &str, id: &DocumentId) -> Result<(), StoreError>;
}

/// Supplies the identity of the current user.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn sign_in(&self) -> Result<UserId, StoreError>;
}
