//! In-process remote store.
//!
//! Behaves like a document database listener: every subscriber receives the
//! current snapshot right away and a fresh one after each change. Faults can
//! be injected to exercise the error paths of mirrors and gateway.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{
    Authenticator, Document, DocumentId, Fields, RemoteStore, Snapshot, SnapshotResult,
    Subscription, UserId,
};
use crate::StoreError;

/// Seed layout: collection name → document id → fields.
pub type Seed = HashMap<String, BTreeMap<String, Fields>>;

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    collections: HashMap<String, BTreeMap<DocumentId, Fields>>,
    listeners: HashMap<String, Vec<mpsc::UnboundedSender<SnapshotResult>>>,
    write_faults: VecDeque<StoreError>,
    subscribe_faults: HashMap<String, StoreError>,
    auth_fault: Option<StoreError>,
    user: Option<UserId>,
}

impl Inner {
    fn snapshot(&self, collection: &str) -> Snapshot {
        self.collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn broadcast(&mut self, collection: &str) {
        let snapshot = self.snapshot(collection);
        if let Some(listeners) = self.listeners.get_mut(collection) {
            listeners.retain(|tx| tx.send(Ok(snapshot.clone())).is_ok());
            tracing::debug!(
                "collection {collection}: snapshot of {} documents to {} listeners",
                snapshot.len(),
                listeners.len()
            );
        }
    }

    fn take_write_fault(&mut self) -> Result<(), StoreError> {
        match self.write_faults.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store pre-populated with `seed`.
    pub fn from_seed(seed: Seed) -> Self {
        let store = Self::default();
        {
            let mut inner = store.lock();
            for (collection, docs) in seed {
                let docs = docs
                    .into_iter()
                    .map(|(id, fields)| (DocumentId::new(id), fields))
                    .collect();
                inner.collections.insert(collection, docs);
            }
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes a document as another client would, notifying listeners.
    pub fn put(&self, collection: &str, id: impl Into<DocumentId>, fields: Fields) {
        let mut inner = self.lock();
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.into(), fields);
        inner.broadcast(collection);
    }

    /// Deletes a document as another client would, notifying listeners.
    pub fn evict(&self, collection: &str, id: &DocumentId) {
        let mut inner = self.lock();
        if let Some(docs) = inner.collections.get_mut(collection) {
            docs.remove(id);
        }
        inner.broadcast(collection);
    }

    /// Current fields of a document.
    pub fn get(&self, collection: &str, id: &DocumentId) -> Option<Fields> {
        self.lock()
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    /// Current content of a collection, ordered by id.
    pub fn documents(&self, collection: &str) -> Snapshot {
        self.lock().snapshot(collection)
    }

    /// Makes the next mutation (create, update or delete) fail with `err`.
    pub fn fail_next_write(&self, err: StoreError) {
        self.lock().write_faults.push_back(err);
    }

    /// Delivers `err` to every listener of `collection`.
    pub fn fail_listeners(&self, collection: &str, err: StoreError) {
        let mut inner = self.lock();
        if let Some(listeners) = inner.listeners.get_mut(collection) {
            listeners.retain(|tx| tx.send(Err(err.clone())).is_ok());
        }
    }

    /// Makes the next subscription to `collection` start with `err` instead
    /// of the current snapshot. Later changes are delivered as usual.
    pub fn fail_next_subscribe(&self, collection: &str, err: StoreError) {
        self.lock()
            .subscribe_faults
            .insert(collection.to_string(), err);
    }

    /// Makes every subsequent sign-in fail with `err`.
    pub fn refuse_sign_in(&self, err: StoreError) {
        self.lock().auth_fault = Some(err);
    }

    /// Number of subscriptions still attached to `collection`.
    pub fn listener_count(&self, collection: &str) -> usize {
        let mut inner = self.lock();
        match inner.listeners.get_mut(collection) {
            Some(listeners) => {
                listeners.retain(|tx| !tx.is_closed());
                listeners.len()
            }
            None => 0,
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn subscribe(&self, collection: &str) -> Subscription {
        let (tx, subscription) = Subscription::channel();
        let mut inner = self.lock();
        let first = match inner.subscribe_faults.remove(collection) {
            Some(err) => Err(err),
            None => Ok(inner.snapshot(collection)),
        };
        if tx.send(first).is_ok() {
            inner
                .listeners
                .entry(collection.to_string())
                .or_default()
                .push(tx);
        }
        subscription
    }

    async fn create(&self, collection: &str, payload: Fields) -> Result<DocumentId, StoreError> {
        let mut inner = self.lock();
        inner.take_write_fault()?;

        let id = DocumentId::new(Uuid::new_v4().simple().to_string());
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), payload);
        inner.broadcast(collection);
        Ok(id)
    }

    async fn update(
        &self,
        collection: &str,
        id: &DocumentId,
        payload: Fields,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.take_write_fault()?;

        let doc = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound(format!("{collection}/{id}")))?;
        for (key, value) in payload {
            doc.insert(key, value);
        }
        inner.broadcast(collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &DocumentId) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.take_write_fault()?;

        let removed = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some();
        if removed {
            inner.broadcast(collection);
        }
        Ok(())
    }
}

#[async_trait]
impl Authenticator for MemoryStore {
    async fn sign_in(&self) -> Result<UserId, StoreError> {
        let mut inner = self.lock();
        if let Some(err) = &inner.auth_fault {
            return Err(err.clone());
        }
        let user = inner
            .user
            .get_or_insert_with(|| UserId::new(format!("anon-{}", Uuid::new_v4().simple())));
        Ok(user.clone())
    }
}
