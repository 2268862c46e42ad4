//! Live collection mirrors.
//!
//! [`Mirror`] is the in-memory state of one collection: every snapshot
//! replaces the whole record set. [`LiveMirror`] drives a [`Mirror`] from a
//! store subscription on a background task.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::task::JoinHandle;

use crate::{
    DataItem, EngineError, EntityKind,
    records::{cmp_date_desc, normalize},
    store::{Document, DocumentId, RemoteStore, Subscription},
};

/// What a running mirror reports to its owner.
#[derive(Debug)]
pub enum MirrorEvent<'a> {
    /// A snapshot was applied; the full ordered record set.
    Snapshot(&'a [DataItem]),
    /// The subscription failed. The previous records are still held.
    Failed(&'a EngineError),
}

/// Ordered record set of one entity kind.
///
/// Records are sorted by date, newest first. Records sharing a date keep the
/// order in which their ids were first observed.
#[derive(Clone, Debug)]
pub struct Mirror {
    kind: EntityKind,
    records: Vec<DataItem>,
    first_seen: HashMap<DocumentId, u64>,
    next_seq: u64,
    loaded: bool,
    error: Option<EngineError>,
}

impl Mirror {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            records: Vec::new(),
            first_seen: HashMap::new(),
            next_seq: 0,
            loaded: false,
            error: None,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn records(&self) -> &[DataItem] {
        &self.records
    }

    /// `true` once a first snapshot arrived.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Last subscription error, cleared by the next snapshot.
    pub fn error(&self) -> Option<&EngineError> {
        self.error.as_ref()
    }

    /// Replaces the record set with the content of `snapshot`.
    pub fn apply_snapshot(&mut self, snapshot: &[Document]) -> &[DataItem] {
        let present: HashSet<&DocumentId> = snapshot.iter().map(|doc| &doc.id).collect();
        self.first_seen.retain(|id, _| present.contains(id));

        let mut ordered: Vec<(u64, DataItem)> = snapshot
            .iter()
            .map(|doc| {
                let seq = *self.first_seen.entry(doc.id.clone()).or_insert_with(|| {
                    let seq = self.next_seq;
                    self.next_seq += 1;
                    seq
                });
                (seq, normalize(doc, self.kind))
            })
            .collect();
        ordered.sort_by(|(seq_a, a), (seq_b, b)| {
            cmp_date_desc(a.date(), b.date()).then(seq_a.cmp(seq_b))
        });

        self.records = ordered.into_iter().map(|(_, item)| item).collect();
        self.loaded = true;
        self.error = None;
        &self.records
    }

    /// Records a subscription failure, keeping the last-known-good records.
    pub fn apply_error(&mut self, err: EngineError) {
        self.error = Some(err);
    }
}

struct Shared {
    mirror: Mirror,
    stopped: bool,
}

/// A [`Mirror`] kept in sync with a remote collection.
///
/// The callback runs on the mirror task while the mirror state is locked: it
/// must not call back into the same `LiveMirror`.
pub struct LiveMirror {
    collection: String,
    shared: Arc<Mutex<Shared>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LiveMirror {
    /// Subscribes to `collection` and starts applying its snapshots.
    ///
    /// `on_change` is invoked once per snapshot and once per subscription
    /// error. Must be called from within a tokio runtime.
    pub fn start<F>(
        store: &dyn RemoteStore,
        collection: &str,
        kind: EntityKind,
        on_change: F,
    ) -> Self
    where
        F: FnMut(MirrorEvent<'_>) + Send + 'static,
    {
        let subscription = store.subscribe(collection);
        let shared = Arc::new(Mutex::new(Shared {
            mirror: Mirror::new(kind),
            stopped: false,
        }));
        tracing::info!("mirror {collection}: started");
        let task = tokio::spawn(run(
            subscription,
            shared.clone(),
            on_change,
            collection.to_string(),
        ));

        Self {
            collection: collection.to_string(),
            shared,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn kind(&self) -> EntityKind {
        lock(&self.shared).mirror.kind()
    }

    /// Copy of the current record set.
    pub fn records(&self) -> Vec<DataItem> {
        lock(&self.shared).mirror.records().to_vec()
    }

    pub fn error(&self) -> Option<EngineError> {
        lock(&self.shared).mirror.error().cloned()
    }

    pub fn is_loaded(&self) -> bool {
        lock(&self.shared).mirror.is_loaded()
    }

    pub fn is_stopped(&self) -> bool {
        lock(&self.shared).stopped
    }

    /// Cancels the subscription. Once this returns the callback is never
    /// invoked again. Calling it more than once is harmless.
    pub fn stop(&self) {
        {
            let mut shared = lock(&self.shared);
            if shared.stopped {
                return;
            }
            shared.stopped = true;
        }
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
        tracing::info!("mirror {}: stopped", self.collection);
    }
}

impl Drop for LiveMirror {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn run<F>(
    mut subscription: Subscription,
    shared: Arc<Mutex<Shared>>,
    mut on_change: F,
    collection: String,
) where
    F: FnMut(MirrorEvent<'_>) + Send + 'static,
{
    while let Some(event) = subscription.next().await {
        let mut guard = lock(&shared);
        if guard.stopped {
            break;
        }
        match event {
            Ok(snapshot) => {
                let records = guard.mirror.apply_snapshot(&snapshot);
                tracing::debug!("mirror {collection}: {} records", records.len());
                on_change(MirrorEvent::Snapshot(records));
            }
            Err(err) => {
                let err = EngineError::from(err);
                tracing::warn!("mirror {collection}: subscription failed: {err}");
                guard.mirror.apply_error(err.clone());
                on_change(MirrorEvent::Failed(&err));
            }
        }
    }
    subscription.cancel();
    tracing::debug!("mirror {collection}: subscription closed");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{StoreError, store::MemoryStore};

    fn doc(id: &str, date: &str) -> Document {
        Document::new(
            id,
            json!({"groupNo": id, "date": date})
                .as_object()
                .cloned()
                .unwrap(),
        )
    }

    fn ids(records: &[DataItem]) -> Vec<&str> {
        records.iter().map(|r| r.id().as_str()).collect()
    }

    #[test]
    fn snapshot_is_sorted_newest_first() {
        let mut mirror = Mirror::new(EntityKind::Travel);
        let records = mirror.apply_snapshot(&[
            doc("a", "2024-01-01"),
            doc("b", "2024-03-01"),
            doc("c", "not a date"),
            doc("d", "2024-02-01"),
        ]);
        assert_eq!(ids(records), ["b", "d", "a", "c"]);
        assert!(mirror.is_loaded());
    }

    #[test]
    fn equal_dates_keep_first_observation_order() {
        let mut mirror = Mirror::new(EntityKind::Travel);
        mirror.apply_snapshot(&[doc("z", "2024-03-01"), doc("a", "2024-03-01")]);
        assert_eq!(ids(mirror.records()), ["z", "a"]);

        // The store reorders its listing; the mirror order does not change.
        mirror.apply_snapshot(&[
            doc("a", "2024-03-01"),
            doc("m", "2024-03-01"),
            doc("z", "2024-03-01"),
        ]);
        assert_eq!(ids(mirror.records()), ["z", "a", "m"]);
    }

    #[test]
    fn omitted_ids_disappear() {
        let mut mirror = Mirror::new(EntityKind::Travel);
        mirror.apply_snapshot(&[doc("a", "2024-01-01"), doc("b", "2024-01-02")]);
        mirror.apply_snapshot(&[doc("b", "2024-01-02")]);
        assert_eq!(ids(mirror.records()), ["b"]);
    }

    #[test]
    fn returning_id_counts_as_newly_observed() {
        let mut mirror = Mirror::new(EntityKind::Travel);
        mirror.apply_snapshot(&[doc("a", "2024-03-01"), doc("b", "2024-03-01")]);
        mirror.apply_snapshot(&[doc("b", "2024-03-01")]);
        mirror.apply_snapshot(&[doc("a", "2024-03-01"), doc("b", "2024-03-01")]);
        assert_eq!(ids(mirror.records()), ["b", "a"]);
    }

    #[test]
    fn error_keeps_last_known_good_records() {
        let mut mirror = Mirror::new(EntityKind::Travel);
        mirror.apply_snapshot(&[doc("a", "2024-01-01")]);
        mirror.apply_error(EngineError::PermissionDenied("rules".to_string()));
        assert_eq!(ids(mirror.records()), ["a"]);
        assert!(mirror.error().is_some());

        mirror.apply_snapshot(&[doc("a", "2024-01-01"), doc("b", "2024-01-02")]);
        assert!(mirror.error().is_none());
        assert_eq!(mirror.records().len(), 2);
    }

    #[derive(Debug, PartialEq)]
    enum Seen {
        Records(Vec<String>),
        Failed(EngineError),
    }

    fn start(store: &MemoryStore) -> (LiveMirror, mpsc::UnboundedReceiver<Seen>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mirror = LiveMirror::start(store, "travel_groups", EntityKind::Travel, move |event| {
            let seen = match event {
                MirrorEvent::Snapshot(records) => Seen::Records(
                    records.iter().map(|r| r.id().as_str().to_string()).collect(),
                ),
                MirrorEvent::Failed(err) => Seen::Failed(err.clone()),
            };
            let _ = tx.send(seen);
        });
        (mirror, rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Seen>) -> Seen {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("mirror callback timed out")
            .expect("mirror callback dropped")
    }

    #[tokio::test]
    async fn live_mirror_follows_the_store() {
        let store = MemoryStore::new();
        store.put("travel_groups", "a", doc("a", "2024-01-01").fields);
        let (mirror, mut rx) = start(&store);

        assert_eq!(next(&mut rx).await, Seen::Records(vec!["a".to_string()]));

        store.put("travel_groups", "b", doc("b", "2024-02-01").fields);
        assert_eq!(
            next(&mut rx).await,
            Seen::Records(vec!["b".to_string(), "a".to_string()])
        );

        store.fail_listeners(
            "travel_groups",
            StoreError::PermissionDenied("rules".to_string()),
        );
        assert_eq!(
            next(&mut rx).await,
            Seen::Failed(EngineError::PermissionDenied("rules".to_string()))
        );
        assert_eq!(mirror.records().len(), 2);
        assert!(mirror.error().is_some());
    }

    #[tokio::test]
    async fn stop_is_final_and_idempotent() {
        let store = MemoryStore::new();
        let (mirror, mut rx) = start(&store);
        assert_eq!(next(&mut rx).await, Seen::Records(vec![]));

        mirror.stop();
        mirror.stop();
        assert!(mirror.is_stopped());

        store.put("travel_groups", "a", doc("a", "2024-01-01").fields);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(store.listener_count("travel_groups"), 0);
        assert!(mirror.records().is_empty());
    }
}
