//! Entry gateway: the single write path to the remote store.
//!
//! A [`FormState`] is validated, turned into the payload of its kind and
//! routed to that kind's collection. Every mutation is reported to the
//! [`SyncTracker`].

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    DataItem, EngineError, EntityKind, FormState, ResultEngine, SyncTracker,
    store::{DocumentId, Fields, RemoteStore, UserId},
};

pub const DEFAULT_TRAVEL_COLLECTION: &str = "travel_groups";
pub const DEFAULT_BUSINESS_COLLECTION: &str = "business_projects";

/// Remote collection names per entity kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Collections {
    pub travel: String,
    pub business: String,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            travel: DEFAULT_TRAVEL_COLLECTION.to_string(),
            business: DEFAULT_BUSINESS_COLLECTION.to_string(),
        }
    }
}

impl Collections {
    pub fn name(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Travel => &self.travel,
            EntityKind::Business => &self.business,
        }
    }
}

/// Outcome of a successful submit. The caller resets its draft to an empty
/// one of [`Saved::kind`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Saved {
    pub id: DocumentId,
    pub kind: EntityKind,
    pub created: bool,
}

pub struct EntryGateway {
    store: Arc<dyn RemoteStore>,
    collections: Collections,
    user: UserId,
    tracker: Arc<SyncTracker>,
}

impl EntryGateway {
    /// The gateway can only exist once a user identity is known.
    pub fn new(
        store: Arc<dyn RemoteStore>,
        collections: Collections,
        user: UserId,
        tracker: Arc<SyncTracker>,
    ) -> Self {
        Self {
            store,
            collections,
            user,
            tracker,
        }
    }

    pub fn tracker(&self) -> &Arc<SyncTracker> {
        &self.tracker
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    /// Creates or updates the record described by `form`.
    ///
    /// Updates only happen when `is_editing` is set and the form carries an
    /// id; anything else creates a new document stamped with `createdAt` and
    /// `creatorId`.
    pub async fn submit(&self, form: &FormState, is_editing: bool) -> ResultEngine<Saved> {
        let mut payload = build_payload(form)?;
        let now = timestamp();
        payload.insert("updatedAt".to_string(), Value::String(now.clone()));
        let collection = self.collections.name(form.kind);

        self.tracker.begin();
        let result = match form.id.as_ref().filter(|_| is_editing) {
            Some(id) => self
                .store
                .update(collection, id, payload)
                .await
                .map(|()| Saved {
                    id: id.clone(),
                    kind: form.kind,
                    created: false,
                }),
            None => {
                payload.insert("createdAt".to_string(), Value::String(now));
                payload.insert(
                    "creatorId".to_string(),
                    Value::String(self.user.as_str().to_string()),
                );
                self.store
                    .create(collection, payload)
                    .await
                    .map(|id| Saved {
                        id,
                        kind: form.kind,
                        created: true,
                    })
            }
        };

        match result {
            Ok(saved) => {
                self.tracker.succeed();
                tracing::info!(
                    "{} {collection}/{}",
                    if saved.created { "created" } else { "updated" },
                    saved.id
                );
                Ok(saved)
            }
            Err(err) => {
                self.tracker.fail();
                tracing::error!("save to {collection} failed: {err}");
                Err(EngineError::Write(err))
            }
        }
    }

    /// Deletes `item` from its kind's collection.
    pub async fn remove(&self, item: &DataItem) -> ResultEngine<()> {
        let collection = self.collections.name(item.kind());

        self.tracker.begin();
        match self.store.delete(collection, item.id()).await {
            Ok(()) => {
                self.tracker.succeed();
                tracing::info!("deleted {collection}/{}", item.id());
                Ok(())
            }
            Err(err) => {
                self.tracker.fail();
                tracing::error!("delete from {collection} failed: {err}");
                Err(EngineError::Write(err))
            }
        }
    }
}

/// Validates `form` and builds the fields of its active kind.
///
/// Timestamps and the creator are added by [`EntryGateway::submit`].
pub fn build_payload(form: &FormState) -> ResultEngine<Fields> {
    let date = required(&form.date, "date")?;

    let mut payload = Fields::new();
    match form.kind {
        EntityKind::Travel => {
            let group_no = required(&form.group_no, "group number")?;
            payload.insert("groupNo".to_string(), Value::String(group_no));
            payload.insert("date".to_string(), Value::String(date));
            payload.insert(
                "destination".to_string(),
                Value::String(form.destination.trim().to_string()),
            );
            payload.insert(
                "personInCharge".to_string(),
                Value::String(form.person_in_charge.trim().to_string()),
            );
            payload.insert(
                "status".to_string(),
                Value::String(form.status.stored_label().to_string()),
            );
            payload.insert("recruitCount".to_string(), Value::from(form.recruit_count));
        }
        EntityKind::Business => {
            let project_name = required(&form.project_name, "project name")?;
            payload.insert("projectName".to_string(), Value::String(project_name));
            payload.insert("date".to_string(), Value::String(date));
            payload.insert(
                "personInCharge".to_string(),
                Value::String(form.person_in_charge.trim().to_string()),
            );
        }
    }
    payload.insert("revenue".to_string(), form.revenue.to_json());
    payload.insert("expense".to_string(), form.expense.to_json());
    Ok(payload)
}

fn required(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(format!("{label} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
