//! Session: the signed-in dashboard.
//!
//! A [`Session`] owns both live mirrors and the entry gateway, keeps the
//! current view selection and republishes a fresh [`Report`] whenever a
//! snapshot, a mirror error or a selection change comes in.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::watch;

use crate::{
    Collections, DataItem, EngineError, EntityKind, EntryGateway, FormState, LiveMirror,
    MirrorEvent, MonthFilter, Report, ResultEngine, Saved, Selection, SyncStatus, SyncTracker,
    ViewMode,
    report::SourceState,
    store::{Authenticator, RemoteStore, UserId},
};

#[derive(Default)]
struct Source {
    records: Vec<DataItem>,
    state: SourceState,
}

#[derive(Default)]
struct DashboardState {
    selection: Selection,
    /// Set by `Session::shutdown`; nothing is published afterwards.
    closed: bool,
    travel: Source,
    business: Source,
}

impl DashboardState {
    fn source_mut(&mut self, kind: EntityKind) -> &mut Source {
        match kind {
            EntityKind::Travel => &mut self.travel,
            EntityKind::Business => &mut self.business,
        }
    }

    fn report(&self) -> Report {
        let mut report = Report::build(
            &self.travel.records,
            &self.business.records,
            &self.selection,
        );
        report.travel = self.travel.state.clone();
        report.business = self.business.state.clone();
        report
    }
}

pub struct Session {
    gateway: EntryGateway,
    travel: LiveMirror,
    business: LiveMirror,
    state: Arc<Mutex<DashboardState>>,
    reports: Arc<watch::Sender<Report>>,
}

impl Session {
    /// Return a builder for `Session`.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn user(&self) -> &UserId {
        self.gateway.user()
    }

    /// Latest report.
    pub fn report(&self) -> Report {
        self.reports.borrow().clone()
    }

    /// Receiver notified on every recomputed report.
    pub fn subscribe(&self) -> watch::Receiver<Report> {
        self.reports.subscribe()
    }

    /// Waits until both mirrors delivered their first snapshot or error and
    /// returns the report at that point.
    pub async fn loaded(&self) -> ResultEngine<Report> {
        let mut rx = self.subscribe();
        let report = rx
            .wait_for(Report::is_loaded)
            .await
            .map_err(|_| EngineError::TransportFailure("session closed".to_string()))?;
        Ok(report.clone())
    }

    pub fn selection(&self) -> Selection {
        lock(&self.state).selection.clone()
    }

    pub fn set_view_mode(&self, mode: ViewMode) {
        self.update_selection(|selection| selection.mode = mode);
    }

    pub fn set_month_filter(&self, month: MonthFilter) {
        self.update_selection(|selection| selection.month = month);
    }

    fn update_selection(&self, f: impl FnOnce(&mut Selection)) {
        let mut state = lock(&self.state);
        f(&mut state.selection);
        tracing::debug!(
            "selection: {} / {}",
            state.selection.mode.as_str(),
            state.selection.month
        );
        if !state.closed {
            self.reports.send_replace(state.report());
        }
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.gateway.tracker().status()
    }

    pub fn sync_updates(&self) -> watch::Receiver<SyncStatus> {
        self.gateway.tracker().subscribe()
    }

    /// Saves `form`. On success the draft is replaced by an empty one of the
    /// same kind; on failure it is left untouched so the user can retry.
    pub async fn submit(&self, form: &mut FormState) -> ResultEngine<Saved> {
        let saved = self.gateway.submit(form, form.is_editing()).await?;
        *form = form.cleared(Utc::now().date_naive());
        Ok(saved)
    }

    /// Deletes `item`. A draft editing that record is cleared.
    pub async fn remove(&self, item: &DataItem, form: &mut FormState) -> ResultEngine<()> {
        self.gateway.remove(item).await?;
        if form.kind == item.kind() && form.id.as_ref() == Some(item.id()) {
            *form = form.cleared(Utc::now().date_naive());
        }
        Ok(())
    }

    /// Stops both mirrors. No report is published afterwards, selection
    /// changes included.
    pub fn shutdown(&self) {
        lock(&self.state).closed = true;
        self.travel.stop();
        self.business.stop();
    }

    pub fn is_shut_down(&self) -> bool {
        self.travel.is_stopped() && self.business.is_stopped()
    }
}

/// The builder for `Session`
#[derive(Default)]
pub struct SessionBuilder {
    store: Option<Arc<dyn RemoteStore>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    collections: Collections,
    selection: Selection,
}

impl SessionBuilder {
    /// Pass the required remote store
    pub fn store(mut self, store: Arc<dyn RemoteStore>) -> SessionBuilder {
        self.store = Some(store);
        self
    }

    /// Pass the required authenticator
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> SessionBuilder {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn collections(mut self, collections: Collections) -> SessionBuilder {
        self.collections = collections;
        self
    }

    /// Initial view selection.
    pub fn selection(mut self, selection: Selection) -> SessionBuilder {
        self.selection = selection;
        self
    }

    /// Signs in, then starts both mirrors.
    ///
    /// Nothing is subscribed when sign-in fails. Must be called from within a
    /// tokio runtime.
    pub async fn build(self) -> ResultEngine<Session> {
        let authenticator = self
            .authenticator
            .ok_or_else(|| EngineError::AuthFailure("missing authenticator".to_string()))?;
        let store = self
            .store
            .ok_or_else(|| EngineError::TransportFailure("missing remote store".to_string()))?;

        let user = authenticator.sign_in().await.map_err(|err| {
            tracing::error!("sign-in failed: {err}");
            EngineError::AuthFailure(err.to_string())
        })?;
        tracing::info!("signed in as {user}");

        let state = Arc::new(Mutex::new(DashboardState {
            selection: self.selection,
            ..Default::default()
        }));
        let (reports, _) = watch::channel(lock(&state).report());
        let reports = Arc::new(reports);

        let travel = LiveMirror::start(
            store.as_ref(),
            self.collections.name(EntityKind::Travel),
            EntityKind::Travel,
            republish(EntityKind::Travel, state.clone(), reports.clone()),
        );
        let business = LiveMirror::start(
            store.as_ref(),
            self.collections.name(EntityKind::Business),
            EntityKind::Business,
            republish(EntityKind::Business, state.clone(), reports.clone()),
        );
        let gateway = EntryGateway::new(
            store,
            self.collections,
            user,
            Arc::new(SyncTracker::new()),
        );

        Ok(Session {
            gateway,
            travel,
            business,
            state,
            reports,
        })
    }
}

fn republish(
    kind: EntityKind,
    state: Arc<Mutex<DashboardState>>,
    reports: Arc<watch::Sender<Report>>,
) -> impl FnMut(MirrorEvent<'_>) + Send + 'static {
    move |event: MirrorEvent<'_>| {
        let mut state = lock(&state);
        let source = state.source_mut(kind);
        match event {
            MirrorEvent::Snapshot(records) => {
                source.records = records.to_vec();
                source.state = SourceState::new(true, None);
            }
            MirrorEvent::Failed(err) => {
                // A failed first delivery still ends loading so the error shows.
                source.state.loaded = true;
                source.state.error = Some(err.to_string());
            }
        }
        if !state.closed {
            reports.send_replace(state.report());
        }
    }
}

fn lock(state: &Mutex<DashboardState>) -> MutexGuard<'_, DashboardState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
