//! The sync engine: drains the pending-mutation queue to the cloud
//! record service.
//!
//! The engine is an explicit object constructed with its collaborators
//! (local store, queue, record API, optional route provider) and an
//! explicit `start`/`shutdown` lifecycle. One exclusive in-progress flag
//! keeps drains from overlapping; items within a drain are processed
//! strictly in enqueue order, one network call at a time.
//!
//! Sync outcomes are never raised to the caller. They surface through
//! [`SyncEngine::status`], [`SyncEngine::pending_count`], and the typed
//! event stream.

use crate::api::{ApiError, RecordApi};
use crate::enrich::{enrich_trip, needs_enrichment, RouteProvider};
use crate::events::{SyncEvent, SyncState};
use crate::now_ms;
use crate::queue::SyncQueue;
use crate::store::LocalStore;
use roadbook_core::{
    FailureKind, MutationAction, PendingMutation, RecordPayload, SyncStatus,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

/// Tunable engine timings.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Window within which enqueue bursts coalesce into one drain
    pub debounce_ms: u64,
    /// Period of the background drain tick while online
    pub drain_interval_secs: u64,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            drain_interval_secs: 30,
        }
    }
}

struct EngineInner {
    store: LocalStore,
    queue: SyncQueue,
    api: Arc<dyn RecordApi>,
    routes: Option<Arc<dyn RouteProvider>>,
    options: SyncOptions,
    online: AtomicBool,
    draining: AtomicBool,
    state: parking_lot::Mutex<SyncState>,
    last_dropped: parking_lot::Mutex<Option<PendingMutation>>,
    events: broadcast::Sender<SyncEvent>,
    drain_tx: mpsc::UnboundedSender<()>,
    drain_rx: AsyncMutex<Option<mpsc::UnboundedReceiver<()>>>,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

/// Offline-first sync engine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    /// Build an engine over its collaborators. Call [`start`] to run the
    /// background debounce and periodic-drain tasks.
    ///
    /// [`start`]: SyncEngine::start
    pub fn new(
        store: LocalStore,
        api: Arc<dyn RecordApi>,
        routes: Option<Arc<dyn RouteProvider>>,
        options: SyncOptions,
    ) -> Self {
        let queue = SyncQueue::new(store.clone());
        let (drain_tx, drain_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(EngineInner {
                store,
                queue,
                api,
                routes,
                options,
                online: AtomicBool::new(false),
                draining: AtomicBool::new(false),
                state: parking_lot::Mutex::new(SyncState::Offline),
                last_dropped: parking_lot::Mutex::new(None),
                events,
                drain_tx,
                drain_rx: AsyncMutex::new(Some(drain_rx)),
                tasks: parking_lot::Mutex::new(Vec::new()),
            }),
        }
    }

    /// The local store this engine mutates.
    pub fn store(&self) -> &LocalStore {
        &self.inner.store
    }

    /// The persisted queue this engine drains.
    pub fn queue(&self) -> &SyncQueue {
        &self.inner.queue
    }

    /// The record API this engine dispatches through.
    pub fn api(&self) -> Arc<dyn RecordApi> {
        Arc::clone(&self.inner.api)
    }

    /// Spawn the debounce listener and the periodic drain tick.
    pub async fn start(&self) {
        let Some(mut rx) = self.inner.drain_rx.lock().await.take() else {
            return;
        };

        let debounce = self.clone();
        let debounce_ms = self.inner.options.debounce_ms;
        let debounce_task = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                tokio::time::sleep(Duration::from_millis(debounce_ms)).await;
                // Coalesce any pokes that arrived during the window
                while rx.try_recv().is_ok() {}
                debounce.drain_now().await;
            }
        });

        let periodic = self.clone();
        let interval_secs = self.inner.options.drain_interval_secs;
        let periodic_task = tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(interval_secs));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            tick.tick().await; // immediate first tick
            loop {
                tick.tick().await;
                periodic.drain_now().await;
            }
        });

        let mut tasks = self.inner.tasks.lock();
        tasks.push(debounce_task);
        tasks.push(periodic_task);
    }

    /// Stop the background tasks. Queued mutations stay persisted.
    pub fn shutdown(&self) {
        for task in self.inner.tasks.lock().drain(..) {
            task.abort();
        }
    }

    /// Subscribe to the typed event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// Current engine state.
    pub fn status(&self) -> SyncState {
        self.inner.state.lock().clone()
    }

    /// Current queue depth. Storage failures report as zero.
    pub fn pending_count(&self) -> usize {
        match self.inner.queue.len() {
            Ok(len) => len,
            Err(err) => {
                tracing::warn!(%err, "failed to read queue depth");
                0
            }
        }
    }

    /// The most recently dropped mutation, with its final `last_error`,
    /// kept for inspection after its queue row is gone.
    pub fn last_dropped(&self) -> Option<PendingMutation> {
        self.inner.last_dropped.lock().clone()
    }

    /// Whether the engine believes it is online.
    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Record a connectivity transition. Going online drains immediately;
    /// while offline, drain triggers return without work.
    pub async fn set_online(&self, online: bool) {
        let was = self.inner.online.swap(online, Ordering::SeqCst);
        if online && !was {
            self.set_state(SyncState::Online);
            self.drain_now().await;
        } else if !online && was {
            self.set_state(SyncState::Offline);
        }
    }

    /// The application regained foreground visibility; drain soon if
    /// connectivity allows.
    pub fn notify_foreground(&self) {
        if self.is_online() {
            self.request_drain();
        }
    }

    /// Ask for a debounced drain. Bursts within the debounce window
    /// coalesce into a single drain pass.
    pub fn request_drain(&self) {
        let _ = self.inner.drain_tx.send(());
    }

    /// Drain the queue now. Idempotent: a drain already in progress, or
    /// being offline, makes this a no-op. Items are processed in enqueue
    /// order, one at a time, each removed only after its call succeeds
    /// or fails fatally.
    pub async fn drain_now(&self) {
        if !self.is_online() {
            return;
        }
        if self.inner.draining.swap(true, Ordering::SeqCst) {
            return;
        }

        let snapshot = match self.inner.queue.snapshot() {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!(%err, "failed to snapshot sync queue");
                self.inner.draining.store(false, Ordering::SeqCst);
                self.set_state(SyncState::Error(err.to_string()));
                return;
            }
        };

        if snapshot.is_empty() {
            self.inner.draining.store(false, Ordering::SeqCst);
            // Nothing was transmitted; an earlier pass's error stays
            // observable until a real pass supersedes it.
            if !matches!(self.status(), SyncState::Error(_)) {
                self.set_state(SyncState::Synced);
            }
            return;
        }

        self.set_state(SyncState::Syncing);
        let mut last_error: Option<String> = None;

        for item in snapshot {
            if let Err(message) = self.dispatch(item).await {
                last_error = Some(message);
            }
        }

        self.inner.draining.store(false, Ordering::SeqCst);
        let remaining = self.pending_count();
        match last_error {
            Some(message) => self.set_state(SyncState::Error(message)),
            None => self.set_state(SyncState::Synced),
        }
        let _ = self.inner.events.send(SyncEvent::QueueDrained { remaining });
    }

    /// Process one queue item. `Err` carries the failure message for the
    /// engine's observable error state; queue bookkeeping has already
    /// happened by the time this returns.
    async fn dispatch(&self, mut item: PendingMutation) -> Result<(), String> {
        let payload = self.enriched_payload(&item).await;

        let result = match item.action {
            MutationAction::Create => match &payload {
                Some(body) => self
                    .inner
                    .api
                    .create(item.record_type, body)
                    .await
                    .map(|_| ()),
                None => {
                    tracing::warn!(id = item.id, "dropping create with no payload");
                    self.remove_item(&item);
                    return Ok(());
                }
            },
            MutationAction::Update => match &payload {
                Some(body) => self
                    .inner
                    .api
                    .update(item.record_type, &item.target_id, body)
                    .await
                    .map(|_| ()),
                None => {
                    tracing::warn!(id = item.id, "dropping update with no payload");
                    self.remove_item(&item);
                    return Ok(());
                }
            },
            MutationAction::Delete => self.inner.api.delete(item.record_type, &item.target_id).await,
            MutationAction::Restore => self
                .inner
                .api
                .restore(item.record_type, &item.target_id)
                .await
                .map(|_| ()),
            MutationAction::PermanentDelete => {
                self.inner
                    .api
                    .permanent_delete(item.record_type, &item.target_id)
                    .await
            }
        };

        match result {
            Ok(()) => {
                if matches!(
                    item.action,
                    MutationAction::Create | MutationAction::Update | MutationAction::Restore
                ) {
                    if let Err(err) = self.inner.store.mark_record_synced(
                        item.record_type,
                        &item.target_id,
                        now_ms(),
                    ) {
                        tracing::warn!(%err, id = %item.target_id, "failed to mark record synced");
                    }
                }
                self.remove_item(&item);
                Ok(())
            }
            Err(err) => self.handle_failure(&mut item, err),
        }
    }

    fn handle_failure(&self, item: &mut PendingMutation, err: ApiError) -> Result<(), String> {
        let message = err.to_string();
        match err.kind() {
            FailureKind::Fatal => {
                tracing::warn!(
                    id = item.id,
                    target = %item.target_id,
                    %message,
                    "server rejected mutation, dropping"
                );
                item.last_error = Some(message.clone());
                self.record_drop(item);
                self.mark_record_errored(item);
                self.remove_item(item);
                Err(message)
            }
            FailureKind::Transient => {
                item.record_failure(&message);
                if item.exhausted() {
                    tracing::warn!(
                        id = item.id,
                        target = %item.target_id,
                        retries = item.retries,
                        %message,
                        "mutation failed permanently after exhausting retries"
                    );
                    self.record_drop(item);
                    self.mark_record_errored(item);
                    self.remove_item(item);
                } else if let Err(err) = self.inner.queue.save_retry(item) {
                    tracing::warn!(%err, id = item.id, "failed to persist retry state");
                }
                Err(message)
            }
        }
    }

    /// For trip creates and updates with no measured mileage, attempt a
    /// best-effort route-distance enrichment before transmitting. The
    /// enriched trip is persisted locally and announced; failures are
    /// swallowed.
    async fn enriched_payload(&self, item: &PendingMutation) -> Option<serde_json::Value> {
        let payload = item.payload.clone()?;
        if !matches!(item.action, MutationAction::Create | MutationAction::Update) {
            return Some(payload);
        }
        let Some(provider) = &self.inner.routes else {
            return Some(payload);
        };
        let Ok(RecordPayload::Trip(mut trip)) =
            serde_json::from_value::<RecordPayload>(payload.clone())
        else {
            return Some(payload);
        };
        if !needs_enrichment(&trip) {
            return Some(payload);
        }

        if enrich_trip(&mut trip, provider.as_ref()).await {
            let enriched = RecordPayload::Trip(trip.clone());
            if let Err(err) = self.inner.store.put_record(&enriched) {
                tracing::warn!(%err, id = %trip.id, "failed to persist enriched trip");
            }
            let _ = self.inner.events.send(SyncEvent::RecordEnriched {
                record_type: enriched.record_type(),
                id: trip.id.clone(),
                total_miles: trip.total_miles,
            });
            return serde_json::to_value(&enriched).ok();
        }
        Some(payload)
    }

    fn record_drop(&self, item: &PendingMutation) {
        *self.inner.last_dropped.lock() = Some(item.clone());
    }

    fn remove_item(&self, item: &PendingMutation) {
        if let Err(err) = self.inner.queue.remove(item.id) {
            tracing::warn!(%err, id = item.id, "failed to remove queue item");
        }
    }

    fn mark_record_errored(&self, item: &PendingMutation) {
        let result = self
            .inner
            .store
            .get_record(item.record_type, &item.target_id);
        if let Ok(Some(mut record)) = result {
            record.set_sync_status(SyncStatus::Error);
            if let Err(err) = self.inner.store.put_record(&record) {
                tracing::warn!(%err, id = %item.target_id, "failed to flag record errored");
            }
        }
    }

    fn set_state(&self, state: SyncState) {
        let mut guard = self.inner.state.lock();
        if *guard != state {
            *guard = state.clone();
            let _ = self.inner.events.send(SyncEvent::StatusChanged(state));
        }
    }
}
