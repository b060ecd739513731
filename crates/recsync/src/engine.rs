//! The sync orchestrator.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use recsync_core::{Connectivity, Cursor, Error, Query, Record, RecordId, RecordService, Result};
use recsync_file::PendingQueues;

use crate::config::SyncConfig;
use crate::events::{FlushFailure, FlushReport, RetryOp, SyncEvent};
use crate::fetch::{FetchState, PagedFetcher};
use crate::inflight::InFlightUploads;
use crate::reconcile::reconcile;
use crate::retry::RetryScheduler;

/// Capacity of the event channel.
const EVENT_CAPACITY: usize = 64;

type RetryTask = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Result of one [`SyncEngine::fetch`] call.
#[derive(Debug, Clone)]
pub struct FetchOutput {
    /// Reconciled view of everything fetched so far for the current query.
    pub records: Vec<Record>,
    /// Records the service returned in this page.
    pub fetched: usize,
    /// Paging state after this call.
    pub state: FetchState,
}

/// Offline-tolerant front end to a [`RecordService`].
///
/// Cloning is cheap; clones share the same queues, paging state and retry
/// timers. Dropping the last clone cancels any retry that has not fired.
///
/// # Example
///
/// ```no_run
/// use recsync::{ManualConnectivity, PendingQueues, Query, Record, SyncConfig, SyncEngine};
/// use recsync_file::FileService;
///
/// # async fn example() -> recsync::Result<()> {
/// let engine = SyncEngine::new(
///     FileService::new("/tmp/records"),
///     ManualConnectivity::online(),
///     PendingQueues::open("/tmp/pending")?,
///     SyncConfig::new(20),
/// );
///
/// engine.upload(Record::new("note")?.with("title", "hello")?).await?;
///
/// engine.set_query(Query::all("note"));
/// let page = engine.fetch().await?;
/// println!("{} records", page.records.len());
/// # Ok(())
/// # }
/// ```
pub struct SyncEngine<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for SyncEngine<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<S> {
    service: S,
    connectivity: Arc<dyn Connectivity>,
    queues: PendingQueues,
    config: SyncConfig,
    fetcher: PagedFetcher,
    scheduler: RetryScheduler,
    in_flight: InFlightUploads,
    events: broadcast::Sender<SyncEvent>,
}

impl<S> SyncEngine<S>
where
    S: RecordService + 'static,
{
    /// Create an engine over `service`, queuing offline work in `queues`.
    pub fn new(
        service: S,
        connectivity: impl Connectivity + 'static,
        queues: PendingQueues,
        config: SyncConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                service,
                connectivity: Arc::new(connectivity),
                queues,
                config,
                fetcher: PagedFetcher::new(),
                scheduler: RetryScheduler::new(),
                in_flight: InFlightUploads::new(),
                events,
            }),
        }
    }

    pub fn service(&self) -> &S {
        &self.inner.service
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn queues(&self) -> &PendingQueues {
        &self.inner.queues
    }

    /// Replace the query. The cursor and fetched records are discarded.
    pub fn set_query(&self, query: Query) {
        self.inner.fetcher.set_query(query);
    }

    pub fn query(&self) -> Option<Query> {
        self.inner.fetcher.query()
    }

    pub fn fetch_state(&self) -> FetchState {
        self.inner.fetcher.state()
    }

    pub fn cursor(&self) -> Option<Cursor> {
        self.inner.fetcher.cursor()
    }

    /// Subscribe to background activity.
    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// Fetch the next page and return the reconciled view.
    ///
    /// When `flush_on_fetch` is set and the service is reachable, pending
    /// work is flushed in the background; its failures never fail the fetch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoQuery`] if no query was set, the service's error if
    /// the page could not be fetched, or a local storage error if the
    /// pending queues could not be read.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> Result<FetchOutput> {
        let inner = &self.inner;
        let outcome = inner
            .fetcher
            .next_page(&inner.service, inner.connectivity.as_ref(), inner.config.interval)
            .await?;

        let records = inner.view()?;

        if inner.config.flush_on_fetch && inner.connectivity.is_available() {
            let flusher = Arc::clone(inner);
            tokio::spawn(async move {
                flusher.flush_pending().await;
            });
        }

        debug!(fetched = outcome.fetched, total = records.len(), "Fetch complete");
        Ok(FetchOutput {
            records,
            fetched: outcome.fetched,
            state: outcome.state,
        })
    }

    /// Fetch pages until the result set is exhausted, or until a page
    /// cannot advance because the service is unreachable.
    pub async fn fetch_all(&self) -> Result<FetchOutput> {
        let mut fetched = 0;
        loop {
            let mut output = self.fetch().await?;
            fetched += output.fetched;
            if output.state == FetchState::None || self.cursor().is_none() {
                output.fetched = fetched;
                return Ok(output);
            }
        }
    }

    /// The reconciled view without contacting the service.
    pub fn view(&self) -> Result<Vec<Record>> {
        self.inner.view()
    }

    /// Save `record` to the service, or queue it when offline.
    ///
    /// Online, the record is queued first as a safety net and the entry is
    /// removed once the service accepts it; the stored record, carrying
    /// server metadata, is returned. Offline with offline support, the
    /// record is queued and returned unchanged.
    ///
    /// # Errors
    ///
    /// - [`Error::Offline`] when offline and offline support is disabled.
    /// - [`Error::LocalStorage`] when the record could not be queued.
    /// - The service's error when the save failed. If the service sent a
    ///   retry hint, a retry is scheduled and the entry stays queued.
    ///
    /// If the record is deleted while the save is in flight, it is deleted
    /// from the service as soon as the save returns and nothing is retried.
    pub async fn upload(&self, record: Record) -> Result<Record> {
        self.inner.upload(record, 1).await
    }

    /// Delete `id`.
    ///
    /// A record that only exists as a pending upload is dropped locally
    /// without contacting the service. Otherwise the service is asked to
    /// delete it; offline with offline support, the deletion is queued and
    /// any queued edit is dropped. A queued edit is left alone when the
    /// deletion can neither reach the service nor be queued.
    ///
    /// # Errors
    ///
    /// As for [`upload`](Self::upload). A service answer of "not found"
    /// counts as success.
    pub async fn delete(&self, id: &RecordId) -> Result<RecordId> {
        self.inner.delete(id, 1).await
    }

    /// Push every pending entry to the service. Does nothing while offline.
    pub async fn flush_pending(&self) -> FlushReport {
        self.inner.flush_pending().await
    }

    /// Records queued for upload, oldest first.
    pub fn pending_uploads(&self) -> Result<Vec<Record>> {
        self.inner.queues.uploads.load()
    }

    /// Identities queued for deletion, oldest first.
    pub fn pending_deletions(&self) -> Result<Vec<RecordId>> {
        self.inner.queues.deletions.load()
    }

    /// Number of retries waiting to fire.
    pub fn pending_retries(&self) -> usize {
        self.inner.scheduler.pending()
    }

    /// Throw away every queued upload and deletion.
    #[instrument(skip(self))]
    pub fn discard_offline_state(&self) -> Result<()> {
        self.inner.queues.erase_all()?;
        info!("Discarded offline state");
        Ok(())
    }

    /// Cancel every retry that has not fired yet.
    pub fn shutdown(&self) {
        self.inner.scheduler.shutdown();
    }
}

impl<S> Inner<S>
where
    S: RecordService + 'static,
{
    fn online(&self) -> bool {
        self.connectivity.is_available()
    }

    fn publish(&self, event: SyncEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn view(&self) -> Result<Vec<Record>> {
        let query = self.fetcher.query();
        let mut uploads = self.queues.uploads.load()?;
        if let Some(query) = &query {
            uploads.retain(|r| query.matches(r));
        }
        let deletions = self.queues.deletions.load()?;
        let sort = query.map(|q| q.sort).unwrap_or_default();

        Ok(reconcile(
            &self.fetcher.accumulated(),
            uploads,
            &deletions,
            &sort,
        ))
    }

    #[instrument(skip(self, record), fields(id = %record.id()))]
    async fn upload(self: &Arc<Self>, record: Record, attempt: u32) -> Result<Record> {
        let id = record.id().clone();

        if !self.online() {
            if !self.config.offline_support {
                return Err(Error::Offline);
            }
            self.queues.uploads.save(&record)?;
            self.queues.deletions.remove(&id)?;
            debug!("Offline; upload queued");
            return Ok(record);
        }

        let ticket = self.in_flight.begin(&id);
        let revision = if self.config.offline_support {
            Some(self.queues.uploads.save(&record)?)
        } else {
            None
        };

        let result = self.service.save(&record).await;
        if let (Ok(_), Some(revision)) = (&result, &revision) {
            // A newer snapshot saved meanwhile stays queued.
            self.queues.uploads.remove_revision(&id, revision)?;
        }

        if ticket.finish() {
            debug!("Deleted while uploading; removing it from the service");
            self.delete(&id, attempt).await?;
            return result;
        }

        match result {
            Ok(saved) => {
                self.queues.deletions.remove(&id)?;
                self.fetcher.record_saved(&saved);
                debug!("Uploaded");
                Ok(saved)
            }
            Err(err) => {
                warn!(error = %err, "Upload failed");
                if self.config.offline_support {
                    self.schedule_retry(RetryOp::Upload, id, attempt, &err);
                }
                Err(err)
            }
        }
    }

    #[instrument(skip(self))]
    async fn delete(self: &Arc<Self>, id: &RecordId, attempt: u32) -> Result<RecordId> {
        if self.in_flight.mark_deleted(id) {
            self.queues.uploads.remove(id)?;
            debug!("Upload in flight; deleting once it returns");
            return Ok(id.clone());
        }

        let pending = self.queues.uploads.get(id)?;
        if pending.as_ref().is_some_and(|r| r.metadata().is_none()) {
            self.queues.uploads.remove(id)?;
            debug!("Dropped upload that never reached the service");
            return Ok(id.clone());
        }

        if !self.online() {
            if !self.config.offline_support {
                return Err(Error::Offline);
            }
            self.queues.deletions.save(id)?;
            self.queues.uploads.remove(id)?;
            debug!("Offline; deletion queued");
            return Ok(id.clone());
        }

        match self.service.delete(id).await {
            Ok(_) => {
                self.forget(id)?;
                debug!("Deleted");
                Ok(id.clone())
            }
            Err(err) if err.is_not_found() => {
                self.forget(id)?;
                debug!("Already gone");
                Ok(id.clone())
            }
            Err(err) => {
                warn!(error = %err, "Delete failed");
                if self.config.offline_support {
                    self.queues.deletions.save(id)?;
                    self.queues.uploads.remove(id)?;
                    self.schedule_retry(RetryOp::Delete, id.clone(), attempt, &err);
                }
                Err(err)
            }
        }
    }

    /// Drop every local trace of a record the service no longer has.
    fn forget(&self, id: &RecordId) -> Result<()> {
        self.queues.uploads.remove(id)?;
        self.queues.deletions.remove(id)?;
        self.fetcher.record_deleted(id);
        Ok(())
    }

    /// Schedule the next attempt if the failure carries a hint and the
    /// retry budget allows it.
    fn schedule_retry(self: &Arc<Self>, op: RetryOp, id: RecordId, attempt: u32, err: &Error) {
        let hint = err.retry_after();
        match self.config.retry.delay_for(hint, attempt) {
            Some(after) => {
                let next = attempt.saturating_add(1);
                debug!(%op, %id, attempt = next, ?after, "Retry scheduled");
                self.scheduler
                    .schedule(after, retry_task(Arc::downgrade(self), op, id.clone(), next));
                self.publish(SyncEvent::RetryScheduled {
                    op,
                    id,
                    attempt: next,
                    after,
                });
            }
            None if hint.is_some() => {
                warn!(%op, %id, attempt, "Retry budget exhausted");
                self.publish(SyncEvent::RetryExhausted { op, id, attempt });
            }
            None => debug!(%op, %id, "No retry hint; failure is terminal for this attempt"),
        }
    }

    async fn run_retry(self: &Arc<Self>, op: RetryOp, id: RecordId, attempt: u32) {
        if !self.online() {
            debug!(%op, %id, "Offline; leaving entry for the next flush");
            self.publish(SyncEvent::RetrySkipped { op, id });
            return;
        }

        let outcome = match op {
            RetryOp::Upload => match self.queues.uploads.get(&id) {
                Ok(Some(record)) => Some(self.upload(record, attempt).await.map(|_| ())),
                Ok(None) => None,
                Err(e) => Some(Err(e)),
            },
            RetryOp::Delete => match self.queues.deletions.contains(&id) {
                Ok(true) => Some(self.delete(&id, attempt).await.map(|_| ())),
                Ok(false) => None,
                Err(e) => Some(Err(e)),
            },
        };

        let event = match outcome {
            None => {
                debug!(%op, %id, "Entry gone; retry skipped");
                SyncEvent::RetrySkipped { op, id }
            }
            Some(Ok(())) => {
                info!(%op, %id, attempt, "Retry succeeded");
                SyncEvent::RetrySucceeded { op, id, attempt }
            }
            Some(Err(e)) => SyncEvent::RetryFailed {
                op,
                id,
                attempt,
                error: e.to_string(),
            },
        };
        self.publish(event);
    }

    #[instrument(skip(self))]
    async fn flush_pending(self: &Arc<Self>) -> FlushReport {
        let mut report = FlushReport::default();
        if !self.online() {
            return report;
        }

        let uploads = self.queues.uploads.load().unwrap_or_else(|e| {
            warn!(error = %e, "Could not read pending uploads");
            Vec::new()
        });
        let deletions = self.queues.deletions.load().unwrap_or_else(|e| {
            warn!(error = %e, "Could not read pending deletions");
            Vec::new()
        });

        if uploads.is_empty() && deletions.is_empty() {
            return report;
        }

        // Entries deleted between the load and registration are skipped.
        let uploads: Vec<_> = uploads
            .into_iter()
            .map(|record| (self.in_flight.begin(record.id()), record))
            .filter(|(_, record)| matches!(self.queues.uploads.contains(record.id()), Ok(true)))
            .collect();

        let upload_results = join_all(uploads.into_iter().map(|(ticket, record)| async move {
            let result = self.service.save(&record).await;
            (record, result, ticket)
        }));
        let delete_results = join_all(deletions.into_iter().map(|id| async move {
            let result = self.service.delete(&id).await;
            (id, result)
        }));
        let (upload_results, delete_results) = tokio::join!(upload_results, delete_results);

        for (record, result, ticket) in upload_results {
            let id = record.id().clone();
            let result = result.and_then(|saved| {
                self.remove_upload_if_unchanged(&record)?;
                Ok(saved)
            });

            if ticket.finish() {
                debug!(%id, "Deleted while flushing; removing it from the service");
                match self.delete(&id, 1).await {
                    Ok(_) => report.deleted.push(id),
                    Err(e) => report.failed.push(FlushFailure {
                        op: RetryOp::Delete,
                        id,
                        error: e.to_string(),
                    }),
                }
                continue;
            }

            match result {
                Ok(saved) => {
                    self.fetcher.record_saved(&saved);
                    report.uploaded.push(id);
                }
                Err(e) => {
                    warn!(%id, error = %e, "Pending upload not flushed");
                    report.failed.push(FlushFailure {
                        op: RetryOp::Upload,
                        id,
                        error: e.to_string(),
                    });
                }
            }
        }

        for (id, result) in delete_results {
            let confirmed = match result {
                Ok(_) => Ok(()),
                Err(e) if e.is_not_found() => Ok(()),
                Err(e) => Err(e),
            };
            match confirmed.and_then(|()| self.queues.deletions.remove(&id).map(|_| ())) {
                Ok(()) => {
                    self.fetcher.record_deleted(&id);
                    report.deleted.push(id);
                }
                Err(e) => {
                    warn!(%id, error = %e, "Pending deletion not flushed");
                    report.failed.push(FlushFailure {
                        op: RetryOp::Delete,
                        id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            uploaded = report.uploaded.len(),
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Flushed pending work"
        );
        self.publish(SyncEvent::Flushed(report.clone()));
        report
    }

    /// Remove the queued upload for `record` unless it was replaced by a
    /// newer version while the flush was in flight.
    fn remove_upload_if_unchanged(&self, record: &Record) -> Result<()> {
        match self.queues.uploads.get(record.id())? {
            Some(current) if current != *record => {
                debug!(id = %record.id(), "Queued upload changed during flush; keeping it");
                Ok(())
            }
            Some(_) => self.queues.uploads.remove(record.id()).map(|_| ()),
            None => Ok(()),
        }
    }
}

/// The deferred body of a retry. Holds only a weak reference to the engine,
/// so a retry that fires after the engine is gone does nothing.
fn retry_task<S>(engine: Weak<Inner<S>>, op: RetryOp, id: RecordId, attempt: u32) -> RetryTask
where
    S: RecordService + 'static,
{
    Box::pin(async move {
        let Some(inner) = engine.upgrade() else {
            return;
        };
        inner.run_retry(op, id, attempt).await;
    })
}

impl<S> std::fmt::Debug for SyncEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.inner.config)
            .field("queues", &self.inner.queues.root())
            .finish_non_exhaustive()
    }
}

