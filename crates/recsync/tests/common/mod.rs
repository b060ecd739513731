//! Shared helpers for engine tests: an in-memory record service with
//! scripted failures, and engine construction over temporary queues.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use recsync::{
    Cursor, Error, ManualConnectivity, Page, PendingQueues, Query, Record, RecordId,
    RecordMetadata, RecordService, Result, SyncConfig, SyncEngine,
};
use recsync_core::error::RemoteError;
use recsync_core::sort_records;
use tempfile::TempDir;
use tokio::sync::Notify;

/// A failure the mock service answers with.
#[derive(Debug, Clone, Copy)]
pub struct Failure {
    pub status: u16,
    pub retry_after: Option<Duration>,
}

impl Failure {
    /// 503 with a retry hint.
    pub fn unavailable(retry_after_secs: u64) -> Self {
        Self {
            status: 503,
            retry_after: Some(Duration::from_secs(retry_after_secs)),
        }
    }

    /// 500 with no hint.
    pub fn terminal() -> Self {
        Self {
            status: 500,
            retry_after: None,
        }
    }

    fn to_error(self) -> Error {
        let err = RemoteError::new(self.status, Some("Scripted".into()), None);
        match self.retry_after {
            Some(after) => Error::Remote(err.with_retry_after(after)),
            None => Error::Remote(err),
        }
    }
}

/// Holds one save inside the service until the test releases it.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    arrived: Arc<Notify>,
    release: Arc<Notify>,
}

impl Gate {
    /// Wait until the held save has reached the service.
    pub async fn arrived(&self) {
        self.arrived.notified().await;
    }

    /// Let the held save continue.
    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn pass(&self) {
        self.arrived.notify_one();
        self.release.notified().await;
    }
}

#[derive(Debug, Default)]
struct Script {
    once: VecDeque<Failure>,
    always: Option<Failure>,
}

impl Script {
    fn next(&mut self) -> Option<Failure> {
        self.once.pop_front().or(self.always)
    }
}

/// Call counters.
#[derive(Debug, Default)]
pub struct Calls {
    pub query: AtomicUsize,
    pub fetch_page: AtomicUsize,
    pub save: AtomicUsize,
    pub delete: AtomicUsize,
}

impl Calls {
    pub fn saves(&self) -> usize {
        self.save.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.delete.load(Ordering::SeqCst)
    }

    pub fn pages(&self) -> usize {
        self.query.load(Ordering::SeqCst) + self.fetch_page.load(Ordering::SeqCst)
    }
}

/// An in-memory record service. Cursors are offsets into the sorted result.
#[derive(Debug, Default)]
pub struct MockService {
    records: Mutex<BTreeMap<RecordId, Record>>,
    saves: Mutex<Script>,
    deletes: Mutex<Script>,
    pages: Mutex<Script>,
    held_saves: Mutex<VecDeque<Gate>>,
    tags: AtomicUsize,
    pub calls: Calls,
}

impl MockService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed `count` records of type `item` with ids `item-00`.. and field
    /// `rank` equal to their index.
    pub fn with_items(count: usize) -> Arc<Self> {
        let service = Self::default();
        {
            let mut records = service.records.lock().unwrap();
            for i in 0..count {
                let record = item(&format!("item-{:02}", i), i as i64);
                records.insert(record.id().clone(), service.stamp(record));
            }
        }
        Arc::new(service)
    }

    /// Hold the next save until the returned gate is released. Scripted
    /// failures apply after release.
    pub fn hold_next_save(&self) -> Gate {
        let gate = Gate::default();
        self.held_saves.lock().unwrap().push_back(gate.clone());
        gate
    }

    pub fn fail_next_saves(&self, n: usize, failure: Failure) {
        let mut script = self.saves.lock().unwrap();
        script.once.extend(std::iter::repeat_n(failure, n));
    }

    pub fn fail_all_saves(&self, failure: Failure) {
        self.saves.lock().unwrap().always = Some(failure);
    }

    pub fn fail_next_deletes(&self, n: usize, failure: Failure) {
        let mut script = self.deletes.lock().unwrap();
        script.once.extend(std::iter::repeat_n(failure, n));
    }

    pub fn fail_next_pages(&self, n: usize, failure: Failure) {
        let mut script = self.pages.lock().unwrap();
        script.once.extend(std::iter::repeat_n(failure, n));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records
            .lock()
            .unwrap()
            .contains_key(&RecordId::new(id).unwrap())
    }

    pub fn get(&self, id: &str) -> Option<Record> {
        self.records
            .lock()
            .unwrap()
            .get(&RecordId::new(id).unwrap())
            .cloned()
    }

    fn stamp(&self, mut record: Record) -> Record {
        let now = Utc::now();
        let tag = self.tags.fetch_add(1, Ordering::SeqCst);
        let created_at = record.metadata().map(|m| m.created_at).unwrap_or(now);
        record.set_metadata(Some(RecordMetadata {
            created_at,
            modified_at: now,
            change_tag: format!("tag-{}", tag),
        }));
        record
    }

    fn window(&self, query: &Query, offset: usize, limit: u32) -> Page {
        let mut matching: Vec<Record> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        sort_records(&mut matching, &query.sort);

        let end = (offset + limit as usize).min(matching.len());
        let records = matching[offset.min(end)..end].to_vec();
        let cursor = (end < matching.len()).then(|| encode_cursor(query, end));
        Page { records, cursor }
    }
}

fn encode_cursor(query: &Query, offset: usize) -> Cursor {
    let json = serde_json::to_string(&(query, offset)).unwrap();
    Cursor::new(json).unwrap()
}

fn decode_cursor(cursor: &Cursor) -> (Query, usize) {
    serde_json::from_str(cursor.as_str()).unwrap()
}

#[async_trait]
impl RecordService for MockService {
    async fn query(&self, query: &Query, limit: u32) -> Result<Page> {
        self.calls.query.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.pages.lock().unwrap().next() {
            return Err(failure.to_error());
        }
        Ok(self.window(query, 0, limit))
    }

    async fn fetch_page(&self, cursor: &Cursor, limit: u32) -> Result<Page> {
        self.calls.fetch_page.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.pages.lock().unwrap().next() {
            return Err(failure.to_error());
        }
        let (query, offset) = decode_cursor(cursor);
        Ok(self.window(&query, offset, limit))
    }

    async fn save(&self, record: &Record) -> Result<Record> {
        self.calls.save.fetch_add(1, Ordering::SeqCst);
        let gate = self.held_saves.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        if let Some(failure) = self.saves.lock().unwrap().next() {
            return Err(failure.to_error());
        }
        let previous = self.records.lock().unwrap().get(record.id()).cloned();
        let mut incoming = record.clone();
        incoming.set_metadata(previous.and_then(|p| p.metadata().cloned()));
        let stored = self.stamp(incoming);
        self.records
            .lock()
            .unwrap()
            .insert(stored.id().clone(), stored.clone());
        Ok(stored)
    }

    async fn delete(&self, id: &RecordId) -> Result<RecordId> {
        self.calls.delete.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.deletes.lock().unwrap().next() {
            return Err(failure.to_error());
        }
        match self.records.lock().unwrap().remove(id) {
            Some(_) => Ok(id.clone()),
            None => Err(Error::Remote(RemoteError::new(
                404,
                Some("RecordNotFound".into()),
                None,
            ))),
        }
    }
}

/// A record of type `item` with a `rank` field.
pub fn item(id: &str, rank: i64) -> Record {
    Record::with_id(RecordId::new(id).unwrap(), "item")
        .unwrap()
        .with("rank", rank)
        .unwrap()
}

pub fn id(s: &str) -> RecordId {
    RecordId::new(s).unwrap()
}

/// An engine plus the handles a test needs to steer it.
pub struct Harness {
    pub engine: SyncEngine<Arc<MockService>>,
    pub service: Arc<MockService>,
    pub connectivity: ManualConnectivity,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(service: Arc<MockService>, config: SyncConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let connectivity = ManualConnectivity::online();
        let queues = PendingQueues::open(dir.path().join("pending")).unwrap();
        let engine = SyncEngine::new(service.clone(), connectivity.clone(), queues, config);
        Self {
            engine,
            service,
            connectivity,
            dir,
        }
    }

    /// Default configuration without background flushing, so tests decide
    /// when pending work moves.
    pub fn quiet(service: Arc<MockService>) -> Self {
        Self::new(service, SyncConfig::new(10).with_flush_on_fetch(false))
    }

    pub fn go_offline(&self) {
        self.connectivity.set_available(false);
    }

    pub fn go_online(&self) {
        self.connectivity.set_available(true);
    }

    pub fn pending_ids(&self) -> Vec<String> {
        self.engine
            .pending_uploads()
            .unwrap()
            .iter()
            .map(|r| r.id().to_string())
            .collect()
    }
}
