//! Cursor-driven paging over a record service.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, instrument};

use recsync_core::{Connectivity, Cursor, Error, Query, Record, RecordId, RecordService, Result};

/// Whether more pages may be available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchState {
    /// More records may follow; the next fetch continues (or restarts) the query.
    #[default]
    More,
    /// The result set is exhausted.
    None,
}

/// What one page call produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOutcome {
    /// Records the service returned in this page.
    pub fetched: usize,
    /// State after the page was applied.
    pub state: FetchState,
}

#[derive(Debug, Default)]
struct FetcherState {
    query: Option<Query>,
    cursor: Option<Cursor>,
    state: FetchState,
    accumulated: Vec<Record>,
    generation: u64,
}

impl FetcherState {
    /// Insert or replace by identity, keeping first-seen order.
    fn absorb(&mut self, record: Record) {
        match self.accumulated.iter_mut().find(|r| r.id() == record.id()) {
            Some(existing) => *existing = record,
            None => self.accumulated.push(record),
        }
    }
}

/// Drives a paged query and accumulates its results.
///
/// The lock guarding the state is never held across a service call; page
/// completions that belong to a superseded query, or that arrive after the
/// result set was found exhausted, are discarded.
#[derive(Debug, Default)]
pub struct PagedFetcher {
    state: Mutex<FetcherState>,
}

impl PagedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FetcherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new query, discarding the cursor and everything fetched.
    pub fn set_query(&self, query: Query) {
        let mut st = self.lock();
        st.query = Some(query);
        st.cursor = None;
        st.state = FetchState::More;
        st.accumulated.clear();
        st.generation += 1;
        debug!(generation = st.generation, "Query replaced");
    }

    pub fn query(&self) -> Option<Query> {
        self.lock().query.clone()
    }

    pub fn cursor(&self) -> Option<Cursor> {
        self.lock().cursor.clone()
    }

    pub fn state(&self) -> FetchState {
        self.lock().state
    }

    /// Every record fetched for the current query, in arrival order.
    pub fn accumulated(&self) -> Vec<Record> {
        self.lock().accumulated.clone()
    }

    /// Reflect a record the service just stored, if it belongs to the
    /// current query.
    pub(crate) fn record_saved(&self, record: &Record) {
        let mut st = self.lock();
        if st.query.as_ref().is_some_and(|q| q.matches(record)) {
            st.absorb(record.clone());
        }
    }

    /// Drop a record the service just deleted.
    pub(crate) fn record_deleted(&self, id: &RecordId) {
        self.lock().accumulated.retain(|r| r.id() != id);
    }

    /// Fetch one page of at most `interval` records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoQuery`] when neither a query nor a cursor is set,
    /// or the service's error, in which case the cursor and state are left
    /// as they were.
    #[instrument(skip(self, service, connectivity))]
    pub async fn next_page<S>(
        &self,
        service: &S,
        connectivity: &dyn Connectivity,
        interval: u32,
    ) -> Result<PageOutcome>
    where
        S: RecordService + ?Sized,
    {
        let (query, cursor, generation) = {
            let st = self.lock();
            if st.state == FetchState::None {
                debug!("Result set already exhausted");
                return Ok(PageOutcome {
                    fetched: 0,
                    state: FetchState::None,
                });
            }
            (st.query.clone(), st.cursor.clone(), st.generation)
        };

        let page = match (&cursor, &query) {
            (Some(cursor), _) => service.fetch_page(cursor, interval).await?,
            (None, Some(query)) => service.query(query, interval).await?,
            (None, None) => return Err(Error::NoQuery),
        };

        let mut st = self.lock();
        if st.generation != generation || st.state == FetchState::None {
            debug!("Discarding stale page");
            return Ok(PageOutcome {
                fetched: 0,
                state: st.state,
            });
        }

        let fetched = page.records.len();
        for record in page.records {
            st.absorb(record);
        }

        match page.cursor {
            Some(next) => {
                st.cursor = Some(next);
                st.state = FetchState::More;
            }
            None if connectivity.is_available() => {
                st.cursor = None;
                st.state = FetchState::None;
            }
            None => {
                debug!("No cursor while offline; the next fetch re-queries");
                st.cursor = None;
                st.state = FetchState::More;
            }
        }

        debug!(fetched, state = ?st.state, "Applied page");
        Ok(PageOutcome {
            fetched,
            state: st.state,
        })
    }
}
