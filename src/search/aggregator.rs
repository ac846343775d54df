//! Fans one query out to the supplement and drug sources.
//!
//! Each source owns one slot of the published [`SearchSnapshot`] and only the
//! request that belongs to the current epoch may write it. A slow or failing
//! source never holds up or clears the other one.

use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::models::{DrugResult, SupplementResult};
use crate::search::filters::{SearchFilters, SupplementQuery};
use crate::search::providers::{DrugSource, SearchError, SupplementSource};
use crate::search::query::{drug_query, normalize};

/// Default bound on each source request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceState<T> {
    pub status: SourceStatus,
    pub results: Vec<T>,
}

impl<T> Default for SourceState<T> {
    fn default() -> Self {
        Self {
            status: SourceStatus::Idle,
            results: Vec::new(),
        }
    }
}

impl<T> SourceState<T> {
    pub fn is_loading(&self) -> bool {
        self.status == SourceStatus::Loading
    }

    fn loading() -> Self {
        Self {
            status: SourceStatus::Loading,
            results: Vec::new(),
        }
    }

    fn settle(&mut self, outcome: Result<Vec<T>, SearchError>) -> Option<SearchError> {
        match outcome {
            Ok(results) => {
                self.status = SourceStatus::Ready;
                self.results = results;
                None
            }
            Err(e) => {
                self.status = SourceStatus::Failed;
                self.results.clear();
                Some(e)
            }
        }
    }
}

/// Everything the presentation layer needs about the current search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchSnapshot {
    /// Raw text of the query this snapshot belongs to
    pub query: String,
    /// Bumped every time the query changes or the search is cleared
    pub epoch: u64,
    pub supplements: SourceState<SupplementResult>,
    pub drugs: SourceState<DrugResult>,
}

impl SearchSnapshot {
    pub fn is_idle(&self) -> bool {
        self.supplements.status == SourceStatus::Idle && self.drugs.status == SourceStatus::Idle
    }

    pub fn is_loading(&self) -> bool {
        self.supplements.is_loading() || self.drugs.is_loading()
    }
}

pub struct SearchAggregator<S, D> {
    supplements: S,
    drugs: D,
    timeout: Duration,
    filters: Mutex<SearchFilters>,
    state: watch::Sender<SearchSnapshot>,
}

impl<S, D> SearchAggregator<S, D>
where
    S: SupplementSource,
    D: DrugSource,
{
    pub fn new(supplements: S, drugs: D) -> Self {
        let (state, _) = watch::channel(SearchSnapshot::default());
        Self {
            supplements,
            drugs,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            filters: Mutex::new(SearchFilters::default()),
            state,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_filters(self, filters: SearchFilters) -> Self {
        *self.filters.lock() = filters;
        self
    }

    pub fn filters(&self) -> SearchFilters {
        self.filters.lock().clone()
    }

    /// Filters apply from the next search on
    pub fn set_filters(&self, filters: SearchFilters) {
        *self.filters.lock() = filters;
    }

    pub fn snapshot(&self) -> SearchSnapshot {
        self.state.borrow().clone()
    }

    /// Receive every state change
    pub fn subscribe(&self) -> watch::Receiver<SearchSnapshot> {
        self.state.subscribe()
    }

    /// Wait until neither source of the current search is loading
    pub async fn settled(&self) -> SearchSnapshot {
        let mut updates = self.state.subscribe();
        match updates.wait_for(|s| !s.is_loading()).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.snapshot(),
        }
    }

    /// Make responses of the current query stale without starting a new one
    pub fn invalidate(&self, raw: &str) -> u64 {
        let mut epoch = 0;
        self.state.send_modify(|s| {
            s.epoch += 1;
            s.query = raw.to_string();
            epoch = s.epoch;
        });
        epoch
    }

    /// Drop all results and report idle
    pub fn clear(&self) {
        self.state.send_modify(|s| {
            s.epoch += 1;
            s.query.clear();
            s.supplements = SourceState::default();
            s.drugs = SourceState::default();
        });
    }

    /// Run one search to completion. Errors are absorbed per source and end
    /// up in the snapshot as a failed, empty slot.
    pub async fn search(&self, raw: &str) {
        let supplement_q = normalize(raw);
        let drug_q = drug_query(raw);

        if supplement_q.is_empty() {
            self.clear();
            return;
        }

        let mut epoch = 0;
        self.state.send_modify(|s| {
            s.epoch += 1;
            s.query = raw.to_string();
            epoch = s.epoch;
            s.supplements = SourceState::loading();
            s.drugs = SourceState::loading();
        });
        debug!("Search #{} started: supplements={:?} drugs={:?}", epoch, supplement_q, drug_q);

        let query = SupplementQuery {
            q: supplement_q,
            filters: self.filters(),
        };

        let supplements = async {
            let outcome = self.bounded(self.supplements.search(&query)).await;
            self.apply(epoch, "supplements", |s| s.supplements.settle(outcome));
        };
        let drugs = async {
            let outcome = self.bounded(self.drugs.search(&drug_q)).await;
            self.apply(epoch, "drugs", |s| s.drugs.settle(outcome));
        };
        tokio::join!(supplements, drugs);
    }

    async fn bounded<T, F>(&self, request: F) -> Result<T, SearchError>
    where
        F: Future<Output = Result<T, SearchError>>,
    {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(outcome) => outcome,
            Err(_) => Err(SearchError::Timeout(self.timeout)),
        }
    }

    /// Write one source slot if `epoch` is still current
    fn apply<F>(&self, epoch: u64, source: &str, update: F)
    where
        F: FnOnce(&mut SearchSnapshot) -> Option<SearchError>,
    {
        let mut failure = None;
        let applied = self.state.send_if_modified(|s| {
            if s.epoch != epoch {
                return false;
            }
            failure = update(s);
            true
        });

        if !applied {
            debug!("Discarded stale {} response for search #{}", source, epoch);
        } else if let Some(e) = failure {
            warn!("{} search failed: {}", source, e);
        }
    }
}
