use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::debounce::Debouncer;
use crate::search::aggregator::{SearchAggregator, SearchSnapshot};
use crate::search::providers::{DrugSource, SupplementSource};
use crate::search::query::normalize;

/// Quiet period between the last keystroke and the search
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(350);

/// Connects typed input to the aggregator, one search per pause in typing
pub struct SearchSession<S, D> {
    aggregator: Arc<SearchAggregator<S, D>>,
    debouncer: Debouncer,
    quiet: Duration,
    text: Mutex<String>,
}

impl<S, D> SearchSession<S, D>
where
    S: SupplementSource + 'static,
    D: DrugSource + 'static,
{
    pub fn new(aggregator: Arc<SearchAggregator<S, D>>) -> Self {
        Self {
            aggregator,
            debouncer: Debouncer::new(),
            quiet: DEFAULT_DEBOUNCE,
            text: Mutex::new(String::new()),
        }
    }

    pub fn with_quiet_period(mut self, quiet: Duration) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn aggregator(&self) -> &Arc<SearchAggregator<S, D>> {
        &self.aggregator
    }

    /// The search text changed
    pub fn input(&self, text: &str) {
        *self.text.lock() = text.to_string();

        if normalize(text).is_empty() {
            self.debouncer.cancel();
            self.aggregator.clear();
            return;
        }

        // responses for the previous text are stale from now on
        self.aggregator.invalidate(text);

        let aggregator = Arc::clone(&self.aggregator);
        let text = text.to_string();
        self.debouncer.schedule(self.quiet, async move {
            aggregator.search(&text).await;
        });
    }

    /// Search the current text right away (search button, pull to refresh)
    pub async fn submit(&self) {
        self.debouncer.cancel();
        let text = self.text.lock().clone();
        self.aggregator.search(&text).await;
    }

    /// Input is over. Runs a search still waiting out its quiet period, then
    /// waits for the current search to settle.
    pub async fn finish(&self) -> SearchSnapshot {
        if self.is_pending() {
            self.submit().await;
        }
        self.aggregator.settled().await
    }

    /// The search surface went away
    pub fn close(&self) {
        self.debouncer.cancel();
        self.text.lock().clear();
        self.aggregator.clear();
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }
}

impl<S, D> Drop for SearchSession<S, D> {
    fn drop(&mut self) {
        self.debouncer.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DrugResult, SupplementResult};
    use crate::search::aggregator::SourceStatus;
    use crate::search::filters::SupplementQuery;
    use crate::search::providers::SearchError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SupplementSource for Arc<Counting> {
        async fn search(&self, query: &SupplementQuery) -> Result<Vec<SupplementResult>, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![SupplementResult {
                id: query.q.clone(),
                full_name: None,
                brand_name: None,
                entry_date: None,
                product_type: None,
            }])
        }
    }

    struct NoDrugs;

    #[async_trait]
    impl DrugSource for NoDrugs {
        async fn search(&self, _query: &str) -> Result<Vec<DrugResult>, SearchError> {
            Ok(Vec::new())
        }
    }

    struct SlowDrugs(Duration);

    #[async_trait]
    impl DrugSource for SlowDrugs {
        async fn search(&self, query: &str) -> Result<Vec<DrugResult>, SearchError> {
            tokio::time::sleep(self.0).await;
            Ok(vec![DrugResult {
                id: query.to_string(),
                title: query.to_string(),
                ..Default::default()
            }])
        }
    }

    fn session() -> (SearchSession<Arc<Counting>, NoDrugs>, Arc<Counting>) {
        let counting = Arc::new(Counting::default());
        let aggregator = Arc::new(SearchAggregator::new(counting.clone(), NoDrugs));
        (SearchSession::new(aggregator), counting)
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_burst_searches_once() {
        let (session, counting) = session();
        for text in ["m", "ma", "mag", "magn"] {
            session.input(text);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
        let snap = session.aggregator().snapshot();
        assert_eq!(snap.query, "magn");
        assert_eq!(snap.supplements.results[0].id, "magn");
    }

    #[tokio::test(start_paused = true)]
    async fn test_clearing_text_goes_idle_without_searching() {
        let (session, counting) = session();
        session.input("zinc");
        session.input("  ");
        assert!(!session.is_pending());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
        assert!(session.aggregator().snapshot().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_pending_search() {
        let (session, counting) = session();
        session.input("iron");
        session.close();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
        assert!(session.aggregator().snapshot().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_skips_the_wait() {
        let (session, counting) = session();
        session.input("biotin");
        session.submit().await;

        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.aggregator().snapshot().supplements.status, SourceStatus::Ready);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_waits_for_search_already_running() {
        let counting = Arc::new(Counting::default());
        let aggregator = Arc::new(SearchAggregator::new(counting.clone(), SlowDrugs(Duration::from_secs(5))));
        let session = SearchSession::new(aggregator);

        session.input("iron");
        tokio::time::sleep(Duration::from_millis(400)).await;
        // the quiet period is over and the drug request is still out
        assert!(!session.is_pending());
        assert!(session.aggregator().snapshot().is_loading());

        let snap = session.finish().await;
        assert_eq!(snap.query, "iron");
        assert_eq!(snap.supplements.status, SourceStatus::Ready);
        assert_eq!(snap.drugs.status, SourceStatus::Ready);
        assert_eq!(snap.drugs.results[0].id, "iron");
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_runs_pending_search() {
        let (session, counting) = session();
        session.input("zinc");
        assert!(session.is_pending());

        let snap = session.finish().await;
        assert_eq!(snap.supplements.results[0].id, "zinc");
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }
}
