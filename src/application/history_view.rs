//! History façade.
//!
//! Thin pass-through to the history storage; every mutation notifies
//! history listeners once the storage call returns.

use std::sync::Arc;

use crate::domain::{PageObservation, Result, VisitInfo, VisitType};

use super::collaborators::HistoryStorage;
use super::dispatcher::{DeliveryContext, EventDispatcher};
use super::listeners::HistoryListener;
use super::sync_bridge::SyncRefresh;

pub struct HistoryView {
    storage: Arc<dyn HistoryStorage>,
    listeners: EventDispatcher<dyn HistoryListener>,
}

impl HistoryView {
    #[must_use]
    pub fn new(storage: Arc<dyn HistoryStorage>, context: DeliveryContext) -> Self {
        Self {
            storage,
            listeners: EventDispatcher::new("history", context),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn HistoryListener>) {
        self.listeners.register(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn HistoryListener>) {
        self.listeners.unregister(listener);
    }

    pub fn remove_all_listeners(&self) {
        self.listeners.clear();
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Every visited URL.
    ///
    /// # Errors
    /// Returns error if the storage query fails.
    pub async fn get_history(&self) -> Result<Vec<String>> {
        self.storage.get_visited().await
    }

    /// All real visits, newest first. Redirects and bookkeeping entries are left out.
    ///
    /// # Errors
    /// Returns error if the storage query fails.
    pub async fn get_detailed_history(&self) -> Result<Vec<VisitInfo>> {
        self.storage
            .get_detailed_visits(0, &VisitType::HIDDEN)
            .await
    }

    /// # Errors
    /// Returns error if the storage write fails.
    pub async fn record_visit(&self, url: &str, visit_type: VisitType) -> Result<()> {
        self.storage.record_visit(url, visit_type).await?;
        tracing::debug!(url = %url, ?visit_type, "Visit recorded");
        self.notify_updated();
        Ok(())
    }

    /// # Errors
    /// Returns error if the storage write fails.
    pub async fn record_observation(&self, url: &str, observation: &PageObservation) -> Result<()> {
        self.storage.record_observation(url, observation).await?;
        self.notify_updated();
        Ok(())
    }

    /// # Errors
    /// Returns error if the storage delete fails.
    pub async fn delete_by_url_and_timestamp(&self, url: &str, timestamp: i64) -> Result<()> {
        self.storage.delete_visit(url, timestamp).await?;
        self.notify_updated();
        Ok(())
    }

    /// # Errors
    /// Returns error if the storage delete fails.
    pub async fn delete_all_visits_for(&self, url: &str) -> Result<()> {
        self.storage.delete_visits_for(url).await?;
        tracing::info!(url = %url, "Deleted all visits for url");
        self.notify_updated();
        Ok(())
    }

    /// # Errors
    /// Returns error if the storage delete fails.
    pub async fn delete_everything(&self) -> Result<()> {
        self.storage.delete_everything().await?;
        tracing::info!("History cleared");
        self.notify_updated();
        Ok(())
    }

    /// # Errors
    /// Returns error if the storage delete fails.
    pub async fn delete_visits_since(&self, since: i64) -> Result<()> {
        self.storage.delete_visits_since(since).await?;
        self.notify_updated();
        Ok(())
    }

    /// # Errors
    /// Returns error if the storage delete fails.
    pub async fn delete_visits_between(&self, start: i64, end: i64) -> Result<()> {
        self.storage.delete_visits_between(start, end).await?;
        self.notify_updated();
        Ok(())
    }

    /// Whether each URL was visited, in input order.
    ///
    /// # Errors
    /// Returns error if the storage query fails.
    pub async fn get_visited(&self, urls: &[String]) -> Result<Vec<bool>> {
        self.storage.get_visited_for(urls).await
    }

    /// # Errors
    /// Returns error if the storage query fails.
    pub async fn is_in_history(&self, url: &str) -> Result<bool> {
        let visited = self.get_visited(&[url.to_string()]).await?;
        Ok(visited.first().copied().unwrap_or(false))
    }

    fn notify_updated(&self) {
        self.listeners.dispatch(|l| l.on_history_updated());
    }
}

impl SyncRefresh for HistoryView {
    fn on_sync_finished(&self) {
        self.notify_updated();
    }
}

#[cfg(test)]
mod tests {
    use tokio::runtime::Handle;

    use super::*;
    use crate::application::dispatcher::MainLoop;
    use crate::application::testing::{MemoryHistory, RecordingListener};

    fn view() -> (HistoryView, Arc<MemoryHistory>, MainLoop) {
        let (context, main_loop) = DeliveryContext::new(Handle::current());
        let storage = Arc::new(MemoryHistory::default());
        (HistoryView::new(storage.clone(), context), storage, main_loop)
    }

    #[tokio::test]
    async fn test_detailed_history_hides_redirects_and_non_visits() {
        let (view, storage, _main) = view();
        view.record_visit("https://a.example", VisitType::Link).await.unwrap();
        view.record_visit("https://b.example", VisitType::RedirectTemporary).await.unwrap();
        view.record_visit("https://c.example", VisitType::NotAVisit).await.unwrap();
        view.record_visit("https://d.example", VisitType::Typed).await.unwrap();

        let visits = view.get_detailed_history().await.unwrap();

        let urls: Vec<&str> = visits.iter().map(|v| v.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.example", "https://d.example"]);
        let (start, excluded) = storage.last_exclude().unwrap();
        assert_eq!(start, 0);
        assert_eq!(excluded.len(), 3);
        assert!(excluded.contains(&VisitType::RedirectPermanent));
    }

    #[tokio::test]
    async fn test_every_mutation_notifies_once() {
        let (view, storage, mut main_loop) = view();
        let listener = RecordingListener::new();
        view.add_listener(listener.clone());

        view.record_visit("https://a.example", VisitType::Link).await.unwrap();
        view.record_observation(
            "https://a.example",
            &PageObservation {
                title: Some("A".to_string()),
            },
        )
        .await
        .unwrap();
        view.delete_by_url_and_timestamp("https://a.example", 1).await.unwrap();
        view.delete_all_visits_for("https://a.example").await.unwrap();
        view.delete_visits_since(10).await.unwrap();
        view.delete_visits_between(1, 5).await.unwrap();
        view.delete_everything().await.unwrap();

        assert_eq!(main_loop.run_until_idle(), 7);
        assert_eq!(listener.events().len(), 7);
        assert_eq!(
            storage.calls(),
            vec![
                "record_visit https://a.example",
                "record_observation https://a.example",
                "delete_visit https://a.example 1",
                "delete_visits_for https://a.example",
                "delete_visits_since 10",
                "delete_visits_between 1 5",
                "delete_everything",
            ]
        );
    }

    #[tokio::test]
    async fn test_queries_do_not_notify() {
        let (view, _, mut main_loop) = view();
        let listener = RecordingListener::new();
        view.add_listener(listener.clone());

        view.get_history().await.unwrap();
        view.get_detailed_history().await.unwrap();
        view.is_in_history("https://a.example").await.unwrap();

        assert_eq!(main_loop.run_until_idle(), 0);
    }

    #[tokio::test]
    async fn test_visited_lookup() {
        let (view, _, _main) = view();
        view.record_visit("https://a.example", VisitType::Link).await.unwrap();

        let visited = view
            .get_visited(&["https://b.example".to_string(), "https://a.example".to_string()])
            .await
            .unwrap();
        assert_eq!(visited, vec![false, true]);

        assert!(view.is_in_history("https://a.example").await.unwrap());
        assert!(!view.is_in_history("https://b.example").await.unwrap());
        assert_eq!(view.get_history().await.unwrap(), vec!["https://a.example"]);
    }

    #[tokio::test]
    async fn test_sync_finished_notifies_without_touching_storage() {
        let (view, storage, mut main_loop) = view();
        let listener = RecordingListener::new();
        view.add_listener(listener.clone());

        view.on_sync_finished();

        main_loop.run_until_idle();
        assert_eq!(listener.events(), vec!["history updated"]);
        assert!(storage.calls().is_empty());
    }
}
