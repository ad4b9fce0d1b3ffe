//! Bookmark tree as the UI sees it.
//!
//! The UI starts at the mobile root. The desktop roots (menu, toolbar,
//! unfiled) are reached through a synthesized "desktop" folder that only
//! exists in the children returned for the mobile root.

use std::sync::Arc;

use crate::domain::{
    BookmarkNode, Result, RootTitles, DESKTOP_ROOT_GUID, MENU_ROOT_GUID, MOBILE_ROOT_GUID,
    ROOT_GUID, TOOLBAR_ROOT_GUID, UNFILED_ROOT_GUID,
};

use super::collaborators::BookmarkStorage;
use super::dispatcher::{DeliveryContext, EventDispatcher};
use super::listeners::BookmarkListener;
use super::sync_bridge::SyncRefresh;

/// GUIDs the UI must never offer to delete.
const ROOT_GUIDS: [&str; 5] = [
    DESKTOP_ROOT_GUID,
    MOBILE_ROOT_GUID,
    UNFILED_ROOT_GUID,
    TOOLBAR_ROOT_GUID,
    MENU_ROOT_GUID,
];

/// Virtualized view over the bookmark storage.
pub struct BookmarkTreeView {
    storage: Arc<dyn BookmarkStorage>,
    titles: RootTitles,
    listeners: EventDispatcher<dyn BookmarkListener>,
}

impl BookmarkTreeView {
    #[must_use]
    pub fn new(
        storage: Arc<dyn BookmarkStorage>,
        titles: RootTitles,
        context: DeliveryContext,
    ) -> Self {
        Self {
            storage,
            titles,
            listeners: EventDispatcher::new("bookmarks", context),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn BookmarkListener>) {
        self.listeners.register(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn BookmarkListener>) {
        self.listeners.unregister(listener);
    }

    pub fn remove_all_listeners(&self) {
        self.listeners.clear();
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Children of `guid` as presented to the UI.
    ///
    /// # Errors
    /// Returns error if the storage lookup fails.
    pub async fn get_children(&self, guid: &str) -> Result<Vec<BookmarkNode>> {
        match guid {
            MOBILE_ROOT_GUID => {
                let mut children = vec![self.desktop_folder()];
                children.extend(self.stored_children(MOBILE_ROOT_GUID).await?);
                Ok(children)
            }
            DESKTOP_ROOT_GUID => Ok(self
                .stored_children(ROOT_GUID)
                .await?
                .into_iter()
                .filter(|node| node.guid != MOBILE_ROOT_GUID)
                .map(|mut node| {
                    node.title = self.titles.title_for(&node.guid).map(str::to_string);
                    node
                })
                .collect()),
            _ => self.stored_children(guid).await,
        }
    }

    /// Add a bookmark at the end of the mobile root and return its GUID.
    ///
    /// # Errors
    /// Returns error if the storage insert fails.
    pub async fn add_bookmark(&self, url: &str, title: &str) -> Result<String> {
        let guid = self
            .storage
            .add_item(MOBILE_ROOT_GUID, url, title, None)
            .await?;
        tracing::info!(guid = %guid, url = %url, "Bookmark added");
        self.listeners.dispatch(|l| l.on_bookmark_added());
        Ok(guid)
    }

    /// Delete the first bookmark whose URL is exactly `url`.
    ///
    /// Other bookmarks with the same URL are left alone. Listeners are
    /// notified even when nothing matched. Returns whether one was deleted.
    ///
    /// # Errors
    /// Returns error if the storage lookup or delete fails.
    pub async fn delete_by_url(&self, url: &str) -> Result<bool> {
        let deleted = match self.find_by_url(url).await? {
            Some(node) => {
                tracing::info!(guid = %node.guid, url = %url, "Deleting bookmark");
                self.storage.delete_node(&node.guid).await?
            }
            None => {
                tracing::debug!(url = %url, "No bookmark to delete");
                false
            }
        };
        self.notify_updated();
        Ok(deleted)
    }

    /// Delete a node by GUID.
    ///
    /// # Errors
    /// Returns error if the storage delete fails.
    pub async fn delete_by_id(&self, guid: &str) -> Result<bool> {
        let deleted = self.storage.delete_node(guid).await?;
        tracing::info!(guid = %guid, deleted, "Bookmark node deleted");
        self.notify_updated();
        Ok(deleted)
    }

    /// # Errors
    /// Returns error if the storage lookup fails.
    pub async fn is_bookmarked(&self, url: &str) -> Result<bool> {
        Ok(self.find_by_url(url).await?.is_some())
    }

    /// True for the built-in roots, which must NOT be deleted.
    ///
    /// The name reads backwards; UI code depends on this polarity.
    #[must_use]
    pub fn guid_allows_deletion(guid: &str) -> bool {
        ROOT_GUIDS.contains(&guid)
    }

    fn notify_updated(&self) {
        self.listeners.dispatch(|l| l.on_bookmarks_updated());
    }

    fn desktop_folder(&self) -> BookmarkNode {
        BookmarkNode::folder(
            DESKTOP_ROOT_GUID,
            Some(MOBILE_ROOT_GUID.to_string()),
            Some(self.titles.desktop.clone()),
        )
    }

    async fn stored_children(&self, guid: &str) -> Result<Vec<BookmarkNode>> {
        Ok(self
            .storage
            .get_tree(guid)
            .await?
            .and_then(|node| node.children)
            .unwrap_or_default())
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<BookmarkNode>> {
        Ok(self
            .storage
            .get_bookmarks_with_url(url)
            .await?
            .into_iter()
            .find(|node| node.url.as_deref() == Some(url)))
    }
}

impl SyncRefresh for BookmarkTreeView {
    fn on_sync_finished(&self) {
        self.notify_updated();
    }
}
