//! The tracker seam: where work items, their links and their history come from.

use async_trait::async_trait;

use crate::error::FetchError;
use crate::model::{Revision, WorkItem};

/// Read access to a work item tracker.
///
/// Every failure is per item. Callers substitute placeholders or empty
/// lists and carry on.
#[async_trait]
pub trait WorkItemSource: Send + Sync {
    /// The item with all of its fields and relations.
    async fn fetch_item(&self, id: u64) -> Result<WorkItem, FetchError>;

    /// Items reachable through traversable links, each tagged with
    /// [`WorkItem::relationship`].
    async fn fetch_linked_items(&self, id: u64) -> Result<Vec<WorkItem>, FetchError>;

    /// Revisions in chronological order.
    async fn fetch_history(&self, id: u64) -> Result<Vec<Revision>, FetchError>;
}

#[async_trait]
impl<S: WorkItemSource + ?Sized> WorkItemSource for std::sync::Arc<S> {
    async fn fetch_item(&self, id: u64) -> Result<WorkItem, FetchError> {
        (**self).fetch_item(id).await
    }

    async fn fetch_linked_items(&self, id: u64) -> Result<Vec<WorkItem>, FetchError> {
        (**self).fetch_linked_items(id).await
    }

    async fn fetch_history(&self, id: u64) -> Result<Vec<Revision>, FetchError> {
        (**self).fetch_history(id).await
    }
}
