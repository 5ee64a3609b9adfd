//! Collapsible archived column, fetched lazily one page at a time.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, instrument, warn};

use crate::api::TaskBackend;
use crate::organizer::{BucketStyle, ViewMode, column_style};
use crate::tabs::{TaskTab, filter_tasks};
use crate::task::{CurrentUser, Status, Task};

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Count shown on the column header. `loaded`/`total` is only set while
/// further pages remain on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveBadge {
    pub count: usize,
    pub progress: Option<(usize, usize)>,
}

impl fmt::Display for ArchiveBadge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.progress {
            Some((loaded, total)) => write!(f, "{} ({loaded}/{total})", self.count),
            None => write!(f, "{}", self.count),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArchivedColumn {
    page_size: u32,
    expanded: bool,
    loaded: bool,
    pages_loaded: u32,
    /// Set once the server has no rows past the last page read.
    exhausted: bool,
    items: Vec<Task>,
    total: usize,
}

impl ArchivedColumn {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            expanded: false,
            loaded: false,
            pages_loaded: 0,
            exhausted: false,
            items: vec![],
            total: 0,
        }
    }

    pub fn style(&self) -> BucketStyle {
        column_style(&ViewMode::Status, Status::Archived.as_str())
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn items(&self) -> &[Task] {
        &self.items
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn pages_loaded(&self) -> u32 {
        self.pages_loaded
    }

    /// De-duplication can keep `items` short of `total` forever when
    /// pages shift, so the page arithmetic also bounds this.
    pub fn has_more(&self) -> bool {
        !self.exhausted && self.items.len() < self.total
    }

    /// Flips the expanded state. Expanding fetches page 1 unless something
    /// was already loaded since the last reset.
    #[instrument(skip_all, fields(expanded = !self.expanded))]
    pub async fn toggle<B: TaskBackend>(&mut self, backend: &B) -> bool {
        self.expanded = !self.expanded;
        if self.expanded && !self.loaded {
            self.fetch(backend, 1).await;
        }
        self.expanded
    }

    /// Fetches the next page when the server reported more than is loaded.
    /// Returns how many tasks were appended.
    #[instrument(skip_all, fields(loaded = self.items.len(), total = self.total))]
    pub async fn load_more<B: TaskBackend>(&mut self, backend: &B) -> usize {
        if !self.has_more() {
            debug!("nothing more to load");
            return 0;
        }
        self.fetch(backend, self.pages_loaded + 1).await
    }

    /// Drops every loaded page; the next expansion fetches again.
    pub fn reset(&mut self) {
        self.loaded = false;
        self.pages_loaded = 0;
        self.exhausted = false;
        self.items.clear();
        self.total = 0;
    }

    pub fn visible(&self, tab: TaskTab, user: Option<&CurrentUser>) -> Vec<Task> {
        filter_tasks(&self.items, tab, user)
    }

    pub fn badge(&self, tab: TaskTab, user: Option<&CurrentUser>) -> ArchiveBadge {
        ArchiveBadge {
            count: self.visible(tab, user).len(),
            progress: self.has_more().then_some((self.items.len(), self.total)),
        }
    }

    async fn fetch<B: TaskBackend>(&mut self, backend: &B, page: u32) -> usize {
        match backend.archived_page(page, self.page_size).await {
            Ok(result) => {
                let rows = result.items.len();
                let seen = u64::from(page) * u64::from(self.page_size);
                self.exhausted = rows < self.page_size as usize || seen >= result.total as u64;

                // Pages can shift when tasks are archived between requests.
                let known: BTreeSet<_> = self.items.iter().map(|t| t.id).collect();
                let before = self.items.len();
                self.items
                    .extend(result.items.into_iter().filter(|t| !known.contains(&t.id)));
                self.total = result.total;
                self.pages_loaded = page;
                self.loaded = true;
                let appended = self.items.len() - before;
                debug!(
                    page,
                    rows,
                    appended,
                    total = self.total,
                    exhausted = self.exhausted,
                    "archived page loaded"
                );
                appended
            }
            Err(err) => {
                warn!(page, error = %err, "failed to load archived tasks");
                0
            }
        }
    }
}

impl Default for ArchivedColumn {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockBackend;
    use crate::task::{TaskId, UserId};

    fn archived(id: u64) -> Task {
        let mut t = Task::new(TaskId(id), format!("old {id}"), UserId(1));
        t.status = Status::Archived;
        t
    }

    fn backend(count: u64) -> MockBackend {
        MockBackend::with_archived((1..=count).map(archived).collect())
    }

    #[tokio::test]
    async fn first_expansion_fetches_once() {
        let backend = backend(3);
        let mut column = ArchivedColumn::new(2);

        assert!(column.toggle(&backend).await);
        assert_eq!(backend.archived_requests(), vec![(1, 2)]);
        assert_eq!(column.items().len(), 2);

        assert!(!column.toggle(&backend).await);
        assert!(column.toggle(&backend).await);
        assert_eq!(backend.archived_requests().len(), 1);
    }

    #[tokio::test]
    async fn load_more_appends_until_total() {
        let backend = backend(3);
        let mut column = ArchivedColumn::new(2);
        column.toggle(&backend).await;
        assert!(column.has_more());
        assert_eq!(
            column.badge(TaskTab::Mine, None),
            ArchiveBadge {
                count: 2,
                progress: Some((2, 3))
            }
        );

        assert_eq!(column.load_more(&backend).await, 1);
        assert_eq!(column.pages_loaded(), 2);
        assert!(!column.has_more());

        assert_eq!(column.load_more(&backend).await, 0);
        assert_eq!(backend.archived_requests(), vec![(1, 2), (2, 2)]);
        assert_eq!(column.badge(TaskTab::Mine, None).to_string(), "3");
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_pages() {
        let backend = backend(3);
        let mut column = ArchivedColumn::new(2);
        column.toggle(&backend).await;

        backend.fail_next("archived");
        assert_eq!(column.load_more(&backend).await, 0);
        assert_eq!(column.items().len(), 2);
        assert!(column.has_more());
    }

    #[tokio::test]
    async fn shifted_pages_still_end_load_more() {
        let backend = backend(5);
        let mut column = ArchivedColumn::new(2);
        column.toggle(&backend).await;

        backend.archive_now(archived(9));
        let mut appended = 0;
        for _ in 0..6 {
            appended += column.load_more(&backend).await;
        }

        assert_eq!(appended, 3);
        assert_eq!(column.items().len(), 5);
        assert_eq!(column.total(), 6);
        assert!(!column.has_more());
        assert_eq!(backend.archived_requests(), vec![(1, 2), (2, 2), (3, 2)]);
        assert_eq!(column.badge(TaskTab::Mine, None).progress, None);
    }

    #[tokio::test]
    async fn reset_forces_refetch_on_next_expansion() {
        let backend = backend(1);
        let mut column = ArchivedColumn::new(5);
        column.toggle(&backend).await;
        column.toggle(&backend).await;

        column.reset();
        assert!(column.items().is_empty());
        column.toggle(&backend).await;
        assert_eq!(backend.archived_requests().len(), 2);
    }
}
