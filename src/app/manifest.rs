//! Manifest enumeration over a paginated page source
//!
//! [`ManifestEnumerator`] is a pure cursor state machine: it owns the current
//! [`PageCursor`], asks a [`PageSource`] for that page, and replaces the cursor
//! with the page's `next`. Enumeration ends when a page carries no next
//! cursor. A source that always reports a next page never terminates; this is
//! left unguarded.

use async_trait::async_trait;
use futures::stream::{self, Stream, TryStreamExt};
use tracing::{debug, info};

use crate::app::models::{ArtifactRecord, ManifestPage, PageCursor};
use crate::errors::{ManifestError, ManifestResult};

/// A source of manifest pages, addressed by cursor
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the page identified by `cursor`
    async fn fetch_page(&self, cursor: PageCursor) -> ManifestResult<ManifestPage>;
}

/// Statistics gathered while enumerating
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManifestStats {
    /// Pages fetched so far
    pub pages_fetched: usize,
    /// Records yielded so far
    pub records_seen: usize,
}

/// Sequential enumerator of manifest pages
pub struct ManifestEnumerator<S> {
    source: S,
    cursor: Option<PageCursor>,
    stats: ManifestStats,
}

impl<S: PageSource> ManifestEnumerator<S> {
    /// Start enumerating at the first page
    pub fn new(source: S) -> Self {
        Self {
            source,
            cursor: Some(PageCursor::first()),
            stats: ManifestStats::default(),
        }
    }

    /// Cursor of the page the next call will fetch
    pub fn cursor(&self) -> Option<PageCursor> {
        self.cursor
    }

    /// Whether the last page has been consumed
    pub fn is_finished(&self) -> bool {
        self.cursor.is_none()
    }

    /// Current enumeration statistics
    pub fn stats(&self) -> ManifestStats {
        self.stats
    }

    /// Fetch the next page of records, or `None` once enumeration is complete
    ///
    /// # Errors
    ///
    /// Returns the source's `ManifestError`. The cursor is left unchanged on
    /// error.
    pub async fn next_page(&mut self) -> ManifestResult<Option<Vec<ArtifactRecord>>> {
        let Some(cursor) = self.cursor else {
            return Ok(None);
        };

        let ManifestPage { records, next } = self.source.fetch_page(cursor).await?;

        self.cursor = next;
        self.stats.pages_fetched += 1;
        self.stats.records_seen += records.len();

        debug!(
            "Page {} yielded {} records ({} total)",
            cursor,
            records.len(),
            self.stats.records_seen
        );

        if self.cursor.is_none() {
            info!(
                "Manifest enumeration complete: {} records across {} pages",
                self.stats.records_seen, self.stats.pages_fetched
            );
        }

        Ok(Some(records))
    }

    /// Flatten all pages into a stream of records
    pub fn into_stream(self) -> impl Stream<Item = ManifestResult<ArtifactRecord>> {
        stream::try_unfold(self, |mut enumerator| async move {
            Ok(enumerator
                .next_page()
                .await?
                .map(|records| (records, enumerator)))
        })
        .map_ok(|records| stream::iter(records.into_iter().map(Ok::<_, ManifestError>)))
        .try_flatten()
    }
}

/// Collect every record of a manifest into memory
pub async fn collect_all_records<S: PageSource>(source: S) -> ManifestResult<Vec<ArtifactRecord>> {
    ManifestEnumerator::new(source).into_stream().try_collect().await
}
