//! Streaming over scroll batches.

use std::collections::VecDeque;
use std::time::Duration;

use crate::client::DocumentStoreClient;
use crate::error::OdmResult;
use crate::mapping::Entity;
use crate::result::{SearchHit, SearchHits, TotalHits};

use super::DocumentOperations;

/// Yields every hit of a scroll, fetching the next batch when the current one is
/// drained.
///
/// The scroll context is released when the last batch comes back empty, or by
/// [`close`](Self::close). Dropping the iterator early leaves the context to expire
/// after its keep-alive.
#[derive(Debug)]
pub struct SearchHitsIterator<C, T> {
    ops: DocumentOperations<C>,
    buffer: VecDeque<SearchHit<T>>,
    scroll_id: Option<String>,
    keep_alive: Duration,
    total: Option<TotalHits>,
    finished: bool,
}

impl<C: DocumentStoreClient, T: Entity> SearchHitsIterator<C, T> {
    pub(crate) fn new(ops: DocumentOperations<C>, first: SearchHits<T>, keep_alive: Duration) -> Self {
        let finished = first.hits.is_empty();
        Self {
            ops,
            total: first.total,
            scroll_id: first.scroll_id,
            buffer: first.hits.into(),
            keep_alive,
            finished,
        }
    }

    /// Total matches reported by the first batch.
    pub fn total(&self) -> Option<TotalHits> {
        self.total
    }

    /// The next hit, or `None` when the scroll is exhausted.
    pub async fn next(&mut self) -> OdmResult<Option<SearchHit<T>>> {
        loop {
            if let Some(hit) = self.buffer.pop_front() {
                return Ok(Some(hit));
            }
            if self.finished {
                self.close().await?;
                return Ok(None);
            }
            let Some(scroll_id) = self.scroll_id.clone() else {
                self.finished = true;
                continue;
            };

            let batch = self.ops.scroll_continue::<T>(&scroll_id, self.keep_alive).await?;
            if batch.scroll_id.is_some() {
                self.scroll_id = batch.scroll_id;
            }
            self.finished = batch.hits.is_empty();
            self.buffer.extend(batch.hits);
        }
    }

    /// Drains the remaining hits into entities.
    pub async fn collect(mut self) -> OdmResult<Vec<T>> {
        let mut out = Vec::new();
        while let Some(hit) = self.next().await? {
            out.push(hit.content);
        }
        Ok(out)
    }

    /// Releases the scroll context. Safe to call more than once.
    pub async fn close(&mut self) -> OdmResult<()> {
        self.finished = true;
        self.buffer.clear();
        if let Some(scroll_id) = self.scroll_id.take() {
            self.ops.scroll_clear(&[scroll_id]).await?;
        }
        Ok(())
    }
}
