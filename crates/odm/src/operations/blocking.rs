//! Blocking facade over [`DocumentOperations`].
//!
//! Every call runs to completion on a private current-thread runtime. The
//! facade, its index operations, its scroll iterator and
//! [`BlockingRepository`](crate::repository::BlockingRepository) share one
//! runtime.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::runtime::{Builder, Runtime};

use crate::client::DocumentStoreClient;
use crate::error::{OdmResult, TransportError};
use crate::mapping::Entity;
use crate::query::QueryPlan;
use crate::repository::{BlockingRepository, Repository};
use crate::result::{QueryResult, ResultKind, SearchHit, SearchHits, TotalHits};
use crate::schema::IndexSchema;

use super::{BulkOperation, BulkOutcome, BulkSave, DocumentOperations, IndexOperations, SearchHitsIterator};

pub(crate) fn blocking_runtime() -> OdmResult<Arc<Runtime>> {
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TransportError::with_source("failed to start blocking runtime", e))?;
    Ok(Arc::new(runtime))
}

/// Runs document operations to completion on a private current-thread runtime.
///
/// Must not be used from within an async context; calling it from a runtime worker
/// panics inside tokio.
#[derive(Debug)]
pub struct BlockingOperations<C> {
    inner: DocumentOperations<C>,
    runtime: Arc<Runtime>,
}

impl<C: DocumentStoreClient> BlockingOperations<C> {
    /// Wraps non-blocking operations.
    pub fn new(inner: DocumentOperations<C>) -> OdmResult<Self> {
        Ok(Self {
            inner,
            runtime: blocking_runtime()?,
        })
    }

    /// The wrapped operations.
    pub fn inner(&self) -> &DocumentOperations<C> {
        &self.inner
    }

    /// A blocking repository for `T` sharing this facade's runtime.
    pub fn repository<T: Entity>(&self) -> OdmResult<BlockingRepository<T, C>> {
        let repository = Repository::new(self.inner.clone())?;
        Ok(BlockingRepository::with_runtime(repository, self.runtime.clone()))
    }

    /// Blocking index operations for `T`.
    pub fn index_ops<T: Entity>(&self) -> OdmResult<BlockingIndexOperations<'_, C>> {
        Ok(BlockingIndexOperations {
            inner: self.inner.index_ops::<T>()?,
            runtime: &self.runtime,
        })
    }

    /// See [`DocumentOperations::save`].
    pub fn save<T: Entity>(&self, entity: &T) -> OdmResult<T> {
        self.runtime.block_on(self.inner.save(entity))
    }

    /// See [`DocumentOperations::save_all`].
    pub fn save_all<T: Entity>(&self, entities: &[T]) -> OdmResult<BulkSave<T>> {
        self.runtime.block_on(self.inner.save_all(entities))
    }

    /// See [`DocumentOperations::bulk`].
    pub fn bulk(&self, operations: Vec<BulkOperation>) -> OdmResult<BulkOutcome> {
        self.runtime.block_on(self.inner.bulk(operations))
    }

    /// See [`DocumentOperations::get`].
    pub fn get<T: Entity>(&self, id: &str, routing: Option<&str>) -> OdmResult<Option<T>> {
        self.runtime.block_on(self.inner.get(id, routing))
    }

    /// See [`DocumentOperations::get_all`].
    pub fn get_all<T: Entity>(&self, ids: &[String]) -> OdmResult<Vec<T>> {
        self.runtime.block_on(self.inner.get_all(ids))
    }

    /// See [`DocumentOperations::exists`].
    pub fn exists<T: Entity>(&self, id: &str, routing: Option<&str>) -> OdmResult<bool> {
        self.runtime.block_on(self.inner.exists::<T>(id, routing))
    }

    /// See [`DocumentOperations::delete`].
    pub fn delete<T: Entity>(&self, id: &str, routing: Option<&str>) -> OdmResult<bool> {
        self.runtime.block_on(self.inner.delete::<T>(id, routing))
    }

    /// See [`DocumentOperations::delete_entity`].
    pub fn delete_entity<T: Entity>(&self, entity: &T) -> OdmResult<bool> {
        self.runtime.block_on(self.inner.delete_entity(entity))
    }

    /// See [`DocumentOperations::search`].
    pub fn search<T: Entity>(&self, plan: &QueryPlan) -> OdmResult<SearchHits<T>> {
        self.runtime.block_on(self.inner.search(plan))
    }

    /// See [`DocumentOperations::search_as`].
    pub fn search_as<T: Entity>(&self, plan: &QueryPlan, kind: &ResultKind) -> OdmResult<QueryResult<T>> {
        self.runtime.block_on(self.inner.search_as(plan, kind))
    }

    /// See [`DocumentOperations::count`].
    pub fn count<T: Entity>(&self, plan: &QueryPlan) -> OdmResult<u64> {
        self.runtime.block_on(self.inner.count::<T>(plan))
    }

    /// See [`DocumentOperations::delete_by_query`].
    pub fn delete_by_query<T: Entity>(&self, plan: &QueryPlan) -> OdmResult<u64> {
        self.runtime.block_on(self.inner.delete_by_query::<T>(plan))
    }

    /// See [`DocumentOperations::scroll_start`].
    pub fn scroll_start<T: Entity>(&self, plan: &QueryPlan, keep_alive: Duration) -> OdmResult<SearchHits<T>> {
        self.runtime.block_on(self.inner.scroll_start(plan, keep_alive))
    }

    /// See [`DocumentOperations::scroll_continue`].
    pub fn scroll_continue<T: Entity>(&self, scroll_id: &str, keep_alive: Duration) -> OdmResult<SearchHits<T>> {
        self.runtime.block_on(self.inner.scroll_continue(scroll_id, keep_alive))
    }

    /// See [`DocumentOperations::scroll_clear`].
    pub fn scroll_clear(&self, scroll_ids: &[String]) -> OdmResult<()> {
        self.runtime.block_on(self.inner.scroll_clear(scroll_ids))
    }

    /// Streams every hit of a plan through scroll batches.
    pub fn stream<T: Entity>(&self, plan: &QueryPlan) -> OdmResult<BlockingSearchHitsIterator<'_, C, T>> {
        let inner = self.runtime.block_on(self.inner.stream(plan))?;
        Ok(BlockingSearchHitsIterator {
            inner,
            runtime: &self.runtime,
            failed: false,
        })
    }

    /// See [`DocumentOperations::open_point_in_time`].
    pub fn open_point_in_time<T: Entity>(&self, keep_alive: Duration) -> OdmResult<String> {
        self.runtime.block_on(self.inner.open_point_in_time::<T>(keep_alive))
    }

    /// See [`DocumentOperations::close_point_in_time`].
    pub fn close_point_in_time(&self, id: &str) -> OdmResult<bool> {
        self.runtime.block_on(self.inner.close_point_in_time(id))
    }

    /// Creates `T`'s index if needed. See [`IndexOperations::create_if_needed`].
    pub fn create_index_if_needed<T: Entity>(&self) -> OdmResult<bool> {
        self.index_ops::<T>()?.create_if_needed()
    }
}

/// Blocking form of [`IndexOperations`].
#[derive(Debug)]
pub struct BlockingIndexOperations<'a, C> {
    inner: IndexOperations<'a, C>,
    runtime: &'a Runtime,
}

impl<C: DocumentStoreClient> BlockingIndexOperations<'_, C> {
    /// The resolved index name.
    pub fn index_name(&self) -> &str {
        self.inner.index_name()
    }

    /// See [`IndexOperations::schema`].
    pub fn schema(&self) -> OdmResult<IndexSchema> {
        self.inner.schema()
    }

    /// See [`IndexOperations::exists`].
    pub fn exists(&self) -> OdmResult<bool> {
        self.runtime.block_on(self.inner.exists())
    }

    /// See [`IndexOperations::create`].
    pub fn create(&self) -> OdmResult<bool> {
        self.runtime.block_on(self.inner.create())
    }

    /// See [`IndexOperations::create_with`].
    pub fn create_with(&self, body: Value) -> OdmResult<bool> {
        self.runtime.block_on(self.inner.create_with(body))
    }

    /// See [`IndexOperations::create_if_needed`].
    pub fn create_if_needed(&self) -> OdmResult<bool> {
        self.runtime.block_on(self.inner.create_if_needed())
    }

    /// See [`IndexOperations::put_mapping`].
    pub fn put_mapping(&self) -> OdmResult<()> {
        self.runtime.block_on(self.inner.put_mapping())
    }

    /// See [`IndexOperations::get_mapping`].
    pub fn get_mapping(&self) -> OdmResult<Value> {
        self.runtime.block_on(self.inner.get_mapping())
    }

    /// See [`IndexOperations::delete`].
    pub fn delete(&self) -> OdmResult<bool> {
        self.runtime.block_on(self.inner.delete())
    }

    /// See [`IndexOperations::refresh`].
    pub fn refresh(&self) -> OdmResult<()> {
        self.runtime.block_on(self.inner.refresh())
    }
}

/// Blocking form of [`SearchHitsIterator`].
///
/// Yields each hit as a `Result`. After the first error the iterator is fused.
/// The scroll context is released once the last batch comes back empty or on
/// [`close`](Self::close).
#[derive(Debug)]
pub struct BlockingSearchHitsIterator<'a, C, T> {
    inner: SearchHitsIterator<C, T>,
    runtime: &'a Runtime,
    failed: bool,
}

impl<C: DocumentStoreClient, T: Entity> BlockingSearchHitsIterator<'_, C, T> {
    /// Total matches reported by the first batch.
    pub fn total(&self) -> Option<TotalHits> {
        self.inner.total()
    }

    /// Releases the scroll context. Safe to call more than once.
    pub fn close(&mut self) -> OdmResult<()> {
        self.runtime.block_on(self.inner.close())
    }
}

impl<C: DocumentStoreClient, T: Entity> Iterator for BlockingSearchHitsIterator<'_, C, T> {
    type Item = OdmResult<SearchHit<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.runtime.block_on(self.inner.next()) {
            Ok(hit) => hit.map(Ok),
            Err(error) => {
                self.failed = true;
                Some(Err(error))
            }
        }
    }
}
