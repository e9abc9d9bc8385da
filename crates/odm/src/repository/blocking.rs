//! Blocking form of [`Repository`].

use std::sync::Arc;

use tokio::runtime::Runtime;

use crate::client::DocumentStoreClient;
use crate::error::OdmResult;
use crate::mapping::{Entity, EntityMetadata};
use crate::operations::{BulkSave, DocumentOperations, blocking_runtime};
use crate::query::{QueryArgs, QueryPlan, Subject};
use crate::result::{Page, QueryResult, ResultKind};
use crate::types::PageRequest;

use super::Repository;

/// A [`Repository`] whose data operations block the calling thread.
///
/// Registration is shared with the wrapped repository, so methods registered on
/// either are visible to both.
pub struct BlockingRepository<T, C> {
    inner: Repository<T, C>,
    runtime: Arc<Runtime>,
}

impl<T, C: std::fmt::Debug> std::fmt::Debug for BlockingRepository<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingRepository")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<T: Entity, C: DocumentStoreClient> BlockingRepository<T, C> {
    /// Creates a repository with its own current-thread runtime.
    pub fn new(ops: DocumentOperations<C>) -> OdmResult<Self> {
        Ok(Self::with_runtime(Repository::new(ops)?, blocking_runtime()?))
    }

    pub(crate) fn with_runtime(inner: Repository<T, C>, runtime: Arc<Runtime>) -> Self {
        Self { inner, runtime }
    }

    /// The wrapped non-blocking repository.
    pub fn inner(&self) -> &Repository<T, C> {
        &self.inner
    }

    /// Metadata of `T`.
    pub fn metadata(&self) -> &Arc<EntityMetadata> {
        self.inner.metadata()
    }

    /// See [`Repository::ensure_index`].
    pub fn ensure_index(&self) -> OdmResult<bool> {
        self.runtime.block_on(self.inner.ensure_index())
    }

    /// See [`Repository::save`].
    pub fn save(&self, entity: &T) -> OdmResult<T> {
        self.runtime.block_on(self.inner.save(entity))
    }

    /// See [`Repository::save_all`].
    pub fn save_all(&self, entities: &[T]) -> OdmResult<BulkSave<T>> {
        self.runtime.block_on(self.inner.save_all(entities))
    }

    /// See [`Repository::find_by_id`].
    pub fn find_by_id(&self, id: &str) -> OdmResult<Option<T>> {
        self.runtime.block_on(self.inner.find_by_id(id))
    }

    /// See [`Repository::exists_by_id`].
    pub fn exists_by_id(&self, id: &str) -> OdmResult<bool> {
        self.runtime.block_on(self.inner.exists_by_id(id))
    }

    /// See [`Repository::find_all`].
    pub fn find_all(&self) -> OdmResult<Vec<T>> {
        self.runtime.block_on(self.inner.find_all())
    }

    /// See [`Repository::find_all_page`].
    pub fn find_all_page(&self, page: PageRequest) -> OdmResult<Page<T>> {
        self.runtime.block_on(self.inner.find_all_page(page))
    }

    /// See [`Repository::find_all_by_id`].
    pub fn find_all_by_id(&self, ids: &[String]) -> OdmResult<Vec<T>> {
        self.runtime.block_on(self.inner.find_all_by_id(ids))
    }

    /// See [`Repository::count`].
    pub fn count(&self) -> OdmResult<u64> {
        self.runtime.block_on(self.inner.count())
    }

    /// See [`Repository::delete_by_id`].
    pub fn delete_by_id(&self, id: &str) -> OdmResult<bool> {
        self.runtime.block_on(self.inner.delete_by_id(id))
    }

    /// See [`Repository::delete`].
    pub fn delete(&self, entity: &T) -> OdmResult<bool> {
        self.runtime.block_on(self.inner.delete(entity))
    }

    /// See [`Repository::delete_all`].
    pub fn delete_all(&self) -> OdmResult<u64> {
        self.runtime.block_on(self.inner.delete_all())
    }

    /// See [`Repository::register`].
    pub fn register(&self, name: &str) -> OdmResult<()> {
        self.inner.register(name)
    }

    /// See [`Repository::register_template`].
    pub fn register_template(&self, name: &str, template: &str, subject: Subject) -> OdmResult<()> {
        self.inner.register_template(name, template, subject)
    }

    /// See [`Repository::plan`].
    pub fn plan(&self, name: &str, args: &QueryArgs) -> OdmResult<QueryPlan> {
        self.inner.plan(name, args)
    }

    /// See [`Repository::execute`].
    pub fn execute(&self, name: &str, args: QueryArgs) -> OdmResult<QueryResult<T>> {
        self.runtime.block_on(self.inner.execute(name, args))
    }

    /// See [`Repository::execute_as`].
    pub fn execute_as(&self, name: &str, args: QueryArgs, kind: ResultKind) -> OdmResult<QueryResult<T>> {
        self.runtime.block_on(self.inner.execute_as(name, args, kind))
    }
}
