//! Typed repositories.
//!
//! A [`Repository`] pairs the CRUD operations of one entity type with query methods
//! registered by name. Registration derives and validates the method once; every
//! invocation reuses the derived form.
//!
//! ```ignore
//! let books = Repository::<Book, _>::new(ops)?;
//! books.register("findByNameAndPrice")?;
//! let found = books
//!     .execute("findByNameAndPrice", QueryArgs::new().arg("Foo").arg(42))
//!     .await?
//!     .into_items();
//! ```

mod blocking;

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::client::DocumentStoreClient;
use crate::error::{OdmResult, QueryDerivationError};
use crate::mapping::{Entity, EntityMetadata};
use crate::operations::{BulkSave, DocumentOperations};
use crate::query::{MethodNameParser, QueryArgs, QueryMethod, QueryPlan, StringQuery, Subject};
use crate::result::{Page, PageInfo, QueryResult, ResultKind};
use crate::types::PageRequest;

pub use blocking::BlockingRepository;

#[derive(Debug)]
enum RegisteredQuery {
    Derived(QueryMethod),
    Template { query: StringQuery, subject: Subject },
}

impl RegisteredQuery {
    fn subject(&self) -> Subject {
        match self {
            RegisteredQuery::Derived(method) => method.subject,
            RegisteredQuery::Template { subject, .. } => *subject,
        }
    }
}

/// CRUD and registered queries for one entity type.
pub struct Repository<T, C> {
    ops: DocumentOperations<C>,
    metadata: Arc<EntityMetadata>,
    queries: RwLock<HashMap<String, Arc<RegisteredQuery>>>,
    _entity: PhantomData<fn() -> T>,
}

impl<T, C: std::fmt::Debug> std::fmt::Debug for Repository<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &self.metadata.short_name())
            .field("queries", &self.queries.read().len())
            .finish_non_exhaustive()
    }
}

impl<T: Entity, C: DocumentStoreClient> Repository<T, C> {
    /// Creates a repository, resolving `T`'s metadata up front.
    pub fn new(ops: DocumentOperations<C>) -> OdmResult<Self> {
        let metadata = ops.metadata::<T>()?;
        Ok(Self {
            ops,
            metadata,
            queries: RwLock::new(HashMap::new()),
            _entity: PhantomData,
        })
    }

    /// The underlying operations.
    pub fn operations(&self) -> &DocumentOperations<C> {
        &self.ops
    }

    /// Metadata of `T`.
    pub fn metadata(&self) -> &Arc<EntityMetadata> {
        &self.metadata
    }

    /// Creates the index when the type and configuration allow it.
    pub async fn ensure_index(&self) -> OdmResult<bool> {
        self.ops.index_ops::<T>()?.create_if_needed().await
    }

    /// Saves an entity; see [`DocumentOperations::save`].
    pub async fn save(&self, entity: &T) -> OdmResult<T> {
        self.ops.save(entity).await
    }

    /// Saves many entities in one bulk request.
    pub async fn save_all(&self, entities: &[T]) -> OdmResult<BulkSave<T>> {
        self.ops.save_all(entities).await
    }

    /// Finds an entity by id.
    pub async fn find_by_id(&self, id: &str) -> OdmResult<Option<T>> {
        self.ops.get(id, None).await
    }

    /// Returns true if an entity with `id` exists.
    pub async fn exists_by_id(&self, id: &str) -> OdmResult<bool> {
        self.ops.exists::<T>(id, None).await
    }

    /// All entities, up to the result window.
    pub async fn find_all(&self) -> OdmResult<Vec<T>> {
        let plan = self.plan_all(&QueryArgs::new())?;
        Ok(self.ops.search::<T>(&plan).await?.into_contents())
    }

    /// One page of all entities.
    pub async fn find_all_page(&self, page: PageRequest) -> OdmResult<Page<T>> {
        let plan = self.plan_all(&QueryArgs::new().page(page.clone()))?;
        let hits = self.ops.search::<T>(&plan).await?;
        let page_info = PageInfo::for_request(&page, hits.len(), hits.total, hits.next_cursor.clone());
        Ok(Page {
            items: hits.into_contents(),
            page_info,
        })
    }

    /// Entities with the given ids, skipping missing ones.
    pub async fn find_all_by_id(&self, ids: &[String]) -> OdmResult<Vec<T>> {
        self.ops.get_all(ids).await
    }

    /// Number of stored entities.
    pub async fn count(&self) -> OdmResult<u64> {
        self.ops.count::<T>(&QueryPlan::match_all()).await
    }

    /// Deletes by id. Returns false if nothing was deleted.
    pub async fn delete_by_id(&self, id: &str) -> OdmResult<bool> {
        self.ops.delete::<T>(id, None).await
    }

    /// Deletes an entity, honoring its routing.
    pub async fn delete(&self, entity: &T) -> OdmResult<bool> {
        self.ops.delete_entity(entity).await
    }

    /// Deletes every entity. Returns the number deleted.
    pub async fn delete_all(&self) -> OdmResult<u64> {
        self.ops.delete_by_query::<T>(&QueryPlan::match_all()).await
    }

    /// Derives a query method from its name and registers it.
    ///
    /// Fails when the name cannot be parsed or references unknown properties.
    pub fn register(&self, name: &str) -> OdmResult<()> {
        let method = MethodNameParser::new(self.ops.registry()).derive(name, &self.metadata)?;
        debug!(
            method = name,
            type_name = self.metadata.short_name(),
            arity = method.arity(),
            "Registered query method"
        );
        self.insert(name, RegisteredQuery::Derived(method));
        Ok(())
    }

    /// Registers a string query template under `name`.
    pub fn register_template(&self, name: &str, template: &str, subject: Subject) -> OdmResult<()> {
        let query = StringQuery::parse(name, template)?;
        debug!(
            method = name,
            type_name = self.metadata.short_name(),
            "Registered query template"
        );
        self.insert(name, RegisteredQuery::Template { query, subject });
        Ok(())
    }

    fn insert(&self, name: &str, query: RegisteredQuery) {
        self.queries.write().insert(name.to_string(), Arc::new(query));
    }

    fn lookup(&self, name: &str) -> OdmResult<Arc<RegisteredQuery>> {
        self.queries.read().get(name).cloned().ok_or_else(|| {
            QueryDerivationError::Malformed {
                method: name.to_string(),
                message: "no query registered under this name".to_string(),
            }
            .into()
        })
    }

    /// Compiles a registered query with the given arguments.
    pub fn plan(&self, name: &str, args: &QueryArgs) -> OdmResult<QueryPlan> {
        let query = self.lookup(name)?;
        let compiler = self.ops.compiler();
        match query.as_ref() {
            RegisteredQuery::Derived(method) => compiler.compile(method, &self.metadata, args),
            RegisteredQuery::Template { query, subject } => {
                compiler.compile_template(query, *subject, &self.metadata, args)
            }
        }
    }

    /// Runs a registered query.
    ///
    /// The result follows the method's subject: counts for `count`, a flag for
    /// `exists`, the number deleted for `delete`, a page when `args` carry a page
    /// request, and a list otherwise.
    pub async fn execute(&self, name: &str, args: QueryArgs) -> OdmResult<QueryResult<T>> {
        let subject = self.lookup(name)?.subject();
        let kind = match subject {
            Subject::Count => ResultKind::Count,
            Subject::Exists => ResultKind::Exists,
            Subject::Delete => ResultKind::Deleted,
            Subject::Find => match &args.page {
                Some(page) => ResultKind::Page(page.clone()),
                None => ResultKind::List,
            },
        };
        self.execute_as(name, args, kind).await
    }

    /// Runs a registered query, decoding into `kind`.
    pub async fn execute_as(&self, name: &str, args: QueryArgs, kind: ResultKind) -> OdmResult<QueryResult<T>> {
        let plan = self.plan(name, &args)?;
        self.ops.search_as::<T>(&plan, &kind).await
    }

    fn plan_all(&self, args: &QueryArgs) -> OdmResult<QueryPlan> {
        self.ops
            .compiler()
            .compile_query(QueryPlan::match_all().query, &self.metadata, args)
    }
}
