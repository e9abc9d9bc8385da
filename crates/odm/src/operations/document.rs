//! Document operations.

use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::client::{DocumentStoreClient, Method, RequestCustomizer, StoreRequest, StoreResponse, encode_segment};
use crate::config::OdmConfig;
use crate::convert::{CustomConversions, Document, DocumentConverter};
use crate::error::{ConcurrencyError, MappingError, OdmError, OdmResult, PartialBulkFailure, StoreError};
use crate::mapping::{Entity, EntityMetadata, FieldType, MetadataRegistry};
use crate::query::{QueryCompiler, QueryPlan};
use crate::result::{Page, PageInfo, QueryResult, ResultKind, ResultMaterializer, SearchHits, store_error};
use crate::types::SeqNoPrimaryTerm;

use super::bulk::{BulkOperation, BulkOutcome};
use super::index::IndexOperations;
use super::scroll::SearchHitsIterator;

/// Entities saved in one bulk request, by submission position.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkSave<T> {
    /// The saved entity per position; `None` where the item failed.
    pub entities: Vec<Option<T>>,
    /// The per-item outcome.
    pub outcome: BulkOutcome,
}

impl<T> BulkSave<T> {
    /// All saved entities, or the partial failure.
    pub fn into_result(self) -> Result<Vec<T>, PartialBulkFailure> {
        self.outcome.into_result()?;
        Ok(self.entities.into_iter().flatten().collect())
    }
}

/// Non-blocking operations over a [`DocumentStoreClient`].
///
/// Cloning is cheap; clones share the client, registry and configuration.
pub struct DocumentOperations<C> {
    client: Arc<C>,
    converter: DocumentConverter,
    config: Arc<OdmConfig>,
    customizers: Arc<Vec<Arc<dyn RequestCustomizer>>>,
}

impl<C> Clone for DocumentOperations<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            converter: self.converter.clone(),
            config: self.config.clone(),
            customizers: self.customizers.clone(),
        }
    }
}

impl<C: Debug> Debug for DocumentOperations<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentOperations")
            .field("client", &self.client)
            .field("config", &self.config)
            .field("customizers", &self.customizers.len())
            .finish_non_exhaustive()
    }
}

impl<C: DocumentStoreClient> DocumentOperations<C> {
    /// Creates operations with a fresh metadata registry.
    pub fn new(client: C, config: OdmConfig) -> Self {
        let registry = Arc::new(MetadataRegistry::new(config.field_naming));
        Self::with_registry(client, config, registry)
    }

    /// Creates operations sharing an existing metadata registry.
    pub fn with_registry(client: C, config: OdmConfig, registry: Arc<MetadataRegistry>) -> Self {
        let converter = DocumentConverter::new(registry, &config);
        Self {
            client: Arc::new(client),
            converter,
            config: Arc::new(config),
            customizers: Arc::new(Vec::new()),
        }
    }

    /// Registers custom conversions.
    pub fn with_conversions(mut self, conversions: CustomConversions) -> Self {
        self.converter = self.converter.with_conversions(conversions);
        self
    }

    /// Adds a request customizer. Customizers run in registration order.
    pub fn with_customizer(mut self, customizer: impl RequestCustomizer + 'static) -> Self {
        let mut customizers: Vec<_> = self.customizers.iter().cloned().collect();
        customizers.push(Arc::new(customizer));
        self.customizers = Arc::new(customizers);
        self
    }

    /// The client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// The document converter.
    pub fn converter(&self) -> &DocumentConverter {
        &self.converter
    }

    /// The metadata registry.
    pub fn registry(&self) -> &Arc<MetadataRegistry> {
        self.converter.registry()
    }

    /// The configuration.
    pub fn config(&self) -> &OdmConfig {
        &self.config
    }

    /// Metadata for `T`.
    pub fn metadata<T: Entity>(&self) -> OdmResult<Arc<EntityMetadata>> {
        Ok(self.registry().metadata_for::<T>()?)
    }

    /// A query compiler bound to this converter and configuration.
    pub fn compiler(&self) -> QueryCompiler<'_> {
        QueryCompiler::new(&self.converter, &self.config)
    }

    /// Index lifecycle operations for `T`.
    pub fn index_ops<T: Entity>(&self) -> OdmResult<IndexOperations<'_, C>> {
        let metadata = self.metadata::<T>()?;
        let index = self.index_name(&metadata)?;
        Ok(IndexOperations::new(self, metadata, index))
    }

    /// Resolves the index name of a type.
    ///
    /// Types without an index template use their lowercased type name.
    pub fn index_name(&self, metadata: &EntityMetadata) -> OdmResult<String> {
        match &metadata.index {
            Some(template) => Ok(template.resolve(&self.config.index_variables)?),
            None => Ok(metadata.short_name().to_lowercase()),
        }
    }

    pub(crate) async fn send(&self, mut request: StoreRequest) -> OdmResult<StoreResponse> {
        for customizer in self.customizers.iter() {
            customizer.customize(&mut request);
        }
        debug!(
            operation = request.operation,
            method = %request.method,
            index = request.index.as_deref().unwrap_or("-"),
            "Sending store request"
        );
        Ok(self.client.execute(request).await?)
    }

    /// Sends a request and fails on non-success statuses.
    pub(crate) async fn send_ok(&self, request: StoreRequest) -> OdmResult<Value> {
        let operation = request.operation;
        let response = self.send(request).await?;
        if !response.is_success() {
            return Err(store_error(operation, response.status, &response.body).into());
        }
        Ok(response.body)
    }

    fn with_refresh(&self, request: StoreRequest) -> StoreRequest {
        request.param_opt("refresh", self.config.refresh_policy.as_param())
    }

    /// Converts an entity into the document that [`save`](Self::save) would write.
    pub fn to_document<T: Entity>(&self, entity: &T) -> OdmResult<(Arc<EntityMetadata>, Document)> {
        let metadata = self.metadata::<T>()?;
        let mut document = self.converter.write(entity)?;

        if document.id().is_none() && self.config.generate_ids {
            let id = uuid::Uuid::new_v4().to_string();
            if let Some(property) = metadata.id_property() {
                if matches!(property.field_type, FieldType::Keyword | FieldType::Text | FieldType::Auto)
                    && document.get(&property.field_name).is_none_or(Value::is_null)
                {
                    document.insert(property.field_name.clone(), Value::String(id.clone()));
                }
            }
            document.set_id(Some(id));
        }
        Ok((metadata, document))
    }

    /// Indexes an entity and returns it with store-assigned id, version and
    /// sequence number applied.
    ///
    /// Entities with a version property are written with external versioning;
    /// entities with a sequence-number property are written conditionally on it.
    pub async fn save<T: Entity>(&self, entity: &T) -> OdmResult<T> {
        let (metadata, mut document) = self.to_document(entity)?;
        let index = self.index_name(&metadata)?;

        let request = match document.id() {
            Some(id) => StoreRequest::new("index", Method::Put, format!("/{}/_doc/{}", index, encode_segment(id))),
            None => StoreRequest::new("index", Method::Post, format!("/{}/_doc", index)),
        };
        let mut request = self
            .with_refresh(request.index(&index))
            .param_opt("routing", document.routing());
        if let Some(seq) = document.seq_no_primary_term().filter(|_| metadata.seq_no_property().is_some()) {
            request = request
                .param("if_seq_no", seq.seq_no)
                .param("if_primary_term", seq.primary_term);
        } else if let Some(version) = document.version().filter(|_| metadata.version_property().is_some()) {
            request = request.param("version", version).param("version_type", "external");
        }
        let request = request.json(document.to_json());

        let response = self.send(request).await?;
        if response.is_conflict() {
            return Err(conflict(&index, document.id().unwrap_or("-"), &response.body).into());
        }
        if !response.is_success() {
            return Err(store_error("index", response.status, &response.body).into());
        }

        apply_write_result(&mut document, &response.body);
        Ok(self.converter.with_document_metadata(entity, &document)?)
    }

    /// Indexes many entities in one bulk request.
    pub async fn save_all<T: Entity>(&self, entities: &[T]) -> OdmResult<BulkSave<T>> {
        let mut documents = Vec::with_capacity(entities.len());
        let mut operations = Vec::with_capacity(entities.len());
        for entity in entities {
            let (metadata, document) = self.to_document(entity)?;
            let index = self.index_name(&metadata)?;
            operations.push(BulkOperation::Index {
                index,
                id: document.id().map(String::from),
                routing: document.routing().map(String::from),
                version: document.version().filter(|_| metadata.version_property().is_some()),
                if_seq_no_primary_term: document
                    .seq_no_primary_term()
                    .filter(|_| metadata.seq_no_property().is_some()),
                source: document.to_json(),
            });
            documents.push(document);
        }

        let outcome = self.bulk(operations).await?;
        let mut saved = Vec::with_capacity(documents.len());
        for ((entity, mut document), item) in entities.iter().zip(documents).zip(&outcome.items) {
            if !item.is_success() {
                saved.push(None);
                continue;
            }
            if let Some(id) = &item.id {
                document.set_id(Some(id.clone()));
            }
            if item.version.is_some() {
                document.set_version(item.version);
            }
            if item.seq_no_primary_term.is_some() {
                document.set_seq_no_primary_term(item.seq_no_primary_term);
            }
            match self.converter.with_document_metadata(entity, &document) {
                Ok(saved_entity) => saved.push(Some(saved_entity)),
                Err(error) => {
                    warn!(position = item.position, error = %error, "Saved item could not be rebuilt");
                    saved.push(None);
                }
            }
        }

        Ok(BulkSave {
            entities: saved,
            outcome,
        })
    }

    /// Sends a bulk request. Per-item failures are reported in the outcome, not as an error.
    pub async fn bulk(&self, operations: Vec<BulkOperation>) -> OdmResult<BulkOutcome> {
        if operations.is_empty() {
            return Ok(BulkOutcome::default());
        }
        let lines: Vec<Value> = operations.iter().flat_map(BulkOperation::to_lines).collect();
        let request = self.with_refresh(StoreRequest::new("bulk", Method::Post, "/_bulk")).ndjson(lines);
        let body = self.send_ok(request).await?;
        let outcome = BulkOutcome::from_response(&body);

        if outcome.has_failures() {
            warn!(
                total = outcome.items.len(),
                failed = outcome.failures().count(),
                "Bulk request completed with failed items"
            );
        }
        Ok(outcome)
    }

    /// Reads an entity by id.
    pub async fn get<T: Entity>(&self, id: &str, routing: Option<&str>) -> OdmResult<Option<T>> {
        let metadata = self.metadata::<T>()?;
        let index = self.index_name(&metadata)?;
        let request = StoreRequest::new("get", Method::Get, format!("/{}/_doc/{}", index, encode_segment(id)))
            .index(&index)
            .param_opt("routing", routing);

        let response = self.send(request).await?;
        if response.is_not_found() && response.body.get("found").is_some() {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(store_error("get", response.status, &response.body).into());
        }
        ResultMaterializer::new(&self.converter).get(&response.body)
    }

    /// Reads several entities by id, in id order, skipping missing ones.
    pub async fn get_all<T: Entity>(&self, ids: &[String]) -> OdmResult<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let metadata = self.metadata::<T>()?;
        let index = self.index_name(&metadata)?;
        let request = StoreRequest::new("mget", Method::Post, format!("/{}/_mget", index))
            .index(&index)
            .json(json!({ "ids": ids }));
        let body = self.send_ok(request).await?;

        let materializer = ResultMaterializer::new(&self.converter);
        let mut entities = Vec::new();
        for doc in body.get("docs").and_then(Value::as_array).into_iter().flatten() {
            if let Some(entity) = materializer.get(doc)? {
                entities.push(entity);
            }
        }
        Ok(entities)
    }

    /// Returns true if a document with `id` exists.
    pub async fn exists<T: Entity>(&self, id: &str, routing: Option<&str>) -> OdmResult<bool> {
        let metadata = self.metadata::<T>()?;
        let index = self.index_name(&metadata)?;
        let request = StoreRequest::new("exists", Method::Head, format!("/{}/_doc/{}", index, encode_segment(id)))
            .index(&index)
            .param_opt("routing", routing);

        let response = self.send(request).await?;
        match response.status {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(store_error("exists", status, &response.body).into()),
        }
    }

    /// Deletes a document by id. Returns false if it did not exist.
    pub async fn delete<T: Entity>(&self, id: &str, routing: Option<&str>) -> OdmResult<bool> {
        let metadata = self.metadata::<T>()?;
        let index = self.index_name(&metadata)?;
        let request = StoreRequest::new("delete", Method::Delete, format!("/{}/_doc/{}", index, encode_segment(id)))
            .index(&index)
            .param_opt("routing", routing);
        let request = self.with_refresh(request);

        let response = self.send(request).await?;
        if response.is_conflict() {
            return Err(conflict(&index, id, &response.body).into());
        }
        if response.is_not_found() && response.body.get("result").and_then(Value::as_str) == Some("not_found") {
            return Ok(false);
        }
        if !response.is_success() {
            return Err(store_error("delete", response.status, &response.body).into());
        }
        Ok(true)
    }

    /// Deletes the document of an entity, using its id and routing.
    pub async fn delete_entity<T: Entity>(&self, entity: &T) -> OdmResult<bool> {
        let (metadata, document) = self.to_document(entity)?;
        let id = document.id().ok_or_else(|| MappingError::MissingId {
            type_name: metadata.short_name().to_string(),
        })?;
        self.delete::<T>(id, document.routing()).await
    }

    /// Runs a search.
    ///
    /// A missing index yields an empty result, matching a store that has not seen a
    /// document of this type yet.
    pub async fn search<T: Entity>(&self, plan: &QueryPlan) -> OdmResult<SearchHits<T>> {
        let body = match self.search_raw::<T>(plan, None).await {
            Ok(body) => body,
            Err(OdmError::Store(StoreError::IndexNotFound { index })) => {
                debug!("Search on missing index '{}' returns no hits", index);
                return Ok(SearchHits::empty());
            }
            Err(e) => return Err(e),
        };
        ResultMaterializer::new(&self.converter).search_hits(&body)
    }

    /// Runs a search and decodes it into the requested container.
    pub async fn search_as<T: Entity>(&self, plan: &QueryPlan, kind: &ResultKind) -> OdmResult<QueryResult<T>> {
        match kind {
            ResultKind::Count => Ok(QueryResult::Count(self.count::<T>(plan).await?)),
            ResultKind::Exists => Ok(QueryResult::Exists(self.count::<T>(plan).await? > 0)),
            ResultKind::Deleted => Ok(QueryResult::Deleted(self.delete_by_query::<T>(plan).await?)),
            ResultKind::Page(request) => {
                let hits = self.search::<T>(plan).await?;
                let page_info = PageInfo::for_request(request, hits.len(), hits.total, hits.next_cursor.clone());
                Ok(QueryResult::Page(Page {
                    items: hits.into_contents(),
                    page_info,
                }))
            }
            ResultKind::One => Ok(QueryResult::One(self.search::<T>(plan).await?.into_contents().into_iter().next())),
            ResultKind::List => Ok(QueryResult::List(self.search::<T>(plan).await?.into_contents())),
            ResultKind::Hits => Ok(QueryResult::Hits(self.search::<T>(plan).await?)),
        }
    }

    pub(crate) async fn search_raw<T: Entity>(&self, plan: &QueryPlan, scroll: Option<Duration>) -> OdmResult<Value> {
        let metadata = self.metadata::<T>()?;
        let index = self.index_name(&metadata)?;
        // Point-in-time searches name no index.
        let path = if plan.point_in_time.is_some() {
            "/_search".to_string()
        } else {
            format!("/{}/_search", index)
        };
        let request = StoreRequest::new("search", Method::Post, path)
            .index(&index)
            .param_opt("routing", plan.routing.as_deref())
            .param_opt("typed_keys", plan.aggregations.as_ref().map(|_| "true"))
            .param_opt("scroll", scroll.map(OdmConfig::keep_alive_param))
            .json(plan.to_body());
        self.send_ok(request).await
    }

    /// Counts the documents matching a plan's query.
    pub async fn count<T: Entity>(&self, plan: &QueryPlan) -> OdmResult<u64> {
        let metadata = self.metadata::<T>()?;
        let index = self.index_name(&metadata)?;
        let request = StoreRequest::new("count", Method::Post, format!("/{}/_count", index))
            .index(&index)
            .param_opt("routing", plan.routing.as_deref())
            .json(plan.to_query_body());

        match self.send_ok(request).await {
            Ok(body) => Ok(body.get("count").and_then(Value::as_u64).unwrap_or(0)),
            Err(OdmError::Store(StoreError::IndexNotFound { .. })) => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Deletes the documents matching a plan's query. Returns the number deleted.
    ///
    /// A conflict on any matched document fails with
    /// [`ConcurrencyError::VersionConflict`]; other reported failures fail with
    /// [`StoreError::Status`], even when some documents were already deleted.
    pub async fn delete_by_query<T: Entity>(&self, plan: &QueryPlan) -> OdmResult<u64> {
        let metadata = self.metadata::<T>()?;
        let index = self.index_name(&metadata)?;
        // delete_by_query accepts only a boolean refresh.
        let refresh = self.config.refresh_policy.as_param().map(|_| "true");
        let request = StoreRequest::new("delete_by_query", Method::Post, format!("/{}/_delete_by_query", index))
            .index(&index)
            .param_opt("routing", plan.routing.as_deref())
            .param_opt("refresh", refresh)
            .json(plan.to_query_body());
        let response = self.send(request).await?;
        if response.is_conflict() {
            return Err(conflict(&index, "_delete_by_query", &response.body).into());
        }
        if !response.is_success() {
            return Err(store_error("delete_by_query", response.status, &response.body).into());
        }
        if let Some(error) = delete_by_query_failure(&index, &response.body) {
            warn!(
                index = %index,
                deleted = response.body.get("deleted").and_then(serde_json::Value::as_u64).unwrap_or(0),
                "Delete by query stopped on failures"
            );
            return Err(error);
        }
        Ok(response.body.get("deleted").and_then(Value::as_u64).unwrap_or(0))
    }

    /// Starts a scroll and returns the first batch.
    pub async fn scroll_start<T: Entity>(&self, plan: &QueryPlan, keep_alive: Duration) -> OdmResult<SearchHits<T>> {
        let body = self.search_raw::<T>(plan, Some(keep_alive)).await?;
        ResultMaterializer::new(&self.converter).search_hits(&body)
    }

    /// Fetches the next batch of a scroll.
    pub async fn scroll_continue<T: Entity>(&self, scroll_id: &str, keep_alive: Duration) -> OdmResult<SearchHits<T>> {
        let request = StoreRequest::new("scroll", Method::Post, "/_search/scroll").json(json!({
            "scroll": OdmConfig::keep_alive_param(keep_alive),
            "scroll_id": scroll_id,
        }));
        let body = self.send_ok(request).await?;
        ResultMaterializer::new(&self.converter).search_hits(&body)
    }

    /// Releases scroll contexts.
    pub async fn scroll_clear(&self, scroll_ids: &[String]) -> OdmResult<()> {
        if scroll_ids.is_empty() {
            return Ok(());
        }
        let request =
            StoreRequest::new("clear_scroll", Method::Delete, "/_search/scroll").json(json!({ "scroll_id": scroll_ids }));
        let response = self.send(request).await?;
        // 404: the contexts already expired
        if !response.is_success() && !response.is_not_found() {
            return Err(store_error("clear_scroll", response.status, &response.body).into());
        }
        Ok(())
    }

    /// Streams every hit of a plan, scrolling batch by batch.
    pub async fn stream<T: Entity>(&self, plan: &QueryPlan) -> OdmResult<SearchHitsIterator<C, T>> {
        let keep_alive = self.config.scroll_keep_alive;
        let mut plan = plan.clone();
        if plan.size.is_none_or(|size| size > self.config.max_result_window) {
            plan.size = Some(self.config.default_page_size.max(1));
        }
        let first = self.scroll_start::<T>(&plan, keep_alive).await?;
        Ok(SearchHitsIterator::new(self.clone(), first, keep_alive))
    }

    /// Opens a point in time on `T`'s index and returns its id.
    pub async fn open_point_in_time<T: Entity>(&self, keep_alive: Duration) -> OdmResult<String> {
        let metadata = self.metadata::<T>()?;
        let index = self.index_name(&metadata)?;
        let request = StoreRequest::new("open_point_in_time", Method::Post, format!("/{}/_pit", index))
            .index(&index)
            .param("keep_alive", OdmConfig::keep_alive_param(keep_alive));
        let body = self.send_ok(request).await?;
        body.get("id")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| {
                StoreError::MalformedResponse {
                    operation: "open_point_in_time".to_string(),
                    message: "missing 'id'".to_string(),
                }
                .into()
            })
    }

    /// Closes a point in time. Returns false if it was already gone.
    pub async fn close_point_in_time(&self, id: &str) -> OdmResult<bool> {
        let request = StoreRequest::new("close_point_in_time", Method::Delete, "/_pit").json(json!({ "id": id }));
        let response = self.send(request).await?;
        if response.is_not_found() {
            return Ok(false);
        }
        if !response.is_success() {
            return Err(store_error("close_point_in_time", response.status, &response.body).into());
        }
        Ok(response.body.get("succeeded").and_then(Value::as_bool).unwrap_or(true))
    }
}

fn conflict(index: &str, id: &str, body: &Value) -> ConcurrencyError {
    let reason = body
        .get("error")
        .and_then(|e| e.get("reason"))
        .and_then(Value::as_str)
        .unwrap_or("version conflict")
        .to_string();
    ConcurrencyError::VersionConflict {
        index: index.to_string(),
        id: id.to_string(),
        reason,
    }
}

/// The first failure a delete-by-query response reports, if any.
fn delete_by_query_failure(index: &str, body: &Value) -> Option<OdmError> {
    let failure = body
        .get("failures")
        .and_then(Value::as_array)
        .and_then(|failures| failures.first());
    let conflicts = body.get("version_conflicts").and_then(Value::as_u64).unwrap_or(0);

    let Some(failure) = failure else {
        return (conflicts > 0).then(|| {
            OdmError::from(ConcurrencyError::VersionConflict {
                index: index.to_string(),
                id: "_delete_by_query".to_string(),
                reason: format!("{} version conflicts", conflicts),
            })
        });
    };

    let cause = failure.get("cause").unwrap_or(failure);
    let error_type = cause.get("type").and_then(Value::as_str).map(String::from);
    let reason = cause
        .get("reason")
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| failure.to_string());
    let status = failure
        .get("status")
        .and_then(Value::as_u64)
        .and_then(|s| u16::try_from(s).ok())
        .unwrap_or(500);

    if status == 409 || error_type.as_deref() == Some("version_conflict_engine_exception") {
        let id = failure.get("id").and_then(Value::as_str).unwrap_or("_delete_by_query");
        return Some(
            ConcurrencyError::VersionConflict {
                index: index.to_string(),
                id: id.to_string(),
                reason,
            }
            .into(),
        );
    }
    Some(
        StoreError::Status {
            operation: "delete_by_query".to_string(),
            status,
            error_type,
            reason,
        }
        .into(),
    )
}

fn apply_write_result(document: &mut Document, body: &Value) {
    if let Some(id) = body.get("_id").and_then(Value::as_str) {
        document.set_id(Some(id.to_string()));
    }
    if let Some(version) = body.get("_version").and_then(Value::as_i64) {
        document.set_version(Some(version));
    }
    if let (Some(seq_no), Some(primary_term)) = (
        body.get("_seq_no").and_then(Value::as_i64),
        body.get("_primary_term").and_then(Value::as_i64),
    ) {
        document.set_seq_no_primary_term(Some(SeqNoPrimaryTerm::new(seq_no, primary_term)));
    }
}
