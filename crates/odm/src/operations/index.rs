//! Index lifecycle for one entity type.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::client::{DocumentStoreClient, Method, StoreRequest};
use crate::error::{OdmResult, StoreError};
use crate::mapping::EntityMetadata;
use crate::result::store_error;
use crate::schema::{IndexSchema, SchemaBuilder};

use super::DocumentOperations;

/// Creates, inspects and deletes the index of one entity type.
#[derive(Debug)]
pub struct IndexOperations<'a, C> {
    ops: &'a DocumentOperations<C>,
    metadata: Arc<EntityMetadata>,
    index: String,
}

impl<'a, C: DocumentStoreClient> IndexOperations<'a, C> {
    pub(crate) fn new(ops: &'a DocumentOperations<C>, metadata: Arc<EntityMetadata>, index: String) -> Self {
        Self { ops, metadata, index }
    }

    /// The resolved index name.
    pub fn index_name(&self) -> &str {
        &self.index
    }

    /// The settings and mapping this type declares.
    pub fn schema(&self) -> OdmResult<IndexSchema> {
        let builder = SchemaBuilder::new(self.ops.registry(), self.ops.config());
        Ok(builder.schema_for(&self.metadata)?)
    }

    /// Returns true if the index exists.
    pub async fn exists(&self) -> OdmResult<bool> {
        let request = StoreRequest::new("index_exists", Method::Head, format!("/{}", self.index)).index(&self.index);
        let response = self.ops.send(request).await?;
        match response.status {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(store_error("index_exists", status, &response.body).into()),
        }
    }

    /// Creates the index with the declared settings and mapping.
    ///
    /// Returns false if the index already existed.
    pub async fn create(&self) -> OdmResult<bool> {
        let body = self.schema()?.to_create_body();
        self.create_with(body).await
    }

    /// Creates the index with an explicit body.
    pub async fn create_with(&self, body: Value) -> OdmResult<bool> {
        let request = StoreRequest::new("create_index", Method::Put, format!("/{}", self.index))
            .index(&self.index)
            .json(body);
        let response = self.ops.send(request).await?;

        if !response.is_success() {
            let error = store_error("create_index", response.status, &response.body);
            // Lost a creation race
            if matches!(
                &error,
                StoreError::Status { error_type: Some(kind), .. } if kind == "resource_already_exists_exception"
            ) {
                debug!("Index '{}' already exists", self.index);
                return Ok(false);
            }
            return Err(error.into());
        }

        info!("Created index '{}'", self.index);
        Ok(true)
    }

    /// Creates the index unless it exists or creation is disabled for this type.
    pub async fn create_if_needed(&self) -> OdmResult<bool> {
        if !self.metadata.create_index || !self.ops.config().create_indexes {
            debug!("Index creation disabled for '{}'", self.index);
            return Ok(false);
        }
        if self.exists().await? {
            return Ok(false);
        }
        self.create().await
    }

    /// Writes the declared mapping to an existing index.
    pub async fn put_mapping(&self) -> OdmResult<()> {
        let mapping = self.schema()?.mapping;
        let request = StoreRequest::new("put_mapping", Method::Put, format!("/{}/_mapping", self.index))
            .index(&self.index)
            .json(mapping);
        self.ops.send_ok(request).await?;
        debug!("Updated mapping of index '{}'", self.index);
        Ok(())
    }

    /// Reads the mapping stored for the index.
    pub async fn get_mapping(&self) -> OdmResult<Value> {
        let request =
            StoreRequest::new("get_mapping", Method::Get, format!("/{}/_mapping", self.index)).index(&self.index);
        let body = self.ops.send_ok(request).await?;
        Ok(body
            .get(&self.index)
            .and_then(|i| i.get("mappings"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Deletes the index. Returns false if it did not exist.
    pub async fn delete(&self) -> OdmResult<bool> {
        let request = StoreRequest::new("delete_index", Method::Delete, format!("/{}", self.index)).index(&self.index);
        let response = self.ops.send(request).await?;
        if response.is_not_found() {
            return Ok(false);
        }
        if !response.is_success() {
            return Err(store_error("delete_index", response.status, &response.body).into());
        }
        debug!("Deleted index '{}'", self.index);
        Ok(true)
    }

    /// Makes recent writes visible to search.
    pub async fn refresh(&self) -> OdmResult<()> {
        let request = StoreRequest::new("refresh", Method::Post, format!("/{}/_refresh", self.index)).index(&self.index);
        self.ops.send_ok(request).await?;
        Ok(())
    }
}
