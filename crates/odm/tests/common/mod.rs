//! Test infrastructure for operations and repositories.
//!
//! [`ScriptedClient`] answers store requests from a queue of scripted responses and
//! records every request it receives, so tests run without a cluster.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use quiver_odm::client::{DocumentStoreClient, StoreRequest, StoreResponse};
use quiver_odm::error::TransportError;
use quiver_odm::mapping::{EntityDescriptor, Mapped, Property, TemporalKind};
use quiver_odm::types::{GeoPoint, SeqNoPrimaryTerm};
use quiver_odm::{DocumentOperations, OdmConfig};

enum Scripted {
    Response(StoreResponse),
    Failure(String),
}

/// A client replaying scripted responses in order.
#[derive(Default)]
pub struct ScriptedClient {
    responses: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<StoreRequest>>,
}

impl std::fmt::Debug for ScriptedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedClient")
            .field("pending", &self.responses.lock().len())
            .field("received", &self.requests.lock().len())
            .finish()
    }
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues a response.
    pub fn respond(&self, status: u16, body: Value) -> &Self {
        self.responses
            .lock()
            .push_back(Scripted::Response(StoreResponse::new(status, body)));
        self
    }

    /// Queues a transport failure.
    pub fn fail(&self, message: &str) -> &Self {
        self.responses.lock().push_back(Scripted::Failure(message.to_string()));
        self
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<StoreRequest> {
        self.requests.lock().clone()
    }

    /// The most recent request.
    pub fn last_request(&self) -> StoreRequest {
        self.requests
            .lock()
            .last()
            .cloned()
            .expect("no request was sent")
    }

    pub fn pending(&self) -> usize {
        self.responses.lock().len()
    }
}

#[async_trait]
impl DocumentStoreClient for ScriptedClient {
    async fn execute(&self, request: StoreRequest) -> Result<StoreResponse, TransportError> {
        let operation = request.operation;
        self.requests.lock().push(request);
        match self.responses.lock().pop_front() {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::Failure(message)) => Err(TransportError::new(message)),
            None => panic!("unscripted {} request", operation),
        }
    }
}

/// Operations over a fresh scripted client with default configuration.
pub fn operations() -> (Arc<ScriptedClient>, DocumentOperations<Arc<ScriptedClient>>) {
    operations_with(OdmConfig::default())
}

pub fn operations_with(config: OdmConfig) -> (Arc<ScriptedClient>, DocumentOperations<Arc<ScriptedClient>>) {
    let client = ScriptedClient::new();
    let ops = DocumentOperations::new(client.clone(), config);
    (client, ops)
}

/// A search response body with the given `(id, source)` hits.
pub fn search_response(total: u64, hits: &[(&str, Value)]) -> Value {
    let hits: Vec<Value> = hits
        .iter()
        .map(|(id, source)| json!({"_index": "books", "_id": id, "_score": 1.0, "_source": source}))
        .collect();
    json!({
        "took": 1,
        "timed_out": false,
        "hits": {
            "total": {"value": total, "relation": "eq"},
            "max_score": 1.0,
            "hits": hits
        }
    })
}

// ============================================================================
// Fixture entities
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub name: String,
    pub price: i64,
}

impl Book {
    pub fn new(id: &str, name: &str, price: i64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            price,
        }
    }
}

impl Mapped for Book {
    fn describe() -> EntityDescriptor {
        EntityDescriptor::of::<Self>()
            .index("books")
            .property(Property::keyword("id"))
            .property(Property::text("name"))
            .property(Property::integer("price"))
    }
}

/// Entity whose id is assigned on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
}

impl Mapped for Note {
    fn describe() -> EntityDescriptor {
        EntityDescriptor::of::<Self>()
            .index("notes")
            .property(Property::keyword("id").id())
            .property(Property::text("text"))
    }
}

/// Entity written with external versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    #[serde(default)]
    pub version: Option<i64>,
    pub title: String,
}

impl Mapped for Article {
    fn describe() -> EntityDescriptor {
        EntityDescriptor::of::<Self>()
            .index("articles")
            .property(Property::keyword("id").id())
            .property(Property::long("version").version())
            .property(Property::text("title"))
    }
}

/// Entity written conditionally on sequence numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    #[serde(default)]
    pub seq: Option<SeqNoPrimaryTerm>,
    pub status: String,
}

impl Mapped for Ticket {
    fn describe() -> EntityDescriptor {
        EntityDescriptor::of::<Self>()
            .index("tickets")
            .property(Property::keyword("id").id())
            .property(Property::seq_no_primary_term("seq"))
            .property(Property::keyword("status"))
    }
}

/// Entity with dates and a location, stored in a per-tenant index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shop {
    pub id: String,
    pub name: String,
    pub opened: chrono::NaiveDate,
    pub location: GeoPoint,
}

impl Mapped for Shop {
    fn describe() -> EntityDescriptor {
        EntityDescriptor::of::<Self>()
            .index("shops-{tenant}")
            .property(Property::keyword("id").id())
            .property(Property::keyword("name"))
            .property(Property::date("opened", TemporalKind::LocalDate))
            .property(Property::geo_point("location"))
    }
}

/// Entity with a credential that is written but never read back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    pub id: String,
    pub token: String,
}

impl Mapped for Secret {
    fn describe() -> EntityDescriptor {
        EntityDescriptor::of::<Self>()
            .index("secrets")
            .property(Property::keyword("id").id())
            .property(Property::keyword("token").write_only())
    }
}
