//! Repository CRUD and registered query methods.

mod common;

use std::sync::Arc;
use std::thread;

use serde_json::json;

use common::*;
use quiver_odm::error::{OdmError, QueryDerivationError};
use quiver_odm::mapping::MetadataRegistry;
use quiver_odm::query::Subject;
use quiver_odm::result::QueryResult;
use quiver_odm::types::{Order, PageCursor, PageRequest, Sort};
use quiver_odm::{BlockingOperations, BlockingRepository, QueryArgs, Repository};

type Books = Repository<Book, Arc<ScriptedClient>>;

fn books() -> (Arc<ScriptedClient>, Books) {
    let (client, ops) = operations();
    (client, Repository::new(ops).unwrap())
}

#[tokio::test]
async fn test_crud_round_trip() {
    let (client, repo) = books();
    client.respond(201, json!({"_id": "1", "_version": 1}));
    client.respond(200, json!({"_id": "1", "found": true, "_source": {"name": "Foo", "price": 42}}));
    client.respond(200, serde_json::Value::Null);
    client.respond(200, json!({"count": 1}));
    client.respond(200, json!({"result": "deleted"}));

    let saved = repo.save(&Book::new("1", "Foo", 42)).await.unwrap();
    assert_eq!(repo.find_by_id("1").await.unwrap(), Some(saved.clone()));
    assert!(repo.exists_by_id("1").await.unwrap());
    assert_eq!(repo.count().await.unwrap(), 1);
    assert!(repo.delete(&saved).await.unwrap());

    assert_eq!(client.last_request().path, "/books/_doc/1");
}

#[tokio::test]
async fn test_find_all_uses_result_window() {
    let (client, repo) = books();
    client.respond(200, search_response(1, &[("1", json!({"name": "Foo", "price": 1}))]));

    let all = repo.find_all().await.unwrap();
    assert_eq!(all, vec![Book::new("1", "Foo", 1)]);

    let body = client.last_request().json_body().cloned().unwrap();
    assert_eq!(body["query"], json!({"match_all": {}}));
    assert_eq!(body["size"], json!(10_000));
}

#[tokio::test]
async fn test_find_all_page() {
    let (client, repo) = books();
    client.respond(200, search_response(12, &[("6", json!({"name": "F", "price": 6}))]));

    let page = repo
        .find_all_page(PageRequest::of(1, 5).with_sort(Sort::by([Order::asc("price")])))
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert!(page.page_info.has_next);
    assert_eq!(page.page_info.total_pages(), Some(3));

    let body = client.last_request().json_body().cloned().unwrap();
    assert_eq!(body["from"], json!(5));
    assert_eq!(body["size"], json!(5));
    assert_eq!(body["sort"], json!([{"price": {"order": "asc"}}]));
}

#[tokio::test]
async fn test_delete_all_and_find_all_by_id() {
    let (client, repo) = books();
    client.respond(200, json!({"deleted": 4}));
    client.respond(200, json!({"docs": [{"_id": "9", "found": true, "_source": {"name": "N", "price": 9}}]}));

    assert_eq!(repo.delete_all().await.unwrap(), 4);
    let found = repo.find_all_by_id(&["9".to_string()]).await.unwrap();
    assert_eq!(found, vec![Book::new("9", "N", 9)]);
}

#[tokio::test]
async fn test_register_and_execute_derived_query() {
    let (client, repo) = books();
    repo.register("findByNameAndPrice").unwrap();
    client.respond(200, search_response(1, &[("1", json!({"name": "Foo", "price": 42}))]));

    let result = repo
        .execute("findByNameAndPrice", QueryArgs::new().arg("Foo").arg(42))
        .await
        .unwrap();
    assert_eq!(result.into_items(), vec![Book::new("1", "Foo", 42)]);

    let body = client.last_request().json_body().cloned().unwrap();
    assert_eq!(
        body["query"],
        json!({"bool": {"must": [
            {"match": {"name": {"query": "Foo", "operator": "and"}}},
            {"term": {"price": 42}}
        ]}})
    );
}

#[tokio::test]
async fn test_arity_mismatch_fails_before_sending() {
    let (client, repo) = books();
    repo.register("findByNameAndPrice").unwrap();

    for args in [QueryArgs::new().arg("Foo"), QueryArgs::new().arg("Foo").arg(1).arg(2)] {
        let err = repo.execute("findByNameAndPrice", args).await.unwrap_err();
        assert!(matches!(
            err,
            OdmError::Query(QueryDerivationError::ArityMismatch { expected: 2, .. })
        ));
    }
    assert!(client.requests().is_empty());
}

#[tokio::test]
async fn test_range_queries() {
    let (client, repo) = books();
    repo.register("findByPriceGreaterThan").unwrap();
    repo.register("findByPriceBetween").unwrap();
    client.respond(200, search_response(0, &[]));
    client.respond(200, search_response(0, &[]));

    repo.execute("findByPriceGreaterThan", QueryArgs::new().arg(5)).await.unwrap();
    let body = client.last_request().json_body().cloned().unwrap();
    assert_eq!(body["query"], json!({"range": {"price": {"gt": 5}}}));

    repo.execute("findByPriceBetween", QueryArgs::new().arg(1).arg(10)).await.unwrap();
    let body = client.last_request().json_body().cloned().unwrap();
    assert_eq!(body["query"], json!({"range": {"price": {"gte": 1, "lte": 10}}}));
}

#[tokio::test]
async fn test_subjects_select_result_kind() {
    let (client, repo) = books();
    repo.register("countByName").unwrap();
    repo.register("existsByName").unwrap();
    repo.register("deleteByPriceLessThan").unwrap();
    client.respond(200, json!({"count": 2}));
    client.respond(200, json!({"count": 0}));
    client.respond(200, json!({"deleted": 5}));

    let count = repo.execute("countByName", QueryArgs::new().arg("Foo")).await.unwrap();
    assert!(matches!(count, QueryResult::Count(2)));
    let exists = repo.execute("existsByName", QueryArgs::new().arg("Foo")).await.unwrap();
    assert!(matches!(exists, QueryResult::Exists(false)));
    let deleted = repo
        .execute("deleteByPriceLessThan", QueryArgs::new().arg(3))
        .await
        .unwrap();
    assert!(matches!(deleted, QueryResult::Deleted(5)));

    let requests = client.requests();
    assert_eq!(requests[0].path, "/books/_count");
    assert_eq!(requests[2].path, "/books/_delete_by_query");
    assert_eq!(
        requests[2].json_body(),
        Some(&json!({"query": {"range": {"price": {"lt": 3}}}}))
    );
}

#[tokio::test]
async fn test_paged_execution_returns_cursor() {
    let (client, repo) = books();
    repo.register("findByName").unwrap();
    client.respond(
        200,
        json!({
            "hits": {
                "total": {"value": 7, "relation": "eq"},
                "hits": [
                    {"_id": "1", "_source": {"name": "Foo", "price": 1}, "sort": [1, "1"]},
                    {"_id": "2", "_source": {"name": "Foo", "price": 2}, "sort": [2, "2"]}
                ]
            }
        }),
    );

    let args = QueryArgs::new()
        .arg("Foo")
        .page(PageRequest::first(2).with_sort(Sort::by([Order::asc("price")])))
        .cursor_paging();
    let QueryResult::Page(page) = repo.execute("findByName", args).await.unwrap() else {
        panic!("expected a page");
    };

    assert_eq!(page.items.len(), 2);
    assert!(page.page_info.has_next);
    let cursor = PageCursor::decode(page.page_info.next_cursor.as_deref().unwrap()).unwrap();
    assert_eq!(cursor.search_after(), &[json!(2), json!("2")]);

    let body = client.last_request().json_body().cloned().unwrap();
    assert_eq!(body["sort"], json!([{"price": {"order": "asc"}}, {"id": {"order": "asc"}}]));
    assert!(body.get("from").is_none());
}

#[tokio::test]
async fn test_template_query() {
    let (client, repo) = books();
    repo.register_template(
        "byNameAndMinPrice",
        r#"{"bool": {"must": [{"match": {"name": "?0"}}, {"range": {"price": {"gte": :min}}}]}}"#,
        Subject::Find,
    )
    .unwrap();
    client.respond(200, search_response(0, &[]));

    repo.execute(
        "byNameAndMinPrice",
        QueryArgs::new().arg("Foo \"Bar\"").named("min", 10),
    )
    .await
    .unwrap();

    let body = client.last_request().json_body().cloned().unwrap();
    assert_eq!(
        body["query"],
        json!({"bool": {"must": [{"match": {"name": "Foo \"Bar\""}}, {"range": {"price": {"gte": 10}}}]}})
    );
}

#[test]
fn test_registration_failures() {
    let (_, repo) = books();

    let err = repo.register("findByAuthor").unwrap_err();
    assert!(matches!(err, OdmError::Query(QueryDerivationError::UnknownProperty { .. })));

    let err = repo.register("findByNameIgnoreCase").unwrap_err();
    assert!(matches!(err, OdmError::Query(_)));

    for name in ["deleteByname", "findByprice", "countByétat", "findFooBar"] {
        let err = repo.register(name).unwrap_err();
        assert!(matches!(err, OdmError::Query(QueryDerivationError::Malformed { .. })));
        assert!(repo.plan(name, &QueryArgs::new()).is_err());
    }

    let err = repo.plan("neverRegistered", &QueryArgs::new()).unwrap_err();
    assert!(matches!(err, OdmError::Query(QueryDerivationError::Malformed { .. })));
}

#[test]
fn test_blocking_repository_runs_derived_queries() {
    let (client, ops) = operations();
    let repo = BlockingRepository::<Book, _>::new(ops).unwrap();
    repo.register("findByNameAndPrice").unwrap();
    repo.register("countByName").unwrap();
    client.respond(201, json!({"_id": "1", "_version": 1}));
    client.respond(200, search_response(1, &[("1", json!({"name": "Foo", "price": 42}))]));
    client.respond(200, json!({"count": 1}));
    client.respond(200, json!({"deleted": 1}));

    let saved = repo.save(&Book::new("1", "Foo", 42)).unwrap();
    let found = repo
        .execute("findByNameAndPrice", QueryArgs::new().arg("Foo").arg(42))
        .unwrap()
        .into_items();
    assert_eq!(found, vec![saved]);
    let count = repo.execute("countByName", QueryArgs::new().arg("Foo")).unwrap();
    assert!(matches!(count, QueryResult::Count(1)));
    assert_eq!(repo.delete_all().unwrap(), 1);

    assert!(repo.register("deleteByname").is_err());
    assert_eq!(client.pending(), 0);
}

#[test]
fn test_blocking_repository_from_operations_facade() {
    let (client, ops) = operations();
    let blocking = BlockingOperations::new(ops).unwrap();
    let repo = blocking.repository::<Book>().unwrap();
    repo.register("existsByName").unwrap();
    client.respond(200, json!({"count": 0}));
    client.respond(404, json!({"_id": "7", "found": false}));

    let exists = repo.execute("existsByName", QueryArgs::new().arg("Nope")).unwrap();
    assert!(matches!(exists, QueryResult::Exists(false)));
    assert_eq!(repo.find_by_id("7").unwrap(), None);
    assert_eq!(client.last_request().path, "/books/_doc/7");
}

#[test]
fn test_shared_registry_builds_once_across_threads() {
    let registry = Arc::new(MetadataRegistry::default());
    let handles: Vec<_> = (0..50)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || registry.metadata_for::<Book>().unwrap())
        })
        .collect();

    let first = registry.metadata_for::<Book>().unwrap();
    for handle in handles {
        assert!(Arc::ptr_eq(&handle.join().unwrap(), &first));
    }
    assert_eq!(registry.build_count(), 1);
}
