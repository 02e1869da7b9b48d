//! ChromaStore against a mocked ChromaDB HTTP API.

use grna_common::{Document, Metadata, MetadataValue};
use grna_db::{ChromaConfig, ChromaStore, DbError, MetadataFilter, VectorStore};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store_for(server: &MockServer, page_size: usize) -> ChromaStore {
    let url = url_parts(&server.uri());
    ChromaStore::new(
        ChromaConfig { host: url.0, port: url.1, max_batch_size: 3, page_size },
        None,
    )
    .unwrap()
}

fn url_parts(uri: &str) -> (String, u16) {
    let rest = uri.trim_start_matches("http://");
    let (host, port) = rest.split_once(':').unwrap();
    (host.to_string(), port.parse().unwrap())
}

fn collection_json() -> serde_json::Value {
    json!({
        "id": "3f2a-uuid",
        "name": "grna_addgene",
        "metadata": {"description": "gRNA Addgene database for CRISPR applications", "hnsw:space": "cosine"}
    })
}

fn doc(id: &str, target: &str) -> Document {
    let mut meta = Metadata::new();
    meta.insert("target".into(), MetadataValue::from(target));
    Document::new(id, format!("Target: {target}"), meta).unwrap()
}

#[tokio::test]
async fn test_ensure_creates_missing_collection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/collections/grna_addgene"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Collection grna_addgene does not exist."})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/collections"))
        .and(body_partial_json(json!({
            "name": "grna_addgene",
            "get_or_create": true,
            "metadata": {"hnsw:space": "cosine"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(collection_json()))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server, 100);
    let ensured = store
        .ensure("grna_addgene", "gRNA Addgene database for CRISPR applications")
        .await
        .unwrap();
    assert!(ensured.was_created);
    assert_eq!(ensured.collection.id, "3f2a-uuid");
    assert_eq!(
        ensured.collection.description.as_deref(),
        Some("gRNA Addgene database for CRISPR applications")
    );
}

#[tokio::test]
async fn test_ensure_reuses_existing_collection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/collections/grna_addgene"))
        .respond_with(ResponseTemplate::new(200).set_body_json(collection_json()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/collections"))
        .respond_with(ResponseTemplate::new(200).set_body_json(collection_json()))
        .expect(0)
        .mount(&server)
        .await;

    let store = store_for(&server, 100);
    let ensured = store.ensure("grna_addgene", "ignored").await.unwrap();
    assert!(!ensured.was_created);
}

#[tokio::test]
async fn test_add_rejects_ids_already_stored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/collections/3f2a-uuid/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ids": ["entry_0"]})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/collections/3f2a-uuid/add"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!(true)))
        .expect(0)
        .mount(&server)
        .await;

    let store = store_for(&server, 100);
    let coll = grna_db::Collection { id: "3f2a-uuid".into(), name: "grna_addgene".into(), description: None };
    let err = store.add(&coll, &[doc("entry_0", "EGFP")]).await.unwrap_err();
    assert!(matches!(err, DbError::DuplicateId { ref id, .. } if id == "entry_0"));
}

#[tokio::test]
async fn test_add_enforces_batch_limit_before_sending() {
    let server = MockServer::start().await;
    let store = store_for(&server, 100);
    let coll = grna_db::Collection { id: "3f2a-uuid".into(), name: "grna_addgene".into(), description: None };
    let docs: Vec<Document> = (0..4).map(|i| doc(&format!("entry_{i}"), "EGFP")).collect();
    let err = store.add(&coll, &docs).await.unwrap_err();
    assert!(matches!(err, DbError::PayloadTooLarge { size: 4, limit: 3, .. }));
}

#[tokio::test]
async fn test_add_sends_documents_and_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/collections/3f2a-uuid/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ids": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/collections/3f2a-uuid/add"))
        .and(body_partial_json(json!({
            "ids": ["entry_0", "entry_1"],
            "documents": ["Target: EGFP", "Target: AAVS1"],
            "metadatas": [{"target": "EGFP"}, {"target": "AAVS1"}]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server, 100);
    let coll = grna_db::Collection { id: "3f2a-uuid".into(), name: "grna_addgene".into(), description: None };
    store.add(&coll, &[doc("entry_0", "EGFP"), doc("entry_1", "AAVS1")]).await.unwrap();
}

#[tokio::test]
async fn test_get_all_pages_through_collection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/collections/abs-uuid/get"))
        .and(body_partial_json(json!({"offset": 0, "limit": 2})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ids": ["pubmed_1", "pubmed_2"],
            "documents": ["first", "second"],
            "metadatas": [{"pubmed_id": "1"}, {"pubmed_id": "2"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/collections/abs-uuid/get"))
        .and(body_partial_json(json!({"offset": 2, "limit": 2})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ids": ["pubmed_3"],
            "documents": ["third"],
            "metadatas": [{"pubmed_id": "3", "source_id": "PMC99"}]
        })))
        .mount(&server)
        .await;

    let store = store_for(&server, 2);
    let coll = grna_db::Collection { id: "abs-uuid".into(), name: "pubmed_abstracts".into(), description: None };
    let docs = store.get_all(&coll).await.unwrap();
    let ids: Vec<&str> = docs.iter().map(|d| d.id()).collect();
    assert_eq!(ids, vec!["pubmed_1", "pubmed_2", "pubmed_3"]);
    assert_eq!(docs[2].field("source_id"), Some("PMC99"));
}

#[tokio::test]
async fn test_query_sends_text_filter_and_k() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/collections/3f2a-uuid/query"))
        .and(body_partial_json(json!({
            "query_texts": ["EGFP knockout"],
            "n_results": 5,
            "where": {"target": "EGFP"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ids": [["entry_1"]],
            "documents": [["Target: EGFP"]],
            "metadatas": [[{"target": "EGFP"}]],
            "distances": [[0.25]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server, 100);
    let coll = grna_db::Collection { id: "3f2a-uuid".into(), name: "grna_addgene".into(), description: None };
    let filter = MetadataFilter::new().eq("target", "EGFP");
    let hits = store.query(&coll, "EGFP knockout", 5, Some(&filter)).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].distance, Some(0.25));
}

#[tokio::test]
async fn test_empty_text_query_is_filtered_get() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/collections/3f2a-uuid/get"))
        .and(body_partial_json(json!({
            "where": {"species": "H. sapiens"},
            "limit": 10
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ids": ["entry_0", "entry_4"],
            "documents": ["Target: AAVS1", "Target: EMX1"],
            "metadatas": [{"species": "H. sapiens"}, {"species": "H. sapiens"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/collections/3f2a-uuid/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ids": [[]]})))
        .expect(0)
        .mount(&server)
        .await;

    let store = store_for(&server, 100);
    let coll = grna_db::Collection { id: "3f2a-uuid".into(), name: "grna_addgene".into(), description: None };
    let filter = MetadataFilter::new().eq("species", "H. sapiens");
    let hits = store.query(&coll, "", 10, Some(&filter)).await.unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.document.id()).collect();
    assert_eq!(ids, vec!["entry_0", "entry_4"]);
    assert!(hits.iter().all(|h| h.distance.is_none()));
}

#[tokio::test]
async fn test_update_metadata_checks_id_then_posts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/collections/abs-uuid/get"))
        .and(body_partial_json(json!({"ids": ["pubmed_111"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ids": ["pubmed_111"]})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/collections/abs-uuid/get"))
        .and(body_partial_json(json!({"ids": ["pubmed_404"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ids": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/collections/abs-uuid/update"))
        .and(body_partial_json(json!({
            "ids": ["pubmed_111"],
            "metadatas": [{"pubmed_id": "111", "source_id": "111,PMC9"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server, 100);
    let coll = grna_db::Collection { id: "abs-uuid".into(), name: "pubmed_abstracts".into(), description: None };
    let mut meta = Metadata::new();
    meta.insert("pubmed_id".into(), MetadataValue::from("111"));
    meta.insert("source_id".into(), MetadataValue::from("111,PMC9"));
    store.update_metadata(&coll, "pubmed_111", &meta).await.unwrap();

    let err = store.update_metadata(&coll, "pubmed_404", &meta).await.unwrap_err();
    assert!(matches!(err, DbError::MissingDocument { ref id, .. } if id == "pubmed_404"));
}

#[tokio::test]
async fn test_count_and_missing_collection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/collections/3f2a-uuid/count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(7)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/collections/nope"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "ValueError('Collection nope does not exist.')"})))
        .mount(&server)
        .await;

    let store = store_for(&server, 100);
    let coll = grna_db::Collection { id: "3f2a-uuid".into(), name: "grna_addgene".into(), description: None };
    assert_eq!(store.count(&coll).await.unwrap(), 7);
    assert!(matches!(store.get_collection("nope").await, Err(DbError::NotFound(ref n)) if n == "nope"));
}

#[tokio::test]
async fn test_unreachable_server_is_connection_error() {
    let store = ChromaStore::new(
        ChromaConfig { host: "127.0.0.1".into(), port: 1, ..Default::default() },
        None,
    )
    .unwrap();
    let err = store.heartbeat().await.unwrap_err();
    assert!(err.is_connection(), "unexpected error: {err}");
}
