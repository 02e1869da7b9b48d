//! Query interface and RAG flow over an in-memory corpus.

use std::sync::Arc;

use grna_db::{DbError, MemoryStore, MetadataFilter, VectorStore};
use grna_ingestion::loader::load_plasmid_tsv;
use grna_ingestion::models::{PLASMID_COLLECTION, PLASMID_DESCRIPTION};
use grna_ingestion::transform::plasmids_to_documents;
use grna_ingestion::{ingest_documents, IngestMode};
use grna_query::{QueryError, QueryInterface, RagAnswerer, DEFAULT_FILTER_K, DEFAULT_K};
use grna_test_utils::fixtures::{write_tsv, Row, TWO_ROWS};
use grna_test_utils::RecordingLlm;
use pretty_assertions::assert_eq;

const MORE_ROWS: [Row<'static>; 3] = [
    ["EMX1", "H. sapiens", "GAGTCCGAGCAGAAGAAGAA", "42230", "cut", "S. pyogenes", "23287718", "Zhang"],
    ["ADE2", "S. cerevisiae", "ACTCAACCTAATTCTAACAA", "67639", "cut", "S. pyogenes", "", "Ellis"],
    ["AAVS1", "H. sapiens", "GTCACCAATCCTGTCCCTAG", "41818", "nick", "S. pyogenes", "", "Church"],
];

async fn corpus() -> QueryInterface {
    let rows: Vec<Row<'static>> = TWO_ROWS.iter().chain(MORE_ROWS.iter()).copied().collect();
    let file = write_tsv(&rows);
    let docs = plasmids_to_documents(&load_plasmid_tsv(file.path()).unwrap()).unwrap();

    let store: Arc<dyn VectorStore> = Arc::new(MemoryStore::new());
    ingest_documents(store.as_ref(), PLASMID_COLLECTION, PLASMID_DESCRIPTION, &docs, IngestMode::Replace, 2000)
        .await
        .unwrap();
    QueryInterface::connect(store, PLASMID_COLLECTION).await.unwrap()
}

#[tokio::test]
async fn test_search_is_bounded_and_ordered() {
    let q = corpus().await;
    let results = q.search("AAVS1 safe harbor locus H. sapiens", 3).await.unwrap();
    assert!(results.len() <= 3);
    assert!(!results.is_empty());
    for pair in results.windows(2) {
        assert!(pair[0].distance.unwrap() <= pair[1].distance.unwrap());
    }
    assert_eq!(results[0].field_or_na("target"), "AAVS1");
}

#[tokio::test]
async fn test_metadata_filter_is_exact() {
    let q = corpus().await;
    let filter = MetadataFilter::new().eq("species", "H. sapiens");
    let results = q.search_by_metadata(&filter, DEFAULT_FILTER_K).await.unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["entry_0", "entry_2", "entry_4"]);
    assert!(results.iter().all(|r| r.distance.is_none()));

    let none = q
        .search_by_metadata(&MetadataFilter::new().eq("species", "H."), DEFAULT_FILTER_K)
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_info_reports_count_and_description() {
    let q = corpus().await;
    let info = q.info().await.unwrap();
    assert_eq!(info.name, PLASMID_COLLECTION);
    assert_eq!(info.document_count, 5);
    assert_eq!(info.description.as_deref(), Some(PLASMID_DESCRIPTION));
}

#[tokio::test]
async fn test_connect_to_missing_collection_fails() {
    let store: Arc<dyn VectorStore> = Arc::new(MemoryStore::new());
    let err = QueryInterface::connect(store, "absent").await.err().unwrap();
    assert!(matches!(err, QueryError::Store(DbError::NotFound(_))));
}

#[tokio::test]
async fn test_ask_sends_context_and_question() {
    let q = corpus().await;
    let llm = Arc::new(RecordingLlm::new("EMX1 is targeted by plasmid 42230."));
    let answerer = RagAnswerer::new(llm.clone(), 1500);

    let answer = answerer.ask(&q, "Which plasmid targets EMX1?", DEFAULT_K).await.unwrap();
    assert_eq!(answer.answer, "EMX1 is targeted by plasmid 42230.");
    assert!(answer.results.len() <= DEFAULT_K);

    let requests = llm.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].max_tokens, Some(1500));
    let prompt = &requests[0].messages[0].content;
    assert!(prompt.contains("--- Result 1 ---"));
    assert!(prompt.contains("target: EMX1"));
    assert!(prompt.ends_with("Answer the following prompt: Which plasmid targets EMX1?"));
}
