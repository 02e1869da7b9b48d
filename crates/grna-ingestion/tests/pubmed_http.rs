//! PubMed client against a mocked E-utilities server.

use std::time::Duration;

use grna_ingestion::sources::pubmed::PubMedClient;
use grna_ingestion::{BibliographicSource, SourceError};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ELINK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<eLinkResult><LinkSet><DbFrom>pmc</DbFrom><IdList><Id>3969858</Id></IdList>
<LinkSetDb><DbTo>pubmed</DbTo><LinkName>pmc_pubmed</LinkName><Link><Id>23287718</Id></Link></LinkSetDb>
</LinkSet></eLinkResult>"#;

const EFETCH_XML: &str = r#"<?xml version="1.0" ?>
<PubmedArticleSet><PubmedArticle><MedlineCitation><Article><Abstract>
<AbstractText>Functional elucidation of causal genetic variants.</AbstractText>
<AbstractText>We engineered two different type II CRISPR systems.</AbstractText>
</Abstract></Article></MedlineCitation></PubmedArticle></PubmedArticleSet>"#;

fn client(server: &MockServer, api_key: Option<&str>) -> PubMedClient {
    PubMedClient::with_options(&server.uri(), api_key.map(String::from), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_resolve_pmcid_sends_elink_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/elink.fcgi"))
        .and(query_param("dbfrom", "pmc"))
        .and(query_param("db", "pubmed"))
        .and(query_param("id", "PMC3969858"))
        .and(query_param("retmode", "xml"))
        .and(query_param("api_key", "k"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ELINK_XML))
        .expect(1)
        .mount(&server)
        .await;

    let pmid = client(&server, Some("k")).resolve_pmcid("PMC3969858").await.unwrap();
    assert_eq!(pmid.as_deref(), Some("23287718"));
}

#[tokio::test]
async fn test_fetch_abstract_joins_fragments() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/efetch.fcgi"))
        .and(query_param("db", "pubmed"))
        .and(query_param("id", "23287718"))
        .and(query_param("rettype", "abstract"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EFETCH_XML))
        .mount(&server)
        .await;

    let text = client(&server, None).fetch_abstract("23287718").await.unwrap();
    assert_eq!(
        text,
        "Functional elucidation of causal genetic variants. We engineered two different type II CRISPR systems."
    );
}

#[tokio::test]
async fn test_server_error_is_per_identifier_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/efetch.fcgi"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client(&server, None).fetch_abstract("1").await.unwrap_err();
    assert!(matches!(err, SourceError::Status { status: 500, ref id } if id == "1"));
}

#[tokio::test]
async fn test_slow_response_is_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/efetch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EFETCH_XML).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let client = PubMedClient::with_options(&server.uri(), None, Duration::from_millis(200)).unwrap();
    let err = client.fetch_abstract("1").await.unwrap_err();
    assert!(matches!(err, SourceError::Timeout { .. }), "unexpected error: {err}");
}

#[tokio::test]
#[ignore] // Requires network access
async fn test_live_pubmed_round_trip() {
    let client = PubMedClient::new(None).unwrap();
    let pmid = client.resolve_pmcid("PMC3969858").await.unwrap();
    assert!(pmid.is_some());
    let text = client.fetch_abstract(pmid.as_deref().unwrap()).await.unwrap();
    assert!(!text.is_empty());
}
