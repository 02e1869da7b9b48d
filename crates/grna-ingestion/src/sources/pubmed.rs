//! PubMed E-utilities client.
//!
//! Endpoints used:
//!   elink:  PMC → PubMed id resolution
//!   efetch: abstract retrieval (rettype=abstract, retmode=xml)

use std::time::Duration;

use async_trait::async_trait;
use grna_common::sandbox::{SandboxClient as Client, DEFAULT_TIMEOUT};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, instrument};

use super::{BibliographicSource, SourceError};

pub const EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

pub struct PubMedClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl PubMedClient {
    pub fn new(api_key: Option<String>) -> Result<Self, SourceError> {
        Self::with_options(EUTILS_BASE_URL, api_key, DEFAULT_TIMEOUT)
    }

    /// Point the client at another E-utilities base (mirrors, test servers).
    pub fn with_options(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let mut client = Client::with_timeout(timeout)?;
        client.allow_url_host(base_url)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn get_xml(
        &self,
        endpoint: &str,
        id: &str,
        mut params: Vec<(&'static str, String)>,
    ) -> Result<String, SourceError> {
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        let url = format!("{}/{}", self.base_url, endpoint);
        let resp = self
            .client
            .get(&url)?
            .query(&params)
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(id, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status { id: id.to_string(), status: status.as_u16() });
        }
        resp.text().await.map_err(|e| SourceError::from_reqwest(id, e))
    }
}

#[async_trait]
impl BibliographicSource for PubMedClient {
    #[instrument(skip(self))]
    async fn resolve_pmcid(&self, pmcid: &str) -> Result<Option<String>, SourceError> {
        let params = vec![
            ("dbfrom", "pmc".to_string()),
            ("id", pmcid.to_string()),
            ("db", "pubmed".to_string()),
            ("retmode", "xml".to_string()),
        ];
        let xml = self.get_xml("elink.fcgi", pmcid, params).await?;
        let pmid = parse_elink_pmid(&xml)
            .map_err(|message| SourceError::Xml { id: pmcid.to_string(), message })?;
        debug!(?pmid, "Resolved PMC id");
        Ok(pmid)
    }

    #[instrument(skip(self))]
    async fn fetch_abstract(&self, pmid: &str) -> Result<String, SourceError> {
        let params = vec![
            ("db", "pubmed".to_string()),
            ("id", pmid.to_string()),
            ("rettype", "abstract".to_string()),
            ("retmode", "xml".to_string()),
        ];
        let xml = self.get_xml("efetch.fcgi", pmid, params).await?;
        let text = parse_abstract_text(&xml)
            .map_err(|message| SourceError::Xml { id: pmid.to_string(), message })?;
        debug!(chars = text.len(), "Fetched abstract");
        Ok(text)
    }
}

/// First `LinkSetDb/Link/Id` in an elink response. The `IdList/Id` echo of
/// the query id is ignored.
pub fn parse_elink_pmid(xml: &str) -> Result<Option<String>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut in_linksetdb = false;
    let mut in_link = false;
    let mut in_id = false;
    let mut saw_root = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                saw_root = true;
                match e.name().as_ref() {
                    b"LinkSetDb" => in_linksetdb = true,
                    b"Link" if in_linksetdb => in_link = true,
                    b"Id" if in_link => in_id = true,
                    _ => {}
                }
            }
            Ok(Event::Empty(_)) => saw_root = true,
            Ok(Event::Text(ref e)) if in_id => {
                let id = e.unescape().map_err(|e| e.to_string())?.trim().to_string();
                if !id.is_empty() {
                    return Ok(Some(id));
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"LinkSetDb" => in_linksetdb = false,
                b"Link" => in_link = false,
                b"Id" => in_id = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err("empty response".to_string());
    }
    Ok(None)
}

/// Every `AbstractText` element's full inner text (nested markup such as
/// `<i>` included), in document order, joined with single spaces.
pub fn parse_abstract_text(xml: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut depth = 0usize;
    let mut current = String::new();
    let mut fragments: Vec<String> = Vec::new();
    let mut saw_root = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                saw_root = true;
                if e.name().as_ref() == b"AbstractText" {
                    depth += 1;
                    if depth == 1 {
                        current.clear();
                    }
                } else if depth > 0 {
                    depth += 1;
                }
            }
            Ok(Event::Empty(_)) => saw_root = true,
            Ok(Event::Text(ref e)) if depth > 0 => {
                current.push_str(&e.unescape().map_err(|e| e.to_string())?);
            }
            Ok(Event::CData(ref e)) if depth > 0 => {
                current.push_str(&String::from_utf8_lossy(e));
            }
            Ok(Event::End(_)) if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    let text = current.split_whitespace().collect::<Vec<_>>().join(" ");
                    if !text.is_empty() {
                        fragments.push(text);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err("empty response".to_string());
    }
    Ok(fragments.join(" "))
}
