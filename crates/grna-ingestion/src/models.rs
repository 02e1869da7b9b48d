//! Source record types and corpus constants.

use grna_common::{Document, DocumentError, Metadata, MetadataValue};
use serde::{Deserialize, Serialize};

pub const PLASMID_COLLECTION: &str = "grna_addgene";
pub const PLASMID_DESCRIPTION: &str = "gRNA Addgene database for CRISPR applications";
pub const ABSTRACT_COLLECTION: &str = "pubmed_abstracts";
pub const ABSTRACT_DESCRIPTION: &str =
    "PubMed Abstracts database for additional information into Addgene plasmids";

/// Addgene TSV columns, in text order, with their metadata keys.
pub const PLASMID_FIELDS: [(&str, &str); 8] = [
    ("Target", "target"),
    ("Species", "species"),
    ("gRNA sequence", "grna_sequence"),
    ("Addgene Plasmid ID", "addgene_id"),
    ("Application", "application"),
    ("Cas9 species", "cas9_species"),
    ("Pubmed ID", "pubmed_id"),
    ("Author/Lab", "author_lab"),
];

/// One row of the Addgene gRNA snapshot. Missing cells are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlasmidRecord {
    pub row_index: usize,
    pub target: Option<String>,
    pub species: Option<String>,
    pub grna_sequence: Option<String>,
    pub addgene_id: Option<String>,
    pub application: Option<String>,
    pub cas9_species: Option<String>,
    /// PubMed (`12345678`) or PubMed Central (`PMC1234567`) spelling.
    pub pubmed_id: Option<String>,
    pub author_lab: Option<String>,
}

impl PlasmidRecord {
    /// Field values in [`PLASMID_FIELDS`] order.
    pub fn values(&self) -> [&Option<String>; 8] {
        [
            &self.target,
            &self.species,
            &self.grna_sequence,
            &self.addgene_id,
            &self.application,
            &self.cas9_species,
            &self.pubmed_id,
            &self.author_lab,
        ]
    }

    /// Set a field by metadata key. Unknown keys are ignored.
    pub fn set(&mut self, key: &str, value: Option<String>) {
        let slot = match key {
            "target" => &mut self.target,
            "species" => &mut self.species,
            "grna_sequence" => &mut self.grna_sequence,
            "addgene_id" => &mut self.addgene_id,
            "application" => &mut self.application,
            "cas9_species" => &mut self.cas9_species,
            "pubmed_id" => &mut self.pubmed_id,
            "author_lab" => &mut self.author_lab,
            _ => return,
        };
        *slot = value;
    }
}

/// Separator between spellings in the stored `source_id` field.
pub const SOURCE_ID_SEPARATOR: &str = ",";

/// Spellings held in a stored `source_id` value.
pub fn split_source_ids(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(SOURCE_ID_SEPARATOR).map(str::trim).filter(|s| !s.is_empty())
}

/// A fetched publication abstract, keyed by canonical PubMed id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbstractRecord {
    pub pubmed_id: String,
    /// Every spelling the plasmid corpus referenced it by (PubMed or PMC),
    /// first reference first.
    pub source_ids: Vec<String>,
    pub abstract_text: String,
}

impl AbstractRecord {
    pub fn new(pubmed_id: impl Into<String>, source_id: impl Into<String>, abstract_text: impl Into<String>) -> Self {
        Self {
            pubmed_id: pubmed_id.into(),
            source_ids: vec![source_id.into()],
            abstract_text: abstract_text.into(),
        }
    }

    /// Record another spelling for the same publication.
    pub fn add_source_id(&mut self, source_id: &str) {
        if !self.source_ids.iter().any(|s| s == source_id) {
            self.source_ids.push(source_id.to_string());
        }
    }

    pub fn document_id(&self) -> String {
        format!("pubmed_{}", self.pubmed_id)
    }

    pub fn to_document(&self) -> Result<Document, DocumentError> {
        let text = if self.abstract_text.trim().is_empty() {
            format!("PubMed ID: {} (no abstract available)", self.pubmed_id)
        } else {
            self.abstract_text.clone()
        };
        let mut metadata = Metadata::new();
        metadata.insert("pubmed_id".into(), MetadataValue::from(self.pubmed_id.as_str()));
        metadata.insert(
            "source_id".into(),
            MetadataValue::from(self.source_ids.join(SOURCE_ID_SEPARATOR)),
        );
        metadata.insert(
            "abstract_length".into(),
            MetadataValue::Int(self.abstract_text.chars().count() as i64),
        );
        Document::new(self.document_id(), text, metadata)
    }
}
