//! Publication identifier handling for cross-corpus dedup.

use std::collections::HashSet;
use std::fmt;

use grna_common::Document;

use crate::models::split_source_ids;

/// A publication reference as found in the plasmid corpus.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PublicationId {
    /// Canonical PubMed form, e.g. `23287718`.
    PubMed(String),
    /// PubMed Central form, normalised to an upper-case `PMC` prefix.
    PubMedCentral(String),
}

impl PublicationId {
    /// Classify a raw identifier. Blank input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.get(..3) {
            Some(prefix) if prefix.eq_ignore_ascii_case("pmc") => {
                Some(Self::PubMedCentral(format!("PMC{}", &raw[3..])))
            }
            _ => Some(Self::PubMed(raw.to_string())),
        }
    }

    /// The key used for "already have it" checks.
    pub fn key(&self) -> &str {
        match self {
            Self::PubMed(id) | Self::PubMedCentral(id) => id,
        }
    }

    pub fn is_pmc(&self) -> bool {
        matches!(self, Self::PubMedCentral(_))
    }
}

impl fmt::Display for PublicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Identifiers already covered by the abstract corpus: every stored
/// `pubmed_id` plus every spelling listed in its `source_id`.
#[derive(Debug, Clone, Default)]
pub struct KnownPublications {
    ids: HashSet<String>,
}

impl KnownPublications {
    pub fn from_documents(docs: &[Document]) -> Self {
        let mut ids = HashSet::new();
        for doc in docs {
            if let Some(pmid) = doc.field("pubmed_id").map(str::trim).filter(|id| !id.is_empty()) {
                ids.insert(pmid.to_string());
            }
            if let Some(raw) = doc.field("source_id") {
                ids.extend(split_source_ids(raw).map(String::from));
            }
        }
        Self { ids }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns false if `id` was already present.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.ids.remove(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
