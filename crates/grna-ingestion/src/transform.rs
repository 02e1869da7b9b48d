//! Source record → [`Document`] transformation. Pure; no I/O.

use std::collections::{BTreeMap, HashSet};

use grna_common::{Document, Metadata, MetadataValue};
use serde_json::Value;

use crate::error::{IngestionError, Result};
use crate::models::{PlasmidRecord, PLASMID_FIELDS};

// ── Tabular ───────────────────────────────────────────────────────────────────

/// `entry_<row>` document with `"Field: value"` text and all eight metadata
/// fields (missing → `""`) plus integer `row_index`.
pub fn plasmid_to_document(record: &PlasmidRecord) -> Result<Document> {
    let mut fragments = Vec::with_capacity(PLASMID_FIELDS.len());
    let mut metadata = Metadata::new();

    for ((column, key), value) in PLASMID_FIELDS.iter().zip(record.values()) {
        if let Some(v) = value {
            fragments.push(format!("{column}: {v}"));
        }
        metadata.insert(
            key.to_string(),
            MetadataValue::from(value.as_deref().unwrap_or_default()),
        );
    }
    metadata.insert("row_index".into(), MetadataValue::Int(record.row_index as i64));

    Ok(Document::new(
        format!("entry_{}", record.row_index),
        fragments.join(" | "),
        metadata,
    )?)
}

pub fn plasmids_to_documents(records: &[PlasmidRecord]) -> Result<Vec<Document>> {
    records.iter().map(plasmid_to_document).collect()
}

// ── JSON ──────────────────────────────────────────────────────────────────────

/// Transform a list of JSON objects, each carrying an explicit `id`.
pub fn json_to_documents(records: &[Value]) -> Result<Vec<Document>> {
    let mut seen = HashSet::with_capacity(records.len());
    let mut docs = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        let obj = record.as_object().ok_or_else(|| {
            IngestionError::Schema(format!("record {index} is not an object"))
        })?;

        let id = match obj.get("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(_)) | Some(Value::Null) | None => {
                return Err(IngestionError::MissingId { index })
            }
            Some(other) => {
                return Err(IngestionError::Schema(format!(
                    "record {index} has a non-scalar id: {other}"
                )))
            }
        };
        if !seen.insert(id.clone()) {
            return Err(IngestionError::DuplicateId(id));
        }

        // serde_json::Map is ordered by key unless `preserve_order` is on;
        // sort explicitly so the text never depends on that feature.
        let text = serde_json::to_string(&sorted(record))?;
        let mut metadata = Metadata::new();
        flatten_into(&mut metadata, "", record);
        docs.push(Document::new(id, text, metadata)?);
    }
    Ok(docs)
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, sorted(v))).collect();
            Value::Object(ordered.into_iter().map(|(k, v)| (k.clone(), v)).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// Flatten `value` into scalar metadata under `prefix`.
pub fn flatten_into(out: &mut Metadata, prefix: &str, value: &Value) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() { k.clone() } else { format!("{prefix}.{k}") };
                flatten_into(out, &key, v);
            }
        }
        _ if prefix.is_empty() => {}
        Value::Null => {
            out.insert(prefix.to_string(), MetadataValue::from(""));
        }
        Value::Bool(b) => {
            out.insert(prefix.to_string(), MetadataValue::Bool(*b));
        }
        Value::Number(n) => {
            let v = match n.as_i64() {
                Some(i) => MetadataValue::Int(i),
                None => MetadataValue::Float(n.as_f64().unwrap_or_default()),
            };
            out.insert(prefix.to_string(), v);
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), MetadataValue::from(s.as_str()));
        }
        Value::Array(items) => {
            let joined = if items.iter().any(|v| v.is_object() || v.is_array()) {
                value.to_string()
            } else {
                items.iter().map(scalar_string).collect::<Vec<_>>().join(",")
            };
            out.insert(prefix.to_string(), MetadataValue::from(joined));
        }
    }
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(row: usize, target: &str, species: &str) -> PlasmidRecord {
        PlasmidRecord {
            row_index: row,
            target: Some(target.into()),
            species: Some(species.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_plasmid_text_and_metadata() {
        let mut rec = record(3, "AAVS1", "H. sapiens");
        rec.pubmed_id = Some("PMC3969858".into());
        let doc = plasmid_to_document(&rec).unwrap();

        assert_eq!(doc.id(), "entry_3");
        assert_eq!(doc.text(), "Target: AAVS1 | Species: H. sapiens | Pubmed ID: PMC3969858");
        assert_eq!(doc.field("grna_sequence"), Some(""));
        assert_eq!(doc.field("pubmed_id"), Some("PMC3969858"));
        assert_eq!(doc.metadata()["row_index"], MetadataValue::Int(3));
        assert_eq!(doc.metadata().len(), 9);
    }

    #[test]
    fn test_plasmid_transform_is_deterministic() {
        let rec = record(0, "EGFP", "M. musculus");
        assert_eq!(plasmid_to_document(&rec).unwrap(), plasmid_to_document(&rec).unwrap());
    }

    #[test]
    fn test_json_flattening() {
        let docs = json_to_documents(&[json!({
            "id": 7,
            "name": "px330",
            "tags": ["cut", "nick"],
            "gene": {"symbol": "EMX1", "aliases": null},
            "refs": [{"pmid": "1"}],
            "active": true
        })])
        .unwrap();
        let doc = &docs[0];
        assert_eq!(doc.id(), "7");
        assert_eq!(doc.field("tags"), Some("cut,nick"));
        assert_eq!(doc.field("gene.symbol"), Some("EMX1"));
        assert_eq!(doc.field("gene.aliases"), Some(""));
        assert_eq!(doc.field("refs"), Some(r#"[{"pmid":"1"}]"#));
        assert_eq!(doc.metadata()["active"], MetadataValue::Bool(true));
        assert_eq!(doc.metadata()["id"], MetadataValue::Int(7));
    }

    #[test]
    fn test_json_text_has_sorted_keys() {
        let docs = json_to_documents(&[json!({"id": "a", "zeta": 1, "alpha": {"y": 2, "x": 1}})]).unwrap();
        assert_eq!(docs[0].text(), r#"{"alpha":{"x":1,"y":2},"id":"a","zeta":1}"#);
    }

    #[test]
    fn test_json_missing_and_duplicate_ids() {
        assert!(matches!(
            json_to_documents(&[json!({"id": "a"}), json!({"name": "no id"})]),
            Err(IngestionError::MissingId { index: 1 })
        ));
        assert!(matches!(
            json_to_documents(&[json!({"id": ""})]),
            Err(IngestionError::MissingId { index: 0 })
        ));
        assert!(matches!(
            json_to_documents(&[json!({"id": "a"}), json!({"id": "a"})]),
            Err(IngestionError::DuplicateId(ref id)) if id == "a"
        ));
    }
}
