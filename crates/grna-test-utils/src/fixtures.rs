//! Addgene snapshot fixtures.

use std::io::Write;

use grna_common::{Document, Metadata, MetadataValue};
use tempfile::NamedTempFile;

pub const TSV_HEADER: &str = "Target\tSpecies\tgRNA sequence\tAddgene Plasmid ID\tApplication\tCas9 species\tPubmed ID\tAuthor/Lab";

/// One TSV data row: `(target, species, grna, addgene_id, application, cas9, pubmed_id, lab)`.
pub type Row<'a> = [&'a str; 8];

/// The two-row snapshot used by round-trip tests.
pub const TWO_ROWS: [Row<'static>; 2] = [
    ["AAVS1", "H. sapiens", "GGGGCCACTAGGGACAGGAT", "41817", "cut", "S. pyogenes", "23287718", "Zhang"],
    ["EGFP", "M. musculus", "GGGCGAGGAGCTGTTCACCG", "48140", "cut", "S. pyogenes", "PMC3969858", "Church"],
];

/// Write `rows` under the standard header to a temp file.
pub fn write_tsv(rows: &[Row<'_>]) -> NamedTempFile {
    let mut f = NamedTempFile::new().expect("create temp tsv");
    writeln!(f, "{TSV_HEADER}").expect("write header");
    for row in rows {
        writeln!(f, "{}", row.join("\t")).expect("write row");
    }
    f
}

/// A plasmid-corpus document carrying only a publication reference.
pub fn plasmid_doc(row: usize, pubmed_id: &str) -> Document {
    let mut meta = Metadata::new();
    meta.insert("pubmed_id".into(), MetadataValue::from(pubmed_id));
    meta.insert("row_index".into(), MetadataValue::Int(row as i64));
    Document::new(format!("entry_{row}"), format!("Target: T{row} | Pubmed ID: {pubmed_id}"), meta)
        .expect("valid fixture document")
}
