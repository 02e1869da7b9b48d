//! Result rendering for the terminal and for LLM context.

use std::fmt::Write;

use crate::search::SearchResult;

const RULE: &str = "----------------------------------------";

/// Numbered result blocks: document text, non-empty metadata, and the
/// similarity score when the result has a distance.
pub fn format_results(results: &[SearchResult]) -> String {
    let mut out = Vec::new();
    for (i, r) in results.iter().enumerate() {
        out.push(format!("\n--- Result {} ---", i + 1));
        out.push(format!("Document: {}", r.document));
        out.push("Metadata:".to_string());
        for (key, value) in &r.metadata {
            if !value.is_empty() {
                out.push(format!("  {key}: {value}"));
            }
        }
        if let Some(sim) = r.similarity() {
            out.push(format!("Similarity Score: {sim:.4}"));
        }
        out.push(RULE.to_string());
    }
    out.join("\n")
}

/// Terminal report for one query, with a header line.
pub fn render_report(results: &[SearchResult], label: &str) -> String {
    if results.is_empty() {
        return format!("\nNo results found for query: '{label}'");
    }
    let mut out = String::new();
    let _ = writeln!(out, "\nFound {} results for query: '{label}'\n", results.len());
    let _ = writeln!(out, "{}", "=".repeat(80));
    out.push_str(&format_results(results));
    out
}
