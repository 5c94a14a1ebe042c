//! Translation-only agents. Each agent turns an `Intent` (and, for a narrow
//! class of list-style requests, the raw query text) into an `AgentResult`
//! without ever calling another agent — fan-out and retry both live one
//! level up, in the orchestrator.

mod measurement;
mod metadata;
mod semantic;

pub use measurement::MeasurementAgent;
pub use metadata::MetadataAgent;
pub use semantic::SemanticAgent;

/// Strips a markdown code fence an LLM sometimes wraps generated SQL/Cypher
/// in (` ```sql ... ``` ` or plain ` ``` ... ``` `).
pub(crate) fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let rest = rest.strip_prefix("sql").or_else(|| rest.strip_prefix("cypher")).unwrap_or(rest);
    let rest = rest.trim_start_matches('\n');
    rest.trim_end_matches("```").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_labeled_fence() {
        assert_eq!(strip_code_fence("```sql\nSELECT 1\n```"), "SELECT 1");
    }

    #[test]
    fn strips_bare_fence() {
        assert_eq!(strip_code_fence("```\nMATCH (n) RETURN n\n```"), "MATCH (n) RETURN n");
    }

    #[test]
    fn passes_through_unfenced_text() {
        assert_eq!(strip_code_fence("SELECT 1"), "SELECT 1");
    }
}
