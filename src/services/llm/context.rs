//! Prompt context builders: render the schema catalog and concept library
//! into the grounding text the LLM sees.

use crate::services::catalog::{Confidence, SchemaCatalog};
use crate::services::concepts::ConceptLibrary;

/// Render verified tables and columns, with PHI/PK/FK markers and
/// high-confidence relationship hints.
pub fn build_schema_context(catalog: &SchemaCatalog, max_tables: usize) -> String {
    let mut lines = vec![
        "## VERIFIED TABLES AND COLUMNS".to_string(),
        String::new(),
        "**IMPORTANT**: Only use tables and columns listed below. The schema is incomplete,"
            .to_string(),
        "so if a column isn't listed, it may not exist or may have a different name.".to_string(),
        String::new(),
    ];

    for table in catalog.tables.values().take(max_tables) {
        if table.columns.is_empty() {
            lines.push(format!("**{}**: (no verified columns)", table.name));
            continue;
        }

        let col_display: Vec<String> = table
            .columns
            .values()
            .map(|col| {
                if col.is_phi {
                    format!("{} [PHI-DO NOT SELECT]", col.name)
                } else if col.is_pk {
                    format!("{} [PK]", col.name)
                } else if col.is_fk {
                    format!("{} [FK]", col.name)
                } else {
                    col.name.clone()
                }
            })
            .collect();

        lines.push(format!("**{}**: {}", table.name, col_display.join(", ")));
    }

    let high_confidence: Vec<String> = catalog
        .join_edges
        .iter()
        .filter(|e| e.confidence == Confidence::High)
        .take(20)
        .map(|e| {
            format!("- {} -> {} via {} = {}", e.from_table, e.to_table, e.from_column, e.to_column)
        })
        .collect();

    if !high_confidence.is_empty() {
        lines.push(String::new());
        lines.push("## Key Relationships".to_string());
        lines.push(String::new());
        lines.extend(high_confidence);
    }

    lines.join("\n")
}

/// Render the clinical concept definitions.
pub fn build_concepts_context(concepts: &ConceptLibrary) -> String {
    if concepts.is_empty() {
        return "No clinical concepts defined yet.".to_string();
    }

    let mut lines = vec!["## Clinical Concept Definitions".to_string(), String::new()];

    for concept in concepts.concepts.values() {
        lines.push(format!("**{}**: {}", concept.name, concept.description));
        if let Some(condition) = &concept.condition {
            lines.push(format!("  - SQL condition: `{}`", condition));
        }
        if !concept.tests.is_empty() {
            lines.push(format!("  - Tests: {}", concept.tests.join(", ")));
        }
        if !concept.icd10_codes.is_empty() {
            lines.push(format!("  - ICD-10: {}", concept.icd10_codes.join(", ")));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}
