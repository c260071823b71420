//! Schema catalog construction from tabular inputs.
//!
//! Reads three CSV files produced by the schema-mining pipeline:
//! - `frequent_table.csv` — table names and comments
//! - `frequent_column_enriched.csv` — column metadata with PK/FK enrichment
//! - `join_edges.csv` — explicit join mappings with confidence levels

use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use super::model::{
    Column, Confidence, FkTarget, JoinEdge, SchemaCatalog, Table, PHI_COLUMNS,
};

/// Pattern: `TABLE.column(confidence:rel_type)`
static FK_TARGET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)\.(\w+)\((\w+):([^)]+)\)$").expect("fk target regex"));

/// Fallback pattern: bare `TABLE.column`
static FK_SIMPLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)\.(\w+)$").expect("fk simple regex"));

/// Known table-name prefixes used for family grouping. Longer variants
/// precede their shorter prefixes so the most specific family wins.
const FAMILY_PREFIXES: &[&str] = &[
    "EYESCREEN", "IPTBOOK", "DCTORDER", "IPTADM", "OPDDCT", "OPDLED", "OPPOST", "OPPROC",
    "LVSTEXM", "LABEXM", "MEDITEM", "PTTYPE", "BDVST", "DLVST", "PRSC", "OVST", "IPT", "MED",
    "LAB", "PT", "RM", "BD", "CN", "WARD", "MAST", "ANC", "RDO", "MOL", "MOTP", "LCT", "ARPT",
    "INCPT",
];

#[derive(Debug, Deserialize)]
struct TableRecord {
    #[serde(default)]
    table_name: String,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    column_count: String,
}

#[derive(Debug, Deserialize)]
struct ColumnRecord {
    #[serde(default)]
    table_name: String,
    #[serde(default)]
    column_name: String,
    #[serde(default)]
    database_type: String,
    #[serde(default)]
    base_type: String,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    is_pk: String,
    #[serde(default)]
    pk_confidence: String,
    #[serde(default)]
    pk_reason: String,
    #[serde(default)]
    is_fk: String,
    #[serde(default)]
    fk_targets: String,
    #[serde(default)]
    join_peers: String,
    #[serde(default)]
    join_warning: String,
}

#[derive(Debug, Deserialize)]
struct EdgeRecord {
    #[serde(default)]
    from_table: String,
    #[serde(default)]
    from_column: String,
    #[serde(default)]
    to_table: String,
    #[serde(default)]
    to_column: String,
    #[serde(default)]
    confidence: String,
    #[serde(default)]
    rel_type: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    warnings_from: String,
    #[serde(default)]
    warnings_to: String,
}

/// Parse an `fk_targets` cell like
/// `PT.hn(high:universal); IPT.an(medium:within_family)`.
pub fn parse_fk_targets(raw: &str) -> Vec<FkTarget> {
    let mut targets = Vec::new();

    for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some(caps) = FK_TARGET_RE.captures(part) {
            targets.push(FkTarget {
                table: caps[1].to_uppercase(),
                column: caps[2].to_lowercase(),
                confidence: Confidence::parse(&caps[3]),
                rel_type: caps[4].to_string(),
            });
        } else if let Some(caps) = FK_SIMPLE_RE.captures(part) {
            targets.push(FkTarget {
                table: caps[1].to_uppercase(),
                column: caps[2].to_lowercase(),
                confidence: Confidence::Medium,
                rel_type: "unknown".to_string(),
            });
        }
    }

    targets
}

pub fn parse_join_peers(raw: &str) -> Vec<String> {
    raw.split(';').map(str::trim).filter(|p| !p.is_empty()).map(str::to_string).collect()
}

/// Infer the family tag from the table-name prefix.
pub fn infer_family(table_name: &str) -> String {
    let upper = table_name.to_uppercase();
    for prefix in FAMILY_PREFIXES {
        if upper.starts_with(prefix) {
            return (*prefix).to_string();
        }
    }

    // Fall back to the leading 4/3/2 alphabetic characters
    for len in [4usize, 3, 2] {
        if upper.len() >= len {
            let prefix = &upper[..len];
            if prefix.chars().all(|c| c.is_ascii_alphabetic()) {
                return prefix.to_string();
            }
        }
    }

    upper
}

fn csv_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, csv::Error> {
    csv::ReaderBuilder::new().trim(csv::Trim::All).flexible(true).from_path(path)
}

fn load_tables(path: &Path, tables: &mut BTreeMap<String, Table>) -> anyhow::Result<()> {
    let mut reader = csv_reader(path)?;
    for record in reader.deserialize::<TableRecord>() {
        let record = record?;
        let table_name = record.table_name.trim().to_uppercase();
        if table_name.is_empty() {
            continue;
        }

        tables.insert(
            table_name.clone(),
            Table {
                name: table_name.clone(),
                comment: record.comment.trim().to_string(),
                column_count: record.column_count.trim().parse().unwrap_or(0),
                columns: BTreeMap::new(),
                family: infer_family(&table_name),
            },
        );
    }
    Ok(())
}

fn load_columns(path: &Path, tables: &mut BTreeMap<String, Table>) -> anyhow::Result<()> {
    let mut reader = csv_reader(path)?;
    for record in reader.deserialize::<ColumnRecord>() {
        let record = record?;
        let table_name = record.table_name.trim().to_uppercase();
        let column_name = record.column_name.trim().to_lowercase();
        if table_name.is_empty() || column_name.is_empty() {
            continue;
        }

        // Tables may appear in the column file only
        let table = tables.entry(table_name.clone()).or_insert_with(|| Table {
            name: table_name.clone(),
            family: infer_family(&table_name),
            ..Default::default()
        });

        let column = Column {
            name: column_name.clone(),
            data_type: record.database_type.trim().to_string(),
            base_type: record.base_type.trim().to_string(),
            comment: record.comment.trim().to_string(),
            is_pk: record.is_pk.trim() == "1",
            pk_confidence: record.pk_confidence.trim().to_string(),
            pk_reason: record.pk_reason.trim().to_string(),
            is_fk: record.is_fk.trim() == "1",
            fk_targets: parse_fk_targets(&record.fk_targets),
            join_peers: parse_join_peers(&record.join_peers),
            join_warning: record.join_warning.trim().to_string(),
            // Frozen here; never recomputed during validation
            is_phi: PHI_COLUMNS.contains(column_name.as_str()),
        };

        table.columns.insert(column_name, column);
    }
    Ok(())
}

fn load_join_edges(path: &Path) -> anyhow::Result<Vec<JoinEdge>> {
    let mut edges = Vec::new();
    let mut reader = csv_reader(path)?;
    for record in reader.deserialize::<EdgeRecord>() {
        let record = record?;
        let from_table = record.from_table.trim().to_uppercase();
        let to_table = record.to_table.trim().to_uppercase();
        if from_table.is_empty() || to_table.is_empty() {
            continue;
        }

        edges.push(JoinEdge {
            from_table,
            from_column: record.from_column.trim().to_lowercase(),
            to_table,
            to_column: record.to_column.trim().to_lowercase(),
            confidence: Confidence::parse(&record.confidence),
            rel_type: record.rel_type.trim().to_string(),
            source: record.source.trim().to_string(),
            warning_from: record.warnings_from.trim().to_string(),
            warning_to: record.warnings_to.trim().to_string(),
        });
    }
    Ok(edges)
}

fn build_families(tables: &BTreeMap<String, Table>) -> BTreeMap<String, Vec<String>> {
    let mut families: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for table in tables.values() {
        let family =
            if table.family.is_empty() { infer_family(&table.name) } else { table.family.clone() };
        families.entry(family).or_default().push(table.name.clone());
    }
    for members in families.values_mut() {
        members.sort();
    }
    families
}

/// Build a catalog from the schema CSV directory.
///
/// The directory must exist; individual missing files degrade with a
/// warning so a partially mined schema still loads.
pub fn load_catalog(schema_dir: &Path) -> anyhow::Result<SchemaCatalog> {
    if !schema_dir.is_dir() {
        anyhow::bail!("Schema directory not found: {}", schema_dir.display());
    }

    let mut tables = BTreeMap::new();

    let tables_path = schema_dir.join("frequent_table.csv");
    if tables_path.exists() {
        load_tables(&tables_path, &mut tables)?;
    } else {
        tracing::warn!("Schema file not found: {}", tables_path.display());
    }

    let columns_path = schema_dir.join("frequent_column_enriched.csv");
    if columns_path.exists() {
        load_columns(&columns_path, &mut tables)?;
    } else {
        tracing::warn!("Schema file not found: {}", columns_path.display());
    }

    let edges_path = schema_dir.join("join_edges.csv");
    let join_edges = if edges_path.exists() {
        load_join_edges(&edges_path)?
    } else {
        tracing::warn!("Schema file not found: {}", edges_path.display());
        Vec::new()
    };

    if tables.is_empty() {
        anyhow::bail!("No tables loaded from {}", schema_dir.display());
    }

    let families = build_families(&tables);
    let catalog = SchemaCatalog { tables, join_edges, families };

    let stats = catalog.stats();
    tracing::info!(
        "Schema catalog loaded: {} tables, {} columns, {} join edges, {} families",
        stats.tables,
        stats.columns,
        stats.join_edges,
        stats.families
    );

    Ok(catalog)
}
