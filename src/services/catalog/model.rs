//! Schema catalog data model.
//!
//! Single source of truth for table/column existence, PHI status, and join
//! relationships. Immutable after construction; the published handle in
//! `CatalogService` swaps whole snapshots atomically on rebuild.

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Column names that must never appear in a SELECT output. Closed set,
/// matched against the lowercase column name. Frozen at load time.
pub static PHI_COLUMNS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        // Patient identifiers
        "hn", "cid", "passport", "mrn", "national_id", "idcard", "pid",
        // Names
        "fname", "lname", "mname", "pname", "name", "fullname", "firstname", "lastname",
        "middlename", "prename",
        // Contact info
        "phone", "mobile", "tel", "telephone", "email", "fax",
        // Address
        "address", "addrpart", "moo", "road", "tambon", "amphur", "province", "zipcode",
        "postcode", "homeaddr", "workaddr",
        // Date of birth (exact)
        "dob", "birthdate", "birthday", "bdate",
        // Other quasi-identifiers
        "ssn", "social_security", "insurance_id", "member_id",
    ])
});

/// Cross-family identifiers that bridge table families (patient, admission,
/// visit).
pub static UNIVERSAL_KEYS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| HashSet::from(["hn", "an", "vn"]));

/// Join edge confidence, ordered `High > Medium > Heuristic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    #[default]
    Medium,
    Heuristic,
}

impl Confidence {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "high" => Self::High,
            "heuristic" => Self::Heuristic,
            _ => Self::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Heuristic => "heuristic",
        }
    }

    /// Base score used for join-edge ranking.
    pub fn base_score(&self) -> i32 {
        match self {
            Self::High => 100,
            Self::Medium => 50,
            Self::Heuristic => 25,
        }
    }
}

/// Foreign key target with confidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FkTarget {
    pub table: String,
    pub column: String,
    pub confidence: Confidence,
    pub rel_type: String,
}

/// Column metadata. `name` is lowercase canonical.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(default)]
    pub data_type: String,
    #[serde(default)]
    pub base_type: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub is_pk: bool,
    #[serde(default)]
    pub pk_confidence: String,
    #[serde(default)]
    pub pk_reason: String,
    #[serde(default)]
    pub is_fk: bool,
    #[serde(default)]
    pub fk_targets: Vec<FkTarget>,
    /// "TABLE.column" peers this column is known to join against
    #[serde(default)]
    pub join_peers: Vec<String>,
    #[serde(default)]
    pub join_warning: String,
    #[serde(default)]
    pub is_phi: bool,
}

/// Table metadata. `name` is uppercase canonical.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub column_count: usize,
    #[serde(default)]
    pub columns: BTreeMap<String, Column>,
    /// Prefix grouping used only for schema presentation
    #[serde(default)]
    pub family: String,
}

/// Directed logical relationship between two columns. Treated as
/// bidirectional during path search by synthesizing the reverse at query
/// time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinEdge {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
    pub confidence: Confidence,
    #[serde(default)]
    pub rel_type: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub warning_from: String,
    #[serde(default)]
    pub warning_to: String,
}

impl JoinEdge {
    pub fn reversed(&self) -> JoinEdge {
        JoinEdge {
            from_table: self.to_table.clone(),
            from_column: self.to_column.clone(),
            to_table: self.from_table.clone(),
            to_column: self.from_column.clone(),
            confidence: self.confidence,
            rel_type: self.rel_type.clone(),
            source: self.source.clone(),
            warning_from: self.warning_to.clone(),
            warning_to: self.warning_from.clone(),
        }
    }

    pub fn has_warning(&self) -> bool {
        !self.warning_from.is_empty() || !self.warning_to.is_empty()
    }

    pub fn warning(&self) -> &str {
        if !self.warning_from.is_empty() { &self.warning_from } else { &self.warning_to }
    }

    /// Whether this edge connects `(a.ca, b.cb)` in either direction.
    pub fn connects(&self, table_a: &str, col_a: &str, table_b: &str, col_b: &str) -> bool {
        (self.from_table == table_a
            && self.from_column == col_a
            && self.to_table == table_b
            && self.to_column == col_b)
            || (self.from_table == table_b
                && self.from_column == col_b
                && self.to_table == table_a
                && self.to_column == col_a)
    }
}

/// Complete schema knowledge consulted by the guard and the prompt builder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaCatalog {
    pub tables: BTreeMap<String, Table>,
    pub join_edges: Vec<JoinEdge>,
    pub families: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub tables: usize,
    pub columns: usize,
    pub join_edges: usize,
    pub families: usize,
}

impl SchemaCatalog {
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(&name.to_uppercase())
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(&name.to_uppercase())
    }

    pub fn get_column(&self, table_name: &str, column_name: &str) -> Option<&Column> {
        self.get_table(table_name)?.columns.get(&column_name.to_lowercase())
    }

    pub fn column_exists(&self, table_name: &str, column_name: &str) -> bool {
        self.get_column(table_name, column_name).is_some()
    }

    pub fn column_names(&self, table_name: &str) -> Vec<String> {
        self.get_table(table_name)
            .map(|t| t.columns.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_phi_column(&self, column_name: &str) -> bool {
        PHI_COLUMNS.contains(column_name.to_lowercase().as_str())
    }

    /// Whether the column is one of the cross-family identifiers
    /// (`hn`, `an`, `vn`).
    pub fn is_universal_key(&self, column_name: &str) -> bool {
        UNIVERSAL_KEYS.contains(column_name.to_lowercase().as_str())
    }

    pub fn phi_columns_in_table(&self, table_name: &str) -> Vec<String> {
        self.get_table(table_name)
            .map(|t| {
                t.columns.values().filter(|c| c.is_phi).map(|c| c.name.clone()).collect()
            })
            .unwrap_or_default()
    }

    /// All tables carrying a column with the given (lowercase) name.
    pub fn tables_with_column(&self, column_name: &str) -> Vec<String> {
        let col = column_name.to_lowercase();
        self.tables
            .values()
            .filter(|t| t.columns.contains_key(&col))
            .map(|t| t.name.clone())
            .collect()
    }

    /// Validate table and column references extracted from a query.
    ///
    /// Returns `(invalid_tables, invalid_qualified_columns)`. Columns are
    /// only reported for tables that exist; columns under unknown tables
    /// are covered by the table report.
    pub fn validate_sql_references(
        &self,
        tables: &[String],
        columns: &BTreeMap<String, Vec<String>>,
    ) -> (Vec<String>, Vec<String>) {
        let invalid_tables: Vec<String> =
            tables.iter().filter(|t| !self.table_exists(t)).cloned().collect();

        let mut invalid_columns = Vec::new();
        for (table_name, cols) in columns {
            if !self.table_exists(table_name) {
                continue;
            }
            for col in cols {
                if !self.column_exists(table_name, col) {
                    invalid_columns.push(format!("{}.{}", table_name, col));
                }
            }
        }

        (invalid_tables, invalid_columns)
    }

    /// All known edges connecting two tables (either direction), sorted by
    /// confidence (high first).
    pub fn join_options(&self, from_table: &str, to_table: &str) -> Vec<&JoinEdge> {
        let from_upper = from_table.to_uppercase();
        let to_upper = to_table.to_uppercase();

        let mut options: Vec<&JoinEdge> = self
            .join_edges
            .iter()
            .filter(|e| {
                (e.from_table == from_upper && e.to_table == to_upper)
                    || (e.from_table == to_upper && e.to_table == from_upper)
            })
            .collect();

        options.sort_by_key(|e| match e.confidence {
            Confidence::High => 0,
            Confidence::Medium => 1,
            Confidence::Heuristic => 2,
        });
        options
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            tables: self.tables.len(),
            columns: self.tables.values().map(|t| t.columns.len()).sum(),
            join_edges: self.join_edges.len(),
            families: self.families.len(),
        }
    }
}
