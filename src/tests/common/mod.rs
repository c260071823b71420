//! Shared fixtures for the test suite.

use std::collections::BTreeMap;

use crate::services::catalog::{
    Column, Confidence, JoinEdge, SchemaCatalog, Table, PHI_COLUMNS,
};

pub fn col(name: &str) -> Column {
    Column {
        name: name.to_string(),
        data_type: "varchar".to_string(),
        is_phi: PHI_COLUMNS.contains(name),
        ..Default::default()
    }
}

pub fn pk_col(name: &str) -> Column {
    Column { is_pk: true, ..col(name) }
}

pub fn table(name: &str, columns: Vec<Column>) -> Table {
    let mut map = BTreeMap::new();
    for c in columns {
        map.insert(c.name.clone(), c);
    }
    Table {
        name: name.to_string(),
        column_count: map.len(),
        columns: map,
        family: name.to_string(),
        ..Default::default()
    }
}

pub fn edge(
    from: (&str, &str),
    to: (&str, &str),
    confidence: Confidence,
    rel_type: &str,
) -> JoinEdge {
    JoinEdge {
        from_table: from.0.to_string(),
        from_column: from.1.to_string(),
        to_table: to.0.to_string(),
        to_column: to.1.to_string(),
        confidence,
        rel_type: rel_type.to_string(),
        source: "test".to_string(),
        warning_from: String::new(),
        warning_to: String::new(),
    }
}

/// A small HIS-shaped catalog used across guard and join tests.
///
/// Joins:
/// - OVST.hn = PT.hn (high, universal)
/// - OVST.cid = PT.cid (medium, carries a warning)
/// - OVST.vn = PTDIAG.vn (high, universal)
/// - IPT.hn = PT.hn (high, universal)
/// BDVST has `hn` but no edges, so joins to it are heuristic.
pub fn test_catalog() -> SchemaCatalog {
    let tables = vec![
        table(
            "OVST",
            vec![pk_col("vn"), col("vstdate"), col("cliniclct"), col("hn"), col("cid"), col("note")],
        ),
        table(
            "PT",
            vec![
                pk_col("hn"),
                col("cid"),
                col("fname"),
                col("lname"),
                col("birthday"),
                col("sex"),
                col("pttype"),
            ],
        ),
        table("PTDIAG", vec![col("vn"), col("icd10"), col("diagtype")]),
        table("IPT", vec![pk_col("an"), col("hn"), col("regdate"), col("ward")]),
        table("BDVST", vec![pk_col("vn"), col("hn"), col("vstdate")]),
    ];

    let mut warned = edge(("OVST", "cid"), ("PT", "cid"), Confidence::Medium, "");
    warned.warning_from = "home key override - verify before use".to_string();

    let join_edges = vec![
        edge(("OVST", "hn"), ("PT", "hn"), Confidence::High, "universal"),
        warned,
        edge(("OVST", "vn"), ("PTDIAG", "vn"), Confidence::High, "universal"),
        edge(("IPT", "hn"), ("PT", "hn"), Confidence::High, "universal"),
    ];

    let mut families: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for t in &tables {
        families.entry(t.family.clone()).or_default().push(t.name.clone());
    }

    SchemaCatalog {
        tables: tables.into_iter().map(|t| (t.name.clone(), t)).collect(),
        join_edges,
        families,
    }
}
