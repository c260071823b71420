//! Catalog tests: CSV loading, fk-target parsing, family inference, name
//! canonicalization, PHI marking, and reference validation.

use std::collections::BTreeMap;
use std::io::Write;

use tempfile::TempDir;

use crate::services::catalog::{
    infer_family, load_catalog, parse_fk_targets, parse_join_peers, Confidence, SchemaCatalog,
};
use crate::tests::common::test_catalog;

fn write_file(dir: &TempDir, name: &str, content: &str) {
    let mut file = std::fs::File::create(dir.path().join(name)).unwrap();
    file.write_all(content.as_bytes()).unwrap();
}

fn schema_dir() -> TempDir {
    let dir = TempDir::new().unwrap();

    write_file(
        &dir,
        "frequent_table.csv",
        "table_name,comment,column_count\n\
         ovst,Outpatient visits,120\n\
         PT,Patient master,80\n",
    );

    write_file(
        &dir,
        "frequent_column_enriched.csv",
        "table_name,column_name,database_type,base_type,comment,is_pk,pk_confidence,pk_reason,is_fk,fk_targets,join_peers,join_warning\n\
         OVST,VN,varchar(12),string,Visit number,1,high,unique per visit,0,,,\n\
         OVST,hn,varchar(9),string,Hospital number,0,,,1,PT.hn(high:universal),PT.hn; IPT.hn,\n\
         OVST,vstdate,date,date,Visit date,0,,,0,,,\n\
         PT,hn,varchar(9),string,Hospital number,1,high,patient key,0,,,\n\
         PT,fname,varchar(60),string,First name,0,,,0,,,\n\
         IPTADM,an,varchar(12),string,Admission number,1,high,admission key,0,,,\n",
    );

    write_file(
        &dir,
        "join_edges.csv",
        "from_table,from_column,to_table,to_column,confidence,rel_type,source,warnings_from,warnings_to\n\
         OVST,hn,PT,hn,high,universal,fk_scan,,\n\
         OVST,cliniclct,LCT,code,heuristic,heuristic_home,name_match,possible home key,\n",
    );

    dir
}

// ==================== Loader ====================

#[test]
fn test_load_catalog_from_csv() {
    let dir = schema_dir();
    let catalog = load_catalog(dir.path()).unwrap();

    let stats = catalog.stats();
    assert_eq!(stats.tables, 3);
    assert_eq!(stats.columns, 6);
    assert_eq!(stats.join_edges, 2);
}

#[test]
fn test_table_names_uppercased() {
    let dir = schema_dir();
    let catalog = load_catalog(dir.path()).unwrap();

    assert!(catalog.table_exists("OVST"));
    assert!(catalog.table_exists("ovst"));
    assert!(catalog.get_table("ovst").is_some());
}

#[test]
fn test_column_names_lowercased() {
    let dir = schema_dir();
    let catalog = load_catalog(dir.path()).unwrap();

    // Declared as "VN" in the CSV
    assert!(catalog.column_exists("OVST", "vn"));
    assert!(catalog.column_exists("OVST", "VN"));
    assert!(catalog.get_column("OVST", "vn").unwrap().is_pk);
}

#[test]
fn test_table_created_from_column_file_only() {
    let dir = schema_dir();
    let catalog = load_catalog(dir.path()).unwrap();

    // IPTADM appears only in the column file
    assert!(catalog.table_exists("IPTADM"));
    assert!(catalog.column_exists("IPTADM", "an"));
}

#[test]
fn test_phi_marked_at_load_time() {
    let dir = schema_dir();
    let catalog = load_catalog(dir.path()).unwrap();

    assert!(catalog.get_column("OVST", "hn").unwrap().is_phi);
    assert!(catalog.get_column("PT", "fname").unwrap().is_phi);
    assert!(!catalog.get_column("OVST", "vstdate").unwrap().is_phi);
}

#[test]
fn test_fk_targets_parsed_from_csv() {
    let dir = schema_dir();
    let catalog = load_catalog(dir.path()).unwrap();

    let hn = catalog.get_column("OVST", "hn").unwrap();
    assert!(hn.is_fk);
    assert_eq!(hn.fk_targets.len(), 1);
    assert_eq!(hn.fk_targets[0].table, "PT");
    assert_eq!(hn.fk_targets[0].confidence, Confidence::High);
    assert_eq!(hn.join_peers, vec!["PT.hn".to_string(), "IPT.hn".to_string()]);
}

#[test]
fn test_join_edge_warnings_loaded() {
    let dir = schema_dir();
    let catalog = load_catalog(dir.path()).unwrap();

    let warned = catalog
        .join_edges
        .iter()
        .find(|e| e.from_column == "cliniclct")
        .unwrap();
    assert_eq!(warned.confidence, Confidence::Heuristic);
    assert!(warned.has_warning());
    assert_eq!(warned.warning(), "possible home key");
}

#[test]
fn test_missing_directory_is_fatal() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope");
    assert!(load_catalog(&missing).is_err());
}

#[test]
fn test_empty_schema_is_fatal() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "frequent_table.csv", "table_name,comment,column_count\n");
    assert!(load_catalog(dir.path()).is_err());
}

// ==================== fk_targets / join_peers parsing ====================

#[test]
fn test_parse_fk_targets_full_form() {
    let targets = parse_fk_targets("PT.hn(high:universal); IPT.an(medium:within_family)");
    assert_eq!(targets.len(), 2);
    assert_eq!(targets[0].table, "PT");
    assert_eq!(targets[0].column, "hn");
    assert_eq!(targets[0].confidence, Confidence::High);
    assert_eq!(targets[0].rel_type, "universal");
    assert_eq!(targets[1].confidence, Confidence::Medium);
}

#[test]
fn test_parse_fk_targets_bare_form() {
    let targets = parse_fk_targets("pt.HN");
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].table, "PT");
    assert_eq!(targets[0].column, "hn");
    assert_eq!(targets[0].confidence, Confidence::Medium);
    assert_eq!(targets[0].rel_type, "unknown");
}

#[test]
fn test_parse_fk_targets_empty() {
    assert!(parse_fk_targets("").is_empty());
    assert!(parse_fk_targets("  ;  ").is_empty());
}

#[test]
fn test_parse_join_peers() {
    assert_eq!(
        parse_join_peers("PT.hn; IPT.an; OVST.vn"),
        vec!["PT.hn".to_string(), "IPT.an".to_string(), "OVST.vn".to_string()]
    );
    assert!(parse_join_peers("").is_empty());
}

// ==================== Family inference ====================

#[test]
fn test_infer_known_prefixes() {
    assert_eq!(infer_family("OVST"), "OVST");
    assert_eq!(infer_family("ovstdiag"), "OVST");
    assert_eq!(infer_family("IPTADM"), "IPTADM");
    // Longest prefix wins: IPTADM before IPT
    assert_eq!(infer_family("iptadmward"), "IPTADM");
    assert_eq!(infer_family("PTTYPE"), "PTTYPE");
}

#[test]
fn test_infer_family_fallback_prefix() {
    assert_eq!(infer_family("XYZZY"), "XYZZ");
}

#[test]
fn test_families_built_on_load() {
    let dir = schema_dir();
    let catalog = load_catalog(dir.path()).unwrap();

    let ovst_family = catalog.families.get("OVST").unwrap();
    assert!(ovst_family.contains(&"OVST".to_string()));
}

// ==================== Catalog queries ====================

#[test]
fn test_phi_name_set_lookup() {
    let catalog = test_catalog();
    assert!(catalog.is_phi_column("hn"));
    assert!(catalog.is_phi_column("HN"));
    assert!(catalog.is_phi_column("fname"));
    assert!(!catalog.is_phi_column("vstdate"));
    assert!(!catalog.is_phi_column("hname"));
}

#[test]
fn test_universal_keys() {
    let catalog = test_catalog();
    for key in ["hn", "an", "vn", "HN"] {
        assert!(catalog.is_universal_key(key), "{}", key);
    }
    assert!(!catalog.is_universal_key("vstdate"));
}

#[test]
fn test_phi_columns_in_table() {
    let catalog = test_catalog();
    let phi = catalog.phi_columns_in_table("PT");
    assert!(phi.contains(&"hn".to_string()));
    assert!(phi.contains(&"fname".to_string()));
    assert!(!phi.contains(&"sex".to_string()));
}

#[test]
fn test_tables_with_column() {
    let catalog = test_catalog();
    let tables = catalog.tables_with_column("hn");
    assert!(tables.contains(&"OVST".to_string()));
    assert!(tables.contains(&"PT".to_string()));
    assert!(tables.contains(&"IPT".to_string()));
}

#[test]
fn test_validate_sql_references() {
    let catalog = test_catalog();

    let mut columns = BTreeMap::new();
    columns.insert("OVST".to_string(), vec!["vn".to_string(), "bogus".to_string()]);
    columns.insert("GHOST".to_string(), vec!["x".to_string()]);

    let (invalid_tables, invalid_columns) = catalog.validate_sql_references(
        &["OVST".to_string(), "GHOST".to_string()],
        &columns,
    );

    assert_eq!(invalid_tables, vec!["GHOST".to_string()]);
    // Columns under unknown tables are not reported twice
    assert_eq!(invalid_columns, vec!["OVST.bogus".to_string()]);
}

// ==================== Serialization round-trip ====================

#[test]
fn test_catalog_round_trip() {
    let catalog = test_catalog();
    let json = serde_json::to_string(&catalog).unwrap();
    let restored: SchemaCatalog = serde_json::from_str(&json).unwrap();

    assert_eq!(restored.stats(), catalog.stats());
    assert_eq!(
        restored.get_column("PT", "hn").unwrap().is_phi,
        catalog.get_column("PT", "hn").unwrap().is_phi
    );
    assert_eq!(restored.join_edges, catalog.join_edges);
    assert_eq!(restored.families, catalog.families);
}
