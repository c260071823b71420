//! Concept library loading tests.

use std::io::Write;

use tempfile::NamedTempFile;

use crate::services::concepts::{BundleLogic, ConceptLibrary};

#[test]
fn test_load_concepts_from_yaml() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
diabetes:
  description: Diabetes mellitus diagnoses
  condition: "icd10 LIKE 'E11%'"
  icd10_codes: [E10, E11]
  tables: [PTDIAG]

hba1c_panel:
  description: Glycated hemoglobin lab results
  tests: [HbA1c]
  bundle_logic: same_visit
"#
    )
    .unwrap();

    let library = ConceptLibrary::load(file.path()).unwrap();
    assert_eq!(library.len(), 2);

    let diabetes = library.get("diabetes").unwrap();
    assert_eq!(diabetes.name, "diabetes");
    assert_eq!(diabetes.icd10_codes, vec!["E10".to_string(), "E11".to_string()]);
    assert_eq!(diabetes.condition.as_deref(), Some("icd10 LIKE 'E11%'"));

    let panel = library.get("hba1c_panel").unwrap();
    assert_eq!(panel.bundle_logic, Some(BundleLogic::SameVisit));
}

#[test]
fn test_missing_file_yields_empty_library() {
    let library = ConceptLibrary::load(std::path::Path::new("/no/such/concepts.yaml")).unwrap();
    assert!(library.is_empty());
}

#[test]
fn test_search_by_name_and_description() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
diabetes:
  description: Diabetes mellitus diagnoses
hypertension:
  description: High blood pressure
"#
    )
    .unwrap();

    let library = ConceptLibrary::load(file.path()).unwrap();
    assert_eq!(library.search("diab").len(), 1);
    assert_eq!(library.search("blood pressure").len(), 1);
    assert!(library.search("oncology").is_empty());
}
