//! PHI exposure tests: the guard must block any PHI column visible in the
//! result set while permitting PHI in JOIN/WHERE/aggregate positions.

use crate::services::guard::{validate_sql, GuardErrorKind, GuardOptions};
use crate::tests::common::test_catalog;

fn validate(sql: &str) -> crate::ValidationResult {
    validate_sql(sql, None, &GuardOptions::default())
}

fn assert_phi_blocked(sql: &str) {
    let result = validate(sql);
    assert!(!result.valid, "expected PHI rejection for: {}", sql);
    assert_eq!(result.error_type, Some(GuardErrorKind::PHIExposureError), "{}", sql);
    assert!(!result.phi_columns_found.is_empty(), "{}", sql);
}

// ==================== Category matrices ====================

#[test]
fn test_patient_identifiers_blocked() {
    for column in ["hn", "cid", "passport", "mrn", "national_id", "idcard", "pid"] {
        assert_phi_blocked(&format!("SELECT {} FROM pt LIMIT 10", column));
    }
}

#[test]
fn test_name_columns_blocked() {
    for column in ["fname", "lname", "name", "fullname", "firstname", "lastname", "prename"] {
        assert_phi_blocked(&format!("SELECT {} FROM pt LIMIT 10", column));
    }
}

#[test]
fn test_contact_columns_blocked() {
    for column in ["phone", "mobile", "tel", "telephone", "email", "fax"] {
        assert_phi_blocked(&format!("SELECT {} FROM pt LIMIT 10", column));
    }
}

#[test]
fn test_address_columns_blocked() {
    for column in ["address", "moo", "road", "tambon", "amphur", "province", "zipcode"] {
        assert_phi_blocked(&format!("SELECT {} FROM pt LIMIT 10", column));
    }
}

#[test]
fn test_birthdate_columns_blocked() {
    for column in ["dob", "birthdate", "birthday", "bdate"] {
        assert_phi_blocked(&format!("SELECT {} FROM pt LIMIT 10", column));
    }
}

#[test]
fn test_phi_case_insensitive() {
    for column in ["HN", "Hn", "hN"] {
        assert_phi_blocked(&format!("SELECT {} FROM pt LIMIT 10", column));
    }
}

// ==================== Non-exposing positions are permitted ====================

#[test]
fn test_hn_in_where_allowed() {
    let result = validate("SELECT COUNT(*) FROM ovst WHERE hn = '12345'");
    assert!(result.valid, "{:?}", result.error);
}

#[test]
fn test_hn_in_join_allowed() {
    let result = validate("SELECT COUNT(*) FROM ovst o JOIN pt p ON o.hn = p.hn");
    assert!(result.valid, "{:?}", result.error);
    assert!(result.has_aggregation);
    assert!(result.phi_columns_found.is_empty());
}

#[test]
fn test_hn_in_subquery_filter_allowed() {
    let result = validate(
        "SELECT COUNT(*) FROM ovst WHERE hn IN (SELECT hn FROM pt WHERE pttype = '01')",
    );
    assert!(result.valid, "{:?}", result.error);
}

#[test]
fn test_hn_in_cte_join_allowed() {
    let sql = "WITH recent AS (
        SELECT vn, hn FROM ovst WHERE vstdate >= '2024-01-01'
    )
    SELECT COUNT(*) FROM recent r JOIN pt p ON r.hn = p.hn";
    let result = validate(sql);
    assert!(result.valid, "{:?}", result.error);
}

// ==================== Aggregates do not expose ====================

#[test]
fn test_count_distinct_phi_allowed() {
    let result = validate("SELECT COUNT(DISTINCT hn) AS n FROM ovst");
    assert!(result.valid, "{:?}", result.error);
    assert!(result.has_aggregation);
}

#[test]
fn test_count_by_phi_blocked() {
    // Grouping by PHI still exposes it through the projection
    let result = validate("SELECT hn, COUNT(*) FROM ovst GROUP BY hn LIMIT 10");
    assert!(!result.valid);
    assert_eq!(result.error_type, Some(GuardErrorKind::PHIExposureError));
    assert!(result.phi_columns_found.iter().any(|c| c.contains("hn")));
}

#[test]
fn test_aggregation_without_phi_in_output() {
    let result = validate(
        "SELECT cliniclct, COUNT(DISTINCT hn) AS patients FROM ovst GROUP BY cliniclct",
    );
    assert!(result.valid, "{:?}", result.error);
}

#[test]
fn test_min_max_of_phi_allowed() {
    let result = validate("SELECT MIN(birthday), MAX(birthday) FROM pt");
    assert!(result.valid, "{:?}", result.error);
}

// ==================== Expressions still expose ====================

#[test]
fn test_phi_in_case_expression_blocked() {
    let result = validate(
        "SELECT CASE WHEN vstdate > '2024-01-01' THEN hn ELSE 'X' END AS v FROM ovst LIMIT 10",
    );
    assert!(!result.valid);
    assert_eq!(result.error_type, Some(GuardErrorKind::PHIExposureError));
}

#[test]
fn test_phi_in_coalesce_blocked() {
    let result = validate("SELECT COALESCE(phone, mobile) FROM pt LIMIT 10");
    assert!(!result.valid);
    assert_eq!(result.error_type, Some(GuardErrorKind::PHIExposureError));
}

#[test]
fn test_aliased_phi_column_blocked() {
    let result = validate("SELECT p.hn AS patient_ref FROM pt p LIMIT 10");
    assert!(!result.valid);
    assert_eq!(result.error_type, Some(GuardErrorKind::PHIExposureError));
    assert!(result.phi_columns_found.iter().any(|c| c.contains("PT.hn")));
}

#[test]
fn test_one_phi_column_blocks_whole_query() {
    let result = validate("SELECT vn, vstdate, hn FROM ovst LIMIT 10");
    assert!(!result.valid);
    assert_eq!(result.error_type, Some(GuardErrorKind::PHIExposureError));
}

// ==================== Near-miss names are not blocked ====================

#[test]
fn test_similar_column_names_not_blocked() {
    // Exact-name matching only: these are not in the PHI set
    let result = validate("SELECT hname, phone_count, dobx FROM pt LIMIT 10");
    assert!(result.valid, "{:?}", result.error);
}

// ==================== Catalog-marked PHI ====================

#[test]
fn test_phi_marked_by_catalog_blocked() {
    let mut catalog = test_catalog();
    if let Some(table) = catalog.tables.get_mut("PT") {
        if let Some(column) = table.columns.get_mut("pttype") {
            column.is_phi = true;
        }
    }

    let result = validate_sql(
        "SELECT pttype FROM pt LIMIT 10",
        Some(&catalog),
        &GuardOptions { max_rows: 2000, strict_catalog: true, validate_joins: true },
    );
    assert!(!result.valid);
    assert_eq!(result.error_type, Some(GuardErrorKind::PHIExposureError));
}

// ==================== Realistic analytic flows ====================

#[test]
fn test_opd_visit_count_by_clinic() {
    let catalog = test_catalog();
    let result = validate_sql(
        "SELECT cliniclct, COUNT(*) AS count FROM ovst \
         WHERE vstdate >= '2024-01-01' GROUP BY cliniclct",
        Some(&catalog),
        &GuardOptions { max_rows: 2000, strict_catalog: true, validate_joins: true },
    );
    assert!(result.valid, "{:?}", result.error);
}

#[test]
fn test_patient_line_listing_blocked() {
    let catalog = test_catalog();
    let result = validate_sql(
        "SELECT hn, fname, lname FROM pt WHERE pttype = '01' LIMIT 100",
        Some(&catalog),
        &GuardOptions { max_rows: 2000, strict_catalog: true, validate_joins: true },
    );
    assert!(!result.valid);
    assert_eq!(result.error_type, Some(GuardErrorKind::PHIExposureError));
    assert_eq!(result.phi_columns_found.len(), 3);
}

#[test]
fn test_diagnosis_statistics() {
    let catalog = test_catalog();
    let result = validate_sql(
        "SELECT d.icd10, COUNT(DISTINCT o.hn) AS patients \
         FROM ovst o JOIN ptdiag d ON o.vn = d.vn \
         GROUP BY d.icd10 ORDER BY patients DESC",
        Some(&catalog),
        &GuardOptions { max_rows: 2000, strict_catalog: true, validate_joins: true },
    );
    assert!(result.valid, "{:?}", result.error);
    assert!(result.has_aggregation);
    assert!(result.join_warnings.is_empty(), "{:?}", result.join_warnings);
}
