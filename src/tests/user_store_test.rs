//! User store tests: CSV credentials and super-user promotion.

use std::io::Write;

use tempfile::TempDir;

use crate::services::user_store::UserStore;

fn store_with(users_csv: &str, super_users_json: &str) -> UserStore {
    let dir = TempDir::new().unwrap();

    let users_path = dir.path().join("users.csv");
    std::fs::File::create(&users_path)
        .unwrap()
        .write_all(users_csv.as_bytes())
        .unwrap();

    let super_path = dir.path().join("super_users.json");
    std::fs::File::create(&super_path)
        .unwrap()
        .write_all(super_users_json.as_bytes())
        .unwrap();

    UserStore::load(&users_path, &super_path)
}

const USERS_CSV: &str = "\
E-mail,NAME,ID,Department
Analyst@Example.org,A. Analyst,12345,Quality
nurse@example.org,N. Nurse,67890,Medicine
";

const SUPER_USERS: &str = r#"{"super_users": ["analyst@example.org"]}"#;

#[test]
fn test_verify_valid_credentials() {
    let store = store_with(USERS_CSV, SUPER_USERS);
    assert_eq!(store.user_count(), 2);

    let user = store.verify("analyst@example.org", "12345").unwrap();
    assert_eq!(user.name, "A. Analyst");
    assert_eq!(user.department, "Quality");
}

#[test]
fn test_email_case_insensitive() {
    let store = store_with(USERS_CSV, SUPER_USERS);
    assert!(store.verify("ANALYST@example.org", "12345").is_some());
}

#[test]
fn test_wrong_password_rejected() {
    let store = store_with(USERS_CSV, SUPER_USERS);
    assert!(store.verify("analyst@example.org", "wrong").is_none());
}

#[test]
fn test_unknown_user_rejected() {
    let store = store_with(USERS_CSV, SUPER_USERS);
    assert!(store.verify("ghost@example.org", "12345").is_none());
}

#[test]
fn test_super_user_role_assigned() {
    let store = store_with(USERS_CSV, SUPER_USERS);

    let analyst = store.verify("analyst@example.org", "12345").unwrap();
    assert!(analyst.role.is_super());

    let nurse = store.verify("nurse@example.org", "67890").unwrap();
    assert!(!nurse.role.is_super());
}

#[test]
fn test_missing_files_yield_empty_store() {
    let dir = TempDir::new().unwrap();
    let store = UserStore::load(&dir.path().join("nope.csv"), &dir.path().join("nope.json"));
    assert_eq!(store.user_count(), 0);
    assert!(store.verify("x@example.org", "1").is_none());
}
