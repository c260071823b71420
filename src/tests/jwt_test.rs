//! Session token tests.

use crate::models::{UserInfo, UserRole};
use crate::utils::JwtUtil;

fn user() -> UserInfo {
    UserInfo {
        email: "analyst@example.org".to_string(),
        name: "A. Analyst".to_string(),
        department: "Quality".to_string(),
        role: UserRole::SuperUser,
    }
}

#[test]
fn test_token_round_trip() {
    let jwt = JwtUtil::new("test-secret", 3600);
    let token = jwt.create_token(&user()).unwrap();

    let claims = jwt.verify_token(&token).unwrap();
    assert_eq!(claims.sub, "analyst@example.org");
    assert_eq!(claims.name, "A. Analyst");
    assert_eq!(claims.department, "Quality");
    assert!(claims.role.is_super());
}

#[test]
fn test_garbage_token_rejected() {
    let jwt = JwtUtil::new("test-secret", 3600);
    assert!(jwt.verify_token("not-a-token").is_err());
}

#[test]
fn test_wrong_secret_rejected() {
    let jwt = JwtUtil::new("test-secret", 3600);
    let token = jwt.create_token(&user()).unwrap();

    let other = JwtUtil::new("different-secret", 3600);
    assert!(other.verify_token(&token).is_err());
}
