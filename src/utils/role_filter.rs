//! Role-based response shaping.
//!
//! Callers without the super-user role never see generated SQL, raw query
//! results, or sanity-check details. Redaction happens after orchestration
//! and answer formatting; it never changes what was generated or executed.

use crate::models::{ChatResponse, UserRole};

/// Strip privileged fields from a chat response for non-super callers.
///
/// Idempotent: applying it twice is the same as applying it once, and for
/// `super_user` it is the identity.
pub fn redact_for_role(response: &mut ChatResponse, role: UserRole) {
    if role == UserRole::SuperUser {
        return;
    }

    response.sql = None;
    response.query_result = None;
    response.sanity_checks.clear();
}
