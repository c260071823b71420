//! Session store tests: identity, history window, and TTL expiry.

use crate::models::MessageRole;
use crate::services::session_store::SessionStore;

#[test]
fn test_create_and_reuse_session() {
    let store = SessionStore::new(24);

    let id = store.get_or_create(None);
    assert!(!id.is_empty());

    let same = store.get_or_create(Some(&id));
    assert_eq!(same, id);
    assert_eq!(store.session_count(), 1);
}

#[test]
fn test_unknown_id_creates_fresh_session() {
    let store = SessionStore::new(24);
    let id = store.get_or_create(Some("no-such-session"));
    assert_ne!(id, "no-such-session");
}

#[test]
fn test_messages_visible_to_next_request() {
    let store = SessionStore::new(24);
    let id = store.get_or_create(None);

    store.append(&id, MessageRole::User, "how many visits last month?", None);
    store.append(&id, MessageRole::Assistant, "There were 1234 visits.", Some("SELECT 1".into()));

    let history = store.history(&id, 10);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, "user");
    assert_eq!(history[1].role, "assistant");
    assert_eq!(history[1].content, "There were 1234 visits.");
}

#[test]
fn test_history_window_keeps_last_n() {
    let store = SessionStore::new(24);
    let id = store.get_or_create(None);

    for i in 0..10 {
        store.append(&id, MessageRole::User, &format!("message {}", i), None);
    }

    let history = store.history(&id, 6);
    assert_eq!(history.len(), 6);
    assert_eq!(history[0].content, "message 4");
    assert_eq!(history[5].content, "message 9");
}

#[test]
fn test_expired_session_replaced() {
    let store = SessionStore::new(0);
    let id = store.get_or_create(None);
    store.append(&id, MessageRole::User, "hello", None);

    std::thread::sleep(std::time::Duration::from_millis(20));

    let new_id = store.get_or_create(Some(&id));
    assert_ne!(new_id, id);
}

#[test]
fn test_expired_session_yields_no_history() {
    let store = SessionStore::new(0);
    let id = store.get_or_create(None);
    store.append(&id, MessageRole::User, "hello", None);

    std::thread::sleep(std::time::Duration::from_millis(20));

    assert!(store.history(&id, 6).is_empty());
}

#[test]
fn test_cleanup_expired() {
    let store = SessionStore::new(0);
    store.get_or_create(None);
    store.get_or_create(None);

    std::thread::sleep(std::time::Duration::from_millis(20));

    let removed = store.cleanup_expired();
    assert_eq!(removed, 2);
    assert_eq!(store.session_count(), 0);
}
