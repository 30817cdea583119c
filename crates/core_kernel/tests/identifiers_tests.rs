//! Tests for strongly-typed identifiers

use core_kernel::{LedgerEntryId, RequestId, UserId};
use uuid::Uuid;

#[test]
fn test_display_carries_prefix() {
    assert!(UserId::new().to_string().starts_with("USR-"));
    assert!(LedgerEntryId::new().to_string().starts_with("LED-"));
    assert!(RequestId::new().to_string().starts_with("REQ-"));
}

#[test]
fn test_parse_roundtrip() {
    let original = UserId::new_v7();
    let parsed: UserId = original.to_string().parse().unwrap();
    assert_eq!(original, parsed);
}

#[test]
fn test_parse_without_prefix() {
    let uuid = Uuid::new_v4();
    let parsed: LedgerEntryId = uuid.to_string().parse().unwrap();
    assert_eq!(parsed, LedgerEntryId::from_uuid(uuid));
}

#[test]
fn test_ids_do_not_collide() {
    let a = UserId::new();
    let b = UserId::new();
    assert_ne!(a, b);
}

#[test]
fn test_v7_ids_are_time_ordered() {
    let earlier = LedgerEntryId::new_v7();
    let later = LedgerEntryId::new_v7();
    assert!(earlier.as_uuid() <= later.as_uuid());
}

#[test]
fn test_serde_transparent() {
    let id = UserId::new();
    let json = serde_json::to_string(&id).unwrap();
    let back: UserId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}
