#![allow(clippy::unwrap_used, clippy::expect_used)]

use orion_security::{AccessMode, RequestContext};

#[test]
fn access_mode_parses_case_insensitively() {
    assert_eq!("Private".parse::<AccessMode>().unwrap(), AccessMode::Private);
    assert_eq!("public".parse::<AccessMode>().unwrap(), AccessMode::Public);
    assert!("internal".parse::<AccessMode>().is_err());
}

#[test]
fn access_mode_serde_uses_lowercase() {
    let json = serde_json::to_string(&AccessMode::Private).unwrap();
    assert_eq!(json, "\"private\"");
    let back: AccessMode = serde_json::from_str("\"public\"").unwrap();
    assert_eq!(back, AccessMode::Public);
}

#[test]
fn context_round_trips_through_json() {
    let ctx = RequestContext::builder("item")
        .user_id(42)
        .role("admin")
        .mode(AccessMode::Private)
        .build();
    let json = serde_json::to_string(&ctx).unwrap();
    let back: RequestContext = serde_json::from_str(&json).unwrap();
    assert_eq!(back.user_id(), Some(42));
    assert!(back.is_admin());
    assert_eq!(back.mode(), AccessMode::Private);
}
