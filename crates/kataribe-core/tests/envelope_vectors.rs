//! Envelope vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::fs;

use kataribe_core::{Envelope, Kind};

fn load(name: &str) -> String {
    fs::read_to_string(format!("tests/vectors/{name}")).unwrap()
}

#[test]
fn parse_rpc_req() {
    let s = load("rpc_req.json");
    let env: Envelope = serde_json::from_str(&s).unwrap();
    assert_eq!(env.v, 1);
    assert_eq!(env.kind, Kind::RpcReq);
    assert_eq!(env.id.as_deref(), Some("c0ffee-01"));
    assert_eq!(env.ch.as_deref(), Some("add"));
    let p = env.p.unwrap();
    assert_eq!(p["a"], 2);
    assert_eq!(p["b"], 3);
    assert!(env.m.is_none());
    assert!(env.extra.is_empty());
}

#[test]
fn parse_rpc_err() {
    let s = load("rpc_err.json");
    let env: Envelope = serde_json::from_str(&s).unwrap();
    assert_eq!(env.kind, Kind::RpcErr);
    assert_eq!(env.id.as_deref(), Some("c0ffee-01"));
    assert_eq!(env.m.as_deref(), Some("Method not found: add"));
    assert_eq!(env.code.as_deref(), Some("NOT_FOUND"));
}

#[test]
fn unknown_fields_survive_a_round_trip() {
    let s = load("hello_extra.json");
    let env: Envelope = serde_json::from_str(&s).unwrap();
    assert_eq!(env.kind, Kind::Hello);
    assert_eq!(
        env.feat.as_deref(),
        Some(&["events".to_string(), "meta".to_string()][..])
    );
    assert_eq!(env.extra["trace_id"], "ab12-7");
    assert_eq!(env.extra["region"], "eu-1");

    let back = serde_json::to_value(&env).unwrap();
    assert_eq!(back["trace_id"], "ab12-7");
    assert_eq!(back["region"], "eu-1");
    // absent optionals stay off the wire
    assert!(back.get("id").is_none());
    assert!(back.get("p").is_none());
}
