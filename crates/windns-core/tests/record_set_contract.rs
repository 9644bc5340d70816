//! Contract Test: Record-Set Lifecycle
//!
//! Verifies how set-level create/read/update/delete map onto per-address
//! operations.
//!
//! Constraints verified:
//! - Updates issue exactly the reconciled removals, then the additions
//! - Unchanged sets issue no mutations
//! - A mid-sequence failure reports what was already applied
//! - Reads are idempotent and report the minimum TTL

mod common;

use common::*;
use tokio_test::{assert_err, assert_ok};
use windns_core::{AddressChange, Error, RecordSetManager, RecordSetSpec};

fn manager(transport: &ScriptedTransport) -> RecordSetManager {
    RecordSetManager::new(client_for(transport))
}

#[tokio::test]
async fn create_adds_each_address_then_reads() {
    let transport = ScriptedTransport::new();
    transport
        .reply(&records_envelope("record created", &["10.0.0.2"], 3600))
        .reply(&records_envelope("record created", &["10.0.0.1"], 3600))
        .reply(&records_envelope("record found", &["10.0.0.1", "10.0.0.2"], 3600));
    let manager = manager(&transport);

    let spec = RecordSetSpec::new("example.com.", "www").with_addresses(["10.0.0.2", "10.0.0.1"]);
    let state = assert_ok!(manager.create(&spec).await).expect("set exists after create");

    assert_eq!(state.addresses, vec!["10.0.0.1", "10.0.0.2"]);
    assert_eq!(state.ttl, 3600);

    let payloads = transport.payloads();
    assert_eq!(payloads.len(), 3);
    assert!(is_add_of(&payloads[0], "10.0.0.1"));
    assert!(is_add_of(&payloads[1], "10.0.0.2"));
    assert!(payloads[0].contains("[System.TimeSpan]::FromSeconds(3600)"));
}

#[tokio::test]
async fn update_removes_then_adds_exactly_the_difference() {
    let transport = ScriptedTransport::new();
    transport
        .reply(r#"{"code":200,"detail":"record deleted"}"#)
        .reply(&records_envelope("record created", &["10.0.0.3"], 3600))
        .reply(&records_envelope("record found", &["10.0.0.2", "10.0.0.3"], 3600));
    let manager = manager(&transport);

    let previous = vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()];
    let spec = RecordSetSpec::new("example.com.", "www").with_addresses(["10.0.0.2", "10.0.0.3"]);

    let state = assert_ok!(manager.update(&previous, &spec).await).expect("set exists");
    assert_eq!(state.addresses, vec!["10.0.0.2", "10.0.0.3"]);

    let payloads = transport.payloads();
    assert_eq!(payloads.len(), 3, "one delete, one add, one read");
    assert!(is_delete_of(&payloads[0], "10.0.0.1"));
    assert!(is_add_of(&payloads[1], "10.0.0.3"));
    assert!(!payloads.iter().any(|p| is_add_of(p, "10.0.0.2") || is_delete_of(p, "10.0.0.2")));
}

#[tokio::test]
async fn unchanged_set_issues_no_mutations() {
    let transport = ScriptedTransport::new();
    transport.always(&records_envelope("record found", &["10.0.0.1"], 3600));
    let manager = manager(&transport);

    // Equivalent spelling of the same address
    let previous = vec!["::ffff:10.0.0.1".to_string()];
    let spec = RecordSetSpec::new("example.com.", "www").with_addresses(["10.0.0.1"]);

    assert_ok!(manager.update(&previous, &spec).await);

    let payloads = transport.payloads();
    assert_eq!(payloads.len(), 1, "only the read-back");
    assert!(!payloads[0].contains("Add-DnsServerResourceRecord @createArgs"));
    assert!(!payloads[0].contains("Remove-DnsServerResourceRecord @deleteArgs"));
}

#[tokio::test]
async fn partial_update_reports_applied_changes() {
    let transport = ScriptedTransport::new();
    transport
        .reply(r#"{"code":200,"detail":"record deleted"}"#)
        .reply(r#"{"code":400,"detail":"record already exists"}"#);
    let manager = manager(&transport);

    let previous = vec!["10.0.0.1".to_string()];
    let spec = RecordSetSpec::new("example.com.", "www").with_addresses(["10.0.0.3"]);

    let err = assert_err!(manager.update(&previous, &spec).await);
    match err {
        Error::PartiallyApplied {
            operation,
            applied,
            failed_address,
            source,
        } => {
            assert_eq!(operation, "update");
            assert_eq!(applied, vec![AddressChange::Removed("10.0.0.1".to_string())]);
            assert_eq!(failed_address, "10.0.0.3");
            assert!(matches!(*source, Error::Conflict(_)));
        }
        other => panic!("expected PartiallyApplied, got {:?}", other),
    }

    // No rollback and no read-back after the failure
    assert_eq!(transport.execute_call_count(), 2);
}

#[tokio::test]
async fn create_stops_at_first_failure() {
    let transport = ScriptedTransport::new();
    transport
        .reply(&records_envelope("record created", &["10.0.0.1"], 3600))
        .fail(|| Error::connection("connection reset"));
    let manager = manager(&transport);

    let spec = RecordSetSpec::new("example.com.", "www")
        .with_addresses(["10.0.0.1", "10.0.0.2", "10.0.0.3"]);

    let err = assert_err!(manager.create(&spec).await);
    assert!(matches!(
        err,
        Error::PartiallyApplied { operation: "create", ref applied, ref failed_address, .. }
            if applied.len() == 1 && failed_address == "10.0.0.2"
    ));
    assert_eq!(transport.execute_call_count(), 2);
}

#[tokio::test]
async fn repeated_reads_are_identical() {
    let transport = ScriptedTransport::new();
    transport.always(&records_envelope("record found", &["10.0.0.2", "10.0.0.1"], 600));
    let manager = manager(&transport);

    let first = assert_ok!(manager.read("example.com.", "www").await);
    let second = assert_ok!(manager.read("example.com.", "www").await);

    assert_eq!(first, second);
    let state = first.expect("set exists");
    assert_eq!(state.addresses, vec!["10.0.0.1", "10.0.0.2"]);
    assert_eq!(state.ttl, 600);

    let payloads = transport.payloads();
    assert_eq!(payloads[0], payloads[1], "payloads are deterministic");
}

#[tokio::test]
async fn read_of_missing_set_is_none() {
    let transport = ScriptedTransport::new();
    transport
        .reply(r#"{"code":404,"detail":"record not found"}"#)
        .reply(r#"{"code":200,"detail":"record found","records":[]}"#);
    let manager = manager(&transport);

    assert_eq!(assert_ok!(manager.read("example.com.", "www").await), None);
    assert_eq!(assert_ok!(manager.read("example.com.", "www").await), None);
}

#[tokio::test]
async fn read_reports_minimum_ttl() {
    let transport = ScriptedTransport::new();
    transport.reply(
        r#"{"code":200,"detail":"record found","records":[
            {"type":"A","name":"www","zone":"example.com.","data":"10.0.0.1","ttl":3600},
            {"type":"A","name":"www","zone":"example.com.","data":"10.0.0.2","ttl":300.0}
        ]}"#,
    );
    let manager = manager(&transport);

    let state = assert_ok!(manager.read("example.com.", "www").await).expect("set exists");
    assert_eq!(state.ttl, 300);
}

#[tokio::test]
async fn delete_removes_every_address() {
    let transport = ScriptedTransport::new();
    transport.always(r#"{"code":200,"detail":"record deleted"}"#);
    let manager = manager(&transport);

    let spec = RecordSetSpec::new("example.com.", "www").with_addresses(["10.0.0.2", "10.0.0.1"]);
    assert_ok!(manager.delete(&spec).await);

    let payloads = transport.payloads();
    assert_eq!(payloads.len(), 2);
    assert!(is_delete_of(&payloads[0], "10.0.0.1"));
    assert!(is_delete_of(&payloads[1], "10.0.0.2"));
}

#[tokio::test]
async fn invalid_spec_never_reaches_the_transport() {
    let transport = ScriptedTransport::new();
    transport.always(r#"{"code":200,"detail":"ok"}"#);
    let manager = manager(&transport);

    let spec = RecordSetSpec::new("example.com", "www").with_addresses(["10.0.0.1"]);
    let err = assert_err!(manager.create(&spec).await);

    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(transport.execute_call_count(), 0);
}
