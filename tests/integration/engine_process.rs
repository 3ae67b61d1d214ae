#![cfg(unix)]

use std::fs;
use std::sync::Arc;

use serde_json::{json, Value};
use slotbook::engine::ProcessTransportOptions;
use slotbook::schema::Resource;
use slotbook::{
    Client, CoalescerOptions, EngineExecutor, ExecutorError, ProcessTransport, QueryAction,
    QueryDocument, QueryError,
};
use tempfile::tempdir;

const TWO_ITEM_REPLY: &str = r#"{"batchResult":[{"data":{"findUniqueResource":{"id":"r1","name":"Studio A","timezone":"Europe/Berlin"}}},{"errors":[{"error":"raw","user_facing_error":{"error_code":"P2025","message":"Record to delete does not exist.","meta":{"cause":"Record to delete does not exist."}}}]}]}"#;

/// Fake engine: logs every request line to `$REQUEST_LOG` and answers with
/// the same canned two-item response.
fn fake_engine(log: &std::path::Path, reply: &str) -> ProcessTransportOptions {
    let mut options = ProcessTransportOptions::new("sh").arg("-c").arg(format!(
        "while read -r line; do printf '%s\\n' \"$line\" >> \"$REQUEST_LOG\"; printf '%s\\n' '{reply}'; done"
    ));
    options
        .env
        .push(("REQUEST_LOG".into(), log.display().to_string()));
    options
}

#[tokio::test]
async fn client_batches_through_engine_process() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("requests.jsonl");
    let transport = Arc::new(ProcessTransport::new(fake_engine(&log, TWO_ITEM_REPLY)));
    let client = Client::new(
        EngineExecutor::new(Arc::clone(&transport)),
        CoalescerOptions::default(),
    );

    let (found, deleted) = tokio::join!(
        client.resource().find_unique::<Resource>(json!({"id": "r1"})),
        client.booking().delete::<Value>(json!({"id": "b404"})),
    );
    let found = found.unwrap().expect("resource present");
    assert_eq!(found.name, "Studio A");
    assert_eq!(found.timezone.as_deref(), Some("Europe/Berlin"));
    let err = deleted.unwrap_err();
    let engine = err.as_engine().expect("item-local error");
    assert_eq!(engine.code.as_deref(), Some("P2025"));
    assert_eq!(engine.meta, Some(json!({"cause": "Record to delete does not exist."})));

    // A lone query gets the two-item reply, which cannot be aligned.
    let err = client.customer().find_many::<Value>(json!({})).await.unwrap_err();
    assert!(matches!(err, QueryError::Batch(ExecutorError::Protocol(_))), "{err:?}");

    transport.shutdown().await.unwrap();

    let requests = fs::read_to_string(&log).unwrap();
    let lines: Vec<Value> = requests
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    let first = lines[0]["batch"].as_array().unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first[0]["modelName"], "Resource");
    assert_eq!(first[0]["action"], "findUnique");
    assert_eq!(first[1]["action"], "deleteOne");
    assert_eq!(lines[0]["transaction"], Value::Null);
    assert_eq!(lines[1]["batch"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn crashed_engine_fails_the_whole_batch() {
    let transport = ProcessTransport::new(
        ProcessTransportOptions::new("sh").arg("-c").arg("read -r line; exit 3"),
    );
    let client = Client::new(EngineExecutor::new(transport), CoalescerOptions::default());
    let (a, b) = tokio::join!(
        client.weekly_slot().find_many::<Value>(json!({})),
        client.availability().count(None),
    );
    for err in [a.map(|_| ()).unwrap_err(), b.map(|_| ()).unwrap_err()] {
        assert!(
            matches!(err, QueryError::Batch(ExecutorError::Unreachable(_))),
            "{err:?}"
        );
    }
}

#[tokio::test]
async fn engine_restarts_after_exit() {
    let dir = tempdir().unwrap();
    let starts = dir.path().join("starts");
    // Answers one request per process lifetime, then exits.
    let mut options = ProcessTransportOptions::new("sh").arg("-c").arg(
        "echo start >> \"$STARTS\"; read -r line; printf '%s\\n' '{\"batchResult\":[{\"data\":{\"x\":1}}]}'",
    );
    options.env.push(("STARTS".into(), starts.display().to_string()));
    let client = Client::new(
        EngineExecutor::new(ProcessTransport::new(options)),
        CoalescerOptions::default(),
    );
    let find_first = || QueryDocument::new("Resource", QueryAction::FindFirst);

    assert_eq!(client.submit(find_first()).await.unwrap(), json!(1));
    let err = client.submit(find_first()).await.unwrap_err();
    assert!(
        matches!(err, QueryError::Batch(ExecutorError::Unreachable(_))),
        "{err:?}"
    );
    assert_eq!(client.submit(find_first()).await.unwrap(), json!(1));
    assert_eq!(fs::read_to_string(&starts).unwrap().lines().count(), 2);
}
