// Integration tests for `IpcClient` and `event_stream` against a fake
// engine listening on Unix sockets in a temp dir.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::mpsc;

use zet_api::{
    ConnectRetry, Error, Event, IdentifierData, IpcClient, IpcConfig, OnOffData, Request, Response,
    event_stream,
};

// ── Helpers ─────────────────────────────────────────────────────────

/// What the fake engine does with one request line.
#[derive(Clone, Copy)]
enum Reply {
    Ok,
    Fail,
    Silent,
    Hangup,
}

/// Serve the command socket: every request line is forwarded to the
/// returned receiver and answered according to `script`, one entry per
/// request (the last entry repeats).
fn spawn_engine(path: &Path, script: Vec<Reply>) -> mpsc::UnboundedReceiver<Value> {
    let listener = UnixListener::bind(path).unwrap();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut step = 0_usize;
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();

            while let Ok(Some(line)) = lines.next_line().await {
                let request: Value = serde_json::from_str(&line).unwrap();
                let _ = seen_tx.send(request.clone());

                let reply = script[step.min(script.len() - 1)];
                step += 1;

                let response = match reply {
                    Reply::Ok => Response::ok(Some(json!({ "echo": request["Command"] }))),
                    Reply::Fail => Response::failure("identity not found", Some(404)),
                    Reply::Silent => continue,
                    Reply::Hangup => break,
                };
                let mut out = serde_json::to_string(&response).unwrap();
                out.push('\n');
                write.write_all(out.as_bytes()).await.unwrap();
            }
        }
    });

    seen_rx
}

fn client_for(path: PathBuf, timeout: Duration) -> IpcClient {
    IpcClient::new(IpcConfig {
        command_socket: path,
        event_socket: PathBuf::from("/nonexistent"),
        timeout,
        event_retry: ConnectRetry::none(),
    })
}

// ── Command socket ──────────────────────────────────────────────────

#[tokio::test]
async fn test_send_returns_response_data() {
    let dir = tempfile::tempdir().unwrap();
    let sock = dir.path().join("cmd.sock");
    let mut seen = spawn_engine(&sock, vec![Reply::Ok]);
    let client = client_for(sock, Duration::from_secs(5));

    let data = client
        .send(&Request::IdentityOnOff(OnOffData {
            identifier: "ziti://ctrl:443/alice".into(),
            on_off: true,
        }))
        .await
        .unwrap();

    assert_eq!(data, Some(json!({ "echo": "IdentityOnOff" })));
    assert_eq!(
        seen.recv().await.unwrap(),
        json!({
            "Command": "IdentityOnOff",
            "Data": { "Identifier": "ziti://ctrl:443/alice", "OnOff": true }
        })
    );
}

#[tokio::test]
async fn test_requests_share_one_connection() {
    let dir = tempfile::tempdir().unwrap();
    let sock = dir.path().join("cmd.sock");
    let mut seen = spawn_engine(&sock, vec![Reply::Ok]);
    let client = client_for(sock, Duration::from_secs(5));

    client.send(&Request::Start).await.unwrap();
    client
        .send(&Request::RefreshIdentity(IdentifierData {
            identifier: "a".into(),
        }))
        .await
        .unwrap();

    assert_eq!(seen.recv().await.unwrap()["Command"], "Start");
    assert_eq!(seen.recv().await.unwrap()["Command"], "RefreshIdentity");
}

#[tokio::test]
async fn test_failure_response_maps_to_command_error() {
    let dir = tempfile::tempdir().unwrap();
    let sock = dir.path().join("cmd.sock");
    let _seen = spawn_engine(&sock, vec![Reply::Fail]);
    let client = client_for(sock, Duration::from_secs(5));

    let err = client
        .send(&Request::Dump(IdentifierData {
            identifier: "missing".into(),
        }))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Command { ref message, code: Some(404) } if message == "identity not found"
    ));
    assert!(!err.is_unavailable());
}

#[tokio::test]
async fn test_silent_engine_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let sock = dir.path().join("cmd.sock");
    let _seen = spawn_engine(&sock, vec![Reply::Silent]);
    let client = client_for(sock, Duration::from_millis(100));

    let err = client.send(&Request::Start).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));
    assert!(!err.is_unavailable());
}

#[tokio::test]
async fn test_missing_socket_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let client = client_for(dir.path().join("absent.sock"), Duration::from_secs(1));

    let err = client.send(&Request::Start).await.unwrap_err();
    assert!(matches!(err, Error::Connect { .. }));
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn test_reconnects_after_hangup() {
    let dir = tempfile::tempdir().unwrap();
    let sock = dir.path().join("cmd.sock");
    let _seen = spawn_engine(&sock, vec![Reply::Hangup, Reply::Ok]);
    let client = client_for(sock, Duration::from_secs(5));

    let err = client.send(&Request::Start).await.unwrap_err();
    assert!(matches!(err, Error::Closed));

    let data = client.send(&Request::Start).await.unwrap();
    assert_eq!(data, Some(json!({ "echo": "Start" })));
}

// ── Event socket ────────────────────────────────────────────────────

#[tokio::test]
async fn test_event_stream_reads_until_engine_closes() {
    let dir = tempfile::tempdir().unwrap();
    let sock = dir.path().join("events.sock");
    let listener = UnixListener::bind(&sock).unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket
            .write_all(
                concat!(
                    r#"{"Op":"service","Identifier":"a","AddedServices":[{"Id":"s1","Name":"web"}]}"#,
                    "\n",
                    "garbage\n",
                    r#"{"Op":"bulkservice","Identifier":"a"}"#,
                    "\n",
                )
                .as_bytes(),
            )
            .await
            .unwrap();
    });

    let events: Vec<Event> = event_stream(&sock, ConnectRetry::none()).collect().await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].op(), "service");
    assert!(matches!(&events[1], Event::Unknown { op, .. } if op == "bulkservice"));
}

#[tokio::test]
async fn test_event_stream_waits_for_late_engine() {
    let dir = tempfile::tempdir().unwrap();
    let sock = dir.path().join("events.sock");

    let bind_path = sock.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        let listener = UnixListener::bind(&bind_path).unwrap();
        let (mut socket, _) = listener.accept().await.unwrap();
        socket
            .write_all(b"{\"Op\":\"context\",\"Identifier\":\"a\",\"Status\":\"OK\"}\n")
            .await
            .unwrap();
    });

    let retry = ConnectRetry {
        initial_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(100),
        max_retries: 20,
    };
    let events: Vec<Event> = event_stream(&sock, retry).collect().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].op(), "context");
}
