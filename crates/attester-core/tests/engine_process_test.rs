//! Engine process supervision against scripted fake engines.

use std::io;
use std::sync::{Arc, Mutex};

use attester_core::{BridgeError, EngineConfig, EngineKind, EngineProcess};
use attester_test_utils::{FakeEngine, FakeEngineBuilder, handshake};
use serde_json::json;
use tracing_subscriber::fmt::MakeWriter;

const NO_ARGS: &[&str] = &[];

/// Shared buffer that collects formatted log lines.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Start an engine announcing `version` and return the warnings logged.
async fn warnings_for_version(kind: EngineKind, version: &str) -> String {
    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let engine = FakeEngineBuilder::raw(kind)
        .message(handshake(kind, version))
        .then("exec sleep 3600")
        .build();
    let process = EngineProcess::start(&engine.config(), NO_ARGS).await.unwrap();
    assert_eq!(process.version(), version);
    drop(process);
    logs.contents()
}

#[tokio::test]
async fn start_accepts_matching_handshake() {
    let engine = FakeEngine::builder(EngineKind::Attester)
        .then("exec sleep 3600")
        .build();

    let process = EngineProcess::start(&engine.config(), NO_ARGS).await.unwrap();
    assert_eq!(process.version(), "1.0");
    assert_eq!(process.kind(), EngineKind::Attester);
    assert!(process.is_alive());
    assert!(process.pid().is_some());
}

#[tokio::test]
async fn start_tolerates_other_major_version() {
    let engine = FakeEngineBuilder::raw(EngineKind::AtJsTestRunner)
        .message(handshake(EngineKind::AtJsTestRunner, "2.3.0"))
        .then("exec sleep 3600")
        .build();

    let process = EngineProcess::start(&engine.config(), NO_ARGS).await.unwrap();
    assert_eq!(process.version(), "2.3.0");
}

#[tokio::test]
async fn other_major_version_is_warned_about() {
    let logs = warnings_for_version(EngineKind::AtJsTestRunner, "2.3.0").await;
    assert!(logs.contains("WARN"), "logs: {logs}");
    assert!(logs.contains("different version"), "logs: {logs}");
    assert!(logs.contains("2.3.0"), "logs: {logs}");
}

#[tokio::test]
async fn matching_major_version_starts_quietly() {
    let logs = warnings_for_version(EngineKind::Attester, "1.5").await;
    assert!(!logs.contains("different version"), "logs: {logs}");
}

#[tokio::test]
async fn start_rejects_other_application() {
    let engine = FakeEngineBuilder::raw(EngineKind::Attester)
        .message(json!({"application": "karma", "version": "1.0"}))
        .then("exec sleep 3600")
        .build();

    let err = EngineProcess::start(&engine.config(), NO_ARGS)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Incompatible {
            application: "attester",
            source: None
        }
    ));
}

#[tokio::test]
async fn start_rejects_non_handshake_first_message() {
    let engine = FakeEngineBuilder::raw(EngineKind::Attester)
        .message(json!({"event": "tasksList", "tasks": []}))
        .build();

    let err = EngineProcess::start(&engine.config(), NO_ARGS)
        .await
        .unwrap_err();
    match err {
        BridgeError::Incompatible { source, .. } => assert!(source.is_some()),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn start_rejects_silent_engine() {
    let engine = FakeEngineBuilder::raw(EngineKind::Attester).build();

    let err = EngineProcess::start(&engine.config(), NO_ARGS)
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Incompatible { .. }));
}

#[tokio::test]
async fn start_passes_json_flag_then_args() {
    let engine = FakeEngine::builder(EngineKind::AtJsTestRunner)
        .record_args()
        .then("exec sleep 3600")
        .build();

    let _process = EngineProcess::start(&engine.config(), &["--browser", "x y"])
        .await
        .unwrap();
    assert_eq!(engine.recorded_args(), vec!["-j", "--browser", "x y"]);
}

#[tokio::test]
async fn missing_entry_script_is_reported_with_setting() {
    let empty = tempfile::tempdir().unwrap();
    let config = EngineConfig::new(EngineKind::AtJsTestRunner, empty.path()).with_node("sh");

    let err = EngineProcess::start(&config, NO_ARGS).await.unwrap_err();
    match err {
        BridgeError::EntryScriptNotFound { setting, path } => {
            assert_eq!(setting, "ATJSTESTRUNNER_PATH");
            assert!(path.ends_with("bin/atjstestrunner.js"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn missing_runtime_binary_names_its_setting() {
    let engine = FakeEngine::builder(EngineKind::Attester).build();
    let config = engine.config().with_node("/nonexistent/bin/node");

    let err = EngineProcess::start(&config, NO_ARGS).await.unwrap_err();
    assert!(err.is_config_error());
    let msg = err.to_string();
    assert!(msg.contains("/nonexistent/bin/node"));
    assert!(msg.contains("ATTESTER_NODE_BIN"));
}

#[tokio::test]
async fn messages_are_read_in_order() {
    let engine = FakeEngine::builder(EngineKind::Attester)
        .message(json!({"event": "tasksList", "tasks": []}))
        .message(json!({"event": "campaignFinished"}))
        .then("exec sleep 3600")
        .build();

    let mut process = EngineProcess::start(&engine.config(), NO_ARGS).await.unwrap();
    assert_eq!(
        process.read_message().await.unwrap()["event"],
        "tasksList"
    );
    assert_eq!(
        process.read_message().await.unwrap()["event"],
        "campaignFinished"
    );
}

#[tokio::test]
async fn end_of_stream_is_unexpected_termination() {
    let engine = FakeEngine::builder(EngineKind::Attester)
        .message(json!({"event": "taskStarted", "taskId": 1}))
        .build();

    let mut process = EngineProcess::start(&engine.config(), NO_ARGS).await.unwrap();
    process.read_message().await.unwrap();

    let err = process.read_message().await.unwrap_err();
    assert!(matches!(
        err,
        BridgeError::UnexpectedTermination {
            application: "attester"
        }
    ));
    assert!(!process.is_alive());

    // Torn down processes keep failing the same way.
    let err = process.read_message().await.unwrap_err();
    assert!(matches!(err, BridgeError::UnexpectedTermination { .. }));
}

#[tokio::test]
async fn malformed_output_kills_the_engine() {
    let engine = FakeEngine::builder(EngineKind::Attester)
        .raw_line("{not json}")
        .then("exec sleep 3600")
        .build();

    let mut process = EngineProcess::start(&engine.config(), NO_ARGS).await.unwrap();
    let err = process.read_message().await.unwrap_err();
    assert!(matches!(err, BridgeError::Decode { .. }));
    assert!(!process.is_alive());
    assert_eq!(process.pid(), None);
}

#[tokio::test]
async fn check_process_ended_is_idempotent() {
    let engine = FakeEngine::builder(EngineKind::Attester)
        .then("exec sleep 3600")
        .build();

    let mut process = EngineProcess::start(&engine.config(), NO_ARGS).await.unwrap();
    process.check_process_ended();
    process.check_process_ended();
    assert!(!process.is_alive());
}
