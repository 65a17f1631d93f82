//! # Engine Bridge — Worker Process Lifecycle and Call Dispatch
//!
//! Owns the worker process and both halves of its stdio. A background
//! reader task decodes response lines and routes them through the
//! [`PendingTable`]; request writes are serialized through the connection
//! lock, so submission order on the stream is the order callers acquired
//! it. Waiting for responses happens outside the lock — calls pipeline.
//!
//! ## Failure Semantics
//!
//! - Spawn failure → [`BridgeError::Spawn`]; the bridge stays disconnected.
//! - Timeout → the pending entry is removed, so a late response for that
//!   id is dropped rather than misdelivered, and the caller gets
//!   [`BridgeError::Timeout`].
//! - Worker exit → every pending call fails promptly with
//!   [`BridgeError::Closed`]; the bridge returns to disconnected and does
//!   not restart the worker.
//! - Malformed response line → logged and discarded; only the call whose
//!   response was mangled is affected (it times out).

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use ciaf_core::{Commitment, ProvenanceCapsule};

use crate::error::BridgeError;
use crate::pending::PendingTable;
use crate::protocol::{
    AnchorPayload, CapsulesPayload, DatasetItem, EngineOperation, ReceiptPayload,
    ReportAnchorInput, ReportPayload, ReportReceiptInput, RequestFrame, ResponseFrame,
    VerifyItemPayload,
};

/// Default per-call timeout when the config does not override it.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Worker process configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Executable to spawn as the engine worker.
    pub command: String,
    /// Arguments passed to the worker.
    pub args: Vec<String>,
    /// Timeout applied by the typed operation wrappers.
    pub default_timeout: Duration,
}

impl EngineConfig {
    /// Configuration for a worker command with no arguments.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set worker arguments.
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the timeout used by the typed operation wrappers.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

/// A live worker connection.
struct Connection {
    child: Child,
    stdin: ChildStdin,
    /// Ties this connection to its reader task, so a stale reader from a
    /// previous worker cannot tear down a newer connection.
    generation: u64,
}

/// State shared with the stdout reader task.
struct Inner {
    conn: Mutex<Option<Connection>>,
    pending: PendingTable,
}

/// Process-boundary RPC client for the external cryptographic engine.
///
/// Explicitly owned and lifetime-scoped: construct one, inject it where it
/// is needed. One bridge instance owns exactly one worker process and its
/// stdio streams.
pub struct EngineBridge {
    config: EngineConfig,
    inner: Arc<Inner>,
    next_id: AtomicU64,
    generation: AtomicU64,
}

impl std::fmt::Debug for EngineBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBridge")
            .field("command", &self.config.command)
            .field("pending", &self.inner.pending.len())
            .finish()
    }
}

impl EngineBridge {
    /// Create a disconnected bridge.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Inner { conn: Mutex::new(None), pending: PendingTable::new() }),
            next_id: AtomicU64::new(1),
            generation: AtomicU64::new(0),
        }
    }

    /// The configuration this bridge was constructed with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start the worker process.
    ///
    /// Idempotent: if the worker is already running, returns immediately
    /// with no side effects.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Spawn`] if the worker process cannot be started.
    pub async fn connect(&self) -> Result<(), BridgeError> {
        let mut conn = self.inner.conn.lock().await;
        if conn.is_some() {
            return Ok(());
        }

        let mut cmd = Command::new(&self.config.command);
        // stderr goes to null: piping it without a reader would deadlock
        // the worker once the OS pipe buffer fills.
        cmd.args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| BridgeError::Spawn(e.to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Spawn("failed to capture worker stdout".to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::Spawn("failed to capture worker stdin".to_string()))?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::spawn(read_responses(Arc::clone(&self.inner), stdout, generation));

        *conn = Some(Connection { child, stdin, generation });
        tracing::info!(command = %self.config.command, "engine worker started");
        Ok(())
    }

    /// Whether a worker is currently connected.
    pub async fn is_connected(&self) -> bool {
        self.inner.conn.lock().await.is_some()
    }

    /// Terminate the worker and fail all pending calls.
    ///
    /// Idempotent; a disconnected bridge stays disconnected.
    pub async fn disconnect(&self) {
        let taken = self.inner.conn.lock().await.take();
        if let Some(mut connection) = taken {
            if let Err(error) = connection.child.kill().await {
                tracing::warn!(%error, "failed to kill engine worker");
            }
            let dropped = self.inner.pending.fail_all();
            tracing::info!(dropped, "engine worker disconnected");
        }
    }

    /// Send one operation and wait for its response frame.
    ///
    /// The call is registered before the request line is written, so the
    /// response cannot race the registration. On timeout the pending entry
    /// is removed — a late response for this id is dropped.
    pub async fn send_request(
        &self,
        operation: EngineOperation,
        timeout: Duration,
    ) -> Result<ResponseFrame, BridgeError> {
        let op_name = operation.name();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let frame = RequestFrame { id, operation };
        let mut line = serde_json::to_string(&frame)
            .map_err(|e| BridgeError::Protocol(format!("failed to encode {op_name}: {e}")))?;
        line.push('\n');

        let rx = self.inner.pending.register(id);

        {
            let mut conn = self.inner.conn.lock().await;
            let Some(connection) = conn.as_mut() else {
                self.inner.pending.remove(id);
                return Err(BridgeError::NotConnected);
            };
            if let Err(e) = connection.stdin.write_all(line.as_bytes()).await {
                self.inner.pending.remove(id);
                return Err(BridgeError::Io(e));
            }
            if let Err(e) = connection.stdin.flush().await {
                self.inner.pending.remove(id);
                return Err(BridgeError::Io(e));
            }
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(frame)) => Ok(frame),
            // Sender dropped: worker exited or the bridge disconnected.
            Ok(Err(_)) => Err(BridgeError::Closed),
            Err(_) => {
                self.inner.pending.remove(id);
                Err(BridgeError::Timeout { operation: op_name, timeout_ms: timeout.as_millis() })
            }
        }
    }

    /// Seal dataset items into provenance capsules.
    pub async fn create_provenance_capsules(
        &self,
        dataset_id: &str,
        items: Vec<DatasetItem>,
    ) -> Result<Vec<ProvenanceCapsule>, BridgeError> {
        let frame = self
            .send_request(
                EngineOperation::CreateProvenanceCapsules {
                    dataset_id: dataset_id.to_string(),
                    items,
                },
                self.config.default_timeout,
            )
            .await?;
        let payload: CapsulesPayload = decode_payload(frame, "createProvenanceCapsules")?;
        Ok(payload.capsules)
    }

    /// Commit to a dataset's identity, metadata, and capsule batch.
    pub async fn create_dataset_anchor(
        &self,
        dataset_id: &str,
        metadata: Map<String, Value>,
        capsules: Vec<Commitment>,
    ) -> Result<AnchorPayload, BridgeError> {
        let frame = self
            .send_request(
                EngineOperation::CreateDatasetAnchor {
                    dataset_id: dataset_id.to_string(),
                    metadata,
                    capsules,
                },
                self.config.default_timeout,
            )
            .await?;
        decode_payload(frame, "createDatasetAnchor")
    }

    /// Issue an inference receipt over raw input/output payloads.
    pub async fn create_inference_receipt(
        &self,
        model_id: &str,
        input_data: Value,
        output_prediction: Value,
        confidence_score: f64,
    ) -> Result<ReceiptPayload, BridgeError> {
        let frame = self
            .send_request(
                EngineOperation::CreateInferenceReceipt {
                    model_id: model_id.to_string(),
                    input_data,
                    output_prediction,
                    confidence_score,
                },
                self.config.default_timeout,
            )
            .await?;
        decode_payload(frame, "createInferenceReceipt")
    }

    /// Check membership of an item in an anchored capsule batch.
    pub async fn verify_item(
        &self,
        item_id: &str,
        content: Value,
        capsules: Vec<ProvenanceCapsule>,
        merkle_root: Commitment,
    ) -> Result<bool, BridgeError> {
        let frame = self
            .send_request(
                EngineOperation::VerifyItem {
                    item_id: item_id.to_string(),
                    content,
                    capsules,
                    merkle_root,
                },
                self.config.default_timeout,
            )
            .await?;
        let payload: VerifyItemPayload = decode_payload(frame, "verifyItem")?;
        Ok(payload.is_valid)
    }

    /// Summarize artifacts into a committed audit report.
    pub async fn generate_report(
        &self,
        anchors: Vec<ReportAnchorInput>,
        receipts: Vec<ReportReceiptInput>,
    ) -> Result<ReportPayload, BridgeError> {
        let frame = self
            .send_request(
                EngineOperation::GenerateReport { anchors, receipts },
                self.config.default_timeout,
            )
            .await?;
        decode_payload(frame, "generateReport")
    }
}

/// Decode a successful frame's body into the operation's typed payload.
fn decode_payload<T: DeserializeOwned>(
    frame: ResponseFrame,
    operation: &'static str,
) -> Result<T, BridgeError> {
    if !frame.success {
        return Err(BridgeError::Operation {
            operation,
            message: frame
                .error
                .unwrap_or_else(|| "worker reported failure without a message".to_string()),
        });
    }
    serde_json::from_value(Value::Object(frame.body))
        .map_err(|e| BridgeError::Protocol(format!("{operation} payload did not match schema: {e}")))
}

/// Stdout reader: decode response lines and route them by id.
///
/// Runs until the worker's stdout closes. On exit, clears the connection
/// (if it is still this task's generation) and fails pending calls so
/// waiting callers observe [`BridgeError::Closed`] promptly instead of
/// hanging until their timeouts.
async fn read_responses(inner: Arc<Inner>, stdout: ChildStdout, generation: u64) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<ResponseFrame>(line) {
                    Ok(frame) => {
                        let id = frame.id;
                        if !inner.pending.complete(frame) {
                            tracing::warn!(id, "response for unknown request id dropped");
                        }
                    }
                    Err(error) => {
                        tracing::warn!(%error, "malformed response line discarded");
                    }
                }
            }
            Ok(None) => break,
            Err(error) => {
                tracing::warn!(%error, "error reading worker stdout");
                break;
            }
        }
    }

    let mut conn = inner.conn.lock().await;
    let ours = matches!(&*conn, Some(c) if c.generation == generation);
    if ours {
        *conn = None;
        drop(conn);
        let dropped = inner.pending.fail_all();
        if dropped > 0 {
            tracing::warn!(dropped, "engine worker exited with calls in flight");
        } else {
            tracing::info!("engine worker exited");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Shell worker that answers every request with `{"id":N,"success":true,
    /// "capsules":[]}` — enough for the capsule wrapper to decode.
    const ECHO_WORKER: &str = r#"
while read line; do
  id=$(printf '%s' "$line" | sed 's/.*"id":\([0-9]*\).*/\1/')
  printf '{"id":%s,"success":true,"capsules":[]}\n' "$id"
done
"#;

    /// Shell worker that tags responses with a processing sequence number.
    const SEQ_WORKER: &str = r#"
n=0
while read line; do
  id=$(printf '%s' "$line" | sed 's/.*"id":\([0-9]*\).*/\1/')
  printf '{"id":%s,"success":true,"seq":%s}\n' "$id" "$n"
  n=$((n+1))
done
"#;

    /// Shell worker that emits one garbage line before each real response.
    const NOISY_WORKER: &str = r#"
while read line; do
  id=$(printf '%s' "$line" | sed 's/.*"id":\([0-9]*\).*/\1/')
  echo 'this is not json'
  printf '{"id":%s,"success":true,"capsules":[]}\n' "$id"
done
"#;

    /// Shell worker that reads requests but never responds.
    const SILENT_WORKER: &str = r#"
while read line; do :; done
"#;

    /// Shell worker that answers the first request only after a delay.
    const SLOW_FIRST_WORKER: &str = r#"
first=1
while read line; do
  id=$(printf '%s' "$line" | sed 's/.*"id":\([0-9]*\).*/\1/')
  if [ "$first" = "1" ]; then first=0; sleep 1; fi
  printf '{"id":%s,"success":true,"capsules":[]}\n' "$id"
done
"#;

    /// Shell worker that rejects every request.
    const REJECTING_WORKER: &str = r#"
while read line; do
  id=$(printf '%s' "$line" | sed 's/.*"id":\([0-9]*\).*/\1/')
  printf '{"id":%s,"success":false,"error":"no capacity"}\n' "$id"
done
"#;

    fn sh_bridge(script: &str) -> EngineBridge {
        EngineBridge::new(
            EngineConfig::new("sh")
                .with_args(["-c", script])
                .with_default_timeout(Duration::from_secs(5)),
        )
    }

    async fn capsules_call(bridge: &EngineBridge) -> Result<Vec<ProvenanceCapsule>, BridgeError> {
        bridge.create_provenance_capsules("ds", vec![]).await
    }

    #[tokio::test]
    async fn spawn_failure_reported() {
        let bridge = EngineBridge::new(EngineConfig::new("/nonexistent/ciaf-worker-xyz"));
        match bridge.connect().await {
            Err(BridgeError::Spawn(_)) => {}
            other => panic!("expected Spawn error, got {other:?}"),
        }
        assert!(!bridge.is_connected().await);
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let bridge = sh_bridge(ECHO_WORKER);
        bridge.connect().await.unwrap();
        bridge.connect().await.unwrap();
        assert!(bridge.is_connected().await);
        bridge.disconnect().await;
    }

    #[tokio::test]
    async fn round_trip_through_worker() {
        let bridge = sh_bridge(ECHO_WORKER);
        bridge.connect().await.unwrap();
        let capsules = capsules_call(&bridge).await.unwrap();
        assert!(capsules.is_empty());
        bridge.disconnect().await;
    }

    #[tokio::test]
    async fn pipelined_calls_resolve_in_submission_order() {
        let bridge = sh_bridge(SEQ_WORKER);
        bridge.connect().await.unwrap();

        let op = || EngineOperation::CreateProvenanceCapsules {
            dataset_id: "ds".to_string(),
            items: vec![],
        };
        let t = Duration::from_secs(5);
        let (r0, r1, r2, r3, r4) = tokio::join!(
            bridge.send_request(op(), t),
            bridge.send_request(op(), t),
            bridge.send_request(op(), t),
            bridge.send_request(op(), t),
            bridge.send_request(op(), t),
        );
        for (i, frame) in [r0, r1, r2, r3, r4].into_iter().enumerate() {
            let frame = frame.unwrap();
            assert_eq!(
                frame.body["seq"].as_u64(),
                Some(i as u64),
                "call {i} resolved someone else's response"
            );
        }
        bridge.disconnect().await;
    }

    #[tokio::test]
    async fn malformed_lines_are_discarded_not_misdelivered() {
        let bridge = sh_bridge(NOISY_WORKER);
        bridge.connect().await.unwrap();
        // Each call still resolves despite the garbage line before it.
        assert!(capsules_call(&bridge).await.is_ok());
        assert!(capsules_call(&bridge).await.is_ok());
        bridge.disconnect().await;
    }

    #[tokio::test]
    async fn timeout_removes_pending_entry() {
        let bridge = sh_bridge(SILENT_WORKER);
        bridge.connect().await.unwrap();

        let op = EngineOperation::CreateProvenanceCapsules {
            dataset_id: "ds".to_string(),
            items: vec![],
        };
        let result = bridge.send_request(op, Duration::from_millis(100)).await;
        match result {
            Err(BridgeError::Timeout { operation, .. }) => {
                assert_eq!(operation, "createProvenanceCapsules");
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
        assert!(bridge.inner.pending.is_empty(), "timed-out entry must be removed");
        bridge.disconnect().await;
    }

    #[tokio::test]
    async fn late_response_does_not_resolve_the_next_call() {
        let bridge = sh_bridge(SLOW_FIRST_WORKER);
        bridge.connect().await.unwrap();

        let op = || EngineOperation::CreateProvenanceCapsules {
            dataset_id: "ds".to_string(),
            items: vec![],
        };
        // First call times out; its entry is removed.
        let first = bridge.send_request(op(), Duration::from_millis(50)).await;
        assert!(matches!(first, Err(BridgeError::Timeout { .. })));

        // Second call must get its own response, not the late first one.
        let second = bridge.send_request(op(), Duration::from_secs(5)).await.unwrap();
        assert_eq!(second.id, 2);
        bridge.disconnect().await;
    }

    #[tokio::test]
    async fn worker_exit_fails_pending_calls() {
        // Worker exits after consuming one request without responding.
        let bridge = sh_bridge("read line");
        bridge.connect().await.unwrap();

        let op = EngineOperation::CreateProvenanceCapsules {
            dataset_id: "ds".to_string(),
            items: vec![],
        };
        let result = bridge.send_request(op, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(BridgeError::Closed)), "got {result:?}");
        assert!(!bridge.is_connected().await);
    }

    #[tokio::test]
    async fn disconnect_then_reconnect() {
        let bridge = sh_bridge(ECHO_WORKER);
        bridge.connect().await.unwrap();
        bridge.disconnect().await;
        assert!(!bridge.is_connected().await);

        let result = capsules_call(&bridge).await;
        assert!(matches!(result, Err(BridgeError::NotConnected)));

        bridge.connect().await.unwrap();
        assert!(capsules_call(&bridge).await.is_ok());
        bridge.disconnect().await;
    }

    #[tokio::test]
    async fn worker_rejection_surfaces_as_operation_error() {
        let bridge = sh_bridge(REJECTING_WORKER);
        bridge.connect().await.unwrap();
        match capsules_call(&bridge).await {
            Err(BridgeError::Operation { operation, message }) => {
                assert_eq!(operation, "createProvenanceCapsules");
                assert_eq!(message, "no capacity");
            }
            other => panic!("expected Operation error, got {other:?}"),
        }
        bridge.disconnect().await;
    }

    #[tokio::test]
    async fn schema_mismatch_surfaces_as_protocol_error() {
        // Worker replies success but with a payload that is not a capsule list.
        let bridge = sh_bridge(
            r#"
while read line; do
  id=$(printf '%s' "$line" | sed 's/.*"id":\([0-9]*\).*/\1/')
  printf '{"id":%s,"success":true,"capsules":"oops"}\n' "$id"
done
"#,
        );
        bridge.connect().await.unwrap();
        let result = capsules_call(&bridge).await;
        assert!(matches!(result, Err(BridgeError::Protocol(_))), "got {result:?}");
        bridge.disconnect().await;
    }
}
