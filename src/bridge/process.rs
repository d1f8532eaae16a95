//! Request/response bridge to a long-lived interpreter process
//!
//! Calls are multiplexed over one interpreter: each request carries a fresh
//! correlation id and replies are matched by id, in any order. A reader task
//! dispatches replies; a writer task serializes requests onto the input
//! stream. Every started interpreter gets a generation number so that a crash
//! fails exactly the calls written to the dead process.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::pending::PendingCalls;
use super::protocol::{BridgeResponse, decode_line, encode_request};
use super::spawner::{InterpreterSpawner, SubprocessSpawner};
use crate::config::InterpreterConfig;
use crate::errors::{ErrorKind, LspError, LspResult};

struct ConnectionState {
    generation: u64,
    alive: AtomicBool,
}

struct Connection {
    state: Arc<ConnectionState>,
    outgoing: mpsc::UnboundedSender<String>,
    child: Option<Child>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl Connection {
    fn is_alive(&self) -> bool {
        self.state.alive.load(Ordering::Acquire)
    }

    /// Registers call `id` against this interpreter and queues its request.
    fn enqueue(
        &self,
        pending: &PendingCalls,
        id: u64,
        method: &str,
        line: String,
    ) -> LspResult<oneshot::Receiver<LspResult<Value>>> {
        let reply = pending.register(id, self.state.generation);
        // A loss noticed after this check fails the call along with its generation
        if !self.is_alive() {
            pending.retire(id);
            return Err(LspError::bridge(
                ErrorKind::ProcessExited,
                format!("Interpreter exited before '{}' could be sent", method),
            ));
        }
        if self.outgoing.send(line).is_err() {
            pending.retire(id);
            return Err(LspError::bridge(
                ErrorKind::Transport,
                format!("Interpreter input closed before '{}' could be sent", method),
            ));
        }
        Ok(reply)
    }

    fn terminate(mut self) {
        self.state.alive.store(false, Ordering::Release);
        if let Some(child) = self.child.as_mut()
            && let Err(e) = child.start_kill()
        {
            debug!("Interpreter already gone: {}", e);
        }
        self.writer_task.abort();
        self.reader_task.abort();
    }
}

struct BridgeInner {
    spawner: Arc<dyn InterpreterSpawner>,
    timeout: Duration,
    next_id: AtomicU64,
    generations: AtomicU64,
    pending: PendingCalls,
    connection: Mutex<Option<Connection>>,
    closed: AtomicBool,
}

/// Handle to the interpreter bridge. Clones share the same interpreter.
#[derive(Clone)]
pub struct ProcessBridge {
    inner: Arc<BridgeInner>,
}

impl ProcessBridge {
    pub fn new(spawner: Arc<dyn InterpreterSpawner>, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                spawner,
                timeout,
                next_id: AtomicU64::new(1),
                generations: AtomicU64::new(0),
                pending: PendingCalls::new(),
                connection: Mutex::new(None),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn from_config(config: &InterpreterConfig) -> Self {
        Self::new(Arc::new(SubprocessSpawner::from_config(config)), config.timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Sends `method` with `params` using the configured timeout.
    pub async fn send(&self, method: &str, params: Value) -> LspResult<Value> {
        self.send_with_timeout(method, params, self.inner.timeout).await
    }

    /// Sends one request and waits for its reply.
    ///
    /// Fails with a `bridge` error on transport, framing, timeout or process
    /// failures and with a `pike` error when the interpreter replies with an
    /// error. Dropping the returned future retires the call; the interpreter
    /// is not told to abandon the work.
    pub async fn send_with_timeout(&self, method: &str, params: Value, timeout: Duration) -> LspResult<Value> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let line = encode_request(id, method, &params)?;

        let reply = {
            let mut slot = self.inner.connection.lock().await;
            let connection = self.inner.connection(&mut slot).await?;
            connection.enqueue(&self.inner.pending, id, method, line)?
        };
        trace!("Sent '{}' as call {}", method, id);

        let pending = &self.inner.pending;
        let _retire = scopeguard::guard(id, |id| {
            if pending.retire(id) {
                trace!("Retired call {}", id);
            }
        });

        match tokio::time::timeout(timeout, reply).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(LspError::bridge(
                ErrorKind::ProcessExited,
                format!("Call {} ('{}') was dropped by the bridge", id, method),
            )),
            Err(_) => {
                warn!("Call {} ('{}') timed out after {:?}", id, method, timeout);
                Err(LspError::bridge(
                    ErrorKind::Timeout,
                    format!("No reply to '{}' within {} ms", method, timeout.as_millis()),
                ))
            }
        }
    }

    /// Number of calls awaiting a reply.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Number of interpreters started so far.
    pub fn spawn_count(&self) -> u64 {
        self.inner.generations.load(Ordering::Acquire)
    }

    pub async fn is_running(&self) -> bool {
        matches!(&*self.inner.connection.lock().await, Some(connection) if connection.is_alive())
    }

    /// Stops the interpreter and fails in-flight calls. Later calls fail
    /// without restarting it.
    pub async fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::Release);
        let connection = self.inner.connection.lock().await.take();
        if let Some(connection) = connection {
            let generation = connection.state.generation;
            connection.terminate();
            let failed = self.inner.pending.fail_generation(generation, || {
                LspError::bridge(ErrorKind::ProcessExited, "Bridge is shutting down")
            });
            info!("Interpreter bridge shut down ({} in-flight call(s) failed)", failed);
        }
    }
}

impl BridgeInner {
    /// Returns the live connection, starting an interpreter when there is
    /// none. Callers hold the connection lock, so concurrent callers queue
    /// behind a restart.
    async fn connection<'a>(self: &Arc<Self>, slot: &'a mut Option<Connection>) -> LspResult<&'a Connection> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LspError::bridge(ErrorKind::ProcessExited, "Bridge has been shut down"));
        }

        if !matches!(slot, Some(connection) if connection.is_alive()) {
            if let Some(dead) = slot.take() {
                dead.terminate();
            }
            *slot = Some(self.start().await?);
        }

        slot.as_ref()
            .ok_or_else(|| LspError::server("Interpreter connection missing after start"))
    }

    async fn start(self: &Arc<Self>) -> LspResult<Connection> {
        let channel = self.spawner.spawn().await.map_err(|e| {
            LspError::bridge(
                ErrorKind::ProcessExited,
                format!("Failed to start interpreter '{}'", self.spawner.describe()),
            )
            .with_cause(e.into())
        })?;

        let generation = self.generations.fetch_add(1, Ordering::AcqRel);
        let state = Arc::new(ConnectionState {
            generation,
            alive: AtomicBool::new(true),
        });
        let (outgoing, incoming) = mpsc::unbounded_channel();

        let reader_task = tokio::spawn(read_replies(Arc::downgrade(self), state.clone(), channel.reader));
        let writer_task = tokio::spawn(write_requests(
            Arc::downgrade(self),
            state.clone(),
            channel.writer,
            incoming,
        ));

        if generation > 0 {
            info!("Restarted interpreter (generation {})", generation);
        } else {
            info!("Started interpreter '{}'", self.spawner.describe());
        }

        Ok(Connection {
            state,
            outgoing,
            child: channel.child,
            reader_task,
            writer_task,
        })
    }

    fn dispatch(&self, line: &str) {
        match decode_line(line) {
            Ok(BridgeResponse::Reply { id, outcome }) => {
                if !self.pending.complete(id, outcome) {
                    debug!("Discarding reply to retired call {}", id);
                }
            }
            Ok(BridgeResponse::Log { level, message }) => match level.as_str() {
                "error" => error!(target: "pike_interpreter", "{}", message),
                "warn" | "warning" => warn!(target: "pike_interpreter", "{}", message),
                "debug" => debug!(target: "pike_interpreter", "{}", message),
                _ => info!(target: "pike_interpreter", "{}", message),
            },
            Err(e) => warn!("Ignoring interpreter output: {}", e.chain()),
        }
    }

    /// Fails every call written to the lost interpreter, then clears it so
    /// the next call starts a fresh one.
    async fn connection_lost(&self, state: &ConnectionState, reason: &str) {
        state.alive.store(false, Ordering::Release);
        let failed = self.pending.fail_generation(state.generation, || {
            LspError::bridge(
                ErrorKind::ProcessExited,
                format!("Interpreter exited unexpectedly: {}", reason),
            )
        });
        if !self.closed.load(Ordering::Acquire) {
            warn!(
                "Interpreter generation {} lost ({}), failed {} in-flight call(s)",
                state.generation, reason, failed
            );
        }

        let mut slot = self.connection.lock().await;
        if matches!(&*slot, Some(connection) if connection.state.generation == state.generation)
            && let Some(connection) = slot.take()
        {
            connection.terminate();
        }
    }
}

async fn read_replies(
    inner: Weak<BridgeInner>,
    state: Arc<ConnectionState>,
    reader: Box<dyn AsyncRead + Send + Unpin>,
) {
    let mut lines = BufReader::new(reader).lines();
    let reason = loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                let Some(inner) = inner.upgrade() else { return };
                inner.dispatch(&line);
            }
            Ok(None) => break "output closed".to_string(),
            Err(e) => break format!("read failed: {}", e),
        }
    };

    if let Some(inner) = inner.upgrade() {
        inner.connection_lost(&state, &reason).await;
    }
}

async fn write_requests(
    inner: Weak<BridgeInner>,
    state: Arc<ConnectionState>,
    mut writer: Box<dyn AsyncWrite + Send + Unpin>,
    mut incoming: mpsc::UnboundedReceiver<String>,
) {
    while let Some(line) = incoming.recv().await {
        let written = match writer.write_all(line.as_bytes()).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Some(inner) = inner.upgrade() {
                inner.connection_lost(&state, &format!("write failed: {}", e)).await;
            }
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn connection(generation: u64) -> (Connection, mpsc::UnboundedReceiver<String>) {
        let (outgoing, incoming) = mpsc::unbounded_channel();
        let connection = Connection {
            state: Arc::new(ConnectionState {
                generation,
                alive: AtomicBool::new(true),
            }),
            outgoing,
            child: None,
            reader_task: tokio::spawn(async {}),
            writer_task: tokio::spawn(async {}),
        };
        (connection, incoming)
    }

    #[tokio::test]
    async fn test_enqueue_registers_and_writes() {
        let pending = PendingCalls::new();
        let (connection, mut incoming) = connection(2);

        let reply = connection.enqueue(&pending, 5, "tokenize", "{\"id\":5}\n".into()).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(incoming.recv().await.as_deref(), Some("{\"id\":5}\n"));

        assert!(pending.complete(5, Ok(json!([]))));
        assert_eq!(reply.await.unwrap().unwrap(), json!([]));
    }

    #[tokio::test]
    async fn test_enqueue_after_loss_fails_immediately() {
        let pending = PendingCalls::new();
        let (connection, mut incoming) = connection(2);

        // the reader saw EOF and failed generation 2 before this call registered
        connection.state.alive.store(false, Ordering::Release);
        let failed = pending.fail_generation(2, || LspError::bridge(ErrorKind::ProcessExited, "gone"));
        assert_eq!(failed, 0);

        let err = connection
            .enqueue(&pending, 6, "symbols", "{\"id\":6}\n".into())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProcessExited);
        assert!(err.message().contains("'symbols'"));
        assert!(pending.is_empty());
        assert!(incoming.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_enqueue_with_closed_writer() {
        let pending = PendingCalls::new();
        let (connection, incoming) = connection(0);
        drop(incoming);

        let err = connection.enqueue(&pending, 1, "ping", "{}\n".into()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(pending.is_empty());
    }
}
