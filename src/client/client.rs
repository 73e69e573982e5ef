//! SPDX-License-Identifier: MIT

//! The command client: owns the socket, the decoder, a command queue, and
//! a dispatch state machine; performs socket discovery by spawning the
//! service's CLI when `WATCHMAN_SOCK` isn't set.

use std::{collections::VecDeque, sync::Arc};

use bytes::BytesMut;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        UnixStream,
        unix::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{Mutex, broadcast, oneshot},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::{
    capability,
    discovery::discover_socket_path,
    error::{CapabilityError, ClientError},
    events::Events,
};
use super::capability::CapabilityResult;
use crate::{
    bser::{self, Decoder},
    cfg::config::ClientConfig,
    value::{Object, Value},
};

/// Coarse connection lifecycle. A separate `connecting` guard against
/// concurrent connect attempts is folded into the `Connecting` variant
/// here — one piece of state, one lock, same guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientState {
    Idle,
    Connecting,
    ConnectedIdle,
    ConnectedInFlight,
    Closed,
}

/// A queued or in-flight command. The completion callback is a
/// `oneshot::Sender`, which fires exactly once by construction.
struct QueueEntry {
    request: Value,
    respond: oneshot::Sender<Result<Value, ClientError>>,
}

/// Shared state behind the client handle. [`Client`] is a thin, `Clone`able
/// wrapper around `Arc<Shared>` so callers can hold multiple handles to the
/// same single connection while letting Rust's ownership rules do the
/// sharing.
struct Shared {
    config: ClientConfig,
    events: Events,
    state: Mutex<ClientState>,
    queue: Mutex<VecDeque<QueueEntry>>,
    in_flight: Mutex<Option<QueueEntry>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    cancel: CancellationToken,
    /// Set once by [`Client::end`]. Distinguishes a permanent shutdown from
    /// a transient disconnect, which instead resets to `Idle` so the next
    /// `command()` reconnects: `end()` is a one-way terminator, but an
    /// ordinary connection drop is not.
    ended: Mutex<bool>,
}

/// Command client for the file-watching service.
#[derive(Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

impl Client {
    /// Builds a client that has not yet connected. The first [`Client::command`]
    /// or [`Client::capability_check`] call triggers discovery and connect.
    pub fn new(config: ClientConfig) -> Self {
        Client {
            shared: Arc::new(Shared {
                config,
                events: Events::new(),
                state: Mutex::new(ClientState::Idle),
                queue: Mutex::new(VecDeque::new()),
                in_flight: Mutex::new(None),
                writer: Mutex::new(None),
                cancel: CancellationToken::new(),
                ended: Mutex::new(false),
            }),
        }
    }

    /// A client configured to discover `watchman` on `PATH`.
    pub fn with_default_config() -> Self {
        Self::new(ClientConfig::default())
    }

    /// Subscribes to the `connect` event.
    pub fn on_connect(&self) -> broadcast::Receiver<()> {
        self.shared.events.subscribe_connect()
    }

    /// Subscribes to the `end` event.
    pub fn on_end(&self) -> broadcast::Receiver<()> {
        self.shared.events.subscribe_end()
    }

    /// Subscribes to the `error` event.
    pub fn on_error(&self) -> broadcast::Receiver<Arc<ClientError>> {
        self.shared.events.subscribe_error()
    }

    /// Subscribes to unilateral `subscription` events.
    pub fn on_subscription(&self) -> broadcast::Receiver<Value> {
        self.shared.events.subscribe_subscription()
    }

    /// Subscribes to unilateral `log` events.
    pub fn on_log(&self) -> broadcast::Receiver<Value> {
        self.shared.events.subscribe_log()
    }

    /// Enqueues `request`, connecting first if necessary, and resolves once
    /// the matching response arrives. Completion fires exactly once,
    /// carrying a [`ClientError::Protocol`] if the response's `error`
    /// field is present.
    pub async fn command(&self, request: Value) -> Result<Value, ClientError> {
        if *self.shared.ended.lock().await {
            return Err(ClientError::Ended);
        }

        let (tx, rx) = oneshot::channel();
        {
            let mut queue = self.shared.queue.lock().await;
            queue.push_back(QueueEntry { request, respond: tx });
        }
        self.shared.kick().await;
        rx.await.map_err(|_| ClientError::ConnectionClosed)?
    }

    /// Submits a `["version", {optional, required}]` command and checks the
    /// response's `capabilities` map, synthesizing one from the `version`
    /// string for servers too old to report it directly.
    pub async fn capability_check(
        &self,
        optional: &[&str],
        required: &[&str],
    ) -> Result<CapabilityResult, CapabilityError> {
        let mut args = Object::new();
        args.insert(
            "optional".to_owned(),
            Value::array(optional.iter().map(|s| Value::from(*s))),
        );
        args.insert(
            "required".to_owned(),
            Value::array(required.iter().map(|s| Value::from(*s))),
        );
        let request = Value::array([Value::from("version"), Value::Object(args)]);

        let response = self.command(request).await?;
        let version = response
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        let capabilities = match response.get("capabilities").and_then(Value::as_object) {
            Some(map) => map
                .iter()
                .map(|(k, v)| (k.clone(), v.as_bool().unwrap_or(false)))
                .collect(),
            None => {
                let names = optional.iter().copied().chain(required.iter().copied());
                capability::synthesize(&version, names)
            },
        };

        for name in required {
            if !capabilities.get(*name).copied().unwrap_or(false) {
                return Err(CapabilityError::Unsupported((*name).to_owned()));
            }
        }

        Ok(CapabilityResult { version, capabilities })
    }

    /// Idempotent terminator: cancels all pending commands with "The
    /// client was ended", closes the socket, and drops the decoder.
    pub async fn end(&self) {
        *self.shared.ended.lock().await = true;
        self.shared.cancel.cancel();
        self.shared.cancel_commands(ClientError::Ended).await;
        *self.shared.writer.lock().await = None;
        *self.shared.state.lock().await = ClientState::Closed;
    }
}

impl Shared {
    /// Starts a connect if idle; otherwise attempts to dispatch the head of
    /// the queue if the connection is free: if no socket exists and no
    /// connect is in progress, start connect; if a socket exists and no
    /// command is in flight, send next.
    async fn kick(self: &Arc<Self>) {
        let mut state = self.state.lock().await;
        match *state {
            ClientState::Idle => {
                *state = ClientState::Connecting;
                drop(state);
                let shared = Arc::clone(self);
                tokio::spawn(async move { shared.connect_and_run().await });
            },
            ClientState::ConnectedIdle => {
                drop(state);
                self.send_next().await;
            },
            ClientState::Connecting | ClientState::ConnectedInFlight | ClientState::Closed => {},
        }
    }

    async fn connect_and_run(self: Arc<Self>) {
        match self.discover_and_connect().await {
            Ok((read_half, write_half)) => {
                *self.writer.lock().await = Some(write_half);
                *self.state.lock().await = ClientState::ConnectedIdle;
                self.events.emit_connect();
                self.send_next().await;
                self.read_loop(read_half).await;
            },
            Err(err) => {
                let ended = *self.ended.lock().await;
                *self.state.lock().await =
                    if ended { ClientState::Closed } else { ClientState::Idle };
                self.events.emit_error(err.clone());
                self.cancel_commands(err).await;
            },
        }
    }

    async fn discover_and_connect(
        &self,
    ) -> Result<(OwnedReadHalf, OwnedWriteHalf), ClientError> {
        let path = discover_socket_path(&self.config).await?;
        debug!(socket = %path, "connecting to watchman");
        let stream = UnixStream::connect(&path)
            .await
            .map_err(|e| ClientError::Io(e.to_string()))?;
        Ok(stream.into_split())
    }

    /// Drains inbound bytes into the decoder and dispatches each completed
    /// PDU, yielding to the scheduler between values so a burst of
    /// subscription updates can't starve outbound writes.
    async fn read_loop(self: Arc<Self>, mut reader: OwnedReadHalf) {
        let mut decoder = Decoder::new();
        let mut buf = BytesMut::with_capacity(self.config.read_chunk_bytes);
        buf.resize(self.config.read_chunk_bytes, 0);

        'read: loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break 'read,
                result = reader.read(&mut buf) => {
                    match result {
                        Ok(0) => break 'read,
                        Ok(n) => {
                            decoder.feed(&buf[..n]);
                            loop {
                                match decoder.try_decode_one() {
                                    Ok(Some(value)) => {
                                        self.dispatch_inbound(value).await;
                                        tokio::task::yield_now().await;
                                    },
                                    Ok(None) => break,
                                    Err(e) => {
                                        warn!("decode error: {e}");
                                        self.events.emit_error(ClientError::from(e));
                                        break 'read;
                                    },
                                }
                            }
                        },
                        Err(e) => {
                            if !is_local_close(&e) {
                                self.events.emit_error(ClientError::Io(e.to_string()));
                            }
                            break 'read;
                        },
                    }
                },
            }
        }

        *self.writer.lock().await = None;
        let ended = *self.ended.lock().await;
        *self.state.lock().await = if ended { ClientState::Closed } else { ClientState::Idle };
        self.cancel_commands(ClientError::ConnectionClosed).await;
        self.events.emit_end();
    }

    /// Routes one decoded value: unilateral tags (`subscription`, `log`)
    /// fan out as events without touching the in-flight slot; everything
    /// else completes the in-flight command. When a value carries both a
    /// unilateral tag and an `error` field, the unilateral tag wins.
    async fn dispatch_inbound(self: &Arc<Self>, value: Value) {
        if let Some(subscription) = value.get("subscription") {
            trace!(subscription = ?subscription, "unilateral subscription event");
            self.events.emit_subscription(value);
            return;
        }
        if value.get("log").is_some() {
            trace!("unilateral log event");
            self.events.emit_log(value);
            return;
        }

        let entry = self.in_flight.lock().await.take();
        if let Some(entry) = entry {
            let result = match value.get("error").and_then(Value::as_str) {
                Some(message) => Err(ClientError::Protocol {
                    message: message.to_owned(),
                    response: value,
                }),
                None => Ok(value),
            };
            let _ = entry.respond.send(result);
        } else {
            warn!("received a response with no in-flight command");
        }

        *self.state.lock().await = ClientState::ConnectedIdle;
        self.send_next().await;
    }

    /// Sends the next queued command iff none is currently in flight.
    /// Encode failures fail that command alone and move on to the next;
    /// write failures tear down the connection.
    async fn send_next(self: &Arc<Self>) {
        loop {
            let mut in_flight = self.in_flight.lock().await;
            if in_flight.is_some() {
                return;
            }
            let entry = {
                let mut queue = self.queue.lock().await;
                match queue.pop_front() {
                    Some(entry) => entry,
                    None => return,
                }
            };

            match bser::encode(&entry.request) {
                Ok(bytes) => {
                    *in_flight = Some(entry);
                    drop(in_flight);
                    *self.state.lock().await = ClientState::ConnectedInFlight;

                    let mut writer = self.writer.lock().await;
                    let Some(stream) = writer.as_mut() else {
                        drop(writer);
                        if let Some(entry) = self.in_flight.lock().await.take() {
                            let _ = entry.respond.send(Err(ClientError::ConnectionClosed));
                        }
                        return;
                    };

                    if let Err(e) = stream.write_all(&bytes).await {
                        drop(writer);
                        if let Some(entry) = self.in_flight.lock().await.take() {
                            let _ = entry.respond.send(Err(ClientError::Io(e.to_string())));
                        }
                        self.cancel.cancel();
                    }
                    return;
                },
                Err(e) => {
                    drop(in_flight);
                    let _ = entry.respond.send(Err(ClientError::from(e)));
                    continue;
                },
            }
        }
    }

    /// Atomically steals the queue, prepends the in-flight command if any,
    /// then fails every stolen entry with `reason`.
    async fn cancel_commands(&self, reason: ClientError) {
        let stolen: Vec<QueueEntry> = {
            let mut queue = self.queue.lock().await;
            queue.drain(..).collect()
        };
        let in_flight = self.in_flight.lock().await.take();

        for entry in in_flight.into_iter().chain(stolen) {
            let _ = entry.respond.send(Err(reason.clone()));
        }
    }
}

/// The transport-level "operation canceled" artifact of a local close is
/// filtered from the `error` channel.
fn is_local_close(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionAborted | std::io::ErrorKind::NotConnected
    )
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, OnceLock};

    use tokio::net::UnixListener;

    use super::*;

    /// `WATCHMAN_SOCK` is process-global, so tests that set it run one at a
    /// time behind this guard rather than racing each other.
    fn sock_env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn temp_socket_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "bser-client-test-{tag}-{:?}.sock",
            std::thread::current().id()
        ))
    }

    /// Binds a Unix listener at `path` and accepts exactly one connection,
    /// driving it with `respond`: called once per decoded inbound request,
    /// returning the bytes to write back (already PDU-framed).
    fn spawn_mock_server<F>(path: std::path::PathBuf, mut respond: F) -> tokio::task::JoinHandle<()>
    where
        F: FnMut(Value) -> Vec<Vec<u8>> + Send + 'static,
    {
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).expect("bind mock socket");
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let mut decoder = Decoder::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => n,
                };
                decoder.feed(&buf[..n]);
                while let Ok(Some(value)) = decoder.try_decode_one() {
                    for out in respond(value) {
                        if stream.write_all(&out).await.is_err() {
                            return;
                        }
                    }
                }
            }
            let _ = std::fs::remove_file(&path);
        })
    }

    fn ok_response(payload: Object) -> Vec<u8> {
        bser::encode(&Value::Object(payload)).expect("encode response")
    }

    #[tokio::test]
    async fn commands_complete_in_submission_order() {
        let _lock = sock_env_guard().lock().unwrap_or_else(|e| e.into_inner());
        let path = temp_socket_path("ordering");
        // SAFETY: serialized by `sock_env_guard` above.
        unsafe { std::env::set_var("WATCHMAN_SOCK", &path) };

        let _server = spawn_mock_server(path, |req| {
            let tag = req.as_array().and_then(|a| a.first()).and_then(Value::as_str);
            let mut obj = Object::new();
            obj.insert("echo".to_owned(), Value::from(tag.unwrap_or_default()));
            vec![ok_response(obj)]
        });

        let client = Client::with_default_config();
        // Submitted concurrently (futures are polled together via `join!`)
        // so this exercises real FIFO queueing, not three round trips run
        // one at a time.
        let (ra, rb, rc) = tokio::join!(
            client.command(Value::array([Value::from("a")])),
            client.command(Value::array([Value::from("b")])),
            client.command(Value::array([Value::from("c")])),
        );
        let ra = ra.expect("a");
        let rb = rb.expect("b");
        let rc = rc.expect("c");

        assert_eq!(ra.get("echo").and_then(Value::as_str), Some("a"));
        assert_eq!(rb.get("echo").and_then(Value::as_str), Some("b"));
        assert_eq!(rc.get("echo").and_then(Value::as_str), Some("c"));

        unsafe { std::env::remove_var("WATCHMAN_SOCK") };
    }

    #[tokio::test]
    async fn unilateral_subscription_does_not_consume_in_flight() {
        let _lock = sock_env_guard().lock().unwrap_or_else(|e| e.into_inner());
        let path = temp_socket_path("unilateral");
        unsafe { std::env::set_var("WATCHMAN_SOCK", &path) };

        let _server = spawn_mock_server(path, |_req| {
            let mut sub = Object::new();
            sub.insert("subscription".to_owned(), Value::from("myname"));
            sub.insert("root".to_owned(), Value::from("/tmp"));

            let mut reply = Object::new();
            reply.insert("version".to_owned(), Value::from("2024.01.01.00"));
            vec![ok_response(sub), ok_response(reply)]
        });

        let client = Client::with_default_config();
        let mut sub_rx = client.on_subscription();

        let response = client
            .command(Value::array([Value::from("version")]))
            .await
            .expect("command");
        assert_eq!(response.get("version").and_then(Value::as_str), Some("2024.01.01.00"));

        let sub = sub_rx.recv().await.expect("subscription event");
        assert_eq!(sub.get("subscription").and_then(Value::as_str), Some("myname"));

        unsafe { std::env::remove_var("WATCHMAN_SOCK") };
    }

    #[tokio::test]
    async fn connection_drop_cancels_queued_commands() {
        let _lock = sock_env_guard().lock().unwrap_or_else(|e| e.into_inner());
        let path = temp_socket_path("teardown");
        unsafe { std::env::set_var("WATCHMAN_SOCK", &path) };

        // Accepts one connection, reads whatever was sent, then drops the
        // stream without responding - the client should observe EOF.
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).expect("bind mock socket");
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let mut buf = [0u8; 64];
            let _ = stream.read(&mut buf).await;
            drop(stream);
            let _ = std::fs::remove_file(&path);
        });

        let client = Client::with_default_config();
        let mut end_rx = client.on_end();
        let result = client.command(Value::array([Value::from("ping")])).await;
        assert!(matches!(result, Err(ClientError::ConnectionClosed)));

        end_rx.recv().await.expect("end event");
        server.await.expect("server task");

        unsafe { std::env::remove_var("WATCHMAN_SOCK") };
    }

    #[tokio::test]
    async fn response_error_field_fails_the_command() {
        let _lock = sock_env_guard().lock().unwrap_or_else(|e| e.into_inner());
        let path = temp_socket_path("protocol-error");
        unsafe { std::env::set_var("WATCHMAN_SOCK", &path) };

        let _server = spawn_mock_server(path, |_req| {
            let mut obj = Object::new();
            obj.insert("error".to_owned(), Value::from("no such watch"));
            vec![ok_response(obj)]
        });

        let client = Client::with_default_config();
        let result = client.command(Value::array([Value::from("watch")])).await;
        match result {
            Err(ClientError::Protocol { message, response }) => {
                assert_eq!(message, "no such watch");
                assert_eq!(response.get("error").and_then(Value::as_str), Some("no such watch"));
            },
            other => panic!("expected Protocol error, got {other:?}"),
        }

        unsafe { std::env::remove_var("WATCHMAN_SOCK") };
    }
}
