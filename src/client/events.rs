//! SPDX-License-Identifier: MIT

//! Typed unilateral-event registry: one `tokio::sync::broadcast` channel
//! per event name, so responses (which flow strictly through the FIFO
//! command queue, see [`crate::client::Client`]) never share state with
//! unilateral delivery.

use std::sync::Arc;

use tokio::sync::broadcast;

use super::error::ClientError;
use crate::value::Value;

const CHANNEL_CAPACITY: usize = 256;

/// Owns one broadcast sender per event kind: `connect`, `end`,
/// `error(err)`, `subscription(obj)`, `log(obj)`.
#[derive(Debug, Clone)]
pub(crate) struct Events {
    connect: broadcast::Sender<()>,
    end: broadcast::Sender<()>,
    error: broadcast::Sender<Arc<ClientError>>,
    subscription: broadcast::Sender<Value>,
    log: broadcast::Sender<Value>,
}

impl Events {
    pub(crate) fn new() -> Self {
        Events {
            connect: broadcast::channel(CHANNEL_CAPACITY).0,
            end: broadcast::channel(CHANNEL_CAPACITY).0,
            error: broadcast::channel(CHANNEL_CAPACITY).0,
            subscription: broadcast::channel(CHANNEL_CAPACITY).0,
            log: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    pub(crate) fn emit_connect(&self) {
        let _ = self.connect.send(());
    }

    pub(crate) fn emit_end(&self) {
        let _ = self.end.send(());
    }

    pub(crate) fn emit_error(&self, err: ClientError) {
        let _ = self.error.send(Arc::new(err));
    }

    pub(crate) fn emit_subscription(&self, value: Value) {
        let _ = self.subscription.send(value);
    }

    pub(crate) fn emit_log(&self, value: Value) {
        let _ = self.log.send(value);
    }

    pub(crate) fn subscribe_connect(&self) -> broadcast::Receiver<()> {
        self.connect.subscribe()
    }

    pub(crate) fn subscribe_end(&self) -> broadcast::Receiver<()> {
        self.end.subscribe()
    }

    pub(crate) fn subscribe_error(&self) -> broadcast::Receiver<Arc<ClientError>> {
        self.error.subscribe()
    }

    pub(crate) fn subscribe_subscription(&self) -> broadcast::Receiver<Value> {
        self.subscription.subscribe()
    }

    pub(crate) fn subscribe_log(&self) -> broadcast::Receiver<Value> {
        self.log.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_without_subscribers_does_not_panic() {
        let events = Events::new();
        events.emit_connect();
        events.emit_end();
        events.emit_error(ClientError::Ended);
        events.emit_subscription(Value::object());
        events.emit_log(Value::object());
    }

    #[tokio::test]
    async fn subscriber_receives_emitted_value() {
        let events = Events::new();
        let mut rx = events.subscribe_subscription();
        events.emit_subscription(Value::from("hello"));
        let got = rx.recv().await.expect("recv");
        assert_eq!(got.as_str(), Some("hello"));
    }
}
