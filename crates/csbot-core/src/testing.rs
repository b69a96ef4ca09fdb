//! A transport that records outbound actions, for tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{TransportError, TransportResult};
use crate::transport::Transport;

/// An outbound action issued through a [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Msg { target: String, message: String },
    Join(String),
    Leave(String),
    Identify(String),
}

impl Outbound {
    pub fn msg(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Msg {
            target: target.into(),
            message: message.into(),
        }
    }
}

/// Records every outbound action instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Outbound>>,
    refuse_identify: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every action recorded so far, oldest first.
    pub fn sent(&self) -> Vec<Outbound> {
        self.sent.lock().clone()
    }

    /// Only the messages recorded so far, as `(target, message)`.
    pub fn messages(&self) -> Vec<(String, String)> {
        self.sent
            .lock()
            .iter()
            .filter_map(|action| match action {
                Outbound::Msg { target, message } => Some((target.clone(), message.clone())),
                _ => None,
            })
            .collect()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.sent.lock().clear();
    }

    /// Makes identify requests fail with [`TransportError::NotConnected`]
    /// instead of being recorded.
    pub fn refuse_identify(&self, refuse: bool) {
        self.refuse_identify.store(refuse, Ordering::SeqCst);
    }

    fn record(&self, action: Outbound) -> TransportResult<()> {
        self.sent.lock().push(action);
        Ok(())
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn msg(&self, target: &str, message: &str) -> TransportResult<()> {
        self.record(Outbound::msg(target, message))
    }

    async fn join(&self, channel: &str) -> TransportResult<()> {
        self.record(Outbound::Join(channel.to_string()))
    }

    async fn leave(&self, channel: &str) -> TransportResult<()> {
        self.record(Outbound::Leave(channel.to_string()))
    }

    async fn identify(&self, nick: &str) -> TransportResult<()> {
        if self.refuse_identify.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        self.record(Outbound::Identify(nick.to_string()))
    }
}
