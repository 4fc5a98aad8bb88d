//! Client side of the page protocol
//!
//! Every request opens its own connection, writes `[id, command, params]`,
//! half-closes and reads the reply until the worker closes. Replies come
//! back through a completion queue and are handed to their callbacks on the
//! owner's thread, each callback at most once.

use crate::error::{Result, RoamError};
use crate::protocol::{MessageDecoder, PageCommand, PayloadMap, Request, DEFAULT_MAX_MESSAGE_BYTES};
use crate::transport::{Endpoint, Transport};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

const READ_CHUNK: usize = 64 * 1024;

/// Called with the reply, or with the fault that replaced it
pub type ReplyCallback<C> = Box<dyn FnOnce(&mut C, Result<PayloadMap>)>;

/// Process-wide request id source. Starts at 1 and never resets.
#[derive(Debug)]
pub struct RequestIds {
    next: AtomicU64,
}

impl RequestIds {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for RequestIds {
    fn default() -> Self {
        Self::new()
    }
}

/// Limits applied to every request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLimits {
    pub timeout: Duration,
    pub max_message_bytes: usize,
}

impl Default for ChannelLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

/// A finished request waiting to be delivered
pub struct Reply<C> {
    pub id: u64,
    pub result: Result<PayloadMap>,
    callback: Option<ReplyCallback<C>>,
}

impl<C> Reply<C> {
    /// Run the callback. Faults without a callback are only logged.
    pub fn deliver(self, ctx: &mut C) {
        match self.callback {
            Some(callback) => callback(ctx, self.result),
            None => {
                if let Err(err) = self.result {
                    warn!(id = self.id, "page request failed: {err}");
                }
            }
        }
    }
}

impl<C> fmt::Debug for Reply<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("id", &self.id)
            .field("result", &self.result)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

pub struct PageChannel<C> {
    endpoint: Endpoint,
    transport: Arc<dyn Transport>,
    ids: Arc<RequestIds>,
    limits: ChannelLimits,
    pending: HashMap<u64, Option<ReplyCallback<C>>>,
    completed_tx: mpsc::UnboundedSender<(u64, Result<PayloadMap>)>,
    completed_rx: mpsc::UnboundedReceiver<(u64, Result<PayloadMap>)>,
}

impl<C> PageChannel<C> {
    pub fn new(endpoint: Endpoint, transport: Arc<dyn Transport>, ids: Arc<RequestIds>) -> Self {
        let (completed_tx, completed_rx) = mpsc::unbounded_channel();
        Self {
            endpoint,
            transport,
            ids,
            limits: ChannelLimits::default(),
            pending: HashMap::new(),
            completed_tx,
            completed_rx,
        }
    }

    pub fn with_limits(mut self, limits: ChannelLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Requests sent but not yet delivered
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn send(&mut self, command: &PageCommand, callback: Option<ReplyCallback<C>>) -> u64 {
        self.send_raw(command.name(), command.params(), callback)
    }

    /// Start a request. Must be called inside a tokio runtime.
    pub fn send_raw(
        &mut self,
        command: &str,
        params: PayloadMap,
        callback: Option<ReplyCallback<C>>,
    ) -> u64 {
        let id = self.ids.next_id();
        let request = Request::new(id, command, params);
        debug!(id, command, endpoint = %self.endpoint, "page request");

        self.pending.insert(id, callback);

        let transport = Arc::clone(&self.transport);
        let endpoint = self.endpoint.clone();
        let limits = self.limits;
        let completed = self.completed_tx.clone();
        tokio::spawn(async move {
            let result = round_trip(transport.as_ref(), &endpoint, &request, limits).await;
            // The channel may be gone; the reply is then simply dropped
            let _ = completed.send((request.id, result));
        });

        id
    }

    /// Replies that already arrived, without waiting
    pub fn take_ready(&mut self) -> Vec<Reply<C>> {
        let mut ready = Vec::new();
        while let Ok((id, result)) = self.completed_rx.try_recv() {
            if let Some(reply) = self.claim(id, result) {
                ready.push(reply);
            }
        }
        ready
    }

    /// Wait for the next reply. `None` once nothing is outstanding.
    pub async fn next_reply(&mut self) -> Option<Reply<C>> {
        while !self.pending.is_empty() {
            let (id, result) = self.completed_rx.recv().await?;
            if let Some(reply) = self.claim(id, result) {
                return Some(reply);
            }
        }
        None
    }

    fn claim(&mut self, id: u64, result: Result<PayloadMap>) -> Option<Reply<C>> {
        match self.pending.remove(&id) {
            Some(callback) => {
                trace!(id, ok = result.is_ok(), "page request complete");
                Some(Reply {
                    id,
                    result,
                    callback,
                })
            }
            None => {
                warn!(id, "reply for unknown request dropped");
                None
            }
        }
    }
}

impl<C> fmt::Debug for PageChannel<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageChannel")
            .field("endpoint", &self.endpoint)
            .field("limits", &self.limits)
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// One connection: write, half-close, read to end, decode, match id
async fn round_trip(
    transport: &dyn Transport,
    endpoint: &Endpoint,
    request: &Request,
    limits: ChannelLimits,
) -> Result<PayloadMap> {
    let bytes = request.encode()?;
    if bytes.len() > limits.max_message_bytes {
        return Err(RoamError::protocol(
            "PROTOCOL_MESSAGE_TOO_LARGE",
            format!("request of {} bytes exceeds {}", bytes.len(), limits.max_message_bytes),
        ));
    }

    let exchange = async {
        let mut stream = transport.connect(endpoint).await?;
        stream.write_all(&bytes).await?;
        stream.shutdown().await?;

        let mut decoder = MessageDecoder::new(limits.max_message_bytes);
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            let read = stream.read(&mut chunk).await?;
            if read == 0 {
                break;
            }
            decoder.feed(&chunk[..read])?;
        }

        let response = decoder.response()?.ok_or_else(|| {
            RoamError::protocol("PROTOCOL_EMPTY_RESPONSE", "worker closed without replying")
        })?;
        if response.id != request.id {
            return Err(RoamError::protocol(
                "PROTOCOL_ID_MISMATCH",
                format!("expected reply {}, got {}", request.id, response.id),
            ));
        }
        Ok::<_, RoamError>(response.result)
    };

    tokio::time::timeout(limits.timeout, exchange)
        .await
        .map_err(|_| {
            RoamError::protocol(
                "PROTOCOL_TIMEOUT",
                format!("'{}' timed out after {:?}", request.command, limits.timeout),
            )
        })?
}
