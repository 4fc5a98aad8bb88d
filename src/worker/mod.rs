//! Page worker: serves page protocol requests against one page's document
//!
//! One server per page. Every accepted connection runs in its own task and
//! carries exactly one request; a failing request gets an empty reply and
//! never takes the server down.

pub mod dom;
mod handlers;
pub mod memory;

pub use dom::{Badge, ElementInfo, ElementKind, NodeRef, PageDom, Rect};
pub use handlers::{WorkerPage, OVERLAY_CLASS};
pub use memory::{MemoryDom, MemoryElement};

use crate::error::{ErrorType, Result, RoamError};
use crate::protocol::{MessageDecoder, PageCommand, PayloadMap, Request, Response, DEFAULT_MAX_MESSAGE_BYTES};
use crate::transport::{BoxedStream, Endpoint, PageListener, Transport};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const READ_CHUNK: usize = 64 * 1024;

/// What a worker can ask of the chrome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChromeRequest {
    /// Open `uri` in a new window
    OpenWindow { uri: String },
    /// The page took keyboard focus
    InsertMode,
    SetClipboard { text: String },
}

/// A chrome request tagged with the page that made it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromeEvent {
    pub page_id: u64,
    pub request: ChromeRequest,
}

pub type ChromeSender = mpsc::UnboundedSender<ChromeEvent>;
pub type ChromeReceiver = mpsc::UnboundedReceiver<ChromeEvent>;

/// Sending half of the worker -> chrome link for one page
#[derive(Debug, Clone)]
pub struct ChromeLink {
    page_id: u64,
    tx: ChromeSender,
}

impl ChromeLink {
    pub fn new(page_id: u64, tx: ChromeSender) -> Self {
        Self { page_id, tx }
    }

    pub fn send(&self, request: ChromeRequest) {
        debug!(page_id = self.page_id, ?request, "chrome request");
        if self
            .tx
            .send(ChromeEvent {
                page_id: self.page_id,
                request,
            })
            .is_err()
        {
            warn!(page_id = self.page_id, "chrome is gone, request dropped");
        }
    }
}

/// Worker-side verbosity control
pub trait LogControl: Send + Sync {
    fn set_level(&self, level: &str) -> Result<()>;
}

struct WorkerShared {
    page_id: u64,
    page: Mutex<WorkerPage>,
    chrome: ChromeLink,
    log: Arc<dyn LogControl>,
}

#[derive(Clone)]
pub struct PageWorkerServer {
    shared: Arc<WorkerShared>,
    max_message_bytes: usize,
}

impl PageWorkerServer {
    pub fn new(page_id: u64, dom: Box<dyn PageDom>, chrome: ChromeLink, log: Arc<dyn LogControl>) -> Self {
        Self {
            shared: Arc::new(WorkerShared {
                page_id,
                page: Mutex::new(WorkerPage::new(dom)),
                chrome,
                log,
            }),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }

    pub fn with_max_message_bytes(mut self, max_message_bytes: usize) -> Self {
        self.max_message_bytes = max_message_bytes;
        self
    }

    pub fn page_id(&self) -> u64 {
        self.shared.page_id
    }

    /// Run `f` against the page state
    pub fn with_page<R>(&self, f: impl FnOnce(&mut WorkerPage) -> R) -> Result<R> {
        let mut page = self.shared.page.lock().map_err(|_| {
            RoamError::new(ErrorType::Internal, "LOCK_POISONED", "page state lock poisoned")
        })?;
        Ok(f(&mut page))
    }

    /// Accept until the listener closes
    pub async fn serve(self, mut listener: Box<dyn PageListener>) {
        info!(page_id = self.page_id(), "page server started");
        loop {
            match listener.accept().await {
                Ok(stream) => {
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(err) = server.handle_connection(stream).await {
                            debug!(page_id = server.page_id(), "connection ended: {err}");
                        }
                    });
                }
                Err(err) if err.code == "LISTENER_CLOSED" => break,
                Err(err) => warn!(page_id = self.page_id(), "accept failed: {err}"),
            }
        }
        info!(page_id = self.page_id(), "page server stopped");
    }

    /// Read one request to end of input, answer it, close
    pub async fn handle_connection(&self, mut stream: BoxedStream) -> Result<()> {
        let mut decoder = MessageDecoder::new(self.max_message_bytes);
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            let read = stream.read(&mut chunk).await?;
            if read == 0 {
                break;
            }
            decoder.feed(&chunk[..read])?;
        }

        let request = match decoder.request() {
            Ok(Some(request)) => request,
            Ok(None) => {
                return Err(RoamError::protocol(
                    "PROTOCOL_EMPTY_REQUEST",
                    "client closed without a request",
                ))
            }
            Err(err) => {
                error!(page_id = self.page_id(), "undecodable request: {err}");
                return Err(err);
            }
        };

        let result = self.dispatch(&request);
        let bytes = Response::new(request.id, result).encode()?;
        stream.write_all(&bytes).await?;
        stream.shutdown().await?;
        Ok(())
    }

    /// Run one request. Faults are logged and answered with an empty map.
    pub fn dispatch(&self, request: &Request) -> PayloadMap {
        debug!(page_id = self.page_id(), id = request.id, command = %request.command, "dispatch");

        let outcome = PageCommand::parse(&request.command, &request.params).and_then(|command| {
            self.with_page(|page| page.execute(command, &self.shared.chrome, self.shared.log.as_ref()))?
        });

        match outcome {
            Ok(result) => result,
            Err(err) => {
                warn!(page_id = self.page_id(), id = request.id, command = %request.command, "request failed: {err}");
                PayloadMap::new()
            }
        }
    }
}

/// Starts a page server whenever the engine creates a page
pub struct WorkerHost {
    transport: Arc<dyn Transport>,
    profile: String,
    chrome: ChromeSender,
    log: Arc<dyn LogControl>,
    max_message_bytes: usize,
}

impl WorkerHost {
    pub fn new(
        transport: Arc<dyn Transport>,
        profile: impl Into<String>,
        chrome: ChromeSender,
        log: Arc<dyn LogControl>,
    ) -> Self {
        Self {
            transport,
            profile: profile.into(),
            chrome,
            log,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }

    pub fn with_max_message_bytes(mut self, max_message_bytes: usize) -> Self {
        self.max_message_bytes = max_message_bytes;
        self
    }

    /// Bind the page's endpoint and serve it in the background
    pub async fn on_page_created(
        &self,
        page_id: u64,
        dom: Box<dyn PageDom>,
    ) -> Result<(PageWorkerServer, JoinHandle<()>)> {
        let endpoint = Endpoint::new(self.profile.clone(), page_id);
        let listener = self.transport.bind(&endpoint).await?;

        let server = PageWorkerServer::new(
            page_id,
            dom,
            ChromeLink::new(page_id, self.chrome.clone()),
            Arc::clone(&self.log),
        )
        .with_max_message_bytes(self.max_message_bytes);

        info!(%endpoint, "starting page server");
        let handle = tokio::spawn(server.clone().serve(listener));
        Ok((server, handle))
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
