use super::{BoxedStream, Endpoint, PageListener, Transport};
use crate::error::{ErrorType, Result, RoamError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;

const PIPE_CAPACITY: usize = 64 * 1024;

/// In-process endpoints backed by `tokio::io::duplex` pipes
#[derive(Debug, Default)]
pub struct MemoryTransport {
    listeners: Mutex<HashMap<Endpoint, mpsc::UnboundedSender<DuplexStream>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, endpoint: &Endpoint) -> Result<BoxedStream> {
        let (client, server) = tokio::io::duplex(PIPE_CAPACITY);
        let delivered = self
            .listeners
            .lock()
            .map_err(|_| RoamError::new(ErrorType::Internal, "LOCK_POISONED", "transport lock poisoned"))?
            .get(endpoint)
            .is_some_and(|tx| tx.send(server).is_ok());

        if !delivered {
            return Err(RoamError::new(
                ErrorType::Io,
                "SOCKET_CONNECT",
                format!("no listener for {endpoint}"),
            ));
        }
        Ok(Box::new(client))
    }

    async fn bind(&self, endpoint: &Endpoint) -> Result<Box<dyn PageListener>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners
            .lock()
            .map_err(|_| RoamError::new(ErrorType::Internal, "LOCK_POISONED", "transport lock poisoned"))?
            .insert(endpoint.clone(), tx);
        Ok(Box::new(MemoryListener { rx }))
    }
}

struct MemoryListener {
    rx: mpsc::UnboundedReceiver<DuplexStream>,
}

#[async_trait]
impl PageListener for MemoryListener {
    async fn accept(&mut self) -> Result<BoxedStream> {
        match self.rx.recv().await {
            Some(stream) => Ok(Box::new(stream)),
            None => Err(RoamError::new(ErrorType::Io, "LISTENER_CLOSED", "endpoint closed")),
        }
    }
}
