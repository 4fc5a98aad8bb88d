use super::{BoxedStream, Endpoint, PageListener, Transport};
use crate::error::{ErrorType, Result, RoamError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info};

/// `$XDG_RUNTIME_DIR/roam`, or the temp dir when unset
pub fn default_runtime_dir() -> PathBuf {
    std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join("roam")
}

/// Unix domain sockets under a runtime directory
#[derive(Debug, Clone)]
pub struct UnixTransport {
    runtime_dir: PathBuf,
}

impl UnixTransport {
    pub fn new(runtime_dir: impl Into<PathBuf>) -> Self {
        Self {
            runtime_dir: runtime_dir.into(),
        }
    }

    pub fn runtime_dir(&self) -> &Path {
        &self.runtime_dir
    }
}

impl Default for UnixTransport {
    fn default() -> Self {
        Self::new(default_runtime_dir())
    }
}

#[async_trait]
impl Transport for UnixTransport {
    async fn connect(&self, endpoint: &Endpoint) -> Result<BoxedStream> {
        let path = endpoint.socket_path(&self.runtime_dir);
        let stream = UnixStream::connect(&path).await.map_err(|e| {
            RoamError::new(
                ErrorType::Io,
                "SOCKET_CONNECT",
                format!("failed to connect to {}: {e}", path.display()),
            )
        })?;
        Ok(Box::new(stream))
    }

    async fn bind(&self, endpoint: &Endpoint) -> Result<Box<dyn PageListener>> {
        std::fs::create_dir_all(&self.runtime_dir)?;

        let path = endpoint.socket_path(&self.runtime_dir);
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed stale socket"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let listener = UnixListener::bind(&path).map_err(|e| {
            RoamError::new(
                ErrorType::Io,
                "SOCKET_BIND",
                format!("failed to bind {}: {e}", path.display()),
            )
        })?;
        info!(path = %path.display(), "page endpoint listening");

        Ok(Box::new(UnixPageListener { listener, path }))
    }
}

struct UnixPageListener {
    listener: UnixListener,
    path: PathBuf,
}

#[async_trait]
impl PageListener for UnixPageListener {
    async fn accept(&mut self) -> Result<BoxedStream> {
        let (stream, _addr) = self.listener.accept().await?;
        Ok(Box::new(stream))
    }
}

impl Drop for UnixPageListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
