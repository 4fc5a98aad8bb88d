//! Local byte-stream endpoints between the chrome and page workers
//!
//! One endpoint per page, named from the profile and the page id. A
//! connection carries a single request and its response.

mod memory;
mod unix;

pub use memory::MemoryTransport;
pub use unix::{default_runtime_dir, UnixTransport};

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWrite};

/// Anything usable as one side of a page connection
pub trait PageStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> PageStream for T {}

pub type BoxedStream = Box<dyn PageStream>;

/// Address of a page worker
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub profile: String,
    pub page_id: u64,
}

impl Endpoint {
    pub fn new(profile: impl Into<String>, page_id: u64) -> Self {
        Self {
            profile: profile.into(),
            page_id,
        }
    }

    /// `webprocess.<profile>.<page_id>.sock`
    pub fn file_name(&self) -> String {
        format!("webprocess.{}.{}.sock", self.profile, self.page_id)
    }

    pub fn socket_path(&self, runtime_dir: &Path) -> PathBuf {
        runtime_dir.join(self.file_name())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.profile, self.page_id)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<BoxedStream>;

    async fn bind(&self, endpoint: &Endpoint) -> Result<Box<dyn PageListener>>;
}

#[async_trait]
pub trait PageListener: Send {
    async fn accept(&mut self) -> Result<BoxedStream>;
}
