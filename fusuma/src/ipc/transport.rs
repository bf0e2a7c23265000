use std::future::Future;
use std::io;

use anyhow::Context;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

#[cfg(unix)]
pub const COMMAND_ENDPOINT: &str = "/tmp/fusuma.sock";
#[cfg(unix)]
pub const EVENT_ENDPOINT: &str = "/tmp/fusuma-events.sock";

#[cfg(windows)]
pub const COMMAND_ENDPOINT: &str = r"\\.\pipe\fusuma";
#[cfg(windows)]
pub const EVENT_ENDPOINT: &str = r"\\.\pipe\fusuma-events";

/// One accepted client connection.
pub trait Connection: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> Connection for T {}

#[cfg(unix)]
pub struct Listener {
    path: std::path::PathBuf,
    inner: tokio::net::UnixListener,
}

#[cfg(unix)]
impl Listener {
    pub fn bind(endpoint: &str) -> io::Result<Self> {
        let path = std::path::PathBuf::from(endpoint);
        // Remove existing socket file if it exists
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        let inner = tokio::net::UnixListener::bind(&path)?;
        Ok(Self { path, inner })
    }

    pub async fn accept(&mut self) -> io::Result<Box<dyn Connection>> {
        let (stream, _addr) = self.inner.accept().await?;
        Ok(Box::new(stream))
    }
}

#[cfg(unix)]
impl Drop for Listener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Named pipe listener. A fresh server instance is created before the
/// connected one is handed out, so clients never find the pipe missing.
#[cfg(windows)]
pub struct Listener {
    name: String,
    next: tokio::net::windows::named_pipe::NamedPipeServer,
}

#[cfg(windows)]
impl Listener {
    pub fn bind(endpoint: &str) -> io::Result<Self> {
        let next = tokio::net::windows::named_pipe::ServerOptions::new()
            .first_pipe_instance(true)
            .create(endpoint)?;
        Ok(Self {
            name: endpoint.to_string(),
            next,
        })
    }

    pub async fn accept(&mut self) -> io::Result<Box<dyn Connection>> {
        self.next.connect().await?;
        let fresh = tokio::net::windows::named_pipe::ServerOptions::new().create(&self.name)?;
        let connected = std::mem::replace(&mut self.next, fresh);
        Ok(Box::new(connected))
    }
}

#[cfg(unix)]
pub type ClientStream = std::os::unix::net::UnixStream;

#[cfg(windows)]
pub type ClientStream = std::fs::File;

/// Blocking client side of an endpoint.
pub fn connect(endpoint: &str) -> io::Result<ClientStream> {
    #[cfg(unix)]
    {
        std::os::unix::net::UnixStream::connect(endpoint)
    }
    #[cfg(windows)]
    {
        std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(endpoint)
    }
}

/// Accepts connections until the listener fails to bind, running `handle`
/// on its own task for each one.
pub async fn serve<F, Fut>(endpoint: &str, name: &str, handle: F) -> anyhow::Result<()>
where
    F: Fn(Box<dyn Connection>) -> Fut,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let mut listener =
        Listener::bind(endpoint).with_context(|| format!("Cannot listen on {}", endpoint))?;
    tracing::info!("{} listening on {}", name, endpoint);

    loop {
        match listener.accept().await {
            Ok(connection) => {
                let task = handle(connection);
                let name = name.to_string();
                tokio::spawn(async move {
                    if let Err(e) = task.await {
                        tracing::debug!("{} connection closed: {}", name, e);
                    }
                });
            }
            Err(e) => tracing::error!("{} accept error: {}", name, e),
        }
    }
}

/// Writes `value` as a single JSON line and flushes.
pub async fn write_line<W, T>(writer: &mut W, value: &T) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut json = serde_json::to_vec(value)?;
    json.push(b'\n');
    writer.write_all(&json).await?;
    writer.flush().await?;
    Ok(())
}
