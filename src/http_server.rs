// src/http_server.rs
use crate::error::{ImgfsError, Result};
use crate::http_message::{parse_message, HttpMessage, Parse, MAX_HEADER_SIZE};
use log::{debug, info, warn};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket};

pub const BACKLOG: u32 = 16;

/// Application callback invoked once per complete request.
///
/// Runs on the blocking pool, so it may take locks and touch the disk.
pub trait RequestHandler: Send + Sync + 'static {
    /// Write the full reply for `msg` into `out`.
    fn handle(&self, msg: &HttpMessage, out: &mut Vec<u8>) -> Result<()>;
}

pub struct HttpServer {
    listener: TcpListener,
    handler: Arc<dyn RequestHandler>,
}

impl HttpServer {
    /// Bind a listening socket with `SO_REUSEADDR`. Must be called from
    /// inside a tokio runtime.
    pub fn bind(addr: SocketAddr, handler: Arc<dyn RequestHandler>) -> Result<Self> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(BACKLOG)?;
        Ok(Self { listener, handler })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` resolves. Each connection runs in
    /// its own detached task; those still running at shutdown are not awaited.
    pub async fn serve_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, closing listener");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    debug!("Accepted connection from {}", peer);
                    let handler = Arc::clone(&self.handler);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, handler).await {
                            warn!("Connection {}: {}", peer, e);
                        }
                    });
                }
            }
        }
    }
}

/// Serve exactly one request on `stream`, then close it.
///
/// The receive buffer starts at `MAX_HEADER_SIZE` and grows once by the
/// declared body length. A peer that closes early is not an error.
pub async fn handle_connection<S>(mut stream: S, handler: Arc<dyn RequestHandler>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    buf.try_reserve_exact(MAX_HEADER_SIZE)?;
    buf.resize(MAX_HEADER_SIZE, 0);
    let mut received = 0;
    let mut extended = false;

    let msg = loop {
        if received == buf.len() {
            return Err(ImgfsError::Protocol(format!(
                "request exceeds the {} byte receive buffer",
                buf.len()
            )));
        }
        let n = stream.read(&mut buf[received..]).await?;
        if n == 0 {
            debug!("Peer closed after {} byte(s) without a complete request", received);
            return Ok(());
        }
        received += n;

        match parse_message(&buf[..received])? {
            Parse::Complete(msg) => break msg,
            Parse::Incomplete { content_length: Some(len) } if !extended => {
                buf.try_reserve_exact(len)?;
                buf.resize(buf.len() + len, 0);
                extended = true;
            }
            Parse::Incomplete { .. } => {}
        }
    };
    drop(buf);

    debug!("{} {}", msg.method, msg.uri);
    let reply = tokio::task::spawn_blocking(move || {
        let mut out = Vec::new();
        handler.handle(&msg, &mut out).map(|_| out)
    })
    .await
    .map_err(|e| ImgfsError::Threading(e.to_string()))??;

    stream.write_all(&reply).await?;
    stream.shutdown().await?;
    Ok(())
}
