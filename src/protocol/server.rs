//! Serial accept loop shared by the coordinator and the workers
//!
//! One connection is handled to completion before the next is accepted, so
//! handlers own their state outright and need no locking.

use super::codec::CodecError;
use super::{Reply, Request};
use crate::error::Result;
use async_trait::async_trait;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// Executes decoded requests for one process role
#[async_trait]
pub trait RequestHandler: Send {
    /// Role name used in logs
    fn role(&self) -> &'static str;

    /// Execute a request.
    ///
    /// An `Err` abandons the connection without a response; use it only for
    /// protocol violations such as an operation this role does not serve.
    async fn handle(&mut self, request: Request) -> Result<Reply>;
}

/// Accept and serve connections until `shutdown` resolves
pub async fn serve<H, F>(
    listener: TcpListener,
    handler: &mut H,
    io_timeout: Duration,
    shutdown: F,
) -> std::io::Result<()>
where
    H: RequestHandler,
    F: Future<Output = ()> + Send,
{
    info!(
        "{} listening on {}",
        handler.role(),
        listener.local_addr()?
    );
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("{} shutting down", handler.role());
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!("Accepted connection from {}", peer);
                    handle_connection(stream, peer, handler, io_timeout).await;
                }
                Err(e) => error!("Failed to accept connection: {}", e),
            }
        }
    }
}

async fn handle_connection<H>(
    mut stream: TcpStream,
    peer: SocketAddr,
    handler: &mut H,
    io_timeout: Duration,
) where
    H: RequestHandler,
{
    let request = match tokio::time::timeout(io_timeout, Request::read_from(&mut stream)).await {
        Ok(Ok(request)) => request,
        Ok(Err(e)) if e.is_eof() => {
            debug!("{} closed the connection without a request", peer);
            return;
        }
        Ok(Err(e)) => {
            error!("Protocol violation from {}: {}", peer, e);
            return;
        }
        Err(_) => {
            warn!("Timed out reading request from {}", peer);
            return;
        }
    };

    let envelope = request.envelope();
    info!("Received {} request from {}", envelope, peer);

    let reply = match handler.handle(request).await {
        Ok(reply) => reply,
        Err(e) => {
            error!("Dropping {} request from {}: {}", envelope, peer, e);
            return;
        }
    };

    let write = async {
        reply.write_to(&mut stream).await?;
        stream.flush().await?;
        Ok::<(), CodecError>(())
    };
    match tokio::time::timeout(io_timeout, write).await {
        Ok(Ok(())) => debug!("Answered {} request from {}", envelope, peer),
        Ok(Err(e)) => warn!("Failed to answer {} request from {}: {}", envelope, peer, e),
        Err(_) => warn!("Timed out answering {} request from {}", envelope, peer),
    }
}
