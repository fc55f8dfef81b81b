//! Outbound calls to other processes
//!
//! Every call is a synchronous request/response exchange on a fresh
//! connection, bounded by a connect deadline and a request deadline. Expired
//! deadlines surface as [`DistSortError::Timeout`] and are classified with
//! the other connectivity failures.

use super::codec::{read_frame, CodecError};
use super::{Envelope, Request};
use crate::error::{DistSortError, Result};
use crate::model::{Batch, Endpoint, Record};
use crate::stats::StatsSnapshot;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, trace};

/// Calls a process can make on its peers.
///
/// The TCP implementation is used in production; tests substitute
/// in-memory transports to script peer behaviour.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Announce `worker` to the coordinator at `target`
    async fn register(&self, target: &Endpoint, worker: &Endpoint) -> Result<()>;

    /// Ask `target` to sort `batch`, allowing it to migrate within `registry`
    async fn sort(
        &self,
        target: &Endpoint,
        batch: &Batch,
        registry: &[Endpoint],
    ) -> Result<Option<Batch>>;

    /// Ask `target` to sort `batch` locally on behalf of an overloaded peer
    async fn sort_for_peer(&self, target: &Endpoint, batch: &Batch) -> Result<Option<Batch>>;

    /// Ask `target` to merge individually sorted partitions
    async fn reduce(&self, target: &Endpoint, partitions: &[Batch]) -> Result<Vec<Record>>;

    async fn fetch_stats(&self, target: &Endpoint) -> Result<StatsSnapshot>;

    /// Connect-only liveness check
    async fn probe(&self, target: &Endpoint) -> bool;
}

/// [`PeerTransport`] over one TCP connection per call
#[derive(Debug, Clone)]
pub struct TcpTransport {
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl TcpTransport {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            request_timeout,
        }
    }

    async fn connect(&self, target: &Endpoint, envelope: Envelope) -> Result<TcpStream> {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(target.address()))
            .await
        {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(DistSortError::Connect {
                endpoint: target.clone(),
                source,
            }),
            Err(_) => Err(DistSortError::Timeout {
                endpoint: target.clone(),
                operation: format!("connect for {envelope}"),
                timeout: self.connect_timeout,
            }),
        }
    }

    /// Send a request and, if `expect_reply`, read one response frame
    async fn exchange<T>(
        &self,
        target: &Endpoint,
        request: Request,
        expect_reply: bool,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        let envelope = request.envelope();
        let mut stream = self.connect(target, envelope).await?;
        debug!("Requesting {} at {}", envelope, target);

        let io = async {
            request.write_to(&mut stream).await?;
            stream.flush().await?;
            trace!("Sent {} payload to {}", envelope, target);
            let reply = if expect_reply {
                Some(read_frame::<_, T>(&mut stream).await?)
            } else {
                stream.shutdown().await?;
                None
            };
            Ok::<Option<T>, CodecError>(reply)
        };

        match tokio::time::timeout(self.request_timeout, io).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => Err(e.with_endpoint(target)),
            Err(_) => Err(DistSortError::Timeout {
                endpoint: target.clone(),
                operation: envelope.to_string(),
                timeout: self.request_timeout,
            }),
        }
    }

    async fn call<T>(&self, target: &Endpoint, request: Request) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        let envelope = request.envelope();
        self.exchange(target, request, true)
            .await?
            .ok_or_else(|| DistSortError::protocol(format!("{target} sent no {envelope} reply")))
    }
}

#[async_trait]
impl PeerTransport for TcpTransport {
    async fn register(&self, target: &Endpoint, worker: &Endpoint) -> Result<()> {
        let request = Request::RegisterWorker {
            endpoint: worker.clone(),
        };
        self.exchange::<()>(target, request, false).await?;
        Ok(())
    }

    async fn sort(
        &self,
        target: &Endpoint,
        batch: &Batch,
        registry: &[Endpoint],
    ) -> Result<Option<Batch>> {
        let request = Request::Sort {
            batch: batch.clone(),
            registry: registry.to_vec(),
        };
        self.call(target, request).await
    }

    async fn sort_for_peer(&self, target: &Endpoint, batch: &Batch) -> Result<Option<Batch>> {
        let request = Request::SortForPeer {
            batch: batch.clone(),
        };
        self.call(target, request).await
    }

    async fn reduce(&self, target: &Endpoint, partitions: &[Batch]) -> Result<Vec<Record>> {
        let request = Request::Reduce {
            partitions: partitions.to_vec(),
        };
        self.call(target, request).await
    }

    async fn fetch_stats(&self, target: &Endpoint) -> Result<StatsSnapshot> {
        self.call(target, Request::FetchStats).await
    }

    async fn probe(&self, target: &Endpoint) -> bool {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(target.address())).await
        {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!("Probe of {} failed: {}", target, e);
                false
            }
            Err(_) => {
                debug!("Probe of {} timed out", target);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn transport() -> TcpTransport {
        TcpTransport::new(Duration::from_millis(500), Duration::from_millis(300))
    }

    /// Bind and immediately release a port so nothing is listening on it
    async fn unused_endpoint() -> Endpoint {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = Endpoint::from(listener.local_addr().unwrap());
        drop(listener);
        endpoint
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_connectivity_failure() {
        let target = unused_endpoint().await;
        let err = transport().fetch_stats(&target).await.unwrap_err();
        assert!(err.is_connectivity(), "unexpected error: {err}");
        assert!(!transport().probe(&target).await);
    }

    #[tokio::test]
    async fn test_silent_peer_hits_request_deadline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target = Endpoint::from(listener.local_addr().unwrap());
        let hold = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let err = transport()
            .sort_for_peer(&target, &Batch::new("p"))
            .await
            .unwrap_err();
        assert!(matches!(err, DistSortError::Timeout { .. }), "unexpected error: {err}");
        assert!(err.is_connectivity());
        hold.abort();
    }

    #[tokio::test]
    async fn test_probe_succeeds_against_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target = Endpoint::from(listener.local_addr().unwrap());
        assert!(transport().probe(&target).await);
    }
}
