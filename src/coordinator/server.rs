use super::orchestrator::Coordinator;
use crate::config::CoordinatorConfig;
use crate::error::{DistSortError, Result};
use crate::model::Endpoint;
use crate::protocol::{serve, PeerTransport, TcpTransport};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// A bound coordinator, ready to serve
pub struct CoordinatorServer {
    listener: TcpListener,
    coordinator: Coordinator,
    endpoint: Endpoint,
    io_timeout: Duration,
}

impl CoordinatorServer {
    pub async fn bind(config: CoordinatorConfig) -> Result<Self> {
        let transport = Arc::new(TcpTransport::new(
            config.network.connect_timeout,
            config.network.request_timeout,
        ));
        Self::bind_with(config, transport).await
    }

    pub async fn bind_with(
        config: CoordinatorConfig,
        transport: Arc<dyn PeerTransport>,
    ) -> Result<Self> {
        config.validate()?;

        let bind_endpoint: Endpoint = config.bind.parse()?;
        let bind_error = |source| DistSortError::Connect {
            endpoint: bind_endpoint.clone(),
            source,
        };
        let listener = TcpListener::bind(&config.bind).await.map_err(bind_error)?;
        let endpoint = Endpoint::from(listener.local_addr().map_err(bind_error)?);

        let io_timeout = config.network.request_timeout;
        Ok(Self {
            listener,
            coordinator: Coordinator::new(config, transport),
            endpoint,
            io_timeout,
        })
    }

    /// Address workers and clients should connect to
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub async fn run<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        serve(self.listener, &mut self.coordinator, self.io_timeout, shutdown)
            .await
            .map_err(|source| DistSortError::Io {
                endpoint: self.endpoint,
                source,
            })
    }
}
