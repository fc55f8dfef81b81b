use super::engine::WorkerNode;
use super::load::{LoadSampler, SystemLoad};
use crate::config::WorkerConfig;
use crate::error::{DistSortError, Result};
use crate::model::Endpoint;
use crate::protocol::{serve, PeerTransport, TcpTransport};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// A bound worker, ready to register and serve
pub struct WorkerServer {
    listener: TcpListener,
    node: WorkerNode,
    coordinator: Endpoint,
    transport: Arc<dyn PeerTransport>,
    io_timeout: Duration,
}

impl WorkerServer {
    /// Bind with the TCP transport and the host's load average
    pub async fn bind(config: &WorkerConfig) -> Result<Self> {
        let transport = Arc::new(TcpTransport::new(
            config.network.connect_timeout,
            config.network.request_timeout,
        ));
        Self::bind_with(config, transport, Box::new(SystemLoad)).await
    }

    pub async fn bind_with(
        config: &WorkerConfig,
        transport: Arc<dyn PeerTransport>,
        load: Box<dyn LoadSampler>,
    ) -> Result<Self> {
        config.validate()?;
        let coordinator = config.coordinator_endpoint()?;

        let bind_endpoint: Endpoint = config.bind.parse()?;
        let bind_error = |source| DistSortError::Connect {
            endpoint: bind_endpoint.clone(),
            source,
        };
        let listener = TcpListener::bind(&config.bind).await.map_err(bind_error)?;
        let local = listener.local_addr().map_err(bind_error)?;

        let host = match &config.advertise_host {
            Some(host) => host.clone(),
            None if local.ip().is_unspecified() => {
                warn!(
                    "Bound to {} without advertise_host, advertising 127.0.0.1",
                    local
                );
                "127.0.0.1".to_string()
            }
            None => local.ip().to_string(),
        };
        let endpoint = Endpoint::new(host, local.port());

        let node = WorkerNode::new(endpoint, config, transport.clone(), load);
        Ok(Self {
            listener,
            node,
            coordinator,
            transport,
            io_timeout: config.network.request_timeout,
        })
    }

    /// Endpoint announced to the coordinator
    pub fn endpoint(&self) -> &Endpoint {
        self.node.endpoint()
    }

    /// Register with the coordinator once, then serve until `shutdown`
    pub async fn run<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let endpoint = self.node.endpoint().clone();
        self.transport.register(&self.coordinator, &endpoint).await?;
        info!("Registered {} with coordinator {}", endpoint, self.coordinator);

        serve(self.listener, &mut self.node, self.io_timeout, shutdown)
            .await
            .map_err(|source| DistSortError::Io { endpoint, source })
    }
}
