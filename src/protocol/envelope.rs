use super::codec::{read_frame, write_frame, CodecError};
use crate::model::{Batch, Endpoint, Record};
use crate::stats::StatsSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};

/// Operation tag sent as the first frame of every exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Envelope {
    Sort,
    RegisterWorker,
    Reduce,
    FetchStats,
    SortForPeer,
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Envelope::Sort => write!(f, "Sort"),
            Envelope::RegisterWorker => write!(f, "RegisterWorker"),
            Envelope::Reduce => write!(f, "Reduce"),
            Envelope::FetchStats => write!(f, "FetchStats"),
            Envelope::SortForPeer => write!(f, "SortForPeer"),
        }
    }
}

/// A decoded request: the envelope together with its payload
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Sort a batch; `registry` lets a worker migrate the work under load
    Sort {
        batch: Batch,
        registry: Vec<Endpoint>,
    },
    RegisterWorker {
        endpoint: Endpoint,
    },
    /// Merge individually sorted partitions into one sequence
    Reduce {
        partitions: Vec<Batch>,
    },
    FetchStats,
    /// Local sort on behalf of an overloaded peer, never migrated further
    SortForPeer {
        batch: Batch,
    },
}

impl Request {
    pub fn envelope(&self) -> Envelope {
        match self {
            Request::Sort { .. } => Envelope::Sort,
            Request::RegisterWorker { .. } => Envelope::RegisterWorker,
            Request::Reduce { .. } => Envelope::Reduce,
            Request::FetchStats => Envelope::FetchStats,
            Request::SortForPeer { .. } => Envelope::SortForPeer,
        }
    }

    /// Write the envelope followed by the payload frames for its tag
    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), CodecError>
    where
        W: AsyncWrite + Unpin,
    {
        write_frame(writer, &self.envelope()).await?;
        match self {
            Request::Sort { batch, registry } => {
                write_frame(writer, batch).await?;
                write_frame(writer, registry).await?;
            }
            Request::RegisterWorker { endpoint } => write_frame(writer, endpoint).await?,
            Request::Reduce { partitions } => write_frame(writer, partitions).await?,
            Request::FetchStats => {}
            Request::SortForPeer { batch } => write_frame(writer, batch).await?,
        }
        Ok(())
    }

    /// Read an envelope, then exactly the payload frames its tag defines
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, CodecError>
    where
        R: AsyncRead + Unpin,
    {
        let envelope: Envelope = read_frame(reader).await?;
        let request = match envelope {
            Envelope::Sort => Request::Sort {
                batch: read_frame(reader).await?,
                registry: read_frame(reader).await?,
            },
            Envelope::RegisterWorker => Request::RegisterWorker {
                endpoint: read_frame(reader).await?,
            },
            Envelope::Reduce => Request::Reduce {
                partitions: read_frame(reader).await?,
            },
            Envelope::FetchStats => Request::FetchStats,
            Envelope::SortForPeer => Request::SortForPeer {
                batch: read_frame(reader).await?,
            },
        };
        Ok(request)
    }
}

/// Response payload produced by a request handler
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// `RegisterWorker` closes the connection without a payload
    Nothing,
    /// `Sort` and `SortForPeer`; `None` is the "no result" sentinel
    Batch(Option<Batch>),
    /// `Reduce`
    Records(Vec<Record>),
    /// `FetchStats`
    Stats(StatsSnapshot),
}

impl Reply {
    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), CodecError>
    where
        W: AsyncWrite + Unpin,
    {
        match self {
            Reply::Nothing => Ok(()),
            Reply::Batch(batch) => write_frame(writer, batch).await,
            Reply::Records(records) => write_frame(writer, records).await,
            Reply::Stats(stats) => write_frame(writer, stats).await,
        }
    }
}
