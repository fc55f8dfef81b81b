//! Request/response wire protocol shared by every process
//!
//! Each TCP connection carries exactly one exchange:
//!
//! ```text
//! caller                                   responder
//!   │── Envelope frame ────────────────────▶│
//!   │── payload frame(s) for that tag ─────▶│  decode exhaustively
//!   │                                       │  execute
//!   │◀──────────────────── response frame ──│  (none for RegisterWorker)
//!   └────────────────── close ──────────────┘
//! ```
//!
//! | Envelope         | Request payload                  | Response               |
//! |------------------|----------------------------------|------------------------|
//! | `RegisterWorker` | `Endpoint`                       | none                   |
//! | `Sort`           | `Batch`, `Vec<Endpoint>`         | `Option<Batch>`        |
//! | `SortForPeer`    | `Batch`                          | `Option<Batch>`        |
//! | `Reduce`         | `Vec<Batch>`                     | `Vec<Record>`          |
//! | `FetchStats`     | none                             | `StatsSnapshot`        |
//!
//! Frames are a 4-byte big-endian length followed by a JSON document.

pub mod codec;
mod envelope;
pub mod server;
pub mod transport;

pub use envelope::{Envelope, Reply, Request};
pub use server::{serve, RequestHandler};
pub use transport::{PeerTransport, TcpTransport};
