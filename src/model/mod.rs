//! Values that travel between the client, the coordinator and the workers
//!
//! A [`Batch`] is the unit of exchange at every boundary. It owns its
//! [`Record`]s outright; sending one over the wire hands it to the peer.

mod batch;
mod endpoint;
pub mod io;
mod record;

pub use batch::Batch;
pub use endpoint::Endpoint;
pub use record::{Key, Record};
