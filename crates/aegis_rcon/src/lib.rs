//! RCON transport for Squad Aegis: the wire codec, a single authenticated
//! connection, and the auto-reconnecting manager that multiplexes many
//! servers onto the shared event plane (spec.md §4.1-§4.3).

mod codec;
mod connection;
mod error;
mod events;
mod manager;

pub use codec::{Packet, RconCodec};
pub use connection::RconConnection;
pub use error::RconError;
pub use manager::{RconManager, ServerTarget};
