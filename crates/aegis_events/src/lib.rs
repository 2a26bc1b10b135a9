//! Typed event plane for Squad Aegis: the closed event/payload sum types
//! (spec.md §3, §9) and the bounded-queue pub/sub event manager
//! (spec.md §4.6) that every other subsystem publishes onto and
//! subscribes from.

mod error;
mod event;
mod manager;
mod types;

pub use error::EventManagerError;
pub use event::*;
pub use manager::{EventFilter, EventManager, Subscriber};
pub use types::{ChainId, PlayerId, ServerId};
