//! Error kinds for the event manager, mapping onto spec.md §7's taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventManagerError {
    /// `kNotConnected`-equivalent for subscriber lookups: no subscriber
    /// with this id exists (double-unsubscribe, stale handle).
    #[error("subscriber {0} not found")]
    UnknownSubscriber(uuid::Uuid),
}
