//! Wires a [`LogSource`] to the [`ParserBank`] and republishes every
//! parsed event onto the shared [`EventManager`], tagged with the
//! server it came from.

use std::sync::Arc;

use aegis_events::{Event, EventManager, EventType, ServerId};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::LogSourceError;
use crate::parser::ParserBank;
use crate::source::LogSource;
use crate::store::EventStore;

/// Runs `source` to completion (cancellation or fatal error), feeding
/// every line through `bank` and publishing the results onto `events`.
pub async fn run(
    server_id: ServerId,
    source: Arc<dyn LogSource>,
    events: Arc<EventManager>,
    cancel: CancellationToken,
) -> Result<(), LogSourceError> {
    let bank = ParserBank::new();
    let store = EventStore::new();
    let mut lines = source.watch(cancel.clone()).await?;

    info!(server_id = %server_id, "log pipeline started");
    while let Some(line) = lines.recv().await {
        for parsed in bank.parse_line(&line, &store) {
            events.publish(Event::new(server_id, EventType::Log(parsed.kind), parsed.payload).with_raw(line.clone()));
        }
    }

    if cancel.is_cancelled() {
        info!(server_id = %server_id, "log pipeline stopped");
    } else {
        error!(server_id = %server_id, "log pipeline source closed unexpectedly");
    }
    Ok(())
}
