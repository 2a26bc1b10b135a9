//! Log ingestion for Squad Aegis: polymorphic tailing (local/SFTP/FTP),
//! the regex parser bank, the per-source `EventStore`, and the pipeline
//! that republishes parsed events onto the shared event plane
//! (spec.md §4.4-§4.5).

mod error;
pub mod parser;
mod pipeline;
pub mod source;
pub mod store;
mod types;

pub use error::LogSourceError;
pub use parser::{ParsedEvent, ParserBank};
pub use pipeline::run as run_pipeline;
pub use source::{ftp::FtpSource, local::LocalTailSource, sftp::SftpSource, InitialPosition, LogSource};
pub use store::EventStore;
pub use types::{DisconnectedRecord, JoinRequestRecord, PlayerRecord};
