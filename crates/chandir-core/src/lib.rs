pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod manager;
pub mod parser;
pub mod platform;
pub mod query;
pub mod record;

pub use cache::CacheStore;
pub use config::Config;
pub use error::DirectoryError;
pub use fetch::Fetcher;
pub use manager::{DirectoryEvent, DirectoryManager, DirectoryState, LoadStatus, RefreshOutcome};
pub use parser::{parse_directory, serialize_lines};
pub use query::filtered;
pub use record::{Record, RecordId};
