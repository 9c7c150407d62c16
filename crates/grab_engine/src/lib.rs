//! Instagrab engine: resolver client, media fetch chain, archive assembly and
//! persistence.
mod archive;
mod config;
mod filename;
mod history;
mod media;
mod persist;
mod scrape;
mod types;

pub use archive::{ArchiveBuilder, ProgressSink};
pub use config::{
    system_clock, ApiConfig, ArchiveSettings, Clock, ConfigError, FetchSettings, ScrapeSettings,
    API_HOST_VAR, API_KEY_VAR, DEFAULT_RELAYS, RESOLVER_BASE_VAR,
};
pub use filename::{
    archive_entry_name, archive_file_name, archive_subject, individual_file_name,
    media_extension, sanitize_subject,
};
pub use history::{load_all, HistoryStore, HISTORY_FILENAME};
pub use media::{
    default_strategies, relay_url, AlternateOriginStrategy, DirectStrategy, FetchStrategy,
    MediaFetcher, MediaSource, ReachabilityProbe, RelayStrategy,
};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use scrape::{parse_media_list, BatchFailure, BatchOutcome, ScrapeClient};
pub use types::{
    ArchiveEntry, ArchiveError, ArchiveEvent, ArchiveSummary, ClientError, FetchOutcome, FetchedMedia,
    IndividualSummary, MediaPayload, NoMediaReason, ScrapeError, StrategyKind,
};
