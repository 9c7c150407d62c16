//! Instagrab core: domain types, URL validation and pure state transitions.
mod estimate;
mod history;
mod model;
mod msg;
mod progress;
mod source_url;
mod update;

pub use estimate::{cors_risk, should_offer_archive, ArchiveEstimate};
pub use history::{HistoryLog, HISTORY_CAPACITY};
pub use model::{DownloadResult, HistoryEntry, HistoryStatus, MediaDescriptor, MediaKind};
pub use msg::ArchiveMsg;
pub use progress::{ArchiveJobProgress, ArchivePhase};
pub use source_url::{extract_post_id, is_valid_source_url, parse_url_list};
pub use update::update;
