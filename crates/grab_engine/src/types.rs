use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use grab_core::MediaKind;

use crate::config::ConfigError;
use crate::filename::{archive_entry_name, individual_file_name};

/// Why a successful resolver response still yielded nothing to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoMediaReason {
    /// The resolver answered but listed no usable media: the post is private,
    /// restricted, expired or deleted.
    Unavailable,
    /// The body could not be understood.
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScrapeError {
    #[error(transparent)]
    ConfigurationMissing(#[from] ConfigError),
    #[error("the resolver rejected the API key (HTTP 401)")]
    AuthFailure,
    #[error("access to this content was refused (HTTP 403)")]
    Forbidden,
    #[error("the content was not found (HTTP 404)")]
    NotFound,
    #[error("too many requests (HTTP 429)")]
    RateLimited,
    #[error("the resolver failed (HTTP {0})")]
    ServerError(u16),
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("no downloadable media: {detail}")]
    NoDownloadableMedia {
        reason: NoMediaReason,
        detail: String,
    },
}

impl ScrapeError {
    pub(crate) fn from_status(status: u16) -> Self {
        match status {
            401 => ScrapeError::AuthFailure,
            403 => ScrapeError::Forbidden,
            404 => ScrapeError::NotFound,
            429 => ScrapeError::RateLimited,
            500..=599 => ScrapeError::ServerError(status),
            other => ScrapeError::HttpStatus(other),
        }
    }

    pub(crate) fn no_media(reason: NoMediaReason, detail: impl Into<String>) -> Self {
        ScrapeError::NoDownloadableMedia {
            reason,
            detail: detail.into(),
        }
    }

    /// Configuration problems stop every request; nothing else does.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScrapeError::ConfigurationMissing(_))
    }

    /// What the user can try next.
    pub fn remediation(&self) -> String {
        match self {
            ScrapeError::ConfigurationMissing(err) => err.remediation(),
            ScrapeError::AuthFailure => {
                "Check that the API key is correct and that your subscription is active.".into()
            }
            ScrapeError::Forbidden => {
                "The resolver plan may not cover this endpoint; check your subscription.".into()
            }
            ScrapeError::NotFound => {
                "Check the URL; the post may have been deleted or made private.".into()
            }
            ScrapeError::RateLimited => {
                "Wait a minute before trying again, or process fewer URLs at a time.".into()
            }
            ScrapeError::ServerError(_) => {
                "The resolver is having trouble; try again in a few minutes.".into()
            }
            ScrapeError::HttpStatus(_) => "Try again later.".into(),
            ScrapeError::Network(_) => {
                "Check your internet connection and try again.".into()
            }
            ScrapeError::NoDownloadableMedia {
                reason: NoMediaReason::Unavailable,
                ..
            } => "Make sure the post is public and still available.".into(),
            ScrapeError::NoDownloadableMedia {
                reason: NoMediaReason::Malformed,
                ..
            } => "The resolver returned an unexpected response; try again later.".into(),
        }
    }
}

/// Which fetch strategy produced a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Direct,
    Relay,
    AlternateOrigin,
    ReachabilityProbe,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Direct => write!(f, "direct"),
            StrategyKind::Relay => write!(f, "relay"),
            StrategyKind::AlternateOrigin => write!(f, "alternate origin"),
            StrategyKind::ReachabilityProbe => write!(f, "reachability probe"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub via: StrategyKind,
}

impl MediaPayload {
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Result of trying to obtain one media file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(MediaPayload),
    /// The resource answered but its bytes cannot be read; good for display
    /// links only.
    OpaqueUnreadable,
    Failure,
}

impl FetchOutcome {
    pub fn into_payload(self) -> Option<MediaPayload> {
        match self {
            FetchOutcome::Success(payload) => Some(payload),
            FetchOutcome::OpaqueUnreadable | FetchOutcome::Failure => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

/// Progress notifications of an archive or individual-download job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveEvent {
    ItemStarted {
        completed: usize,
        total: usize,
        message: String,
    },
    Assembling {
        total: usize,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArchiveError {
    #[error("Failed to download any media files ({total} attempted)")]
    Empty { total: usize },
    #[error("Failed to create ZIP file after fetching {fetched} of {total} items: {message}")]
    AssemblyFailed {
        fetched: usize,
        total: usize,
        message: String,
        /// Everything fetched so far, ready to be saved without refetching.
        recovered: Vec<FetchedMedia>,
    },
}

impl ArchiveError {
    /// Payloads fetched before the failure; empty for `Empty`.
    pub fn into_recovered(self) -> Vec<FetchedMedia> {
        match self {
            ArchiveError::AssemblyFailed { recovered, .. } => recovered,
            ArchiveError::Empty { .. } => Vec::new(),
        }
    }

    pub fn remediation(&self) -> String {
        match self {
            ArchiveError::Empty { .. } => {
                "The media hosts refused every request. Open the media links directly or try again later.".into()
            }
            ArchiveError::AssemblyFailed { fetched, .. } => format!(
                "{fetched} items were fetched; download them individually instead."
            ),
        }
    }
}

/// One fetched item held in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct FetchedMedia {
    /// 1-based input position.
    pub source_index: usize,
    pub kind: MediaKind,
    pub extension: String,
    pub bytes: Bytes,
}

impl FetchedMedia {
    pub fn archive_name(&self) -> String {
        archive_entry_name(self.kind, self.source_index, &self.extension)
    }

    pub fn individual_name(&self) -> String {
        individual_file_name(self.kind, self.source_index, &self.extension)
    }
}

impl fmt::Debug for FetchedMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchedMedia")
            .field("source_index", &self.source_index)
            .field("kind", &self.kind)
            .field("extension", &self.extension)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub source_index: usize,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub downloaded_count: usize,
    pub total_count: usize,
    pub skipped_count: usize,
    pub archive_file_name: String,
    pub archive_path: PathBuf,
    pub entries: Vec<ArchiveEntry>,
}

impl ArchiveSummary {
    pub fn is_partial(&self) -> bool {
        self.downloaded_count < self.total_count
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndividualSummary {
    pub saved: Vec<PathBuf>,
    /// 1-based positions of items that could not be saved.
    pub skipped: Vec<usize>,
}
