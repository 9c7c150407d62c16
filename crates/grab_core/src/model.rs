use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a descriptor points at a still image or a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Lowercase label used in file names and progress messages.
    pub fn label(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    /// Extension used when neither content type nor URL gives one.
    pub fn default_extension(self) -> &'static str {
        match self {
            MediaKind::Image => "jpg",
            MediaKind::Video => "mp4",
        }
    }
}

/// One downloadable image or video as reported by the resolver.
///
/// Field names on the wire match the resolver's JSON so history files and
/// API payloads share one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    #[serde(rename = "media")]
    pub media_url: String,
    #[serde(rename = "isVideo", default)]
    pub is_video: bool,
    #[serde(rename = "thumbnail", default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(rename = "duration", default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

impl MediaDescriptor {
    pub fn new(media_url: impl Into<String>, is_video: bool) -> Self {
        Self {
            media_url: media_url.into(),
            is_video,
            thumbnail_url: None,
            width: None,
            height: None,
            duration_seconds: None,
        }
    }

    pub fn kind(&self) -> MediaKind {
        if self.is_video {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }
}

/// Outcome of resolving one source URL, or the aggregate of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadResult {
    pub source_url: String,
    pub items: Vec<MediaDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_sources: Option<Vec<DownloadResult>>,
}

impl DownloadResult {
    pub fn single(source_url: impl Into<String>, items: Vec<MediaDescriptor>) -> Self {
        Self {
            source_url: source_url.into(),
            items,
            batch_sources: None,
        }
    }

    /// Wraps per-URL results into one aggregate; items are flattened in input order.
    pub fn batch(sources: Vec<DownloadResult>) -> Self {
        let items = sources
            .iter()
            .flat_map(|source| source.items.iter().cloned())
            .collect();
        Self {
            source_url: format!("Batch download ({} URLs)", sources.len()),
            items,
            batch_sources: Some(sources),
        }
    }

    pub fn is_batch(&self) -> bool {
        self.batch_sources.is_some()
    }

    pub fn video_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_video).count()
    }

    pub fn image_count(&self) -> usize {
        self.items.len() - self.video_count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Completed,
}

/// A completed resolution as kept in the download history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    #[serde(rename = "url")]
    pub source_url: String,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    pub items: Vec<MediaDescriptor>,
    pub status: HistoryStatus,
}

impl HistoryEntry {
    /// Builds a completed entry; the id is the creation time in milliseconds.
    pub fn completed(result: &DownloadResult, created_at: DateTime<Utc>) -> Self {
        Self {
            id: created_at.timestamp_millis(),
            source_url: result.source_url.clone(),
            created_at,
            items: result.items.clone(),
            status: HistoryStatus::Completed,
        }
    }
}
