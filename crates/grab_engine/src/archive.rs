use std::io::{Cursor, Write};
use std::sync::Arc;

use grab_core::{cors_risk, MediaDescriptor};
use grab_logging::{grab_error, grab_info, grab_warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::ArchiveSettings;
use crate::filename::{archive_file_name, individual_file_name, media_extension};
use crate::media::MediaSource;
use crate::persist::AtomicFileWriter;
use crate::{
    ArchiveEntry, ArchiveError, ArchiveEvent, ArchiveSummary, FetchOutcome, FetchedMedia,
    IndividualSummary, MediaPayload,
};

/// Deflate level for every archive.
const COMPRESSION_LEVEL: i64 = 6;

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ArchiveEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ArchiveEvent) + Send + Sync,
{
    fn emit(&self, event: ArchiveEvent) {
        self(event)
    }
}

/// Fetches media one item at a time and packs what arrives into a ZIP file.
pub struct ArchiveBuilder {
    source: Arc<dyn MediaSource>,
    settings: ArchiveSettings,
}

impl ArchiveBuilder {
    pub fn new(source: Arc<dyn MediaSource>, settings: ArchiveSettings) -> Self {
        Self { source, settings }
    }

    pub fn settings(&self) -> &ArchiveSettings {
        &self.settings
    }

    /// Runs one archive job over `items`.
    ///
    /// Items that cannot be fetched are skipped. The job fails only when no
    /// item could be fetched or the archive could not be written.
    pub async fn build_archive(
        &self,
        items: &[MediaDescriptor],
        archive_name: &str,
        sink: &dyn ProgressSink,
    ) -> Result<ArchiveSummary, ArchiveError> {
        let total = items.len();
        if total == 0 {
            grab_error!("Archive {} requested without items", archive_name);
            return Err(ArchiveError::Empty { total });
        }

        let videos = items.iter().filter(|item| item.is_video).count();
        grab_info!(
            "ZIP download starting: {} images, {} videos",
            total - videos,
            videos
        );
        if cors_risk(items) {
            grab_warn!("Multiple images detected - media hosts may refuse some downloads");
        }

        let mut fetched: Vec<FetchedMedia> = Vec::new();
        for (position, item) in items.iter().enumerate() {
            let index = position + 1;
            let kind = item.kind();
            sink.emit(ArchiveEvent::ItemStarted {
                completed: position,
                total,
                message: format!("Downloading {} {index}/{total}...", kind.label()),
            });

            if let Some(payload) = self.fetch_item(item, index).await {
                let media = FetchedMedia {
                    source_index: index,
                    kind,
                    extension: media_extension(
                        payload.content_type.as_deref(),
                        &item.media_url,
                        kind,
                    ),
                    bytes: payload.bytes,
                };
                grab_info!(
                    "Downloaded {}, size: {} bytes",
                    media.archive_name(),
                    media.bytes.len()
                );
                fetched.push(media);
            }

            if index < total {
                self.pause(self.settings.inter_item_delay).await;
            }
        }

        if fetched.is_empty() {
            grab_error!("Failed to download any of {} media files", total);
            return Err(ArchiveError::Empty { total });
        }

        sink.emit(ArchiveEvent::Assembling {
            total,
            message: "Creating ZIP file...".to_string(),
        });

        let downloaded = fetched.len();
        let payload_bytes: u64 = fetched.iter().map(|media| media.bytes.len() as u64).sum();
        let assembled = if payload_bytes > self.settings.max_archive_bytes {
            Err(format!(
                "{payload_bytes} bytes of media exceed the {} byte archive limit",
                self.settings.max_archive_bytes
            ))
        } else {
            assemble_zip(&fetched).and_then(|archive| {
                let date = (self.settings.clock)().format("%Y-%m-%d").to_string();
                let file_name = archive_file_name(archive_name, &date, downloaded);
                AtomicFileWriter::new(self.settings.output_dir.clone())
                    .write_new(&file_name, &archive)
                    .map(|path| (path, archive.len()))
                    .map_err(|err| err.to_string())
            })
        };

        let (archive_path, archive_len) = match assembled {
            Ok(saved) => saved,
            Err(message) => {
                grab_error!("ZIP creation failed: {}", message);
                return Err(ArchiveError::AssemblyFailed {
                    fetched: downloaded,
                    total,
                    message,
                    recovered: fetched,
                });
            }
        };
        let file_name = archive_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        grab_info!(
            "Saved {} ({} of {} items, {} bytes)",
            file_name,
            downloaded,
            total,
            archive_len
        );
        Ok(ArchiveSummary {
            downloaded_count: downloaded,
            total_count: total,
            skipped_count: total - downloaded,
            archive_file_name: file_name,
            archive_path,
            entries: fetched
                .iter()
                .map(|media| ArchiveEntry {
                    name: media.archive_name(),
                    source_index: media.source_index,
                    bytes: media.bytes.len() as u64,
                })
                .collect(),
        })
    }

    /// Saves items that are already in memory, typically the `recovered`
    /// part of `ArchiveError::AssemblyFailed`. Nothing is fetched again.
    pub fn save_fetched(&self, fetched: &[FetchedMedia]) -> IndividualSummary {
        let writer = AtomicFileWriter::new(self.settings.output_dir.clone());
        let mut summary = IndividualSummary::default();
        for media in fetched {
            let name = media.individual_name();
            match writer.write_new(&name, &media.bytes) {
                Ok(path) => summary.saved.push(path),
                Err(err) => {
                    grab_error!("Failed to save {}: {}", name, err);
                    summary.skipped.push(media.source_index);
                }
            }
        }
        summary
    }

    /// Saves every item as its own file, spaced out in time. Used when an
    /// archive cannot be written or is not worth creating.
    pub async fn save_individually(
        &self,
        items: &[MediaDescriptor],
        sink: &dyn ProgressSink,
    ) -> IndividualSummary {
        let total = items.len();
        let writer = AtomicFileWriter::new(self.settings.output_dir.clone());
        let mut summary = IndividualSummary::default();

        for (position, item) in items.iter().enumerate() {
            let index = position + 1;
            let kind = item.kind();
            sink.emit(ArchiveEvent::ItemStarted {
                completed: position,
                total,
                message: format!("Saving {} {index}/{total}...", kind.label()),
            });

            match self.fetch_item(item, index).await {
                Some(payload) => {
                    let extension =
                        media_extension(payload.content_type.as_deref(), &item.media_url, kind);
                    let name = individual_file_name(kind, index, &extension);
                    match writer.write_new(&name, &payload.bytes) {
                        Ok(path) => summary.saved.push(path),
                        Err(err) => {
                            grab_error!("Failed to save {}: {}", name, err);
                            summary.skipped.push(index);
                        }
                    }
                }
                None => summary.skipped.push(index),
            }

            if index < total {
                self.pause(self.settings.individual_delay).await;
            }
        }

        summary
    }

    async fn fetch_item(&self, item: &MediaDescriptor, index: usize) -> Option<MediaPayload> {
        match self.source.fetch_media(&item.media_url).await {
            FetchOutcome::Success(payload) if payload.len() > self.settings.min_payload_bytes => {
                Some(payload)
            }
            FetchOutcome::Success(payload) => {
                grab_warn!(
                    "Skipping item {} - payload of {} bytes is too small",
                    index,
                    payload.len()
                );
                None
            }
            FetchOutcome::OpaqueUnreadable => {
                grab_warn!(
                    "Skipping item {} - reachable but unreadable: {}",
                    index,
                    item.media_url
                );
                None
            }
            FetchOutcome::Failure => {
                grab_warn!("Skipping item {} due to download failure", index);
                None
            }
        }
    }

    async fn pause(&self, delay: std::time::Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn assemble_zip(entries: &[FetchedMedia]) -> Result<Vec<u8>, String> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL));

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for media in entries {
        let name = media.archive_name();
        zip.start_file(name.as_str(), options)
            .map_err(|e| format!("zip start file failed ({name}): {e}"))?;
        zip.write_all(&media.bytes)
            .map_err(|e| format!("zip write failed ({name}): {e}"))?;
    }
    let cursor = zip
        .finish()
        .map_err(|e| format!("zip finish failed: {e}"))?;
    Ok(cursor.into_inner())
}
