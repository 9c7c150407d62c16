use std::fs;
use std::path::{Path, PathBuf};

use grab_core::{DownloadResult, HistoryEntry, HistoryLog};
use grab_logging::{grab_error, grab_info, grab_warn};

use crate::config::{system_clock, Clock};
use crate::persist::AtomicFileWriter;

/// Fixed storage key of the history inside the data directory.
pub const HISTORY_FILENAME: &str = "history.json";

/// Reads the stored history. Anything unreadable counts as empty.
pub fn load_all(data_dir: &Path) -> Vec<HistoryEntry> {
    let path = data_dir.join(HISTORY_FILENAME);
    let content = match fs::read(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Vec::new();
        }
        Err(err) => {
            grab_warn!("Failed to read download history from {:?}: {}", path, err);
            return Vec::new();
        }
    };

    match serde_json::from_slice::<Vec<HistoryEntry>>(&content) {
        Ok(entries) => {
            grab_info!("Loaded {} history entries from {:?}", entries.len(), path);
            entries
        }
        Err(err) => {
            grab_warn!("Error loading download history from {:?}: {}", path, err);
            Vec::new()
        }
    }
}

/// Download history persisted as one JSON array, rewritten on every change.
pub struct HistoryStore {
    dir: PathBuf,
    log: HistoryLog,
    clock: Clock,
}

impl HistoryStore {
    pub fn open(data_dir: &Path) -> Self {
        Self::open_with_clock(data_dir, system_clock())
    }

    pub fn open_with_clock(data_dir: &Path, clock: Clock) -> Self {
        Self {
            dir: data_dir.to_path_buf(),
            log: HistoryLog::from_entries(load_all(data_dir)),
            clock,
        }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        self.log.entries()
    }

    pub fn get(&self, id: i64) -> Option<&HistoryEntry> {
        self.log.get(id)
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILENAME)
    }

    /// Records a completed resolution as the newest entry and persists.
    pub fn append(&mut self, result: &DownloadResult) -> HistoryEntry {
        let entry = self
            .log
            .push_front(HistoryEntry::completed(result, (self.clock)()))
            .clone();
        self.save();
        entry
    }

    pub fn clear(&mut self) {
        self.log.clear();
        self.save();
    }

    fn save(&self) {
        let writer = AtomicFileWriter::new(self.dir.clone());
        if let Err(err) = writer.write_json(HISTORY_FILENAME, self.log.entries()) {
            grab_error!(
                "Failed to write download history to {:?}: {}",
                self.dir,
                err
            );
        }
    }
}
