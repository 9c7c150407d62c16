use crate::HistoryEntry;

/// Maximum number of entries kept in the history.
pub const HISTORY_CAPACITY: usize = 50;

/// Bounded, newest-first list of completed downloads.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a log from stored entries, keeping at most the first
    /// `HISTORY_CAPACITY` (the stored order is already newest first).
    pub fn from_entries(mut entries: Vec<HistoryEntry>) -> Self {
        entries.truncate(HISTORY_CAPACITY);
        Self { entries }
    }

    /// Prepends `entry`, evicting the oldest entries beyond capacity.
    ///
    /// Ids stay strictly decreasing from front to back: an entry whose id is
    /// not newer than the current front is bumped past it. A front id already
    /// at `i64::MAX` (only possible from a hand-edited file) saturates.
    pub fn push_front(&mut self, mut entry: HistoryEntry) -> &HistoryEntry {
        if let Some(front) = self.entries.first() {
            if entry.id <= front.id {
                entry.id = front.id.saturating_add(1);
            }
        }
        self.entries.insert(0, entry);
        self.entries.truncate(HISTORY_CAPACITY);
        &self.entries[0]
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&HistoryEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }
}
