#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveMsg {
    /// An item is about to be fetched; `completed` items came before it.
    ItemStarted {
        completed: usize,
        total: usize,
        message: String,
    },
    /// All items were attempted and compression has begun.
    Assembling { total: usize, message: String },
    /// The archive was written.
    Finished {
        downloaded: usize,
        total: usize,
        file_name: String,
    },
    /// The job ended without an archive.
    Failed { message: String },
    /// The job's surface was closed; start over.
    Reset,
}
