use crate::{ArchiveJobProgress, ArchiveMsg, ArchivePhase};

/// Pure update function: applies a message to the progress of an archive job.
///
/// `Success` and `Error` are terminal; only `Reset` leaves them.
pub fn update(mut progress: ArchiveJobProgress, msg: ArchiveMsg) -> ArchiveJobProgress {
    if progress.phase().is_terminal() && msg != ArchiveMsg::Reset {
        return progress;
    }

    match msg {
        ArchiveMsg::ItemStarted {
            completed,
            total,
            message,
        } => {
            if progress.phase() == ArchivePhase::Assembling {
                return progress;
            }
            progress.set(ArchivePhase::Downloading, completed, total, message);
        }
        ArchiveMsg::Assembling { total, message } => {
            progress.set(ArchivePhase::Assembling, total, total, message);
        }
        ArchiveMsg::Finished {
            downloaded,
            total,
            file_name,
        } => {
            let message = if downloaded < total {
                format!(
                    "Saved {file_name} with {downloaded} of {total} items; {} could not be fetched",
                    total - downloaded
                )
            } else {
                format!("Saved {file_name} with {downloaded} items")
            };
            progress.set(ArchivePhase::Success, total, total, message);
        }
        ArchiveMsg::Failed { message } => progress.fail(message),
        ArchiveMsg::Reset => progress = ArchiveJobProgress::new(),
    }

    progress
}
