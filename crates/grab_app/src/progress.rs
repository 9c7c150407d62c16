use std::sync::Mutex;

use grab_core::{update, ArchiveJobProgress, ArchiveMsg, ArchivePhase};
use grab_engine::ArchiveEvent;

/// Terminal view of one archive job, driven through `grab_core::update`.
pub struct TerminalProgress {
    state: Mutex<ArchiveJobProgress>,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ArchiveJobProgress::new()),
        }
    }

    /// Feeds one message through the state machine and prints the result.
    pub fn apply(&self, msg: ArchiveMsg) -> ArchiveJobProgress {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let next = update(state.clone(), msg);
        *state = next.clone();
        drop(state);

        eprintln!("{}", render_line(&next));
        next
    }

    pub fn on_event(&self, event: ArchiveEvent) {
        self.apply(map_event(event));
    }
}

pub fn map_event(event: ArchiveEvent) -> ArchiveMsg {
    match event {
        ArchiveEvent::ItemStarted {
            completed,
            total,
            message,
        } => ArchiveMsg::ItemStarted {
            completed,
            total,
            message,
        },
        ArchiveEvent::Assembling { total, message } => ArchiveMsg::Assembling { total, message },
    }
}

pub fn render_line(progress: &ArchiveJobProgress) -> String {
    match progress.phase() {
        ArchivePhase::Idle => String::new(),
        ArchivePhase::Downloading | ArchivePhase::Assembling => {
            format!("[{:>3}%] {}", progress.percent(), progress.message())
        }
        ArchivePhase::Success => format!("[done] {}", progress.message()),
        ArchivePhase::Error => format!("[fail] {}", progress.message()),
    }
}
