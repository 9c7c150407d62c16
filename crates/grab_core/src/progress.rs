/// Phase of an archive job as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchivePhase {
    #[default]
    Idle,
    Downloading,
    Assembling,
    Success,
    Error,
}

impl ArchivePhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, ArchivePhase::Success | ArchivePhase::Error)
    }
}

/// Progress of one archive job. One live value per job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArchiveJobProgress {
    phase: ArchivePhase,
    completed: usize,
    total: usize,
    message: String,
}

impl ArchiveJobProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ArchivePhase {
        self.phase
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Rounded completion percentage; 0 while the total is unknown.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let ratio = self.completed.min(self.total) as f64 / self.total as f64;
        (ratio * 100.0).round() as u8
    }

    pub(crate) fn set(
        &mut self,
        phase: ArchivePhase,
        completed: usize,
        total: usize,
        message: String,
    ) {
        self.phase = phase;
        self.completed = completed;
        self.total = total;
        self.message = message;
    }

    pub(crate) fn fail(&mut self, message: String) {
        self.phase = ArchivePhase::Error;
        self.message = message;
    }
}
