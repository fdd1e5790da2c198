use super::confirmation::DispatchResult;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Events a worker streams back to whoever started it.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Running { status: String },
    Log { status: String },
    Warning { message: String },
    /// DeltaGen never answered; the run ended before anything was sent.
    NoConnection { address: String },
    Dispatched(DispatchResult),
    /// Render time estimate of the whole plan, sent once before the first image.
    Estimated { total: Duration, images: usize },
    Progress { percent: u8, remaining: Duration },
    ImageCompleted { counter: usize, result: PathBuf },
    ImageFailed { counter: usize, path: PathBuf, reason: String },
    Finished(Summary),
    Aborted(Summary),
}

impl Status {
    /// Finished and Aborted are always the last event of a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Finished(_) | Status::Aborted(_))
    }
}

/// What a run achieved, sent once when it ends.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub run_id: Uuid,
    /// Variants sent, or images rendered for render runs.
    pub sent: usize,
    pub total: usize,
    pub failed: usize,
    pub elapsed: Duration,
    pub output_dir: Option<PathBuf>,
    pub images: Vec<PathBuf>,
    pub connected: bool,
}

impl Summary {
    pub fn new(run_id: Uuid, total: usize) -> Self {
        Self {
            run_id,
            sent: 0,
            total,
            failed: 0,
            elapsed: Duration::ZERO,
            output_dir: None,
            images: Vec::new(),
            connected: false,
        }
    }
}
