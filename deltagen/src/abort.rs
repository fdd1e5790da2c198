use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// granularity of the cancellable sleep
const WAKE_STEP: Duration = Duration::from_millis(25);

/// Abort request shared between the thread that owns a run and the worker executing it.
/// Cloning hands out another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` but wake up early once abort was requested.
    /// Returns true when the sleep ended because of an abort.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_aborted() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(WAKE_STEP.min(deadline - now));
        }
    }
}
