use crate::domains::progress_sink::ProgressSink;
use deltagen::models::confirmation::DispatchResult;
use deltagen::models::status::Summary;
use tracing::{info, warn};

/// Console presentation of a run: everything goes through `tracing`.
#[derive(Debug, Default)]
pub struct LogSink {
    last_percent: Option<u8>,
    last_eta: String,
    pub unconfirmed: Vec<usize>,
}

impl ProgressSink for LogSink {
    fn progress(&mut self, percent: u8) {
        // a render reports every poll tick, only print changes
        if self.last_percent != Some(percent) {
            self.last_percent = Some(percent);
            info!("[{percent:>3}%]");
        }
    }

    fn status(&mut self, status: &str) {
        info!("{status}");
    }

    fn eta(&mut self, remaining: &str) {
        if self.last_eta != remaining {
            self.last_eta = remaining.to_owned();
            info!("ETA {remaining}");
        }
    }

    fn highlight(&mut self, result: &DispatchResult) {
        if result.checked && !result.is_confirmed() {
            warn!(
                "Variant #{} not confirmed (name {}, value {})",
                result.index, result.name_matched, result.value_matched
            );
            self.unconfirmed.push(result.index);
        }
    }

    fn finished(&mut self, summary: &Summary, message: &str) {
        if let Some(dir) = &summary.output_dir {
            for image in &summary.images {
                info!("  {}", image.strip_prefix(dir).unwrap_or(image).display());
            }
        }
        info!("{message}");
    }
}
