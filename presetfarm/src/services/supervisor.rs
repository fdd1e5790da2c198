use crate::domains::progress_sink::ProgressSink;
use crate::domains::tree_source::{ReferenceResolver, TreeSource};
use crate::models::error::AppError;
use crate::models::tree::TreeItem;
use crate::services::plan_builder::PlanBuild;
use crate::services::variant_list::build_variant_list;
use deltagen::models::status::{Status, Summary};
use deltagen::models::variant::Variant;
use deltagen::timing::format_duration;
use deltagen::{Channel, DeltaGen, DeltaGenConfig, TcpChannel, Worker};
use std::path::PathBuf;
use std::sync::mpsc::TryRecvError;
use std::time::Duration;
use tracing::{error, info, warn};

/// Opens the connection a run talks through.
pub type Connector = Box<dyn Fn(&DeltaGenConfig) -> Box<dyn Channel> + Send + Sync>;

/// Human readable end of a run: sent vs total, elapsed time and the output folder.
pub fn summary_message(summary: &Summary, aborted: bool) -> String {
    if !summary.connected {
        return "No connection to DeltaGen".to_owned();
    }

    let elapsed = format_duration(summary.elapsed);
    let mut message = match &summary.output_dir {
        Some(dir) => format!(
            "Rendered {}/{} images in {elapsed} to {}",
            summary.sent,
            summary.total,
            dir.display()
        ),
        None => format!(
            "Sent {}/{} variants in {elapsed}",
            summary.sent, summary.total
        ),
    };
    if summary.failed > 0 {
        message.push_str(&format!(", {} failed", summary.failed));
    }
    if aborted {
        message.insert_str(0, "Aborted: ");
    }
    message
}

/// Owns at most one send or render run at a time and turns its events into
/// [`ProgressSink`] calls. Never talks to DeltaGen itself.
pub struct SendToDeltaGen {
    deltagen: DeltaGen,
    connector: Connector,
    worker: Option<Worker>,
    // the running worker renders, so its progress carries an ETA
    rendering: bool,
}

impl SendToDeltaGen {
    pub fn new(config: DeltaGenConfig) -> Self {
        Self::with_connector(
            config,
            Box::new(|config| Box::new(TcpChannel::from_config(config))),
        )
    }

    pub fn with_connector(config: DeltaGenConfig, connector: Connector) -> Self {
        Self {
            deltagen: DeltaGen::new(config),
            connector,
            worker: None,
            rendering: false,
        }
    }

    /// A run was started and its terminal event has not been pumped yet.
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    fn ensure_idle(&self) -> Result<(), AppError> {
        if self.is_running() {
            warn!("Thread already running");
            return Err(AppError::AlreadyRunning);
        }
        Ok(())
    }

    fn channel(&self) -> Box<dyn Channel> {
        (self.connector)(self.deltagen.config())
    }

    pub fn send_variants(
        &mut self,
        variants: Vec<Variant>,
        check_confirmation: bool,
    ) -> Result<(), AppError> {
        self.ensure_idle()?;
        if variants.is_empty() {
            return Err(AppError::NothingToSend);
        }

        info!("Sending {} variants", variants.len());
        let channel = self.channel();
        self.worker = Some(
            self.deltagen
                .send_variants_with(channel, variants, check_confirmation),
        );
        Ok(())
    }

    /// Resolve `selected` against the tree and send the result. Resolution warnings go to `sink`.
    pub fn send_tree_items<T>(
        &mut self,
        tree: &T,
        selected: &[&TreeItem],
        with_reset: bool,
        check_confirmation: bool,
        sink: &mut dyn ProgressSink,
    ) -> Result<(), AppError>
    where
        T: TreeSource + ReferenceResolver + ?Sized,
    {
        self.ensure_idle()?;
        let list = build_variant_list(tree, selected, with_reset);
        for warning in &list.warnings {
            sink.status(warning);
        }
        self.send_variants(list.variants, check_confirmation)
    }

    /// Start rendering a plan built from the tree, refusing it while it has errors.
    pub fn render(&mut self, build: PlanBuild, output_dir: PathBuf) -> Result<(), AppError> {
        self.ensure_idle()?;
        if !build.is_valid() {
            let message = build.error_message();
            error!("{message}");
            return Err(AppError::InvalidPlan(message));
        }

        info!(
            "Rendering {} images into {output_dir:?}",
            build.plan.total_images()
        );
        let channel = self.channel();
        self.worker = Some(self.deltagen.render_with(channel, build.plan, output_dir));
        self.rendering = true;
        Ok(())
    }

    pub fn abort(&self) {
        if let Some(worker) = &self.worker {
            info!("Abort requested");
            worker.abort();
        }
    }

    /// Abort and wait up to `timeout` for the worker to wind down. Returns whether it did.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        match &self.worker {
            Some(worker) => {
                worker.abort();
                worker.wait(timeout)
            }
            None => true,
        }
    }

    /// Forward everything the worker reported so far. Returns the summary once the run ended.
    pub fn pump(&mut self, sink: &mut dyn ProgressSink) -> Option<Summary> {
        loop {
            let status = match self.worker.as_ref()?.receiver.try_recv() {
                Ok(status) => status,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    // gone without a terminal event
                    self.finish();
                    sink.status("DeltaGen worker stopped unexpectedly");
                    return None;
                }
            };

            if let Some(summary) = self.forward(status, sink) {
                self.finish();
                return Some(summary);
            }
        }
    }

    /// Pump until the run ends or `timeout` passes without any event.
    pub fn wait(&mut self, sink: &mut dyn ProgressSink, timeout: Duration) -> Option<Summary> {
        loop {
            let status = self.worker.as_ref()?.next_status(timeout)?;
            if let Some(summary) = self.forward(status, sink) {
                self.finish();
                return Some(summary);
            }
        }
    }

    fn finish(&mut self) {
        self.rendering = false;
        if let Some(worker) = self.worker.take() {
            worker.join();
        }
    }

    fn forward(&self, status: Status, sink: &mut dyn ProgressSink) -> Option<Summary> {
        match status {
            Status::Running { status } | Status::Log { status } => sink.status(&status),
            Status::Warning { message } => sink.status(&format!("Warning: {message}")),
            Status::NoConnection { address } => {
                sink.status(&format!("No connection to DeltaGen at {address}"))
            }
            Status::Dispatched(result) => sink.highlight(&result),
            Status::Estimated { total, images } => {
                let total = format_duration(total);
                sink.status(&format!("Estimated render time {total} for {images} images"));
                sink.eta(&total);
            }
            Status::Progress { percent, remaining } => {
                sink.progress(percent);
                if self.rendering {
                    sink.eta(&format_duration(remaining));
                }
            }
            Status::ImageCompleted { counter, result } => {
                sink.status(&format!("Image {counter:03} saved to {}", result.display()))
            }
            Status::ImageFailed {
                counter,
                path,
                reason,
            } => sink.status(&format!(
                "Image {counter:03} {} failed: {reason}",
                path.display()
            )),
            Status::Finished(summary) => {
                sink.progress(100);
                sink.finished(&summary, &summary_message(&summary, false));
                return Some(summary);
            }
            Status::Aborted(summary) => {
                sink.finished(&summary, &summary_message(&summary, true));
                return Some(summary);
            }
        }
        None
    }
}

impl Drop for SendToDeltaGen {
    fn drop(&mut self) {
        if !self.stop(Duration::from_secs(5)) {
            warn!("DeltaGen worker still running on shutdown");
        }
    }
}
