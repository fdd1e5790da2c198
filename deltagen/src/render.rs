use crate::abort::AbortFlag;
use crate::channel::{connect_with_retry, Channel};
use crate::command::{restore_viewer, Command};
use crate::config::DeltaGenConfig;
use crate::dispatcher::{subscribe_variant_state, Dispatcher};
use crate::models::format::Format;
use crate::models::render_plan::RenderPlan;
use crate::models::render_preset::RenderPreset;
use crate::models::status::{Status, Summary};
use crate::naming::{image_file_name, sanitize};
use crate::render_log::RenderLog;
use crate::timing::{format_duration, image_estimate, Eta};
use crate::verify::{convert, wait_for_image, Verification};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

const FALLBACK_DIR: &str = "render_output";

/// `render_output/` next to the executable, or in the working directory when the
/// executable location is unknown.
pub fn fallback_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(FALLBACK_DIR)
}

// worker local bookkeeping of one render run
struct JobState {
    run_id: Uuid,
    started: Instant,
    eta: Eta,
    counter: usize,
    images: Vec<PathBuf>,
    failed: usize,
    log: RenderLog,
    // DeltaGen stopped answering between two render presets
    disconnected: bool,
}

impl JobState {
    fn done(&self) -> usize {
        self.images.len() + self.failed
    }
}

/// Runs one render plan against DeltaGen. Lives on the worker thread and reports
/// through `sender`; the caller only ever sees [`Status`] events and the final [`Summary`].
pub struct RenderEngine<C: Channel> {
    channel: C,
    config: DeltaGenConfig,
    abort: AbortFlag,
    sender: Sender<Status>,
    output_dir: PathBuf,
}

impl<C: Channel> RenderEngine<C> {
    pub fn new(
        channel: C,
        config: DeltaGenConfig,
        abort: AbortFlag,
        sender: Sender<Status>,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            channel,
            config,
            abort,
            sender,
            output_dir,
        }
    }

    // the receiver may be gone already, in which case nobody is listening anyway
    fn emit(&self, status: Status) {
        let _ = self.sender.send(status);
    }

    fn progress(&self, job: &JobState) {
        let elapsed = job.started.elapsed();
        self.emit(Status::Progress {
            percent: job.eta.progress(elapsed, job.done()),
            remaining: job.eta.remaining(elapsed),
        });
    }

    pub fn run(mut self, plan: &RenderPlan) -> Summary {
        let run_id = Uuid::new_v4();
        let mut job = JobState {
            run_id,
            started: Instant::now(),
            eta: Eta::new(plan, &self.config),
            counter: 0,
            images: Vec::new(),
            failed: 0,
            log: RenderLog::new(run_id),
            disconnected: false,
        };
        let total = plan.total_images();

        info!(
            "Render run {} started: {} render presets, {total} images, estimated {}",
            job.run_id,
            plan.len(),
            format_duration(job.eta.total())
        );
        self.emit(Status::Estimated {
            total: job.eta.total(),
            images: total,
        });
        self.emit(Status::Running {
            status: format!("Connecting to DeltaGen at {}", self.config.address()),
        });

        if !connect_with_retry(&mut self.channel, &self.config, &self.abort) {
            self.channel.close();
            let mut summary = Summary::new(job.run_id, total);
            summary.elapsed = job.started.elapsed();
            if !self.abort.is_aborted() {
                error!("No connection to DeltaGen at {}", self.config.address());
                self.emit(Status::NoConnection {
                    address: self.config.address(),
                });
            }
            self.emit(Status::Aborted(summary.clone()));
            return summary;
        }

        self.prepare_viewer();
        let aborted = self.render_plan(plan, &mut job);
        if !aborted {
            self.convert_images(&mut job);
        }
        job.log.write();
        self.teardown();

        let summary = Summary {
            run_id: job.run_id,
            sent: job.images.len(),
            total,
            failed: job.failed,
            elapsed: job.started.elapsed(),
            output_dir: Some(self.output_dir.clone()),
            images: job.images,
            connected: !job.disconnected,
        };

        if aborted || self.abort.is_aborted() {
            warn!("Render run {} aborted", summary.run_id);
            self.emit(Status::Aborted(summary.clone()));
        } else {
            info!(
                "Render run {} finished: {}/{} images in {}",
                summary.run_id,
                summary.sent,
                summary.total,
                format_duration(summary.elapsed)
            );
            self.emit(Status::Finished(summary.clone()));
        }
        summary
    }

    fn prepare_viewer(&mut self) {
        if self.config.check_confirmation {
            subscribe_variant_state(&mut self.channel, &self.config);
        }
        if self.config.freeze_viewer {
            self.channel.send(&Command::FreezeViewer.to_string());
        }
        if let Some(rgba) = self.config.viewer_background {
            self.channel.send(&Command::BackgroundViewer(rgba).to_string());
        }
    }

    /// Probe DeltaGen before a render preset, reconnecting through the retry policy once it
    /// stopped answering. Emits `NoConnection` and returns false when that fails too.
    fn keep_alive(&mut self) -> bool {
        if self.channel.is_alive(self.config.probe_timeout()) {
            return true;
        }

        warn!("DeltaGen stopped answering, reconnecting");
        if connect_with_retry(&mut self.channel, &self.config, &self.abort) {
            self.prepare_viewer();
            return true;
        }
        if !self.abort.is_aborted() {
            error!("Lost the connection to DeltaGen at {}", self.config.address());
            self.emit(Status::NoConnection {
                address: self.config.address(),
            });
        }
        false
    }

    fn teardown(&mut self) {
        self.channel.send(&restore_viewer(self.config.viewer_size));
        self.channel.close();
    }

    /// Create the output directory of `preset`, falling back to [`fallback_dir`].
    fn preset_dir(&self, preset: &RenderPreset) -> PathBuf {
        let dir = if self.config.separate_directories {
            self.output_dir.join(sanitize(&preset.name))
        } else {
            self.output_dir.clone()
        };

        match fs::create_dir_all(&dir) {
            Ok(()) => dir,
            Err(e) => {
                let fallback = fallback_dir();
                let message = format!("Unable to create {dir:?} ({e}), rendering to {fallback:?}");
                warn!("{message}");
                self.emit(Status::Warning { message });
                if let Err(e) = fs::create_dir_all(&fallback) {
                    error!("Unable to create fallback directory {fallback:?}: {e}");
                }
                fallback
            }
        }
    }

    /// The nested preset/entry/viewset loop. Returns true when it stopped because of an abort.
    fn render_plan(&mut self, plan: &RenderPlan, job: &mut JobState) -> bool {
        let poll_interval = self.config.poll_interval();
        let check = self.config.check_confirmation;

        for (position, (_, preset)) in plan.iter().enumerate() {
            if self.abort.is_aborted() {
                return true;
            }
            // the connection was just checked for the first one
            if position > 0 && !self.keep_alive() {
                job.disconnected = true;
                return true;
            }

            let dir = self.preset_dir(preset);
            let deadline = image_deadline(preset, &self.config);
            let line = format!(
                "Render preset {}: {} images at {}, {} samples",
                preset.name,
                preset.image_count(),
                preset.resolution,
                preset.sampling.samples()
            );
            job.log.note(&dir, &line);
            self.emit(Status::Log { status: line });
            self.channel
                .send(&Command::ImageSaaQuality(preset.sampling.samples()).to_string());

            for entry in preset.presets.values() {
                let commands = entry.commands();

                for viewset in preset.viewsets() {
                    if self.abort.is_aborted() {
                        return true;
                    }
                    self.emit(Status::Running {
                        status: format!("Switching to {}", entry.name),
                    });

                    let sender = &self.sender;
                    Dispatcher::new(&self.config, &self.abort).dispatch(
                        &mut self.channel,
                        &commands,
                        check,
                        |result| {
                            let _ = sender.send(Status::Dispatched(*result));
                        },
                    );
                    if self.abort.is_aborted() {
                        return true;
                    }

                    if let Some(command) = viewset.command() {
                        if self.abort.sleep(self.config.command_delay()) {
                            return true;
                        }
                        self.channel.send(command);
                    }

                    job.counter += 1;
                    let name = image_file_name(
                        job.counter,
                        &entry.name,
                        &viewset,
                        &preset.file_extension,
                    );
                    let path = dir.join(&name);
                    // an old file with the same name would verify immediately
                    if path.exists() {
                        if let Err(e) = fs::remove_file(&path) {
                            warn!("Unable to remove stale {path:?}: {e}");
                        }
                    }

                    self.emit(Status::Running {
                        status: format!("Rendering {name}"),
                    });
                    self.channel.send(
                        &Command::Image {
                            path: path.clone(),
                            resolution: preset.resolution,
                        }
                        .to_string(),
                    );

                    let verification =
                        wait_for_image(&path, poll_interval, deadline, &self.abort, || {
                            self.progress(job)
                        });

                    match verification {
                        Verification::Verified { .. } => {
                            job.log.record(&dir, &name, preset, &entry.variants);
                            job.images.push(path.clone());
                            self.emit(Status::ImageCompleted {
                                counter: job.counter,
                                result: path,
                            });
                        }
                        Verification::Aborted => return true,
                        Verification::Missing => {
                            self.image_failed(job, &dir, &name, path, "image never appeared")
                        }
                        Verification::Undecodable(reason) => {
                            let reason = format!("image could not be read: {reason}");
                            self.image_failed(job, &dir, &name, path, &reason)
                        }
                    }
                    self.progress(job);
                }
            }
        }
        false
    }

    fn image_failed(&self, job: &mut JobState, dir: &Path, name: &str, path: PathBuf, reason: &str) {
        error!("{name}: {reason}");
        job.failed += 1;
        job.log.failure(dir, name, reason);
        self.emit(Status::ImageFailed {
            counter: job.counter,
            path,
            reason: reason.to_owned(),
        });
    }

    fn convert_images(&self, job: &mut JobState) {
        let Some(target) = self.config.convert_to.as_deref() else {
            return;
        };
        let target = match target.parse::<Format>() {
            Ok(format) => format,
            Err(e) => {
                self.emit(Status::Warning {
                    message: e.to_string(),
                });
                return;
            }
        };

        for image in job.images.clone() {
            if self.abort.is_aborted() {
                return;
            }
            if Format::from_path(&image) == Some(target) {
                continue;
            }

            let dir = image.parent().map(Path::to_path_buf).unwrap_or_default();
            match convert(&image, target) {
                Ok(converted) => {
                    info!("Converted {image:?} to {converted:?}");
                    job.log.note(&dir, &format!("converted to {converted:?}"));
                }
                Err(e) => {
                    warn!("{e}");
                    job.log.note(&dir, &format!("conversion failed: {e}"));
                    self.emit(Status::Warning {
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}

/// Time the worker keeps polling for a single image, see [`DeltaGenConfig::verification_deadline`].
pub fn image_deadline(preset: &RenderPreset, config: &DeltaGenConfig) -> Duration {
    config.verification_deadline(image_estimate(preset, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::render_preset::{PresetEntry, RenderPresetDraft};
    use std::collections::BTreeMap;
    use std::sync::mpsc;

    struct Offline;

    impl Channel for Offline {
        fn connect(&mut self) -> bool {
            false
        }
        fn send(&mut self, _command: &str) {}
        fn receive(&mut self, _timeout: Duration) -> Option<String> {
            None
        }
        fn is_alive(&mut self, _timeout: Duration) -> bool {
            false
        }
        fn close(&mut self) {}
    }

    #[test]
    fn fallback_lives_next_to_the_executable() {
        assert!(fallback_dir().ends_with(FALLBACK_DIR));
    }

    #[test]
    fn unusable_output_dir_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        // a file where the output directory should go
        let blocked = dir.path().join("blocked");
        fs::write(&blocked, b"").unwrap();

        let mut drafts = BTreeMap::new();
        let mut presets = BTreeMap::new();
        presets.insert(0, PresetEntry::new("Exterior", Vec::new()));
        drafts.insert(
            0,
            RenderPresetDraft {
                name: "Beauty".to_owned(),
                presets,
                sampling: Some("0".to_owned()),
                resolution: Some("8 8".to_owned()),
                file_extension: Some("png".to_owned()),
                ..Default::default()
            },
        );
        let plan = RenderPlan::try_from_drafts(drafts).unwrap();
        let (_, preset) = plan.iter().next().unwrap();

        let (sender, receiver) = mpsc::channel();
        let engine = RenderEngine::new(
            Offline,
            DeltaGenConfig::default(),
            AbortFlag::new(),
            sender,
            blocked.join("out"),
        );

        assert_eq!(engine.preset_dir(preset), fallback_dir());
        assert!(matches!(receiver.try_recv(), Ok(Status::Warning { .. })));
    }
}
