use crate::abort::AbortFlag;
use crate::channel::{connect_with_retry, Channel, TcpChannel};
use crate::config::DeltaGenConfig;
use crate::dispatcher::{subscribe_variant_state, Dispatcher};
use crate::models::render_plan::RenderPlan;
use crate::models::status::{Status, Summary};
use crate::models::variant::{Variant, VariantCommand};
use crate::render::RenderEngine;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Handle to a send or render run executing on its own thread.
/// Events arrive on `receiver`; the last one is always `Finished` or `Aborted`.
#[derive(Debug)]
pub struct Worker {
    pub receiver: Receiver<Status>,
    abort: AbortFlag,
    handle: JoinHandle<Summary>,
}

impl Worker {
    /// Ask the worker to stop at its next suspension point.
    pub fn abort(&self) {
        self.abort.abort();
    }

    /// Block until the thread ended or `timeout` passed. Returns whether it ended.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.handle.is_finished() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
        true
    }

    /// Pull the next event, waiting up to `timeout`. `None` on timeout or once the worker is gone.
    pub fn next_status(&self, timeout: Duration) -> Option<Status> {
        match self.receiver.recv_timeout(timeout) {
            Ok(status) => Some(status),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Wait for the thread and take its summary. `None` if the worker panicked.
    pub fn join(self) -> Option<Summary> {
        match self.handle.join() {
            Ok(summary) => Some(summary),
            Err(_) => {
                error!("DeltaGen worker panicked");
                None
            }
        }
    }
}

/// Entry point for talking to one DeltaGen instance. Every call opens its own connection
/// on a fresh worker thread, so the caller never blocks on the socket.
#[derive(Debug, Clone, Default)]
pub struct DeltaGen {
    config: DeltaGenConfig,
}

impl DeltaGen {
    pub fn new(config: DeltaGenConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DeltaGenConfig {
        &self.config
    }

    /// Switch `variants` in order, optionally checking each confirmation.
    pub fn send_variants(&self, variants: Vec<Variant>, check_confirmation: bool) -> Worker {
        let channel = TcpChannel::from_config(&self.config);
        self.send_variants_with(channel, variants, check_confirmation)
    }

    pub fn send_variants_with<C: Channel + 'static>(
        &self,
        channel: C,
        variants: Vec<Variant>,
        check_confirmation: bool,
    ) -> Worker {
        let config = self.config.clone();
        spawn(move |abort, sender| {
            send_run(channel, &config, &abort, &sender, variants, check_confirmation)
        })
    }

    /// Render `plan` into `output_dir`.
    pub fn render(&self, plan: RenderPlan, output_dir: PathBuf) -> Worker {
        let channel = TcpChannel::from_config(&self.config);
        self.render_with(channel, plan, output_dir)
    }

    pub fn render_with<C: Channel + 'static>(
        &self,
        channel: C,
        plan: RenderPlan,
        output_dir: PathBuf,
    ) -> Worker {
        let config = self.config.clone();
        spawn(move |abort, sender| {
            RenderEngine::new(channel, config, abort, sender, output_dir).run(&plan)
        })
    }
}

fn spawn<F>(job: F) -> Worker
where
    F: FnOnce(AbortFlag, mpsc::Sender<Status>) -> Summary + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    let abort = AbortFlag::new();
    let flag = abort.clone();
    let handle = thread::spawn(move || job(flag, sender));
    Worker {
        receiver,
        abort,
        handle,
    }
}

fn send_run<C: Channel>(
    mut channel: C,
    config: &DeltaGenConfig,
    abort: &AbortFlag,
    sender: &mpsc::Sender<Status>,
    variants: Vec<Variant>,
    check_confirmation: bool,
) -> Summary {
    let started = Instant::now();
    let commands = variants
        .into_iter()
        .map(VariantCommand::from)
        .collect::<Vec<_>>();
    let mut summary = Summary::new(Uuid::new_v4(), commands.len());

    let _ = sender.send(Status::Running {
        status: format!("Connecting to DeltaGen at {}", config.address()),
    });
    if !connect_with_retry(&mut channel, config, abort) {
        channel.close();
        if !abort.is_aborted() {
            error!("No connection to DeltaGen at {}", config.address());
            let _ = sender.send(Status::NoConnection {
                address: config.address(),
            });
        }
        summary.elapsed = started.elapsed();
        let _ = sender.send(Status::Aborted(summary.clone()));
        return summary;
    }
    summary.connected = true;

    if check_confirmation {
        subscribe_variant_state(&mut channel, config);
    }

    let _ = sender.send(Status::Running {
        status: format!("Sending {} variants", commands.len()),
    });
    let results = Dispatcher::new(config, abort).dispatch(
        &mut channel,
        &commands,
        check_confirmation,
        |result| {
            let _ = sender.send(Status::Dispatched(*result));
            let percent = (result.index + 1) * 100 / commands.len().max(1);
            let _ = sender.send(Status::Progress {
                percent: percent.clamp(1, 100) as u8,
                remaining: Duration::ZERO,
            });
        },
    );
    channel.close();

    summary.sent = results.len();
    summary.failed = results
        .iter()
        .filter(|r| r.checked && !r.is_confirmed())
        .count();
    summary.elapsed = started.elapsed();

    if abort.is_aborted() {
        warn!("Variant send aborted after {}/{}", summary.sent, summary.total);
        let _ = sender.send(Status::Aborted(summary.clone()));
    } else {
        info!(
            "Sent {}/{} variants in {:?}",
            summary.sent, summary.total, summary.elapsed
        );
        let _ = sender.send(Status::Finished(summary.clone()));
    }
    summary
}
