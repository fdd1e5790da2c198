use crate::channel::Channel;
use crate::command::{batch, Command};
use crate::config::DeltaGenConfig;
use crate::error::DeltaGenError;
use crate::models::render_preset::Resolution;
use regex::Regex;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Screen rectangle of the local window the viewer follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Where the local window currently is. `None` while it is hidden or minimized.
pub trait WindowGeometry: Send {
    fn rect(&mut self) -> Option<WindowRect>;
}

/// Brings a native window to the foreground.
pub trait WindowFocus: Send {
    /// Raise the first window whose title matches. Returns false if none did.
    fn raise_matching(&mut self, pattern: &TitlePattern) -> bool;
}

/// Window title wildcard: `*` matches any run of characters, `?` a single one.
#[derive(Debug, Clone)]
pub struct TitlePattern {
    pattern: String,
    regex: Regex,
}

impl TitlePattern {
    pub fn new(pattern: &str) -> Result<Self, DeltaGenError> {
        let mut expr = String::from("^");
        for c in pattern.chars() {
            match c {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                c => expr.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
            }
        }
        expr.push('$');

        Ok(Self {
            pattern: pattern.to_owned(),
            regex: Regex::new(&expr)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, title: &str) -> bool {
        self.regex.is_match(title)
    }
}

fn follow(rect: WindowRect) -> String {
    batch(&[
        Command::UnfreezeViewer,
        Command::BorderlessViewer(true),
        Command::SizeViewer(Resolution::new(rect.width, rect.height)),
        Command::PositionViewer {
            x: rect.x,
            y: rect.y,
        },
    ])
}

fn release(size: Resolution) -> String {
    batch(&[Command::BorderlessViewer(false), Command::SizeViewer(size)])
}

/// Keeps the DeltaGen viewer borderless on top of a local window.
/// Runs on its own thread with its own connection until stopped or dropped.
#[derive(Debug)]
pub struct ViewerSync {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ViewerSync {
    pub fn start<C, G, F>(
        mut channel: C,
        config: &DeltaGenConfig,
        mut geometry: G,
        mut focus: F,
    ) -> Result<Self, DeltaGenError>
    where
        C: Channel + 'static,
        G: WindowGeometry + 'static,
        F: WindowFocus + 'static,
    {
        let pattern = TitlePattern::new(&config.window_title_pattern)?;
        let interval = config.sync_interval();
        let pull_every_time = config.pull_every_time;
        let viewer_size = config.viewer_size;
        let (stop, stopped) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("viewer-sync".to_owned())
            .spawn(move || {
                info!("Viewer sync started, following {}", pattern.as_str());
                let mut connected = false;
                let mut pulled = false;

                loop {
                    if !connected {
                        connected = channel.connect();
                    }

                    if connected {
                        if let Some(rect) = geometry.rect() {
                            channel.send(&follow(rect));
                            if channel.receive(interval).is_some() && (!pulled || pull_every_time) {
                                pulled |= focus.raise_matching(&pattern);
                                debug!("Raised viewer window: {pulled}");
                            }
                            // a hung up peer gets reconnected on the next tick
                            connected = channel.is_connected();
                            if !connected {
                                warn!("Viewer sync lost DeltaGen, reconnecting");
                            }
                        }
                    }

                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }

                if connected && channel.is_connected() {
                    channel.send(&release(viewer_size));
                }
                channel.close();
                info!("Viewer sync stopped");
            })
            .map_err(|e| DeltaGenError::Spawn(e.to_string()))?;

        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    /// Restore the viewer, close the connection and wait for the thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Viewer sync thread panicked");
            }
        }
    }
}

impl Drop for ViewerSync {
    fn drop(&mut self) {
        self.shutdown();
    }
}
