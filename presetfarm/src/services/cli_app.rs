use super::log_sink::LogSink;
use super::plan_builder::build_render_plan;
use super::supervisor::SendToDeltaGen;
use super::variant_list::find_sendable;
use crate::domains::progress_sink::ProgressSink;
use crate::models::app_setting::AppSetting;
use crate::models::tree::PresetTree;
use deltagen::models::status::Summary;
use deltagen::viewer_sync::{TitlePattern, ViewerSync, WindowFocus, WindowGeometry, WindowRect};
use deltagen::TcpChannel;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::{select, signal, time};
use tracing::{debug, info, warn};

const PUMP_INTERVAL: Duration = Duration::from_millis(100);

/// The viewer follows a fixed rectangle taken from the settings.
struct FixedWindow(WindowRect);

impl WindowGeometry for FixedWindow {
    fn rect(&mut self) -> Option<WindowRect> {
        Some(self.0)
    }
}

// a headless session has no native window to raise
struct NoFocus;

impl WindowFocus for NoFocus {
    fn raise_matching(&mut self, pattern: &TitlePattern) -> bool {
        debug!("No window manager access, not raising {}", pattern.as_str());
        false
    }
}

/// Pump the running worker into `sink` until it ends. Ctrl-C aborts it once.
pub async fn supervise(
    supervisor: &mut SendToDeltaGen,
    sink: &mut dyn ProgressSink,
) -> Option<Summary> {
    let mut tick = time::interval(PUMP_INTERVAL);
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut aborted = false;

    loop {
        select! {
            _ = &mut ctrl_c, if !aborted => {
                warn!("Interrupted, aborting the run");
                supervisor.abort();
                aborted = true;
            }
            _ = tick.tick() => {
                if let Some(summary) = supervisor.pump(sink) {
                    return Some(summary);
                }
                if !supervisor.is_running() {
                    return None;
                }
            }
        }
    }
}

fn finish(summary: Option<Summary>) -> anyhow::Result<()> {
    match summary {
        Some(summary) if !summary.connected => anyhow::bail!("No connection to DeltaGen"),
        Some(_) => Ok(()),
        None => anyhow::bail!("Run ended without a summary"),
    }
}

pub struct CliApp {
    setting: AppSetting,
}

impl CliApp {
    pub fn new(setting: AppSetting) -> Self {
        Self { setting }
    }

    /// Send the variants of every item named in `names`.
    pub async fn send(
        &self,
        tree: &Path,
        names: &[String],
        confirm: bool,
        reset: bool,
    ) -> anyhow::Result<()> {
        let tree = PresetTree::load(tree)?;
        let mut selected = Vec::new();
        for name in names {
            let found = find_sendable(&tree, name);
            if found.is_empty() {
                warn!("Nothing to send named \"{name}\"");
            }
            selected.extend(found);
        }

        let mut sink = LogSink::default();
        let mut supervisor = SendToDeltaGen::new(self.setting.deltagen.clone());
        supervisor.send_tree_items(
            &tree,
            &selected,
            reset || self.setting.send_reset,
            confirm || self.setting.check_confirmation_on_send,
            &mut sink,
        )?;
        finish(supervise(&mut supervisor, &mut sink).await)
    }

    /// Render every render preset of the tree.
    pub async fn render(&self, tree: &Path, output: Option<PathBuf>) -> anyhow::Result<()> {
        let tree = PresetTree::load(tree)?;
        let build = build_render_plan(&tree);
        for warning in &build.warnings {
            warn!("{warning}");
        }

        let output_dir = output.unwrap_or_else(|| self.setting.render_dir.clone());
        let mut sink = LogSink::default();
        let mut supervisor = SendToDeltaGen::new(self.setting.deltagen.clone());
        supervisor.render(build, output_dir)?;
        finish(supervise(&mut supervisor, &mut sink).await)
    }

    /// Glue the viewer to the configured window until Ctrl-C or `seconds` passed.
    pub async fn sync(&self, seconds: Option<u64>) -> anyhow::Result<()> {
        let config = &self.setting.deltagen;
        let window = FixedWindow(self.setting.viewer_window.into());
        let sync = ViewerSync::start(TcpChannel::from_config(config), config, window, NoFocus)?;
        info!("Following {:?}, Ctrl-C to stop", self.setting.viewer_window);

        select! {
            _ = signal::ctrl_c() => {}
            _ = time::sleep(Duration::from_secs(seconds.unwrap_or_default())), if seconds.is_some() => {}
        }

        // joins the sync thread
        tokio::task::spawn_blocking(move || sync.stop()).await?;
        Ok(())
    }

    pub fn settings(&self) -> anyhow::Result<()> {
        match AppSetting::config_path() {
            Ok(path) => println!("{}", path.display()),
            Err(e) => warn!("{e}"),
        }
        println!("{}", serde_json::to_string_pretty(&self.setting)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deltagen::models::confirmation::DispatchResult;
    use deltagen::models::variant::Variant;
    use deltagen::{Channel, DeltaGenConfig};

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

    #[derive(Default)]
    struct Messages(Vec<String>);

    impl ProgressSink for Messages {
        fn progress(&mut self, _percent: u8) {}

        fn status(&mut self, status: &str) {
            self.0.push(status.to_owned());
        }

        fn highlight(&mut self, _result: &DispatchResult) {}

        fn finished(&mut self, _summary: &Summary, message: &str) {
            self.0.push(message.to_owned());
        }
    }

    #[tokio::test]
    async fn supervise_ends_with_the_summary() {
        let config = DeltaGenConfig {
            connect_retries: 1,
            probe_timeout_ms: 1,
            ..Default::default()
        };
        let mut supervisor =
            SendToDeltaGen::with_connector(config, Box::new(|_| Box::new(Offline)));
        let mut sink = Messages::default();

        supervisor
            .send_variants(vec![Variant::new("Paint", "red")], false)
            .unwrap();
        let summary = supervise(&mut supervisor, &mut sink).await.unwrap();

        assert!(!summary.connected);
        assert_eq!(sink.0.last().unwrap(), "No connection to DeltaGen");
        assert!(finish(Some(summary)).is_err());
    }

    #[tokio::test]
    async fn unknown_tree_file_is_an_error() {
        let app = CliApp::new(AppSetting::default());
        let result = app
            .send(Path::new("does/not/exist.json"), &["Base".to_owned()], false, false)
            .await;
        assert!(result.unwrap_err().to_string().contains("exist.json"));
    }
}
