use crate::models::render_preset::Resolution;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Slow global illumination renders never get less than this to show up and decode.
pub const LONG_TIMEOUT_MIN: Duration = Duration::from_secs(1800);

/// Everything a send or render run needs to know about the DeltaGen peer and the render farm.
/// A copy of this travels with every worker; nothing is read from globals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeltaGenConfig {
    pub host: String,
    pub port: u16,
    /// Lightweight command used to check whether DeltaGen answers at all.
    pub probe_command: String,
    pub connect_retries: u32,
    /// Probe timeout of the first attempt, doubled on every retry.
    pub probe_timeout_ms: u64,
    /// How long to wait for a variant_state event after each variant.
    pub confirmation_timeout_ms: u64,
    /// Throttle between two variant commands.
    pub command_delay_ms: u64,
    /// Tick of the wait-for-file loop.
    pub poll_interval_ms: u64,
    pub verify_timeout_secs: u64,
    pub long_render_timeout: bool,
    /// Calibration of the assumed render farm throughput.
    pub machine_factor: f64,
    pub res_factor: f64,
    /// Size the viewer is restored to after a render or a window sync.
    pub viewer_size: Resolution,
    /// RGBA in 0..=1
    pub viewer_background: Option<[f32; 4]>,
    pub freeze_viewer: bool,
    /// Wait for a variant_state event after each variant during render runs.
    pub check_confirmation: bool,
    /// One sub directory per render preset instead of a flat output directory.
    pub separate_directories: bool,
    /// Re-encode finished images to this extension, e.g. "png".
    pub convert_to: Option<String>,
    pub sync_interval_ms: u64,
    /// Wildcard pattern of the native viewer window title.
    pub window_title_pattern: String,
    pub pull_every_time: bool,
}

impl Default for DeltaGenConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 3333,
            probe_command: "VERSION;".to_owned(),
            connect_retries: 3,
            probe_timeout_ms: 2_000,
            confirmation_timeout_ms: 3_000,
            command_delay_ms: 50,
            poll_interval_ms: 1_000,
            verify_timeout_secs: 3_300,
            long_render_timeout: false,
            machine_factor: 0.0032,
            res_factor: 0.0007,
            viewer_size: Resolution::new(1280, 720),
            viewer_background: None,
            freeze_viewer: false,
            check_confirmation: true,
            separate_directories: false,
            convert_to: None,
            sync_interval_ms: 600,
            window_title_pattern: "*DeltaGen*".to_owned(),
            pull_every_time: false,
        }
    }
}

impl DeltaGenConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    pub fn command_delay(&self) -> Duration {
        Duration::from_millis(self.command_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    /// Time budget for one image to appear on disk and decode, measured from the render command.
    /// Long render timeout mode adds the larger of the estimated image time and [`LONG_TIMEOUT_MIN`].
    pub fn verification_deadline(&self, estimated_image: Duration) -> Duration {
        let base = Duration::from_secs(self.verify_timeout_secs);
        if self.long_render_timeout {
            base + estimated_image.max(LONG_TIMEOUT_MIN)
        } else {
            base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: DeltaGenConfig =
            serde_json::from_str(r#"{ "host": "render01", "port": 4444 }"#).unwrap();
        assert_eq!(config.address(), "render01:4444");
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.viewer_size, Resolution::new(1280, 720));
    }

    #[test]
    fn long_timeout_extends_the_deadline() {
        let mut config = DeltaGenConfig::default();
        let estimate = Duration::from_secs(60);
        assert_eq!(
            config.verification_deadline(estimate),
            Duration::from_secs(3300)
        );

        config.long_render_timeout = true;
        assert_eq!(
            config.verification_deadline(estimate),
            Duration::from_secs(3300 + 1800)
        );
        assert_eq!(
            config.verification_deadline(Duration::from_secs(4000)),
            Duration::from_secs(3300 + 4000)
        );
    }
}
