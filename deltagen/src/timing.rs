use crate::config::DeltaGenConfig;
use crate::models::render_plan::RenderPlan;
use crate::models::render_preset::RenderPreset;
use std::time::Duration;

/// Estimated seconds for one render preset:
/// `resolution_x * samples * machine_factor * resolution_x * res_factor * images`.
pub fn preset_seconds(preset: &RenderPreset, config: &DeltaGenConfig) -> f64 {
    let resolution_x = preset.resolution.width as f64;
    let samples = preset.sampling.samples() as f64;
    let images = preset.image_count() as f64;
    resolution_x * samples * config.machine_factor * resolution_x * config.res_factor * images
}

pub fn plan_seconds(plan: &RenderPlan, config: &DeltaGenConfig) -> f64 {
    plan.iter()
        .map(|(_, preset)| preset_seconds(preset, config))
        .sum()
}

/// Estimated time of a single image of `preset`.
pub fn image_estimate(preset: &RenderPreset, config: &DeltaGenConfig) -> Duration {
    let images = preset.image_count().max(1) as f64;
    to_duration(preset_seconds(preset, config) / images)
}

fn to_duration(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::ZERO)
}

/// Linear progress model over the estimated render time of a whole plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Eta {
    total_seconds: f64,
    total_images: usize,
}

impl Eta {
    pub fn new(plan: &RenderPlan, config: &DeltaGenConfig) -> Self {
        Self::from_estimate(plan_seconds(plan, config), plan.total_images())
    }

    pub fn from_estimate(total_seconds: f64, total_images: usize) -> Self {
        Self {
            total_seconds,
            total_images,
        }
    }

    pub fn total(&self) -> Duration {
        to_duration(self.total_seconds)
    }

    pub fn remaining(&self, elapsed: Duration) -> Duration {
        to_duration((self.total_seconds - elapsed.as_secs_f64()).max(0.0))
    }

    /// Percent done in `1..=100`: whichever is further along, the wall clock or the share
    /// of finished images.
    pub fn progress(&self, elapsed: Duration, images_done: usize) -> u8 {
        let images = self.total_images.max(1) as f64;
        let done = images_done as f64;
        if self.total_seconds <= 0.0 {
            return (done * 100.0 / images).clamp(1.0, 100.0) as u8;
        }

        let proportional = self.total_seconds / images * done;
        let elapsed = elapsed.as_secs_f64().max(proportional);
        (elapsed * 100.0 / self.total_seconds).clamp(1.0, 100.0) as u8
    }
}

/// `HH:MM:SS`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::render_preset::{PresetEntry, RenderPresetDraft};
    use std::collections::BTreeMap;

    fn preset(viewsets: usize, presets: usize, sampling: &str, resolution: &str) -> RenderPreset {
        let presets = (0..presets)
            .map(|i| (i, PresetEntry::new(format!("P{i}"), Vec::new())))
            .collect::<BTreeMap<_, _>>();
        RenderPresetDraft {
            name: "R".to_owned(),
            viewsets: (0..viewsets).map(|i| format!("VIEWSET V{i};")).collect(),
            presets,
            sampling: Some(sampling.to_owned()),
            resolution: Some(resolution.to_owned()),
            file_extension: Some("png".to_owned()),
        }
        .validate(0)
        .unwrap()
    }

    #[test]
    fn follows_the_physical_model() {
        let config = DeltaGenConfig::default();
        let preset = preset(0, 4, "3", "1280 720");
        let expected = 1280.0 * 8.0 * config.machine_factor * 1280.0 * config.res_factor * 4.0;
        assert!((preset_seconds(&preset, &config) - expected).abs() < 1e-9);

        let with_views = preset_with_views();
        let expected = 640.0 * 1.0 * config.machine_factor * 640.0 * config.res_factor * 6.0;
        assert!((preset_seconds(&with_views, &config) - expected).abs() < 1e-9);
    }

    fn preset_with_views() -> RenderPreset {
        preset(3, 2, "0", "640 480")
    }

    #[test]
    fn progress_is_clamped_and_prefers_the_further_estimate() {
        let eta = Eta::from_estimate(100.0, 4);
        assert_eq!(eta.progress(Duration::ZERO, 0), 1);
        assert_eq!(eta.progress(Duration::from_secs(10), 0), 10);
        // two of four images done after 10s counts as half way
        assert_eq!(eta.progress(Duration::from_secs(10), 2), 50);
        assert_eq!(eta.progress(Duration::from_secs(500), 4), 100);
    }

    #[test]
    fn remaining_never_goes_negative() {
        let eta = Eta::from_estimate(100.0, 4);
        assert_eq!(eta.remaining(Duration::from_secs(40)), Duration::from_secs(60));
        assert_eq!(eta.remaining(Duration::from_secs(400)), Duration::ZERO);
    }

    #[test]
    fn zero_estimate_falls_back_to_image_share() {
        let eta = Eta::from_estimate(0.0, 4);
        assert_eq!(eta.progress(Duration::from_secs(3), 0), 1);
        assert_eq!(eta.progress(Duration::from_secs(3), 2), 50);
    }

    #[test]
    fn formats_clock_time() {
        assert_eq!(format_duration(Duration::from_secs(3725)), "01:02:05");
    }
}
