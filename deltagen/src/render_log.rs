use crate::models::render_preset::RenderPreset;
use crate::models::variant::Variant;
use chrono::Local;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use uuid::Uuid;

pub const LOG_FILE_NAME: &str = "Render_Log.txt";

const TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

/// Human readable record of a render run. One text per output directory, so a flat run
/// gets a single log and separate directories get one each.
#[derive(Debug, Clone)]
pub struct RenderLog {
    run_id: Uuid,
    entries: BTreeMap<PathBuf, String>,
}

impl RenderLog {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            entries: BTreeMap::new(),
        }
    }

    fn section(&mut self, dir: &Path) -> &mut String {
        let run_id = self.run_id;
        self.entries.entry(dir.to_path_buf()).or_insert_with(|| {
            format!(
                "Render run {run_id}\nStarted {}\n\n",
                Local::now().format(TIMESTAMP)
            )
        })
    }

    pub fn record(&mut self, dir: &Path, image_name: &str, preset: &RenderPreset, variants: &[Variant]) {
        let section = self.section(dir);
        let _ = writeln!(section, "{} {image_name}", Local::now().format(TIMESTAMP));
        let _ = writeln!(
            section,
            "    render preset: {} | resolution {} | samples {} | {}",
            preset.name,
            preset.resolution,
            preset.sampling.samples(),
            preset.file_extension
        );
        for variant in variants {
            let _ = writeln!(section, "    {} {}", variant.name, variant.value);
        }
    }

    pub fn failure(&mut self, dir: &Path, image_name: &str, reason: &str) {
        let section = self.section(dir);
        let _ = writeln!(
            section,
            "{} FAILED {image_name}: {reason}",
            Local::now().format(TIMESTAMP)
        );
    }

    pub fn note(&mut self, dir: &Path, line: &str) {
        let section = self.section(dir);
        let _ = writeln!(section, "{} {line}", Local::now().format(TIMESTAMP));
    }

    /// Write every section to `<dir>/Render_Log.txt`. Returns the files that were written;
    /// a directory that cannot be written only costs its own log.
    pub fn write(&self) -> Vec<PathBuf> {
        let mut written = Vec::new();
        for (dir, text) in &self.entries {
            let path = dir.join(LOG_FILE_NAME);
            match fs::write(&path, text) {
                Ok(()) => {
                    info!("Render log written to {path:?}");
                    written.push(path);
                }
                Err(e) => error!("Unable to write render log {path:?}: {e}"),
            }
        }
        written
    }
}
