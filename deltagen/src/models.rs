pub mod confirmation;
pub mod format;
pub mod render_plan;
pub mod render_preset;
pub mod status;
pub mod variant;
