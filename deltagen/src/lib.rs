// cooperative cancellation shared between the caller and a worker
pub mod abort;

// socket connection to the DeltaGen command port
pub mod channel;

// textual commands understood by DeltaGen
pub mod command;

// explicit run configuration, handed to every worker
pub mod config;

// entry point that spawns send/render workers off the caller thread
pub mod deltagen;

// sends variant commands and checks confirmations
pub mod dispatcher;

pub mod error;

pub mod models;

// file name rules for rendered images
pub mod naming;

// nested render loop over presets and viewsets
pub mod render;

// plain text log written next to the rendered images
pub mod render_log;

// render time estimate and progress
pub mod timing;

// wait for a rendered file and make sure it decodes
pub mod verify;

// keeps the DeltaGen viewer window glued to a local window
pub mod viewer_sync;

pub use crate::abort::AbortFlag;
pub use crate::channel::{Channel, TcpChannel};
pub use crate::config::DeltaGenConfig;
pub use crate::deltagen::{DeltaGen, Worker};
pub use crate::error::{DeltaGenError, PlanError};
