// long running commands behind the clap subcommands
pub mod cli_app;
pub mod log_sink;
pub mod plan_builder;
// owns the single send/render worker
pub mod supervisor;
pub mod variant_list;
