use clap::{Parser, Subcommand};
use dotenv::dotenv;
use models::app_setting::AppSetting;
use services::cli_app::CliApp;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub mod domains;
pub mod models;
pub mod services;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// DeltaGen host, overrides the saved settings for this run
    #[arg(long, global = true)]
    host: Option<String>,

    #[arg(long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Switch the variants of the named presets
    Send {
        tree: PathBuf,
        #[arg(required = true)]
        presets: Vec<String>,
        /// Wait for DeltaGen to confirm every variant
        #[arg(long)]
        confirm: bool,
        /// Send the reset presets first
        #[arg(long)]
        reset: bool,
    },
    /// Render every render preset of the tree
    Render {
        tree: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// One sub directory per render preset
        #[arg(long)]
        separate_dirs: bool,
        /// Give global illumination renders at least half an hour per image
        #[arg(long)]
        long_timeout: bool,
    },
    /// Keep the viewer on top of the configured window
    Sync {
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// Print where the settings live and what they contain
    Settings,
}

pub async fn run() -> anyhow::Result<()> {
    dotenv().ok();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let cli = Cli::parse();
    let mut setting = AppSetting::load();
    if let Some(host) = cli.host {
        setting.deltagen.host = host;
    }
    if let Some(port) = cli.port {
        setting.deltagen.port = port;
    }

    match cli.command {
        Commands::Send {
            tree,
            presets,
            confirm,
            reset,
        } => CliApp::new(setting).send(&tree, &presets, confirm, reset).await,
        Commands::Render {
            tree,
            output,
            separate_dirs,
            long_timeout,
        } => {
            setting.deltagen.separate_directories |= separate_dirs;
            setting.deltagen.long_render_timeout |= long_timeout;
            CliApp::new(setting).render(&tree, output).await
        }
        Commands::Sync { seconds } => CliApp::new(setting).sync(seconds).await,
        Commands::Settings => CliApp::new(setting).settings(),
    }
}
