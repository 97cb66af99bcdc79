// ulist CLI
//
// Design Decision: Use clap derive with env fallbacks so tokens never need to
// appear on the command line.
// Design Decision: Support text/json/yaml output formats for scripting.
// Design Decision: Logs go to stderr; stdout carries only the command output.

mod commands;
mod input;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "ulist")]
#[command(about = "ulist - Apply VNDB user-list labels in bulk")]
#[command(version)]
pub struct Cli {
    /// Settings file (JSON)
    #[arg(long, global = true, env = "ULIST_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Output format
    #[arg(long, short, global = true, default_value = "text", value_parser = ["text", "json", "yaml"])]
    pub output: String,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add or remove a label on many visual novels
    Apply(commands::apply::ApplyArgs),

    /// Show or change stored settings
    Settings {
        #[command(subcommand)]
        command: commands::settings::SettingsCommand,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ulist=info,ulist_batch=info,ulist_vndb=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let output_format = output::OutputFormat::from_str(&cli.output);

    match cli.command {
        Commands::Apply(args) => {
            commands::apply::run(args, cli.settings.as_deref(), output_format, cli.quiet).await
        }
        Commands::Settings { command } => {
            commands::settings::run(command, cli.settings.as_deref(), output_format, cli.quiet)
        }
    }
}
