// Settings commands

use std::io::ErrorKind;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use ulist_batch::Settings;

use crate::output::{print_field, OutputFormat};

#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Print the effective settings
    Show,

    /// Change stored settings
    Set {
        /// Concurrent workers (1-5)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Minimum gap between one worker's requests in ms (100-10000)
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Retries per item (0-5)
        #[arg(long)]
        retry_count: Option<u32>,

        /// Suggest reloading list pages after a completed run
        #[arg(long)]
        auto_refresh: Option<bool>,
    },
}

pub fn run(
    command: SettingsCommand,
    path: Option<&Path>,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    match command {
        SettingsCommand::Show => show(path, format),
        SettingsCommand::Set {
            concurrency,
            interval_ms,
            retry_count,
            auto_refresh,
        } => {
            let Some(path) = path else {
                bail!("No settings file given; pass --settings or set ULIST_SETTINGS");
            };
            let mut settings = load(Some(path))?;
            if let Some(concurrency) = concurrency {
                settings.concurrency = concurrency;
            }
            if let Some(interval_ms) = interval_ms {
                settings.interval_ms = interval_ms;
            }
            if let Some(retry_count) = retry_count {
                settings.retry_count = retry_count;
            }
            if let Some(auto_refresh) = auto_refresh {
                settings.auto_refresh = auto_refresh;
            }
            let settings = save(path, &settings)?;

            if format.is_text() {
                if !quiet {
                    println!("Saved settings to {}", path.display());
                }
                print_settings(&settings);
            } else {
                format.print_value(&settings)?;
            }
            Ok(())
        }
    }
}

fn show(path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let settings = load(path)?;
    if format.is_text() {
        print_settings(&settings);
    } else {
        format.print_value(&settings)?;
    }
    Ok(())
}

/// Load settings, clamped into range
///
/// No path or a missing file yields the defaults; any other read failure is
/// an error. Contents are parsed leniently.
pub fn load(path: Option<&Path>) -> Result<Settings> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    match std::fs::read_to_string(path) {
        Ok(raw) => Ok(Settings::from_json(&raw).clamped()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Settings::default()),
        Err(e) => {
            Err(e).with_context(|| format!("Failed to read settings file: {}", path.display()))
        }
    }
}

/// Clamp and store settings, returning what was written
fn save(path: &Path, settings: &Settings) -> Result<Settings> {
    let settings = settings.clamped();
    std::fs::write(path, settings.to_json())
        .with_context(|| format!("Failed to write settings file: {}", path.display()))?;
    Ok(settings)
}

fn print_settings(settings: &Settings) {
    print_field("Concurrency", &settings.concurrency.to_string());
    print_field("Interval", &format!("{} ms", settings.interval_ms));
    print_field("Retries", &settings.retry_count.to_string());
    print_field("Auto refresh", &settings.auto_refresh.to_string());
}
