// Bulk label command
//
// Design Decision: Item failures are reported, not returned as errors; the
// command fails only when the run cannot be set up.
// Design Decision: The first Ctrl-C requests a graceful stop, a second one
// exits immediately.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;
use ulist_batch::{
    BatchConfig, BatchProgress, BatchResult, BatchRunner, CancellationToken, ConfigError,
    LabelChange, Settings,
};
use ulist_vndb::{
    parse_label, select_targets, TargetRules, TargetSummary, VndbClient, VndbClientConfig,
    DEFAULT_API_URL, LABEL_BLACKLIST,
};

use crate::commands::settings;
use crate::input::load_items;
use crate::output::{print_field, print_table_header, print_table_row, OutputFormat};

#[derive(Args)]
pub struct ApplyArgs {
    /// Label to change: wishlist, blacklist, or a numeric label id
    #[arg(long, short, value_parser = label_arg, required_unless_present = "bulk_blacklist")]
    pub label: Option<u32>,

    /// Remove the label instead of adding it
    #[arg(long)]
    pub unset: bool,

    /// Blacklist every item not already blacklisted or wishlisted
    #[arg(long, conflicts_with_all = ["label", "unset"])]
    pub bulk_blacklist: bool,

    /// Visual novel ids or links
    #[arg(long, num_args = 1..)]
    pub ids: Vec<String>,

    /// File with items: a JSON array or one id per line
    #[arg(long, short)]
    pub input: Option<PathBuf>,

    /// Skip items whose known labels already match
    #[arg(long)]
    pub skip_applied: bool,

    /// Skip items carrying this label (repeatable)
    #[arg(long, value_parser = label_arg)]
    pub protect: Vec<u32>,

    /// Concurrent workers (1-5), overrides settings
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Minimum gap between one worker's requests in ms (100-10000), overrides settings
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Retries per item (0-5), overrides settings
    #[arg(long)]
    pub retry_count: Option<u32>,

    /// VNDB API token
    #[arg(long, env = "VNDB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// API base URL
    #[arg(long, env = "ULIST_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Per-request timeout in ms (at least 100)
    #[arg(long, default_value = "15000", value_parser = clap::value_parser!(u64).range(100..))]
    pub timeout_ms: u64,

    /// Start without asking for confirmation
    #[arg(long, short)]
    pub yes: bool,
}

fn label_arg(s: &str) -> Result<u32, String> {
    parse_label(s).ok_or_else(|| format!("expected wishlist, blacklist, or a label number, got '{s}'"))
}

/// Serialized summary for json/yaml output
#[derive(Serialize)]
struct ApplyReport<'a> {
    change: LabelChange,
    considered: usize,
    already_applied: usize,
    protected: usize,
    result: &'a BatchResult,
}

pub async fn run(
    args: ApplyArgs,
    settings_path: Option<&Path>,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let settings = settings::load(settings_path)?;
    let config = resolve_config(&args, &settings).context("Invalid batch configuration")?;
    let (change, rules) = plan(&args)?;

    let items = load_items(&args.ids, args.input.as_deref())?;
    if items.is_empty() {
        bail!("No items given; pass --ids or --input");
    }

    let Some(token) = args
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    else {
        bail!("No API token; pass --token or set VNDB_TOKEN");
    };

    let mut summary = select_targets(items, change, &rules);

    if format.is_text() && !quiet {
        print_plan(change, &summary, &config);
    }

    if summary.targets.is_empty() {
        return report(change, &summary, &BatchResult::empty(), &settings, format);
    }

    if !args.yes && !confirm(summary.targets.len()).await? {
        if format.is_text() {
            println!("Cancelled");
        }
        return Ok(());
    }

    let client = VndbClient::new(
        VndbClientConfig::new(Some(token.to_string()))
            .with_base_url(args.api_url.as_str())
            .with_timeout(Duration::from_millis(args.timeout_ms)),
    )
    .context("Failed to build HTTP client")?;
    let runner = BatchRunner::new(Arc::new(client), config);

    let cancel = CancellationToken::new();
    let signals = spawn_stop_on_ctrl_c(cancel.clone());
    let progress = (format.is_text() && !quiet).then(|| spawn_progress(runner.subscribe()));

    let targets = std::mem::take(&mut summary.targets);
    let result = runner.run(targets, change, &cancel).await;

    signals.abort();
    if let Some(progress) = progress {
        progress.abort();
        eprintln!();
    }

    report(change, &summary, &result, &settings, format)
}

/// Combine settings with command-line overrides
///
/// Settings are already clamped; explicit flags are validated as given.
fn resolve_config(args: &ApplyArgs, settings: &Settings) -> Result<BatchConfig, ConfigError> {
    BatchConfig::new(
        args.concurrency.unwrap_or(settings.concurrency),
        Duration::from_millis(args.interval_ms.unwrap_or(settings.interval_ms)),
        args.retry_count.unwrap_or(settings.retry_count),
    )
}

/// Resolve the label change and skip rules from the arguments
fn plan(args: &ApplyArgs) -> Result<(LabelChange, TargetRules)> {
    if args.bulk_blacklist {
        let mut rules = TargetRules::bulk_blacklist();
        rules.protected.extend(&args.protect);
        return Ok((LabelChange::set(LABEL_BLACKLIST), rules));
    }

    let Some(label) = args.label else {
        bail!("No label given; pass --label or --bulk-blacklist");
    };
    let change = if args.unset {
        LabelChange::unset(label)
    } else {
        LabelChange::set(label)
    };
    let rules = TargetRules {
        skip_applied: args.skip_applied,
        protected: args.protect.clone(),
    };
    Ok((change, rules))
}

fn describe(change: LabelChange) -> String {
    let verb = if change.set { "Add" } else { "Remove" };
    format!("{verb} label {}", change.label)
}

fn print_plan(change: LabelChange, summary: &TargetSummary, config: &BatchConfig) {
    print_field("Action", &describe(change));
    print_field("Items", &summary.considered().to_string());
    print_field("To process", &summary.targets.len().to_string());
    print_field(
        "Skipped",
        &format!(
            "{} (already applied: {}, protected: {})",
            summary.skipped(),
            summary.already_applied,
            summary.protected
        ),
    );
    print_field(
        "Workers",
        &format!(
            "{} (interval {} ms, {} retries)",
            config.concurrency(),
            config.interval().as_millis(),
            config.retry_count()
        ),
    );
    println!();
}

async fn confirm(count: usize) -> Result<bool> {
    eprint!("Apply to {count} item(s)? [y/N] ");
    let answer = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await?
    .context("Failed to read confirmation")?;

    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn spawn_stop_on_ctrl_c(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if cancel.cancel() {
                info!("Stop requested by operator");
                eprintln!("\nStop requested; in-flight requests will finish");
            } else {
                std::process::exit(130);
            }
        }
    })
}

fn spawn_progress(mut progress: watch::Receiver<BatchProgress>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let p = *progress.borrow_and_update();
            eprint!(
                "\r{}/{} done ({} ok, {} failed)",
                p.completed, p.total, p.succeeded, p.failed
            );
        }
    })
}

fn report(
    change: LabelChange,
    summary: &TargetSummary,
    result: &BatchResult,
    settings: &Settings,
    format: OutputFormat,
) -> Result<()> {
    if !format.is_text() {
        return format.print_value(&ApplyReport {
            change,
            considered: summary.considered(),
            already_applied: summary.already_applied,
            protected: summary.protected,
            result,
        });
    }

    if result.total() == 0 {
        println!("Nothing to do");
        return Ok(());
    }

    println!("{}", if result.aborted() { "Stopped" } else { "Completed" });
    print_field("Total", &result.total().to_string());
    print_field("Succeeded", &result.succeeded().to_string());
    print_field("Failed", &result.failed().to_string());
    print_field("Unprocessed", &result.unprocessed().to_string());
    print_field("Skipped", &summary.skipped().to_string());

    let failures: Vec<_> = result.failures().collect();
    if !failures.is_empty() {
        println!();
        print_table_header(&[("ITEM", 10), ("ATTEMPTS", 8), ("REASON", 60)]);
        for failure in failures {
            let attempts = failure.attempts_used.to_string();
            let reason = failure
                .failure
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            print_table_row(&[
                (failure.item_id.as_str(), 10),
                (attempts.as_str(), 8),
                (reason.as_str(), 60),
            ]);
        }
    }

    if settings.auto_refresh && !result.aborted() && result.succeeded() > 0 {
        println!();
        println!("Reload open VNDB list pages to see the changes");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        apply: ApplyArgs,
    }

    fn parse(args: &[&str]) -> ApplyArgs {
        let argv = std::iter::once("ulist").chain(args.iter().copied());
        TestCli::try_parse_from(argv).unwrap().apply
    }

    #[test]
    fn test_label_names() {
        assert_eq!(parse(&["--label", "blacklist", "--token", "t"]).label, Some(6));
        assert_eq!(parse(&["-l", "wishlist", "--token", "t"]).label, Some(5));
        assert_eq!(parse(&["--label", "12", "--token", "t"]).label, Some(12));
        assert!(TestCli::try_parse_from(["ulist", "--label", "finished"]).is_err());
        assert!(TestCli::try_parse_from(["ulist", "--token", "t"]).is_err());
    }

    #[test]
    fn test_ids_and_protect() {
        let args = parse(&[
            "--label",
            "blacklist",
            "--ids",
            "v1",
            "v2",
            "--protect",
            "wishlist",
            "--protect",
            "7",
            "--token",
            "t",
        ]);

        assert_eq!(args.ids, vec!["v1", "v2"]);
        assert_eq!(args.protect, vec![5, 7]);
        assert!(!args.unset);
        assert_eq!(args.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_flags_override_settings() {
        let args = parse(&[
            "--label",
            "6",
            "--concurrency",
            "3",
            "--retry-count",
            "0",
            "--token",
            "t",
        ]);
        let settings = Settings {
            concurrency: 1,
            interval_ms: 750,
            retry_count: 2,
            auto_refresh: false,
        };

        let config = resolve_config(&args, &settings).unwrap();

        assert_eq!(config.concurrency(), 3);
        assert_eq!(config.interval(), Duration::from_millis(750));
        assert_eq!(config.retry_count(), 0);
    }

    #[test]
    fn test_out_of_range_flag_is_rejected() {
        let args = parse(&["--label", "6", "--concurrency", "9", "--token", "t"]);

        let err = resolve_config(&args, &Settings::default()).unwrap_err();

        assert_eq!(err, ConfigError::Concurrency(9));
    }

    #[test]
    fn test_confirmation_answers() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("no"));
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(LabelChange::set(6)), "Add label 6");
        assert_eq!(describe(LabelChange::unset(5)), "Remove label 5");
    }

    #[test]
    fn test_bulk_blacklist_preset() {
        let args = parse(&["--bulk-blacklist", "--protect", "7", "--token", "t"]);

        let (change, rules) = plan(&args).unwrap();

        assert_eq!(change, LabelChange::set(LABEL_BLACKLIST));
        assert!(rules.skip_applied);
        assert_eq!(rules.protected, vec![5, 7]);
        assert!(TestCli::try_parse_from(["ulist", "--bulk-blacklist", "--label", "6"]).is_err());
        assert!(TestCli::try_parse_from(["ulist", "--bulk-blacklist", "--unset"]).is_err());
    }

    #[test]
    fn test_plain_label_plan() {
        let args = parse(&["--label", "wishlist", "--unset", "--skip-applied", "--token", "t"]);

        let (change, rules) = plan(&args).unwrap();

        assert_eq!(change, LabelChange::unset(5));
        assert!(rules.skip_applied);
        assert!(rules.protected.is_empty());
    }

    #[test]
    fn test_timeout_must_be_positive() {
        assert!(TestCli::try_parse_from(["ulist", "-l", "6", "--timeout-ms", "0"]).is_err());
        assert!(TestCli::try_parse_from(["ulist", "-l", "6", "--timeout-ms", "50"]).is_err());
        assert_eq!(parse(&["-l", "6", "--timeout-ms", "2000"]).timeout_ms, 2000);
    }
}
