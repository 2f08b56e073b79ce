//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use mdharvest_core::{HarvestSummary, ProgressReporter, harvest, read_urls_from_csv};
use mdharvest_ledger::Ledger;
use mdharvest_shared::{
    AppConfig, HarvestConfig, LedgerStatus, config_file_path, init_config, load_config,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// mdharvest — save web articles as Markdown, one folder per domain.
#[derive(Parser)]
#[command(
    name = "mdharvest",
    version,
    about = "Fetch articles by URL and save them as Markdown with a per-domain meta.csv ledger.",
    long_about = None,
    args_conflicts_with_subcommands = true,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub harvest: HarvestArgs,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands. Without one, the arguments describe a harvest.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

/// Arguments for a harvest run.
#[derive(Args, Debug)]
pub(crate) struct HarvestArgs {
    /// Article URLs to convert.
    pub urls: Vec<String>,

    /// CSV file with a column of URLs.
    #[arg(long, requires = "column")]
    pub csv: Option<PathBuf>,

    /// Name of the URL column in --csv.
    #[arg(long, requires = "csv")]
    pub column: Option<String>,

    /// Root directory for domain folders (e.g. an Obsidian vault).
    #[arg(short, long, env = "OBSIDIAN_PATH")]
    pub output_dir: Option<PathBuf>,

    /// Re-fetch URLs the ledgers already mark as downloaded.
    #[arg(long)]
    pub no_skip_existing: bool,

    /// Also process every failed or rate-limited URL found in the ledgers.
    #[arg(long)]
    pub retry_failed: bool,

    /// Number of articles fetched at once.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub concurrency: Option<u32>,

    /// User-Agent header sent with every request.
    #[arg(long, env = "USER_AGENT")]
    pub user_agent: Option<String>,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "mdharvest=info",
        1 => "mdharvest=debug",
        _ => "mdharvest=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Command::Config { action }) => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
        None => cmd_harvest(cli.harvest).await,
    }
}

// ---------------------------------------------------------------------------
// Harvest
// ---------------------------------------------------------------------------

async fn cmd_harvest(args: HarvestArgs) -> Result<()> {
    if args.urls.is_empty() && args.csv.is_none() && !args.retry_failed {
        return Err(eyre!(
            "nothing to do: pass URLs, --csv FILE --column NAME, or --retry-failed"
        ));
    }

    let config = load_config()?;
    let harvest_config = resolve_harvest_config(&config, &args)?;

    let mut urls = args.urls;

    if let Some(csv_path) = &args.csv {
        let column = args
            .column
            .as_deref()
            .ok_or_else(|| eyre!("--csv requires --column"))?;
        let from_csv = read_urls_from_csv(csv_path, column)?;
        info!(path = %csv_path.display(), column, count = from_csv.len(), "loaded URLs from CSV");
        urls.extend(from_csv);
    }

    if args.retry_failed {
        let unfinished = Ledger::new(&harvest_config.output_dir, true).unfinished_urls()?;
        info!(count = unfinished.len(), "queued unfinished URLs from ledgers");
        urls.extend(unfinished);
    }

    if urls.is_empty() {
        return Err(eyre!("no URLs found to process"));
    }

    info!(
        urls = urls.len(),
        output_dir = %harvest_config.output_dir.display(),
        skip_existing = harvest_config.skip_existing,
        concurrency = harvest_config.concurrency,
        "starting mdharvest"
    );

    let reporter = CliProgress::new();
    let summary = harvest(&harvest_config, urls, &reporter).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary, &harvest_config.output_dir);
    }

    Ok(())
}

/// Merge config file values with CLI flags (flags and env vars win).
fn resolve_harvest_config(config: &AppConfig, args: &HarvestArgs) -> Result<HarvestConfig> {
    let output_dir = match &args.output_dir {
        Some(dir) => dir.clone(),
        None => HarvestConfig::default_output_dir(config).ok_or_else(|| {
            let config_path = config_file_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "the config file".to_string());
            eyre!(
                "no output directory: pass --output-dir, set OBSIDIAN_PATH, or set defaults.output_dir in {config_path}"
            )
        })?,
    };

    let mut harvest_config = HarvestConfig::new(config, output_dir);
    if args.no_skip_existing {
        harvest_config.skip_existing = false;
    }
    if let Some(concurrency) = args.concurrency {
        harvest_config.concurrency = concurrency as usize;
    }
    if let Some(user_agent) = &args.user_agent {
        harvest_config.fetch.user_agent = user_agent.clone();
    }

    Ok(harvest_config)
}

fn print_summary(summary: &HarvestSummary, output_dir: &Path) {
    println!();
    println!("  Harvest finished");
    println!("  Output:        {}", output_dir.display());
    println!("  Saved:         {}", summary.succeeded);
    println!("  Skipped:       {}", summary.skipped);
    println!("  Rate limited:  {}", summary.rate_limited);
    println!("  Failed:        {}", summary.failed);
    println!("  Invalid:       {}", summary.invalid);
    if summary.ledger_errors > 0 {
        println!("  Ledger errors: {}", summary.ledger_errors);
    }
    println!("  Time:          {:.1}s", summary.elapsed.as_secs_f64());

    let sections = [
        ("Rate limited", &summary.rate_limited_urls),
        ("Failed", &summary.failed_urls),
        ("Invalid", &summary.invalid_urls),
    ];
    for (label, urls) in sections {
        if urls.is_empty() {
            continue;
        }
        println!();
        println!("  {label}:");
        for url in urls {
            println!("    {url}");
        }
    }

    if summary.is_clean() {
        println!();
        println!("  All URLs saved.");
    } else if summary.rate_limited + summary.failed > 0 {
        println!();
        println!("  Re-run with --retry-failed to try these again.");
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn fetch_started(&self, total: usize) {
        self.bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
    }

    fn url_finished(&self, url: &str, status: LedgerStatus, current: usize, _total: usize) {
        self.bar.set_position(current as u64);
        self.bar.set_message(format!("{status} {url}"));
    }

    fn done(&self, _summary: &HarvestSummary) {
        self.bar.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("mdharvest").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn positional_urls_and_flags() {
        let cli = parse(&[
            "https://example.com/a",
            "https://example.com/b",
            "-o",
            "/tmp/vault",
            "--no-skip-existing",
            "--concurrency",
            "8",
        ]);
        assert!(cli.command.is_none());
        assert_eq!(cli.harvest.urls.len(), 2);
        assert_eq!(cli.harvest.output_dir, Some(PathBuf::from("/tmp/vault")));
        assert!(cli.harvest.no_skip_existing);
        assert_eq!(cli.harvest.concurrency, Some(8));
    }

    #[test]
    fn csv_requires_column() {
        let result = Cli::try_parse_from(["mdharvest", "--csv", "links.csv"]);
        assert!(result.is_err());

        let cli = parse(&["--csv", "links.csv", "--column", "url"]);
        assert_eq!(cli.harvest.column.as_deref(), Some("url"));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        assert!(Cli::try_parse_from(["mdharvest", "https://example.com", "--concurrency", "0"]).is_err());
    }

    #[test]
    fn config_subcommand() {
        let cli = parse(&["config", "show"]);
        assert!(matches!(
            cli.command,
            Some(Command::Config {
                action: ConfigAction::Show
            })
        ));
    }

    #[test]
    fn flags_override_config_file() {
        let mut config = AppConfig::default();
        config.defaults.output_dir = "/from/config".into();
        config.defaults.concurrency = 2;

        let cli = parse(&[
            "https://example.com/a",
            "-o",
            "/from/flag",
            "--user-agent",
            "custom-agent",
            "--concurrency",
            "6",
        ]);
        let resolved = resolve_harvest_config(&config, &cli.harvest).unwrap();
        assert_eq!(resolved.output_dir, PathBuf::from("/from/flag"));
        assert_eq!(resolved.fetch.user_agent, "custom-agent");
        assert_eq!(resolved.concurrency, 6);
        assert!(resolved.skip_existing);
    }

    #[test]
    fn config_output_dir_is_the_fallback() {
        let mut config = AppConfig::default();
        config.defaults.output_dir = "/from/config".into();

        let cli = parse(&["https://example.com/a"]);
        let mut args = cli.harvest;
        args.output_dir = None;
        let resolved = resolve_harvest_config(&config, &args).unwrap();
        assert_eq!(resolved.output_dir, PathBuf::from("/from/config"));
    }
}
