use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use dirbuster_rs::config::{self, ScanConfig, DEFAULT_PROGRESS_FILE};
use dirbuster_rs::report;
use dirbuster_rs::scanner::Scanner;
use dirbuster_rs::types::{Label, ScanReport, ScanResult};
use dirbuster_rs::wordlist::{self, WordlistError};

/// dirbuster-rs — incremental directory and path brute-forcer.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dirbuster-rs",
    version,
    about = "Incremental directory and path brute-forcer with resumable progress.",
    long_about = None
)]
struct Cli {
    /// Target host or URL (e.g., http://example.com). `http://` is assumed if omitted.
    target: String,

    /// Path to wordlist file (one word per line).
    #[arg(short, long, default_value = "wordlists/common.txt")]
    wordlist: PathBuf,

    /// Number of concurrent workers.
    #[arg(short, long, default_value_t = 10)]
    threads: usize,

    /// Delay after each request, per worker, in seconds.
    #[arg(short, long, default_value_t = 0.0)]
    delay: f64,

    /// Request timeout in seconds.
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Write a report here; `.json` and `.html` select those formats, anything else is text.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Extensions to append to every path (comma separated, e.g. php,bak).
    #[arg(short = 'x', long, value_delimiter = ',')]
    extensions: Vec<String>,

    /// Status codes to report (comma separated).
    #[arg(
        short = 's',
        long = "status-codes",
        default_value = "200,301,302,307,308,401,403",
        value_parser = config::parse_status_codes
    )]
    status_codes: BTreeSet<u16>,

    /// Combination depth: 1 = words, 2 = word/word, 3 = word/word/word.
    #[arg(long, default_value_t = 2)]
    depth: usize,

    /// Skip paths recorded in the progress file and keep it updated.
    #[arg(long, default_value_t = false)]
    resume: bool,

    /// Progress snapshot location.
    #[arg(long = "progress-file", default_value = DEFAULT_PROGRESS_FILE)]
    progress_file: PathBuf,

    /// Save progress after this many tested paths.
    #[arg(long = "save-every", default_value_t = 100)]
    save_every: usize,

    /// Directory of JSON detection templates.
    #[arg(long)]
    templates: Option<PathBuf>,

    /// User-Agent to rotate through (repeatable). Defaults to a built-in list.
    #[arg(short = 'a', long = "user-agent")]
    user_agents: Vec<String>,

    /// Stop after this many generated paths.
    #[arg(long = "max-paths")]
    max_paths: Option<usize>,

    /// Log failed requests and other details.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long = "no-color", default_value_t = false)]
    no_color: bool,
}

impl Cli {
    fn into_config(self) -> Result<ScanConfig> {
        let delay = Duration::try_from_secs_f64(self.delay)
            .with_context(|| format!("invalid delay: {}", self.delay))?;
        let mut config = ScanConfig::new(self.target);
        config.wordlist = self.wordlist;
        config.threads = self.threads;
        config.delay = delay;
        config.timeout = Duration::from_secs(self.timeout);
        config.output = self.output;
        config.extensions = self.extensions;
        config.status_codes = self.status_codes;
        config.depth = self.depth;
        config.resume = self.resume;
        config.progress_file = self.progress_file;
        config.save_every = self.save_every;
        config.templates_dir = self.templates;
        if !self.user_agents.is_empty() {
            config.user_agents = self.user_agents;
        }
        config.max_paths = self.max_paths;
        config.verbose = self.verbose;
        config.no_color = self.no_color;
        Ok(config)
    }
}

/// Log directive used when `RUST_LOG` is not set.
fn default_log_filter(config: &ScanConfig) -> &'static str {
    if config.verbose {
        "dirbuster_rs=debug,warn"
    } else {
        "dirbuster_rs=info,warn"
    }
}

fn init_logging(config: &ScanConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter(config)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!config.no_color)
        .init();
    if config.no_color {
        colored::control::set_override(false);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Cli::parse().into_config()?;
    init_logging(&config);

    let (feed_tx, mut feed_rx) = mpsc::unbounded_channel::<ScanResult>();
    let scanner = Scanner::new(config)?.with_feed(feed_tx);
    print_config(scanner.config());

    let words = match wordlist::load_words_from_path(&scanner.config().wordlist) {
        Ok(words) => words,
        Err(e @ WordlistError::NotFound { .. }) => {
            error!("{e}");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };
    if words.is_empty() {
        warn!("wordlist is empty; nothing to scan");
    }

    let printer = tokio::spawn(async move {
        while let Some(result) = feed_rx.recv().await {
            print_finding(&result);
        }
    });

    // Ctrl-C drains the scan instead of killing the process.
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_ctrlc.cancel();
        }
    });

    info!("starting scan... press Ctrl+C to stop");
    let report = scanner.run_with_cancel(words, cancel).await?;
    let output = scanner.config().output.clone();
    // Dropping the scanner closes the feed so the printer can finish.
    drop(scanner);
    let _ = printer.await;

    print_summary(&report);

    if let Some(path) = output.as_deref() {
        match report::write_report(path, &report) {
            Ok(()) => info!(path = %path.display(), "report saved"),
            Err(e) => error!("{e:#}"),
        }
    }

    Ok(())
}

fn print_config(config: &ScanConfig) {
    println!("dirbuster-rs configuration:");
    println!("  target       : {}", config.target);
    println!("  wordlist     : {}", config.wordlist.display());
    println!("  threads      : {}", config.threads);
    println!("  delay        : {:.3}s", config.delay.as_secs_f64());
    println!("  timeout      : {}s", config.timeout.as_secs());
    println!("  depth        : {}", config.depth);
    println!(
        "  extensions   : {}",
        if config.extensions.is_empty() {
            "<none>".to_string()
        } else {
            config.extensions.join(",")
        }
    );
    println!(
        "  status codes : {}",
        config
            .status_codes
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(",")
    );
    println!(
        "  output       : {}",
        config
            .output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<none>".to_string())
    );
    println!(
        "  resume       : {}",
        if config.resume {
            config.progress_file.display().to_string()
        } else {
            "off".to_string()
        }
    );
    println!();
}

fn print_finding(result: &ScanResult) {
    let line = format!("[{}] {}", result.status, result.url);
    let line = match result.label {
        Label::Found => line.green(),
        Label::Redirect => line.blue(),
        Label::Forbidden => line.yellow(),
        Label::Unauthorized => line.magenta(),
        Label::Other => line.cyan(),
        Label::Template => line.red().bold(),
    };
    match &result.matched_template {
        Some(id) => println!("{line} ({} bytes, template: {id})", result.content_length),
        None => println!("{line} ({} bytes)", result.content_length),
    }
}

fn print_summary(report: &ScanReport) {
    println!();
    if report.interrupted {
        println!("{}", "Scan interrupted by user.".red());
    }
    println!(
        "Scan completed. Found {} paths ({} tested in {:.2}s).",
        report.found_count(),
        report.tested_count,
        report.duration_secs()
    );
}
