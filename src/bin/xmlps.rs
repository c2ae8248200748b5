//! CLI binary for xmlps-client.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ServiceConfig`, runs one mode over the tracked files and prints the
//! report.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use xmlps_client::config::{
    DEFAULT_CITATION_STYLE_HASH, DEFAULT_OUTPUT_FORMAT, DEFAULT_SERVICE_URL, DEFAULT_STORE_PATH,
    DEFAULT_TIMEOUT_SECS, DEFAULT_WAIT_SECS,
};
use xmlps_client::report;
use xmlps_client::{
    run, BatchProgressCallback, BatchSummary, ConversionService, FileRecord,
    FileSetStore, HttpService, JsonFileStore, Mode, Phase, ProgressCallback, RecordError,
    ServiceConfig, ServiceOutcome, StepOutcome,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI report callback ──────────────────────────────────────────────────────

/// Prints the running report to stdout and, unless disabled, keeps a spinner
/// on stderr naming the file currently being worked on.
struct CliReporter {
    bar: Option<ProgressBar>,
}

impl CliReporter {
    fn new(show_spinner: bool) -> Arc<Self> {
        let bar = show_spinner.then(|| {
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.cyan} {prefix:.bold}  [{bar:30.green/238}] {pos}/{len}  {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  ")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
            );
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        Arc::new(Self { bar })
    }

    /// Write to stdout without tearing the spinner.
    fn emit(&self, write: impl FnOnce(&mut io::StdoutLock<'_>) -> io::Result<()>) {
        let print = || {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            write(&mut handle).ok();
        };
        match &self.bar {
            Some(bar) => bar.suspend(print),
            None => print(),
        }
    }
}

impl BatchProgressCallback for CliReporter {
    fn on_batch_start(&self, _total_records: usize) {
        self.emit(|w| report::write_header(w));
    }

    fn on_phase_start(&self, phase: Phase, total_records: usize) {
        self.emit(|w| report::write_phase_title(w, phase));
        if let Some(bar) = &self.bar {
            bar.set_length(total_records as u64);
            bar.set_position(0);
            bar.set_prefix(match phase {
                Phase::Submit => "Submitting",
                Phase::Retrieve => "Retrieving",
            });
        }
    }

    fn on_record_start(&self, _phase: Phase, record: &FileRecord) {
        if let Some(bar) = &self.bar {
            bar.set_message(record.filename.clone());
        }
    }

    fn on_record_complete(&self, phase: Phase, record: &FileRecord, outcome: &StepOutcome) {
        if let Some(line) = report::step_line(phase, record, outcome) {
            let line = match outcome {
                StepOutcome::Rejected(_) => red(&line),
                _ => line,
            };
            self.emit(|w| {
                use std::io::Write;
                writeln!(w, "{line}")
            });
        }
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    fn on_record_error(&self, _phase: Phase, record: &FileRecord, error: &RecordError) {
        let line = red(&report::error_line(record, error));
        self.emit(|w| {
            use std::io::Write;
            writeln!(w, "{line}")
        });
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    fn on_wait(&self, wait: Duration) {
        self.emit(|w| report::write_blank(w));
        if let Some(bar) = &self.bar {
            bar.set_prefix("Waiting");
            bar.set_message(format!("{}s for the service to convert", wait.as_secs()));
        }
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
        let failures = summary.failed + summary.rejected;
        eprintln!(
            "{} {} submitted, {} retrieved, {} not ready{}",
            if failures == 0 { green("✔") } else { red("✘") },
            bold(&summary.submitted.to_string()),
            bold(&summary.retrieved.to_string()),
            summary.not_ready,
            if failures == 0 {
                String::new()
            } else {
                format!(", {}", red(&format!("{failures} failed")))
            },
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Submit every .doc/.docx/.odt/.pdf under ./data
  xmlps submit

  # Submit one file
  xmlps submit data/1017687ar/Input.doc

  # Fetch JATS XML for every completed job
  xmlps retrieve

  # Submit, wait two minutes, retrieve EPUBs
  xmlps --format epub parse path/to/my/data --wait 120

  # Show what is tracked without calling the service
  xmlps status

OUTPUT FORMATS:
  xml   JATS (NLM3) XML   .nlm3.xml   (default)
  zip   all files         .zip
  epub  EPUB              .epub
  html  HTML + assets     .html.zip
  docx  Word document     .docx
  ref   references        .bib.xml
  bib   BibTeX            .bib
  ner   named entities    .ner.json
  xmp   XMP metadata      .xmp.pdf

ENVIRONMENT VARIABLES:
  XMLPS_SERVICE_URL       Service base URL
  XMLPS_USER_EMAIL        Account e-mail
  XMLPS_USER_PASSWORD     Account password
  XMLPS_CITATION_STYLE    Citation style hash (see `xmlps citation-styles`)
  XMLPS_OUTPUT_FORMAT     Output format key
  XMLPS_STORE             Path of the tracked-files store
"#;

/// Submit documents to the PKP XML Parsing Service and retrieve the results.
#[derive(Parser, Debug)]
#[command(
    name = "xmlps",
    version,
    about = "Calls the PKP XML Parsing Service API",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Service base URL.
    #[arg(long, global = true, env = "XMLPS_SERVICE_URL", default_value = DEFAULT_SERVICE_URL)]
    service_url: String,

    /// Account e-mail.
    #[arg(long, global = true, env = "XMLPS_USER_EMAIL", default_value = "")]
    email: String,

    /// Account password.
    #[arg(long, global = true, env = "XMLPS_USER_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    /// Citation style hash applied to newly tracked files.
    #[arg(long, global = true, env = "XMLPS_CITATION_STYLE", default_value = DEFAULT_CITATION_STYLE_HASH)]
    citation_style: String,

    /// Output format to retrieve: xml, zip, epub, html, docx, ref, bib, ner, xmp.
    #[arg(short, long, global = true, env = "XMLPS_OUTPUT_FORMAT", default_value = DEFAULT_OUTPUT_FORMAT)]
    format: String,

    /// File that remembers submitted jobs between runs.
    #[arg(long, global = true, env = "XMLPS_STORE", default_value = DEFAULT_STORE_PATH)]
    store: PathBuf,

    /// Per-request timeout in seconds.
    #[arg(long, global = true, env = "XMLPS_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Disable the progress spinner.
    #[arg(long, global = true, env = "XMLPS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "XMLPS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "XMLPS_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit the given local file(s) to the service.
    Submit(PathArg),
    /// Retrieve converted output for submitted file(s).
    Retrieve(PathArg),
    /// Submit file(s), wait, then retrieve the output(s).
    Parse {
        #[command(flatten)]
        path: PathArg,

        /// Seconds to wait between submitting and retrieving.
        #[arg(short, long, env = "XMLPS_WAIT", default_value_t = DEFAULT_WAIT_SECS)]
        wait: u64,
    },
    /// Print the report for tracked files without calling the service.
    Status,
    /// List the citation styles the service supports.
    CitationStyles,
}

#[derive(Args, Debug)]
struct PathArg {
    /// A file, or a directory scanned recursively for .pdf, .doc, .docx and .odt files.
    #[arg(default_value = "data")]
    path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = default_filter(cli.verbose, cli.quiet, cli.no_progress);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let reporter: Option<ProgressCallback> = if cli.quiet {
        None
    } else {
        let show_spinner = !cli.no_progress && !cli.verbose;
        Some(CliReporter::new(show_spinner) as Arc<dyn BatchProgressCallback>)
    };
    let wait = match &cli.command {
        Command::Parse { wait, .. } => *wait,
        _ => DEFAULT_WAIT_SECS,
    };
    let config = build_config(&cli, wait, reporter)?;
    let store = JsonFileStore::new(&cli.store);

    let (path, mode) = match &cli.command {
        Command::Submit(p) => (&p.path, Mode::Submit),
        Command::Retrieve(p) => (&p.path, Mode::Retrieve),
        Command::Parse { path, .. } => (&path.path, Mode::Parse { wait: config.wait() }),
        Command::Status => return print_status(&store),
        Command::CitationStyles => return print_citation_styles(&config).await,
    };

    // ── Run ──────────────────────────────────────────────────────────────
    let service = HttpService::new(&config).context("Failed to set up the service client")?;
    let out = run(&store, path, mode, &service, &config)
        .await
        .with_context(|| format!("Failed to update tracked files in {}", cli.store.display()))?;

    if out.summary.is_none() {
        if !cli.quiet {
            println!("No compatible files with : {}", path.display());
        }
        return Ok(());
    }

    if !cli.quiet {
        report::write_final_report(&mut io::stdout().lock(), &out.files)
            .context("Failed to write to stdout")?;
    }

    Ok(())
}

/// Log filter used when `RUST_LOG` is unset.
///
/// The spinner and the running report say what happened to each file, so
/// only errors get through while the spinner is drawn.
fn default_filter(verbose: bool, quiet: bool, no_progress: bool) -> &'static str {
    let show_progress = !quiet && !no_progress;
    if verbose {
        "debug"
    } else if quiet || show_progress {
        "error"
    } else {
        "warn"
    }
}

/// Map CLI args to `ServiceConfig`.
fn build_config(cli: &Cli, wait: u64, reporter: Option<ProgressCallback>) -> Result<ServiceConfig> {
    let needs_credentials = !matches!(cli.command, Command::Status | Command::CitationStyles);
    if needs_credentials && (cli.email.is_empty() || cli.password.is_empty()) {
        tracing::warn!("No credentials set; use --email/--password or XMLPS_USER_EMAIL/XMLPS_USER_PASSWORD");
    }

    let mut builder = ServiceConfig::builder()
        .service_url(&cli.service_url)
        .credentials(&cli.email, &cli.password)
        .citation_style_hash(&cli.citation_style)
        .output_format(&cli.format)
        .timeout_secs(cli.timeout)
        .wait_secs(wait);

    if let Some(cb) = reporter {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_status(store: &JsonFileStore) -> Result<()> {
    let files = store.load().context("Failed to load tracked files")?;
    if files.is_empty() {
        println!("No tracked files in {}", store.path().display());
        return Ok(());
    }
    report::write_final_report(&mut io::stdout().lock(), &files)
        .context("Failed to write to stdout")
}

async fn print_citation_styles(config: &ServiceConfig) -> Result<()> {
    let service = HttpService::new(config).context("Failed to set up the service client")?;
    match service
        .citation_styles()
        .await
        .context("Failed to list citation styles")?
    {
        ServiceOutcome::Accepted(styles) => {
            for style in styles {
                let marker = if style.hash == config.citation_style_hash { "*" } else { " " };
                println!("{marker} {}  {}", style.hash, style.title);
            }
            Ok(())
        }
        ServiceOutcome::NotReady => anyhow::bail!("Citation style list is not available yet"),
        ServiceOutcome::Rejected { messages } => {
            anyhow::bail!("Service refused to list citation styles: {}", messages.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinner_lowers_log_filter_to_error() {
        assert_eq!(default_filter(false, false, false), "error");
        assert_eq!(default_filter(false, true, false), "error");
        assert_eq!(default_filter(false, false, true), "warn");
        assert_eq!(default_filter(true, false, false), "debug");
    }
}
