//! CLI binary for edgequake-pdf2txt.
//!
//! A thin shim over the library crate that maps CLI flags, environment
//! variables and the optional JSON config file to `ExtractionConfig`, runs
//! the batch and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2txt::{
    inspect_all, BatchReport, ChunkMarker, ExtractionConfig, ExtractionProgressCallback,
    Extractor, FileConfig, PageRange, ProgressCallback, ResponseFormat,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::warn;
use tracing_subscriber::EnvFilter;

const DEFAULT_OUTPUT_DIR: &str = "output";

// ── ANSI colour helpers ──────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────

/// One bar for the whole run. Its length grows as documents are opened, so
/// it stays correct while several documents are in flight.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<(String, PageRange), Instant>>,
    errors: AtomicUsize,
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} chunks  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed(&self, document: &str, range: PageRange) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&(document.to_string(), range)))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
        let errors = self.errors.load(Ordering::SeqCst);
        if errors > 0 {
            eprintln!(
                "{} {} chunk(s) failed and are marked in the output",
                cyan("⚠"),
                errors
            );
        }
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_document_start(&self, document: &str, total_chunks: usize) {
        self.bar.inc_length(total_chunks as u64);
        self.bar.println(format!(
            "{} {}  {}",
            cyan("◆"),
            bold(document),
            dim(&format!("{total_chunks} chunks"))
        ));
    }

    fn on_chunk_start(&self, document: &str, range: PageRange) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert((document.to_string(), range), Instant::now());
        }
        self.bar.set_message(format!("{document} pages {range}"));
    }

    fn on_chunk_complete(&self, document: &str, range: PageRange, text_len: usize) {
        let secs = self.elapsed(document, range);
        self.bar.println(format!(
            "  {} {}  pages {:<9} {:<12} {}",
            green("✓"),
            document,
            range.to_string(),
            dim(&format!("{text_len:>6} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_chunk_error(&self, document: &str, range: PageRange, error: &str) {
        let secs = self.elapsed(document, range);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {}  pages {:<9} {}  {}",
            red("✗"),
            document,
            range.to_string(),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_complete(&self, document: &str, total_chunks: usize, succeeded: usize) {
        let failed = total_chunks.saturating_sub(succeeded);
        let mark = if failed == 0 { green("✔") } else { cyan("⚠") };
        self.bar.println(format!(
            "{mark} {}  {succeeded}/{total_chunks} chunks",
            bold(document)
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One PDF, written to output/report.txt
  pdf2txt report.pdf

  # Every PDF of a directory into ./texts
  pdf2txt scans/ -o texts

  # Smaller chunks, fewer parallel calls
  pdf2txt --chunk-size 2 --concurrency 3 book.pdf

  # Plain markdown instead of structured JSON responses
  pdf2txt --format markdown paper.pdf

  # Another provider via edgequake-llm
  pdf2txt --provider openai --model gpt-4.1-mini paper.pdf

  # Show the chunk plan only (no API key needed)
  pdf2txt --plan-only book.pdf

CONFIG FILE (--config / PDF2TXT_CONFIG):
  {
    "api_key": "...",
    "model": "gemini-2.5-flash",
    "chunk_size": 3,
    "concurrency": 5,
    "output_dir": "output"
  }
  Precedence: command-line flag > environment variable > config file > default.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY      Google Gemini API key
  PDF2TXT_CONFIG      Path to a JSON config file
  PDF2TXT_PROVIDER    Backend: gemini (default), openai, anthropic, ollama, ...
  PDF2TXT_MODEL       Model ID
  RUST_LOG            Log filter (e.g. edgequake_pdf2txt=debug)
"#;

/// Extract text from PDF documents, a few pages at a time, with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2txt",
    version,
    about = "Extract text from PDF files by transcribing small page chunks with an LLM",
    long_about = "Split each PDF into small page chunks, have a language model transcribe \
every chunk in parallel, and write the reassembled text to <output-dir>/<name>.txt. \
Failed chunks are marked in place and never abort the run.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// A PDF file, or a directory whose *.pdf files are processed (non-recursive).
    input: PathBuf,

    /// Directory for the .txt outputs [default: output].
    #[arg(short, long, env = "PDF2TXT_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// JSON config file with defaults for any of these options.
    #[arg(long, env = "PDF2TXT_CONFIG")]
    config: Option<PathBuf>,

    /// Backend: gemini, openai, anthropic, ollama, ...
    #[arg(long, env = "PDF2TXT_PROVIDER")]
    provider: Option<String>,

    /// Model ID [default: gemini-2.5-flash for Gemini].
    #[arg(long, env = "PDF2TXT_MODEL")]
    model: Option<String>,

    /// Pages per chunk [default: 3].
    #[arg(long, env = "PDF2TXT_CHUNK_SIZE",
          value_parser = clap::value_parser!(u64).range(1..))]
    chunk_size: Option<u64>,

    /// Concurrent backend calls across the whole run [default: 5].
    #[arg(short, long, env = "PDF2TXT_CONCURRENCY",
          value_parser = clap::value_parser!(u64).range(1..))]
    concurrency: Option<u64>,

    /// Documents processed at the same time [default: 4].
    #[arg(long, env = "PDF2TXT_DOCUMENTS",
          value_parser = clap::value_parser!(u64).range(1..))]
    documents: Option<u64>,

    /// Retries per chunk after the first attempt [default: 4].
    #[arg(long, env = "PDF2TXT_MAX_RETRIES")]
    max_retries: Option<u32>,

    /// Per-call timeout in seconds [default: 120].
    #[arg(long, env = "PDF2TXT_API_TIMEOUT",
          value_parser = clap::value_parser!(u64).range(1..))]
    api_timeout: Option<u64>,

    /// Sampling temperature, 0.0–2.0 [default: 0.1].
    #[arg(long, env = "PDF2TXT_TEMPERATURE")]
    temperature: Option<f32>,

    /// What the model is asked to return.
    #[arg(long, env = "PDF2TXT_FORMAT", value_enum)]
    format: Option<FormatArg>,

    /// Marker written before each chunk in the output.
    #[arg(long, env = "PDF2TXT_MARKER", value_enum)]
    marker: Option<MarkerArg>,

    /// Path to a text file containing a custom prompt.
    #[arg(long, env = "PDF2TXT_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Print page counts and chunk plans only; no API calls.
    #[arg(long)]
    plan_only: bool,

    /// Print the run report (or plan) as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "PDF2TXT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Structured,
    Markdown,
}

impl From<FormatArg> for ResponseFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Structured => ResponseFormat::Structured,
            FormatArg::Markdown => ResponseFormat::Markdown,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum MarkerArg {
    None,
    Comment,
    Heading,
}

impl From<MarkerArg> for ChunkMarker {
    fn from(v: MarkerArg) -> Self {
        match v {
            MarkerArg::None => ChunkMarker::None,
            MarkerArg::Comment => ChunkMarker::Comment,
            MarkerArg::Heading => ChunkMarker::Heading,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives all the feedback that matters, so library INFO
    // logs are silenced while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.plan_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let file = match cli.config {
        Some(ref path) => FileConfig::load(path).context("Failed to load config file")?,
        None => FileConfig::default(),
    };
    let output_dir = cli
        .output_dir
        .clone()
        .or_else(|| file.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    // ── Plan-only mode ───────────────────────────────────────────────────
    if cli.plan_only {
        let chunk_size = cli
            .chunk_size
            .map(|n| n as usize)
            .or(file.chunk_size)
            .unwrap_or(edgequake_pdf2txt::plan::DEFAULT_CHUNK_SIZE);
        if print_plans(&cli, chunk_size).await? > 0 {
            std::process::exit(1);
        }
        return Ok(());
    }

    // ── Build config and extractor ───────────────────────────────────────
    let progress = if show_progress {
        Some(CliProgressCallback::new())
    } else {
        None
    };
    let config = build_config(
        &cli,
        &file,
        progress.clone().map(|p| p as ProgressCallback),
    )
    .await?;
    let extractor = Extractor::new(config).context("Failed to set up the transcription backend")?;

    let cancel = extractor.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing with what has completed");
            eprintln!("{} interrupted, cancelling outstanding chunks…", cyan("⚠"));
            cancel.cancel();
        }
    });

    // ── Run ──────────────────────────────────────────────────────────────
    let report = extractor
        .run(&cli.input, &output_dir)
        .await
        .context("Extraction failed")?;
    if let Some(ref p) = progress {
        p.finish();
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        print_summary(&report);
    }

    if extractor.cancellation().is_cancelled() {
        std::process::exit(130);
    }
    if report.failed_documents() > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Map CLI args (and environment, via clap) plus the config file to
/// `ExtractionConfig`.
async fn build_config(
    cli: &Cli,
    file: &FileConfig,
    progress: Option<ProgressCallback>,
) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder();
    let mut overridden: Vec<&str> = Vec::new();

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(n) = cli.chunk_size {
        builder = builder.chunk_size(n as usize);
        overridden.push("chunk_size");
    }
    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n as usize);
        overridden.push("concurrency");
    }
    if let Some(n) = cli.documents {
        builder = builder.document_concurrency(n as usize);
        overridden.push("document_concurrency");
    }
    if let Some(n) = cli.max_retries {
        builder = builder.max_retries(n);
        overridden.push("max_retries");
    }
    if let Some(secs) = cli.api_timeout {
        builder = builder.api_timeout_secs(secs);
        overridden.push("api_timeout_secs");
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
        overridden.push("temperature");
    }
    if let Some(f) = cli.format {
        builder = builder.response_format(f.into());
        overridden.push("response_format");
    }
    if let Some(m) = cli.marker {
        builder = builder.chunk_marker(m.into());
        overridden.push("chunk_marker");
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder
        .apply_file(file, &overridden)
        .build()
        .context("Invalid configuration")
}

/// Print the plan of every input. Returns the number that could not be read.
async fn print_plans(cli: &Cli, chunk_size: usize) -> Result<usize> {
    let reports = inspect_all(&cli.input, chunk_size)
        .await
        .context("Failed to resolve input")?;
    let failed = reports.iter().filter(|r| r.error.is_some()).count();

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("Failed to serialise plan")?
        );
        return Ok(failed);
    }

    for report in &reports {
        println!("File:         {}", report.input.display());
        match (&report.info, &report.error) {
            (Some(info), _) => {
                println!("Pages:        {}", info.page_count);
                println!("PDF Version:  {}", info.pdf_version);
                let chunks: Vec<String> = info.chunks.iter().map(|r| r.to_string()).collect();
                println!("Chunks:       {} [{}]", chunks.len(), chunks.join(", "));
            }
            (None, Some(err)) => println!("Error:        {}", red(err)),
            (None, None) => {}
        }
        println!();
    }
    Ok(failed)
}

fn print_summary(report: &BatchReport) {
    for doc in &report.documents {
        match (&doc.stats, &doc.error) {
            (Some(stats), None) => {
                let mark = if stats.failed_chunks == 0 {
                    green("✔")
                } else {
                    cyan("⚠")
                };
                let target = doc
                    .output
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                eprintln!(
                    "{}  {}/{} chunks  {} pages  {}ms  →  {}",
                    mark,
                    stats.succeeded_chunks,
                    stats.total_chunks,
                    stats.total_pages,
                    stats.total_duration_ms,
                    bold(&target),
                );
                eprintln!(
                    "   {} tokens in  /  {} tokens out",
                    dim(&stats.total_input_tokens.to_string()),
                    dim(&stats.total_output_tokens.to_string()),
                );
            }
            (_, Some(err)) => {
                eprintln!("{}  {}  {}", red("✘"), doc.input.display(), red(err));
            }
            (None, None) => {}
        }
    }

    let total = report.documents.len();
    let failed = report.failed_documents();
    let partial = report.partial_documents();
    if total == 0 {
        eprintln!("{} no PDF files found", cyan("⚠"));
    } else if failed == 0 && partial == 0 {
        eprintln!("{} {} document(s) extracted", green("✔"), bold(&total.to_string()));
    } else {
        eprintln!(
            "{} {}/{} document(s) extracted  ({} failed, {} with failed chunks)",
            if failed == total { red("✘") } else { cyan("⚠") },
            bold(&(total - failed).to_string()),
            total,
            red(&failed.to_string()),
            partial,
        );
    }
}
