//! CLI binary for docscan-ocr.
//!
//! A thin shim over the library crate: maps flags to `PipelineConfig`, picks
//! the OCR backend, and either serves the HTTP API or converts one file.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use docscan_ocr::{
    api, ConversionProgressCallback, GoogleVisionDetector, OverlayNaming, Pipeline,
    PipelineConfig, ProgressCallback, TextDetector, VisionConfig, VisionLlmDetector,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per page.
/// Ctrl-C flips `cancelled`, which stops the run before the next page.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    cancelled: AtomicBool,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Rasterising…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            cancelled: AtomicBool::new(false),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Recognising");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.bar.println(format!("  {} cancelling after the current page…", cyan("⚠")));
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Running OCR on {total_pages} page(s)…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_len: usize) {
        let secs = self.elapsed_secs(page_num);
        let detail = if text_len == 0 {
            "no text".to_string()
        } else {
            format!("{text_len:>5} chars")
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&detail),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(page_num);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.abandon();
    }

    fn on_conversion_complete(&self, total_pages: usize, text_pages: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} text found on {}/{} page(s)",
            green("✔"),
            bold(&text_pages.to_string()),
            total_pages
        );
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # OCR a scan with Google Cloud Vision, write word_documents/scan.docx
  docscan convert scan.pdf

  # Same, with a vision LLM instead
  docscan convert --backend llm --llm-provider openai --model gpt-4.1-mini photo.jpg

  # Regenerate the plain-text file for a stored upload
  docscan reconvert scan.pdf

  # Run the HTTP server
  docscan serve --port 5000

ENVIRONMENT VARIABLES:
  GOOGLE_VISION_API_KEY      Cloud Vision API key
  GOOGLE_CLOUD_ACCESS_TOKEN  OAuth access token (alternative to the API key)
  GOOGLE_VISION_ENDPOINT     Override the Vision endpoint (proxies, emulators)
  EDGEQUAKE_LLM_PROVIDER     LLM backend provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL            LLM backend model ID
  OPENAI_API_KEY, …          Provider API keys for the LLM backend
  PDFIUM_LIB_PATH            Directory containing libpdfium
  DOCSCAN_MAX_UPLOAD_MB      Upload size limit for `serve` (default 100)
"#;

/// OCR scanned PDFs and images into Word documents and text.
#[derive(Parser, Debug)]
#[command(
    name = "docscan",
    version,
    about = "OCR scanned PDFs and images into Word documents and text",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server.
    Serve {
        /// Address to bind.
        #[arg(long, env = "DOCSCAN_HOST", default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on.
        #[arg(long, env = "DOCSCAN_PORT", default_value_t = 5000)]
        port: u16,
    },

    /// Store a file, OCR it and export the .docx artifact.
    Convert {
        /// PDF, JPEG or PNG file.
        file: PathBuf,

        /// Print the result as JSON instead of page text.
        #[arg(long, env = "DOCSCAN_JSON")]
        json: bool,

        /// Disable the progress bar.
        #[arg(long, env = "DOCSCAN_NO_PROGRESS")]
        no_progress: bool,
    },

    /// Re-run OCR on a stored upload and export the plain-text artifact.
    Reconvert {
        /// Name of the file in the upload directory.
        stored_name: String,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// OCR backend.
    #[arg(long, global = true, env = "DOCSCAN_BACKEND", value_enum, default_value = "vision")]
    backend: BackendArg,

    /// Cloud Vision API key.
    #[arg(long, global = true, env = "GOOGLE_VISION_API_KEY", hide_env_values = true)]
    vision_api_key: Option<String>,

    /// Cloud Vision OAuth access token.
    #[arg(long, global = true, env = "GOOGLE_CLOUD_ACCESS_TOKEN", hide_env_values = true)]
    vision_access_token: Option<String>,

    /// Cloud Vision endpoint base URL.
    #[arg(long, global = true, env = "GOOGLE_VISION_ENDPOINT")]
    vision_endpoint: Option<String>,

    /// LLM provider for the llm backend: openai, anthropic, gemini, ollama, …
    #[arg(long, global = true, env = "EDGEQUAKE_LLM_PROVIDER")]
    llm_provider: Option<String>,

    /// LLM model ID for the llm backend.
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Rendering DPI for PDF pages (36–600).
    #[arg(long, global = true, env = "DOCSCAN_DPI", default_value_t = 72,
          value_parser = clap::value_parser!(u32).range(36..=600))]
    dpi: u32,

    /// Per-page OCR timeout in seconds.
    #[arg(long, global = true, env = "DOCSCAN_OCR_TIMEOUT", default_value_t = 60)]
    ocr_timeout: u64,

    /// OCR calls in flight at once (results stay in page order).
    #[arg(short, long, global = true, env = "DOCSCAN_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Overlay file naming: `pdf` writes `{name}_text.pdf`, `txt` writes `{name}_text.txt`.
    #[arg(long, global = true, env = "DOCSCAN_OVERLAY_NAMING", value_enum, default_value = "pdf")]
    overlay_naming: OverlayNamingArg,

    /// Directory containing libpdfium.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, global = true, env = "DOCSCAN_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Directory for uploads and overlay files.
    #[arg(long, global = true, env = "DOCSCAN_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Directory for .docx files.
    #[arg(long, global = true, env = "DOCSCAN_EXPORT_DIR", default_value = "word_documents")]
    export_dir: PathBuf,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCSCAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCSCAN_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum BackendArg {
    Vision,
    Llm,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OverlayNamingArg {
    Pdf,
    Txt,
}

impl From<OverlayNamingArg> for OverlayNaming {
    fn from(v: OverlayNamingArg) -> Self {
        match v {
            OverlayNamingArg::Pdf => OverlayNaming::PdfSuffix,
            OverlayNamingArg::Txt => OverlayNaming::PlainText,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let common = &cli.common;

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = match &cli.command {
        Command::Convert {
            json, no_progress, ..
        } => !common.quiet && !no_progress && !json,
        _ => false,
    };
    let filter = if common.verbose {
        "debug"
    } else if common.quiet || show_progress {
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

    let detector = build_detector(common)?;

    match &cli.command {
        Command::Serve { host, port } => {
            let pipeline = build_pipeline(common, None, detector)?;
            api::serve(host, *port, Arc::new(pipeline))
                .await
                .context("Server failed")?;
        }

        Command::Convert { file, json, .. } => {
            let progress = show_progress.then(CliProgressCallback::new_dynamic);
            if let Some(cb) = progress.clone() {
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        cb.cancel();
                    }
                });
            }
            let callback = progress.map(|cb| cb as ProgressCallback);
            let pipeline = build_pipeline(common, callback, detector)?;

            let filename = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .with_context(|| format!("{} is not a file path", file.display()))?;
            let bytes = tokio::fs::read(file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let output = pipeline
                .upload(&filename, bytes)
                .await
                .context("Conversion failed")?;

            if *json {
                let json =
                    serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
                println!("{json}");
            } else {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                for page in output.detected_texts.iter() {
                    writeln!(handle, "Page {}:\n{}\n", page.page, page.text)
                        .context("Failed to write to stdout")?;
                }
            }

            if !common.quiet && !*json {
                eprintln!(
                    "{}  {}/{} pages with text  {}ms  →  {}",
                    green("✔"),
                    output.stats.text_pages,
                    output.stats.total_pages,
                    output.stats.total_duration_ms,
                    bold(&output.artifact.path.display().to_string()),
                );
            }
        }

        Command::Reconvert { stored_name } => {
            let pipeline = build_pipeline(common, None, detector)?;
            let artifact = pipeline
                .reconvert(stored_name)
                .await
                .with_context(|| format!("Failed to reconvert '{}'", stored_name))?;
            if !common.quiet {
                eprintln!("{}  →  {}", green("✔"), bold(&artifact.path.display().to_string()));
            }
            println!("{}", artifact.path.display());
        }
    }

    Ok(())
}

/// Pick the OCR backend from the flags.
fn build_detector(common: &CommonArgs) -> Result<Arc<dyn TextDetector>> {
    match common.backend {
        BackendArg::Vision => {
            let config = if let Some(ref key) = common.vision_api_key {
                VisionConfig::with_api_key(key)
            } else if let Some(ref token) = common.vision_access_token {
                VisionConfig::with_access_token(token)
            } else {
                bail!(
                    "The vision backend needs credentials: set GOOGLE_VISION_API_KEY \
                     (or --vision-api-key) or GOOGLE_CLOUD_ACCESS_TOKEN"
                );
            };
            let config = match common.vision_endpoint {
                Some(ref endpoint) => config.endpoint(endpoint),
                None => config,
            }
            .timeout_secs(common.ocr_timeout);

            let detector =
                GoogleVisionDetector::new(config).context("Failed to create Vision client")?;
            Ok(Arc::new(detector))
        }
        BackendArg::Llm => {
            let detector = match common.llm_provider {
                Some(ref name) => {
                    VisionLlmDetector::from_provider_name(name, common.model.as_deref())
                }
                None => VisionLlmDetector::from_env(),
            }
            .context("Failed to configure the LLM backend")?;
            Ok(Arc::new(detector))
        }
    }
}

/// Map CLI args to a `Pipeline`.
fn build_pipeline(
    common: &CommonArgs,
    progress: Option<ProgressCallback>,
    detector: Arc<dyn TextDetector>,
) -> Result<Pipeline> {
    let mut builder = PipelineConfig::builder()
        .upload_dir(&common.upload_dir)
        .export_dir(&common.export_dir)
        .dpi(common.dpi)
        .ocr_timeout_secs(common.ocr_timeout)
        .concurrency(common.concurrency)
        .overlay_naming(common.overlay_naming.into());

    if let Some(ref dir) = common.pdfium_lib {
        builder = builder.pdfium_library_path(dir);
    }
    if let Some(ref pwd) = common.password {
        builder = builder.password(pwd);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    let config = builder.build().context("Invalid configuration")?;
    Pipeline::new(config, detector).context("Failed to initialise storage")
}
