//! CLI binary for edgequake-pdf2audio.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2audio::{
    convert, inspect_with_password, list_voices, PipelineConfig, PipelineProgressCallback,
    ProgressCallback, SpeechBackendKind, Stage, SummaryFailurePolicy, VoiceSelection,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a spinner for the single-shot stages and a counted bar
/// while chunks are summarized. Chunks may complete out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(spinner_style());
        bar.set_prefix("Preparing");
        bar.set_message("Checking credentials…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} chunks  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(style);
        self.bar.set_prefix("Summarizing");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, chunk: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&chunk)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICKS)
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        if stage != Stage::Summarize {
            self.bar.set_style(spinner_style());
            self.bar.set_prefix(stage.to_string());
            self.bar.set_message("");
        }
    }

    fn on_stage_complete(&self, stage: Stage) {
        match stage {
            Stage::Summarize => {
                let failed = self.errors.load(Ordering::SeqCst);
                let total = self.bar.length().unwrap_or(0) as usize;
                if failed == 0 {
                    self.bar.println(format!(
                        "{} {} chunks summarized",
                        green("✔"),
                        bold(&total.to_string())
                    ));
                } else {
                    self.bar.println(format!(
                        "{} {}/{} chunks summarized  ({} placeholders)",
                        cyan("⚠"),
                        bold(&total.saturating_sub(failed).to_string()),
                        total,
                        red(&failed.to_string()),
                    ));
                }
            }
            Stage::Package => self.bar.finish_and_clear(),
            _ => {}
        }
    }

    fn on_chunks_ready(&self, total_chunks: usize) {
        self.activate_bar(total_chunks);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Summarizing {total_chunks} chunks…"))
        ));
    }

    fn on_chunk_start(&self, chunk: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(chunk, Instant::now());
        self.bar.set_message(format!("chunk {}", chunk + 1));
    }

    fn on_chunk_complete(&self, chunk: usize, total: usize, summary_len: usize) {
        let secs = self.elapsed_secs(chunk);
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            chunk + 1,
            total,
            dim(&format!("{summary_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_chunk_error(&self, chunk: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(chunk);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {}  {}",
            red("✗"),
            chunk + 1,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Narrate a paper (writes paper.mp3, paper_summary.txt, paper_timestamps.txt, paper.zip)
  pdf2audio paper.pdf

  # Choose the output name
  pdf2audio paper.pdf -o out/attention.mp3

  # Narrate from a URL
  pdf2audio https://arxiv.org/pdf/1706.03762 -o attention.mp3

  # Offline speech with a specific espeak-ng voice
  pdf2audio --tts local --list-voices
  pdf2audio --tts local --voice en-us --rate 170 paper.pdf

  # Summaries from another provider (reads OPENAI_API_KEY)
  pdf2audio --provider openai --model gpt-4.1-mini paper.pdf

  # Fail instead of inserting placeholders
  pdf2audio --on-chunk-failure abort paper.pdf

  # Inspect PDF metadata (no API key needed)
  pdf2audio --inspect-only paper.pdf

  # JSON run report
  pdf2audio --json paper.pdf > run.json

ENVIRONMENT VARIABLES:
  GOOGLE_API_KEY          Gemini API key (same as --api-key)
  OPENAI_API_KEY, ...     Read by --provider backends
  PDF2AUDIO_*             Every other flag, e.g. PDF2AUDIO_TTS=local
  RUST_LOG                Override log filtering

OUTPUT FILES:
  <name>.mp3 | <name>.wav   narrated summary (network | local speech)
  <name>_summary.txt        transcript of the narration
  <name>_timestamps.txt     approximate "Section N: X.XXs" markers
  <name>.zip                all of the above
"#;

/// Turn PDF documents into narrated audio summaries.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2audio",
    version,
    about = "Turn PDF files and URLs into narrated audio summaries",
    long_about = "Extract the text of a PDF (local file or URL), summarize it chunk by chunk with \
an LLM (Google Gemini by default, or any edgequake-llm provider), and read the summary aloud with \
Google Translate TTS or a local espeak-ng engine.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    #[arg(required_unless_present = "list_voices")]
    input: Option<String>,

    /// Audio output path; its stem names every output file.
    #[arg(short, long, env = "PDF2AUDIO_OUTPUT")]
    output: Option<PathBuf>,

    /// Gemini API key.
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// LLM model ID (default: gemini-2.0-flash).
    #[arg(long, env = "PDF2AUDIO_MODEL")]
    model: Option<String>,

    /// edgequake-llm provider instead of the Gemini REST API: openai, anthropic, gemini, ollama.
    #[arg(long, env = "PDF2AUDIO_PROVIDER")]
    provider: Option<String>,

    /// Maximum chunk size in characters.
    #[arg(long, env = "PDF2AUDIO_CHUNK_SIZE", default_value_t = 3000,
          value_parser = clap::value_parser!(u64).range(1..))]
    chunk_size: u64,

    /// Number of concurrent summarization calls (1 = sequential).
    #[arg(short, long, env = "PDF2AUDIO_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// What to do when a chunk fails to summarize.
    #[arg(long, env = "PDF2AUDIO_ON_CHUNK_FAILURE", value_enum, default_value = "placeholder")]
    on_chunk_failure: FailureArg,

    /// Speech backend.
    #[arg(long, env = "PDF2AUDIO_TTS", value_enum, default_value = "network")]
    tts: TtsArg,

    /// Language code for network speech (en, fr, de, …).
    #[arg(long, env = "PDF2AUDIO_LANGUAGE", default_value = "en")]
    language: String,

    /// Voice for local speech: an id from --list-voices, an index, male or female.
    #[arg(long, env = "PDF2AUDIO_VOICE")]
    voice: Option<String>,

    /// Speaking rate for local speech, in words per minute (80–450).
    #[arg(long, env = "PDF2AUDIO_RATE", default_value_t = 150)]
    rate: u32,

    /// Skip the timestamps file.
    #[arg(long, env = "PDF2AUDIO_NO_TIMESTAMPS")]
    no_timestamps: bool,

    /// Skip the transcript file.
    #[arg(long, env = "PDF2AUDIO_NO_TRANSCRIPT")]
    no_transcript: bool,

    /// Skip the zip archive.
    #[arg(long, env = "PDF2AUDIO_NO_ARCHIVE")]
    no_archive: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2AUDIO_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Text file with a custom summary prompt containing {text}.
    #[arg(long, env = "PDF2AUDIO_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Max LLM output tokens per chunk.
    #[arg(long, env = "PDF2AUDIO_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2AUDIO_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Skip the credentials check before reading the input.
    #[arg(long, env = "PDF2AUDIO_NO_VERIFY")]
    no_verify: bool,

    /// Print the run report (NarrationOutput) as JSON.
    #[arg(long, env = "PDF2AUDIO_JSON")]
    json: bool,

    /// List the speech backend's voices and exit.
    #[arg(long)]
    list_voices: bool,

    /// Print PDF metadata only, no narration.
    #[arg(long)]
    inspect_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2AUDIO_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2AUDIO_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2AUDIO_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2AUDIO_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-chunk LLM call timeout in seconds.
    #[arg(long, env = "PDF2AUDIO_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FailureArg {
    Placeholder,
    Abort,
}

impl From<FailureArg> for SummaryFailurePolicy {
    fn from(v: FailureArg) -> Self {
        match v {
            FailureArg::Placeholder => SummaryFailurePolicy::Placeholder,
            FailureArg::Abort => SummaryFailurePolicy::Abort,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum TtsArg {
    Network,
    Local,
}

impl From<TtsArg> for SpeechBackendKind {
    fn from(v: TtsArg) -> Self {
        match v {
            TtsArg::Network => SpeechBackendKind::Network,
            TtsArg::Local => SpeechBackendKind::Local,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose brings them all back.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Voice listing ────────────────────────────────────────────────────
    if cli.list_voices {
        let config = build_config(&cli, None).await?;
        let voices = list_voices(&config).await.context("Failed to list voices")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&voices).context("Failed to serialize voices")?
            );
        } else if voices.is_empty() {
            println!("This speech backend has no selectable voices; use --language instead.");
        } else {
            println!("{:>5}  {:<14} {:<8} {}", "Index", "Id", "Gender", "Name");
            for (i, v) in voices.iter().enumerate() {
                let gender = v.gender.map(|g| g.to_string()).unwrap_or_else(|| "-".into());
                println!("{:>5}  {:<14} {:<8} {}", i, v.id, gender, v.name);
            }
        }
        return Ok(());
    }

    let input = cli
        .input
        .clone()
        .context("An input PDF path or URL is required")?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect_with_password(&input, cli.password.as_deref())
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", input);
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            println!("Encrypted:    {}", meta.is_encrypted);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;
    let output_path = cli.output.clone().unwrap_or_else(|| default_output(&input));

    // ── Run narration ────────────────────────────────────────────────────
    let output = convert(&input, &output_path, &config)
        .await
        .context("Narration failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    if !cli.quiet {
        let stats = &output.stats;
        eprintln!(
            "{}  {}/{} chunks  {}ms  →  {}",
            if stats.failed_chunks == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.total_chunks - stats.failed_chunks,
            stats.total_chunks,
            stats.total_duration_ms,
            bold(&output.audio.path.display().to_string()),
        );
        for file in output.bundle.files().iter().skip(1) {
            eprintln!("   {}", dim(&file.display().to_string()));
        }
        if !output.failed_chunks.is_empty() {
            let parts: Vec<String> = output
                .failed_chunks
                .iter()
                .map(|i| (i + 1).to_string())
                .collect();
            eprintln!("   {} placeholder for part(s) {}", cyan("⚠"), parts.join(", "));
        }
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&stats.total_input_tokens.to_string()),
            dim(&stats.total_output_tokens.to_string()),
        );
    }

    Ok(())
}

/// `<input stem>.mp3` in the current directory; the extension is corrected
/// for the chosen backend later.
fn default_output(input: &str) -> PathBuf {
    let last = input
        .split(['?', '#'])
        .next()
        .unwrap_or(input)
        .trim_end_matches('/')
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let name = last
        .strip_suffix(".pdf")
        .or_else(|| last.strip_suffix(".PDF"))
        .unwrap_or(last);
    let name = if name.is_empty() { "summary" } else { name };
    PathBuf::from(format!("{name}.mp3"))
}

/// Map CLI args to `PipelineConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .chunk_size(cli.chunk_size as usize)
        .concurrency(cli.concurrency)
        .failure_policy(cli.on_chunk_failure.into())
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .verify_credentials(!cli.no_verify)
        .timestamps(!cli.no_timestamps)
        .write_transcript(!cli.no_transcript)
        .create_archive(!cli.no_archive)
        .tts_backend(cli.tts.into())
        .language(cli.language.clone())
        .speech_rate(cli.rate);

    if let Some(ref voice) = cli.voice {
        builder = builder.voice(VoiceSelection::parse(voice));
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref path) = cli.prompt_file {
        let template = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt_template(template);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
