//! CLI binary for edgequake-text2pptx.
//!
//! A thin shim over the library crate: `generate` maps flags to a
//! `GenerationRequest` plus `GenerationConfig` and prints the deck path;
//! `serve` starts the HTTP task service.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_text2pptx::{
    generate, GenerationConfig, GenerationProgressCallback, GenerationRequest, Language,
    ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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

/// Spinner while the outline is planned, then one bar tick per slide.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Planning");
        bar.set_message("Waiting for the outline…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} slides  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
    }

    fn elapsed_secs(&self, slide_number: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut t| t.remove(&slide_number))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_outline_complete(&self, slide_count: usize, placeholder: bool) {
        self.activate_bar(slide_count);
        let note = if placeholder {
            format!("  {}", red("(placeholder outline, the model reply was unusable)"))
        } else {
            String::new()
        };
        self.bar.println(format!(
            "{} {}{}",
            cyan("◆"),
            bold(&format!("Outline ready: {slide_count} slides")),
            note
        ));
    }

    fn on_slide_start(&self, slide_number: usize, _total_slides: usize) {
        if let Ok(mut t) = self.start_times.lock() {
            t.insert(slide_number, Instant::now());
        }
        self.bar.set_message(format!("slide {slide_number}"));
    }

    fn on_slide_complete(&self, slide_number: usize, total_slides: usize, path: &Path) {
        let secs = self.elapsed_secs(slide_number);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.bar.println(format!(
            "  {} Slide {:>2}/{:<2}  {}  {}",
            green("✓"),
            slide_number,
            total_slides,
            dim(&name),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_slide_error(&self, slide_number: usize, total_slides: usize, error: &str) {
        let secs = self.elapsed_secs(slide_number);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Slide {:>2}/{:<2}  {}  {}",
            red("✗"),
            slide_number,
            total_slides,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_assembly_start(&self, slide_count: usize) {
        self.bar.set_prefix("Assembling");
        self.bar.set_message(format!("{slide_count} slides"));
    }

    fn on_generation_complete(&self, rendered: usize, planned: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if rendered == planned {
            eprintln!("{} {} slides rendered", green("✔"), bold(&rendered.to_string()));
        } else {
            eprintln!(
                "{} {}/{} slides rendered  ({} failed)",
                cyan("⚠"),
                bold(&rendered.to_string()),
                planned,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Five-slide Chinese deck from a sentence
  text2pptx generate --text "人工智能的发展历程与未来趋势"

  # English deck from a file, with a style hint
  text2pptx generate --input notes.md --slides 8 --language English --style minimalist

  # Type or paste the text, then answer the prompts
  text2pptx generate

  # Pipe text in
  cat notes.txt | text2pptx generate --input - --slides 6

  # Machine-readable result
  text2pptx generate --text "AI in healthcare" --slides 3 --language English --json

  # Task service on port 8080 with four workers
  text2pptx serve --addr 0.0.0.0:8080 --workers 4

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (outline model)
  ANTHROPIC_API_KEY       Anthropic API key (outline model)
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override outline model ID
  ARK_API_KEY             Image model API key (required)
  ARK_BASE_URL            Image API root (default: Volcengine Ark v3)
  IMAGE_ENDPOINT          Image model or endpoint ID
"#;

/// Turn text into a PowerPoint deck with generated backgrounds.
#[derive(Parser, Debug)]
#[command(
    name = "text2pptx",
    version,
    about = "Turn free-form text into a PowerPoint deck",
    long_about = "Plan a slide outline with an LLM, render one text-free background per \
slide with a text-to-image model, and lay editable titles and bullets over them in a \
16:9 .pptx file.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "TEXT2PPTX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "TEXT2PPTX_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate one deck and print its path.
    Generate(GenerateArgs),
    /// Run the HTTP task service.
    #[cfg(feature = "server")]
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Source text. Without --text or --input the text is read
    /// interactively from stdin.
    #[arg(long, conflicts_with = "input")]
    text: Option<String>,

    /// Read the source text from this file; `-` reads all of stdin.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Deck file name without extension. Default: presentation_<timestamp>.
    #[arg(short, long)]
    output: Option<String>,

    /// Number of slides.
    #[arg(short = 'n', long, env = "TEXT2PPTX_SLIDES", default_value_t = 5,
          value_parser = clap::value_parser!(u32).range(1..=50))]
    slides: u32,

    /// Slide text language: 中文, English, 日本語, or any other name.
    #[arg(short, long, env = "TEXT2PPTX_LANGUAGE", default_value = "中文")]
    language: String,

    /// Visual style appended to every image prompt, e.g. "minimalist".
    #[arg(short, long, env = "TEXT2PPTX_STYLE")]
    style: Option<String>,

    /// Output structured JSON (GenerationOutput) instead of the deck path.
    #[arg(long, env = "TEXT2PPTX_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "TEXT2PPTX_NO_PROGRESS")]
    no_progress: bool,

    #[command(flatten)]
    model: ModelArgs,
}

#[cfg(feature = "server")]
#[derive(Args, Debug)]
struct ServeArgs {
    /// Listen address.
    #[arg(long, env = "TEXT2PPTX_ADDR", default_value = "127.0.0.1:5000")]
    addr: std::net::SocketAddr,

    /// Concurrent generation jobs.
    #[arg(short, long, env = "TEXT2PPTX_WORKERS", default_value_t = 2)]
    workers: usize,

    #[command(flatten)]
    model: ModelArgs,
}

/// Flags shared by both subcommands; they mirror the config builder.
#[derive(Args, Debug)]
struct ModelArgs {
    /// LLM model ID for the outline (e.g. gpt-4.1-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Path to a text file containing a custom outline system prompt.
    #[arg(long, env = "TEXT2PPTX_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "TEXT2PPTX_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Retries on a failed outline call.
    #[arg(long, env = "TEXT2PPTX_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Image model API key.
    #[arg(long, env = "ARK_API_KEY", hide_env_values = true)]
    image_api_key: Option<String>,

    /// Image API root; `/images/generations` is appended.
    #[arg(long, env = "ARK_BASE_URL")]
    image_base_url: Option<String>,

    /// Image model or endpoint ID.
    #[arg(long, env = "IMAGE_ENDPOINT")]
    image_model: Option<String>,

    /// Background size as WIDTHxHEIGHT.
    #[arg(long, env = "TEXT2PPTX_IMAGE_SIZE")]
    image_size: Option<String>,

    /// Directory for finished decks (backgrounds go in <dir>/images).
    #[arg(long, env = "TEXT2PPTX_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Fewest rendered backgrounds that still produce a deck.
    #[arg(long, env = "TEXT2PPTX_MIN_SLIDES", default_value_t = 1)]
    min_slides: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar already reports each stage, so library INFO logs are
    // only shown when it is off.
    let show_progress = match &cli.command {
        Command::Generate(args) => !cli.quiet && !args.no_progress && !args.json,
        #[cfg(feature = "server")]
        Command::Serve(_) => false,
    };
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

    match cli.command {
        Command::Generate(args) => run_generate(args, cli.quiet, show_progress).await,
        #[cfg(feature = "server")]
        Command::Serve(args) => run_serve(args).await,
    }
}

async fn run_generate(args: GenerateArgs, quiet: bool, show_progress: bool) -> Result<()> {
    let (text, slides, output_name) = match (&args.text, &args.input) {
        (Some(text), _) => (text.clone(), args.slides as usize, args.output.clone()),
        (None, Some(path)) if path.as_os_str() == "-" => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("Failed to read input from stdin")?;
            (text, args.slides as usize, args.output.clone())
        }
        (None, Some(path)) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read input from {:?}", path))?;
            (text, args.slides as usize, args.output.clone())
        }
        (None, None) => {
            let defaults = (args.slides as usize, args.output.clone());
            let answers = tokio::task::spawn_blocking(move || prompt_interactive(defaults))
                .await
                .context("Interactive input task failed")??;
            match answers {
                Some(answers) => answers,
                None => {
                    eprintln!("No input provided. Exiting.");
                    return Ok(());
                }
            }
        }
    };

    let mut request = GenerationRequest::new(text)
        .slide_count(slides)
        .language(Language::from_tag(&args.language));
    if let Some(ref style) = args.style {
        request = request.style(style.clone());
    }
    if let Some(ref name) = output_name {
        request = request.output_name(name.trim_end_matches(".pptx"));
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn GenerationProgressCallback>)
    } else {
        None
    };
    let config = build_config(&args.model, progress_cb, None).await?;

    let output = generate(&request, &config)
        .await
        .context("Generation failed")?;

    if args.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    println!("{}", output.artifact.path.display());

    if !quiet {
        let stats = &output.stats;
        eprintln!(
            "{}  {}/{} slides  {}ms  →  {}",
            if stats.skipped_slides == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.rendered_slides,
            stats.planned_slides,
            stats.total_duration_ms,
            bold(&output.artifact.path.display().to_string()),
        );
        for e in &stats.slide_errors {
            eprintln!("   {}", dim(&e.to_string()));
        }
    }

    Ok(())
}

// ── Interactive input ────────────────────────────────────────────────────────

/// Ask for the text, then the slide count and the deck name, on stdin.
///
/// Returns `None` when no text was entered.
fn prompt_interactive(
    (default_slides, default_name): (usize, Option<String>),
) -> Result<Option<(String, usize, Option<String>)>> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    eprintln!("{}", bold("text2pptx: interactive mode"));
    eprintln!("Enter your text below. Press Enter twice to finish, Ctrl+C to cancel.");
    eprintln!("{}", dim(&"─".repeat(60)));

    let text = read_until_blank_pair(lines.by_ref().map_while(|l| l.ok()));
    if text.trim().is_empty() {
        return Ok(None);
    }

    let answer = ask(&mut lines, &format!("Number of slides (default: {default_slides}): "))?;
    let slides = parse_slide_answer(&answer, default_slides);

    let answer = ask(&mut lines, "Output filename (press Enter for auto): ")?;
    let name = Some(answer.trim().to_string())
        .filter(|n| !n.is_empty())
        .or(default_name);

    Ok(Some((text, slides, name)))
}

fn ask(lines: &mut impl Iterator<Item = io::Result<String>>, question: &str) -> Result<String> {
    eprint!("{question}");
    io::stderr().flush().context("Failed to flush stderr")?;
    Ok(lines.next().transpose().context("Failed to read stdin")?.unwrap_or_default())
}

/// Join lines up to the second consecutive empty one; a single blank line
/// inside the text is kept.
fn read_until_blank_pair(lines: impl Iterator<Item = String>) -> String {
    let mut kept: Vec<String> = Vec::new();
    let mut empty_run = 0;
    for line in lines {
        if line.is_empty() {
            empty_run += 1;
            if empty_run >= 2 {
                break;
            }
        } else {
            empty_run = 0;
        }
        kept.push(line);
    }
    if kept.last().is_some_and(|l| l.is_empty()) {
        kept.pop();
    }
    kept.join("\n")
}

/// A count in 1..=50, or the default for anything else.
fn parse_slide_answer(answer: &str, default: usize) -> usize {
    match answer.trim().parse::<usize>() {
        Ok(n) if (1..=50).contains(&n) => n,
        _ => default,
    }
}

#[cfg(feature = "server")]
async fn run_serve(args: ServeArgs) -> Result<()> {
    use edgequake_text2pptx::{server, Pipeline, TaskManager};

    let config = build_config(&args.model, None, Some(args.workers)).await?;
    let pipeline = Pipeline::from_config(&config)
        .await
        .context("Failed to initialise the generation pipeline")?;
    let manager = TaskManager::start(Arc::new(pipeline), config.workers);

    server::serve(args.addr, manager)
        .await
        .with_context(|| format!("Server on {} stopped", args.addr))
}

/// Map CLI args to `GenerationConfig`.
async fn build_config(
    args: &ModelArgs,
    progress: Option<ProgressCallback>,
    workers: Option<usize>,
) -> Result<GenerationConfig> {
    let mut builder = GenerationConfig::builder()
        .temperature(args.temperature)
        .max_retries(args.max_retries)
        .output_dir(&args.output_dir)
        .min_rendered_slides(args.min_slides);

    if let Some(ref path) = args.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = args.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref key) = args.image_api_key {
        builder = builder.image_api_key(key);
    }
    if let Some(ref url) = args.image_base_url {
        builder = builder.image_base_url(url);
    }
    if let Some(ref model) = args.image_model {
        builder = builder.image_model(model);
    }
    if let Some(ref size) = args.image_size {
        builder = builder.image_size(size);
    }
    if let Some(n) = workers {
        builder = builder.workers(n);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(input: &str) -> impl Iterator<Item = String> + '_ {
        input.lines().map(str::to_string)
    }

    #[test]
    fn text_ends_at_two_blank_lines() {
        let text = read_until_blank_pair(lines("First para\n\nSecond para\n\n\nignored"));
        assert_eq!(text, "First para\n\nSecond para");
    }

    #[test]
    fn text_ends_at_end_of_input() {
        assert_eq!(read_until_blank_pair(lines("only line")), "only line");
        assert_eq!(read_until_blank_pair(lines("")), "");
    }

    #[test]
    fn slide_answer_falls_back_to_default() {
        assert_eq!(parse_slide_answer("8", 5), 8);
        assert_eq!(parse_slide_answer(" 3 ", 5), 3);
        assert_eq!(parse_slide_answer("", 5), 5);
        assert_eq!(parse_slide_answer("many", 5), 5);
        assert_eq!(parse_slide_answer("0", 5), 5);
        assert_eq!(parse_slide_answer("99", 5), 5);
    }

    #[test]
    fn generate_accepts_no_text_source() {
        let cli = Cli::try_parse_from(["text2pptx", "generate", "-n", "4"]).unwrap();
        match cli.command {
            Command::Generate(args) => {
                assert!(args.text.is_none() && args.input.is_none());
                assert_eq!(args.slides, 4);
            }
            #[allow(unreachable_patterns)]
            _ => panic!("expected generate"),
        }
        assert!(Cli::try_parse_from(["text2pptx", "generate", "--text", "a", "-i", "f"]).is_err());
    }
}
