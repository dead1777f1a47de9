//! CLI binary for edgequake-cv2career.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalysisConfig`, picks a backend locator and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_cv2career::{
    analyze, run_with_locator, AnalysisConfig, AnalysisOutput, BackendConfig, BackendLocator,
    Cv2CareerError, FixedLocator, HealthProbeLocator, ProgressCallback, Stage, StepOutcome,
    WorkflowOutput, WorkflowProgressCallback, WorkflowStep,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

/// Terminal progress callback: a spinner naming the current stage, with one
/// log line per backend call printed above it.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl WorkflowProgressCallback for CliProgressCallback {
    fn on_stage(&self, stage: Stage) {
        self.bar.set_prefix(stage.to_string());
        self.bar.set_message("");
    }

    fn on_raw_output(&self, raw: &str) {
        self.bar
            .println(format!("{} model answered ({} chars)", cyan("◆"), raw.len()));
    }

    fn on_step_complete(&self, step: &WorkflowStep, detail: &str) {
        self.bar
            .println(format!("  {} {}  {}", green("✓"), step, dim(detail)));
    }

    fn on_step_error(&self, step: &WorkflowStep, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = match error.char_indices().nth(100) {
            Some((i, _)) => format!("{}\u{2026}", &error[..i]),
            None => error.to_string(),
        };
        self.bar
            .println(format!("  {} {}  {}", red("✗"), step, red(&msg)));
    }

    fn on_workflow_complete(&self, succeeded: usize, failed: usize) {
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} backend calls succeeded",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {} backend calls succeeded  ({} failed)",
                yellow("⚠"),
                bold(&succeeded.to_string()),
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse a résumé and record it in the backend found via DOTNET_LOCAL / DOTNET_IP
  cv2career resume.pdf

  # Analysis only, no backend needed
  cv2career --analyze-only resume.png

  # Use a fixed backend address and a specific user
  cv2career --backend http://10.0.0.5:5000 --user-id 42 resume.pdf

  # Machine-readable output
  cv2career --json resume.pdf > run.json

  # Another provider and model
  cv2career --provider openai --model gpt-4.1-mini resume.jpg

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  DOTNET_LOCAL            Backend address tried first (e.g. http://localhost:5000)
  DOTNET_IP               Backend address tried second (e.g. http://192.168.0.10:5000)

  Variables are also read from a .env file in the working directory.

BACKEND DISCOVERY:
  Unless --backend is given, every configured address is probed with
  GET {address}/health and the first one answering 200 is used.
"#;

/// Analyse résumés with a multimodal LLM and record the result in a career backend.
#[derive(Parser, Debug)]
#[command(
    name = "cv2career",
    version,
    about = "Analyse a résumé with a multimodal LLM and record skills, career path and prediction",
    long_about = "Send a résumé (PDF, PNG or JPEG; local file or URL) to a multimodal LLM, \
recover the structured analysis from its answer, and record the extracted skills, the \
recommended career path and a career prediction in the career backend.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local résumé path (PDF, PNG, JPG, JPEG) or HTTP/HTTPS URL.
    input: String,

    /// Stop after the analysis; do not contact the backend.
    #[arg(long, env = "CV2CAREER_ANALYZE_ONLY")]
    analyze_only: bool,

    /// Output structured JSON instead of a human-readable report.
    #[arg(long, env = "CV2CAREER_JSON")]
    json: bool,

    /// Backend base address. Skips health probing.
    #[arg(long, env = "CV2CAREER_BACKEND")]
    backend: Option<String>,

    /// Backend address probed first.
    #[arg(long, env = "DOTNET_LOCAL")]
    backend_local: Option<String>,

    /// Backend address probed second.
    #[arg(long, env = "DOTNET_IP")]
    backend_ip: Option<String>,

    /// Health endpoint used when probing.
    #[arg(long, env = "CV2CAREER_HEALTH_PATH", default_value = "/health")]
    health_path: String,

    /// Per-request backend timeout in seconds.
    #[arg(long, env = "CV2CAREER_BACKEND_TIMEOUT", default_value_t = 30)]
    backend_timeout: u64,

    /// User the career prediction is generated for.
    #[arg(long, env = "CV2CAREER_USER_ID", default_value_t = 1)]
    user_id: i64,

    /// LLM model ID (e.g. gemini-2.0-flash, gpt-4.1-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: gemini, openai, anthropic, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "CV2CAREER_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Labour market used for salary estimates.
    #[arg(long, env = "CV2CAREER_MARKET", default_value = "Brazil")]
    market: String,

    /// Max LLM output tokens.
    #[arg(long, env = "CV2CAREER_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "CV2CAREER_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Longest image edge in pixels before downscaling.
    #[arg(long, env = "CV2CAREER_MAX_IMAGE_PIXELS", default_value_t = 2000)]
    max_image_pixels: u32,

    /// Disable the progress spinner.
    #[arg(long, env = "CV2CAREER_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CV2CAREER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CV2CAREER_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "CV2CAREER_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// LLM call timeout in seconds.
    #[arg(long, env = "CV2CAREER_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; clap reads the environment after this.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO-level library logs when it is active.
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

    let progress = if show_progress {
        Some(CliProgressCallback::new())
    } else {
        None
    };
    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|cb| cb as Arc<dyn WorkflowProgressCallback>),
    )
    .await?;

    // ── Analysis only ────────────────────────────────────────────────────
    if cli.analyze_only {
        let result = analyze(&cli.input, &config).await;
        if let Some(ref cb) = progress {
            cb.finish();
        }
        let output = report_fatal(result)?;
        if cli.json {
            print_json(&output)?;
        } else {
            print_analysis(&output);
        }
        return Ok(());
    }

    // ── Full workflow ────────────────────────────────────────────────────
    let locator = build_locator(&cli, &config.backend)?;
    let result = run_with_locator(&cli.input, &config, locator.as_ref()).await;
    if let Some(ref cb) = progress {
        cb.finish();
    }
    let output = report_fatal(result)?;

    if cli.json {
        print_json(&output)?;
    } else {
        print_analysis(&output.analysis);
        print_workflow(&output);
    }

    if !cli.quiet {
        let failed = progress
            .as_ref()
            .map(|cb| cb.errors.load(Ordering::SeqCst))
            .unwrap_or(output.stats.failed_steps);
        eprintln!(
            "   {} tokens in  /  {} tokens out  ·  model {}ms  ·  backend {}ms  ·  {} warnings",
            dim(&output.stats.input_tokens.to_string()),
            dim(&output.stats.output_tokens.to_string()),
            output.stats.model_duration_ms,
            output.stats.backend_duration_ms,
            failed,
        );
    }

    Ok(())
}

/// Print the raw model output for extraction failures, then hand the error
/// to anyhow.
fn report_fatal<T>(result: std::result::Result<T, Cv2CareerError>) -> Result<T> {
    result.map_err(|err| {
        if let Some(raw) = err.raw_model_output() {
            eprintln!("{}", bold("Raw model output:"));
            eprintln!("{raw}");
        }
        anyhow::Error::new(err).context("Résumé analysis failed")
    })
}

/// `--backend` wins; otherwise probe `--backend-local` then `--backend-ip`.
fn build_locator(cli: &Cli, backend: &BackendConfig) -> Result<Box<dyn BackendLocator>> {
    if let Some(ref url) = cli.backend {
        return Ok(Box::new(FixedLocator::new(url)));
    }
    if backend.candidates.is_empty() {
        anyhow::bail!(
            "No backend configured. Set DOTNET_LOCAL / DOTNET_IP, pass --backend <URL>, \
             or use --analyze-only."
        );
    }
    let probe = HealthProbeLocator::from_config(backend).context("Invalid backend settings")?;
    Ok(Box::new(probe))
}

/// Map CLI args to `AnalysisConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AnalysisConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let candidates = [&cli.backend_local, &cli.backend_ip]
        .into_iter()
        .flatten()
        .filter(|c| !c.trim().is_empty())
        .cloned();
    let backend = BackendConfig {
        health_path: cli.health_path.clone(),
        timeout_secs: cli.backend_timeout,
        ..BackendConfig::with_candidates(candidates)
    };

    let mut builder = AnalysisConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .salary_market(cli.market.clone())
        .max_image_pixels(cli.max_image_pixels)
        .user_id(cli.user_id)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout)
        .backend(backend);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise output")?;
    println!("{json}");
    Ok(())
}

fn print_analysis(output: &AnalysisOutput) {
    let a = &output.analysis;
    println!("{}", bold("Résumé analysis"));
    println!("  Document:       {}", output.document);
    println!("  Skills:         {}", a.skills.join(", "));
    println!("  Career:         {}", a.career);
    println!("  Recommendation: {}", a.recommendation);
    if let Some(ref meta) = a.career_meta {
        println!("  Type:           {}", meta.career_type);
        println!("  Years to start: {}", meta.estimated_years);
        println!("  Avg. salary:    {:.2}", meta.average_salary);
        println!("  Job growth:     {}%", meta.job_growth);
        println!("  Future career:  {}", if meta.future_career { "yes" } else { "no" });
    }
}

fn print_workflow(output: &WorkflowOutput) {
    println!();
    println!("{} {}", bold("Backend"), dim(&output.backend_url));

    for skill in &output.skills {
        match (&skill.created, &skill.error) {
            (Some(rec), None) => println!("  {} skill {:<24} ID={}", green("✓"), skill.name, rec.id),
            (Some(rec), Some(e)) => {
                println!("  {} skill {:<24} ID={}  {}", yellow("⚠"), skill.name, rec.id, e)
            }
            (None, Some(e)) => println!("  {} {}", red("✗"), e),
            (None, None) => {}
        }
    }

    match &output.career {
        StepOutcome::Saved { created, error, .. } => {
            println!("  {} career path ID={}", green("✓"), created.id);
            if let Some(e) = error {
                println!("    {} {}", yellow("⚠"), e);
            }
        }
        StepOutcome::Failed { error } => println!("  {} {}", red("✗"), error),
        StepOutcome::Skipped { reason } => println!("  {} career path skipped: {}", dim("–"), reason),
    }

    match &output.prediction {
        StepOutcome::Saved { created, stored, error } => {
            println!("  {} prediction ID={}", green("✓"), created.id);
            if let Some(p) = stored {
                print_field("Analysis", p.analysis.as_ref());
                print_field("Recommendations", p.recommendations.as_ref());
                print_field("Skills to develop", p.skills_to_develop.as_ref());
                if let Some(score) = p.compatibility_score {
                    println!("    Compatibility:     {score}");
                }
                if let Some(ref at) = p.predicted_at {
                    println!("    Predicted at:      {at}");
                }
            }
            if let Some(e) = error {
                println!("    {} {}", yellow("⚠"), e);
            }
        }
        StepOutcome::Failed { error } => println!("  {} {}", red("✗"), error),
        StepOutcome::Skipped { reason } => println!("  {} prediction skipped: {}", dim("–"), reason),
    }
}

fn print_field(label: &str, value: Option<&Value>) {
    let text = match value {
        None | Some(Value::Null) => return,
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("; "),
        Some(other) => other.to_string(),
    };
    println!("    {:<18} {}", format!("{label}:"), text);
}
