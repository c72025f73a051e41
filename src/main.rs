//! RfpAudit - compliance and risk report engine for RFP documents
//!
//! A CLI tool that uploads an RFP to the analysis backend, has the
//! preliminary analysis structured by an Ollama model, and generates a
//! compliance/eligibility/risk report with a proceed recommendation.
//!
//! Exit codes:
//!   0 - Success (decision above --fail-on threshold, or no --fail-on set)
//!   1 - Runtime error (connection, config, malformed extraction, etc.)
//!   2 - Decision at or below the --fail-on threshold

mod analysis;
mod classify;
mod cli;
mod client;
mod config;
mod error;
mod export;
mod models;
mod normalize;
mod report;
mod workspace;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use classify::CLASSIFIER;
use cli::{Args, OutputFormat};
use client::{BackendClient, Extractor, SessionContext, SessionStore};
use config::{Config, CONFIG_FILE};
use error::EngineError;
use export::{CommandRasterizer, ExportLayout};
use indicatif::{ProgressBar, ProgressStyle};
use models::RiskLevel;
use report::ReportDocument;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use workspace::{ApplyOutcome, Snapshot, Workspace};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("RfpAudit v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .rfpaudit.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize the backend, model, export layout, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete workflow. Returns exit code (0 or 2).
async fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate().context("Invalid configuration")?;

    let now = args.evaluation_time().map_err(anyhow::Error::msg)?;
    let store = SessionStore::new(&config.session.store_path);

    // --cleanup on its own releases the stored session
    if args.is_cleanup_only() {
        let backend = BackendClient::new(&config.backend)?;
        let session = store.require()?;
        cleanup_session(&backend, &store, &session).await?;
        return Ok(0);
    }

    let workspace = Workspace::new();
    let mut backend_session = None;

    if let Some(ref path) = args.extraction {
        // Step 1: Load a saved extraction reply
        println!("📄 Loading extraction reply: {}", path.display());
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read extraction file {}", path.display()))?;
        let ticket = workspace.begin();
        let outcome = workspace.apply_text(ticket, &text, now);
        expect_applied(outcome)?;
    } else {
        let backend = BackendClient::new(&config.backend)?;
        let extractor = Extractor::new(config.model.clone())?;

        // Step 1: Upload the document, or reuse a session
        let session = resolve_session(&args, &backend, &store).await?;

        // Step 2: Analyse and extract
        println!("🤖 Analysing session {}...", session);
        println!("   Backend: {}", config.backend.api_url);
        println!("   Model: {} ({})", config.model.name, config.model.ollama_url);
        println!("   Timeout: {}s", config.model.timeout_seconds);

        let spinner = if args.quiet {
            None
        } else {
            Some(start_spinner("Waiting for analysis and extraction..."))
        };
        let outcome = workspace
            .analyze(&backend, &extractor, &session, now)
            .await;
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        expect_applied(outcome)?;

        backend_session = Some((backend, session));
    }

    let snapshot = workspace
        .current()
        .context("No report was applied to the workspace")?;
    let document = snapshot.document();

    // Step 3: Write the report
    println!("\n📝 Generating report...");
    let format = resolve_format(&args, &config);
    let output_path = resolve_output(&args, &config, format);

    let output = match format {
        OutputFormat::Markdown => {
            report::generate_markdown_report(&document, config.report.show_coercions)
        }
        OutputFormat::Json => report::generate_json_report(&document)?,
        OutputFormat::Html => snapshot.surface.to_html(),
    };
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    print_summary(&snapshot, &document, now);

    // Step 4: Exports
    let layout = ExportLayout::from(&config.export);
    let export_dir = PathBuf::from(&config.export.output_dir);

    if args.print {
        let artifact = workspace.print(&layout)?;
        let path = artifact.write_to(&export_dir)?;
        println!("🖨️  Print-ready document: {}", path.display());
    }

    if args.export_pdf {
        println!("📦 Exporting PDF archive...");
        let rasterizer = Arc::new(CommandRasterizer::from(&config.export));
        match workspace.archive(rasterizer, layout).await {
            Ok(artifact) => {
                let path = artifact.write_to(&export_dir)?;
                println!(
                    "   PDF archive: {} ({} page(s))",
                    path.display(),
                    artifact.pages
                );
            }
            Err(e) => {
                // The report itself is already written.
                warn!("PDF export failed: {}", e);
                eprintln!("⚠️  PDF export failed: {}", e);
            }
        }
    }

    // Step 5: Release the backend session
    if args.cleanup {
        if let Some((ref backend, ref session)) = backend_session {
            cleanup_session(backend, &store, session).await?;
        } else {
            warn!("--cleanup ignored: no backend session was used");
        }
    }

    let decision = document.recommendation.decision;
    println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
    println!(
        "\n✅ Report complete! Saved to: {}",
        output_path.display()
    );

    // Check --fail-on threshold
    if let Some(fail_level) = args.fail_on {
        if fail_level.is_reached_by(decision) {
            eprintln!(
                "\n⛔ Decision {} is at or below the {:?} threshold. Failing (exit code 2).",
                decision, fail_level
            );
            return Ok(2);
        }
    }

    Ok(0)
}

/// Turn an apply result into an error unless the report became current.
fn expect_applied(outcome: Result<ApplyOutcome, EngineError>) -> Result<()> {
    match outcome {
        Ok(ApplyOutcome::Applied(snapshot)) => {
            let coercions = snapshot.normalized.coercions.len();
            if coercions > 0 {
                info!("{} field(s) were coerced during normalization", coercions);
            }
            Ok(())
        }
        Ok(ApplyOutcome::Stale) => bail!("Analysis response was superseded by a newer one"),
        Err(e) => {
            if e.is_retryable() {
                eprintln!("   The request can be retried; any stored session is still valid.");
            }
            Err(e.into())
        }
    }
}

/// Upload `--document`, or fall back to `--session` and then the stored
/// session.
async fn resolve_session(
    args: &Args,
    backend: &BackendClient,
    store: &SessionStore,
) -> Result<SessionContext> {
    if let Some(ref document) = args.document {
        println!("📥 Uploading document: {}", document.display());
        let session = backend.upload(document).await?;
        store
            .save(&session)
            .with_context(|| format!("Failed to store session in {}", store.path().display()))?;
        debug!("Session stored in {}", store.path().display());
        return Ok(session);
    }

    if let Some(ref id) = args.session {
        return SessionContext::new(id.as_str()).context("Session identifier cannot be empty");
    }

    let session = store.require()?;
    info!("Using stored session {}", session);
    Ok(session)
}

async fn cleanup_session(
    backend: &BackendClient,
    store: &SessionStore,
    session: &SessionContext,
) -> Result<()> {
    println!("🧹 Releasing session {}...", session);
    let message = backend.cleanup(session).await?;
    store
        .clear()
        .with_context(|| format!("Failed to clear {}", store.path().display()))?;
    println!("   {}", message);
    Ok(())
}

fn start_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// `--format`, then the configured format, then Markdown.
fn resolve_format(args: &Args, config: &Config) -> OutputFormat {
    if let Some(format) = args.format {
        return format;
    }
    OutputFormat::from_name(&config.general.format).unwrap_or_else(|| {
        warn!(
            "Unknown format '{}' in config, using markdown",
            config.general.format
        );
        OutputFormat::Markdown
    })
}

/// `--output`, else the configured output with the extension matching
/// `format`.
fn resolve_output(args: &Args, config: &Config, format: OutputFormat) -> PathBuf {
    if let Some(ref output) = args.output {
        return output.clone();
    }
    let path = PathBuf::from(&config.general.output);
    match format {
        OutputFormat::Markdown => path,
        OutputFormat::Json => path.with_extension("json"),
        OutputFormat::Html => path.with_extension("html"),
    }
}

fn print_summary(snapshot: &Snapshot, document: &ReportDocument<'_>, now: DateTime<Utc>) {
    let report = document.report;
    let aggregates = &document.aggregates;
    let risks = &aggregates.risk_distribution;

    println!("\n📊 RFP Summary: {} ({})", report.title, report.id);
    println!("   Agency: {}", report.agency);
    println!(
        "   Compliance: {} {}",
        CLASSIFIER.verdict(aggregates.overall_compliance).marker(),
        if aggregates.overall_compliance { "Compliant" } else { "Non-compliant" }
    );
    println!(
        "   Eligibility: {} {}",
        CLASSIFIER.verdict(aggregates.eligibility_proceed).marker(),
        if aggregates.eligibility_proceed { "Eligible" } else { "Not eligible" }
    );
    println!(
        "   Checklist: {}/{} complete ({:.0}%, {} remaining)",
        aggregates.checklist_progress.completed,
        aggregates.checklist_progress.total,
        aggregates.checklist_progress.percent(),
        aggregates.checklist_progress.remaining()
    );
    println!(
        "   Risks: {} | High: {} | Medium: {} | Low: {}",
        risks.total(),
        risks.count(RiskLevel::High),
        risks.count(RiskLevel::Medium),
        risks.count(RiskLevel::Low)
    );
    if !aggregates.upcoming_deadlines.is_empty() {
        println!(
            "   Upcoming deadlines (as of {}): {}",
            now.format("%Y-%m-%d"),
            aggregates.upcoming_deadlines.len()
        );
    }
    if !snapshot.normalized.coercions.is_empty() {
        println!(
            "   Normalization: {} field(s) coerced",
            snapshot.normalized.coercions.len()
        );
    }
    println!(
        "\n{} {}",
        document.recommendation.decision.presentation().marker(),
        document.recommendation.headline
    );
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
