//! Lexfuse CLI
//!
//! Command-line interface for:
//! - Generating heterogeneous legal dataset packs (`generate`)
//! - Validating an emitted pack against its canonical graph (`validate`)
//! - Inspecting the effective configuration (`config`)

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use lexfuse_core::{CanonicalGraph, EntityKind, GeneratorConfig};
use lexfuse_emit::{emit_pack, TemplateProducer, TextProducer};
use lexfuse_project::AliasRegistry;
use lexfuse_validate::{replay_aliases, validate, Severity};

#[derive(Parser)]
#[command(name = "lexfuse")]
#[command(
    author,
    version,
    about = "Lexfuse: heterogeneous legal-dataset generation engine"
)]
struct Cli {
    /// Log filter (e.g. `info`, `lexfuse_emit=debug`); overridden by RUST_LOG.
    #[arg(long, global = true, default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the canonical graph and emit every enabled source into a pack
    /// directory.
    Generate(GenerateArgs),

    /// Re-read an emitted pack and cross-check every ID against the
    /// canonical graph rebuilt from the same configuration.
    Validate(ValidateArgs),

    /// Print the effective configuration as JSON.
    Config(ConfigArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// JSON configuration file; defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output pack directory.
    #[arg(long, default_value = "out/pack")]
    out: PathBuf,

    /// Override the configured seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Restrict emission to these sources (comma-separated).
    #[arg(long, value_delimiter = ',')]
    sources: Vec<String>,

    /// Validate the pack immediately after emitting it.
    #[arg(long)]
    validate: bool,

    /// Produce narrative text through a local Ollama endpoint instead of the
    /// built-in templates.
    #[cfg(feature = "ollama")]
    #[arg(long)]
    ollama: bool,

    #[cfg(feature = "ollama")]
    #[arg(long, default_value = "http://localhost:11434/api/generate")]
    ollama_endpoint: String,

    #[cfg(feature = "ollama")]
    #[arg(long, default_value = "llama3.2")]
    ollama_model: String,
}

#[derive(Args)]
struct ValidateArgs {
    /// JSON configuration file the pack was generated with.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pack directory to validate.
    #[arg(long, default_value = "out/pack")]
    out: PathBuf,

    /// Show Info-severity findings (alias sightings) as well as errors.
    #[arg(long)]
    verbose: bool,
}

#[derive(Args)]
struct ConfigArgs {
    /// JSON configuration file; defaults are printed when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn load_config(path: Option<&PathBuf>) -> Result<GeneratorConfig> {
    let cfg = match path {
        Some(path) => {
            let bytes = fs::read(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_slice(&bytes)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => GeneratorConfig::default(),
    };
    cfg.validate()?;
    lexfuse_project::inventory::check_sources(&cfg)?;
    Ok(cfg)
}

fn init_logging(filter: &str) {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter.to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_generate(args: &GenerateArgs) -> Result<()> {
    let mut cfg = load_config(args.config.as_ref())?;
    if let Some(seed) = args.seed {
        cfg.seed = seed;
    }
    if !args.sources.is_empty() {
        cfg.sources = args.sources.clone();
        lexfuse_project::inventory::check_sources(&cfg)?;
    }

    let started = Instant::now();
    let graph = CanonicalGraph::build(&cfg)?;
    eprintln!(
        "{} {} clients, {} matters, {} billing entries, {} documents",
        "built".green().bold(),
        graph.count(EntityKind::Client),
        graph.count(EntityKind::Matter),
        graph.count(EntityKind::BillingEntry),
        graph.count(EntityKind::Document),
    );

    let producer = make_producer(args)?;
    let registry = AliasRegistry::new();
    let report = emit_pack(&graph, &cfg, &registry, producer.as_ref(), &args.out)?;

    for outcome in &report.outcomes {
        for (path, reason) in &outcome.failures {
            eprintln!(
                "{} {} ({reason})",
                "write failed:".red().bold(),
                path.display()
            );
        }
    }
    eprintln!(
        "{} {} files, {} records in {:.2}s → {}",
        "emitted".green().bold(),
        report.files_written(),
        report.records(),
        started.elapsed().as_secs_f64(),
        args.out.display().to_string().bold(),
    );
    if !report.all_ok() {
        return Err(anyhow!("some files failed to write"));
    }

    if args.validate {
        let report = validate(&graph, &cfg, &registry, &args.out)?;
        print_validation(&report, false);
        if !report.is_clean() {
            return Err(anyhow!("pack validation failed"));
        }
    }
    Ok(())
}

#[cfg(feature = "ollama")]
fn make_producer(args: &GenerateArgs) -> Result<Box<dyn TextProducer>> {
    if args.ollama {
        let producer = lexfuse_emit::narrative::OllamaProducer::new(
            &args.ollama_endpoint,
            &args.ollama_model,
            std::time::Duration::from_secs(30),
        )?;
        return Ok(Box::new(producer));
    }
    Ok(Box::new(TemplateProducer))
}

#[cfg(not(feature = "ollama"))]
fn make_producer(_args: &GenerateArgs) -> Result<Box<dyn TextProducer>> {
    Ok(Box::new(TemplateProducer))
}

fn cmd_validate(args: &ValidateArgs) -> Result<()> {
    let cfg = load_config(args.config.as_ref())?;
    let graph = CanonicalGraph::build(&cfg)?;
    let registry = replay_aliases(&graph, &cfg);

    let report = validate(&graph, &cfg, &registry, &args.out)?;
    print_validation(&report, args.verbose);
    if report.is_clean() {
        Ok(())
    } else {
        Err(anyhow!("{} discrepancies", report.error_count()))
    }
}

fn print_validation(report: &lexfuse_validate::DiscrepancyReport, verbose: bool) {
    for item in &report.items {
        match item.severity {
            Severity::Error => eprintln!(
                "{} [{}] {}",
                "error:".red().bold(),
                item.source,
                item.message
            ),
            Severity::Info if verbose => eprintln!(
                "{} [{}] {}",
                "info:".yellow().bold(),
                item.source,
                item.message
            ),
            Severity::Info => {}
        }
    }
    let status = if report.is_clean() {
        "ok".green().bold()
    } else {
        "failed".red().bold()
    };
    eprintln!(
        "{status} {} files, {} records checked, {} tokens resolved, {} aliased, {} errors",
        report.files_checked,
        report.records_checked,
        report.tokens_resolved,
        report.tokens_aliased,
        report.error_count(),
    );
}

fn cmd_config(args: &ConfigArgs) -> Result<()> {
    let cfg = load_config(args.config.as_ref())?;
    println!("{}", serde_json::to_string_pretty(&cfg)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log);

    match &cli.command {
        Commands::Generate(args) => cmd_generate(args),
        Commands::Validate(args) => cmd_validate(args),
        Commands::Config(args) => cmd_config(args),
    }
}
