use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use suggest_engine::EngineConfig;
use suggest_protocol::{Anchor, LockedSpan};

mod commands;

fn print_stdout(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|()| stdout.write_all(b"\n"))
        .and_then(|()| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> Result<()> {
    let rendered = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    print_stdout(&rendered)
}

#[derive(Parser)]
#[command(name = "suggest")]
#[command(about = "Normalize spans, resolve anchors and apply suggestions offline", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// Engine config file (TOML); SUGGEST_* variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Single-line JSON instead of pretty-printed
    #[arg(long, global = true)]
    compact: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn raw labeled spans into highlights
    Normalize(NormalizeArgs),

    /// Locate an anchor in a text
    Resolve(ResolveArgs),

    /// Replace the text an anchor points at
    Apply(ApplyArgs),

    /// Print the cache fingerprint of a selection
    Fingerprint(FingerprintArgs),

    /// Print the effective engine configuration
    Config,
}

#[derive(Args)]
struct NormalizeArgs {
    /// Text the spans refer to ("-" for stdin)
    #[arg(long)]
    text: PathBuf,

    /// JSON file: {"spans": [...]} or a bare array of spans
    #[arg(long)]
    spans: PathBuf,

    /// JSON taxonomy table: {"categories", "aliases", "fallback"}
    #[arg(long)]
    taxonomy: PathBuf,

    /// Include grapheme cluster indices
    #[arg(long)]
    graphemes: bool,
}

#[derive(Args)]
struct ResolveArgs {
    /// Text to search ("-" for stdin)
    #[arg(long)]
    text: PathBuf,

    /// JSON anchor, or an array of locked spans
    #[arg(long)]
    anchor: PathBuf,
}

#[derive(Args)]
struct ApplyArgs {
    /// Prompt to edit ("-" for stdin)
    #[arg(long)]
    text: PathBuf,

    /// JSON anchor of the region to replace
    #[arg(long)]
    anchor: PathBuf,

    /// Replacement text
    #[arg(long)]
    suggestion: String,

    /// Idempotency key echoed in the result
    #[arg(long)]
    key: Option<String>,

    /// JSON array of locked spans that must not be touched
    #[arg(long)]
    locks: Option<PathBuf>,
}

#[derive(Args)]
struct FingerprintArgs {
    /// Document text ("-" for stdin)
    #[arg(long)]
    text: PathBuf,

    /// Selection start, in UTF-16 units
    #[arg(long)]
    start: usize,

    /// Selection end, in UTF-16 units
    #[arg(long)]
    end: usize,
}

pub fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Normalize(args) => {
            let text = read_text(&args.text)?;
            let spans = commands::parse_spans(&read_text(&args.spans)?)
                .with_context(|| format!("invalid spans in {}", args.spans.display()))?;
            let taxonomy = commands::parse_taxonomy(&read_text(&args.taxonomy)?)
                .with_context(|| format!("invalid taxonomy in {}", args.taxonomy.display()))?;
            let output = commands::normalize(&config, &text, &spans, &taxonomy, args.graphemes);
            print_json(&output, cli.compact)
        }
        Commands::Resolve(args) => {
            let text = read_text(&args.text)?;
            let raw = read_text(&args.anchor)?;
            let output = commands::resolve(&config, &text, &raw)
                .with_context(|| format!("invalid anchor in {}", args.anchor.display()))?;
            print_json(&output, cli.compact)
        }
        Commands::Apply(args) => {
            let text = read_text(&args.text)?;
            let anchor: Anchor = serde_json::from_str(&read_text(&args.anchor)?)
                .with_context(|| format!("invalid anchor in {}", args.anchor.display()))?;
            let locks: Vec<LockedSpan> = match &args.locks {
                Some(path) => serde_json::from_str(&read_text(path)?)
                    .with_context(|| format!("invalid locks in {}", path.display()))?,
                None => Vec::new(),
            };
            let output =
                commands::apply(&config, &text, &args.suggestion, &anchor, &locks, args.key);
            print_json(&output, cli.compact)
        }
        Commands::Fingerprint(args) => {
            let text = read_text(&args.text)?;
            let output = commands::fingerprint(&config, &text, args.start, args.end)?;
            print_json(&output, cli.compact)
        }
        Commands::Config => print_json(&config, cli.compact),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

fn read_text(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
