use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use image::ImageFormat;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::{EnvFilter, fmt};
use walkdir::WalkDir;

use pxlproof::config::{Config, default_config_path};
use pxlproof::core::{
    Fingerprint, FingerprintEngine, FingerprintStringCodec, ImageDecoder, PixelSource,
    SimilarityAggregator,
};
use pxlproof::ledger::FileLedger;
use pxlproof::services::{RegistrationOutcome, Registry, Upload};

#[derive(Parser, Debug)]
#[command(
    name = "pxlproof",
    version,
    about = "Register image fingerprints and detect near-duplicates"
)]
struct Cli {
    /// Config file (default: platform config dir)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Ledger file
    #[arg(long, global = true, env = "PXLPROOF_LEDGER", value_name = "FILE")]
    ledger: Option<PathBuf>,

    /// Hash grid side length
    #[arg(long, global = true, env = "PXLPROOF_RESOLUTION")]
    resolution: Option<u32>,

    /// Mean similarity (percent) that must be exceeded to count as a duplicate
    #[arg(long, global = true, env = "PXLPROOF_THRESHOLD")]
    threshold: Option<f64>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register images on the ledger unless a near-duplicate is already there
    Publish {
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
        /// Declared media type (default: from the file extension)
        #[arg(long, value_name = "TYPE")]
        content_type: Option<String>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        #[arg(long)]
        json: bool,
    },

    /// Check images against the ledger without registering them
    Verify {
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
        #[arg(long, value_name = "TYPE")]
        content_type: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Show format, size, color type and animation of an image
    Check {
        file: PathBuf,
        #[arg(long, value_name = "TYPE")]
        content_type: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Print fingerprint records for files or directories
    Hash {
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,
        #[arg(long)]
        json: bool,
    },

    /// Compare two images
    Compare {
        a: PathBuf,
        b: PathBuf,
        #[arg(long)]
        json: bool,
    },

    /// Inspect the ledger file
    Ledger {
        #[command(subcommand)]
        command: LedgerCmd,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        command: ConfigCmd,
    },
}

#[derive(Subcommand, Debug)]
enum LedgerCmd {
    /// List all entries
    List {
        #[arg(long)]
        json: bool,
    },
    /// Verify the hash chain
    Audit {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCmd {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
}

#[derive(Serialize)]
struct FileReport {
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<RegistrationOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct HashLine {
    file: String,
    record: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = effective_config(&cli)?;

    match &cli.command {
        Commands::Publish {
            files,
            content_type,
            yes,
            json,
        } => publish(&config, files, content_type.as_deref(), *yes, *json),

        Commands::Verify {
            files,
            content_type,
            json,
        } => verify(&config, files, content_type.as_deref(), *json),

        Commands::Check {
            file,
            content_type,
            json,
        } => {
            let registry = open_registry(&config)?;
            let upload = read_upload(file, content_type.as_deref())?;
            let report = registry
                .check(&upload)
                .with_context(|| format!("Failed to check {}", file.display()))?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("🖼  {}", file.display());
                println!("   format:   {}", report.format);
                println!("   size:     {}x{}", report.width, report.height);
                println!("   color:    {}", report.color_type);
                println!("   animated: {}", report.is_animated);
                println!("   bytes:    {}", report.size_bytes);
            }
            Ok(())
        }

        Commands::Hash { paths, json } => hash(&config, paths, *json),

        Commands::Compare { a, b, json } => {
            let engine = FingerprintEngine::new(config.resolution)?;
            let aggregator = SimilarityAggregator::new(config.threshold)?;
            let left = fingerprint_file(&engine, a)?;
            let right = fingerprint_file(&engine, b)?;
            let report = aggregator.compare(&left, &right)?;
            let duplicate = aggregator.is_duplicate(&report);

            if *json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "report": report,
                        "threshold": aggregator.threshold(),
                        "duplicate": duplicate,
                    }))?
                );
            } else {
                println!("▶ {} ↔ {}", a.display(), b.display());
                println!("   average:    {:6.2}%", report.average);
                println!("   difference: {:6.2}%", report.difference);
                println!("   perceptual: {:6.2}%", report.perceptual);
                println!("   mean:       {:6.2}%", report.mean);
                if duplicate {
                    println!("🔁 Duplicate (> {:.2}%)", aggregator.threshold());
                } else {
                    println!("✅ Distinct (≤ {:.2}%)", aggregator.threshold());
                }
            }
            Ok(())
        }

        Commands::Ledger { command } => {
            let ledger = FileLedger::new(&config.ledger_path);
            match command {
                LedgerCmd::List { json } => {
                    let entries = ledger.entries()?;
                    if *json {
                        println!("{}", serde_json::to_string_pretty(&entries)?);
                    } else if entries.is_empty() {
                        println!("Ledger {} is empty.", ledger.path().display());
                    } else {
                        println!("🗂️  Ledger {}:", ledger.path().display());
                        for entry in &entries {
                            println!(
                                "[{}] {}\n     record: {}\n     digest: {}\n",
                                entry.index, entry.recorded_at, entry.record, entry.digest
                            );
                        }
                    }
                    Ok(())
                }
                LedgerCmd::Audit { json } => {
                    let audit = ledger.audit()?;
                    if *json {
                        println!("{}", serde_json::to_string_pretty(&audit)?);
                    } else if audit.is_intact() {
                        println!("✅ {} entries, chain intact (head {})", audit.entries, audit.head);
                    }
                    if let Some(index) = audit.broken_at {
                        anyhow::bail!(
                            "Ledger chain broken at entry {}: {}",
                            index,
                            audit.reason.unwrap_or_default()
                        );
                    }
                    Ok(())
                }
            }
        }

        Commands::Config { command } => {
            match command {
                ConfigCmd::Show => println!("{}", serde_json::to_string_pretty(&config)?),
                ConfigCmd::Path => println!(
                    "{}",
                    cli.config
                        .clone()
                        .unwrap_or_else(default_config_path)
                        .display()
                ),
            }
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pxlproof=info")),
        1 => EnvFilter::new("pxlproof=debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Config file, then environment and flags on top.
fn effective_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(ledger) = &cli.ledger {
        config.ledger_path = ledger.clone();
    }
    if let Some(resolution) = cli.resolution {
        config.resolution = resolution;
    }
    if let Some(threshold) = cli.threshold {
        config.threshold = threshold;
    }
    config.validate()?;
    Ok(config)
}

fn open_registry(config: &Config) -> Result<Registry<FileLedger>> {
    Ok(Registry::new(
        FileLedger::new(&config.ledger_path),
        ImageDecoder::new(),
        FingerprintEngine::new(config.resolution)?,
        SimilarityAggregator::new(config.threshold)?,
    ))
}

fn read_upload(path: &Path, content_type: Option<&str>) -> Result<Upload> {
    Upload::from_path(path, content_type)
        .with_context(|| format!("Failed to read {}", path.display()))
}

fn publish(
    config: &Config,
    files: &[PathBuf],
    content_type: Option<&str>,
    yes: bool,
    json: bool,
) -> Result<()> {
    if !yes {
        let proceed = Confirm::new()
            .with_prompt(format!(
                "Publish {} file(s) to {}? Ledger entries cannot be removed",
                files.len(),
                config.ledger_path.display()
            ))
            .default(false)
            .interact()?;
        if !proceed {
            println!("Cancelled; nothing was published.");
            return Ok(());
        }
    }

    let registry = open_registry(config)?;
    let mut reports = Vec::new();

    // In order, so each file sees the records appended before it.
    for file in files {
        let upload = read_upload(file, content_type)?;
        let outcome = registry
            .publish(&upload)
            .with_context(|| format!("Failed to publish {}", file.display()))?;

        if !json {
            match &outcome.matched {
                Some(found) => println!(
                    "🔁 {} already registered (record {}, {:.2}% similar); not published",
                    file.display(),
                    found.index,
                    found.report.mean
                ),
                None if outcome.appended => println!("✅ Published {}", file.display()),
                None => println!("🔁 {} was already on the ledger", file.display()),
            }
            println!("   record: {}", outcome.record);
        }
        reports.push(FileReport {
            file: file.display().to_string(),
            outcome: Some(outcome),
            error: None,
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }
    Ok(())
}

fn verify(config: &Config, files: &[PathBuf], content_type: Option<&str>, json: bool) -> Result<()> {
    let registry = open_registry(config)?;

    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(ProgressStyle::with_template(
        "{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}",
    )?);
    progress.set_message("Verifying…");
    progress.enable_steady_tick(Duration::from_millis(100));

    let reports: Vec<FileReport> = benchmark("verifying", || {
        files
            .par_iter()
            .map(|file| {
                let result = read_upload(file, content_type).and_then(|upload| {
                    registry
                        .verify(&upload)
                        .with_context(|| format!("Failed to verify {}", file.display()))
                });
                progress.inc(1);
                match result {
                    Ok(outcome) => FileReport {
                        file: file.display().to_string(),
                        outcome: Some(outcome),
                        error: None,
                    },
                    Err(e) => FileReport {
                        file: file.display().to_string(),
                        outcome: None,
                        error: Some(format!("{:#}", e)),
                    },
                }
            })
            .collect()
    });
    progress.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            match (&report.outcome, &report.error) {
                (Some(outcome), _) => match &outcome.matched {
                    Some(found) => println!(
                        "🔁 {} matches record {} ({:.2}% similar)",
                        report.file, found.index, found.report.mean
                    ),
                    None => println!("✅ {} is not registered", report.file),
                },
                (None, Some(error)) => eprintln!("❌ {}", error),
                (None, None) => {}
            }
        }
    }

    let failures = reports.iter().filter(|r| r.error.is_some()).count();
    if failures > 0 {
        anyhow::bail!("{} of {} file(s) could not be verified", failures, reports.len());
    }
    Ok(())
}

fn hash(config: &Config, paths: &[PathBuf], json: bool) -> Result<()> {
    let engine = FingerprintEngine::new(config.resolution)?;
    let files = collect_images(paths);
    if !json {
        println!("▶ Fingerprinting {} image(s)…", files.len());
    }

    let lines: Vec<HashLine> = benchmark("fingerprinting", || {
        files
            .par_iter()
            .map(|path| -> Result<HashLine> {
                let fingerprint = fingerprint_file(&engine, path)?;
                Ok(HashLine {
                    file: path.display().to_string(),
                    record: FingerprintStringCodec::encode(&fingerprint),
                })
            })
            .collect::<Result<_>>()
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&lines)?);
    } else {
        for line in &lines {
            println!("{}  {}", line.record, line.file);
        }
    }
    Ok(())
}

/// Files as given; directories walked for files with a known image extension.
fn collect_images(paths: &[PathBuf]) -> Vec<PathBuf> {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("Scanning for images…");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let mut images = Vec::new();
    for path in paths {
        if !path.is_dir() {
            images.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path).into_iter().filter_map(Result::ok) {
            let entry_path = entry.path();
            if entry_path.is_file() && ImageFormat::from_path(entry_path).is_ok() {
                images.push(entry_path.to_path_buf());
            }
            spinner.tick();
        }
    }
    spinner.finish_and_clear();
    images
}

fn fingerprint_file(
    engine: &FingerprintEngine,
    path: &Path,
) -> Result<Fingerprint> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let grid = ImageDecoder::new()
        .decode(&bytes)
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    Ok(engine.compute(&grid))
}

/// Run `f()`, log how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    log::debug!("{} took {:.2?}", label, start.elapsed());
    result
}
