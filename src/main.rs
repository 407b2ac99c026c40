//! SchemaFlow Migrate - migration script generator
//!
//! Reads a batch of detected schema changes and writes a transactional,
//! idempotent SQL Server migration plus its manual rollback:
//! - `generate`: change batch JSON -> forward and reverse scripts (optionally segmented)
//! - `split`: any script -> per-object segments with a manifest
//! - `reconstruct`: segments + manifest -> the original script

use anyhow::Context;
use clap::{Parser, Subcommand};
use schemaflow_migrate::change::load_batch;
use schemaflow_migrate::config::Settings;
use schemaflow_migrate::pipeline::MigrationPipeline;
use schemaflow_migrate::segment::{load_segments, ScriptSegmenter};
use schemaflow_migrate::MigrationError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Dependency-ordered SQL Server migrations from detected schema changes.
#[derive(Parser)]
#[command(name = "schemaflow-migrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate forward and rollback scripts from a change batch.
    Generate {
        /// JSON array of change records.
        #[arg(short, long)]
        changes: PathBuf,

        /// Target database for `USE [...]`.
        #[arg(short, long, env = "MIGRATION_DATABASE")]
        database: Option<String>,

        /// Output directory (defaults to MIGRATION_OUTPUT_DIR or `migrations`).
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Also split both scripts into per-object segments.
        #[arg(long)]
        segment: bool,
    },

    /// Split a script into per-object segments with a manifest.
    Split {
        /// Script to split.
        #[arg(short, long)]
        script: PathBuf,

        /// Segment directory (defaults to the script path without extension).
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Rebuild a script from a segment directory.
    Reconstruct {
        /// Directory holding `manifest.json` and the segment files.
        #[arg(short, long)]
        dir: PathBuf,

        /// Write here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_json);

    let mut settings = Settings::load()?;
    info!("📋 Configuration loaded (history table {})", settings.history.qualified());

    match cli.command {
        Commands::Generate {
            changes,
            database,
            output_dir,
            segment,
        } => {
            if let Some(dir) = output_dir {
                settings.output.directory = dir;
            }
            settings.output.segment |= segment;
            generate(settings, &changes, database.as_deref().unwrap_or_default())
        }
        Commands::Split { script, output_dir } => {
            let dir = output_dir.unwrap_or_else(|| script.with_extension(""));
            split(&settings, &script, &dir)
        }
        Commands::Reconstruct { dir, output } => reconstruct(&dir, output.as_deref()),
    }
}

fn generate(settings: Settings, changes: &Path, database: &str) -> anyhow::Result<()> {
    let records = load_batch(changes)
        .with_context(|| format!("loading change batch {}", changes.display()))?;

    let pipeline = MigrationPipeline::new(settings);
    let artifacts = match pipeline.generate(&records, database) {
        Ok(artifacts) => artifacts,
        Err(err) => {
            if let MigrationError::Generation {
                migration_id,
                partial_script,
                ..
            } = &err
            {
                let dir = &pipeline.settings().output.directory;
                fs::create_dir_all(dir)?;
                let path = dir.join(format!("{}_failed.sql", migration_id));
                fs::write(&path, partial_script)?;
                error!("❌ Partial script kept for review at {}", path.display());
            }
            return Err(err.into());
        }
    };

    let written = pipeline.write(&artifacts)?;
    info!("🚀 Forward script:  {}", written.forward_path.display());
    info!("⏪ Rollback script: {}", written.reverse_path.display());
    if let Some((forward_dir, reverse_dir)) = &written.segment_dirs {
        info!("📦 Segments: {} and {}", forward_dir.display(), reverse_dir.display());
    }
    if !artifacts.warnings.is_empty() {
        warn!(
            "⚠️  {} destructive change(s); review before applying",
            artifacts.warnings.len()
        );
    }
    Ok(())
}

fn split(settings: &Settings, script: &Path, dir: &Path) -> anyhow::Result<()> {
    let content = fs::read_to_string(script)
        .with_context(|| format!("reading script {}", script.display()))?;
    let original = script
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| script.display().to_string());

    let segmented = ScriptSegmenter::new(&settings.actor).split(
        &content,
        &original,
        &format!("Segmented from {}", original),
    );
    segmented.write_to(dir)?;
    Ok(())
}

fn reconstruct(dir: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let loaded = load_segments(dir)?;
    let script = ScriptSegmenter::reconstruct(&loaded.manifest, &loaded.segments)?;

    match output {
        Some(path) => {
            fs::write(path, &script)?;
            info!("🧩 Rebuilt {} into {}", loaded.manifest.original_script, path.display());
        }
        None => print!("{}", script),
    }
    Ok(())
}

/// Initialize tracing subscriber for structured logging. Logs go to stderr
/// so `reconstruct` can stream the script on stdout.
fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,schemaflow_migrate=debug"));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    }
}
