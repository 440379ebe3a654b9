// src/lib.rs

pub mod build;
pub mod cache;
pub mod cli;
pub mod config;
pub mod errors;
pub mod filer;
pub mod fs;
pub mod logging;
pub mod paths;
pub mod source;
pub mod watch;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::build::{BuilderRegistry, NoopBuilder};
use crate::cli::CliArgs;
use crate::config::{BuildConfigInput, ConfigFile, load_and_validate};
use crate::filer::{FileChange, Filer, FilerOptions, InitSummary};
use crate::fs::{FileSystem, RealFileSystem};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the filer and its builders
/// - (optional) file watcher
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let cfg = load_and_validate(&args.config, fs.as_ref())?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let builders = default_builders(&cfg)?;
    let filer = Filer::new(FilerOptions::from_config(&cfg, fs, builders));

    let summary = filer.init().await?;
    print_summary(&summary);

    if args.once {
        return Ok(());
    }

    let (tx, mut rx) = mpsc::channel::<FileChange>(256);
    let _watcher = watch::spawn_watcher(filer.paths().source(), tx)?;
    info!(source = filer.paths().source(), "watching for changes");

    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    eprintln!("failed to listen for Ctrl+C: {e}");
                }
                info!("shutdown requested");
                break;
            }
            change = rx.recv() => {
                let Some(change) = change else {
                    debug!("watcher channel closed");
                    break;
                };
                match filer.on_change(change.clone()).await {
                    Ok(outcome) => debug!(
                        id = %change.id,
                        builds = outcome.builds,
                        dependents = outcome.dependents.len(),
                        "change handled"
                    ),
                    Err(err) => error!(id = %change.id, "failed to handle change: {err}"),
                }
            }
        }
    }

    Ok(())
}

/// Builders available from the CLI: copy-through for the configured extensions.
fn default_builders(cfg: &ConfigFile) -> Result<BuilderRegistry> {
    let mut builders = BuilderRegistry::new();
    let noop = Arc::new(NoopBuilder);
    for ext in &cfg.filer.copy_extensions {
        builders.register(ext, noop.clone())?;
    }
    Ok(builders)
}

fn print_summary(summary: &InitSummary) {
    println!(
        "filer: {} files, {} built, {} restored from cache, {} stale cache entries removed",
        summary.files,
        summary.built,
        summary.hydrated,
        summary.cleaned.len()
    );
    for cycle in &summary.cycles {
        println!("  import cycle: {}", cycle.join(" -> "));
    }
}

/// Simple dry-run output: print the resolved layout and build configs.
fn print_dry_run(cfg: &ConfigFile) {
    println!("filer dry-run");
    println!("  root = {}", cfg.paths.root());
    println!("  source_dir = {}", cfg.paths.source());
    println!("  mode = {}", cfg.filer.mode());
    println!("  max_concurrency = {}", cfg.filer.max_concurrency);
    println!("  cache_write_delay_ms = {}", cfg.filer.cache_write_delay_ms);
    if let Some(ref prefix) = cfg.filer.externals_prefix {
        println!("  externals_prefix = {prefix}");
    }
    if !cfg.filer.copy_extensions.is_empty() {
        println!("  copy_extensions = {:?}", cfg.filer.copy_extensions);
    }
    println!();

    println!("builds ({}):", cfg.build_configs.len());
    for config in &cfg.build_configs {
        println!("  - {} ({})", config.name, config.platform.as_str());
        for input in config.input.iter() {
            match input {
                BuildConfigInput::Path(path) => println!("      input: {path}"),
                BuildConfigInput::Filter(filter) => {
                    println!("      filter: {:?}", filter.patterns())
                }
            }
        }
    }

    debug!("dry-run complete (nothing built)");
}
