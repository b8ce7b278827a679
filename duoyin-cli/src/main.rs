use anyhow::Context;
use clap::{Parser, Subcommand};
use duoyin::dict::load_candidates;
use duoyin::pipeline::{BuildOutcome, CheckpointManager, Pipeline};
use duoyin::utils::dict_cache::fetch_sources;
use duoyin::PinyinCapability;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

mod config;
use config::{expand_path, AppConfig};

/// Exit status after an interrupted build, as for SIGINT
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Subcommand, Debug, Clone)]
enum Mode {
    /// Download the word lists and build the polyphone dictionary
    #[command(alias = "b")]
    Build {
        /// Path of the generated JS module
        /// Default: `output` from config
        #[arg(short = 'o', long = "output", value_name = "OUTPUT_PATH")]
        output: Option<String>,

        /// Directory for cached downloads and progress.json
        #[arg(long = "cache-dir", value_name = "DIR")]
        cache_dir: Option<String>,

        /// Number of concurrent workers
        #[arg(short = 'j', long = "workers")]
        workers: Option<usize>,

        /// Phrases per batch
        #[arg(long = "batch-size")]
        batch_size: Option<usize>,

        /// Ignore and delete any saved progress before starting
        #[arg(long = "fresh")]
        fresh: bool,
    },

    /// Show configuration paths and current settings
    #[command(name = "config", alias = "cfg")]
    Config {
        /// Show all configuration paths
        #[arg(long)]
        paths: bool,

        /// Initialize config file in global config directory
        #[arg(long)]
        init: bool,
    },
}

#[derive(Parser, Debug, Clone)]
#[command(name = "duoyin")]
#[command(version)]
#[command(about = "Build a dictionary of Chinese polyphonic characters and phrases")]
#[command(after_help = "Configuration files are loaded from (highest to lowest priority):
  1. --config <file>
  2. Environment variables (DUOYIN_*)
  3. ./duoyin.toml (local)
  4. $XDG_CONFIG_HOME/duoyin/config.toml (global)

Run 'duoyin config --paths' to see configuration paths.
Run 'duoyin config --init' to create a default config file.")]
struct Cli {
    /// Path to a custom config file (highest priority)
    #[arg(short = 'c', long = "config", value_name = "CONFIG_FILE", global = true)]
    config_file: Option<String>,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    mode: Option<Mode>,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "duoyin=debug" } else { "duoyin=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// First Ctrl-C asks the pipeline to stop and save; a second one exits at once
fn install_interrupt_handler(stop: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        if stop.swap(true, Ordering::SeqCst) {
            eprintln!("Received second interrupt, exiting immediately.");
            std::process::exit(EXIT_INTERRUPTED);
        }
        eprintln!("Interrupt received, finishing in-flight batches and saving progress...");
    })
    .context("Error setting Ctrl-C handler")
}

fn show_config(config_file: Option<&str>, paths: bool, init: bool) -> anyhow::Result<()> {
    if paths {
        AppConfig::print_paths();
    }
    if init {
        let path = AppConfig::ensure_config_exists().context("Failed to create config")?;
        println!("Config file: {}", path.display());
    }
    if !paths && !init {
        AppConfig::print_paths();
        println!();
        let config = AppConfig::load(config_file).context("Failed to load config")?;
        println!("Current configuration:");
        println!("  output: {}", config.output);
        println!("  cache_dir: {}", config.cache_dir);
        println!("  workers: {}", config.workers);
        println!("  batch_size: {}", config.batch_size);
        println!("  checkpoint_interval: {}", config.checkpoint_interval);
        match config.batch_timeout_secs {
            Some(secs) => println!("  batch_timeout_secs: {}", secs),
            None => println!("  batch_timeout_secs: (none)"),
        }
        for source in &config.sources {
            println!(
                "  source: {} ({:?}, {:?}) {}",
                source.name, source.format, source.tokenize, source.url
            );
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mode = cli.mode.clone().unwrap_or(Mode::Build {
        output: None,
        cache_dir: None,
        workers: None,
        batch_size: None,
        fresh: false,
    });

    let (output, cache_dir, workers, batch_size, fresh) = match mode {
        Mode::Config { paths, init } => return show_config(cli.config_file.as_deref(), paths, init),
        Mode::Build {
            output,
            cache_dir,
            workers,
            batch_size,
            fresh,
        } => (output, cache_dir, workers, batch_size, fresh),
    };

    let mut app_config = match AppConfig::load(cli.config_file.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Failed to load config file: {}", e);
            eprintln!("Using default configuration.");
            AppConfig::default()
        }
    };
    // CLI takes priority over config
    if let Some(output) = output {
        app_config.output = output;
    }
    if let Some(cache_dir) = cache_dir {
        app_config.cache_dir = cache_dir;
    }
    if let Some(workers) = workers {
        app_config.workers = workers;
    }
    if let Some(batch_size) = batch_size {
        app_config.batch_size = batch_size;
    }

    init_tracing(cli.verbose || app_config.verbose);

    let output_path: PathBuf = app_config.expanded_output();
    let cache_dir = app_config.expanded_cache_dir();
    let checkpoint = CheckpointManager::in_dir(&cache_dir);
    if fresh {
        checkpoint.clear().context("Failed to remove saved progress")?;
    }

    let stop = Arc::new(AtomicBool::new(false));
    install_interrupt_handler(Arc::clone(&stop))?;

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(async {
        tracing::info!("Loading dictionary sources...");
        let raw = fetch_sources(&app_config.sources, &cache_dir).await;
        let candidates = load_candidates(&raw);
        drop(raw);

        let pipeline = Pipeline::with_stop(
            Arc::new(PinyinCapability::new()),
            app_config.scheduler_options(),
            checkpoint,
            stop,
        );
        pipeline.build(&candidates, &output_path).await
    });

    match outcome.with_context(|| format!("Build failed (output {})", expand_path(&app_config.output)))? {
        BuildOutcome::Built(dictionary) => {
            println!("Done!");
            println!("- Polyphonic characters: {}", dictionary.chars.len());
            println!("- Polyphonic phrases: {}", dictionary.phrases.len());
            Ok(())
        }
        BuildOutcome::Interrupted {
            current_index,
            processed,
        } => {
            eprintln!(
                "Interrupted at index {} ({} phrases processed). Run again to resume.",
                current_index, processed
            );
            std::process::exit(EXIT_INTERRUPTED);
        }
    }
}
