use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};

use relaunch::state::{self, SharedState};
use relaunch::{commands, console, feed, Config, Scheduler, UpdateCycle};

#[derive(Parser, Debug)]
#[command(name = "relaunch")]
#[command(about = "Keep a release artifact up to date and running", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file (defaults to <config dir>/relaunch/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Release feed URL (overrides the config file)
    #[arg(long, global = true)]
    feed: Option<String>,

    /// Exact name of the release asset to run
    #[arg(long, global = true)]
    asset: Option<String>,

    /// Seconds between update checks
    #[arg(long, global = true)]
    interval: Option<u64>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Keep checking for updates and supervise the artifact (default)
    Run,

    /// Show the latest release asset without downloading it
    Check,

    /// Run a single update check, then supervise until the process exits
    Once,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        console::disable_color();
    }

    let config = load_config(&cli)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_command(config),
        Command::Check => check_command(&config),
        Command::Once => once_command(config),
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;

    if let Some(feed) = &cli.feed {
        config.feed_url = feed.clone();
    }
    if let Some(asset) = &cli.asset {
        config.asset_name = asset.clone();
    }
    if let Some(interval) = cli.interval {
        config.poll_interval_secs = interval;
    }

    config.validate()?;
    Ok(config)
}

fn run_command(config: Config) -> Result<()> {
    let state = state::shared();
    let scheduler = start_services(&config, &state)?;

    let (stop_tx, stop_rx) = mpsc::channel();
    install_interrupt_handler(stop_tx, state, config)?;

    scheduler.run(&stop_rx);
    Ok(())
}

fn once_command(config: Config) -> Result<()> {
    let state = state::shared();
    let scheduler = start_services(&config, &state)?;

    let (stop_tx, stop_rx) = mpsc::channel();
    install_interrupt_handler(stop_tx, state, config)?;

    scheduler.run_once(&stop_rx);
    Ok(())
}

fn start_services(config: &Config, state: &SharedState) -> Result<Scheduler> {
    let cycle = UpdateCycle::new(config.clone(), state.clone())
        .context("Failed to create HTTP client")?;

    commands::spawn_listener(state.clone(), config.clone())
        .context("Failed to start the command listener")?;
    console::info("Type 'close' to stop");

    Ok(Scheduler::new(cycle))
}

/// First Ctrl-C stops after the current step, a second one exits at once.
fn install_interrupt_handler(stop: Sender<()>, state: SharedState, config: Config) -> Result<()> {
    let interrupted = AtomicBool::new(false);
    ctrlc::set_handler(move || {
        if interrupted.swap(true, Ordering::SeqCst) {
            state::cleanup(&state, &config);
            process::exit(0);
        }
        console::info("Stopping after the current step (Ctrl-C again to exit now)");
        let _ = stop.send(());
    })
    .context("Failed to install Ctrl-C handler")
}

fn check_command(config: &Config) -> Result<()> {
    let client = feed::client()?;
    let asset = feed::github::resolve(
        &client,
        &config.feed_url,
        &config.asset_name,
        config.request_timeout(),
    )
    .with_context(|| format!("Failed to check {}", config.feed_url))?;

    let tag = if asset.release_tag.is_empty() {
        "(untagged)".to_string()
    } else {
        asset.release_tag.clone()
    };
    println!("{} Latest release: {}", "✓".green(), tag.green());
    println!("  {} ({} bytes)", asset.name, asset.size);
    println!("  {}", asset.url.cyan());

    if config.artifact_path.exists() {
        println!("  {}", format!("{} is present", config.artifact_path.display()).dimmed());
    } else {
        println!(
            "  {}",
            format!("{} not downloaded yet", config.artifact_path.display()).dimmed()
        );
    }

    Ok(())
}
