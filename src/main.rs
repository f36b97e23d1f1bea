//! Kiosk CLI - run, replay and maintain the scanning kiosk

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use colored::Colorize;

use kiosk_flow::archive;
use kiosk_flow::config::KioskConfig;
use kiosk_flow::error::{FixSuggestion, KioskError};
use kiosk_flow::flow::{Cause, Transition};
use kiosk_flow::{headless, maintenance, replay, tui};

#[derive(Parser)]
#[command(name = "kiosk")]
#[command(about = "Kiosk - supervisor and phase sequencer for an unattended scanning kiosk")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the analysis process and run the kiosk
    Run {
        /// Path to kiosk.yaml (defaults to ./kiosk.yaml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// No terminal UI; presentation goes to the log, stdin captures
        #[arg(long)]
        headless: bool,

        /// Log destination while the TUI owns the terminal
        #[arg(long, default_value = "kiosk.log")]
        log_file: PathBuf,
    },

    /// Feed a recorded stdout transcript through the router and state machine
    Replay {
        /// Transcript file (protocol lines plus #wait/#duration/#capture/#error)
        transcript: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Stay in scanning until the message arrives
        #[arg(long)]
        skip_scan_complete: bool,

        /// Go straight back to waiting after the message
        #[arg(long)]
        skip_end: bool,
    },

    /// Validate a config file (parse + sanity checks)
    Validate {
        /// Path to kiosk.yaml
        file: PathBuf,
    },

    /// Show the message archive
    History {
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Empty the archive instead of printing it
        #[arg(long)]
        clear: bool,
    },

    /// Delete captured images and generated voice files
    Purge {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            headless,
            log_file,
        } => run_kiosk(config.as_deref(), headless, &log_file).await,
        Commands::Replay {
            transcript,
            config,
            skip_scan_complete,
            skip_end,
        } => {
            init_tracing();
            replay_transcript(&transcript, config.as_deref(), skip_scan_complete, skip_end)
        }
        Commands::Validate { file } => validate_config(&file),
        Commands::History { config, clear } => show_history(config.as_deref(), clear),
        Commands::Purge { config } => {
            init_tracing();
            purge_storage(config.as_deref())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.downcast_ref::<KioskError>().and_then(|k| k.fix_suggestion()) {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into())
}

/// Log to stderr
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

/// Log to a file, keeping the terminal free for the dashboard
fn init_file_tracing(path: &Path) -> anyhow::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

async fn run_kiosk(config: Option<&Path>, headless: bool, log_file: &Path) -> anyhow::Result<()> {
    if headless {
        init_tracing();
    } else {
        init_file_tracing(log_file)?;
    }

    let config = KioskConfig::load(config)?;

    if headless {
        headless::run(config).await
    } else {
        tui::run(&config).await
    }
}

fn replay_transcript(
    path: &Path,
    config: Option<&Path>,
    skip_scan_complete: bool,
    skip_end: bool,
) -> anyhow::Result<()> {
    let mut config = KioskConfig::load(config)?;
    config.flow.skip_scan_complete |= skip_scan_complete;
    config.flow.skip_end |= skip_end;

    let transcript = fs::read_to_string(path).map_err(KioskError::from)?;
    let report = replay::run(&config, &transcript)?;

    println!("{} Replaying '{}'", "→".cyan(), path.display());
    for timed in &report.transitions {
        println!(
            "  {} {}",
            format!("{:>8.2}s", timed.at.as_secs_f64()).dimmed(),
            paint(&timed.transition)
        );
    }
    if !report.commands.is_empty() {
        println!("  {} {}", "Commands:".dimmed(), report.commands.join(", "));
    }

    println!("{} Final state: {}", "✓".green(), report.final_state.to_string().bold());
    if !report.credit.is_empty() {
        println!("  Credit:  {}", report.credit.yellow());
    }
    if !report.message.is_empty() {
        println!("  Message: {}", report.message);
    }

    Ok(())
}

fn paint(transition: &Transition) -> String {
    let text = transition.to_string();
    match transition.cause {
        Cause::Error(_) | Cause::ScanTimeout => text.red().to_string(),
        Cause::MessageReady => text.yellow().to_string(),
        _ => text.cyan().to_string(),
    }
}

fn validate_config(file: &Path) -> anyhow::Result<()> {
    let config = KioskConfig::from_file(file)?;
    config.validate()?;

    println!("{} Config '{}' is valid", "✓".green(), file.display());
    println!(
        "  Process: {} {}",
        config.process.executable,
        config.process.argv().join(" ")
    );
    println!(
        "  Message: {}s (+{}s padding)  End: {}s",
        config.flow.message_secs, config.flow.message_padding_secs, config.flow.end_secs
    );
    println!("  API host: {}", config.router.api_host);
    println!("  Archive: {}", config.storage.message_log.display());

    Ok(())
}

fn show_history(config: Option<&Path>, clear: bool) -> anyhow::Result<()> {
    let config = KioskConfig::load(config)?;
    let path = &config.storage.message_log;

    if clear {
        archive::clear(path)?;
        println!("{} Cleared '{}'", "✓".green(), path.display());
        return Ok(());
    }

    let entries = archive::read_history(path)?;
    if entries.is_empty() {
        println!("{} No messages in '{}'", "→".cyan(), path.display());
        return Ok(());
    }

    for (i, entry) in entries.iter().enumerate() {
        print!("{:>4}  {}", (i + 1).to_string().dimmed(), entry.message);
        if entry.credit.is_empty() {
            println!();
        } else {
            println!("  {}", format!("({})", entry.credit).yellow());
        }
    }
    println!("{} {} message(s)", "✓".green(), entries.len());

    Ok(())
}

fn purge_storage(config: Option<&Path>) -> anyhow::Result<()> {
    let config = KioskConfig::load(config)?;
    let report = maintenance::purge(&config.storage)?;

    for path in &report.failed {
        eprintln!("  {} could not remove {}", "⚠".yellow(), path.display());
    }
    println!(
        "{} Removed {} file(s) from '{}' and '{}'",
        "✓".green(),
        report.removed.len(),
        config.storage.capture_dir.display(),
        config.storage.voice_dir.display()
    );

    Ok(())
}
