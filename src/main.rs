// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::io;
use std::path::PathBuf;

use route_verifier::{
    export, get_recent_events, logging, open_or_recover, Config, Extractor, Session,
};

/// Route Verifier: extract package codes from pasted text and check them off
#[derive(Parser, Debug)]
#[command(name = "route-verifier")]
#[command(about = "Checklist for 4-digit package codes", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive checklist (default)
    Tui,
    /// Extract codes from a file (or stdin) and add them to the list
    Extract {
        /// Input file; reads stdin when omitted
        file: Option<PathBuf>,

        /// Show what each rule found without changing the list
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the list with counts
    List {
        /// Only codes containing these digits (up to 4)
        #[arg(long)]
        filter: Option<String>,
    },
    /// Advance a code to its next status
    Cycle { code: String },
    /// Set every code back to unmarked
    UnmarkAll,
    /// Drop every unmarked code
    RemoveUnmarked,
    /// Clear the whole list
    Reset,
    /// Cycle the display theme (auto, dark, light)
    Theme,
    /// Print the summary report
    Report {
        /// Emit code,status rows instead of the text report
        #[arg(long)]
        csv: bool,

        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show recent actions
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let _log_guard = match logging::init_logging(&config.log_dir, "route-verifier", &config.log_level) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("⚠️  Logging disabled: {:#}", e);
            None
        }
    };

    let extractor = Extractor::new(&config.marker)
        .with_context(|| format!("Invalid marker {:?} in config", config.marker))?;
    let (conn, recovery) = open_or_recover(&config.database_path)?;
    if let Some(message) = recovery {
        eprintln!("⚠️  {}", message);
    }
    let mut session = Session::open(conn, extractor);

    match cli.command.unwrap_or(Commands::Tui) {
        Commands::Tui => run_ui_mode(&mut session, &config)?,
        Commands::Extract { file, dry_run } => run_extract(&mut session, file, dry_run)?,
        Commands::List { filter } => run_list(&session, filter.as_deref().unwrap_or(""))?,
        Commands::Cycle { code } => println!("{}", session.cycle(code.trim())),
        Commands::UnmarkAll => println!("{}", session.unmark_all()),
        Commands::RemoveUnmarked => println!("{}", session.remove_unmarked()),
        Commands::Reset => println!("{}", session.reset()),
        Commands::Theme => println!("{}", session.cycle_theme()),
        Commands::Report { csv, output } => run_report(&session, csv, output)?,
        Commands::History { limit } => run_history(&session, limit)?,
    }

    Ok(())
}

fn read_input(file: Option<PathBuf>) -> Result<String> {
    match file {
        Some(path) => fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => io::read_to_string(io::stdin()).context("Failed to read stdin"),
    }
}

fn run_extract(session: &mut Session, file: Option<PathBuf>, dry_run: bool) -> Result<()> {
    let text = read_input(file)?;

    if dry_run {
        let found = session.extractor().extract_tagged(&text);
        if found.is_empty() {
            println!("No codes found");
        }
        for (rule, code) in found {
            println!("{code}  ({})", rule.name());
        }
        return Ok(());
    }

    println!("{}", session.extract_and_merge(&text));
    Ok(())
}

fn run_list(session: &Session, filter: &str) -> Result<()> {
    if filter.len() > 4 || !filter.bytes().all(|b| b.is_ascii_digit()) {
        bail!("Filter must be up to 4 digits, got {:?}", filter);
    }

    let view = session.view(filter);
    if view.is_empty() {
        println!("No codes");
    }
    for entry in &view {
        println!("{}  {}", entry.code, entry.status.label());
    }

    let counts = session.counts();
    println!(
        "\nTotal: {} | Confirmed: {} | Missing: {} | Extra: {} | Unmarked: {}",
        counts.total, counts.confirmed, counts.missing, counts.extra, counts.unmarked
    );

    Ok(())
}

fn run_report(session: &Session, csv: bool, output: Option<PathBuf>) -> Result<()> {
    let text = if csv {
        export::to_csv_string(session.registry())?
    } else {
        session.report()
    };

    match output {
        Some(path) => {
            fs::write(&path, &text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✓ Report written to {}", path.display());
        }
        None => print!("{text}"),
    }

    Ok(())
}

fn run_history(session: &Session, limit: usize) -> Result<()> {
    let events = get_recent_events(session.connection(), limit)?;
    if events.is_empty() {
        println!("No history yet");
    }
    for event in events {
        println!(
            "{}  {:<16} {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.event_type,
            event.data
        );
    }
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(session: &mut Session, config: &Config) -> Result<()> {
    let mut app = ui::App::new(session, config.report_path.clone());
    ui::run_ui(&mut app)?;

    println!("✅ Saved {} codes", session.counts().total);
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_session: &mut Session, _config: &Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the subcommands: route-verifier --help");
    std::process::exit(1);
}
