//! Playbook - evolving strategy playbook
//!
//! CLI entry point with global panic handler.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use playbook::config::{playbook_home, Config};
use playbook::error::{exit_codes, PlaybookError};
use playbook::pipeline::TaskInput;
use playbook::storage::FileHistoryStore;

// =============================================================================
// CLI Definition
// =============================================================================

/// Playbook - learn strategies from a produce/critique/reconcile cycle
#[derive(Parser)]
#[command(name = "playbook")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one cycle for a history, answering stages from a responses file
    Cycle {
        /// History to run the cycle against (created if missing)
        history: String,
        /// Task question
        #[arg(long)]
        question: String,
        /// Additional task context
        #[arg(long)]
        context: Option<String>,
        /// Expected answer, shown to the critique stage
        #[arg(long)]
        ground_truth: Option<String>,
        /// JSON file with scripted responses per stage
        #[arg(long)]
        responses: PathBuf,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Render a history's playbook
    Show {
        history: String,
        /// Only show these entry ids
        #[arg(long = "id")]
        ids: Vec<String>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Show playbook and cycle statistics for a history
    Stats {
        history: String,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Apply an edit batch file to a history
    Apply {
        history: String,
        /// JSON file with {"reasoning", "operations"}
        batch: PathBuf,
        /// Report without saving
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Apply an outcome tag file to a history
    Tag {
        history: String,
        /// JSON file with [{"id", "tag"}]
        tags: PathBuf,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// List stored histories
    Histories {
        /// Maximum number of histories to show
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Export a history's playbook snapshot
    Export {
        history: String,
        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Import a playbook snapshot into a history
    Import {
        history: String,
        /// Snapshot file
        input: PathBuf,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> ExitCode {
    setup_panic_handler();
    setup_logging();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("playbook error: {}", e);
            ExitCode::from(exit_codes::ERROR as u8)
        }
    }
}

/// Log to stderr, filtered by `PLAYBOOK_LOG` (default `warn`).
fn setup_logging() {
    let filter = EnvFilter::try_from_env("PLAYBOOK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("playbook panic: {}", info);

        if let Some(home) = playbook_home() {
            let crash_log = home.join("crash.log");
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&crash_log)
            {
                let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
                let _ = writeln!(file, "[{}] {}", timestamp, info);
            }
        }

        std::process::exit(exit_codes::ERROR);
    }));
}

fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;
    let config = Config::load_from_cwd(&cwd);

    match cli.command {
        Commands::Cycle {
            history,
            question,
            context,
            ground_truth,
            responses,
            json,
            quiet,
        } => {
            let mut task = TaskInput::new(question);
            if let Some(context) = context {
                task = task.with_context(context);
            }
            if let Some(ground_truth) = ground_truth {
                task = task.with_ground_truth(ground_truth);
            }
            run_cycle(&history, task, &responses, json, quiet, config)
        }
        Commands::Show {
            history,
            ids,
            json,
            quiet,
        } => run_show(&history, ids, json, quiet, &config),
        Commands::Stats {
            history,
            json,
            quiet,
        } => run_stats(&history, json, quiet, &config),
        Commands::Apply {
            history,
            batch,
            dry_run,
            json,
            quiet,
        } => run_apply(&history, &batch, dry_run, json, quiet, config),
        Commands::Tag {
            history,
            tags,
            json,
            quiet,
        } => run_tag(&history, &tags, json, quiet, config),
        Commands::Histories { limit, json, quiet } => run_histories(limit, json, quiet, &config),
        Commands::Export {
            history,
            output,
            json,
            quiet,
        } => run_export(&history, output.as_deref(), json, quiet, &config),
        Commands::Import {
            history,
            input,
            json,
            quiet,
        } => run_import(&history, &input, json, quiet, &config),
    }
}

// =============================================================================
// Command Implementations
// =============================================================================

fn open_store(config: &Config) -> Result<FileHistoryStore, PlaybookError> {
    match config.histories_dir() {
        Some(dir) => FileHistoryStore::with_dir(dir),
        None => FileHistoryStore::new(),
    }
}

fn print_output(text: &str) {
    if !text.is_empty() {
        println!("{}", text);
    }
}

fn success_to_exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::from(exit_codes::SUCCESS as u8)
    } else {
        ExitCode::from(exit_codes::ERROR as u8)
    }
}

fn run_cycle(
    history: &str,
    task: TaskInput,
    responses: &Path,
    json: bool,
    quiet: bool,
    config: Config,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use playbook::cli::{CycleCommand, CycleOptions};

    let store = open_store(&config)?;
    let cmd = CycleCommand::new(store, config);
    let options = CycleOptions { json, quiet };

    let output = cmd.run(history, task, responses, &options);
    print_output(&cmd.format_output(&output, &options));

    Ok(ExitCode::from(output.exit_code() as u8))
}

fn run_show(
    history: &str,
    ids: Vec<String>,
    json: bool,
    quiet: bool,
    config: &Config,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use playbook::cli::{ShowCommand, ShowOptions};

    let cmd = ShowCommand::new(open_store(config)?);
    let options = ShowOptions { json, quiet, ids };

    let output = cmd.run(history, &options);
    print_output(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_stats(
    history: &str,
    json: bool,
    quiet: bool,
    config: &Config,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use playbook::cli::{StatsCommand, StatsOptions};

    let cmd = StatsCommand::new(open_store(config)?);
    let options = StatsOptions { json, quiet };

    let output = cmd.run(history, &options);
    print_output(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_apply(
    history: &str,
    batch: &Path,
    dry_run: bool,
    json: bool,
    quiet: bool,
    config: Config,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use playbook::cli::{ApplyCommand, ApplyOptions};

    let store = open_store(&config)?;
    let cmd = ApplyCommand::new(store, config);
    let options = ApplyOptions {
        json,
        quiet,
        dry_run,
    };

    let output = cmd.run(history, batch, &options);
    print_output(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_tag(
    history: &str,
    tags: &Path,
    json: bool,
    quiet: bool,
    config: Config,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use playbook::cli::{TagCommand, TagOptions};

    let store = open_store(&config)?;
    let cmd = TagCommand::new(store, config);
    let options = TagOptions { json, quiet };

    let output = cmd.run(history, tags, &options);
    print_output(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_histories(
    limit: usize,
    json: bool,
    quiet: bool,
    config: &Config,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use playbook::cli::{HistoriesCommand, HistoriesOptions};

    let cmd = HistoriesCommand::new(open_store(config)?);
    let options = HistoriesOptions { json, quiet, limit };

    let output = cmd.run(&options);
    print_output(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_export(
    history: &str,
    output_path: Option<&Path>,
    json: bool,
    quiet: bool,
    config: &Config,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use playbook::cli::{ExportCommand, ExportOptions};

    let cmd = ExportCommand::new(open_store(config)?);
    let options = ExportOptions { json, quiet };

    let output = cmd.run(history, output_path, &options);
    print_output(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_import(
    history: &str,
    input: &Path,
    json: bool,
    quiet: bool,
    config: &Config,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use playbook::cli::{ImportCommand, ImportOptions};

    let cmd = ImportCommand::new(open_store(config)?);
    let options = ImportOptions { json, quiet };

    let output = cmd.run(history, input, &options);
    print_output(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}
