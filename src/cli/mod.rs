use crate::audit::AuditLogger;
use crate::layout::DirectoryLayout;
use crate::scanner::{Entry, ScanResult};
use crate::utils::{format_age, format_size};
use crate::{CleanOutcome, Config, Scanner, TemporaryCleaner};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use prettytable::{format, Cell, Row, Table};
use serde_json::json;
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "temp-sweeper")]
#[command(version, long_about = None)]
#[command(about = "Project directory helpers and a temporary directory cleaner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Project directory (overrides `project_dir` from config)
    #[arg(short, long, global = true)]
    pub project_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List files and directories below a path
    Scan {
        /// Directory to scan (defaults to the temporary directory)
        path: Option<PathBuf>,

        /// Only list direct children
        #[arg(long)]
        no_recursive: bool,

        /// Leave directories out of the listing
        #[arg(long)]
        hide_dirs: bool,

        /// Output directories and files as separate lists (with --json)
        #[arg(long)]
        separate: bool,

        /// Output scan results as JSON (machine-readable)
        #[arg(long)]
        json: bool,
    },

    /// Remove old files and empty directories
    Clean {
        /// Directory to clean (defaults to the temporary directory)
        path: Option<PathBuf>,

        /// Remove files older than N days
        #[arg(long)]
        older_than: Option<u32>,

        /// Keep directories left empty
        #[arg(long)]
        keep_empty_dirs: bool,

        /// Dry run - don't actually delete
        #[arg(long)]
        dry_run: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Output the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the project directory layout
    Paths {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the temporary directory (or a child of it), creating it if missing
    TempDir {
        /// Child directory below the temporary directory
        child: Option<String>,
    },

    /// Create an empty, uniquely named temporary file and print its path
    TempFile {
        /// Child directory below the temporary directory
        #[arg(long)]
        child: Option<String>,

        /// File name prefix
        #[arg(long, default_value = "")]
        prefix: String,
    },

    /// Generate default config file
    InitConfig {
        /// Output path for config file
        path: Option<PathBuf>,
    },

    /// Query audit logs
    Audit {
        #[command(subcommand)]
        command: AuditCommands,
    },
}

#[derive(Subcommand)]
pub enum AuditCommands {
    /// List recent runs
    List {
        /// Show only top N runs
        #[arg(long, default_value = "20")]
        top: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show all records for a run
    Show {
        /// Run id
        #[arg(long)]
        run: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export audit records as JSON
    Export {
        /// Optional run id to export only one run
        #[arg(long)]
        run: Option<String>,
        /// Output path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let mut config = if let Some(config_path) = &self.config {
            Config::load(config_path)?
        } else {
            Config::load_or_default(Config::default_path())?
        };
        if let Some(project_dir) = self.project_dir {
            config.project_dir = Some(project_dir);
        }

        match self.command {
            Commands::Scan {
                path,
                no_recursive,
                hide_dirs,
                separate,
                json,
            } => run_scan(path, !no_recursive, hide_dirs, separate, json, &config),
            Commands::Clean {
                path,
                older_than,
                keep_empty_dirs,
                dry_run,
                verbose,
                json,
            } => run_clean(
                path,
                older_than,
                keep_empty_dirs,
                dry_run,
                verbose,
                json,
                &config,
            ),
            Commands::Paths { json } => run_paths(json, &config),
            Commands::TempDir { child } => {
                let layout = DirectoryLayout::from_config(&config)?;
                let path = layout.temporary_directory(child.as_deref())?;
                println!("{}", path.display());
                Ok(())
            }
            Commands::TempFile { child, prefix } => {
                let layout = DirectoryLayout::from_config(&config)?;
                let path = layout.create_temporary_file(child.as_deref(), &prefix)?;
                println!("{}", path.display());
                Ok(())
            }
            Commands::InitConfig { path } => init_config(path),
            Commands::Audit { command } => run_audit(command, &config),
        }
    }
}

/// Explicit path, or the layout's temporary directory
fn resolve_root(path: Option<PathBuf>, config: &Config) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path),
        None => Ok(DirectoryLayout::from_config(config)?
            .temporary_dir()
            .to_path_buf()),
    }
}

fn run_scan(
    path: Option<PathBuf>,
    recursive: bool,
    hide_dirs: bool,
    separate: bool,
    json_output: bool,
    config: &Config,
) -> Result<()> {
    let root = resolve_root(path, config)?;
    let result = Scanner::new(&root)
        .recursive(recursive)
        .hide_directories(hide_dirs)
        .with_metadata(true)
        .separate(separate)
        .scan();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if result.is_empty() {
        if root.is_dir() {
            println!("{}", "Directory is empty.".yellow());
        } else {
            println!(
                "{} {}",
                "Not a directory:".yellow(),
                root.display().to_string().bold()
            );
        }
        return Ok(());
    }

    display_entries(&root, result);
    Ok(())
}

fn display_entries(root: &Path, result: ScanResult) {
    let now = Utc::now();
    let entries = result.into_flat();
    let total_size: u64 = entries
        .iter()
        .map(|entry| match entry {
            Entry::File(file) => file.size(),
            Entry::Directory(_) => 0,
        })
        .sum();

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.set_titles(Row::new(vec![
        Cell::new("Type"),
        Cell::new("Path"),
        Cell::new("Size"),
        Cell::new("Age"),
    ]));

    for entry in &entries {
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let row = match entry {
            Entry::Directory(_) => vec![
                Cell::new("dir"),
                Cell::new(&format!("{}/", relative.display())),
                Cell::new(""),
                Cell::new(""),
            ],
            Entry::File(file) => {
                let age = file
                    .meta
                    .as_ref()
                    .map(|meta| format_age(now - meta.modified))
                    .unwrap_or_default();
                vec![
                    Cell::new("file"),
                    Cell::new(&relative.display().to_string()),
                    Cell::new(&format_size(file.size())),
                    Cell::new(&age),
                ]
            }
        };
        table.add_row(Row::new(row));
    }

    println!("{}", root.display().to_string().cyan().bold());
    table.printstd();
    println!(
        "\n{} {} ({})",
        entries.len().to_string().green().bold(),
        "entries".bold(),
        format_size(total_size).green()
    );
}

fn run_clean(
    path: Option<PathBuf>,
    older_than: Option<u32>,
    keep_empty_dirs: bool,
    dry_run: bool,
    verbose: bool,
    json_output: bool,
    config: &Config,
) -> Result<()> {
    let layout = DirectoryLayout::from_config(config)?;
    let mut options = config.clean_options();
    if let Some(days) = older_than {
        options.older_than_days = days;
    }
    if keep_empty_dirs {
        options.clean_empty_dirs = false;
    }
    options.dry_run = dry_run;
    options.verbose = verbose && !json_output;
    options.progress = !json_output && std::io::stderr().is_terminal();

    let cleaner =
        TemporaryCleaner::with_options(options).with_audit(AuditLogger::from_config(config));

    if !json_output {
        println!(
            "{} {}",
            "Cleaning files older than".cyan().bold(),
            format!("{} days", cleaner.options().older_than_days).cyan().bold()
        );
    }

    let outcome = match path {
        Some(path) => cleaner.clean(path),
        None => layout.clean_temporary_directory(&cleaner)?,
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }

    if outcome.failed_count > 0 {
        anyhow::bail!("{} entries could not be removed", outcome.failed_count);
    }
    Ok(())
}

fn print_outcome(outcome: &CleanOutcome) {
    let verb = if outcome.dry_run { "Would remove" } else { "Removed" };
    println!(
        "{} {} files ({}), {} directories",
        verb.green().bold(),
        outcome.files_removed.to_string().green().bold(),
        outcome.size_freed_human().green(),
        outcome.directories_removed.to_string().green().bold()
    );

    if outcome.failed_count > 0 {
        println!(
            "{} {}",
            "Failed:".red().bold(),
            outcome.failed_count.to_string().red()
        );
        for error in &outcome.errors {
            eprintln!("  {} {}", "✗".red(), error);
        }
    }

    if let Some(run_id) = &outcome.run_id {
        println!("  Audit run: {}", run_id.bright_black());
    }
}

fn run_paths(json_output: bool, config: &Config) -> Result<()> {
    let layout = DirectoryLayout::from_config(config)?;
    let paths = [
        ("project", layout.project_dir()),
        ("source", layout.source_dir()),
        ("cache", layout.cache_dir()),
        ("logs", layout.logs_dir()),
        ("libraries", layout.libraries_dir()),
        ("temporary", layout.temporary_dir()),
        ("public", layout.public_dir()),
    ];

    if json_output {
        let map: serde_json::Map<String, serde_json::Value> = paths
            .iter()
            .map(|(name, path)| (name.to_string(), json!(path.display().to_string())))
            .collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }

    for (name, path) in paths {
        let marker = if path.is_dir() {
            "".normal()
        } else {
            " [MISSING]".bright_black()
        };
        println!("{:>10}  {}{}", name.cyan(), path.display(), marker);
    }
    Ok(())
}

fn init_config(path: Option<PathBuf>) -> Result<()> {
    let config_path = match path {
        Some(path) => path,
        None => Config::ensure_config_dir()?,
    };

    let config = Config::default();
    config.save(&config_path)?;

    println!(
        "{} {}",
        "Config file created:".green().bold(),
        config_path.display()
    );

    Ok(())
}

fn run_audit(command: AuditCommands, config: &Config) -> Result<()> {
    let logger = AuditLogger::from_config(config);
    match command {
        AuditCommands::List { top, json } => {
            let runs = logger.list_runs()?;
            let shown = runs.into_iter().take(top).collect::<Vec<_>>();
            if json {
                println!("{}", serde_json::to_string_pretty(&shown)?);
                return Ok(());
            }
            if shown.is_empty() {
                println!("{}", "No audit runs found.".yellow());
                println!("  Log path: {}", logger.path().display());
                return Ok(());
            }
            println!("{}", "Audit runs:".cyan().bold());
            println!("  Log path: {}", logger.path().display());
            for run in shown {
                let mode = if run.dry_run { "dry-run" } else { "clean" };
                println!(
                    "  {}  {}  {}  files={} dirs={} failed={} freed={}",
                    run.run_id.cyan().bold(),
                    mode.bright_black(),
                    run.root
                        .as_ref()
                        .map_or_else(|| String::from("?"), |root| root.display().to_string()),
                    run.files_removed.to_string().green(),
                    run.directories_removed.to_string().green(),
                    run.failed.to_string().red(),
                    format_size(run.freed_bytes).green()
                );
            }
        }
        AuditCommands::Show { run, json } => {
            let records = logger.records_for_run(&run)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
                return Ok(());
            }
            if records.is_empty() {
                println!("{}", "No records found for this run.".yellow());
                return Ok(());
            }
            println!("{}", format!("Audit run {}", run).cyan().bold());
            for record in records {
                println!("{}", serde_json::to_string(&record)?);
            }
        }
        AuditCommands::Export { run, output } => {
            let records = if let Some(run) = run {
                logger.records_for_run(&run)?
            } else {
                logger.read_records()?
            };
            let content = serde_json::to_string_pretty(&records)?;
            if let Some(output) = output {
                fs::write(&output, content)
                    .with_context(|| format!("Failed to write export: {}", output.display()))?;
                println!(
                    "{} {}",
                    "Exported audit to".green().bold(),
                    output.display()
                );
            } else {
                println!("{}", content);
            }
        }
    }
    Ok(())
}
