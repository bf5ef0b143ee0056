//! Notebook Sync - push reference-manager attachments into a notebook.
//!
//! Lists attachments from the reference manager's local connector, works out
//! which ones the open notebook has not received yet, and hands them to a
//! browser automation bridge in small batches.
//!
//! QUICK START:
//!   notebook-sync init                               # Write default config
//!   notebook-sync projects add -n Thesis -t NotebookLM
//!   notebook-sync sync Thesis --dry-run              # Preview uploads
//!   notebook-sync sync Thesis                        # Upload new/changed files
//!   notebook-sync status                             # Recent runs

mod application;
mod cli;
mod domain;
mod infrastructure;

use chrono::Utc;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{
    format_candidates_table, format_ledger_table, format_projects_table, format_runs_table,
    run_record, SyncOutcome, SyncService,
};
use cli::{Cli, Commands, LedgerAction, ProjectAction};
use domain::{AppConfig, AppError, LedgerStore, Project, SourceRepository, StatusReporter};
use infrastructure::{
    config_file_path, ensure_config_exists, load_config, save_config, BridgeClient,
    ConsoleStatus, LocalStorage, RunLock, ZoteroClient,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

/// Main application logic. Returns `false` when a sync run failed.
async fn run(cli: Cli) -> domain::Result<bool> {
    let config = load_config()?;

    match cli.command {
        Commands::Sync {
            project,
            batch_size,
            dry_run,
        } => cmd_sync(&config, &project, batch_size, dry_run).await,
        Commands::Candidates {
            project,
            destination,
        } => {
            cmd_candidates(&config, &project, destination.as_deref()).await?;
            Ok(true)
        }
        Commands::Projects { action } => {
            cmd_projects(config, action.unwrap_or(ProjectAction::List))?;
            Ok(true)
        }
        Commands::Ledger {
            destination,
            action,
        } => {
            cmd_ledger(&config, destination.as_deref(), action)?;
            Ok(true)
        }
        Commands::Status { limit } => {
            cmd_status(&config, limit)?;
            Ok(true)
        }
        Commands::Init => {
            cmd_init()?;
            Ok(true)
        }
    }
}

fn find_project(config: &AppConfig, name: &str) -> domain::Result<Project> {
    config.find_project(name).cloned().ok_or_else(|| AppError::Config {
        message: format!("Project '{name}' not found. Add it with `notebook-sync projects add`."),
    })
}

/// Sync command.
async fn cmd_sync(
    config: &AppConfig,
    project_name: &str,
    batch_size: Option<usize>,
    dry_run: bool,
) -> domain::Result<bool> {
    let project = find_project(config, project_name)?;

    let mut sync_config = config.sync.clone();
    if let Some(size) = batch_size {
        sync_config.batch_size = size;
    }
    sync_config.validate()?;

    // Dry runs never write, so they do not need the lock
    let _lock = if dry_run {
        None
    } else {
        Some(RunLock::acquire(&config.lock_file_path())?)
    };

    let storage = LocalStorage::open(&config.storage_db_path())?;
    let source = ZoteroClient::new(&config.source)?;
    let bridge = BridgeClient::new(&config.delivery)?;
    let status = ConsoleStatus;

    let service = SyncService::new(&source, &bridge, &bridge, &storage, &status, sync_config);

    if dry_run {
        let outcome = service.plan(&project).await?;
        if let SyncOutcome::Planned {
            destination_id,
            documents,
        } = &outcome
        {
            let ledger = storage.load_ledger()?;
            println!();
            println!(
                "{}",
                format_candidates_table(documents, &ledger, Some(destination_id))
            );
        }
        return Ok(outcome.is_success());
    }

    let started_at = Utc::now();
    let result = tokio::select! {
        result = service.run(&project) => result,
        () = shutdown_signal() => {
            status.report("Error: sync interrupted. Run it again to upload the rest.");
            Err(AppError::Interrupted {
                message: "stopped by signal".into(),
            })
        }
    };

    let record = run_record(&project.name, started_at, &result, &storage);

    if let Err(e) = storage.record_run(&record) {
        tracing::warn!("Failed to record run history: {}", e);
    }

    // The outcome has already been reported through the status channel
    Ok(result.is_ok_and(|outcome| outcome.is_success()))
}

/// Candidates command.
async fn cmd_candidates(
    config: &AppConfig,
    project_name: &str,
    destination: Option<&str>,
) -> domain::Result<()> {
    let project = find_project(config, project_name)?;
    let source = ZoteroClient::new(&config.source)?;

    let documents = source.query(&project.query()).await?;

    if documents.is_empty() {
        println!("No items found for project \"{}\".", project.name);
        return Ok(());
    }

    let ledger = LocalStorage::open(&config.storage_db_path())?.load_ledger()?;

    println!("{}", format_candidates_table(&documents, &ledger, destination));
    println!();
    println!(
        "{} {} ({})",
        "Total:".bold(),
        documents.len().to_string().cyan(),
        project.filter_summary()
    );

    Ok(())
}

/// Projects command.
fn cmd_projects(mut config: AppConfig, action: ProjectAction) -> domain::Result<()> {
    match action {
        ProjectAction::List => {
            if config.projects.is_empty() {
                println!("No projects yet. Add one with `notebook-sync projects add -n <name>`.");
            } else {
                println!("{}", format_projects_table(&config.projects));
            }
        }
        ProjectAction::Add {
            name,
            tag,
            collection,
            library,
        } => {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(AppError::Config {
                    message: "Please enter a project name.".into(),
                });
            }

            let replaced = config.upsert_project(Project {
                name: name.clone(),
                tag: tag.trim().to_string(),
                collection: collection.trim().to_string(),
                library_id: library.trim().to_string(),
            });
            save_config(&config)?;

            let verb = if replaced { "Updated" } else { "Added" };
            println!("{} {verb} project {}", "✓".green().bold(), name.cyan());
        }
        ProjectAction::Remove { name } => {
            let removed = config.remove_project(&name).ok_or_else(|| AppError::Config {
                message: format!("Project '{name}' not found"),
            })?;
            save_config(&config)?;
            println!("{} Removed project {}", "✓".green().bold(), removed.name.cyan());
        }
    }

    Ok(())
}

/// Ledger command.
fn cmd_ledger(
    config: &AppConfig,
    destination: Option<&str>,
    action: Option<LedgerAction>,
) -> domain::Result<()> {
    let storage = LocalStorage::open(&config.storage_db_path())?;

    match action {
        Some(LedgerAction::Forget { destination }) => {
            let _lock = RunLock::acquire(&config.lock_file_path())?;
            let removed = storage.forget_destination(&destination)?;
            println!(
                "{} Forgot {} entries for {}",
                "✓".green().bold(),
                removed,
                destination.cyan()
            );
        }
        None => {
            let ledger = storage.load_ledger()?;
            if ledger.is_empty() {
                println!("Nothing has been uploaded yet.");
            } else {
                println!("{}", format_ledger_table(&ledger, destination));
            }
        }
    }

    Ok(())
}

/// Status command.
fn cmd_status(config: &AppConfig, limit: usize) -> domain::Result<()> {
    let storage = LocalStorage::open(&config.storage_db_path())?;
    let runs = storage.recent_runs(limit)?;

    if runs.is_empty() {
        println!("No sync runs recorded.");
    } else {
        println!("{}", format_runs_table(&runs));
    }

    Ok(())
}

/// Init command.
fn cmd_init() -> domain::Result<()> {
    let path = config_file_path();
    if ensure_config_exists()? {
        println!("{} Created {}", "✓".green().bold(), path.display());
    } else {
        println!("Config already exists at {}", path.display());
    }
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
