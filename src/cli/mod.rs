//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use clap::{Parser, Subcommand};

/// Notebook Sync - upload tagged reference-manager attachments into a notebook.
#[derive(Parser, Debug)]
#[command(name = "notebook-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload new and changed attachments of a project into the open notebook.
    Sync {
        /// Project name.
        project: String,

        /// Override the configured batch size.
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Only show what would be uploaded.
        #[arg(long)]
        dry_run: bool,
    },

    /// List the attachments a project currently selects.
    Candidates {
        /// Project name.
        project: String,

        /// Mark sync state against this destination id.
        #[arg(short, long)]
        destination: Option<String>,
    },

    /// Manage sync projects.
    Projects {
        #[command(subcommand)]
        action: Option<ProjectAction>,
    },

    /// Show what has been uploaded where.
    Ledger {
        /// Only show this destination.
        #[arg(short, long)]
        destination: Option<String>,

        #[command(subcommand)]
        action: Option<LedgerAction>,
    },

    /// Show recent sync runs.
    Status {
        /// Number of runs to show.
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Write a default configuration file.
    Init,
}

#[derive(Subcommand, Debug)]
pub enum ProjectAction {
    /// List projects (default).
    List,

    /// Add or update a project.
    Add {
        /// Project name.
        #[arg(short, long)]
        name: String,

        /// Tag filter.
        #[arg(short, long, default_value = "")]
        tag: String,

        /// Collection name filter.
        #[arg(short, long, default_value = "")]
        collection: String,

        /// Library id filter.
        #[arg(short, long, default_value = "")]
        library: String,
    },

    /// Remove a project.
    Remove {
        /// Project name.
        name: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum LedgerAction {
    /// Forget everything uploaded to a destination so the next run re-uploads it.
    Forget {
        /// Destination id.
        destination: String,
    },
}
