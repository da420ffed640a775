//! # Harvest dashboard CLI (`harvest-dash`)
//!
//! Follows document-phase jobs and harvest jobs on a harvesting backend
//! from the terminal. Every command that starts work keeps polling and
//! printing until that work reaches a final state.
//!
//! ```bash
//! harvest-dash sites
//! harvest-dash documents 1 --page 2
//! harvest-dash phase start 42 download --site 1
//! harvest-dash phase action 42 download stop --job j1
//! harvest-dash harvest launch --site 1 --tasks collect,download
//! harvest-dash harvest resume h1
//! ```

mod commands;
mod config;
mod logging;
mod render;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dashboard_core::{DocumentId, JobAction, Phase, SiteId};
use log::LevelFilter;

use crate::config::{AppConfig, DEFAULT_CONFIG_FILE};

/// Terminal client for the harvesting dashboard.
///
/// Settings come from a RON file (`dashboard.ron` by default); a missing
/// file means defaults.
#[derive(Parser)]
#[command(name = "harvest-dash", version)]
struct Cli {
    /// Path to the RON configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Backend API address, overriding the configuration file.
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Log at debug level.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// List harvested sites.
    Sites,

    /// List one page of a site's documents with per-phase status.
    Documents {
        site: SiteId,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long)]
        page_size: Option<u32>,

        /// Only documents with work in this phase.
        #[arg(long)]
        phase: Option<Phase>,

        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        collection: Option<String>,
    },

    /// Start or control a single document phase.
    Phase {
        #[command(subcommand)]
        command: PhaseCommand,
    },

    /// Launch, follow and control site harvests.
    Harvest {
        #[command(subcommand)]
        command: HarvestJobCommand,
    },

    /// Print the effective configuration as RON.
    Config,
}

#[derive(Subcommand)]
pub(crate) enum PhaseCommand {
    /// Start a phase job and follow it to a final state.
    Start {
        document: DocumentId,
        phase: Phase,

        /// Select this site first so its document list refreshes on completion.
        #[arg(long)]
        site: Option<SiteId>,
    },

    /// Send stop, resume or cancel to a running job and follow it.
    Action {
        document: DocumentId,
        phase: Phase,
        action: JobAction,

        #[arg(long)]
        job: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum HarvestJobCommand {
    /// Start a harvest and follow it.
    Launch {
        /// Site whose saved harvester settings are used.
        #[arg(long)]
        site: Option<SiteId>,

        #[arg(long)]
        harvester: Option<String>,

        #[arg(long)]
        url: Option<String>,

        /// Comma separated phases; collect is always added.
        #[arg(long, value_delimiter = ',')]
        tasks: Vec<Phase>,
    },

    /// Follow an existing harvest job.
    Watch { job: String },

    /// Ask a harvest job to stop and follow it until it does.
    Stop { job: String },

    /// Start a new harvest for the phases a job left unfinished.
    Resume {
        job: String,

        #[arg(long)]
        site: Option<SiteId>,
    },

    /// Stop a running harvest and mark it cancelled.
    Cancel { job: String },

    /// Save a harvest's export to the export directory.
    Export { job: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    logging::initialize(config.log, level);

    commands::run(cli.command, &config).await
}
