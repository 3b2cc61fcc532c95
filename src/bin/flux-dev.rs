// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use flux_dev::{
    config::Config,
    decide::{NonInteractive, Prompter},
    notify::TracingNotifier,
    path::resolve_config_file,
    process::SystemRunner,
    update::{options::Flags, select::list_servers, UpdateRequest, Updater},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{
    io::{stdin, IsTerminal},
    path::PathBuf,
    process::exit,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "flux-dev [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Configuration file to use instead of the default lookup.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Laravel project directory, defaults to the current directory.
    #[arg(short, long, global = true, value_name = "path")]
    pub project: Option<PathBuf>,

    /// Never prompt, fail if a decision is left to the operator.
    #[arg(short = 'n', long, global = true)]
    pub no_interaction: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let project_dir = match &self.project {
            Some(path) => path.clone(),
            None => std::env::current_dir().context("cannot determine current directory")?,
        };
        let config_file = resolve_config_file(self.config.as_deref(), &project_dir)?;
        let config = Config::load(&config_file)
            .with_context(|| format!("failed to load configuration {config_file:?}"))?;
        let interactive = !self.no_interaction && stdin().is_terminal();

        match self.command {
            Command::UpdateFromRemote(opts) => {
                let request = opts.into_request();
                if interactive {
                    let updater = Updater::new(
                        config,
                        config_file,
                        project_dir,
                        SystemRunner,
                        Prompter,
                        TracingNotifier,
                    );
                    updater.run(&request).await?;
                } else {
                    let updater = Updater::new(
                        config,
                        config_file,
                        project_dir,
                        SystemRunner,
                        NonInteractive,
                        TracingNotifier,
                    );
                    updater.run(&request).await?;
                }
            }
            Command::Servers => run_servers(&config, &config_file),
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Update local database and storage from a remote server.
    #[command(override_usage = "flux-dev update-from-remote [options] [server]")]
    UpdateFromRemote(UpdateOptions),

    /// List configured remote servers.
    #[command(override_usage = "flux-dev servers [options]")]
    Servers,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct UpdateOptions {
    /// Name of configured server to pull from.
    #[arg(value_name = "server")]
    pub server: Option<String>,

    /// Pull new dump, keep it, and sync storage.
    #[arg(long)]
    pub full: bool,

    /// Reuse local dump if present, skip storage unless asked for.
    #[arg(long)]
    pub fast: bool,

    /// Use existing local dump.
    #[arg(long, conflicts_with = "remote")]
    pub local: bool,

    /// Pull new dump from server.
    #[arg(long)]
    pub remote: bool,

    /// Keep dump file after import.
    #[arg(long, conflicts_with = "delete_dump")]
    pub keep_dump: bool,

    /// Delete dump file after import.
    #[arg(long)]
    pub delete_dump: bool,

    /// Sync storage directory from server.
    #[arg(long, conflicts_with = "skip_storage")]
    pub sync_storage: bool,

    /// Do not sync storage directory.
    #[arg(long)]
    pub skip_storage: bool,

    /// Abort if migrations fail.
    #[arg(long)]
    pub strict_migrations: bool,
}

impl UpdateOptions {
    fn into_request(self) -> UpdateRequest {
        UpdateRequest {
            server: self.server,
            flags: Flags {
                full: self.full,
                fast: self.fast,
                local: self.local,
                remote: self.remote,
                keep_dump: self.keep_dump,
                delete_dump: self.delete_dump,
                sync_storage: self.sync_storage,
                skip_storage: self.skip_storage,
                strict_migrations: self.strict_migrations,
            },
        }
    }
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

fn run_servers(config: &Config, config_file: &std::path::Path) {
    let servers = list_servers(&config.servers);
    if servers.is_empty() {
        info!("no remote servers configured in {config_file:?}");
        return;
    }

    for server in servers {
        println!("{}", server.label());
    }
}
