// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Update local environment from a remote server.
//!
//! Pulls the database and storage directory of a remote Laravel deployment
//! into the local project. A run moves through a fixed sequence of steps:
//!
//! 1. Resolve the dump source, and select the server if a fetch is needed.
//! 2. Resolve the remaining options, selecting the server late if storage
//!    sync is the only remote work.
//! 3. Fetch a fresh dump from the server, or reuse the local one.
//! 4. Drop, recreate, and load the local database.
//! 5. Run migrations and other housekeeping.
//! 6. Mirror the storage directory, if requested.
//! 7. Delete the local dump, if requested.
//!
//! Failures up to and including the import stop the run. Later failures are
//! reported, and the run carries on. Nothing is rolled back, so a failed
//! import can leave a partially loaded database behind.
//!
//! # See Also
//!
//! 1. [`options`] for how flags map to run options.
//! 2. [`storage`] for the rsync and tarball strategies.

pub mod fetch;
pub mod import;
pub mod options;
pub mod post_import;
pub mod select;
pub mod storage;

use crate::{
    config::{Config, ConfigError, LocalDatabase, RemoteServer},
    decide::{Decide, DecisionError, Prompter},
    env::RemoteCredentials,
    notify::{Event, Notify, TracingNotifier},
    process::{CommandRunner, ProcessError, SystemRunner},
    remote::Remote,
    update::{
        fetch::{DumpFetcher, FetchError},
        import::{DatabaseImporter, ImportError},
        options::{
            resolve_dump_deletion, resolve_source, resolve_sync_storage, Flags, RunConfig,
        },
        post_import::PostImport,
        select::{select_server, SelectError},
        storage::StorageSync,
    },
};

use std::{
    error::Error,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{error, info, instrument, warn};

/// Timeout for dumps, transfers, imports, and rsync.
pub const TRANSFER_TIMEOUT: Duration = Duration::from_secs(900);

/// Timeout for packing storage on the server.
pub const ARCHIVE_TIMEOUT: Duration = Duration::from_secs(300);

/// A single `update-from-remote` request.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    /// Server named on the command line.
    pub server: Option<String>,

    pub flags: Flags,
}

/// Drives the update workflow.
///
/// External programs, operator decisions, and lifecycle notifications all
/// go through the seams `R`, `D`, and `N` respectively.
#[derive(Debug)]
pub struct Updater<R = SystemRunner, D = Prompter, N = TracingNotifier>
where
    R: CommandRunner,
    D: Decide,
    N: Notify,
{
    config: Config,
    config_file: PathBuf,
    project_dir: PathBuf,
    runner: R,
    decide: D,
    notify: N,
}

impl<R, D, N> Updater<R, D, N>
where
    R: CommandRunner,
    D: Decide,
    N: Notify,
{
    /// Construct new updater.
    ///
    /// The configuration file path is only used in error messages.
    pub fn new(
        config: Config,
        config_file: impl Into<PathBuf>,
        project_dir: impl Into<PathBuf>,
        runner: R,
        decide: D,
        notify: N,
    ) -> Self {
        Self {
            config,
            config_file: config_file.into(),
            project_dir: project_dir.into(),
            runner,
            decide,
            notify,
        }
    }

    /// Absolute path of the local dump file.
    pub fn dump_path(&self) -> PathBuf {
        self.project_dir.join(&self.config.dump_file)
    }

    /// Run the update workflow.
    ///
    /// # Errors
    ///
    /// - Return [`UpdateError`] on any hard stop. An `UpdateFailed` event is
    ///   emitted first for every failure after the run has started.
    #[instrument(skip(self), level = "debug")]
    pub async fn run(&self, request: &UpdateRequest) -> Result<()> {
        let dump_path = self.dump_path();
        let flags = &request.flags;
        let use_local_dump = resolve_source(flags, dump_path.is_file(), &self.decide)?;

        // INVARIANT: A certain fetch selects the server before any further
        // question is asked.
        let mut server = if use_local_dump {
            None
        } else {
            Some(self.select(request)?)
        };
        let run = RunConfig {
            use_local_dump,
            sync_storage: resolve_sync_storage(flags, use_local_dump, &self.decide)?,
            delete_dump_after: resolve_dump_deletion(flags, &self.decide)?,
            abort_on_migration_failure: flags.strict_migrations,
        };
        if server.is_none() && run.needs_server() {
            server = Some(self.select(request)?);
        }
        let database = self.config.local_database(&self.project_dir)?;

        self.display_summary(&run, server.as_ref(), &database);
        let (name, user) = match &server {
            Some(server) => (server.name.clone(), server.user.clone()),
            None => ("local".to_string(), "local".to_string()),
        };
        self.notify.notify(&Event::UpdateStarted {
            server: name.clone(),
            user: user.clone(),
            use_local: run.use_local_dump,
            sync_storage: run.sync_storage,
            delete_dump: run.delete_dump_after,
        });

        match self.execute(&run, server.as_ref(), &database, &dump_path).await {
            Ok(()) => {
                info!("update completed successfully");
                self.notify.notify(&Event::UpdateCompleted { server: name, user });
                Ok(())
            }
            Err(error) => {
                self.notify.notify(&Event::UpdateFailed {
                    server: name,
                    user,
                    reason: error.to_string(),
                });
                Err(error)
            }
        }
    }

    fn select(&self, request: &UpdateRequest) -> Result<RemoteServer> {
        let server = select_server(
            &self.config.servers,
            request.server.as_deref(),
            &self.decide,
            &self.config_file,
        )?;

        Ok(server)
    }

    async fn execute(
        &self,
        run: &RunConfig,
        server: Option<&RemoteServer>,
        database: &LocalDatabase,
        dump_path: &Path,
    ) -> Result<()> {
        match server.filter(|_| !run.use_local_dump) {
            Some(server) => self.fetch_remote_dump(server, dump_path).await?,
            None => {
                if !dump_path.is_file() {
                    return Err(UpdateError::LocalDumpMissing(dump_path.to_path_buf()));
                }
                info!("using existing local dump {dump_path:?}");
            }
        }

        self.import_database(database, dump_path).await?;
        self.run_post_import(run, database).await?;

        if let Some(server) = server.filter(|_| run.sync_storage) {
            self.sync_storage(server).await;
        }

        if run.delete_dump_after {
            self.delete_dump(dump_path);
        }

        Ok(())
    }

    async fn fetch_remote_dump(&self, server: &RemoteServer, dump_path: &Path) -> Result<()> {
        let fetcher = DumpFetcher::new(&self.runner, Remote::new(server));
        let credentials = fetcher.read_credentials().await?;

        // INVARIANT: Once mysqldump has been attempted the remote dump is
        // removed, whether or not it was downloaded.
        let result = self
            .dump_and_download(&fetcher, &credentials, server, dump_path)
            .await;
        fetcher.remove_remote_dump().await;

        result
    }

    async fn dump_and_download(
        &self,
        fetcher: &DumpFetcher<'_, R>,
        credentials: &RemoteCredentials,
        server: &RemoteServer,
        dump_path: &Path,
    ) -> Result<()> {
        fetcher.create_remote_dump(credentials).await?;
        self.notify.notify(&Event::RemoteDumpCreated {
            server: server.name.clone(),
            user: server.user.clone(),
        });

        fetcher.download_dump(dump_path).await?;
        self.notify.notify(&Event::DumpDownloaded {
            server: server.name.clone(),
            user: server.user.clone(),
            dump_file: dump_path.to_path_buf(),
        });

        Ok(())
    }

    async fn import_database(&self, database: &LocalDatabase, dump_path: &Path) -> Result<()> {
        self.notify.notify(&Event::DatabaseImportStarted {
            dump_file: dump_path.to_path_buf(),
        });

        let importer = DatabaseImporter::new(&self.runner, database, &self.project_dir);
        importer.recreate().await?;
        importer.import(dump_path).await?;

        self.notify.notify(&Event::DatabaseImportCompleted {
            dump_file: dump_path.to_path_buf(),
        });

        Ok(())
    }

    async fn run_post_import(&self, run: &RunConfig, database: &LocalDatabase) -> Result<()> {
        let steps = PostImport::new(&self.runner, database, &self.project_dir);

        info!("running migrations");
        match steps.migrate().await {
            Ok(output) => {
                if !output.stdout.is_empty() {
                    info!("{}", output.stdout);
                }
                self.notify.notify(&Event::MigrationsCompleted { success: true });
            }
            Err(error) => {
                self.notify.notify(&Event::MigrationsCompleted { success: false });
                if run.abort_on_migration_failure {
                    return Err(UpdateError::Migrations(error));
                }
                error!("migrations failed, continuing: {error}");
            }
        }

        steps.truncate_logs().await;

        if let Err(error) = steps.clear_cache().await {
            warn!("failed to clear cache: {error}");
        }

        if let Err(error) = steps.link_storage().await {
            warn!("failed to create storage link: {error}");
        }

        Ok(())
    }

    async fn sync_storage(&self, server: &RemoteServer) {
        self.notify.notify(&Event::StorageSyncStarted {
            server: server.name.clone(),
            user: server.user.clone(),
        });

        let sync = StorageSync::new(&self.runner, Remote::new(server), &self.project_dir);
        let success = match sync.run().await {
            Ok(method) => {
                info!("storage synchronized via {method}");
                true
            }
            Err(error) => {
                error!("storage sync failed: {}", error_chain(&error));
                false
            }
        };

        self.notify.notify(&Event::StorageSyncCompleted {
            server: server.name.clone(),
            user: server.user.clone(),
            success,
        });
    }

    fn delete_dump(&self, dump_path: &Path) {
        if !dump_path.exists() {
            return;
        }

        match fs::remove_file(dump_path) {
            Ok(()) => info!("dump file has been deleted"),
            Err(error) => warn!("could not delete dump file {dump_path:?}: {error}"),
        }
    }

    fn display_summary(
        &self,
        run: &RunConfig,
        server: Option<&RemoteServer>,
        database: &LocalDatabase,
    ) {
        let yes_no = |flag: bool| if flag { "yes" } else { "no" };

        info!("starting update process");
        match server {
            Some(server) => {
                info!("  server: {} ({})", server.name, server.user);
                if server.host != server.name {
                    info!("  ssh: {}:{}", server.host, server.effective_port());
                }
            }
            None => info!("  server: none"),
        }
        info!(
            "  dump source: {}",
            if run.use_local_dump { "local" } else { "remote" }
        );
        info!("  database: {}@{}", database.database, database.host);
        info!("  sync storage: {}", yes_no(run.sync_storage));
        info!("  delete dump: {}", yes_no(run.delete_dump_after));
    }
}

/// Display error along with every source below it.
pub fn error_chain(error: &dyn Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    message
}

/// All possible error types of the update workflow.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Select(#[from] SelectError),

    #[error(transparent)]
    Decision(#[from] DecisionError),

    /// Local dump requested, but not there.
    #[error("local dump file {0:?} does not exist")]
    LocalDumpMissing(PathBuf),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Import(#[from] ImportError),

    /// Migrations failed while strict migrations were requested.
    #[error("migrations failed")]
    Migrations(#[source] ProcessError),
}

/// Friendly result alias :3
pub type Result<T, E = UpdateError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::storage::StorageError;
    use pretty_assertions::assert_eq;

    #[test]
    fn error_chain_shows_captured_stderr() {
        let error = StorageError::Rsync(ProcessError::Failed {
            program: "rsync".into(),
            status: "exit code 23".into(),
            stderr: "some files vanished".into(),
        });
        assert_eq!(
            error_chain(&error),
            "rsync of storage failed: rsync failed with exit code 23:\nsome files vanished"
        );
    }
}
