// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Storage directory mirroring.
//!
//! Uses rsync when it is installed locally, deleting local files the server
//! no longer has. Without rsync, the server packs its storage directory into
//! a tarball, which is copied over and unpacked in place. Log files and the
//! framework cache are left out either way.

use crate::{
    process::{CommandRunner, Invocation, ProcessError},
    progress::spin,
    remote::{quote_remote_path, Remote},
    update::{ARCHIVE_TIMEOUT, TRANSFER_TIMEOUT},
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    path::Path,
};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Storage subpaths never synchronized.
pub const EXCLUDED: [&str; 2] = ["logs", "framework"];

/// Means by which storage was synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMethod {
    Rsync,
    Tarball,
}

impl Display for SyncMethod {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Rsync => fmt.write_str("rsync"),
            Self::Tarball => fmt.write_str("tar over scp"),
        }
    }
}

/// Mirrors remote storage directory into the local project.
#[derive(Debug)]
pub struct StorageSync<'a, R>
where
    R: CommandRunner,
{
    runner: &'a R,
    remote: Remote<'a>,
    project_dir: &'a Path,
}

impl<'a, R> StorageSync<'a, R>
where
    R: CommandRunner,
{
    pub fn new(runner: &'a R, remote: Remote<'a>, project_dir: &'a Path) -> Self {
        Self {
            runner,
            remote,
            project_dir,
        }
    }

    /// Synchronize storage through the best available method.
    ///
    /// # Errors
    ///
    /// - Return [`StorageError`] if the chosen method fails.
    pub async fn run(&self) -> Result<SyncMethod> {
        if self.runner.is_available("rsync") {
            self.via_rsync().await?;
            Ok(SyncMethod::Rsync)
        } else {
            debug!("rsync not found, falling back to tar over scp");
            self.via_tarball(&archive_name()).await?;
            Ok(SyncMethod::Tarball)
        }
    }

    /// Mirror storage with rsync.
    #[instrument(skip(self), level = "debug")]
    pub async fn via_rsync(&self) -> Result<()> {
        let mut invocation = Invocation::new("rsync").args(["-az", "--info=progress2", "--delete"]);
        for excluded in EXCLUDED {
            invocation = invocation.arg("--exclude").arg(excluded);
        }

        let source = format!("{}/storage", self.remote.server().directory);
        let invocation = invocation
            .arg("-e")
            .arg(self.remote.rsync_shell())
            .arg(self.remote.location(&source))
            .arg(".")
            .current_dir(self.project_dir)
            .timeout(TRANSFER_TIMEOUT);

        spin(
            "Syncing storage from server (rsync)...",
            self.runner.run_checked(&invocation),
        )
        .await
        .map_err(StorageError::Rsync)?;

        Ok(())
    }

    /// Copy storage as a tarball with target archive name.
    ///
    /// Both the remote and local archive are removed afterwards, whether the
    /// transfer worked or not.
    #[instrument(skip(self), level = "debug")]
    pub async fn via_tarball(&self, archive: &str) -> Result<()> {
        let local_archive = self.project_dir.join(archive);
        let result = self.transfer_tarball(archive, &local_archive).await;

        if local_archive.exists() {
            if let Err(error) = fs::remove_file(&local_archive) {
                warn!("could not remove local archive {local_archive:?}: {error}");
            }
        }

        if let Err(error) = self
            .runner
            .run_checked(&self.remote.remove_from_home(archive))
            .await
        {
            warn!("could not remove remote archive {archive:?}: {error}");
        }

        result
    }

    async fn transfer_tarball(&self, archive: &str, local_archive: &Path) -> Result<()> {
        let excludes = EXCLUDED
            .iter()
            .map(|excluded| format!("--exclude={excluded}"))
            .collect::<Vec<_>>()
            .join(" ");
        let pack = self
            .remote
            .ssh(format!(
                "cd {} && tar -czf ~/{archive} {excludes} storage",
                quote_remote_path(&self.remote.server().directory),
            ))
            .timeout(ARCHIVE_TIMEOUT);
        spin(
            "Creating storage archive on server...",
            self.runner.run_checked(&pack),
        )
        .await
        .map_err(StorageError::Pack)?;

        let download = self
            .remote
            .download(&format!("~/{archive}"), local_archive)
            .timeout(TRANSFER_TIMEOUT);
        spin(
            "Downloading storage archive...",
            self.runner.run_checked(&download),
        )
        .await
        .map_err(StorageError::Download)?;

        let unpack = Invocation::new("tar")
            .arg("-xzf")
            .arg(archive)
            .current_dir(self.project_dir)
            .timeout(TRANSFER_TIMEOUT);
        spin(
            "Extracting storage archive...",
            self.runner.run_checked(&unpack),
        )
        .await
        .map_err(StorageError::Unpack)?;

        Ok(())
    }
}

/// Fresh, collision-free archive name.
pub fn archive_name() -> String {
    format!("storage_sync_{}.tar.gz", Uuid::new_v4().simple())
}

/// All possible error types for storage synchronization.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("rsync of storage failed")]
    Rsync(#[source] ProcessError),

    #[error("failed to create storage archive on server")]
    Pack(#[source] ProcessError),

    #[error("failed to download storage archive")]
    Download(#[source] ProcessError),

    #[error("failed to extract storage archive")]
    Unpack(#[source] ProcessError),
}

/// Friendly result alias :3
type Result<T, E = StorageError> = std::result::Result<T, E>;
