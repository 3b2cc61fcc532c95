// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote dump retrieval.
//!
//! Reads the database credentials of the remote application from its `.env`
//! file, dumps the database into the remote home directory, and copies the
//! dump next to the local project.

use crate::{
    env::{DotEnv, RemoteCredentials},
    process::{posix_escape, CommandRunner, ProcessError},
    progress::spin,
    remote::Remote,
    update::TRANSFER_TIMEOUT,
};

use std::{fs, path::Path};
use tracing::{debug, instrument, warn};

/// File name of the dump inside the remote home directory.
pub const REMOTE_DUMP_FILE: &str = "dump.sql";

/// Pulls a fresh dump from a remote server.
#[derive(Debug)]
pub struct DumpFetcher<'a, R>
where
    R: CommandRunner,
{
    runner: &'a R,
    remote: Remote<'a>,
}

impl<'a, R> DumpFetcher<'a, R>
where
    R: CommandRunner,
{
    pub fn new(runner: &'a R, remote: Remote<'a>) -> Self {
        Self { runner, remote }
    }

    /// Copy remote `.env` file, and extract database credentials from it.
    ///
    /// The local copy lives in a temporary directory that is removed when
    /// this function returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// - Return [`FetchError::Staging`] if temporary copy cannot be made.
    /// - Return [`FetchError::CredentialsUnavailable`] if copy fails.
    /// - Return [`FetchError::CredentialsIncomplete`] if a key is missing.
    #[instrument(skip(self), level = "debug")]
    pub async fn read_credentials(&self) -> Result<RemoteCredentials> {
        let staging = tempfile::Builder::new()
            .prefix("flux-dev-env-")
            .tempdir()
            .map_err(FetchError::Staging)?;
        let local_env = staging.path().join(".env");
        let remote_env = format!("{}/.env", self.remote.server().directory);

        spin(
            "Reading database credentials from server...",
            self.runner
                .run_checked(&self.remote.download(&remote_env, &local_env)),
        )
        .await
        .map_err(FetchError::CredentialsUnavailable)?;

        let content = fs::read(&local_env).map_err(FetchError::Staging)?;
        debug!("read {} bytes of remote .env", content.len());

        parse_credentials(&content)
    }

    /// Dump remote database into the remote home directory.
    ///
    /// # Errors
    ///
    /// - Return [`FetchError::RemoteDump`] if mysqldump fails.
    #[instrument(skip(self, credentials), level = "debug")]
    pub async fn create_remote_dump(&self, credentials: &RemoteCredentials) -> Result<()> {
        let escaped_password = posix_escape(&credentials.password);
        let command = format!(
            "MYSQL_PWD={escaped_password} mysqldump -u{} {} > ~/{REMOTE_DUMP_FILE}",
            posix_escape(&credentials.user),
            posix_escape(&credentials.database),
        );
        let invocation = self
            .remote
            .ssh(command)
            .secret(escaped_password)
            .secret(credentials.password.as_str())
            .timeout(TRANSFER_TIMEOUT);

        spin("Creating dump on server...", self.runner.run_checked(&invocation))
            .await
            .map_err(FetchError::RemoteDump)?;

        Ok(())
    }

    /// Copy remote dump to target local path.
    ///
    /// # Errors
    ///
    /// - Return [`FetchError::Download`] if scp fails.
    #[instrument(skip(self), level = "debug")]
    pub async fn download_dump(&self, dump_file: &Path) -> Result<()> {
        let invocation = self
            .remote
            .download(&format!("~/{REMOTE_DUMP_FILE}"), dump_file)
            .timeout(TRANSFER_TIMEOUT);

        spin("Downloading dump...", self.runner.run_checked(&invocation))
            .await
            .map_err(FetchError::Download)?;

        Ok(())
    }

    /// Best-effort removal of the remote dump.
    pub async fn remove_remote_dump(&self) {
        let result = spin(
            "Cleaning up on server...",
            self.runner
                .run_checked(&self.remote.remove_from_home(REMOTE_DUMP_FILE)),
        )
        .await;

        if let Err(error) = result {
            warn!("could not remove remote dump: {error}");
        }
    }
}

/// Extract database credentials from raw `.env` contents.
///
/// The file is decoded lossily. Only the `DB_*` keys have to be readable.
///
/// # Errors
///
/// - Return [`FetchError::CredentialsIncomplete`] if a key is missing.
pub fn parse_credentials(content: &[u8]) -> Result<RemoteCredentials> {
    let env = DotEnv::new(String::from_utf8_lossy(content));
    RemoteCredentials::from_dotenv(&env).ok_or(FetchError::CredentialsIncomplete)
}

/// All possible error types for remote dump retrieval.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Local staging area for the remote `.env` failed.
    #[error("failed to stage remote .env file locally")]
    Staging(#[source] std::io::Error),

    /// Remote `.env` could not be copied.
    #[error("could not read database credentials from server")]
    CredentialsUnavailable(#[source] ProcessError),

    /// Remote `.env` lacks a required key.
    #[error(
        "could not read database credentials from server, \
         .env must define DB_USERNAME, DB_PASSWORD, and DB_DATABASE"
    )]
    CredentialsIncomplete,

    /// mysqldump failed on the server.
    #[error("failed to create dump on server")]
    RemoteDump(#[source] ProcessError),

    /// Dump could not be copied from the server.
    #[error("failed to download dump")]
    Download(#[source] ProcessError),
}

/// Friendly result alias :3
type Result<T, E = FetchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn latin1_bytes_in_unrelated_keys_are_tolerated() -> anyhow::Result<()> {
        let content = b"APP_NAME=M\xFCller\nDB_USERNAME=forge\nDB_PASSWORD=x\nDB_DATABASE=erp\n";
        let result = parse_credentials(content)?;
        assert_eq!(result.user, "forge");
        assert_eq!(result.password, "x");
        assert_eq!(result.database, "erp");

        Ok(())
    }

    #[test]
    fn missing_key_is_incomplete() {
        let result = parse_credentials(b"DB_USERNAME=forge\nDB_DATABASE=erp\n");
        assert!(matches!(result, Err(FetchError::CredentialsIncomplete)));
    }
}
