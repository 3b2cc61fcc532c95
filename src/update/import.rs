// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Local database import.
//!
//! The target database is dropped and recreated through an argument vector.
//! Loading the dump needs input redirection, so that single step goes through
//! the shell, with every interpolated value escaped on its own. The password
//! is handed over as `MYSQL_PWD` in both cases, and never shows up on a
//! command line.

use crate::{
    config::LocalDatabase,
    process::{shell_escape, CommandRunner, Invocation, ProcessError},
    progress::spin,
    update::TRANSFER_TIMEOUT,
};

use std::path::Path;
use tracing::instrument;

/// Quote MySQL identifier with backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Connection arguments for the mysql client.
pub fn mysql_args(database: &LocalDatabase) -> Vec<String> {
    vec![
        format!("-h{}", database.host),
        format!("-P{}", database.port),
        format!("-u{}", database.username),
        "--protocol=TCP".into(),
    ]
}

/// Mysql client invocation with connection arguments and password applied.
pub fn mysql(database: &LocalDatabase) -> Invocation {
    with_password(Invocation::new("mysql").args(mysql_args(database)), database)
}

fn with_password(invocation: Invocation, database: &LocalDatabase) -> Invocation {
    if database.password.is_empty() {
        invocation
    } else {
        invocation.env("MYSQL_PWD", database.password.as_str())
    }
}

/// Loads a dump file into the local database.
#[derive(Debug)]
pub struct DatabaseImporter<'a, R>
where
    R: CommandRunner,
{
    runner: &'a R,
    database: &'a LocalDatabase,
    project_dir: &'a Path,
}

impl<'a, R> DatabaseImporter<'a, R>
where
    R: CommandRunner,
{
    pub fn new(runner: &'a R, database: &'a LocalDatabase, project_dir: &'a Path) -> Self {
        Self {
            runner,
            database,
            project_dir,
        }
    }

    /// Drop target database if it exists, and create it again empty.
    ///
    /// # Errors
    ///
    /// - Return [`ImportError::Recreate`] if mysql fails.
    #[instrument(skip(self), level = "debug")]
    pub async fn recreate(&self) -> Result<()> {
        let name = quote_identifier(&self.database.database);
        let invocation = mysql(self.database)
            .arg("-e")
            .arg(format!("DROP DATABASE IF EXISTS {name}; CREATE DATABASE {name};"))
            .current_dir(self.project_dir);

        spin(
            "Dropping and recreating database...",
            self.runner.run_checked(&invocation),
        )
        .await
        .map_err(ImportError::Recreate)?;

        Ok(())
    }

    /// Shell command line that pipes target dump into the database.
    pub fn import_command_line(&self, dump_file: &Path) -> String {
        format!(
            "mysql -h{} -P{} -u{} --protocol=TCP {} < {}",
            shell_escape(&self.database.host),
            shell_escape(&self.database.port.to_string()),
            shell_escape(&self.database.username),
            shell_escape(&self.database.database),
            shell_escape(&dump_file.to_string_lossy()),
        )
    }

    /// Load target dump file into the database.
    ///
    /// # Errors
    ///
    /// - Return [`ImportError::Load`] if mysql fails.
    #[instrument(skip(self), level = "debug")]
    pub async fn import(&self, dump_file: &Path) -> Result<()> {
        let invocation = with_password(
            Invocation::shell(self.import_command_line(dump_file)),
            self.database,
        )
        .current_dir(self.project_dir)
        .timeout(TRANSFER_TIMEOUT);

        spin(
            "Importing dump into database...",
            self.runner.run_checked(&invocation),
        )
        .await
        .map_err(ImportError::Load)?;

        Ok(())
    }
}

/// All possible error types for local database import.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// Dropping or creating the database failed.
    #[error("failed to create database")]
    Recreate(#[source] ProcessError),

    /// Loading the dump failed. The database may be partially imported.
    #[error("failed to import dump")]
    Load(#[source] ProcessError),
}

/// Friendly result alias :3
type Result<T, E = ImportError> = std::result::Result<T, E>;
