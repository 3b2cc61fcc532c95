// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Housekeeping after a fresh import.
//!
//! Runs the Laravel migrations against the imported data, empties the
//! `logs` table, clears the cache, and relinks public storage. Only the
//! migrations can stop the run, and only when asked to.

use crate::{
    config::LocalDatabase,
    process::{CommandOutput, CommandRunner, Invocation, ProcessError},
    progress::spin,
    update::import::mysql,
};

use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Way to reach the artisan console of the project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artisan {
    /// `php artisan`.
    Php,

    /// `vendor/bin/sail artisan`, running inside the Sail container.
    Sail(PathBuf),
}

impl Artisan {
    /// Figure out how artisan should be called for target project.
    ///
    /// Inside a Sail container (`LARAVEL_SAIL` set) artisan is called
    /// directly. Outside, the project's Sail script is preferred when it
    /// exists, except on Windows where it cannot run natively.
    pub fn detect(project_dir: &Path) -> Self {
        let in_sail = std::env::var("LARAVEL_SAIL")
            .map(|value| !matches!(value.as_str(), "" | "0" | "false"))
            .unwrap_or(false);
        if in_sail {
            return Self::Php;
        }

        let sail = project_dir.join("vendor").join("bin").join("sail");
        if !cfg!(windows) && sail.is_file() {
            return Self::Sail(sail);
        }

        Self::Php
    }

    /// Invocation of an artisan command.
    pub fn command(&self, args: impl IntoIterator<Item = impl Into<String>>) -> Invocation {
        let invocation = match self {
            Self::Php => Invocation::new("php"),
            Self::Sail(script) => Invocation::new(script.to_string_lossy()),
        };

        invocation.arg("artisan").args(args)
    }
}

/// Steps run after the database import.
#[derive(Debug)]
pub struct PostImport<'a, R>
where
    R: CommandRunner,
{
    runner: &'a R,
    database: &'a LocalDatabase,
    project_dir: &'a Path,
    artisan: Artisan,
}

impl<'a, R> PostImport<'a, R>
where
    R: CommandRunner,
{
    pub fn new(runner: &'a R, database: &'a LocalDatabase, project_dir: &'a Path) -> Self {
        Self {
            runner,
            database,
            project_dir,
            artisan: Artisan::detect(project_dir),
        }
    }

    /// Run `artisan migrate --force`.
    #[instrument(skip(self), level = "debug")]
    pub async fn migrate(&self) -> Result<CommandOutput, ProcessError> {
        let invocation = self
            .artisan
            .command(["migrate", "--force"])
            .current_dir(self.project_dir);

        spin("Running migrations...", self.runner.run_checked(&invocation)).await
    }

    /// Empty the `logs` table, ignoring any failure.
    pub async fn truncate_logs(&self) {
        let invocation = mysql(self.database)
            .arg(self.database.database.as_str())
            .arg("-e")
            .arg("TRUNCATE TABLE logs")
            .current_dir(self.project_dir);

        let result = spin("Truncating logs table...", self.runner.run_checked(&invocation)).await;
        if let Err(error) = result {
            debug!("logs table not truncated: {error}");
        }
    }

    /// Run `artisan cache:clear`.
    pub async fn clear_cache(&self) -> Result<CommandOutput, ProcessError> {
        let invocation = self.artisan.command(["cache:clear"]).current_dir(self.project_dir);
        spin("Clearing cache...", self.runner.run_checked(&invocation)).await
    }

    /// Run `artisan storage:link`.
    pub async fn link_storage(&self) -> Result<CommandOutput, ProcessError> {
        let invocation = self.artisan.command(["storage:link"]).current_dir(self.project_dir);
        spin("Creating storage link...", self.runner.run_checked(&invocation)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("LARAVEL_SAIL", "1")])]
    fn inside_sail_calls_php_directly() -> anyhow::Result<()> {
        let project = tempfile::tempdir()?;
        std::fs::create_dir_all(project.path().join("vendor/bin"))?;
        std::fs::write(project.path().join("vendor/bin/sail"), "#!/bin/sh\n")?;

        assert_eq!(Artisan::detect(project.path()), Artisan::Php);

        Ok(())
    }

    #[cfg(unix)]
    #[sealed_test(env = [("LARAVEL_SAIL", "")])]
    fn outside_sail_prefers_sail_script() -> anyhow::Result<()> {
        let project = tempfile::tempdir()?;
        std::fs::create_dir_all(project.path().join("vendor/bin"))?;
        let script = project.path().join("vendor/bin/sail");
        std::fs::write(&script, "#!/bin/sh\n")?;

        let artisan = Artisan::detect(project.path());
        assert_eq!(artisan, Artisan::Sail(script.clone()));
        assert_eq!(
            artisan.command(["migrate", "--force"]).command_line(),
            format!("{} artisan migrate --force", script.display())
        );

        Ok(())
    }

    #[sealed_test(env = [("LARAVEL_SAIL", "")])]
    fn without_sail_script_uses_php() -> anyhow::Result<()> {
        let project = tempfile::tempdir()?;
        let artisan = Artisan::detect(project.path());
        assert_eq!(artisan, Artisan::Php);
        assert_eq!(
            artisan.command(["cache:clear"]).command_line(),
            "php artisan cache:clear"
        );

        Ok(())
    }
}
