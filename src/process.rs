// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External process execution.
//!
//! Every step of the update workflow is a call to some external program:
//! ssh, scp, rsync, tar, mysql, or artisan. Calls are described by an
//! [`Invocation`], and carried out by a [`CommandRunner`]. The default runner
//! spawns real child processes, one at a time, each bounded by a timeout.
//!
//! Invocations are argument vectors. The only exception is
//! [`Invocation::shell`], which exists for the one step that needs input
//! redirection. Values interpolated into a shell line must go through
//! [`shell_escape`].

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    process::{Output, Stdio},
    time::Duration,
};
use tokio::process::Command;
use tracing::{debug, instrument};

/// Timeout used when an invocation does not pick its own.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Description of a single external program call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    current_dir: Option<PathBuf>,
    timeout: Duration,
    secrets: Vec<String>,
}

impl Invocation {
    /// Construct new invocation of target program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
            timeout: DEFAULT_TIMEOUT,
            secrets: Vec::new(),
        }
    }

    /// Construct invocation that hands a command line to the platform shell.
    ///
    /// Uses `sh -c` on Unix and `cmd /C` on Windows.
    pub fn shell(line: impl Into<String>) -> Self {
        if cfg!(windows) {
            Self::new("cmd").arg("/C").arg(line)
        } else {
            Self::new("sh").arg("-c").arg(line)
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set environment variable for the child only.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Mark value that must never show up in [`Invocation::command_line`].
    pub fn secret(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.secrets.push(value);
        }
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Look up environment variable set on this invocation.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.envs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    pub fn time_limit(&self) -> Duration {
        self.timeout
    }

    /// Program and arguments joined by spaces.
    ///
    /// Meant for logs and assertions, not for feeding back into a shell.
    /// Environment variables are never included, and secrets are masked.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }

        for secret in &self.secrets {
            line = line.replace(secret.as_str(), "****");
        }

        line
    }
}

impl Display for Invocation {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.command_line())
    }
}

/// Result of a finished external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Turn unsuccessful output into [`ProcessError::Failed`].
    pub fn check(self, program: &str) -> Result<Self> {
        if self.success {
            return Ok(self);
        }

        let status = match self.code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".into(),
        };

        Err(ProcessError::Failed {
            program: program.into(),
            status,
            stderr: self.stderr,
        })
    }
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        // INVARIANT: Chomp trailing newlines.
        let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();

        Self {
            success: output.status.success(),
            code: output.status.code(),
            stdout,
            stderr,
        }
    }
}

/// Layer of indirection for external program execution.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run invocation to completion, and capture its output.
    ///
    /// A non-zero exit status is not an error at this level.
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;

    /// Check whether a program can be found on `PATH`.
    fn is_available(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }

    /// Run invocation, and treat a non-zero exit status as an error.
    async fn run_checked(&self, invocation: &Invocation) -> Result<CommandOutput> {
        self.run(invocation).await?.check(invocation.program())
    }
}

/// Runs invocations as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    #[instrument(skip(self, invocation), fields(program = invocation.program()), level = "debug")]
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        debug!("run {invocation}");
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(invocation.envs.iter().map(|(key, value)| (key, value)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.current_dir {
            command.current_dir(dir);
        }

        let child = command.spawn().map_err(|source| ProcessError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        // INVARIANT: Dropping the wait future on timeout drops the child, which
        // kills it because of kill_on_drop.
        let output = tokio::time::timeout(invocation.timeout, child.wait_with_output())
            .await
            .map_err(|_| ProcessError::Timeout {
                command: invocation.command_line(),
                after: invocation.timeout,
            })?
            .map_err(|source| ProcessError::Wait {
                program: invocation.program.clone(),
                source,
            })?;

        Ok(output.into())
    }
}

/// Quote value for a POSIX shell, regardless of the local platform.
///
/// Remote command lines always run under a POSIX shell on the server.
pub fn posix_escape(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Quote value for safe interpolation into a local shell command line.
#[cfg(not(windows))]
pub fn shell_escape(value: &str) -> String {
    posix_escape(value)
}

/// Quote value for safe interpolation into a `cmd.exe` command line.
#[cfg(windows)]
pub fn shell_escape(value: &str) -> String {
    format!("\"{}\"", value.replace(['"', '%', '!'], " "))
}

/// All possible error types for external program execution.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// Program could not be started.
    #[error("failed to start {program:?}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on a started program failed.
    #[error("failed to wait on {program:?}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Program did not finish in time, and was killed.
    #[error("command {command:?} timed out after {}s", after.as_secs())]
    Timeout { command: String, after: Duration },

    /// Program finished with a non-zero exit status.
    #[error("{program} failed with {status}:\n{stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ProcessError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn invocation_command_line_omits_environment() {
        let invocation = Invocation::new("mysql")
            .args(["-hlocalhost", "-uroot"])
            .env("MYSQL_PWD", "hunter2");
        assert_eq!(invocation.command_line(), "mysql -hlocalhost -uroot");
        assert_eq!(invocation.env_var("MYSQL_PWD"), Some("hunter2"));
        assert_eq!(invocation.time_limit(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn invocation_command_line_masks_secrets() {
        let invocation = Invocation::new("ssh")
            .arg("MYSQL_PWD='hunter2' mysqldump erp")
            .secret("hunter2");
        assert_eq!(invocation.command_line(), "ssh MYSQL_PWD='****' mysqldump erp");
        assert_eq!(invocation.arguments(), ["MYSQL_PWD='hunter2' mysqldump erp"]);
    }

    #[cfg(unix)]
    #[test]
    fn shell_invocation_uses_sh() {
        let invocation = Invocation::shell("mysql erp < dump.sql");
        assert_eq!(invocation.program(), "sh");
        assert_eq!(invocation.arguments(), ["-c", "mysql erp < dump.sql"]);
    }

    #[cfg(unix)]
    #[test]
    fn shell_escape_quotes_single_quotes() {
        assert_eq!(shell_escape("erp"), "'erp'");
        assert_eq!(shell_escape("it's"), "'it'\\''s'");
        assert_eq!(shell_escape("a b; rm -rf /"), "'a b; rm -rf /'");
    }

    #[test]
    fn failed_output_check_carries_stderr() {
        let result = CommandOutput::failed(2, "Access denied").check("mysql");
        match result {
            Err(error @ ProcessError::Failed { .. }) => {
                assert_eq!(
                    error.to_string(),
                    "mysql failed with exit code 2:\nAccess denied"
                );
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn system_runner_captures_output() -> anyhow::Result<()> {
        let output = SystemRunner
            .run(&Invocation::shell("echo out; echo err >&2; exit 3"))
            .await?;
        assert!(!output.success);
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout, "out");
        assert_eq!(output.stderr, "err");

        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn system_runner_passes_env_and_dir() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let output = SystemRunner
            .run_checked(
                &Invocation::shell("echo \"$FLUX_TEST\"; pwd")
                    .env("FLUX_TEST", "hello")
                    .current_dir(dir.path()),
            )
            .await?;
        let mut lines = output.stdout.lines();
        assert_eq!(lines.next(), Some("hello"));
        assert!(lines.next().is_some_and(|pwd| pwd.ends_with(
            dir.path()
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default()
        )));

        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn system_runner_times_out() {
        let result = SystemRunner
            .run(&Invocation::new("sleep").arg("5").timeout(Duration::from_millis(100)))
            .await;
        assert!(matches!(result, Err(ProcessError::Timeout { .. })));
    }

    #[tokio::test]
    async fn system_runner_reports_missing_program() {
        let result = SystemRunner
            .run(&Invocation::new("flux-dev-definitely-not-a-program"))
            .await;
        assert!(matches!(result, Err(ProcessError::Spawn { .. })));
        assert!(!SystemRunner.is_available("flux-dev-definitely-not-a-program"));
    }
}
