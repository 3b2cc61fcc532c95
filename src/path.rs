// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine where flux-dev looks for its configuration file, and where
//! project-relative artifacts like the dump file live.

use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the project directory.
pub const PROJECT_CONFIG_FILE: &str = "flux-dev.toml";

/// Determine default absolute path to the user-wide configuration file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/flux-dev/config.toml`. Does
/// not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if configuration directory cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_config_file() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("flux-dev").join("config.toml"))
        .ok_or(NoWayHome)
}

/// Pick the configuration file to load.
///
/// An explicit path always wins. Otherwise `flux-dev.toml` in the project
/// directory is used when present, falling back to the user-wide file.
///
/// # Errors
///
/// - Return [`NoWayHome`] if the fallback path cannot be determined.
pub fn resolve_config_file(explicit: Option<&Path>, project_dir: &Path) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let local = project_dir.join(PROJECT_CONFIG_FILE);
    if local.is_file() {
        return Ok(local);
    }

    default_config_file()
}

/// No way to determine user's configuration directory.
///
/// # See Also
///
/// - [`dirs::config_dir`](https://docs.rs/dirs/latest/dirs/fn.config_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's configuration directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn explicit_config_file_wins() -> anyhow::Result<()> {
        let project = tempfile::tempdir()?;
        std::fs::write(project.path().join(PROJECT_CONFIG_FILE), "")?;

        let result = resolve_config_file(Some(Path::new("/etc/flux.toml")), project.path())?;
        assert_eq!(result, PathBuf::from("/etc/flux.toml"));

        Ok(())
    }

    #[test]
    fn project_config_file_preferred_over_user_file() -> anyhow::Result<()> {
        let project = tempfile::tempdir()?;
        let expect = project.path().join(PROJECT_CONFIG_FILE);
        std::fs::write(&expect, "")?;

        let result = resolve_config_file(None, project.path())?;
        assert_eq!(result, expect);

        Ok(())
    }
}
