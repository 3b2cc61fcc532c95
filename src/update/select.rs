// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote server selection.

use crate::{
    config::{RemoteServer, ServerEntry},
    decide::{Decide, DecisionError, Question},
};

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tracing::info;

/// Resolve every configured server, in name order.
pub fn list_servers(servers: &BTreeMap<String, ServerEntry>) -> Vec<RemoteServer> {
    servers
        .iter()
        .map(|(name, entry)| RemoteServer::resolve(name, entry))
        .collect()
}

/// Select the remote server to work with.
///
/// An explicitly requested server must exist. Without a request, a lone
/// server is picked automatically, and anything else is left to the
/// operator.
///
/// # Errors
///
/// - Return [`SelectError::NoServers`] if nothing is configured.
/// - Return [`SelectError::UnknownServer`] if requested server is missing.
/// - Return [`SelectError::Decision`] if the operator cannot be asked.
pub fn select_server(
    servers: &BTreeMap<String, ServerEntry>,
    requested: Option<&str>,
    decide: &impl Decide,
    config_file: &Path,
) -> Result<RemoteServer> {
    if servers.is_empty() {
        return Err(SelectError::NoServers {
            config_file: config_file.to_path_buf(),
        });
    }

    if let Some(name) = requested {
        let entry = servers.get(name).ok_or_else(|| SelectError::UnknownServer {
            name: name.into(),
            available: servers.keys().cloned().collect::<Vec<_>>().join(", "),
        })?;

        return Ok(RemoteServer::resolve(name, entry));
    }

    let candidates = list_servers(servers);
    if let [server] = candidates.as_slice() {
        info!("using server: {}", server.name);
        return Ok(server.clone());
    }

    let labels = candidates.iter().map(RemoteServer::label).collect::<Vec<_>>();
    let question = Question::new("Select remote server", &["<server>"]);
    let index = decide.select(&question, &labels, 0)?;

    candidates
        .into_iter()
        .nth(index)
        .ok_or(SelectError::InvalidChoice(index))
}

/// All possible error types for server selection.
#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    /// Configuration lists no servers at all.
    #[error(
        "no remote servers configured in {config_file:?}, \
         add at least one entry to its [servers] table"
    )]
    NoServers { config_file: PathBuf },

    /// Requested server is not configured.
    #[error("server {name:?} not found in configuration, available servers: {available}")]
    UnknownServer { name: String, available: String },

    /// Decision provider returned an index out of range.
    #[error("server choice {0} is out of range")]
    InvalidChoice(usize),

    /// Operator could not be asked.
    #[error(transparent)]
    Decision(#[from] DecisionError),
}

/// Friendly result alias :3
type Result<T, E = SelectError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decide::NonInteractive;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    /// Pick a fixed option, remembering what was offered.
    struct Pick {
        index: usize,
        offered: RefCell<Vec<String>>,
    }

    impl Decide for Pick {
        fn select(
            &self,
            _: &Question,
            options: &[String],
            _: usize,
        ) -> crate::decide::Result<usize> {
            self.offered.replace(options.to_vec());
            Ok(self.index)
        }

        fn confirm(&self, _: &Question, default: bool) -> crate::decide::Result<bool> {
            Ok(default)
        }
    }

    fn servers() -> BTreeMap<String, ServerEntry> {
        BTreeMap::from([
            ("db1".into(), ServerEntry::User("deploy".into())),
            (
                "staging".into(),
                ServerEntry::Extended(crate::config::ExtendedServer {
                    user: "forge".into(),
                    host: Some("10.0.0.5".into()),
                    ..Default::default()
                }),
            ),
        ])
    }

    #[test]
    fn empty_configuration_is_an_error() {
        let config_file = Path::new("flux-dev.toml");
        let result = select_server(&BTreeMap::new(), None, &NonInteractive, config_file);
        assert!(matches!(result, Err(SelectError::NoServers { .. })));
    }

    #[test]
    fn empty_configuration_beats_explicit_name() {
        let result = select_server(
            &BTreeMap::new(),
            Some("db1"),
            &NonInteractive,
            Path::new("flux-dev.toml"),
        );
        assert!(matches!(result, Err(SelectError::NoServers { .. })));
    }

    #[test]
    fn lone_server_is_picked_without_prompt() -> anyhow::Result<()> {
        let servers = BTreeMap::from([("db1".to_string(), ServerEntry::User("deploy".into()))]);
        let result = select_server(&servers, None, &NonInteractive, Path::new("flux-dev.toml"))?;
        assert_eq!(result.name, "db1");
        assert_eq!(result.user, "deploy");

        Ok(())
    }

    #[test]
    fn requested_server_is_resolved() -> anyhow::Result<()> {
        let result = select_server(&servers(), Some("staging"), &NonInteractive, Path::new("x"))?;
        assert_eq!(result.host, "10.0.0.5");
        assert_eq!(result.directory, "~/staging");

        Ok(())
    }

    #[test]
    fn unknown_server_lists_available_names() {
        let result = select_server(&servers(), Some("prod"), &NonInteractive, Path::new("x"));
        match result {
            Err(error @ SelectError::UnknownServer { .. }) => assert_eq!(
                error.to_string(),
                "server \"prod\" not found in configuration, available servers: db1, staging"
            ),
            other => panic!("expected unknown server, got {other:?}"),
        }
    }

    #[test]
    fn several_servers_are_offered_to_operator() -> anyhow::Result<()> {
        let pick = Pick {
            index: 1,
            offered: RefCell::new(Vec::new()),
        };
        let result = select_server(&servers(), None, &pick, Path::new("x"))?;
        assert_eq!(result.name, "staging");
        assert_eq!(
            pick.offered.into_inner(),
            ["db1 (deploy)", "staging → 10.0.0.5 (forge)"]
        );

        Ok(())
    }

    #[test]
    fn several_servers_need_interaction() {
        let result = select_server(&servers(), None, &NonInteractive, Path::new("x"));
        assert!(matches!(result, Err(SelectError::Decision(_))));
    }
}
