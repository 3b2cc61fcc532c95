// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote server access over ssh, scp, and rsync.
//!
//! All three tools are handed the same connection settings: host key
//! checking is disabled, the known hosts file is discarded, and the optional
//! port, identity file, and proxy jump of the server are applied. The flag
//! spelling differs per tool, e.g., ssh takes `-p` while scp takes `-P`.

use crate::{
    config::RemoteServer,
    process::{posix_escape, Invocation},
};

use std::path::Path;

/// Null device of the local platform.
pub fn null_device() -> &'static str {
    if cfg!(windows) {
        "NUL"
    } else {
        "/dev/null"
    }
}

/// Quote path for a remote POSIX shell while keeping `~` expandable.
pub fn quote_remote_path(path: &str) -> String {
    match path.strip_prefix("~/") {
        Some("") => "~".into(),
        Some(rest) => format!("~/{}", posix_escape(rest)),
        None if path == "~" => "~".into(),
        None => posix_escape(path),
    }
}

/// Connection to a single remote server.
#[derive(Debug, Clone, Copy)]
pub struct Remote<'a> {
    server: &'a RemoteServer,
}

impl<'a> Remote<'a> {
    pub fn new(server: &'a RemoteServer) -> Self {
        Self { server }
    }

    pub fn server(&self) -> &RemoteServer {
        self.server
    }

    /// Connection options in ssh spelling.
    pub fn ssh_options(&self) -> Vec<String> {
        let mut options = self.base_options();
        if let Some(port) = self.server.port {
            options.extend(["-p".into(), port.to_string()]);
        }

        if let Some(identity) = &self.server.identity_file {
            options.extend(["-i".into(), identity.to_string_lossy().into_owned()]);
        }

        if let Some(jump) = &self.server.proxy_jump {
            options.extend(["-J".into(), jump.clone()]);
        }

        options
    }

    /// Connection options in scp spelling.
    pub fn scp_options(&self) -> Vec<String> {
        let mut options = self.base_options();
        if let Some(port) = self.server.port {
            options.extend(["-P".into(), port.to_string()]);
        }

        if let Some(identity) = &self.server.identity_file {
            options.extend(["-i".into(), identity.to_string_lossy().into_owned()]);
        }

        if let Some(jump) = &self.server.proxy_jump {
            options.extend(["-o".into(), format!("ProxyJump={jump}")]);
        }

        options
    }

    /// Remote shell command handed to rsync through `-e`.
    ///
    /// Rsync splits this string on spaces itself, honoring double quotes but
    /// not backslashes. So words containing spaces are double quoted.
    pub fn rsync_shell(&self) -> String {
        let mut shell = String::from("ssh");
        for option in self.ssh_options() {
            shell.push(' ');
            if option.contains(' ') {
                shell.push_str(&format!("\"{option}\""));
            } else {
                shell.push_str(&option);
            }
        }
        shell
    }

    /// Run shell command line on the remote server.
    pub fn ssh(&self, command: impl Into<String>) -> Invocation {
        Invocation::new("ssh")
            .args(self.ssh_options())
            .arg(self.server.target())
            .arg(command)
    }

    /// Copy remote file to local path.
    pub fn download(&self, remote_path: &str, local_path: &Path) -> Invocation {
        Invocation::new("scp")
            .args(self.scp_options())
            .arg(self.location(remote_path))
            .arg(local_path.to_string_lossy().into_owned())
    }

    /// Remote path in `user@host:path` form.
    pub fn location(&self, remote_path: &str) -> String {
        format!("{}:{}", self.server.target(), remote_path)
    }

    /// Best-effort removal of a file in the remote home directory.
    pub fn remove_from_home(&self, file_name: &str) -> Invocation {
        self.ssh(format!("rm -f ~/{}", posix_escape(file_name)))
    }

    fn base_options(&self) -> Vec<String> {
        vec![
            "-o".into(),
            "StrictHostKeyChecking=no".into(),
            "-o".into(),
            format!("UserKnownHostsFile={}", null_device()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExtendedServer, ServerEntry};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn extended() -> RemoteServer {
        RemoteServer::resolve(
            "staging",
            &ServerEntry::Extended(ExtendedServer {
                user: "forge".into(),
                host: Some("10.0.0.5".into()),
                port: Some(2222),
                identity_file: Some(PathBuf::from("/keys/my key")),
                proxy_jump: Some("bastion".into()),
                directory: None,
            }),
        )
    }

    #[cfg(unix)]
    #[test]
    fn simple_server_uses_base_options_only() {
        let server = RemoteServer::resolve("db1", &ServerEntry::User("deploy".into()));
        let remote = Remote::new(&server);
        let expect = [
            "-o",
            "StrictHostKeyChecking=no",
            "-o",
            "UserKnownHostsFile=/dev/null",
        ];
        assert_eq!(remote.ssh_options(), expect);
        assert_eq!(remote.scp_options(), expect);
    }

    #[cfg(unix)]
    #[test]
    fn ssh_and_scp_spell_options_differently() {
        let server = extended();
        let remote = Remote::new(&server);
        assert_eq!(
            &remote.ssh_options()[4..],
            ["-p", "2222", "-i", "/keys/my key", "-J", "bastion"]
        );
        assert_eq!(
            &remote.scp_options()[4..],
            ["-P", "2222", "-i", "/keys/my key", "-o", "ProxyJump=bastion"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn rsync_shell_quotes_words_with_spaces() {
        let server = extended();
        let result = Remote::new(&server).rsync_shell();
        let expect = "ssh -o StrictHostKeyChecking=no -o UserKnownHostsFile=/dev/null \
                      -p 2222 -i \"/keys/my key\" -J bastion";
        assert_eq!(result, expect);
    }

    #[cfg(unix)]
    #[test]
    fn download_targets_user_at_host() {
        let server = RemoteServer::resolve("db1", &ServerEntry::User("deploy".into()));
        let invocation =
            Remote::new(&server).download("~/dump.sql", Path::new("/srv/app/dump.sql"));
        assert_eq!(
            invocation.command_line(),
            "scp -o StrictHostKeyChecking=no -o UserKnownHostsFile=/dev/null \
             deploy@db1:~/dump.sql /srv/app/dump.sql"
        );
    }

    #[test]
    fn remote_paths_keep_tilde_unquoted() {
        assert_eq!(quote_remote_path("~/erp"), "~/'erp'");
        assert_eq!(quote_remote_path("~/"), "~");
        assert_eq!(quote_remote_path("~"), "~");
        assert_eq!(quote_remote_path("/srv/my app"), "'/srv/my app'");
    }
}
