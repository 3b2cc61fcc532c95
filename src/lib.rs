// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Refresh a local Laravel development environment from a remote server.
//!
//! Pulls a fresh database dump or reuses a local one, loads it into the local
//! MySQL server, runs the post-import housekeeping, and optionally mirrors
//! the remote storage directory. All external work is done by the usual
//! command line tools: ssh, scp, mysql, php, rsync, and tar.

pub mod config;
pub mod decide;
pub mod env;
pub mod notify;
pub mod path;
pub mod process;
pub mod progress;
pub mod remote;
pub mod update;

pub use config::{Config, RemoteServer};
pub use update::{UpdateError, UpdateRequest, Updater};
