// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Lifecycle notifications.
//!
//! The update workflow reports its progress through [`Event`] values handed
//! to a [`Notify`] implementation. Notifications are fire-and-forget: nothing
//! a notifier does feeds back into control flow.

use std::path::PathBuf;
use tracing::debug;

/// Lifecycle point reached by the update workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    UpdateStarted {
        server: String,
        user: String,
        use_local: bool,
        sync_storage: bool,
        delete_dump: bool,
    },
    RemoteDumpCreated {
        server: String,
        user: String,
    },
    DumpDownloaded {
        server: String,
        user: String,
        dump_file: PathBuf,
    },
    DatabaseImportStarted {
        dump_file: PathBuf,
    },
    DatabaseImportCompleted {
        dump_file: PathBuf,
    },
    MigrationsCompleted {
        success: bool,
    },
    StorageSyncStarted {
        server: String,
        user: String,
    },
    StorageSyncCompleted {
        server: String,
        user: String,
        success: bool,
    },
    UpdateCompleted {
        server: String,
        user: String,
    },
    UpdateFailed {
        server: String,
        user: String,
        reason: String,
    },
}

/// Receiver of lifecycle notifications.
pub trait Notify {
    fn notify(&self, event: &Event);
}

/// Report notifications as debug-level tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notify for TracingNotifier {
    fn notify(&self, event: &Event) {
        debug!(target: "flux_dev::event", ?event);
    }
}
