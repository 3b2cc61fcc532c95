// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Run option resolution.
//!
//! Flags are consulted first, in a fixed priority order. Only when no flag
//! settles a decision is the operator asked. The result is a [`RunConfig`]
//! that stays fixed for the rest of the run.

use crate::decide::{Decide, Question, Result};

/// Command line flags of `update-from-remote`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    /// Pull new dump, keep it, sync storage.
    pub full: bool,

    /// Use local dump if it exists, no storage sync.
    pub fast: bool,

    pub local: bool,
    pub remote: bool,
    pub keep_dump: bool,
    pub delete_dump: bool,
    pub sync_storage: bool,
    pub skip_storage: bool,

    /// Abort the run if migrations fail.
    pub strict_migrations: bool,
}

/// Resolved options of a single run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    pub use_local_dump: bool,
    pub sync_storage: bool,
    pub delete_dump_after: bool,
    pub abort_on_migration_failure: bool,
}

impl RunConfig {
    /// Whether a remote server is involved at all.
    pub fn needs_server(&self) -> bool {
        !self.use_local_dump || self.sync_storage
    }
}

/// Decide whether to reuse the local dump.
pub fn resolve_source(flags: &Flags, dump_exists: bool, decide: &impl Decide) -> Result<bool> {
    if flags.full {
        return Ok(false);
    }

    if flags.fast {
        return Ok(dump_exists);
    }

    if flags.local {
        return Ok(true);
    }

    if flags.remote {
        return Ok(false);
    }

    let options = [
        "Pull new dump from server".to_string(),
        "Use existing local dump".to_string(),
    ];
    let question = Question::new(
        "Choose dump source",
        &["--remote", "--local", "--full", "--fast"],
    );
    Ok(decide.select(&question, &options, 0)? == 1)
}

/// Decide whether to mirror the remote storage directory.
pub fn resolve_sync_storage(flags: &Flags, use_local: bool, decide: &impl Decide) -> Result<bool> {
    // INVARIANT: Local runs never touch remote storage unless asked to.
    if use_local && !flags.sync_storage {
        return Ok(false);
    }

    if flags.full {
        return Ok(true);
    }

    if flags.fast {
        return Ok(flags.sync_storage);
    }

    if flags.sync_storage {
        return Ok(true);
    }

    if flags.skip_storage {
        return Ok(false);
    }

    let question = Question::new(
        "Sync storage from remote server?",
        &["--sync-storage", "--skip-storage"],
    );
    decide.confirm(&question, true)
}

/// Decide whether to delete the local dump after import.
pub fn resolve_dump_deletion(flags: &Flags, decide: &impl Decide) -> Result<bool> {
    if flags.full || flags.fast {
        return Ok(false);
    }

    if flags.delete_dump {
        return Ok(true);
    }

    if flags.keep_dump {
        return Ok(false);
    }

    let question = Question::new(
        "Delete local dump file after import?",
        &["--keep-dump", "--delete-dump"],
    );
    decide.confirm(&question, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decide::{DecisionError, NonInteractive};
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    /// Accept every default.
    struct Defaults;

    impl Decide for Defaults {
        fn select(&self, _: &Question, _: &[String], default: usize) -> Result<usize> {
            Ok(default)
        }

        fn confirm(&self, _: &Question, default: bool) -> Result<bool> {
            Ok(default)
        }
    }

    fn flags(configure: impl FnOnce(&mut Flags)) -> Flags {
        let mut flags = Flags::default();
        configure(&mut flags);
        flags
    }

    #[test_case(flags(|f| f.full = true), true, false; "full always pulls")]
    #[test_case(flags(|f| f.fast = true), true, true; "fast reuses existing dump")]
    #[test_case(flags(|f| f.fast = true), false, false; "fast pulls without dump")]
    #[test_case(flags(|f| f.local = true), false, true; "local")]
    #[test_case(flags(|f| f.remote = true), true, false; "remote")]
    #[test_case(flags(|f| { f.full = true; f.local = true; }), true, false; "full beats local")]
    #[test]
    fn source_follows_flag_priority(flags: Flags, dump_exists: bool, expect: bool) {
        let result = resolve_source(&flags, dump_exists, &NonInteractive);
        pretty_assertions::assert_eq!(result.ok(), Some(expect));
    }

    #[test]
    fn source_prompt_defaults_to_remote() -> anyhow::Result<()> {
        assert!(!resolve_source(&Flags::default(), true, &Defaults)?);
        Ok(())
    }

    #[test_case(flags(|_| {}), true, false; "local run skips storage")]
    #[test_case(flags(|f| f.sync_storage = true), true, true; "local run with explicit sync")]
    #[test_case(flags(|f| f.full = true), false, true; "full syncs")]
    #[test_case(flags(|f| f.fast = true), false, false; "fast skips")]
    #[test_case(
        flags(|f| { f.fast = true; f.sync_storage = true; }), false, true;
        "fast with sync"
    )]
    #[test_case(flags(|f| f.skip_storage = true), false, false; "skip")]
    #[test]
    fn storage_follows_flag_priority(flags: Flags, use_local: bool, expect: bool) {
        let result = resolve_sync_storage(&flags, use_local, &NonInteractive);
        pretty_assertions::assert_eq!(result.ok(), Some(expect));
    }

    #[test]
    fn storage_prompt_defaults_to_yes() -> anyhow::Result<()> {
        assert!(resolve_sync_storage(&Flags::default(), false, &Defaults)?);
        Ok(())
    }

    #[test_case(flags(|f| f.full = true), false; "full keeps")]
    #[test_case(flags(|f| { f.fast = true; f.delete_dump = true; }), false; "fast keeps")]
    #[test_case(flags(|f| f.delete_dump = true), true; "delete")]
    #[test_case(flags(|f| f.keep_dump = true), false; "keep")]
    #[test]
    fn deletion_follows_flag_priority(flags: Flags, expect: bool) {
        let result = resolve_dump_deletion(&flags, &NonInteractive);
        pretty_assertions::assert_eq!(result.ok(), Some(expect));
    }

    #[test]
    fn deletion_prompt_defaults_to_keep() -> anyhow::Result<()> {
        assert!(!resolve_dump_deletion(&Flags::default(), &Defaults)?);
        Ok(())
    }

    #[test]
    fn unsettled_deletion_fails_without_interaction() {
        let result = resolve_dump_deletion(&Flags::default(), &NonInteractive);
        assert!(matches!(result, Err(DecisionError::Required { .. })));
    }

    #[test]
    fn local_run_without_storage_needs_no_server() {
        let run = RunConfig {
            use_local_dump: true,
            ..Default::default()
        };
        assert!(!run.needs_server());
    }
}
