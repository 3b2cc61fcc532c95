// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Laravel `.env` file reading.
//!
//! Only simple `KEY=value` lines are understood. Lookup is anchored to the
//! start of a line, the first match wins, and the value is stripped of
//! surrounding whitespace and quotes. No variable interpolation is done.

use regex::Regex;
use std::fmt::{Debug, Formatter, Result as FmtResult};

/// Characters trimmed from both ends of a value.
const TRIM_CHARS: &[char] = &[' ', '\t', '\n', '\r', '\0', '\x0B', '"', '\''];

/// Contents of a `.env` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DotEnv {
    content: String,
}

impl DotEnv {
    /// Wrap raw `.env` contents.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// Look up value of target key.
    ///
    /// Returns `None` if no line starts with `KEY=`.
    pub fn get(&self, key: &str) -> Option<String> {
        // INVARIANT: Escaped key always yields a valid pattern.
        let pattern = Regex::new(&format!(r"(?m)^{}=(.*)$", regex::escape(key))).ok()?;
        pattern
            .captures(&self.content)
            .and_then(|captures| captures.get(1))
            .map(|value| value.as_str().trim_matches(TRIM_CHARS).to_string())
    }
}

/// Database credentials of the remote application.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteCredentials {
    pub user: String,
    pub password: String,
    pub database: String,
}

impl RemoteCredentials {
    /// Extract credentials from remote `.env` file.
    ///
    /// Returns `None` unless `DB_USERNAME`, `DB_PASSWORD`, and `DB_DATABASE`
    /// are all present.
    pub fn from_dotenv(env: &DotEnv) -> Option<Self> {
        Some(Self {
            user: env.get("DB_USERNAME")?,
            password: env.get("DB_PASSWORD")?,
            database: env.get("DB_DATABASE")?,
        })
    }
}

impl Debug for RemoteCredentials {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_struct("RemoteCredentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}
