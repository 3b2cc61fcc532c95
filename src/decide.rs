// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Operator decisions.
//!
//! The update workflow asks a handful of questions whenever its flags leave
//! something open: which server, which dump source, whether to sync storage,
//! whether to delete the dump. A [`Decide`] implementation answers them.
//! [`Prompter`] asks on the terminal, while [`NonInteractive`] refuses, so
//! scripted runs fail loudly instead of hanging on a prompt.

use inquire::{Confirm, InquireError, Select};

/// A question the workflow needs answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Text shown to the operator.
    pub prompt: String,

    /// Flags that would have answered the question up front.
    pub flags: &'static [&'static str],
}

impl Question {
    pub fn new(prompt: impl Into<String>, flags: &'static [&'static str]) -> Self {
        Self {
            prompt: prompt.into(),
            flags,
        }
    }
}

/// Layer of indirection for operator decisions.
pub trait Decide {
    /// Pick one option, returning its index.
    fn select(&self, question: &Question, options: &[String], default: usize) -> Result<usize>;

    /// Answer a yes or no question.
    fn confirm(&self, question: &Question, default: bool) -> Result<bool>;
}

/// Ask the operator through terminal prompts.
#[derive(Debug, Default, Clone, Copy)]
pub struct Prompter;

impl Decide for Prompter {
    fn select(&self, question: &Question, options: &[String], default: usize) -> Result<usize> {
        let choice = Select::new(&question.prompt, options.to_vec())
            .with_starting_cursor(default)
            .raw_prompt()?;

        Ok(choice.index)
    }

    fn confirm(&self, question: &Question, default: bool) -> Result<bool> {
        Ok(Confirm::new(&question.prompt).with_default(default).prompt()?)
    }
}

/// Refuse every question.
///
/// Used with `--no-interaction`, or when stdin is not a terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractive;

impl Decide for NonInteractive {
    fn select(&self, question: &Question, _: &[String], _: usize) -> Result<usize> {
        Err(DecisionError::required(question))
    }

    fn confirm(&self, question: &Question, _: bool) -> Result<bool> {
        Err(DecisionError::required(question))
    }
}

/// All possible error types for operator decisions.
#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    /// Decision needed, but prompting is disabled.
    #[error("cannot ask {prompt:?} without interaction, pass one of: {flags}")]
    Required { prompt: String, flags: String },

    /// Terminal prompt failed or was cancelled.
    #[error(transparent)]
    Prompt(#[from] InquireError),
}

impl DecisionError {
    fn required(question: &Question) -> Self {
        Self::Required {
            prompt: question.prompt.clone(),
            flags: question.flags.join(", "),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = DecisionError> = std::result::Result<T, E>;
