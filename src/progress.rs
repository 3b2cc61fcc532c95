// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Progress display for long-running steps.

use indicatif::{ProgressBar, ProgressStyle};
use std::{future::Future, time::Duration};

/// Show a spinner with target message until future completes.
///
/// The spinner draws to stderr, and stays hidden when stderr is not a
/// terminal.
pub async fn spin<F: Future>(message: impl Into<String>, future: F) -> F::Output {
    let style = ProgressStyle::with_template("{spinner:.green} {msg} {elapsed:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ");
    let bar = ProgressBar::new_spinner().with_style(style);
    bar.set_message(message.into());
    bar.enable_steady_tick(Duration::from_millis(100));

    let output = future.await;
    bar.finish_and_clear();

    output
}
