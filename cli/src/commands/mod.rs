// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Booner CLI

pub mod ask;
pub mod config;
pub mod interactive;
pub mod serve;

pub use self::config::ConfigCommand;

use colored::Colorize;

use booner_core::application::RequestOutcome;

/// Print an outcome the way `ask` and `interactive` show it.
pub(crate) fn print_outcome(outcome: &RequestOutcome) {
    let intent = outcome.intent();
    match outcome {
        RequestOutcome::ClarificationNeeded { message, .. } => {
            println!("{} {}", "?".yellow().bold(), message.yellow());
        }
        RequestOutcome::Completed { result, .. } if result.is_success() => {
            println!("{} {}", "✓".green().bold(), outcome.summary().green());
            if !result.detail.is_null() {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&result.detail).unwrap_or_default().dimmed()
                );
            }
        }
        RequestOutcome::Completed { .. } => {
            println!("{} {}", "✗".red().bold(), outcome.summary().red());
        }
    }
    println!(
        "{}",
        format!(
            "  intent {} ({}, confidence {:.2})",
            intent.id, intent.resolved_action_kind, intent.confidence
        )
        .dimmed()
    );
}
