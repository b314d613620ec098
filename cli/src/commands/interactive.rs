// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `booner interactive`: request prompt loop.

use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Input};
use std::path::PathBuf;

use booner_core::domain::OrchestrationEvent;

use crate::embedded::EmbeddedNode;

pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let node = EmbeddedNode::load(config_path).await?;

    // Progress lines for dispatch, attempts and health changes.
    let mut events = node.events.subscribe();
    let progress = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let Some(line) = progress_line(&event) {
                println!("{}", line.dimmed());
            }
        }
    });

    println!("{}", "Booner interactive mode. Type 'quit' or 'exit' to leave.".bold());

    loop {
        let line = match read_line().await? {
            Some(line) => line,
            None => break,
        };
        let request = line.trim();
        if request.is_empty() {
            continue;
        }
        if is_exit(request) {
            break;
        }

        match node.orchestrator.handle_request(request).await {
            Ok(outcome) => super::print_outcome(&outcome),
            Err(e) => println!("{} {}", "✗".red().bold(), e.to_string().red()),
        }
    }

    progress.abort();
    println!("{}", "Goodbye.".dimmed());
    Ok(())
}

/// `None` when stdin is closed.
async fn read_line() -> Result<Option<String>> {
    let read = tokio::task::spawn_blocking(|| {
        Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt("booner")
            .allow_empty(true)
            .interact_text()
    })
    .await
    .context("Prompt task failed")?;

    match read {
        Ok(line) => Ok(Some(line)),
        Err(dialoguer::Error::IO(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e).context("Failed to read request"),
    }
}

fn is_exit(input: &str) -> bool {
    matches!(input.to_ascii_lowercase().as_str(), "quit" | "exit")
}

fn progress_line(event: &OrchestrationEvent) -> Option<String> {
    match event {
        OrchestrationEvent::DispatchStarted {
            capability_id,
            resource_key,
            ..
        } => Some(format!(
            "  -> dispatching to {}{}",
            capability_id,
            resource_key
                .as_deref()
                .map(|k| format!(" (lock {})", k))
                .unwrap_or_default()
        )),
        OrchestrationEvent::ActionAttempted { attempt, outcome, .. } => {
            Some(format!("  -> attempt {}: {}", attempt, outcome.as_str()))
        }
        OrchestrationEvent::CapabilityHealthChanged {
            capability_id, from, to, ..
        } => Some(format!("  -> {} health {} -> {}", capability_id, from, to)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_words() {
        assert!(is_exit("quit"));
        assert!(is_exit("EXIT"));
        assert!(!is_exit("exit the vlan"));
    }
}
