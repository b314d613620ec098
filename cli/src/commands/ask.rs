// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `booner ask`: one request, handled in-process.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::embedded::EmbeddedNode;

pub async fn execute(config_path: Option<PathBuf>, text: String, json: bool) -> Result<()> {
    let node = EmbeddedNode::load(config_path).await?;

    // Ctrl+C before dispatch abandons the request; once dispatched it runs to completion.
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let outcome = node.orchestrator.handle_request_with_cancel(&text, cancel).await;
    watcher.abort();

    match outcome {
        Ok(outcome) if json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&outcome).context("Failed to serialize outcome")?
            );
            Ok(())
        }
        Ok(outcome) => {
            super::print_outcome(&outcome);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e.to_string().red());
            Err(e).context("Request failed")
        }
    }
}
