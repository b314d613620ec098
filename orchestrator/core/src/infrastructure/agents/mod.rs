// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Action Agents
//!
//! HTTP-backed implementations of the [`Agent`] port.
//!
//! # Available Agents
//!
//! - **NetworkConfigAgent** - OPNsense filter rules, NAT, VLANs, aliases, VPN peers
//! - **GameServerAgent** - Minecraft / CS2 / Valheim containers plus firewall port
//! - **AppDeployAgent** - web, database and game application stacks
//! - **QueryAgent** - read-only answers from the context store

pub mod app_deploy;
pub mod backend;
pub mod game_server;
pub mod network;
pub mod query;

use std::sync::Arc;

use anyhow::{Context, Result};
use booner_cortex::ContextStore;
use tracing::info;

use crate::domain::agent::Agent;
use crate::domain::config::{resolve_secret, BackendsConfig};
use crate::domain::llm::LLMProvider;

pub use app_deploy::AppDeployAgent;
pub use backend::{BackendAuth, BackendClient};
pub use game_server::GameServerAgent;
pub use network::{NetworkConfigAgent, OpnsenseApi};
pub use query::QueryAgent;

/// Build every agent the configured backends allow.
///
/// The query agent is always present; the others need their backend.
pub fn build_agents(
    backends: &BackendsConfig,
    llm: Arc<dyn LLMProvider>,
    context: Arc<ContextStore>,
    top_k: usize,
) -> Result<Vec<Arc<dyn Agent>>> {
    let mut agents: Vec<Arc<dyn Agent>> = vec![Arc::new(QueryAgent::new(llm, context, top_k))];

    let firewall = match &backends.opnsense {
        Some(opnsense) => {
            let auth = BackendAuth::Basic {
                key: resolve_secret(&opnsense.api_key).context("Failed to resolve OPNsense API key")?,
                secret: resolve_secret(&opnsense.api_secret).context("Failed to resolve OPNsense API secret")?,
            };
            let client = BackendClient::new(&opnsense.url, auth)
                .context("Invalid OPNsense URL")?;
            agents.push(Arc::new(NetworkConfigAgent::new(client.clone())));
            Some(OpnsenseApi::new(client))
        }
        None => None,
    };

    if let Some(deployment) = &backends.deployment {
        let auth = match &deployment.api_key {
            Some(key) => BackendAuth::Bearer(resolve_secret(key).context("Failed to resolve deployment API key")?),
            None => BackendAuth::None,
        };
        let client = BackendClient::new(&deployment.url, auth)
            .context("Invalid deployment backend URL")?;
        let host = deployment
            .host
            .clone()
            .unwrap_or_else(|| client.host().to_string());

        let mut games = GameServerAgent::new(client.clone(), host.clone());
        if let Some(firewall) = firewall {
            games = games.with_firewall(firewall);
        }
        agents.push(Arc::new(games));
        agents.push(Arc::new(AppDeployAgent::new(client, host)));
    }

    info!(count = agents.len(), "Action agents built");
    Ok(agents)
}
