// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Game Server Agent
//!
//! Deploys Minecraft, Counter-Strike 2 and Valheim containers through the
//! deployment backend, then opens the server port on the OPNsense firewall.
//!
//! A deployment whose firewall step fails is a partial mutation: the error
//! carries the deployment id and rollback deletes it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use booner_swarm::ResourceKey;

use crate::domain::action::{ActionRequest, ExecutionError};
use crate::domain::agent::{Agent, AgentOutput};
use crate::domain::capability::{AgentCapability, TargetHost};
use crate::domain::intent::{ActionKind, Intent};

use super::backend::BackendClient;
use super::network::{OpnsenseApi, OpnsenseResource};

pub const CAPABILITY_ID: &str = "game-servers";

const DEFAULT_MEMORY: &str = "4G";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    Minecraft,
    Cs2,
    Valheim,
}

impl GameType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace([' ', '-', '_'], "").as_str() {
            "minecraft" | "mc" => Some(Self::Minecraft),
            "cs2" | "counterstrike" | "counterstrike2" => Some(Self::Cs2),
            "valheim" => Some(Self::Valheim),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minecraft => "minecraft",
            Self::Cs2 => "cs2",
            Self::Valheim => "valheim",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Self::Minecraft => 25565,
            Self::Cs2 => 27015,
            Self::Valheim => 2456,
        }
    }

    fn image(&self) -> &'static str {
        match self {
            Self::Minecraft => "itzg/minecraft-server",
            Self::Cs2 => "cm2network/cs2",
            Self::Valheim => "lloesche/valheim-server",
        }
    }

    /// Transport the firewall rule opens.
    fn protocol(&self) -> &'static str {
        match self {
            Self::Minecraft => "TCP",
            Self::Cs2 => "TCP/UDP",
            Self::Valheim => "UDP",
        }
    }
}

/// Container deployment spec sent to the deployment backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub container_name: String,
    pub image: String,
    pub ports: Vec<String>,
    pub environment: BTreeMap<String, String>,
    pub volumes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameServerPayload {
    pub game_type: GameType,
    pub server_name: String,
    pub host: String,
    pub port: u16,
    pub memory: String,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl GameServerPayload {
    pub fn container_spec(&self) -> ContainerSpec {
        let name = &self.server_name;
        let port = self.port;
        let setting = |key: &str, default: &str| self.settings.get(key).cloned().unwrap_or_else(|| default.to_string());

        let (ports, mut environment, volume) = match self.game_type {
            GameType::Minecraft => (
                vec![format!("{}:25565", port)],
                BTreeMap::from([
                    ("EULA".to_string(), "TRUE".to_string()),
                    ("MEMORY".to_string(), self.memory.clone()),
                    ("SERVER_NAME".to_string(), name.clone()),
                ]),
                format!("minecraft-{}-data:/data", name),
            ),
            GameType::Cs2 => (
                vec![
                    format!("{}:27015/tcp", port),
                    format!("{}:27015/udp", port),
                    format!("{}:27020/udp", port.saturating_add(1)),
                ],
                BTreeMap::from([
                    ("SERVER_HOSTNAME".to_string(), name.clone()),
                    ("SERVER_PASSWORD".to_string(), setting("password", "")),
                    ("RCON_PASSWORD".to_string(), setting("rcon_password", "changeme")),
                ]),
                format!("cs2-{}-data:/home/steam/cs2-dedicated", name),
            ),
            GameType::Valheim => (
                vec![
                    format!("{}:2456/udp", port),
                    format!("{}:2457/udp", port.saturating_add(1)),
                    format!("{}:2458/udp", port.saturating_add(2)),
                ],
                BTreeMap::from([
                    ("SERVER_NAME".to_string(), name.clone()),
                    ("WORLD_NAME".to_string(), setting("world_name", "Dedicated")),
                    ("SERVER_PASS".to_string(), setting("password", "changeme")),
                ]),
                format!("valheim-{}-data:/opt/valheim", name),
            ),
        };

        // Minecraft takes arbitrary server.properties overrides as env vars.
        if self.game_type == GameType::Minecraft {
            environment.extend(self.settings.iter().map(|(k, v)| (k.to_ascii_uppercase(), v.clone())));
        }

        ContainerSpec {
            container_name: format!("{}-{}", self.game_type.as_str(), name),
            image: self.game_type.image().to_string(),
            ports,
            environment,
            volumes: vec![volume],
        }
    }

    pub fn firewall_rule(&self) -> Value {
        json!({
            "action": "pass",
            "interface": "wan",
            "protocol": self.game_type.protocol(),
            "destination_port": self.port.to_string(),
            "description": format!("{} server: {}", self.game_type.as_str(), self.server_name),
        })
    }
}

pub struct GameServerAgent {
    deployments: BackendClient,
    firewall: Option<OpnsenseApi>,
    target: TargetHost,
}

impl GameServerAgent {
    pub fn new(deployments: BackendClient, host: impl Into<String>) -> Self {
        let target = TargetHost::new(host).with_endpoint(deployments.base_url().as_str());
        Self {
            deployments,
            firewall: None,
            target,
        }
    }

    pub fn with_firewall(mut self, firewall: OpnsenseApi) -> Self {
        self.firewall = Some(firewall);
        self
    }

    fn host_for(&self, intent: &Intent) -> String {
        intent.param_str("host").unwrap_or_else(|| self.target.host.clone())
    }

    fn game_for(intent: &Intent) -> Option<GameType> {
        intent
            .param_str("game_type")
            .or_else(|| intent.param_str("game"))
            .and_then(|g| GameType::parse(&g))
    }

    async fn open_port(&self, payload: &GameServerPayload) -> Result<Option<String>, ExecutionError> {
        let Some(firewall) = &self.firewall else {
            debug!(port = payload.port, "No firewall configured, skipping port rule");
            return Ok(None);
        };
        let resource = OpnsenseResource::lookup("firewall_rule")
            .ok_or_else(|| ExecutionError::fatal("firewall rule resource missing"))?;
        firewall.add_and_apply(resource, &payload.firewall_rule()).await.map(Some)
    }
}

#[async_trait]
impl Agent for GameServerAgent {
    fn capability(&self) -> AgentCapability {
        AgentCapability::new(CAPABILITY_ID, [ActionKind::GameServerDeploy], self.target.clone())
    }

    fn resource_key(&self, intent: &Intent) -> Option<ResourceKey> {
        let port = intent
            .param_u64("port")
            .or_else(|| Self::game_for(intent).map(|g| g.default_port() as u64))?;
        Some(ResourceKey::new(format!("game:{}:{}", self.host_for(intent), port)))
    }

    fn build_payload(&self, intent: &Intent) -> Result<Value, ExecutionError> {
        let game_type = Self::game_for(intent).ok_or_else(|| {
            ExecutionError::fatal(format!(
                "unsupported or missing game type '{}'",
                intent.param_str("game_type").or_else(|| intent.param_str("game")).unwrap_or_default()
            ))
        })?;
        let port = match intent.param_u64("port") {
            Some(port) => u16::try_from(port).map_err(|_| ExecutionError::fatal(format!("invalid port {}", port)))?,
            None => game_type.default_port(),
        };
        let server_name = intent
            .param_str("server_name")
            .or_else(|| intent.param_str("name"))
            .unwrap_or_else(|| game_type.as_str().to_string());

        let settings = match intent.parameters.get("settings") {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| (k.clone(), v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string())))
                .collect(),
            _ => BTreeMap::new(),
        };

        serde_json::to_value(GameServerPayload {
            game_type,
            server_name,
            host: self.host_for(intent),
            port,
            memory: intent.param_str("memory").unwrap_or_else(|| DEFAULT_MEMORY.to_string()),
            settings,
        })
        .map_err(|e| ExecutionError::fatal(e.to_string()))
    }

    async fn execute(&self, request: &ActionRequest) -> Result<AgentOutput, ExecutionError> {
        let payload: GameServerPayload = serde_json::from_value(request.payload.clone())
            .map_err(|e| ExecutionError::fatal(format!("malformed game server payload: {}", e)))?;
        let spec = payload.container_spec();

        let deployment_id = match &request.prior_reference {
            Some(id) => {
                info!(deployment_id = %id, "Resuming game server deployment");
                id.clone()
            }
            None => {
                let body = json!({
                    "host": payload.host,
                    "kind": "game_server",
                    "game_type": payload.game_type,
                    "container": spec,
                });
                let response = self.deployments.post(&["deployments"], &body).await?;
                response
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| ExecutionError::fatal("deployment backend did not return an id"))?
            }
        };

        let rule = self
            .open_port(&payload)
            .await
            .map_err(|e| e.with_reference(deployment_id.clone()))?;

        info!(deployment_id = %deployment_id, game = payload.game_type.as_str(), port = payload.port, "Game server deployed");
        Ok(AgentOutput::new(json!({
            "server_id": spec.container_name,
            "connection_info": format!("{}:{}", payload.host, payload.port),
            "firewall_rule": rule,
            "configuration": spec,
        }))
        .with_reference(deployment_id))
    }

    async fn rollback(&self, _request: &ActionRequest, external_reference: &str) -> Result<(), ExecutionError> {
        self.deployments
            .delete(&["deployments", external_reference])
            .await
            .map(|_| ())
            .map_err(|e| ExecutionError::RollbackFailure {
                external_reference: external_reference.to_string(),
                message: e.message().to_string(),
            })
    }

    async fn probe(&self) -> bool {
        self.deployments.probe(&["health"]).await
    }
}
