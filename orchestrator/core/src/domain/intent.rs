// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Intent
//!
//! Structured interpretation of one natural-language infrastructure request.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Intent value object, the closed set of action kinds, and the
//!   total mapping from model output labels onto that set

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentId(pub Uuid);

impl IntentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for IntentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What kind of infrastructure action a request resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    NetworkConfig,
    AppDeploy,
    GameServerDeploy,
    Query,
    /// The request could not be mapped. Never dispatched; the caller is asked
    /// to clarify.
    Unknown,
}

impl ActionKind {
    /// Every kind an agent can declare.
    pub const ACTIONABLE: [ActionKind; 4] = [
        ActionKind::NetworkConfig,
        ActionKind::AppDeploy,
        ActionKind::GameServerDeploy,
        ActionKind::Query,
    ];

    /// Map a model-produced label onto an action kind.
    ///
    /// Case, whitespace, `_` and `-` are ignored. Anything not in the table is
    /// [`ActionKind::Unknown`].
    pub fn from_label(label: &str) -> Self {
        let normalized: String = label
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "networkconfig" | "network" | "firewall" | "firewallrule" | "nat" | "vlan" | "vpn" => {
                ActionKind::NetworkConfig
            }
            "appdeploy" | "applicationdeploy" | "deployapp" | "deployapplication" => ActionKind::AppDeploy,
            "gameserverdeploy" | "gameserver" | "deploygameserver" | "gamedeploy" => ActionKind::GameServerDeploy,
            "query" | "question" | "info" | "information" => ActionKind::Query,
            _ => ActionKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::NetworkConfig => "network_config",
            ActionKind::AppDeploy => "app_deploy",
            ActionKind::GameServerDeploy => "game_server_deploy",
            ActionKind::Query => "query",
            ActionKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// A request after interpretation.
///
/// Immutable once handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub id: IntentId,
    pub raw_text: String,
    pub resolved_action_kind: ActionKind,
    #[serde(default)]
    pub parameters: Parameters,
    /// In `[0, 1]`. Always `0` for [`ActionKind::Unknown`].
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
}

impl Intent {
    pub fn new(raw_text: impl Into<String>, kind: ActionKind, parameters: Parameters, confidence: f32) -> Self {
        Self::with_id(IntentId::new(), raw_text, kind, parameters, confidence)
    }

    pub fn with_id(
        id: IntentId,
        raw_text: impl Into<String>,
        kind: ActionKind,
        parameters: Parameters,
        confidence: f32,
    ) -> Self {
        let confidence = if kind == ActionKind::Unknown {
            0.0
        } else if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };

        Self {
            id,
            raw_text: raw_text.into(),
            resolved_action_kind: kind,
            parameters,
            confidence,
            created_at: Utc::now(),
        }
    }

    /// Whether this intent may be dispatched at all.
    pub fn is_actionable(&self, min_confidence: f32) -> bool {
        self.resolved_action_kind != ActionKind::Unknown && self.confidence >= min_confidence
    }

    /// String parameter, also accepting numbers (`"port": 25565`).
    pub fn param_str(&self, key: &str) -> Option<String> {
        match self.parameters.get(key)? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Integer parameter, also accepting numeric strings (`"port": "25565"`).
    pub fn param_u64(&self, key: &str) -> Option<u64> {
        match self.parameters.get(key)? {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InterpretationError {
    /// The gateway could not be reached or refused to answer.
    #[error("LLM gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// The gateway answered but the answer does not contain a decodable
    /// action object.
    #[error("malformed gateway response: {0}")]
    MalformedResponse(String),
}
