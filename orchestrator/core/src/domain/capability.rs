// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::intent::ActionKind;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityId(String);

impl CapabilityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CapabilityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Recent consecutive failures. Still matchable when no healthy
    /// capability exists.
    Degraded,
    /// Excluded from matching until a probe succeeds.
    Unhealthy,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        };
        f.write_str(s)
    }
}

/// Where a capability acts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetHost {
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl TargetHost {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Host part of `url`, or the whole string if it does not parse.
    pub fn from_url(url: &str) -> Self {
        let host = reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| url.to_string());
        Self::new(host).with_endpoint(url)
    }
}

/// A registered agent's declared ability.
///
/// Owned by the registry; `health` is only changed by dispatch outcomes and
/// health probes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCapability {
    pub capability_id: CapabilityId,
    pub action_kinds: BTreeSet<ActionKind>,
    pub target_host: TargetHost,
    pub health: HealthStatus,
}

impl AgentCapability {
    pub fn new(
        capability_id: impl Into<CapabilityId>,
        action_kinds: impl IntoIterator<Item = ActionKind>,
        target_host: TargetHost,
    ) -> Self {
        Self {
            capability_id: capability_id.into(),
            action_kinds: action_kinds
                .into_iter()
                .filter(|k| *k != ActionKind::Unknown)
                .collect(),
            target_host,
            health: HealthStatus::Healthy,
        }
    }

    pub fn handles(&self, kind: ActionKind) -> bool {
        self.action_kinds.contains(&kind)
    }
}

impl From<String> for CapabilityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("capability '{0}' is already registered")]
    DuplicateCapability(CapabilityId),

    #[error("capability '{0}' is not registered")]
    UnknownCapability(CapabilityId),

    #[error("capability '{0}' declares no action kinds")]
    NoActionKinds(CapabilityId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_kind_is_never_declared() {
        let cap = AgentCapability::new(
            "games",
            [ActionKind::GameServerDeploy, ActionKind::Unknown],
            TargetHost::new("alpha"),
        );
        assert!(cap.handles(ActionKind::GameServerDeploy));
        assert!(!cap.handles(ActionKind::Unknown));
        assert_eq!(cap.health, HealthStatus::Healthy);
    }

    #[test]
    fn test_target_host_from_url() {
        let target = TargetHost::from_url("https://fw.lab.local:8443/api");
        assert_eq!(target.host, "fw.lab.local");
        assert_eq!(target.endpoint.as_deref(), Some("https://fw.lab.local:8443/api"));

        assert_eq!(TargetHost::from_url("not a url").host, "not a url");
    }
}
