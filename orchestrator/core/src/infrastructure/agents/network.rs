// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Network Configuration Agent
//!
//! Drives an OPNsense firewall through its REST API: filter rules, port
//! forwards, VLANs, aliases and WireGuard peers.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Anti-Corruption Layer between `NetworkConfig` intents and
//!   the OPNsense `/api/{module}/{controller}/{command}` routes
//!
//! Every mutation is two calls: the item change, then the controller's
//! apply/reconfigure command. A created item whose apply fails is reported
//! with its uuid so the executor can roll it back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use booner_swarm::ResourceKey;

use crate::domain::action::{ActionRequest, ExecutionError};
use crate::domain::agent::{Agent, AgentOutput};
use crate::domain::capability::{AgentCapability, TargetHost};
use crate::domain::intent::{ActionKind, Intent};

use super::backend::BackendClient;

pub const CAPABILITY_ID: &str = "opnsense";

/// CRUD verb requested by the intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkOperation {
    Create,
    Read,
    Update,
    Delete,
}

impl NetworkOperation {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "create" | "add" | "open" => Some(Self::Create),
            "read" | "get" | "list" | "show" => Some(Self::Read),
            "update" | "set" | "modify" | "change" => Some(Self::Update),
            "delete" | "remove" | "del" | "close" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn mutates(&self) -> bool {
        !matches!(self, Self::Read)
    }
}

/// Where a resource type lives in the OPNsense API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpnsenseResource {
    pub name: &'static str,
    pub module: &'static str,
    pub controller: &'static str,
    /// Suffix of the item commands (`addRule`, `getItem`, ...).
    pub noun: &'static str,
    /// Key the item is wrapped in on writes (`{"rule": {...}}`).
    pub body_key: &'static str,
    /// Command that activates pending changes.
    pub apply: &'static str,
}

const RESOURCES: &[OpnsenseResource] = &[
    OpnsenseResource {
        name: "firewall_rule",
        module: "firewall",
        controller: "filter",
        noun: "Rule",
        body_key: "rule",
        apply: "apply",
    },
    OpnsenseResource {
        name: "nat",
        module: "firewall",
        controller: "d_nat",
        noun: "Rule",
        body_key: "rule",
        apply: "apply",
    },
    OpnsenseResource {
        name: "vlan",
        module: "interfaces",
        controller: "vlan_settings",
        noun: "Item",
        body_key: "vlan",
        apply: "reconfigure",
    },
    OpnsenseResource {
        name: "alias",
        module: "firewall",
        controller: "alias",
        noun: "Item",
        body_key: "alias",
        apply: "reconfigure",
    },
    OpnsenseResource {
        name: "vpn",
        module: "wireguard",
        controller: "client",
        noun: "Client",
        body_key: "client",
        apply: "reconfigure",
    },
];

impl OpnsenseResource {
    pub fn lookup(name: &str) -> Option<&'static OpnsenseResource> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        let normalized = match normalized.as_str() {
            "firewall" | "rule" | "filter" | "filter_rule" => "firewall_rule",
            "port_forward" | "dnat" | "d_nat" => "nat",
            "wireguard" | "vpn_peer" => "vpn",
            other => other,
        };
        RESOURCES.iter().find(|r| r.name == normalized)
    }

    fn command(&self, verb: &str) -> String {
        format!("{}{}", verb, self.noun)
    }
}

/// What the agent sends through the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkPayload {
    pub action_type: NetworkOperation,
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    pub parameters: Value,
}

/// OPNsense API access shared with agents that open firewall ports.
#[derive(Clone)]
pub struct OpnsenseApi {
    client: BackendClient,
}

impl OpnsenseApi {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    /// Add an item. Returns its uuid.
    pub async fn add(&self, resource: &OpnsenseResource, item: &Value) -> Result<String, ExecutionError> {
        let body = json!({ resource.body_key: item });
        let response = self
            .client
            .post(&["api", resource.module, resource.controller, &resource.command("add")], &body)
            .await?;
        check_saved(&response)?;
        response
            .get("uuid")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ExecutionError::fatal(format!("OPNsense did not return a uuid for new {}", resource.name)))
    }

    pub async fn get(&self, resource: &OpnsenseResource, uuid: Option<&str>) -> Result<Value, ExecutionError> {
        match uuid {
            Some(uuid) => {
                self.client
                    .get(&["api", resource.module, resource.controller, &resource.command("get"), uuid])
                    .await
            }
            None => {
                self.client
                    .get(&["api", resource.module, resource.controller, &resource.command("search")])
                    .await
            }
        }
    }

    pub async fn set(&self, resource: &OpnsenseResource, uuid: &str, item: &Value) -> Result<(), ExecutionError> {
        let body = json!({ resource.body_key: item });
        let response = self
            .client
            .post(&["api", resource.module, resource.controller, &resource.command("set"), uuid], &body)
            .await?;
        check_saved(&response)
    }

    pub async fn delete(&self, resource: &OpnsenseResource, uuid: &str) -> Result<(), ExecutionError> {
        let response = self
            .client
            .post(
                &["api", resource.module, resource.controller, &resource.command("del"), uuid],
                &json!({}),
            )
            .await?;
        match response.get("result").and_then(Value::as_str) {
            Some("deleted") | Some("not found") | None => Ok(()),
            Some(other) => Err(ExecutionError::fatal(format!("OPNsense refused to delete {}: {}", uuid, other))),
        }
    }

    pub async fn apply(&self, resource: &OpnsenseResource) -> Result<(), ExecutionError> {
        self.client
            .post(&["api", resource.module, resource.controller, resource.apply], &json!({}))
            .await
            .map(|_| ())
    }

    /// Add and activate. A failed activation carries the new item's uuid.
    pub async fn add_and_apply(&self, resource: &OpnsenseResource, item: &Value) -> Result<String, ExecutionError> {
        let uuid = self.add(resource, item).await?;
        self.apply(resource).await.map_err(|e| e.with_reference(uuid.clone()))?;
        Ok(uuid)
    }

    pub async fn probe(&self) -> bool {
        self.client.probe(&["api", "core", "firmware", "status"]).await
    }
}

/// Validation errors come back as 200 with `result: failed`.
fn check_saved(response: &Value) -> Result<(), ExecutionError> {
    match response.get("result").and_then(Value::as_str) {
        Some("failed") => Err(ExecutionError::fatal(format!(
            "OPNsense rejected the change: {}",
            response.get("validations").cloned().unwrap_or(Value::Null)
        ))),
        _ => Ok(()),
    }
}

pub struct NetworkConfigAgent {
    api: OpnsenseApi,
    target: TargetHost,
}

impl NetworkConfigAgent {
    pub fn new(client: BackendClient) -> Self {
        let target = TargetHost::new(client.host()).with_endpoint(client.base_url().as_str());
        Self {
            api: OpnsenseApi::new(client),
            target,
        }
    }

    fn payload(request: &ActionRequest) -> Result<(NetworkPayload, &'static OpnsenseResource), ExecutionError> {
        let payload: NetworkPayload = serde_json::from_value(request.payload.clone())
            .map_err(|e| ExecutionError::fatal(format!("malformed network payload: {}", e)))?;
        let resource = OpnsenseResource::lookup(&payload.resource_type)
            .ok_or_else(|| ExecutionError::fatal(format!("unsupported resource type '{}'", payload.resource_type)))?;
        Ok((payload, resource))
    }
}

#[async_trait]
impl Agent for NetworkConfigAgent {
    fn capability(&self) -> AgentCapability {
        AgentCapability::new(CAPABILITY_ID, [ActionKind::NetworkConfig], self.target.clone())
    }

    fn resource_key(&self, intent: &Intent) -> Option<ResourceKey> {
        let operation = intent
            .param_str("action_type")
            .and_then(|a| NetworkOperation::parse(&a))
            .unwrap_or(NetworkOperation::Create);
        if !operation.mutates() {
            return None;
        }

        if let Some(key) = intent.param_str("resource_key") {
            return Some(ResourceKey::new(key));
        }
        if let Some(vlan) = intent.param_str("vlan") {
            return Some(ResourceKey::new(format!("vlan-{}", vlan)));
        }
        let resource_type = intent.param_str("resource_type").unwrap_or_else(|| "firewall_rule".into());
        let interface = intent.param_str("interface").unwrap_or_else(|| "wan".into());
        Some(ResourceKey::new(format!("{}:{}", resource_type, interface)))
    }

    fn build_payload(&self, intent: &Intent) -> Result<Value, ExecutionError> {
        let action_type = match intent.param_str("action_type") {
            Some(raw) => NetworkOperation::parse(&raw)
                .ok_or_else(|| ExecutionError::fatal(format!("unsupported action type '{}'", raw)))?,
            None => NetworkOperation::Create,
        };

        let resource_type = match intent.param_str("resource_type") {
            Some(raw) => raw,
            None if intent.parameters.contains_key("vlan") => "vlan".to_string(),
            None => "firewall_rule".to_string(),
        };
        let resource = OpnsenseResource::lookup(&resource_type)
            .ok_or_else(|| ExecutionError::fatal(format!("unsupported resource type '{}'", resource_type)))?;

        let uuid = intent.param_str("uuid");
        if matches!(action_type, NetworkOperation::Update | NetworkOperation::Delete) && uuid.is_none() {
            return Err(ExecutionError::fatal(format!(
                "{:?} of {} needs the item uuid",
                action_type, resource.name
            )));
        }

        let parameters = match intent.parameters.get("parameters") {
            Some(Value::Object(inner)) => Value::Object(inner.clone()),
            _ => {
                let mut fields = intent.parameters.clone();
                for key in ["action_type", "resource_type", "resource_key", "uuid", "host"] {
                    fields.remove(key);
                }
                Value::Object(fields)
            }
        };

        serde_json::to_value(NetworkPayload {
            action_type,
            resource_type: resource.name.to_string(),
            uuid,
            parameters,
        })
        .map_err(|e| ExecutionError::fatal(e.to_string()))
    }

    async fn execute(&self, request: &ActionRequest) -> Result<AgentOutput, ExecutionError> {
        let (payload, resource) = Self::payload(request)?;
        debug!(
            intent_id = %request.intent_id,
            operation = ?payload.action_type,
            resource = resource.name,
            "OPNsense call"
        );

        match payload.action_type {
            NetworkOperation::Create => {
                // An earlier attempt already created the item; only activation is left.
                let uuid = match &request.prior_reference {
                    Some(uuid) => {
                        self.api.apply(resource).await.map_err(|e| e.with_reference(uuid.clone()))?;
                        uuid.clone()
                    }
                    None => self.api.add_and_apply(resource, &payload.parameters).await?,
                };
                Ok(AgentOutput::new(json!({ "result": "saved", "uuid": uuid, "resource_type": resource.name }))
                    .with_reference(uuid))
            }
            NetworkOperation::Read => {
                let data = self.api.get(resource, payload.uuid.as_deref()).await?;
                Ok(AgentOutput::new(data))
            }
            NetworkOperation::Update => {
                let uuid = payload.uuid.unwrap_or_default();
                self.api.set(resource, &uuid, &payload.parameters).await?;
                self.api.apply(resource).await?;
                Ok(AgentOutput::new(json!({ "result": "saved", "uuid": uuid })).with_reference(uuid))
            }
            NetworkOperation::Delete => {
                let uuid = payload.uuid.unwrap_or_default();
                self.api.delete(resource, &uuid).await?;
                self.api.apply(resource).await?;
                Ok(AgentOutput::new(json!({ "result": "deleted", "uuid": uuid })).with_reference(uuid))
            }
        }
    }

    async fn rollback(&self, request: &ActionRequest, external_reference: &str) -> Result<(), ExecutionError> {
        let (payload, resource) = Self::payload(request)?;
        if payload.action_type != NetworkOperation::Create {
            return Err(ExecutionError::RollbackFailure {
                external_reference: external_reference.to_string(),
                message: format!("{:?} cannot be rolled back automatically", payload.action_type),
            });
        }
        self.api.delete(resource, external_reference).await?;
        self.api.apply(resource).await
    }

    async fn probe(&self) -> bool {
        self.api.probe().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capability::CapabilityId;
    use crate::domain::intent::{IntentId, Parameters};
    use crate::infrastructure::agents::backend::BackendAuth;

    fn intent(params: Value) -> Intent {
        let parameters: Parameters = serde_json::from_value(params).unwrap();
        Intent::new("network change", ActionKind::NetworkConfig, parameters, 0.9)
    }

    fn agent(url: &str) -> NetworkConfigAgent {
        NetworkConfigAgent::new(
            BackendClient::new(
                url,
                BackendAuth::Basic {
                    key: "k".into(),
                    secret: "s".into(),
                },
            )
            .unwrap(),
        )
    }

    fn request(payload: Value) -> ActionRequest {
        ActionRequest::new(
            IntentId::new(),
            ActionKind::NetworkConfig,
            CapabilityId::new(CAPABILITY_ID),
            None,
            payload,
        )
    }

    #[test]
    fn test_resource_lookup_accepts_aliases() {
        assert_eq!(OpnsenseResource::lookup("firewall").unwrap().name, "firewall_rule");
        assert_eq!(OpnsenseResource::lookup("port-forward").unwrap().controller, "d_nat");
        assert_eq!(OpnsenseResource::lookup("VLAN").unwrap().apply, "reconfigure");
        assert!(OpnsenseResource::lookup("bgp").is_none());
    }

    #[test]
    fn test_resource_key_rules() {
        let agent = agent("http://fw.lab");

        let explicit = intent(json!({"resource_key": "edge", "vlan": 10}));
        assert_eq!(agent.resource_key(&explicit).unwrap().as_str(), "edge");

        let vlan = intent(json!({"vlan": 10}));
        assert_eq!(agent.resource_key(&vlan).unwrap().as_str(), "vlan-10");

        let rule = intent(json!({"resource_type": "nat", "interface": "lan"}));
        assert_eq!(agent.resource_key(&rule).unwrap().as_str(), "nat:lan");

        let read = intent(json!({"action_type": "read", "vlan": 10}));
        assert!(agent.resource_key(&read).is_none());
    }

    #[test]
    fn test_build_payload_collects_loose_parameters() {
        let agent = agent("http://fw.lab");
        let payload = agent
            .build_payload(&intent(json!({"vlan": 10, "interface": "igb1", "host": "fw"})))
            .unwrap();

        assert_eq!(payload["action_type"], "create");
        assert_eq!(payload["resource_type"], "vlan");
        assert_eq!(payload["parameters"], json!({"vlan": 10, "interface": "igb1"}));
    }

    #[test]
    fn test_build_payload_rejects_delete_without_uuid() {
        let agent = agent("http://fw.lab");
        let err = agent
            .build_payload(&intent(json!({"action_type": "delete", "resource_type": "alias"})))
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_create_returns_uuid_as_reference() {
        let mut server = mockito::Server::new_async().await;
        let add = server
            .mock("POST", "/api/interfaces/vlan_settings/addItem")
            .with_body(r#"{"result":"saved","uuid":"vlan-uuid"}"#)
            .create_async()
            .await;
        let apply = server
            .mock("POST", "/api/interfaces/vlan_settings/reconfigure")
            .with_body(r#"{"status":"ok"}"#)
            .create_async()
            .await;

        let agent = agent(&server.url());
        let payload = agent.build_payload(&intent(json!({"vlan": 10}))).unwrap();
        let output = agent.execute(&request(payload)).await.unwrap();

        assert_eq!(output.external_reference.as_deref(), Some("vlan-uuid"));
        add.assert_async().await;
        apply.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_apply_reports_created_uuid() {
        let mut server = mockito::Server::new_async().await;
        let _add = server
            .mock("POST", "/api/firewall/filter/addRule")
            .with_body(r#"{"result":"saved","uuid":"rule-1"}"#)
            .create_async()
            .await;
        let _apply = server
            .mock("POST", "/api/firewall/filter/apply")
            .with_status(400)
            .create_async()
            .await;

        let agent = agent(&server.url());
        let payload = agent.build_payload(&intent(json!({"destination_port": "443"}))).unwrap();
        let err = agent.execute(&request(payload)).await.unwrap_err();

        assert!(!err.is_retryable());
        assert_eq!(err.external_reference(), Some("rule-1"));
    }

    #[tokio::test]
    async fn test_validation_failure_is_fatal() {
        let mut server = mockito::Server::new_async().await;
        let _add = server
            .mock("POST", "/api/firewall/filter/addRule")
            .with_body(r#"{"result":"failed","validations":{"rule.interface":"required"}}"#)
            .create_async()
            .await;

        let agent = agent(&server.url());
        let payload = agent.build_payload(&intent(json!({}))).unwrap();
        let err = agent.execute(&request(payload)).await.unwrap_err();

        assert!(!err.is_retryable());
        assert!(err.external_reference().is_none());
        assert!(err.message().contains("rule.interface"));
    }

    #[tokio::test]
    async fn test_rollback_deletes_created_item() {
        let mut server = mockito::Server::new_async().await;
        let del = server
            .mock("POST", "/api/firewall/filter/delRule/rule-1")
            .with_body(r#"{"result":"deleted"}"#)
            .create_async()
            .await;
        let _apply = server
            .mock("POST", "/api/firewall/filter/apply")
            .with_body("{}")
            .create_async()
            .await;

        let agent = agent(&server.url());
        let payload = agent.build_payload(&intent(json!({}))).unwrap();
        agent.rollback(&request(payload), "rule-1").await.unwrap();
        del.assert_async().await;
    }
}
