// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// Application Deployment Agent
//
// Web apps, databases and generic game stacks deployed through the
// deployment backend. One create call per intent; rollback deletes it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use booner_swarm::ResourceKey;

use crate::domain::action::{ActionRequest, ExecutionError};
use crate::domain::agent::{Agent, AgentOutput};
use crate::domain::capability::{AgentCapability, TargetHost};
use crate::domain::intent::{ActionKind, Intent};

use super::backend::BackendClient;

pub const CAPABILITY_ID: &str = "app-deploy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppType {
    Web,
    Database,
    Game,
}

impl AppType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "web" | "website" | "webapp" | "http" => Some(Self::Web),
            "database" | "db" | "postgres" | "mysql" => Some(Self::Database),
            "game" => Some(Self::Game),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Database => "database",
            Self::Game => "game",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppPayload {
    pub app_type: AppType,
    pub name: String,
    pub host: String,
    #[serde(default)]
    pub configuration: serde_json::Map<String, Value>,
}

pub struct AppDeployAgent {
    deployments: BackendClient,
    target: TargetHost,
}

impl AppDeployAgent {
    pub fn new(deployments: BackendClient, host: impl Into<String>) -> Self {
        let target = TargetHost::new(host).with_endpoint(deployments.base_url().as_str());
        Self { deployments, target }
    }

    fn host_for(&self, intent: &Intent) -> String {
        intent.param_str("host").unwrap_or_else(|| self.target.host.clone())
    }

    fn name_for(intent: &Intent) -> String {
        intent
            .param_str("name")
            .or_else(|| intent.param_str("app_name"))
            .or_else(|| intent.param_str("image"))
            .or_else(|| intent.param_str("app_type"))
            .unwrap_or_else(|| "app".to_string())
    }
}

#[async_trait]
impl Agent for AppDeployAgent {
    fn capability(&self) -> AgentCapability {
        AgentCapability::new(CAPABILITY_ID, [ActionKind::AppDeploy], self.target.clone())
    }

    fn resource_key(&self, intent: &Intent) -> Option<ResourceKey> {
        Some(ResourceKey::new(format!("app:{}:{}", self.host_for(intent), Self::name_for(intent))))
    }

    fn build_payload(&self, intent: &Intent) -> Result<Value, ExecutionError> {
        let raw_type = intent.param_str("app_type").unwrap_or_else(|| "web".to_string());
        let app_type = AppType::parse(&raw_type)
            .ok_or_else(|| ExecutionError::fatal(format!("Unknown application type: {}", raw_type)))?;

        let mut configuration = match intent.parameters.get("configuration") {
            Some(Value::Object(map)) => map.clone(),
            _ => {
                let mut loose = intent.parameters.clone();
                for key in ["app_type", "name", "app_name", "host"] {
                    loose.remove(key);
                }
                loose
            }
        };
        if app_type == AppType::Game {
            let game_type = configuration
                .get("game_type")
                .cloned()
                .or_else(|| intent.parameters.get("game_type").cloned())
                .ok_or_else(|| ExecutionError::fatal("Game type not specified"))?;
            configuration.insert("game_type".to_string(), game_type);
        }

        serde_json::to_value(AppPayload {
            app_type,
            name: Self::name_for(intent),
            host: self.host_for(intent),
            configuration,
        })
        .map_err(|e| ExecutionError::fatal(e.to_string()))
    }

    async fn execute(&self, request: &ActionRequest) -> Result<AgentOutput, ExecutionError> {
        let payload: AppPayload = serde_json::from_value(request.payload.clone())
            .map_err(|e| ExecutionError::fatal(format!("malformed app payload: {}", e)))?;

        if let Some(id) = &request.prior_reference {
            let status = self.deployments.get(&["deployments", id]).await?;
            return Ok(AgentOutput::new(status).with_reference(id.clone()));
        }

        let body = json!({
            "host": payload.host,
            "kind": payload.app_type,
            "name": payload.name,
            "configuration": payload.configuration,
        });
        let response = self.deployments.post(&["deployments"], &body).await?;
        let id = response
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ExecutionError::fatal("deployment backend did not return an id"))?;

        info!(deployment_id = %id, app_type = payload.app_type.as_str(), host = %payload.host, "Application deployed");
        Ok(AgentOutput::new(response).with_reference(id))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capability::CapabilityId;
    use crate::domain::intent::{IntentId, Parameters};
    use crate::infrastructure::agents::backend::BackendAuth;

    fn intent(params: Value) -> Intent {
        let parameters: Parameters = serde_json::from_value(params).unwrap();
        Intent::new("deploy an app", ActionKind::AppDeploy, parameters, 0.9)
    }

    fn agent(url: &str) -> AppDeployAgent {
        AppDeployAgent::new(BackendClient::new(url, BackendAuth::Bearer("tok".into())).unwrap(), "alpha")
    }

    #[test]
    fn test_resource_key_from_host_and_name() {
        let agent = agent("http://deploy.lab");
        let key = agent
            .resource_key(&intent(json!({"name": "wiki", "host": "beta"})))
            .unwrap();
        assert_eq!(key.as_str(), "app:beta:wiki");
    }

    #[test]
    fn test_unknown_app_type_is_fatal() {
        let err = agent("http://deploy.lab")
            .build_payload(&intent(json!({"app_type": "mainframe"})))
            .unwrap_err();
        assert_eq!(err.message(), "Unknown application type: mainframe");
    }

    #[test]
    fn test_game_app_requires_game_type() {
        let agent = agent("http://deploy.lab");
        let err = agent.build_payload(&intent(json!({"app_type": "game"}))).unwrap_err();
        assert_eq!(err.message(), "Game type not specified");

        let payload = agent
            .build_payload(&intent(json!({"app_type": "game", "game_type": "minecraft"})))
            .unwrap();
        assert_eq!(payload["configuration"]["game_type"], "minecraft");
    }

    #[tokio::test]
    async fn test_deploy_returns_backend_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/deployments")
            .match_header("authorization", "Bearer tok")
            .with_status(201)
            .with_body(r#"{"id":"web-123","status":"running"}"#)
            .create_async()
            .await;

        let agent = agent(&server.url());
        let payload = agent
            .build_payload(&intent(json!({"app_type": "web", "name": "blog", "image": "ghost"})))
            .unwrap();
        let request = ActionRequest::new(
            IntentId::new(),
            ActionKind::AppDeploy,
            CapabilityId::new(CAPABILITY_ID),
            None,
            payload,
        );
        let output = agent.execute(&request).await.unwrap();

        assert_eq!(output.external_reference.as_deref(), Some("web-123"));
        assert_eq!(output.data["status"], "running");
        mock.assert_async().await;
    }
}
