// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Orchestrator Configuration
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) covering:
// - LLM gateway endpoint and models
// - interpretation, context, coordination, dispatch and executor knobs
// - action backend endpoints and credentials
// - HTTP API and observability settings
//
// Secrets accept "env:VAR_NAME" indirection.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_VERSION: &str = "booner.dev/v1";
pub const KIND: &str = "OrchestratorConfig";
pub const CONFIG_PATH_ENV: &str = "BOONER_CONFIG_PATH";
pub const LOCAL_CONFIG_FILE: &str = "booner-config.yaml";
const MIN_LOCK_TTL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfigManifest {
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: OrchestratorSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorSpec {
    #[serde(default)]
    pub node: NodeIdentity,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub interpreter: InterpreterConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub coordination: CoordinationConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub backends: BackendsConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// Stable identifier; used as the lock holder prefix.
    pub id: String,
}

impl Default for NodeIdentity {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub endpoint: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default = "default_embed_model")]
    pub embed_model: String,
    #[serde(default = "default_gateway_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay", with = "humantime_serde")]
    pub retry_delay: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            llm_model: default_llm_model(),
            embed_model: default_embed_model(),
            timeout: default_gateway_timeout(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpreterConfig {
    /// Context records retrieved per request.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Intents below this confidence are sent back for clarification.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_confidence: default_min_confidence(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_max_records")]
    pub max_records: usize,
    /// Embedding width. When unset it is taken from the first insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    #[serde(default = "default_prune_interval", with = "humantime_serde")]
    pub prune_interval: Duration,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub max_age: Option<Duration>,
    /// Use the built-in hashed embedder instead of the gateway.
    #[serde(default)]
    pub offline_embeddings: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_records: default_max_records(),
            dimensions: None,
            prune_interval: default_prune_interval(),
            max_age: None,
            offline_embeddings: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationMode {
    /// Coordinate through a remote server over HTTP.
    Http,
    /// Single-process coordination; locks only exclude within this process.
    #[default]
    InMemory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationConfig {
    #[serde(default)]
    pub mode: CoordinationMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Supports "env:VAR_NAME".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_lock_ttl", with = "humantime_serde")]
    pub lock_ttl: Duration,
    /// How long dispatch waits for a busy resource before giving up.
    #[serde(default = "default_lock_wait", with = "humantime_serde")]
    pub lock_wait: Duration,
    #[serde(default = "default_lock_poll_interval", with = "humantime_serde")]
    pub lock_poll_interval: Duration,
    #[serde(default = "default_max_retries")]
    pub retries: u32,
    #[serde(default = "default_coordination_retry_delay", with = "humantime_serde")]
    pub retry_delay: Duration,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(default = "default_session_id")]
    pub session_id: String,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            mode: CoordinationMode::default(),
            url: None,
            api_key: None,
            lock_ttl: default_lock_ttl(),
            lock_wait: default_lock_wait(),
            lock_poll_interval: default_lock_poll_interval(),
            retries: default_max_retries(),
            retry_delay: default_coordination_retry_delay(),
            request_timeout: default_request_timeout(),
            session_id: default_session_id(),
        }
    }
}

/// How to choose between several healthy capabilities for the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Most recent successful result first, then registration order.
    #[default]
    MostRecentSuccess,
    RegistrationOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub tie_break: TieBreak,
    /// Consecutive fatal results before Healthy becomes Degraded.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Time spent Degraded without a successful probe before Unhealthy.
    #[serde(default = "default_unhealthy_after", with = "humantime_serde")]
    pub unhealthy_after: Duration,
    #[serde(default = "default_probe_interval", with = "humantime_serde")]
    pub probe_interval: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            tie_break: TieBreak::default(),
            failure_threshold: default_failure_threshold(),
            unhealthy_after: default_unhealthy_after(),
            probe_interval: default_probe_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_executor_retry_delay", with = "humantime_serde")]
    pub retry_delay: Duration,
    #[serde(default = "default_max_retry_delay", with = "humantime_serde")]
    pub max_retry_delay: Duration,
    #[serde(default = "default_attempt_timeout", with = "humantime_serde")]
    pub attempt_timeout: Duration,
    /// Idle time after which a resolved intent is forgotten.
    #[serde(default = "default_ledger_retention", with = "humantime_serde")]
    pub ledger_retention: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay: default_executor_retry_delay(),
            max_retry_delay: default_max_retry_delay(),
            attempt_timeout: default_attempt_timeout(),
            ledger_retention: default_ledger_retention(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendsConfig {
    /// Firewall/router API. Enables network configuration and port opening.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opnsense: Option<OpnsenseBackend>,
    /// Container deployment API. Enables game server and app deployment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<DeploymentBackend>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpnsenseBackend {
    pub url: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentBackend {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Host name reported in capability and resource keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Required in `X-API-Key` when set. Supports "env:VAR_NAME".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Prometheus listener address, e.g. "0.0.0.0:9100".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_bind: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            metrics_bind: None,
        }
    }
}

fn default_llm_model() -> String {
    "mixtral:latest".to_string()
}

fn default_embed_model() -> String {
    "mxbai-embed-large".to_string()
}

fn default_gateway_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_top_k() -> usize {
    5
}

fn default_min_confidence() -> f32 {
    0.3
}

fn default_max_records() -> usize {
    10_000
}

fn default_prune_interval() -> Duration {
    Duration::from_secs(300)
}

fn default_lock_ttl() -> Duration {
    Duration::from_secs(30)
}

fn default_lock_wait() -> Duration {
    Duration::from_secs(5)
}

fn default_lock_poll_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_coordination_retry_delay() -> Duration {
    Duration::from_millis(200)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_session_id() -> String {
    "booner".to_string()
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_unhealthy_after() -> Duration {
    Duration::from_secs(120)
}

fn default_probe_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_executor_retry_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_retry_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_attempt_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_ledger_retention() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for OrchestratorConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "booner-node".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                labels: None,
            },
            spec: OrchestratorSpec::default(),
        }
    }
}

/// Resolve "env:VAR_NAME" indirection. Plain values are returned as-is.
pub fn resolve_secret(value: &str) -> anyhow::Result<String> {
    match value.strip_prefix("env:") {
        Some(var) => std::env::var(var).with_context(|| format!("environment variable '{}' is not set", var)),
        None => Ok(value.to_string()),
    }
}

impl OrchestratorConfigManifest {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).with_context(|| format!("failed to read config at {}", path.display()))?;
        Self::from_yaml_str(&content).with_context(|| format!("failed to parse config at {}", path.display()))
    }

    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Find a configuration file.
    ///
    /// 1. `BOONER_CONFIG_PATH`
    /// 2. `./booner-config.yaml`
    /// 3. `<config dir>/booner/config.yaml`
    pub fn discover_config() -> Option<PathBuf> {
        Self::discover_in(
            std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from),
            Path::new("."),
            dirs::config_dir(),
        )
    }

    fn discover_in(env_path: Option<PathBuf>, cwd: &Path, config_dir: Option<PathBuf>) -> Option<PathBuf> {
        let candidates = env_path
            .into_iter()
            .chain(std::iter::once(cwd.join(LOCAL_CONFIG_FILE)))
            .chain(config_dir.map(|dir| dir.join("booner").join("config.yaml")));

        candidates.into_iter().find(|path| path.exists())
    }

    /// Load from an explicit path (which must exist), else discovery, else
    /// defaults. Environment overrides are applied in every case.
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut config = if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            Self::from_yaml_file(&path)?
        } else if let Some(path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", path);
            Self::from_yaml_file(&path)?
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let spec = &mut self.spec;

        if let Some(url) = lookup("OLLAMA_BASE_URL") {
            tracing::info!("Environment override: OLLAMA_BASE_URL={}", url);
            spec.gateway.endpoint = url;
        }
        if let Some(model) = lookup("OLLAMA_LLM_MODEL") {
            spec.gateway.llm_model = model;
        }
        if let Some(model) = lookup("OLLAMA_EMBED_MODEL") {
            spec.gateway.embed_model = model;
        }

        if let Some(url) = lookup("OPNSENSE_API_URL") {
            tracing::info!("Environment override: OPNSENSE_API_URL={}", url);
            let backend = spec.backends.opnsense.get_or_insert_with(|| OpnsenseBackend {
                url: String::new(),
                api_key: "env:OPNSENSE_API_KEY".to_string(),
                api_secret: "env:OPNSENSE_API_SECRET".to_string(),
            });
            backend.url = url;
        }
        if let Some(backend) = spec.backends.opnsense.as_mut() {
            if let Some(key) = lookup("OPNSENSE_API_KEY") {
                backend.api_key = key;
            }
            if let Some(secret) = lookup("OPNSENSE_API_SECRET") {
                backend.api_secret = secret;
            }
        }

        if let Some(url) = lookup("MCP_URL") {
            tracing::info!("Environment override: MCP_URL={}", url);
            spec.coordination.mode = CoordinationMode::Http;
            spec.coordination.url = Some(url);
        }
        if let Some(key) = lookup("MCP_API_KEY") {
            spec.coordination.api_key = Some(key);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!("Invalid apiVersion: '{}'. Must be '{}'", self.api_version, API_VERSION);
        }
        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }
        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let spec = &self.spec;
        if spec.node.id.is_empty() {
            anyhow::bail!("spec.node.id cannot be empty");
        }
        if spec.gateway.endpoint.is_empty() {
            anyhow::bail!("spec.gateway.endpoint cannot be empty");
        }
        if spec.gateway.llm_model.is_empty() || spec.gateway.embed_model.is_empty() {
            anyhow::bail!("spec.gateway models cannot be empty");
        }
        if spec.interpreter.top_k == 0 {
            anyhow::bail!("spec.interpreter.top_k must be at least 1");
        }
        if !(0.0..=1.0).contains(&spec.interpreter.min_confidence) {
            anyhow::bail!("spec.interpreter.min_confidence must be within [0, 1]");
        }
        if spec.context.max_records == 0 {
            anyhow::bail!("spec.context.max_records must be at least 1");
        }
        if spec.executor.max_attempts == 0 {
            anyhow::bail!("spec.executor.max_attempts must be at least 1");
        }
        if spec.coordination.retries == 0 {
            anyhow::bail!("spec.coordination.retries must be at least 1");
        }
        if spec.dispatch.failure_threshold == 0 {
            anyhow::bail!("spec.dispatch.failure_threshold must be at least 1");
        }

        let coordination = &spec.coordination;
        if coordination.lock_ttl < MIN_LOCK_TTL {
            anyhow::bail!(
                "spec.coordination.lock_ttl ({:?}) is too short to renew before expiry (renewal every {:?})",
                coordination.lock_ttl,
                booner_swarm::renewal_interval(coordination.lock_ttl)
            );
        }
        if coordination.request_timeout >= coordination.lock_ttl {
            anyhow::bail!("spec.coordination.request_timeout must be shorter than lock_ttl");
        }
        if coordination.mode == CoordinationMode::Http && coordination.url.as_deref().unwrap_or("").is_empty() {
            anyhow::bail!("spec.coordination.url is required in http mode");
        }

        if let Some(opnsense) = &spec.backends.opnsense {
            if opnsense.url.is_empty() {
                anyhow::bail!("spec.backends.opnsense.url cannot be empty");
            }
        }
        if let Some(deployment) = &spec.backends.deployment {
            if deployment.url.is_empty() {
                anyhow::bail!("spec.backends.deployment.url cannot be empty");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = OrchestratorConfigManifest::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert!(!manifest.metadata.name.is_empty());
        assert_eq!(manifest.spec.interpreter.top_k, 5);
        assert_eq!(manifest.spec.dispatch.failure_threshold, 3);
        assert_eq!(manifest.spec.coordination.mode, CoordinationMode::InMemory);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_parse_humantime_durations() {
        let yaml = r#"
apiVersion: booner.dev/v1
kind: OrchestratorConfig
metadata:
  name: lab
spec:
  node:
    id: lab-1
  gateway:
    endpoint: http://ollama:11434
    timeout: 45s
  coordination:
    mode: http
    url: http://mcp:8080
    api_key: env:MCP_API_KEY
    lock_ttl: 1m
    lock_wait: 2s
  dispatch:
    tie_break: registration_order
    unhealthy_after: 5m
  context:
    max_age: 7d
"#;
        let manifest = OrchestratorConfigManifest::from_yaml_str(yaml).unwrap();
        let spec = &manifest.spec;
        assert_eq!(spec.gateway.timeout, Duration::from_secs(45));
        assert_eq!(spec.gateway.llm_model, "mixtral:latest");
        assert_eq!(spec.coordination.lock_ttl, Duration::from_secs(60));
        assert_eq!(spec.coordination.lock_wait, Duration::from_secs(2));
        assert_eq!(spec.coordination.api_key.as_deref(), Some("env:MCP_API_KEY"));
        assert_eq!(spec.dispatch.tie_break, TieBreak::RegistrationOrder);
        assert_eq!(spec.dispatch.unhealthy_after, Duration::from_secs(300));
        assert_eq!(spec.context.max_age, Some(Duration::from_secs(7 * 86_400)));
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut manifest = OrchestratorConfigManifest::default();
        manifest.spec.backends.deployment = Some(DeploymentBackend {
            url: "http://deploy:9000".to_string(),
            api_key: None,
            host: Some("alpha".to_string()),
        });

        let yaml = manifest.to_yaml().unwrap();
        let parsed = OrchestratorConfigManifest::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed.spec.node.id, manifest.spec.node.id);
        assert_eq!(parsed.spec.coordination.lock_ttl, manifest.spec.coordination.lock_ttl);
        assert_eq!(
            parsed.spec.backends.deployment.map(|d| d.url).as_deref(),
            Some("http://deploy:9000")
        );
    }

    #[test]
    fn test_validation() {
        let mut manifest = OrchestratorConfigManifest::default();

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.spec.interpreter.top_k = 0;
        assert!(manifest.validate().is_err());
        manifest.spec.interpreter.top_k = 5;

        manifest.spec.executor.max_attempts = 0;
        assert!(manifest.validate().is_err());
        manifest.spec.executor.max_attempts = 3;

        manifest.spec.coordination.lock_ttl = Duration::from_millis(2);
        assert!(manifest.validate().is_err());
        manifest.spec.coordination.lock_ttl = Duration::from_secs(30);

        manifest.spec.coordination.mode = CoordinationMode::Http;
        assert!(manifest.validate().is_err());
        manifest.spec.coordination.url = Some("http://mcp:8080".to_string());
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OLLAMA_BASE_URL", "http://gpu-box:11434"),
            ("OLLAMA_LLM_MODEL", "llama3"),
            ("OPNSENSE_API_URL", "https://fw.lab/api"),
            ("OPNSENSE_API_KEY", "key"),
            ("OPNSENSE_API_SECRET", "secret"),
            ("MCP_URL", "http://mcp:8080"),
        ]);
        let mut manifest = OrchestratorConfigManifest::default();
        manifest.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));

        let spec = &manifest.spec;
        assert_eq!(spec.gateway.endpoint, "http://gpu-box:11434");
        assert_eq!(spec.gateway.llm_model, "llama3");
        assert_eq!(spec.gateway.embed_model, "mxbai-embed-large");
        let opnsense = spec.backends.opnsense.as_ref().unwrap();
        assert_eq!(opnsense.url, "https://fw.lab/api");
        assert_eq!(opnsense.api_key, "key");
        assert_eq!(opnsense.api_secret, "secret");
        assert_eq!(spec.coordination.mode, CoordinationMode::Http);
        assert_eq!(spec.coordination.url.as_deref(), Some("http://mcp:8080"));
    }

    #[test]
    fn test_discovery_order() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().join("cwd");
        let config_dir = dir.path().join("xdg");
        std::fs::create_dir_all(&cwd).unwrap();
        std::fs::create_dir_all(config_dir.join("booner")).unwrap();

        assert_eq!(
            OrchestratorConfigManifest::discover_in(None, &cwd, Some(config_dir.clone())),
            None
        );

        let user = config_dir.join("booner").join("config.yaml");
        std::fs::write(&user, "").unwrap();
        assert_eq!(
            OrchestratorConfigManifest::discover_in(None, &cwd, Some(config_dir.clone())),
            Some(user.clone())
        );

        let local = cwd.join(LOCAL_CONFIG_FILE);
        std::fs::write(&local, "").unwrap();
        assert_eq!(
            OrchestratorConfigManifest::discover_in(None, &cwd, Some(config_dir.clone())),
            Some(local.clone())
        );

        let explicit = dir.path().join("explicit.yaml");
        std::fs::write(&explicit, "").unwrap();
        assert_eq!(
            OrchestratorConfigManifest::discover_in(Some(explicit.clone()), &cwd, Some(config_dir)),
            Some(explicit)
        );
    }

    #[test]
    fn test_resolve_secret_plain_value() {
        assert_eq!(resolve_secret("hunter2").unwrap(), "hunter2");
        assert!(resolve_secret("env:BOONER_TEST_SURELY_UNSET_VARIABLE").is_err());
    }
}
