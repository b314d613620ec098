// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Intent Interpreter
//!
//! Turns a natural-language request plus retrieved context into a structured
//! [`Intent`].
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Retrieval-augmented prompt construction, bounded gateway
//!   calls, and the total mapping from model output to an action kind
//!
//! The raw request is recorded in the context store before the gateway is
//! called, so it is remembered whether or not the request is ever dispatched.
//! Anything the model says that does not map onto a known action kind becomes
//! [`ActionKind::Unknown`] with zero confidence; it is never defaulted to an
//! action.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use booner_cortex::{ContextRecord, ContextStore, ScoredRecord};
use booner_swarm::{AgentSession, RetryPolicy};

use crate::domain::intent::{ActionKind, Intent, IntentId, InterpretationError, Parameters};
use crate::domain::llm::{GenerationOptions, LLMError, LLMProvider};

/// Confidence assumed when the model names a kind but not a confidence.
pub const DEFAULT_CONFIDENCE: f32 = 0.5;

/// Tag on context records that hold raw requests.
pub const REQUEST_TAG: &str = "request";

#[derive(Debug, Clone)]
pub struct InterpreterSettings {
    pub top_k: usize,
    pub generation: GenerationOptions,
    /// Bound on a single gateway call.
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for InterpreterSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            generation: GenerationOptions {
                json_mode: true,
                ..GenerationOptions::default()
            },
            call_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

pub struct IntentInterpreter {
    llm: Arc<dyn LLMProvider>,
    context: Arc<ContextStore>,
    settings: InterpreterSettings,
}

impl IntentInterpreter {
    pub fn new(llm: Arc<dyn LLMProvider>, context: Arc<ContextStore>, settings: InterpreterSettings) -> Self {
        Self { llm, context, settings }
    }

    pub fn settings(&self) -> &InterpreterSettings {
        &self.settings
    }

    /// Gateway used for interpretation.
    pub fn llm(&self) -> &Arc<dyn LLMProvider> {
        &self.llm
    }

    /// Interpret `raw_text` against the shared session state.
    pub async fn interpret(
        &self,
        raw_text: &str,
        session: Option<&AgentSession>,
    ) -> Result<Intent, InterpretationError> {
        let raw_text = raw_text.trim();
        let intent_id = IntentId::new();

        if raw_text.is_empty() {
            // Nothing to embed; a zero vector never ranks above a real match.
            let zero = vec![0.0; self.context.config().dimensions.unwrap_or(0)];
            self.record_request(intent_id, zero, raw_text);
            return Ok(Intent::with_id(intent_id, raw_text, ActionKind::Unknown, Parameters::new(), 0.0));
        }

        let embedding = self
            .context
            .embed(raw_text)
            .await
            .map_err(|e| InterpretationError::GatewayUnavailable(format!("embedding failed: {}", e)))?;

        let related = self.context.nearest(&embedding, self.settings.top_k);
        debug!(intent_id = %intent_id, related = related.len(), "Retrieved context");

        self.record_request(intent_id, embedding, raw_text);

        let prompt = build_prompt(raw_text, &related, session);
        let text = self.generate(&prompt).await?;
        let parsed = parse_response(&text)?;

        let intent = Intent::with_id(intent_id, raw_text, parsed.kind, parsed.parameters, parsed.confidence);
        info!(
            intent_id = %intent.id,
            action_kind = %intent.resolved_action_kind,
            confidence = intent.confidence,
            "Interpreted request"
        );
        Ok(intent)
    }

    fn record_request(&self, intent_id: IntentId, embedding: Vec<f32>, raw_text: &str) {
        let record = ContextRecord::new(embedding, raw_text)
            .with_intent(intent_id.0)
            .with_tags([REQUEST_TAG]);
        if let Err(e) = self.context.insert(record) {
            warn!(intent_id = %intent_id, error = %e, "Failed to record request in context store");
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, InterpretationError> {
        let retry = self.settings.retry;
        let mut last_error = String::new();

        for attempt in 1..=retry.attempts() {
            let call = self.llm.generate(prompt, &self.settings.generation);
            let error = match tokio::time::timeout(self.settings.call_timeout, call).await {
                Ok(Ok(response)) => return Ok(response.text),
                Ok(Err(e)) if e.is_transient() => e,
                Ok(Err(e)) => return Err(InterpretationError::GatewayUnavailable(e.to_string())),
                Err(_) => LLMError::Network(format!("no response within {:?}", self.settings.call_timeout)),
            };

            warn!(attempt, error = %error, "Gateway call failed");
            last_error = error.to_string();
            if attempt < retry.attempts() {
                tokio::time::sleep(retry.delay_after(attempt)).await;
            }
        }

        Err(InterpretationError::GatewayUnavailable(format!(
            "giving up after {} attempts: {}",
            retry.attempts(),
            last_error
        )))
    }
}

fn build_prompt(raw_text: &str, related: &[ScoredRecord], session: Option<&AgentSession>) -> String {
    let kinds = ActionKind::ACTIONABLE
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let mut prompt = format!(
        "You are an infrastructure operations assistant for a home lab.\n\
         Classify the user's request as exactly one action and extract its parameters.\n\
         Allowed actions: {kinds}. If the request fits none of them, use \"unknown\".\n\
         Answer with a single JSON object and nothing else:\n\
         {{\"action\": \"<action>\", \"parameters\": {{...}}, \"confidence\": <0.0-1.0>}}\n\
         Useful parameters: host, game_type, server_name, port, app_type, name, image, \
         action_type (create/read/update/delete), resource_type, interface, vlan.\n"
    );

    if !related.is_empty() {
        prompt.push_str("\nRelated earlier requests and results:\n");
        for hit in related {
            prompt.push_str(&format!("- ({:.2}) {}\n", hit.similarity, hit.record.source_text));
        }
    }

    if let Some(session) = session {
        if !session.state.is_null() {
            prompt.push_str(&format!("\nShared session state (epoch {}):\n{}\n", session.epoch, session.state));
        }
    }

    prompt.push_str(&format!("\nUser request: {}\n", raw_text));
    prompt
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub kind: ActionKind,
    pub parameters: Parameters,
    pub confidence: f32,
}

/// Decode a model answer.
///
/// Tolerates prose or code fences around the JSON object. A decodable object
/// whose action label is missing or unmapped yields `Unknown`; only an answer
/// without any JSON object is `MalformedResponse`.
pub fn parse_response(text: &str) -> Result<ParsedResponse, InterpretationError> {
    let object = extract_object(text)
        .ok_or_else(|| InterpretationError::MalformedResponse(truncate(text, 200)))?;

    let label = ["action", "kind", "action_kind"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .unwrap_or("");
    let kind = ActionKind::from_label(label);

    let parameters = ["parameters", "params"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_object).cloned())
        .unwrap_or_default();

    let confidence = match object.get("confidence") {
        Some(Value::Number(n)) => n.as_f64().map(|c| c as f32),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .unwrap_or(DEFAULT_CONFIDENCE);

    if kind == ActionKind::Unknown {
        debug!(label, "Model output does not map to a known action kind");
    }

    Ok(ParsedResponse {
        kind,
        parameters,
        confidence: if kind == ActionKind::Unknown { 0.0 } else { confidence },
    })
}

fn extract_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text.trim()) {
        return Some(map);
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
