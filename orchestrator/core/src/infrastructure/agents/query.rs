// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// Query Agent
//
// Answers informational requests from the context store, phrased by the LLM
// gateway. Mutates nothing, so it never takes a lock.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use booner_cortex::ContextStore;
use booner_swarm::ResourceKey;

use crate::domain::action::{ActionRequest, ExecutionError};
use crate::domain::agent::{Agent, AgentOutput};
use crate::domain::capability::{AgentCapability, TargetHost};
use crate::domain::intent::{ActionKind, Intent};
use crate::domain::llm::{GenerationOptions, LLMError, LLMProvider};

pub const CAPABILITY_ID: &str = "query";

pub struct QueryAgent {
    llm: Arc<dyn LLMProvider>,
    context: Arc<ContextStore>,
    top_k: usize,
    options: GenerationOptions,
}

impl QueryAgent {
    pub fn new(llm: Arc<dyn LLMProvider>, context: Arc<ContextStore>, top_k: usize) -> Self {
        Self {
            llm,
            context,
            top_k,
            options: GenerationOptions {
                temperature: Some(0.3),
                ..Default::default()
            },
        }
    }

    fn prompt(question: &str, notes: &[String]) -> String {
        let mut prompt = String::from(
            "You answer questions about a home lab managed by an infrastructure agent.\n\
             Use only the notes below. If they do not contain the answer, say so.\n\nNotes:\n",
        );
        if notes.is_empty() {
            prompt.push_str("(none)\n");
        }
        for note in notes {
            prompt.push_str("- ");
            prompt.push_str(note);
            prompt.push('\n');
        }
        prompt.push_str("\nQuestion: ");
        prompt.push_str(question);
        prompt.push_str("\nAnswer:");
        prompt
    }
}

fn llm_failure(e: LLMError) -> ExecutionError {
    if e.is_transient() {
        ExecutionError::retryable(e.to_string())
    } else {
        ExecutionError::fatal(e.to_string())
    }
}

#[async_trait]
impl Agent for QueryAgent {
    fn capability(&self) -> AgentCapability {
        AgentCapability::new(CAPABILITY_ID, [ActionKind::Query], TargetHost::new("local"))
    }

    fn resource_key(&self, _intent: &Intent) -> Option<ResourceKey> {
        None
    }

    fn build_payload(&self, intent: &Intent) -> Result<Value, ExecutionError> {
        let question = intent.param_str("question").unwrap_or_else(|| intent.raw_text.clone());
        Ok(json!({ "question": question }))
    }

    async fn execute(&self, request: &ActionRequest) -> Result<AgentOutput, ExecutionError> {
        let question = request
            .payload
            .get("question")
            .and_then(Value::as_str)
            .ok_or_else(|| ExecutionError::fatal("query payload has no question"))?;

        let hits = self
            .context
            .query(question, self.top_k)
            .await
            .map_err(|e| ExecutionError::retryable(format!("context lookup failed: {}", e)))?;
        let notes: Vec<String> = hits.iter().map(|h| h.record.source_text.clone()).collect();

        let response = self
            .llm
            .generate(&Self::prompt(question, &notes), &self.options)
            .await
            .map_err(llm_failure)?;

        Ok(AgentOutput::new(json!({
            "answer": response.text.trim(),
            "sources": notes,
        })))
    }

    async fn rollback(&self, _request: &ActionRequest, _external_reference: &str) -> Result<(), ExecutionError> {
        Ok(())
    }

    async fn probe(&self) -> bool {
        self.llm.health_check().await.is_ok()
    }
}
