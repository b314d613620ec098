// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Gateway adapters. Each one translates between the domain's
// `LLMProvider`/`Embedder` ports and a model server's wire format.

pub mod ollama;

pub use ollama::OllamaAdapter;
