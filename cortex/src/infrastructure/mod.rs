// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod hash_embedder;

pub use hash_embedder::HashEmbedder;
