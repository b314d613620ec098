// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod record;
pub mod embedder;
pub mod errors;

pub use record::*;
pub use embedder::*;
pub use errors::*;
