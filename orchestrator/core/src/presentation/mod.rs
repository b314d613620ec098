// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`booner-core`)
//!
//! HTTP surface that translates external requests into application service
//! calls. All real work is delegated to `crate::application`.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP (Axum) | Request submission, task polling, capabilities, webhooks |

pub mod api;
