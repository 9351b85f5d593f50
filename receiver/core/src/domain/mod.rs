// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer: value types, collaborator contracts and the error taxonomy.
//! No I/O happens here.

pub mod identity;
pub mod registration;
pub mod inventory;
pub mod compression;
pub mod error;
pub mod receiver_config;
