// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the agent receiver CLI

pub mod config;
pub mod registrations;
pub mod status;

pub use self::config::ConfigCommand;
pub use self::registrations::RegistrationsCommand;
