//! # tether-common
//!
//! Shared types, configuration, error handling, and utilities used across all Tether crates.
//! No business logic lives here, only primitives and the wire contract.

pub mod auth;
pub mod config;
pub mod envelope;
pub mod error;
pub mod ids;
pub mod models;
pub mod validation;
