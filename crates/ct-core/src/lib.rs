//! Cloudtally Core Library
//!
//! This library provides the core functionality for the multi-cloud compute
//! inventory:
//! - Collectors and the provider CLI runner
//! - The per-provider scan engine with failure isolation
//! - The cross-provider orchestrator and handoff protocol
//! - Aggregation into a combined summary
//! - Exporters for console, JSON, and CSV output
//!
//! The binary entry point is in `main.rs`.

pub mod aggregate;
pub mod collect;
pub mod exit_codes;
pub mod export;
pub mod logging;
pub mod orchestrate;
pub mod scan;
