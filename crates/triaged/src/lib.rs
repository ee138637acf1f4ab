//! triaged - support case triage daemon.
//!
//! Receives ticketing webhook events, repairs and validates the payloads,
//! classifies cases with an LLM orchestrator (inline or through an async
//! task queue), writes results back to the ticketing system, and sweeps
//! for stale cases on a per-group policy.

pub mod auth;
pub mod classify;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod intent;
pub mod payload;
pub mod queue;
pub mod resolution;
pub mod routes;
pub mod server;
pub mod sweeper;
pub mod ticketing;
pub mod validate;
pub mod worker;
