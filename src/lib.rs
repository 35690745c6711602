//! Event-driven media ingestion pipeline.
//!
//! An upload gateway publishes `JOB_CREATED` events; the orchestrator drives
//! each job through a content-dependent graph of worker services coordinated
//! over a pub/sub broker with a request/callback protocol. Workers are
//! independent processes; adding one is a configuration change.

pub mod broker;
pub mod config;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod pipeline;
pub mod worker;
