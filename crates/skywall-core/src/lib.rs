//! # Skywall Core
//!
//! Shared runtime for the Skywall security agent.
//!
//! This crate provides the building blocks the agent components have in
//! common: the error type, an expiring cache, filesystem helpers with atomic
//! replacement semantics, agent identity and environment detection, the
//! orchestration status file, and structured security event reporting.
//!
//! The components themselves (messaging client, policy compiler, keyword
//! engine) live in their own crates and receive their dependencies through
//! constructors; nothing in here is a process-wide singleton.

pub mod agent_details;
pub mod cache;
pub mod env_details;
pub mod error;
pub mod events;
pub mod fs;
pub mod orchestration_status;

pub use agent_details::AgentDetails;
pub use cache::ExpiringCache;
pub use env_details::{DeploymentType, EnvDetails};
pub use error::{Error, Result};
pub use events::SecurityEvent;
pub use orchestration_status::OrchestrationStatus;
