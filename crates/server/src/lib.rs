//! Server crate for the scene recommendation engine.
//!
//! This crate contains the caller-facing service that authenticates a
//! request, runs the scene's pipeline and records what was returned, plus
//! the configuration files it is wired from.
//!
//! ## Main Components
//!
//! - **RecommendService**: synchronous and task-based recommendation entry points
//! - **StaticUserProvider**: token → user lookup from `users.yaml`
//! - **TaskManager**: status and outcome of background requests
//! - **ServerConfig / LlmGlobalConfig**: `server.yaml` and `llm.yaml`

pub mod config;
pub mod error;
pub mod service;
pub mod task;
pub mod user_provider;

pub use config::{ConfigOverrides, LlmCredentials, LlmGlobalConfig, ServerConfig};
pub use error::{Result, ServiceError};
pub use service::{RecommendRequest, RecommendService, Recommendation};
pub use task::{Task, TaskManager, TaskStatus};
pub use user_provider::{StaticUserProvider, UserProvider};
