//! Pipeline engine for scene based recommendations.
//!
//! This crate provides:
//! - `RunContext`: the concurrency-safe state shared by one pipeline run
//! - `Node` trait and the `Registry` of node constructors
//! - `ParallelNode`: concurrent fan-out with best-effort join
//! - `Engine`: loads one pipeline per scene and runs it sequentially
//!
//! ## Architecture
//! A request flows through the engine in stages:
//! 1. The host builds a `RunContext` for the caller (favorites, domain, deadline)
//! 2. `Engine::run` looks up the scene's node list
//! 3. Each node mutates the shared candidate set in order
//! 4. The host reads the final candidates and the trace log back
//!
//! ## Example Usage
//! ```ignore
//! use workflow::{Engine, Registry, RunContext, User};
//!
//! let mut registry = Registry::new();
//! nodes::register_default_nodes(&mut registry, deps);
//! let engine = Engine::from_path("configs/pipelines.json", &registry)?;
//!
//! let ctx = Arc::new(RunContext::new(user).with_config("domain", "music"));
//! engine.run(ctx.clone(), "music").await?;
//! let items = ctx.candidates();
//! ```

pub mod builder;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod node;
pub mod parallel;
pub mod registry;
pub mod types;

// Re-export main types
pub use builder::build_node;
pub use config::{GlobalConfig, NodeSpec, PipelineConfig, PARALLEL_NODE_TYPE};
pub use context::RunContext;
pub use engine::{Engine, Pipeline};
pub use error::{BuildError, BuildResult, FanOutError, RunError};
pub use node::Node;
pub use parallel::ParallelNode;
pub use registry::{NodeConstructor, Registry};
pub use types::{Item, User};
