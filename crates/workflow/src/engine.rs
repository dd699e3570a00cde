//! # Pipeline Engine
//!
//! Loads every scene's pipeline from the pipeline document at startup and,
//! per request, runs the scene's nodes one after another against a shared
//! `RunContext`.
//!
//! ## Guarantees
//! - Every declared pipeline is built eagerly; one bad node fails startup
//! - Node i+1 never starts before node i finished
//! - The first node error stops the run and is returned unchanged
//! - An unknown scene is reported as `RunError::PipelineNotFound`

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::builder::build_node;
use crate::config::{GlobalConfig, PipelineConfig};
use crate::context::RunContext;
use crate::error::{BuildError, BuildResult, RunError};
use crate::node::Node;
use crate::registry::Registry;

/// A built pipeline for one scene.
pub struct Pipeline {
    description: String,
    timeout_hint: Option<Duration>,
    nodes: Vec<Arc<dyn Node>>,
}

impl Pipeline {
    fn build(scene: &str, config: &PipelineConfig, registry: &Registry) -> BuildResult<Self> {
        let nodes = config
            .nodes
            .iter()
            .map(|spec| {
                build_node(registry, spec).map_err(|source| BuildError::Node {
                    scene: scene.to_string(),
                    node: spec.name.clone(),
                    source: Box::new(source),
                })
            })
            .collect::<BuildResult<Vec<_>>>()?;

        Ok(Self {
            description: config.description.clone(),
            timeout_hint: (config.timeout_ms > 0).then(|| Duration::from_millis(config.timeout_ms)),
            nodes,
        })
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The document's `timeout_ms`, if positive. Not enforced by the engine.
    pub fn timeout_hint(&self) -> Option<Duration> {
        self.timeout_hint
    }

    pub fn nodes(&self) -> &[Arc<dyn Node>] {
        &self.nodes
    }
}

/// Scene name → built pipeline.
pub struct Engine {
    pipelines: HashMap<String, Pipeline>,
}

impl Engine {
    /// Read the pipeline document at `path` and build every pipeline.
    pub fn from_path(path: impl AsRef<Path>, registry: &Registry) -> BuildResult<Self> {
        let path = path.as_ref();
        info!("Loading pipeline config from {}", path.display());
        let config = GlobalConfig::load(path)?;
        Self::from_config(&config, registry)
    }

    /// Build every pipeline declared in `config`.
    pub fn from_config(config: &GlobalConfig, registry: &Registry) -> BuildResult<Self> {
        let mut pipelines = HashMap::with_capacity(config.pipelines.len());
        for (scene, pipeline_config) in &config.pipelines {
            let pipeline = Pipeline::build(scene, pipeline_config, registry)?;
            debug!("Built pipeline '{}' with {} nodes", scene, pipeline.nodes.len());
            pipelines.insert(scene.clone(), pipeline);
        }
        info!("Engine ready with {} pipelines", pipelines.len());
        Ok(Self { pipelines })
    }

    /// Scene names, sorted.
    pub fn scenes(&self) -> Vec<&str> {
        let mut scenes: Vec<&str> = self.pipelines.keys().map(String::as_str).collect();
        scenes.sort_unstable();
        scenes
    }

    pub fn pipeline(&self, scene: &str) -> Option<&Pipeline> {
        self.pipelines.get(scene)
    }

    /// Run the pipeline registered for `scene` against `ctx`.
    ///
    /// On success the caller reads the final candidates from `ctx`. On a
    /// node failure the error is that node's error, and the trace log in
    /// `ctx` shows which node failed.
    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id()))]
    pub async fn run(&self, ctx: Arc<RunContext>, scene: &str) -> Result<(), RunError> {
        let pipeline = self
            .pipelines
            .get(scene)
            .ok_or_else(|| RunError::PipelineNotFound(scene.to_string()))?;

        let start_time = Instant::now();
        ctx.add_log(format!("Starting pipeline execution for scene: {}", scene));

        for node in &pipeline.nodes {
            ctx.add_log(format!("Executing node: {} ({})", node.name(), node.node_type()));
            debug!("Executing node {} ({})", node.name(), node.node_type());

            if let Err(err) = node.execute(ctx.clone()).await {
                warn!("Node {} failed in scene {}: {:#}", node.name(), scene, err);
                ctx.add_log(format!("Node execution failed: {} ({}): {:#}", node.name(), node.node_type(), err));
                return Err(RunError::Node(err));
            }

            ctx.add_log(format!("Node completed: {} ({})", node.name(), node.node_type()));
        }

        ctx.add_log("Pipeline execution completed");
        info!(
            "Pipeline for scene {} completed in {:.2?} with {} candidates",
            scene,
            start_time.elapsed(),
            ctx.candidates().len()
        );
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("scenes", &self.scenes())
            .finish()
    }
}
