//! # Recommendation Service
//!
//! The caller-facing entry point. It turns a (token, scene, favorites)
//! request into one pipeline run:
//! 1. Authenticate the token against the user provider
//! 2. Build a `RunContext` for the user, scoped to the scene as its domain
//! 3. Run the scene's pipeline with a deadline
//! 4. Record the returned items in the history log in the background;
//!    `flush_history` waits for those writes before a host exits
//! 5. Return the items and the run's trace
//!
//! Requests can also be submitted as tasks that run in the background and
//! are polled by id.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use history::{FileHistoryStore, HistoryStore};
use nodes::{NodeDeps, register_default_nodes};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use workflow::{Engine, Item, Pipeline, Registry, RunContext, RunError, User};

use crate::config::{DEFAULT_REQUEST_TIMEOUT_SECS, LlmGlobalConfig, ServerConfig};
use crate::error::{Result, ServiceError};
use crate::task::{Task, TaskManager, TaskStatus};
use crate::user_provider::{StaticUserProvider, UserProvider};

/// A recommendation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendRequest {
    pub token: String,
    pub scene: String,

    /// Replaces the stored user's favorites for this request only
    #[serde(default)]
    pub favorites: Option<Vec<String>>,
}

impl RecommendRequest {
    pub fn new(token: impl Into<String>, scene: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            scene: scene.into(),
            favorites: None,
        }
    }

    /// Set request-scoped favorites (builder pattern).
    pub fn with_favorites<I, S>(mut self, favorites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.favorites = Some(favorites.into_iter().map(Into::into).collect());
        self
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub scene: String,
    pub items: Vec<Item>,
    pub trace: Vec<String>,
}

/// Cheap to clone; every component is shared.
#[derive(Clone)]
pub struct RecommendService {
    engine: Arc<Engine>,
    users: Arc<dyn UserProvider>,
    history: Arc<dyn HistoryStore>,
    tasks: Arc<TaskManager>,

    /// Background history writes not yet awaited
    history_writes: Arc<Mutex<JoinSet<()>>>,
    request_timeout: Duration,
}

impl RecommendService {
    /// Create a service over already-built components.
    ///
    /// # Arguments
    /// * `engine` - Engine with every scene's pipeline
    /// * `users` - Token and id lookup
    /// * `history` - Where returned items are recorded
    pub fn new(
        engine: Arc<Engine>,
        users: Arc<dyn UserProvider>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            engine,
            users,
            history,
            tasks: Arc::new(TaskManager::new()),
            history_writes: Arc::new(Mutex::new(JoinSet::new())),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Set the deadline used when a pipeline declares no `timeout_ms`.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Wire every component from the files named in `config`.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let start_time = Instant::now();

        let users = StaticUserProvider::load(&config.paths.users)?;
        let history: Arc<dyn HistoryStore> = Arc::new(FileHistoryStore::open(&config.paths.history)?);
        let llm_clients = LlmGlobalConfig::load(&config.paths.llm)?.build_clients()?;

        let deps = NodeDeps {
            history: history.clone(),
            llm_clients,
        };
        let mut registry = Registry::new();
        register_default_nodes(&mut registry, deps);
        let engine = Engine::from_path(&config.paths.pipelines, &registry)?;

        info!("Service initialized in {:.2?}", start_time.elapsed());
        Ok(Self::new(Arc::new(engine), Arc::new(users), history)
            .with_request_timeout(config.request_timeout()))
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    /// Resolve a bearer token to its user.
    pub fn authenticate(&self, token: &str) -> Result<User> {
        self.users
            .get_user_by_token(token)
            .ok_or(ServiceError::Unauthorized)
    }

    /// Run the request's scene and wait for the result.
    #[instrument(skip(self, request), fields(scene = %request.scene))]
    pub async fn recommend(&self, request: RecommendRequest) -> Result<Recommendation> {
        let user = self.authenticate(&request.token)?;
        self.run_for_user(user, &request.scene, request.favorites).await
    }

    /// Start the request in the background and return its task right away.
    ///
    /// The token is checked before the task is created.
    pub fn submit(&self, request: RecommendRequest) -> Result<Task> {
        let user = self.authenticate(&request.token)?;
        let task = self.tasks.create();
        info!("Submitted task {} for scene {}", task.id, request.scene);

        let service = self.clone();
        let task_id = task.id.clone();
        tokio::spawn(async move {
            if let Err(e) = service.tasks.update_status(&task_id, TaskStatus::Processing) {
                warn!("Task {} vanished before start: {}", task_id, e);
                return;
            }

            let outcome = service
                .run_for_user(user, &request.scene, request.favorites)
                .await;
            let stored = match outcome {
                Ok(recommendation) => service.tasks.set_result(&task_id, recommendation.items),
                Err(e) => service.tasks.set_error(&task_id, e.to_string()),
            };
            if let Err(e) = stored {
                warn!("Failed to store outcome of task {}: {}", task_id, e);
            }
        });

        Ok(task)
    }

    pub fn task(&self, id: &str) -> Result<Task> {
        self.tasks.get(id)
    }

    async fn run_for_user(
        &self,
        mut user: User,
        scene: &str,
        favorites: Option<Vec<String>>,
    ) -> Result<Recommendation> {
        if let Some(favorites) = favorites {
            user.favorites = favorites;
        }
        let user_id = user.id.clone();

        let timeout = self
            .engine
            .pipeline(scene)
            .and_then(Pipeline::timeout_hint)
            .unwrap_or(self.request_timeout);
        let ctx = Arc::new(
            RunContext::new(user)
                .with_config("domain", scene)
                .with_timeout(timeout),
        );

        match self.engine.run(ctx.clone(), scene).await {
            Ok(()) => {}
            Err(RunError::PipelineNotFound(_)) => {
                return Err(ServiceError::SceneNotSupported(scene.to_string()));
            }
            Err(err) => {
                warn!("Recommendation for user {} in scene {} failed: {:#}", user_id, scene, err);
                return Err(ServiceError::RecommendationFailed {
                    message: format!("{:#}", err),
                    trace: ctx.trace(),
                });
            }
        }

        let items = ctx.candidates();
        self.record_history(&user_id, scene, &items);

        debug!("Returning {} items to user {}", items.len(), user_id);
        Ok(Recommendation {
            scene: scene.to_string(),
            items,
            trace: ctx.trace(),
        })
    }

    /// Fire-and-forget write of the returned item names.
    fn record_history(&self, user_id: &str, scene: &str, items: &[Item]) {
        let names: Vec<String> = items.iter().map(|item| item.name.clone()).collect();
        if names.is_empty() {
            return;
        }

        let history = self.history.clone();
        let user_id = user_id.to_string();
        let scene = scene.to_string();

        let mut writes = self.history_writes.lock().unwrap_or_else(PoisonError::into_inner);
        while writes.try_join_next().is_some() {}
        writes.spawn_blocking(move || {
            if let Err(e) = history.record(&user_id, &scene, &names) {
                warn!("Failed to save history for user {}: {}", user_id, e);
            }
        });
    }

    /// Wait until every history write started so far has finished.
    ///
    /// Long-running hosts can ignore this; a one-shot host must call it
    /// before its runtime shuts down or the writes may be lost.
    pub async fn flush_history(&self) {
        let mut writes = std::mem::take(
            &mut *self.history_writes.lock().unwrap_or_else(PoisonError::into_inner),
        );
        debug!("Waiting for {} history writes", writes.len());
        while let Some(result) = writes.join_next().await {
            if let Err(e) = result {
                warn!("History write task failed: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for RecommendService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecommendService")
            .field("engine", &self.engine)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
