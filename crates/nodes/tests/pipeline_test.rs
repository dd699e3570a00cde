//! End-to-end runs of the default nodes through the engine.
//!
//! The LLM is replaced by a scripted client so the tests stay offline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use history::{HistoryStore, MemoryHistoryStore, Record};
use llm_client::{ChatClient, LlmClientError, Message};
use nodes::{NodeDeps, register_default_nodes};
use tokio::time::Instant;
use workflow::{Engine, GlobalConfig, Registry, RunContext, User};

struct ScriptedClient {
    reply: &'static str,
    delay: Duration,
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn chat(
        &self,
        _messages: &[Message],
        _deadline: Option<Instant>,
    ) -> Result<String, LlmClientError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.reply.to_string())
    }
}

const PIPELINES: &str = r#"{ "pipelines": {
    "music": {
        "description": "song recommendations",
        "timeout_ms": 5000,
        "nodes": [
            { "name": "recall", "type": "parallel", "nodes": [
                { "name": "llm_fast", "type": "recall_llm", "config": { "llm_config_key": "fast", "count": 3 } },
                { "name": "llm_broken", "type": "recall_llm", "config": { "llm_config_key": "broken" } }
            ] },
            { "name": "no_favorites", "type": "filter_favorites" },
            { "name": "no_repeats", "type": "filter_history", "config": { "lookback_days": 7 } },
            { "name": "top", "type": "rank_simple", "config": { "order": "desc", "limit": 10 } }
        ]
    },
    "mixed": {
        "nodes": [
            { "name": "llm_fast", "type": "recall_llm", "config": { "llm_config_key": "fast" } },
            { "name": "mix", "type": "rank_mix_favorites", "config": { "mix_count": 1 } }
        ]
    }
} }"#;

fn build_engine(store: Arc<dyn HistoryStore>) -> Engine {
    let deps = NodeDeps::new(store)
        .with_llm_client(
            "fast",
            Arc::new(ScriptedClient {
                reply: r#"["Song A", "fav1", "Song B", "Song C"]"#,
                delay: Duration::from_millis(10),
            }),
        )
        .with_llm_client(
            "broken",
            Arc::new(ScriptedClient {
                reply: "I cannot help with that",
                delay: Duration::ZERO,
            }),
        );

    let mut registry = Registry::new();
    register_default_nodes(&mut registry, deps);

    let config = GlobalConfig::from_json(PIPELINES).expect("valid pipelines");
    Engine::from_config(&config, &registry).expect("engine should build")
}

fn music_ctx() -> Arc<RunContext> {
    let user = User::new("u1").with_favorites(["fav1", "fav2"]);
    Arc::new(RunContext::new(user).with_config("domain", "music"))
}

#[tokio::test]
async fn test_music_pipeline_filters_and_ranks() {
    let now = chrono::Utc::now().timestamp();
    let store = Arc::new(MemoryHistoryStore::with_records(vec![
        Record::new("u1", "Song B", "music", now - 60),
        Record::new("u2", "Song C", "music", now - 60),
    ]));
    let engine = build_engine(store);

    let ctx = music_ctx();
    engine.run(ctx.clone(), "music").await.unwrap();

    let names: Vec<String> = ctx.candidates().into_iter().map(|i| i.name).collect();
    assert_eq!(names, vec!["Song A", "Song C"]);

    let trace = ctx.trace();
    assert!(trace.iter().any(|l| l.contains("Node llm_broken failed")));
    assert!(trace.iter().any(|l| l == "LLM Recall (llm_fast) returned 4 items"));
    assert!(trace.iter().any(|l| l == "Favorites filter (no_favorites) removed 1 items, kept 3"));
    assert!(trace.iter().any(|l| l == "History filter (no_repeats) removed 1 items, kept 2"));
    assert_eq!(trace.last().unwrap(), "Pipeline execution completed");
}

#[tokio::test]
async fn test_history_filter_without_domain_fails_run() {
    let engine = build_engine(Arc::new(MemoryHistoryStore::new()));
    let ctx = Arc::new(RunContext::new(User::new("u1").with_favorites(["fav1"])));

    let err = engine.run(ctx.clone(), "music").await.unwrap_err();
    assert!(!err.is_not_found());
    assert!(err.to_string().contains("domain"));
    assert!(ctx.trace().iter().any(|l| l.starts_with("Node execution failed: no_repeats")));
}

#[tokio::test]
async fn test_mix_pipeline_injects_one_favorite() {
    let engine = build_engine(Arc::new(MemoryHistoryStore::new()));
    let ctx = music_ctx();

    engine.run(ctx.clone(), "mixed").await.unwrap();

    let candidates = ctx.candidates();
    assert_eq!(candidates.len(), 5);
    assert_eq!(candidates.iter().filter(|i| i.source == "user_favorite").count(), 1);
}

#[test]
fn test_unknown_llm_key_fails_engine_construction() {
    let config = GlobalConfig::from_json(
        r#"{ "pipelines": { "music": { "nodes": [
            { "name": "llm", "type": "recall_llm", "config": { "llm_config_key": "missing" } }
        ] } } }"#,
    )
    .unwrap();

    let mut registry = Registry::new();
    register_default_nodes(&mut registry, NodeDeps::new(Arc::new(MemoryHistoryStore::new())));
    let err = Engine::from_config(&config, &registry).unwrap_err();
    assert!(err.to_string().contains("missing"));
}
