//! # LLM Recall
//!
//! Asks a chat model for items similar to the user's favorites.
//!
//! ## Algorithm
//! 1. Render the prompt from the user's favorites and the wanted count
//! 2. Send system + user messages, bounded by the run deadline
//! 3. Clean the reply down to a JSON string array and parse it
//! 4. Record the cleaned names as this node's recall result
//!
//! Models like to wrap answers in markdown fences or add a sentence before
//! the list, so the reply is trimmed to its outermost `[...]` first.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use llm_client::{ChatClient, Message};
use tracing::{debug, info, instrument};
use workflow::{BuildError, BuildResult, Item, Node, NodeSpec, RunContext};

/// Default number of items requested from the model
pub const DEFAULT_RECALL_COUNT: usize = 10;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional music recommendation engine.";

const DEFAULT_PROMPT: &str = "The user likes the following music: {favorites}.
Recommend {count} real, released songs with a similar style.
Never invent song titles; every song must be an existing work by a real artist.
Answer strictly as a JSON list of strings, for example [\"Song A\", \"Song B\"].
Do not include explanations, markdown or any extra text.";

pub struct LlmRecallNode {
    name: String,
    client: Arc<dyn ChatClient>,
    count: usize,
    prompt: String,
    system_prompt: String,
}

impl LlmRecallNode {
    pub fn new(name: impl Into<String>, client: Arc<dyn ChatClient>, count: usize) -> Self {
        Self {
            name: name.into(),
            client,
            count,
            prompt: DEFAULT_PROMPT.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Set the user prompt template. `{favorites}` and `{count}` are substituted.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Build from a node spec, resolving `llm_config_key` against `clients`.
    pub fn from_spec(
        spec: &NodeSpec,
        clients: &HashMap<String, Arc<dyn ChatClient>>,
    ) -> BuildResult<Self> {
        let key = spec.require_str("llm_config_key")?;
        let client = clients.get(key).cloned().ok_or_else(|| BuildError::InvalidConfig {
            node: spec.name.clone(),
            reason: format!("llm config '{}' not found", key),
        })?;

        let count = spec
            .get_usize("count")
            .filter(|c| *c > 0)
            .unwrap_or(DEFAULT_RECALL_COUNT);

        let mut node = Self::new(spec.name.clone(), client, count);
        if let Some(prompt) = spec.get_str("prompt") {
            node = node.with_prompt(prompt);
        }
        if let Some(system_prompt) = spec.get_str("system_prompt") {
            node = node.with_system_prompt(system_prompt);
        }
        Ok(node)
    }

    fn render_prompt(&self, favorites: &[String]) -> String {
        self.prompt
            .replace("{favorites}", &favorites.join(", "))
            .replace("{count}", &self.count.to_string())
    }
}

#[async_trait]
impl Node for LlmRecallNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn node_type(&self) -> &str {
        "recall"
    }

    #[instrument(skip(self, ctx), fields(node = %self.name))]
    async fn execute(&self, ctx: Arc<RunContext>) -> Result<()> {
        let favorites = ctx.favorites();
        if favorites.is_empty() {
            ctx.add_log("User has no favorites, skipping LLM recall");
            return Ok(());
        }

        let messages = [
            Message::system(self.system_prompt.as_str()),
            Message::user(self.render_prompt(&favorites)),
        ];

        debug!("Requesting {} items from the LLM", self.count);
        let content = tokio::select! {
            reply = self.client.chat(&messages, ctx.deadline()) => {
                reply.context("llm chat failed")?
            }
            _ = ctx.cancelled() => {
                bail!("LLM recall ({}) cancelled", self.name);
            }
        };

        let names: Vec<String> = match serde_json::from_str(clean_json(&content)) {
            Ok(names) => names,
            Err(err) => {
                ctx.add_log(format!(
                    "Failed to parse LLM response: {}. Raw content: [{}]",
                    err, content
                ));
                return Err(anyhow!(err).context("failed to parse llm response"));
            }
        };

        let items: Vec<Item> = names
            .iter()
            .map(|name| clean_name(name))
            .filter(|name| !name.is_empty())
            .map(|name| Item::named(name, self.name.as_str()))
            .collect();

        let count = items.len();
        ctx.set_recall_result(self.name.clone(), items);
        ctx.add_log(format!("LLM Recall ({}) returned {} items", self.name, count));
        info!("LLM recall {} returned {} items", self.name, count);
        Ok(())
    }
}

/// Trim a model reply down to its JSON array.
fn clean_json(content: &str) -> &str {
    let mut content = content.trim();
    content = content.strip_prefix("```json").unwrap_or(content);
    content = content.strip_prefix("```").unwrap_or(content);
    content = content.strip_suffix("```").unwrap_or(content);
    content = content.trim();

    match (content.find('['), content.rfind(']')) {
        (Some(start), Some(end)) if end > start => &content[start..=end],
        _ => content,
    }
}

fn clean_name(name: &str) -> String {
    name.replace(['《', '》'], "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use llm_client::LlmClientError;
    use tokio::time::Instant;
    use workflow::User;

    /// Replies with a canned string and remembers the prompts it saw.
    struct CannedClient {
        reply: String,
        seen: Mutex<Vec<Message>>,
    }

    impl CannedClient {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatClient for CannedClient {
        async fn chat(
            &self,
            messages: &[Message],
            _deadline: Option<Instant>,
        ) -> std::result::Result<String, LlmClientError> {
            self.seen.lock().unwrap().extend_from_slice(messages);
            Ok(self.reply.clone())
        }
    }

    /// Never answers.
    struct HangingClient;

    #[async_trait]
    impl ChatClient for HangingClient {
        async fn chat(
            &self,
            _messages: &[Message],
            _deadline: Option<Instant>,
        ) -> std::result::Result<String, LlmClientError> {
            std::future::pending().await
        }
    }

    fn ctx_with_favorites(favorites: &[&str]) -> Arc<RunContext> {
        Arc::new(RunContext::new(User::new("u1").with_favorites(favorites.iter().copied())))
    }

    #[test]
    fn test_clean_json() {
        assert_eq!(clean_json("```json\n[\"a\", \"b\"]\n```"), "[\"a\", \"b\"]");
        assert_eq!(clean_json("Here you go: [\"a\"] enjoy"), "[\"a\"]");
        assert_eq!(clean_json("  no list  "), "no list");
    }

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name(" 《Song A》 "), "Song A");
        assert_eq!(clean_name("《》"), "");
    }

    #[tokio::test]
    async fn test_recall_parses_fenced_reply() {
        let client = CannedClient::new("```json\n[\"《Song A》\", \"Song B\", \"  \"]\n```");
        let node = LlmRecallNode::new("llm_a", client.clone(), 3);
        let ctx = ctx_with_favorites(&["fav1", "fav2"]);

        node.execute(ctx.clone()).await.unwrap();

        let items = ctx.recall_result("llm_a").unwrap();
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Song A", "Song B"]);
        assert!(items.iter().all(|i| i.source == "llm_a" && i.id == i.name && i.score == 0.0));
        assert_eq!(ctx.candidates().len(), 2);
        assert!(ctx.trace().contains(&"LLM Recall (llm_a) returned 2 items".to_string()));

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].role, "system");
        assert!(seen[1].content.contains("fav1, fav2"));
        assert!(seen[1].content.contains("Recommend 3"));
    }

    #[tokio::test]
    async fn test_no_favorites_skips_call() {
        let client = CannedClient::new("[\"x\"]");
        let node = LlmRecallNode::new("llm_a", client.clone(), 3);
        let ctx = ctx_with_favorites(&[]);

        node.execute(ctx.clone()).await.unwrap();

        assert!(client.seen.lock().unwrap().is_empty());
        assert!(ctx.recall_result("llm_a").is_none());
        assert_eq!(ctx.trace(), vec!["User has no favorites, skipping LLM recall"]);
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_error() {
        let node = LlmRecallNode::new("llm_a", CannedClient::new("sorry, I can't"), 3);
        let ctx = ctx_with_favorites(&["fav"]);

        let err = node.execute(ctx.clone()).await.unwrap_err();
        assert!(err.to_string().contains("failed to parse llm response"));
        assert!(ctx.trace().iter().any(|l| l.contains("Raw content: [sorry, I can't]")));
        assert!(ctx.candidates().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_call() {
        let node = LlmRecallNode::new("llm_a", Arc::new(HangingClient), 3);
        let ctx = Arc::new(
            RunContext::new(User::new("u1").with_favorites(["fav"]))
                .with_timeout(Duration::from_millis(50)),
        );

        let err = tokio::time::timeout(Duration::from_secs(2), node.execute(ctx))
            .await
            .expect("node should observe the deadline")
            .unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }

    #[test]
    fn test_from_spec() {
        let mut clients: HashMap<String, Arc<dyn ChatClient>> = HashMap::new();
        clients.insert("gpt".to_string(), CannedClient::new("[]"));

        let spec = NodeSpec::new("llm", "recall_llm")
            .with_config("llm_config_key", "gpt")
            .with_config("count", 4)
            .with_config("prompt", "like {favorites}, give {count}");
        let node = LlmRecallNode::from_spec(&spec, &clients).unwrap();
        assert_eq!(node.count, 4);
        assert_eq!(node.render_prompt(&["a".into(), "b".into()]), "like a, b, give 4");

        let defaults = LlmRecallNode::from_spec(
            &NodeSpec::new("llm", "recall_llm").with_config("llm_config_key", "gpt"),
            &clients,
        )
        .unwrap();
        assert_eq!(defaults.count, DEFAULT_RECALL_COUNT);

        let missing = NodeSpec::new("llm", "recall_llm");
        assert!(matches!(
            LlmRecallNode::from_spec(&missing, &clients),
            Err(BuildError::MissingConfig { .. })
        ));

        let unknown = NodeSpec::new("llm", "recall_llm").with_config("llm_config_key", "claude");
        assert!(matches!(
            LlmRecallNode::from_spec(&unknown, &clients),
            Err(BuildError::InvalidConfig { .. })
        ));
    }
}
