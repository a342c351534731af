use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{RwLock as AsyncRwLock, Semaphore};
use tracing::{info, instrument, warn};

use crate::domain::error::KernelError;
use crate::domain::models::agent::{AgentRegistration, AgentStatus};
use crate::domain::models::backlog::{BacklogItem, BacklogStatus};
use crate::domain::models::interaction::{Interaction, InteractionKind, InteractionStatus};
use crate::services::llm_dispatch::{GenerateOptions, LlmDispatch};
use crate::services::persistence::JsonStore;

/// A subscriber to an event topic (§4.7). Exceptions during `handle` are caught and logged
/// per-subscriber; they never abort sibling subscribers or the publisher.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    async fn handle(&self, topic: &str, data: Value);
}

/// Invoked by the Kernel's `component_improvement` handler on a best-effort basis to run a
/// campaign against the top backlog suggestion. Implemented by the Strategic Evolution
/// subsystem; wired in after both are constructed to avoid a module cycle.
#[async_trait]
pub trait CampaignRunner: Send + Sync {
    async fn run_campaign_on_backlog_item(&self, item: &BacklogItem);
}

#[derive(Default)]
struct BacklogCollection {
    items: Vec<BacklogItem>,
}

/// Interaction routing, agent/tool registries, concurrency-bounded handler dispatch, and a
/// pub/sub event bus (C7). Grounded on the source project's `mastermind`/coordinator kernel.
pub struct Kernel {
    agents: RwLock<HashMap<String, AgentRegistration>>,
    interactions: AsyncRwLock<HashMap<String, Interaction>>,
    backlog: AsyncRwLock<Vec<BacklogItem>>,
    subscribers: AsyncRwLock<HashMap<String, Vec<Arc<dyn EventSubscriber>>>>,
    heavy_task_semaphore: Arc<Semaphore>,
    llm: Arc<LlmDispatch>,
    default_model: String,
    store: Arc<JsonStore>,
    campaign_hook: AsyncRwLock<Option<Arc<dyn CampaignRunner>>>,
}

impl Kernel {
    #[must_use]
    pub fn new(llm: Arc<LlmDispatch>, default_model: impl Into<String>, max_concurrent_heavy_tasks: usize, store: Arc<JsonStore>) -> Self {
        let mut agents = HashMap::new();
        agents.insert("kernel".to_string(), AgentRegistration::new("kernel", "kernel", "self-registered orchestration kernel"));
        Self {
            agents: RwLock::new(agents),
            interactions: AsyncRwLock::new(HashMap::new()),
            backlog: AsyncRwLock::new(Vec::new()),
            subscribers: AsyncRwLock::new(HashMap::new()),
            heavy_task_semaphore: Arc::new(Semaphore::new(max_concurrent_heavy_tasks.max(1))),
            llm,
            default_model: default_model.into(),
            store,
            campaign_hook: AsyncRwLock::new(None),
        }
    }

    /// Loads the persisted improvement backlog. Part of the async init sequence (§4.7).
    pub async fn load_persisted(&self) {
        let collection: BacklogCollection = self.load_backlog_collection().await;
        *self.backlog.write().await = collection.items;
    }

    async fn load_backlog_collection(&self) -> BacklogCollection {
        let items: Vec<BacklogItem> = self.store.load("backlog").await;
        BacklogCollection { items }
    }

    async fn persist_backlog(&self) {
        let items = self.backlog.read().await.clone();
        if let Err(err) = self.store.save("backlog", &items).await {
            warn!(%err, "failed to persist backlog");
        }
    }

    pub async fn set_campaign_hook(&self, hook: Arc<dyn CampaignRunner>) {
        *self.campaign_hook.write().await = Some(hook);
    }

    /// Current free capacity in the heavy-task semaphore; used by the Audit Scheduler's
    /// load-aware deferral check before kicking off another audit-driven campaign.
    #[must_use]
    pub fn available_heavy_task_permits(&self) -> usize {
        self.heavy_task_semaphore.available_permits()
    }

    // --- Agent registry -----------------------------------------------------------------

    pub fn register_agent(&self, agent_id: impl Into<String>, kind: impl Into<String>, description: impl Into<String>) {
        let registration = AgentRegistration::new(agent_id, kind, description);
        self.agents.write().expect("kernel agent lock poisoned").insert(registration.agent_id.clone(), registration);
    }

    pub fn deregister_agent(&self, agent_id: &str) -> Result<(), KernelError> {
        let mut agents = self.agents.write().expect("kernel agent lock poisoned");
        match agents.get_mut(agent_id) {
            Some(a) => {
                a.status = AgentStatus::ShutDown;
                agents.remove(agent_id);
                Ok(())
            }
            None => Err(KernelError::InvalidInput(format!("no agent registered with id '{agent_id}'"))),
        }
    }

    /// Snapshot of agent registrations for `show_agent_registry` (§6). `instance_ref` never
    /// existed on the serialized type, so nothing needs to be stripped here.
    #[must_use]
    pub fn list_agents(&self) -> Vec<AgentRegistration> {
        self.agents.read().expect("kernel agent lock poisoned").values().cloned().collect()
    }

    // --- Event bus -----------------------------------------------------------------------

    pub async fn subscribe(&self, topic: impl Into<String>, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers.write().await.entry(topic.into()).or_default().push(subscriber);
    }

    /// Invokes every subscriber of `topic` concurrently. A subscriber that panics is isolated:
    /// its join failure is logged, siblings still run to completion.
    #[instrument(skip(self, data))]
    pub async fn publish_event(&self, topic: &str, data: Value) {
        let subscribers = {
            let map = self.subscribers.read().await;
            map.get(topic).cloned().unwrap_or_default()
        };
        let mut handles = Vec::with_capacity(subscribers.len());
        for subscriber in subscribers {
            let topic = topic.to_string();
            let data = data.clone();
            handles.push(tokio::spawn(async move { subscriber.handle(&topic, data).await }));
        }
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(topic, %err, "event subscriber task failed");
            }
        }
    }

    // --- Backlog -----------------------------------------------------------------------

    pub async fn push_backlog_item(&self, item: BacklogItem) {
        self.backlog.write().await.push(item);
        self.persist_backlog().await;
    }

    #[must_use]
    pub async fn backlog_snapshot(&self) -> Vec<BacklogItem> {
        self.backlog.read().await.clone()
    }

    /// Pops the highest-priority actionable backlog item, marking it `in_progress`.
    pub async fn pop_actionable_backlog_item(&self) -> Option<BacklogItem> {
        let mut backlog = self.backlog.write().await;
        let idx = backlog
            .iter()
            .enumerate()
            .filter(|(_, i)| i.is_actionable())
            .max_by_key(|(_, i)| i.priority)
            .map(|(idx, _)| idx)?;
        backlog[idx].status = BacklogStatus::InProgress;
        backlog[idx].attempt_count += 1;
        backlog[idx].last_attempted_at = Some(chrono::Utc::now());
        let item = backlog[idx].clone();
        drop(backlog);
        self.persist_backlog().await;
        Some(item)
    }

    pub async fn set_backlog_status(&self, id: &str, status: BacklogStatus) -> Result<(), KernelError> {
        let mut backlog = self.backlog.write().await;
        let item = backlog.iter_mut().find(|i| i.id == id).ok_or_else(|| KernelError::InvalidInput(format!("no backlog item '{id}'")))?;
        item.status = status;
        if status == BacklogStatus::Approved {
            item.approved_at = Some(chrono::Utc::now());
        }
        drop(backlog);
        self.persist_backlog().await;
        Ok(())
    }

    // --- Interaction processing ----------------------------------------------------------

    /// Creates and fully processes an Interaction, returning the terminal record (§4.7).
    #[instrument(skip(self, content, metadata))]
    pub async fn handle_input(&self, content: impl Into<String>, kind: InteractionKind, metadata: HashMap<String, Value>) -> Interaction {
        let interaction = Interaction::new(kind, content, metadata);
        let processed = self.process_interaction(interaction).await;
        self.interactions.write().await.insert(processed.id.clone(), processed.clone());
        processed
    }

    #[instrument(skip(self, interaction), fields(interaction_id = %interaction.id, kind = ?interaction.kind))]
    pub async fn process_interaction(&self, mut interaction: Interaction) -> Interaction {
        interaction.transition_to(InteractionStatus::InProgress);

        let result = match interaction.kind {
            InteractionKind::Query => self.handle_query(&interaction).await,
            InteractionKind::SystemAnalysis => Ok(self.handle_system_analysis().await),
            InteractionKind::ComponentImprovement => self.handle_component_improvement(&interaction).await,
            InteractionKind::PublishEvent => self.handle_publish_event(&interaction).await,
            InteractionKind::AgentRegistration => {
                Ok(json!({"note": "agent_registration is handled by register_agent, not the interaction handler map"}))
            }
        };

        match result {
            Ok(response) => interaction.complete(response),
            Err(err) => interaction.fail(err.to_string()),
        }
        info!(status = ?interaction.status, "interaction processed");
        interaction
    }

    async fn handle_query(&self, interaction: &Interaction) -> Result<Value, KernelError> {
        let text = self
            .llm
            .generate_text(&interaction.content, &self.default_model, GenerateOptions::default())
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(Value::String(text))
    }

    async fn handle_system_analysis(&self) -> Value {
        let agent_count = self.agents.read().expect("kernel agent lock poisoned").len();
        let in_progress = self
            .interactions
            .read()
            .await
            .values()
            .filter(|i| i.status == InteractionStatus::InProgress)
            .count();
        let topics = self.subscribers.read().await.len();
        json!({ "agent_count": agent_count, "in_progress_interactions": in_progress, "topics": topics })
    }

    /// Enqueues the interaction's content as a backlog suggestion and, if a campaign hook is
    /// registered, best-effort kicks off a campaign on the newly-seeded item (§4.7).
    async fn handle_component_improvement(&self, interaction: &Interaction) -> Result<Value, KernelError> {
        let _permit = self.heavy_task_semaphore.acquire().await.map_err(|e| KernelError::Internal(e.to_string()))?;

        let item = BacklogItem::new("component_improvement", interaction.content.clone(), 5, "kernel_component_improvement");
        self.push_backlog_item(item.clone()).await;

        if let Some(hook) = self.campaign_hook.read().await.clone() {
            let item_for_campaign = item.clone();
            tokio::spawn(async move { hook.run_campaign_on_backlog_item(&item_for_campaign).await });
        }

        Ok(json!({"backlog_item_id": item.id, "queued": true}))
    }

    async fn handle_publish_event(&self, interaction: &Interaction) -> Result<Value, KernelError> {
        let topic = interaction
            .metadata
            .get("topic")
            .and_then(Value::as_str)
            .ok_or_else(|| KernelError::InvalidInput("publish_event requires metadata.topic".to_string()))?
            .to_string();
        let data = interaction.metadata.get("data").cloned().unwrap_or(Value::Null);
        self.publish_event(&topic, data).await;
        Ok(json!({"published": topic}))
    }

    #[must_use]
    pub async fn get_interaction(&self, id: &str) -> Option<Interaction> {
        self.interactions.read().await.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::rate_limiter::TokenBucketRateLimiter;
    use crate::services::retry::RetryPolicy;

    fn kernel(data_dir: &std::path::Path) -> Kernel {
        let llm = Arc::new(LlmDispatch::new(TokenBucketRateLimiter::new(6000.0), RetryPolicy::default()));
        Kernel::new(llm, "mock-default", 2, Arc::new(JsonStore::new(data_dir.to_path_buf())))
    }

    #[tokio::test]
    async fn query_interaction_completes_with_nonempty_response() {
        let dir = tempfile::tempdir().unwrap();
        let k = kernel(dir.path());
        let interaction = k.handle_input("2+2?", InteractionKind::Query, HashMap::new()).await;
        assert_eq!(interaction.status, InteractionStatus::Completed);
        assert!(matches!(interaction.response, Some(Value::String(ref s)) if !s.is_empty()));
        assert!(k.list_agents().len() >= 1);
    }

    #[tokio::test]
    async fn system_analysis_reports_agent_count() {
        let dir = tempfile::tempdir().unwrap();
        let k = kernel(dir.path());
        let interaction = k.handle_input("", InteractionKind::SystemAnalysis, HashMap::new()).await;
        assert_eq!(interaction.status, InteractionStatus::Completed);
        assert_eq!(interaction.response.unwrap()["agent_count"], json!(1));
    }

    #[tokio::test]
    async fn component_improvement_seeds_backlog() {
        let dir = tempfile::tempdir().unwrap();
        let k = kernel(dir.path());
        let interaction = k.handle_input("improve X", InteractionKind::ComponentImprovement, HashMap::new()).await;
        assert_eq!(interaction.status, InteractionStatus::Completed);
        assert_eq!(k.backlog_snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn publish_event_invokes_subscribers() {
        let dir = tempfile::tempdir().unwrap();
        let k = kernel(dir.path());

        struct Counter(Arc<std::sync::atomic::AtomicUsize>);
        #[async_trait]
        impl EventSubscriber for Counter {
            async fn handle(&self, _topic: &str, _data: Value) {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        }

        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        k.subscribe("demo.topic", Arc::new(Counter(count.clone()))).await;
        k.publish_event("demo.topic", Value::Null).await;
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn backlog_persists_across_kernel_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let k = kernel(dir.path());
            k.push_backlog_item(BacklogItem::new("t", "s", 5, "test")).await;
        }
        let k2 = kernel(dir.path());
        k2.load_persisted().await;
        assert_eq!(k2.backlog_snapshot().await.len(), 1);
    }
}
