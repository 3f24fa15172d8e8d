//! Invoke config: thread_id, checkpoint_id, checkpoint_ns.
//!
//! Aligns with LangGraph's config["configurable"]. Passed to every checkpoint saver call.

use serde::{Deserialize, Serialize};

/// Identifies a thread and, optionally, one checkpoint in it.
///
/// `put` and `put_writes` need `thread_id`; `get_tuple` loads `checkpoint_id` when set and
/// the latest checkpoint otherwise.
///
/// **Interaction**: Passed to [`Checkpointer`](super::Checkpointer) methods; `put` returns
/// the config pointing at the checkpoint it wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnableConfig {
    /// Unique id for this conversation/thread.
    pub thread_id: Option<String>,
    /// If set, load this checkpoint instead of the latest (time travel / branch).
    pub checkpoint_id: Option<String>,
    /// Checkpoint namespace (e.g. subgraph). Empty for the root graph.
    #[serde(default)]
    pub checkpoint_ns: String,
}

impl RunnableConfig {
    /// Config for the latest checkpoint of `thread_id` in the root namespace.
    pub fn for_thread(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: Some(thread_id.into()),
            ..Self::default()
        }
    }

    pub fn with_checkpoint_id(mut self, checkpoint_id: impl Into<String>) -> Self {
        self.checkpoint_id = Some(checkpoint_id.into());
        self
    }

    pub fn with_checkpoint_ns(mut self, checkpoint_ns: impl Into<String>) -> Self {
        self.checkpoint_ns = checkpoint_ns.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: RunnableConfig::default() has all optionals None and checkpoint_ns empty.
    #[test]
    fn runnable_config_default_all_optionals_none_or_empty() {
        let c = RunnableConfig::default();
        assert!(c.thread_id.is_none());
        assert!(c.checkpoint_id.is_none());
        assert!(c.checkpoint_ns.is_empty());
    }

    /// **Scenario**: Builders set thread, checkpoint and namespace.
    #[test]
    fn runnable_config_builders() {
        let c = RunnableConfig::for_thread("t1")
            .with_checkpoint_id("cp1")
            .with_checkpoint_ns("sub");
        assert_eq!(c.thread_id.as_deref(), Some("t1"));
        assert_eq!(c.checkpoint_id.as_deref(), Some("cp1"));
        assert_eq!(c.checkpoint_ns, "sub");
        assert_eq!(c.clone(), c);
    }

    /// **Scenario**: A missing checkpoint_ns deserializes as empty.
    #[test]
    fn runnable_config_deserialize_defaults_ns() {
        let c: RunnableConfig = serde_json::from_str(r#"{"thread_id":"t","checkpoint_id":null}"#).unwrap();
        assert_eq!(c, RunnableConfig::for_thread("t"));
    }
}
