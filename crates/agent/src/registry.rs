//! Keyed cache of constructed agents.
//!
//! Agents are immutable once built, so one instance per
//! (model, sorted tool names) pair is shared by every request that asks for
//! it. Construction goes through an injected builder; a race that builds the
//! same key twice simply overwrites the entry with an equivalent agent.

use nippo_core::error::ProviderError;
use nippo_core::generation::Generator;
use nippo_core::tool::ToolRegistry;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Cache key: model identifier plus the sorted, deduplicated tool names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AgentKey {
    pub model: String,
    pub tools: Vec<String>,
}

impl AgentKey {
    pub fn new<I, S>(model: impl Into<String>, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tools: Vec<String> = tools.into_iter().map(Into::into).collect();
        tools.sort();
        tools.dedup();
        Self {
            model: model.into(),
            tools,
        }
    }
}

/// Builds an agent for a model identifier and tool set.
pub type AgentBuilder =
    Arc<dyn Fn(&str, ToolRegistry) -> Result<Arc<dyn Generator>, ProviderError> + Send + Sync>;

/// Request-or-build registry of agents.
#[derive(Clone)]
pub struct AgentRegistry {
    builder: AgentBuilder,
    agents: Arc<RwLock<HashMap<AgentKey, Arc<dyn Generator>>>>,
}

impl AgentRegistry {
    pub fn new(builder: AgentBuilder) -> Self {
        Self {
            builder,
            agents: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Return the cached agent for `(model, tools)`, building it on first use.
    pub fn get_or_build(&self, model: &str, tools: ToolRegistry) -> Result<Arc<dyn Generator>, ProviderError> {
        let key = AgentKey::new(model, tools.names());

        if let Some(agent) = self
            .agents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
        {
            return Ok(Arc::clone(agent));
        }

        debug!(model, tools = ?key.tools, "Building agent");
        let agent = (self.builder)(model, tools)?;
        self.agents
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, Arc::clone(&agent));
        Ok(agent)
    }

    /// Number of cached agents.
    pub fn len(&self) -> usize {
        self.agents.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
