//! The generation capability: an opaque, possibly tool-invoking LLM call.
//!
//! The pipeline never talks to a provider directly. It hands a prompt and a
//! set of bounds to a [`Generator`] and receives a [`GenerationOutput`] back.
//! Tool results observed during the call are pushed into a caller-owned
//! [`ToolResultBuffer`], round by round, so whatever was captured before a
//! failure stays with the caller.

use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether the model is forced to call a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model must call at least one tool.
    Required,
    /// The model decides.
    Auto,
}

impl ToolChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolChoice::Required => "required",
            ToolChoice::Auto => "auto",
        }
    }
}

impl std::fmt::Display for ToolChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounds for a single generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Maximum reasoning / tool-call rounds.
    pub max_steps: u32,

    /// Maximum tool invocations running at once within a round.
    pub tool_call_concurrency: usize,

    /// Tool-forcing mode.
    pub tool_choice: ToolChoice,
}

impl GenerateOptions {
    /// A single plain round with no tool forcing (used by the formatter).
    pub fn single_shot() -> Self {
        Self {
            max_steps: 1,
            tool_call_concurrency: 1,
            tool_choice: ToolChoice::Auto,
        }
    }
}

/// The raw result of a generation call.
///
/// Backends disagree about what they return: some hand back plain text,
/// others a record with the text under one of several keys and, sometimes,
/// the tool results of the call under `toolResults`.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutput {
    Text(String),
    Structured(Value),
}

impl GenerationOutput {
    /// Tool-invocation records carried by a structured output, if any.
    pub fn tool_results(&self) -> Vec<Value> {
        match self {
            GenerationOutput::Structured(Value::Object(map)) => map
                .get("toolResults")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

impl From<String> for GenerationOutput {
    fn from(text: String) -> Self {
        GenerationOutput::Text(text)
    }
}

/// Ordered, caller-owned accumulator of tool-invocation records.
///
/// Each record is kept exactly as observed; interpretation happens in the
/// pipeline's normalizer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolResultBuffer {
    records: Vec<Value>,
}

impl ToolResultBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: Value) {
        self.records.push(record);
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = Value>) {
        self.records.extend(records);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.records
    }
}

/// The generation capability.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Run one bounded generation call for `prompt`.
    ///
    /// Tool results are appended to `tool_results` as each round completes,
    /// before any later round can fail.
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
        tool_results: &mut ToolResultBuffer,
    ) -> std::result::Result<GenerationOutput, ProviderError>;
}
