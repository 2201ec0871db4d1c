//! The bounded tool-calling loop.
//!
//! [`ToolAgent`] implements [`Generator`] on top of a chat [`Provider`]:
//! each step sends the conversation and the tool definitions, executes the
//! tool calls the model asks for (at most `tool_call_concurrency` at once),
//! feeds the results back, and stops as soon as the model answers without
//! calling a tool or the step budget runs out.

use async_trait::async_trait;
use futures::StreamExt;
use nippo_core::error::ProviderError;
use nippo_core::generation::{GenerateOptions, GenerationOutput, Generator, ToolChoice, ToolResultBuffer};
use nippo_core::message::{Message, MessageToolCall};
use nippo_core::provider::{Provider, ProviderRequest};
use nippo_core::tool::{ToolCall, ToolRegistry, ToolResult};
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An LLM agent bound to one model and one tool set.
pub struct ToolAgent {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model name as the provider expects it
    model: String,

    /// System prompt sent ahead of every prompt
    instructions: String,

    temperature: f32,

    max_tokens: Option<u32>,

    /// Tools the model may call
    tools: Arc<ToolRegistry>,
}

impl ToolAgent {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, tools: ToolRegistry) -> Self {
        Self {
            provider,
            model: model.into(),
            instructions: String::new(),
            temperature: 0.7,
            max_tokens: None,
            tools: Arc::new(tools),
        }
    }

    /// Set the system prompt.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.names()
    }

    /// Run one batch of tool calls with bounded parallelism, in call order.
    async fn run_tools(
        &self,
        calls: &[MessageToolCall],
        concurrency: usize,
    ) -> Vec<(ToolCall, Result<ToolResult, nippo_core::error::ToolError>)> {
        let tools = Arc::clone(&self.tools);
        let owned: Vec<ToolCall> = calls
            .iter()
            .map(|tc| ToolCall {
                id: tc.id.clone(),
                name: tc.name.clone(),
                arguments: serde_json::from_str(&tc.arguments).unwrap_or_else(|_| json!({})),
            })
            .collect();
        futures::stream::iter(owned)
            .map(move |call: ToolCall| {
                let tools = Arc::clone(&tools);
                async move {
                    let outcome = tools.execute(&call).await;
                    (call, outcome)
                }
            })
            .buffered(concurrency.max(1))
            .collect()
            .await
    }
}

/// The record kept for one tool invocation.
///
/// `result` holds the tool's structured data when it returned any, else its
/// text output (decoded as JSON when possible).
pub fn tool_result_record(call: &ToolCall, outcome: &Result<ToolResult, nippo_core::error::ToolError>) -> Value {
    let (result, is_error) = match outcome {
        Ok(res) => {
            let result = match &res.data {
                Some(data) => data.clone(),
                None => serde_json::from_str(&res.output)
                    .unwrap_or_else(|_| Value::String(res.output.clone())),
            };
            (result, !res.success)
        }
        Err(e) => (Value::String(e.to_string()), true),
    };

    json!({
        "toolCallId": call.id,
        "toolName": call.name,
        "args": call.arguments,
        "result": result,
        "isError": is_error,
    })
}

#[async_trait]
impl Generator for ToolAgent {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
        tool_results: &mut ToolResultBuffer,
    ) -> Result<GenerationOutput, ProviderError> {
        let mut messages = Vec::with_capacity(2);
        if !self.instructions.is_empty() {
            messages.push(Message::system(&self.instructions));
        }
        messages.push(Message::user(prompt));

        let definitions = self.tools.definitions();
        let max_steps = options.max_steps.max(1);
        let mut last_content = String::new();

        for step in 1..=max_steps {
            // Forcing applies to the opening step; later steps may answer in text.
            let tool_choice = match (definitions.is_empty(), step) {
                (true, _) => None,
                (false, 1) => Some(options.tool_choice),
                (false, _) => Some(ToolChoice::Auto),
            };

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: definitions.clone(),
                tool_choice,
            };

            debug!(model = %self.model, step, "Agent step");
            let response = self.provider.complete(request).await?;

            if response.message.tool_calls.is_empty() {
                debug!(model = %self.model, step, "Agent finished with text response");
                return Ok(GenerationOutput::Text(response.message.content));
            }

            last_content = response.message.content.clone();
            let calls = response.message.tool_calls.clone();
            messages.push(response.message);

            let outcomes = self.run_tools(&calls, options.tool_call_concurrency).await;
            let mut names = BTreeSet::new();
            let mut failures = 0usize;

            for (call, outcome) in &outcomes {
                names.insert(call.name.clone());
                tool_results.push(tool_result_record(call, outcome));

                let content = match outcome {
                    Ok(res) => res.output.clone(),
                    Err(e) => {
                        failures += 1;
                        warn!(tool = %call.name, error = %e, "Tool execution failed");
                        // Report error to the LLM so it can recover
                        format!("Error: {e}")
                    }
                };
                messages.push(Message::tool_result(&call.id, content));
            }

            info!(
                step,
                tool_calls = calls.len(),
                tool_results = outcomes.len(),
                failures,
                tools = ?names,
                "Generation step finished"
            );
        }

        warn!(model = %self.model, max_steps, "Max agent steps reached");
        Ok(GenerationOutput::Text(last_content))
    }
}
