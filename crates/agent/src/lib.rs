//! Agent layer for Nippo.
//!
//! [`ToolAgent`] turns a chat provider plus a tool registry into the
//! pipeline's generation capability; [`AgentRegistry`] caches one agent per
//! model and tool set.

pub mod loop_runner;
pub mod registry;

pub use loop_runner::{ToolAgent, tool_result_record};
pub use registry::{AgentBuilder, AgentKey, AgentRegistry};
