//! # Nippo Core
//!
//! Domain types, traits, and error definitions for the Nippo daily report
//! pipeline. This crate has **zero framework dependencies**: it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external capability is defined as a trait here:
//! - [`Provider`]: one chat-completion round against an LLM backend
//! - [`Tool`] / [`ToolSource`]: a callable tool and the remote listing of tools
//! - [`Generator`]: the opaque tool-invoking generation capability
//!
//! Implementations live in their respective crates, so the pipeline can be
//! exercised end-to-end with scripted stand-ins.

pub mod error;
pub mod generation;
pub mod message;
pub mod provider;
pub mod report;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use generation::{GenerateOptions, GenerationOutput, Generator, ToolChoice, ToolResultBuffer};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use report::{
    CollectedData, CollectionPlan, Draft, GithubItem, GithubItemType, ReportMeta, ReportRequest,
    ReportResponse, Signal, ToolKey,
};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult, ToolSource};
