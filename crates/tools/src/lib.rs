//! Remote tool sources for Nippo.
//!
//! The collector reaches GitHub through a remote MCP server. This crate
//! provides the HTTP client for it ([`GithubMcpClient`], a
//! `nippo_core::ToolSource`) and the read-only filter applied to whatever
//! the server offers.

pub mod filter;
pub mod mcp;
pub mod protocol;

pub use filter::{is_read_only, read_only_tools, strip_namespace};
pub use mcp::{GithubMcpClient, McpConnection, McpError, McpTool};
