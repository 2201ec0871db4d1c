//! Remote GitHub tools over MCP (streamable HTTP).
//!
//! [`GithubMcpClient`] is a [`ToolSource`]: it performs the `initialize`
//! handshake lazily, pages through `tools/list`, and exposes every remote
//! tool as an [`McpTool`] named `<namespace>_<remote name>`. Calls go out as
//! `tools/call` and come back as the raw MCP result envelope in
//! [`ToolResult::data`].
//!
//! Responses may be plain JSON or a `text/event-stream` body; both are
//! accepted. The session id handed out by the server (`Mcp-Session-Id`)
//! is echoed on every later request.

use crate::protocol::{
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, McpToolDef, ToolsListResult,
    content_text, initialize_params, parse_sse_response,
};
use async_trait::async_trait;
use nippo_config::GithubConfig;
use nippo_core::error::ToolError;
use nippo_core::tool::{Tool, ToolResult, ToolSource};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const SESSION_HEADER: &str = "mcp-session-id";

/// Upper bound on `tools/list` pages followed in one listing.
const MAX_LIST_PAGES: usize = 10;

/// Errors from the MCP transport. These never escape [`ToolSource::list_tools`].
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("server returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Rpc(crate::protocol::JsonRpcError),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("no credential configured")]
    NotConfigured,
}

impl From<reqwest::Error> for McpError {
    fn from(e: reqwest::Error) -> Self {
        McpError::Http(e.to_string())
    }
}

/// A single HTTP connection to an MCP endpoint.
pub struct McpConnection {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
    next_id: AtomicU64,
    /// `Some` once the handshake completed; the inner value is the session id.
    session: Mutex<Option<Option<String>>>,
}

impl McpConnection {
    pub fn new(
        url: impl Into<String>,
        token: Option<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, McpError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            http,
            url: url.into(),
            token,
            next_id: AtomicU64::new(1),
            session: Mutex::new(None),
        })
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn post(&self, session_id: Option<&str>) -> Result<reqwest::RequestBuilder, McpError> {
        let token = self.token.as_deref().ok_or(McpError::NotConfigured)?;
        let mut builder = self
            .http
            .post(&self.url)
            .bearer_auth(token)
            .header("Accept", "application/json, text/event-stream");
        if let Some(id) = session_id {
            builder = builder.header(SESSION_HEADER, id);
        }
        Ok(builder)
    }

    /// Send one request and decode its response. Returns the session id the
    /// server attached, if any.
    async fn send(
        &self,
        session_id: Option<&str>,
        method: &str,
        params: Option<Value>,
    ) -> Result<(Value, Option<String>), McpError> {
        let id = self.next_request_id();
        let request = JsonRpcRequest::new(id, method, params);
        debug!(method, id, "MCP request");

        let response = self.post(session_id)?.json(&request).send().await?;
        let status = response.status();
        let new_session = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let is_sse = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));
        let body = response.text().await?;

        if !status.is_success() {
            return Err(McpError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let rpc: JsonRpcResponse = if is_sse {
            parse_sse_response(&body, id)
                .ok_or_else(|| McpError::Malformed(format!("no response for request {id} in event stream")))?
        } else {
            serde_json::from_str(&body).map_err(|e| McpError::Malformed(e.to_string()))?
        };
        if rpc.id != Some(id) {
            return Err(McpError::Malformed(format!(
                "response id {:?} does not match request {id}",
                rpc.id
            )));
        }

        let value = rpc.into_result().map_err(McpError::Rpc)?;
        Ok((value, new_session))
    }

    /// Run the handshake once and return the session id to use.
    async fn session(&self) -> Result<Option<String>, McpError> {
        let mut guard = self.session.lock().await;
        if let Some(existing) = guard.as_ref() {
            return Ok(existing.clone());
        }

        let (result, session_id) = self.send(None, "initialize", Some(initialize_params())).await?;
        info!(
            server = result["serverInfo"]["name"].as_str().unwrap_or("unknown"),
            session = session_id.is_some(),
            "MCP session initialized"
        );

        let notification = JsonRpcNotification::new("notifications/initialized");
        if let Err(e) = self
            .post(session_id.as_deref())?
            .json(&notification)
            .send()
            .await
        {
            warn!(error = %e, "Failed to send initialized notification");
        }

        *guard = Some(session_id.clone());
        Ok(session_id)
    }

    /// Forget the handshake if it still refers to `expired`.
    async fn reset_session(&self, expired: Option<&str>) {
        let mut guard = self.session.lock().await;
        if guard.as_ref().is_some_and(|current| current.as_deref() == expired) {
            *guard = None;
        }
    }

    /// Call `method` inside the session.
    ///
    /// A 404 on a request that carried a session id means the server expired
    /// the session; the handshake is redone once and the request retried.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let session_id = self.session().await?;
        match self.send(session_id.as_deref(), method, params.clone()).await {
            Err(McpError::Status { status: 404, .. }) if session_id.is_some() => {
                warn!(method, "MCP session expired, re-initializing");
                self.reset_session(session_id.as_deref()).await;
                let renewed = self.session().await?;
                let (value, _) = self.send(renewed.as_deref(), method, params).await?;
                Ok(value)
            }
            other => other.map(|(value, _)| value),
        }
    }

    /// Every tool descriptor the server offers, following pagination.
    pub async fn list_tools(&self) -> Result<Vec<McpToolDef>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = cursor.as_ref().map(|c| serde_json::json!({ "cursor": c }));
            let value = self.request("tools/list", params).await?;
            let page: ToolsListResult =
                serde_json::from_value(value).map_err(|e| McpError::Malformed(e.to_string()))?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(tools)
    }

    /// Invoke a remote tool; returns the raw `tools/call` result.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, McpError> {
        self.request(
            "tools/call",
            Some(serde_json::json!({ "name": name, "arguments": arguments })),
        )
        .await
    }
}

/// A remote tool exposed under a namespaced name.
pub struct McpTool {
    name: String,
    remote_name: String,
    description: String,
    schema: Value,
    connection: Arc<McpConnection>,
}

impl McpTool {
    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let result = self
            .connection
            .call_tool(&self.remote_name, arguments)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name.clone(),
                reason: e.to_string(),
            })?;

        let is_error = result.get("isError").and_then(Value::as_bool).unwrap_or(false);
        Ok(ToolResult {
            call_id: String::new(),
            success: !is_error,
            output: content_text(&result),
            data: Some(result),
        })
    }
}

/// The GitHub MCP server as a [`ToolSource`].
pub struct GithubMcpClient {
    connection: Arc<McpConnection>,
    namespace: String,
}

impl GithubMcpClient {
    pub fn new(connection: McpConnection, namespace: impl Into<String>) -> Self {
        Self {
            connection: Arc::new(connection),
            namespace: namespace.into(),
        }
    }

    /// Build a client from the `[github]` config section.
    pub fn from_config(config: &GithubConfig) -> Result<Self, McpError> {
        let connection = McpConnection::new(
            &config.mcp_url,
            config.token.clone(),
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.request_timeout_secs),
        )?;
        Ok(Self::new(connection, &config.namespace))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn namespaced(&self, remote_name: &str) -> String {
        format!("{}_{}", self.namespace, remote_name)
    }

    fn wrap_tool(&self, def: McpToolDef) -> Arc<dyn Tool> {
        Arc::new(McpTool {
            name: self.namespaced(&def.name),
            remote_name: def.name,
            description: def.description,
            schema: def.input_schema,
            connection: Arc::clone(&self.connection),
        })
    }
}

#[async_trait]
impl ToolSource for GithubMcpClient {
    async fn list_tools(&self) -> BTreeMap<String, Arc<dyn Tool>> {
        if self.connection.token.is_none() {
            warn!("GitHub token is not set; remote GitHub tools are unavailable");
            return BTreeMap::new();
        }

        match self.connection.list_tools().await {
            Ok(defs) => {
                let tools: BTreeMap<String, Arc<dyn Tool>> = defs
                    .into_iter()
                    .map(|def| {
                        let tool = self.wrap_tool(def);
                        (tool.name().to_string(), tool)
                    })
                    .collect();
                debug!(tool_count = tools.len(), "Listed remote GitHub tools");
                tools
            }
            Err(e) => {
                warn!(error = %e, "Failed to list remote GitHub tools");
                BTreeMap::new()
            }
        }
    }
}
