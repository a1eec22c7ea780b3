//! One generate turn at the orchestration boundary: record the question,
//! let the agent answer with a capped tool, record the answer.

use std::cell::Cell;

use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::ToolSettings;
use crate::models::{Message, MessageRole};
use crate::session::SessionStore;
use crate::tool::ToolInvoker;

pub const TOOL_CALL_LIMIT_MESSAGE: &str =
    "Tool call limit reached for this request. Answer with the results gathered so far.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationRequest {
    pub user_query: String,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationResponse {
    pub query: String,
    pub session_id: String,
    pub title: String,
    pub technologies: Vec<String>,
    pub response: String,
}

/// The language model side of a turn. Implementations may call `tool` any
/// number of times; calls past the configured cap answer with a fixed
/// message instead of reaching the store.
pub trait Agent {
    fn respond(&self, input: &str, history: &[Message], tool: &dyn ToolInvoker) -> Result<String>;
}

/// Wraps a tool and refuses calls beyond `max_calls`.
pub struct CappedToolInvoker<'a> {
    inner: &'a dyn ToolInvoker,
    max_calls: usize,
    calls: Cell<usize>,
}

impl<'a> CappedToolInvoker<'a> {
    #[must_use]
    pub fn new(inner: &'a dyn ToolInvoker, max_calls: usize) -> Self {
        Self {
            inner,
            max_calls,
            calls: Cell::new(0),
        }
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl ToolInvoker for CappedToolInvoker<'_> {
    fn execute_query(&self, sql: &str) -> Result<String> {
        let attempted = self.calls.get() + 1;
        self.calls.set(attempted);
        if attempted > self.max_calls {
            tracing::warn!(max_calls = self.max_calls, "tool call limit reached");
            return Ok(TOOL_CALL_LIMIT_MESSAGE.to_string());
        }
        self.inner.execute_query(sql)
    }
}

pub fn generate(
    store: &SessionStore,
    agent: &dyn Agent,
    tool: &dyn ToolInvoker,
    settings: &ToolSettings,
    request: &GenerationRequest,
) -> Result<GenerationResponse> {
    let session_id = request.session_id.as_str();
    let history = store
        .load_history(session_id)
        .with_context(|| format!("failed to load history for session `{session_id}`"))?;

    store.append_message(session_id, MessageRole::Human, &request.user_query)?;

    let capped = CappedToolInvoker::new(tool, settings.max_tool_calls);
    let answer = agent
        .respond(&request.user_query, &history, &capped)
        .context("agent failed to answer")?;
    tracing::info!(session_id, tool_calls = capped.calls(), "agent answered");

    store.append_message(session_id, MessageRole::Ai, &answer)?;
    let title = store.session_title(session_id)?;

    Ok(GenerationResponse {
        query: request.user_query.clone(),
        session_id: request.session_id.clone(),
        title,
        technologies: parse_technologies(&answer),
        response: answer,
    })
}

/// Items of a `- ` bulleted answer, in order.
#[must_use]
pub fn parse_technologies(answer: &str) -> Vec<String> {
    answer
        .split('\n')
        .filter_map(|line| line.strip_prefix("- "))
        .map(|item| item.trim().to_string())
        .collect()
}
