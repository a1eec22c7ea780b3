use std::fmt::{Display, Formatter};
use std::str::FromStr;

use anyhow::{Error, bail};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Title a session carries until its first human message arrives.
pub const DEFAULT_SESSION_TITLE: &str = "New Session";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    Human,
    Ai,
}

impl MessageRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Ai => "ai",
        }
    }
}

impl Display for MessageRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "human" => Ok(Self::Human),
            "ai" => Ok(Self::Ai),
            other => bail!("unknown message role `{other}` (expected `human` or `ai`)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Session {
    pub session_id: String,
    pub title: String,
    pub created_at_utc: String,
}

impl Session {
    #[must_use]
    pub fn has_derived_title(&self) -> bool {
        self.title != DEFAULT_SESSION_TITLE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Message {
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    pub sequence: u64,
    pub created_at_utc: String,
}
