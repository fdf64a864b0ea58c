// lib/crates/berth-common/src/request.rs

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Conventional name of the structured runtime config inside `files`.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// A named file payload produced by the setup wizard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileSpec {
    /// Path relative to the agent's workspace (or `config.json`).
    pub path: String,
    pub content: String,
}

impl FileSpec {
    #[must_use]
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// Whether this payload is the structured runtime config.
    #[must_use]
    pub fn is_config(&self) -> bool {
        self.path == CONFIG_FILE_NAME
    }
}

/// Messaging channel an agent can be exposed on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Telegram,
    Whatsapp,
    Discord,
}

impl Channel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Telegram => "telegram",
            Channel::Whatsapp => "whatsapp",
            Channel::Discord => "discord",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown channel '{0}' (expected telegram, whatsapp or discord)")]
pub struct ParseChannelError(pub String);

impl FromStr for Channel {
    type Err = ParseChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "telegram" => Ok(Channel::Telegram),
            "whatsapp" => Ok(Channel::Whatsapp),
            "discord" => Ok(Channel::Discord),
            _ => Err(ParseChannelError(s.to_string())),
        }
    }
}

/// The AI provider the user picked, with its decrypted key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCredential {
    /// Provider identifier, e.g. `anthropic`, `openai` or a custom name.
    pub provider: String,
    pub api_key: String,
}

/// Credential for an optional tool the user enabled in the wizard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCredential {
    /// Tool identifier, e.g. `brave_search`.
    pub tool: String,
    pub api_key: String,
}

/// Everything needed to bring one agent up on the host.
///
/// Built once per creation call by the caller and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningRequest {
    pub agent_id: String,
    pub user_id: String,
    pub runtime_version: String,
    /// Already-decrypted environment, written verbatim to the env file.
    #[serde(default)]
    pub env_vars: BTreeMap<String, String>,
    #[serde(default)]
    pub files: Vec<FileSpec>,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderCredential>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolCredential>,
}

impl ProvisioningRequest {
    /// The structured config payload, if the wizard sent one.
    #[must_use]
    pub fn config_file(&self) -> Option<&FileSpec> {
        self.files.iter().find(|f| f.is_config())
    }

    /// Payloads destined for the workspace directory.
    pub fn workspace_files(&self) -> impl Iterator<Item = &FileSpec> {
        self.files.iter().filter(|f| !f.is_config())
    }
}
