//! Configuration materializer: pure functions, no I/O, no async.
//!
//! Turns a `ProvisioningRequest` plus the agent's identity into the files the
//! runtime expects on disk. The caller is responsible for writing them.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path};

use berth_common::{Channel, FileSpec, ProvisioningRequest};
use serde_json::{Map, Value, json};

use crate::domain::error::ValidationError;
use crate::domain::identity::AgentIdentity;

/// Top-level config sections the runtime accepts. Anything else is dropped.
pub const ACCEPTED_CONFIG_KEYS: &[&str] = &[
    "agents", "browser", "channels", "commands", "env", "gateway", "hooks", "logging",
    "messages", "models", "plugins", "session", "skills", "tools", "ui",
];

/// Legacy gateway auth fields that conflict with `gateway.auth`.
pub const DEPRECATED_GATEWAY_KEYS: &[&str] = &["token", "password", "authToken"];

/// Fallback credential variable for providers not in the table below.
pub const GENERIC_PROVIDER_ENV: &str = "LLM_API_KEY";

/// A file ready to be written to an absolute host path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    pub path: String,
    pub content: String,
}

/// Everything `create` writes before registering the service.
#[derive(Debug, Clone)]
pub struct RenderedAgent {
    /// Structured config at the state-directory root.
    pub config: RenderedFile,
    /// Identity, profile and tools files inside the workspace.
    pub workspace_files: Vec<RenderedFile>,
    /// `KEY=VALUE` environment file at the state-directory root.
    pub env_file: RenderedFile,
    /// Tools the request enabled that have no known credential variable.
    pub skipped_tools: Vec<String>,
}

/// Render every file for `request`.
///
/// # Errors
///
/// Returns a `ValidationError` for malformed config JSON, unsafe or duplicate
/// file paths, or unusable environment entries. Nothing has touched the host
/// at that point.
pub fn render(
    identity: &AgentIdentity,
    request: &ProvisioningRequest,
) -> Result<RenderedAgent, ValidationError> {
    let raw_config = request.config_file().map_or("{}", |f| f.content.as_str());
    let config = RenderedFile {
        path: identity.config_path(),
        content: render_config(raw_config, identity, &request.channels)?,
    };
    let workspace_files = workspace_files(identity, request.workspace_files())?;
    let (env_content, skipped_tools) = env_file(identity, request)?;
    Ok(RenderedAgent {
        config,
        workspace_files,
        env_file: RenderedFile {
            path: identity.env_path(),
            content: env_content,
        },
        skipped_tools,
    })
}

/// Rewrite the wizard's `config.json` for this agent.
///
/// - unknown top-level sections are stripped
/// - `gateway.port` and `agents.defaults.workspace` are forced to the identity
/// - gateway auth is exactly `{"mode": "token", "token": <agent_id>}`; legacy
///   auth fields are removed
/// - requested channels are enabled, other known channels disabled
///
/// # Errors
///
/// Returns `MalformedConfig` if `raw` is not JSON, `ConfigNotObject` if the
/// root is not an object.
pub fn render_config(
    raw: &str,
    identity: &AgentIdentity,
    channels: &[Channel],
) -> Result<String, ValidationError> {
    let Value::Object(mut root) = serde_json::from_str::<Value>(raw)? else {
        return Err(ValidationError::ConfigNotObject);
    };

    root.retain(|key, _| ACCEPTED_CONFIG_KEYS.contains(&key.as_str()));

    with_object(&mut root, "gateway", |gateway| {
        for key in DEPRECATED_GATEWAY_KEYS {
            gateway.remove(*key);
        }
        gateway.insert("port".to_string(), json!(identity.port));
        gateway.insert(
            "auth".to_string(),
            json!({ "mode": "token", "token": identity.agent_id }),
        );
    });

    with_object(&mut root, "agents", |agents| {
        with_object(agents, "defaults", |defaults| {
            defaults.insert("workspace".to_string(), json!(identity.workspace_dir()));
        });
    });

    if !channels.is_empty() || root.contains_key("channels") {
        let wanted: BTreeSet<&str> = channels.iter().map(|c| c.as_str()).collect();
        with_object(&mut root, "channels", |section| {
            for name in [Channel::Telegram, Channel::Whatsapp, Channel::Discord].map(Channel::as_str)
            {
                let enabled = wanted.contains(name);
                if enabled || section.contains_key(name) {
                    with_object(section, name, |channel| {
                        channel.insert("enabled".to_string(), json!(enabled));
                    });
                }
            }
        });
    }

    let mut out = serde_json::to_string_pretty(&Value::Object(root))?;
    out.push('\n');
    Ok(out)
}

/// Map payloads into the agent's workspace directory.
///
/// # Errors
///
/// Returns `UnsafePath` for absolute paths or `..` components and
/// `DuplicatePath` if two payloads target the same file.
pub fn workspace_files<'a>(
    identity: &AgentIdentity,
    files: impl IntoIterator<Item = &'a FileSpec>,
) -> Result<Vec<RenderedFile>, ValidationError> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for file in files {
        let rel = safe_relative_path(&file.path)?;
        if !seen.insert(rel.clone()) {
            return Err(ValidationError::DuplicatePath(file.path.clone()));
        }
        out.push(RenderedFile {
            path: format!("{}/{rel}", identity.workspace_dir()),
            content: file.content.clone(),
        });
    }
    Ok(out)
}

/// Build the environment file and report tools without a credential mapping.
///
/// # Errors
///
/// Returns `InvalidEnvKey` / `InvalidEnvValue` for names that are not shell
/// identifiers or values containing line breaks.
pub fn env_file(
    identity: &AgentIdentity,
    request: &ProvisioningRequest,
) -> Result<(String, Vec<String>), ValidationError> {
    let mut vars: BTreeMap<String, String> = request.env_vars.clone();
    if let Some(provider) = &request.provider {
        vars.insert(
            provider_env_var(&provider.provider).to_string(),
            provider.api_key.clone(),
        );
    }
    let mut skipped = Vec::new();
    for tool in &request.tools {
        match tool_env_var(&tool.tool) {
            Some(key) => {
                vars.insert(key.to_string(), tool.api_key.clone());
            }
            None => skipped.push(tool.tool.clone()),
        }
    }

    vars.insert("BERTH_AGENT_ID".to_string(), identity.agent_id.clone());
    vars.insert("BERTH_PROFILE".to_string(), identity.profile_name.clone());
    vars.insert("BERTH_STATE_DIR".to_string(), identity.state_dir.clone());
    vars.insert(
        "BERTH_RUNTIME_VERSION".to_string(),
        request.runtime_version.clone(),
    );
    if !request.channels.is_empty() {
        let names: Vec<&str> = request.channels.iter().map(|c| c.as_str()).collect();
        vars.insert("BERTH_CHANNELS".to_string(), names.join(","));
    }

    let mut out = String::new();
    for (key, value) in &vars {
        if !is_env_key(key) {
            return Err(ValidationError::InvalidEnvKey(key.clone()));
        }
        if value.contains(['\n', '\r']) {
            return Err(ValidationError::InvalidEnvValue(key.clone()));
        }
        out.push_str(key);
        out.push('=');
        out.push_str(&env_value(value));
        out.push('\n');
    }
    Ok((out, skipped))
}

/// Credential variable the runtime reads for `provider`.
#[must_use]
pub fn provider_env_var(provider: &str) -> &'static str {
    match provider.to_ascii_lowercase().as_str() {
        "anthropic" => "ANTHROPIC_API_KEY",
        "openai" => "OPENAI_API_KEY",
        "google" | "gemini" => "GEMINI_API_KEY",
        "openrouter" => "OPENROUTER_API_KEY",
        "groq" => "GROQ_API_KEY",
        _ => GENERIC_PROVIDER_ENV,
    }
}

/// Credential variable for an optional tool, if it needs one.
#[must_use]
pub fn tool_env_var(tool: &str) -> Option<&'static str> {
    match tool.to_ascii_lowercase().as_str() {
        "brave_search" | "brave" | "web_search" => Some("BRAVE_API_KEY"),
        "firecrawl" => Some("FIRECRAWL_API_KEY"),
        "elevenlabs" | "tts" => Some("ELEVENLABS_API_KEY"),
        "tavily" => Some("TAVILY_API_KEY"),
        _ => None,
    }
}

fn safe_relative_path(path: &str) -> Result<String, ValidationError> {
    let unsafe_path = || ValidationError::UnsafePath(path.to_string());
    if path.is_empty() || path.contains('\0') {
        return Err(unsafe_path());
    }
    let mut parts = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str().ok_or_else(unsafe_path)?),
            Component::CurDir => {}
            _ => return Err(unsafe_path()),
        }
    }
    if parts.is_empty() {
        return Err(unsafe_path());
    }
    Ok(parts.join("/"))
}

fn is_env_key(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Double-quote values systemd would otherwise split or unescape.
fn env_value(value: &str) -> String {
    let plain = value
        .chars()
        .all(|c| !c.is_whitespace() && !"\"'\\#;$`".contains(c));
    if plain {
        value.to_string()
    } else {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

/// Run `f` on the object at `key`, replacing a missing or non-object value.
fn with_object(map: &mut Map<String, Value>, key: &str, f: impl FnOnce(&mut Map<String, Value>)) {
    let mut inner = match map.remove(key) {
        Some(Value::Object(inner)) => inner,
        _ => Map::new(),
    };
    f(&mut inner);
    map.insert(key.to_string(), Value::Object(inner));
}
