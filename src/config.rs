//! Process-wide configuration, read once at startup.
//!
//! Feature-flag defaults come from the same environment variables on every
//! transport, so a deployment can pin its capability surface regardless of
//! which clients connect:
//!
//! - `MCP_ENABLED_TOOLS` / `MCP_DISABLED_TOOLS`
//! - `MCP_ENABLED_PROMPTS` / `MCP_DISABLED_PROMPTS`
//! - `MCP_ENABLED_RESOURCES` / `MCP_DISABLED_RESOURCES`
//!
//! Each is a comma-separated list of capability names. An unset or empty
//! variable means "no restriction". The configuration is read-only after
//! startup.

use std::collections::HashSet;
use std::env;

/// Process-wide allow/deny defaults per capability category.
#[derive(Debug, Clone, Default)]
pub struct ProcessFlags {
    pub enabled_tools: Option<HashSet<String>>,
    pub disabled_tools: Option<HashSet<String>>,
    pub enabled_prompts: Option<HashSet<String>>,
    pub disabled_prompts: Option<HashSet<String>>,
    pub enabled_resources: Option<HashSet<String>>,
    pub disabled_resources: Option<HashSet<String>>,
}

impl ProcessFlags {
    pub fn from_env() -> Self {
        ProcessFlags {
            enabled_tools: name_set(env::var("MCP_ENABLED_TOOLS").ok()),
            disabled_tools: name_set(env::var("MCP_DISABLED_TOOLS").ok()),
            enabled_prompts: name_set(env::var("MCP_ENABLED_PROMPTS").ok()),
            disabled_prompts: name_set(env::var("MCP_DISABLED_PROMPTS").ok()),
            enabled_resources: name_set(env::var("MCP_ENABLED_RESOURCES").ok()),
            disabled_resources: name_set(env::var("MCP_DISABLED_RESOURCES").ok()),
        }
    }
}

/// HTTP listener configuration (`HOST`, `PORT`, `MCP_STATELESS`).
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub stateless: bool,
}

impl HttpConfig {
    pub fn from_env() -> Self {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3001);
        HttpConfig {
            host,
            port,
            stateless: env_flag_enabled("MCP_STATELESS"),
        }
    }
}

/// Parse a comma-separated name list into a set; empty input is "absent",
/// never "deny all".
pub fn name_set(raw: Option<String>) -> Option<HashSet<String>> {
    let raw = raw?;
    let set: HashSet<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if set.is_empty() {
        None
    } else {
        Some(set)
    }
}

fn env_flag_enabled(key: &str) -> bool {
    env::var(key)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_set_splits_and_trims() {
        let set = name_set(Some("alpha, beta ,gamma".to_string())).unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains("beta"));
    }

    #[test]
    fn empty_value_is_no_restriction() {
        assert!(name_set(Some(String::new())).is_none());
        assert!(name_set(Some(" , ".to_string())).is_none());
        assert!(name_set(None).is_none());
    }
}
