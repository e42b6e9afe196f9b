//! Declarative server/tool policy: the `Policy` data model, validation, and
//! the `evaluate` decision function.

mod engine;
mod glob;

pub use engine::{evaluate, Verdict};
pub use glob::glob_match;

use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    #[serde(default)]
    pub burst: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRule {
    pub tool: String,
    pub action: Action,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerPolicy {
    pub server: String,
    pub default: Action,
    #[serde(default)]
    pub tools: Vec<ToolRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub schema_version: u32,
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
    #[serde(default)]
    pub servers: Vec<ServerPolicy>,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Validate structural invariants; returns an empty list for a valid policy.
pub fn validate(policy: &Policy) -> Vec<String> {
    let mut errors = Vec::new();

    if policy.schema_version != SCHEMA_VERSION {
        errors.push(format!(
            "unsupported schema_version {} (expected {SCHEMA_VERSION})",
            policy.schema_version
        ));
    }

    for server in &policy.servers {
        if server.server.is_empty() {
            errors.push("server policy has an empty server-name pattern".to_string());
        }
        for rule in &server.tools {
            if rule.tool.is_empty() {
                errors.push(format!(
                    "server '{}' has a tool rule with an empty tool pattern",
                    server.server
                ));
            }
        }
    }

    errors
}
