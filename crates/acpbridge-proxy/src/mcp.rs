//! MCP server config conversion (spec §4.E step 2).
//!
//! Grounded on `session_manager.py`'s `_convert_mcp_servers`: the caller's
//! map-keyed format is converted to the ACP stub's list form, and `${VAR}`
//! environment references are expanded from the current process environment.

use std::collections::HashMap;

use agent_client_protocol::{EnvVariable, McpServer, McpServerStdio};
use serde_json::Value;

/// Converts a caller-supplied MCP server map into the ACP stub's list form,
/// expanding `${VAR}` environment references (missing variable → empty
/// string).
pub fn convert_mcp_servers(mcp_servers: &HashMap<String, Value>) -> Vec<McpServer> {
    mcp_servers
        .iter()
        .map(|(name, config)| {
            let command = config.get("command").and_then(Value::as_str).unwrap_or("").to_string();
            let args: Vec<String> = config
                .get("args")
                .and_then(Value::as_array)
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default();

            let env: Vec<EnvVariable> = config
                .get("env")
                .and_then(Value::as_object)
                .map(|env| {
                    env.iter()
                        .map(|(key, value)| {
                            let value = value.as_str().unwrap_or_default();
                            EnvVariable::new(key.clone(), expand_env_ref(value))
                        })
                        .collect()
                })
                .unwrap_or_default();

            McpServer::Stdio(McpServerStdio::new(name.clone(), command).args(args).env(env))
        })
        .collect()
}

/// Expands a single `${VAR}` reference from the process environment;
/// anything else (a literal value, not of `${...}` shape) passes through
/// unchanged.
fn expand_env_ref(value: &str) -> String {
    if let Some(var_name) = value.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).unwrap_or_default()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_known_env_var() {
        std::env::set_var("ACPBRIDGE_TEST_VAR", "secret");
        let mut servers = HashMap::new();
        servers.insert(
            "fs".to_string(),
            json!({"command": "mcp-fs", "args": ["--root", "."], "env": {"TOKEN": "${ACPBRIDGE_TEST_VAR}"}}),
        );

        let converted = convert_mcp_servers(&servers);
        assert_eq!(converted.len(), 1);
        match &converted[0] {
            McpServer::Stdio(stdio) => {
                assert_eq!(stdio.name, "fs");
                assert_eq!(stdio.env[0].value, "secret");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn missing_env_var_expands_to_empty_string() {
        std::env::remove_var("ACPBRIDGE_TEST_MISSING");
        let mut servers = HashMap::new();
        servers.insert("fs".to_string(), json!({"command": "mcp-fs", "env": {"TOKEN": "${ACPBRIDGE_TEST_MISSING}"}}));

        let converted = convert_mcp_servers(&servers);
        match &converted[0] {
            McpServer::Stdio(stdio) => assert_eq!(stdio.env[0].value, ""),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn literal_env_value_passes_through() {
        let mut servers = HashMap::new();
        servers.insert("fs".to_string(), json!({"command": "mcp-fs", "env": {"MODE": "strict"}}));

        let converted = convert_mcp_servers(&servers);
        match &converted[0] {
            McpServer::Stdio(stdio) => assert_eq!(stdio.env[0].value, "strict"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
