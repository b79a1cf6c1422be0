//! Resolves the final run configuration by layering CLI flag > environment
//! variable (spec §6.6) > built-in default, mirroring
//! `crucible_cli::config::CliConfig::load`'s precedence.

use std::path::PathBuf;

use crate::cli::{Cli, LogLevel};

const DEFAULT_BACKEND: &str = "gemini";

/// Resolves the effective log level: CLI flag, else `ACP_PROXY_LOG_LEVEL`,
/// else `warning`.
pub fn resolve_log_level(cli: &Cli) -> LogLevel {
    if let Some(level) = cli.log_level {
        return level;
    }
    match std::env::var("ACP_PROXY_LOG_LEVEL").ok().as_deref() {
        Some("none") => LogLevel::None,
        Some("error") => LogLevel::Error,
        Some("warning") => LogLevel::Warning,
        Some("info") => LogLevel::Info,
        Some("debug") => LogLevel::Debug,
        Some("all") => LogLevel::All,
        _ => LogLevel::Warning,
    }
}

/// Launch configuration for proxy mode (component F + the backend subprocess).
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub backend: String,
    pub backend_args: Vec<String>,
    pub cwd: PathBuf,
}

impl ProxyConfig {
    pub fn resolve(cli: &Cli) -> Self {
        let backend = cli
            .backend
            .clone()
            .or_else(|| std::env::var("ACP_PROXY_BACKEND").ok())
            .unwrap_or_else(|| DEFAULT_BACKEND.to_string());
        let cwd = cli
            .cwd
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        Self {
            backend,
            backend_args: cli.backend_args.clone(),
            cwd,
        }
    }
}

/// Launch configuration for agent mode (component D, no backend subprocess —
/// this process is itself the embedded assistant's ACP front door).
#[derive(Debug, Clone)]
pub struct AgentModeConfig {
    pub cwd: PathBuf,
}

impl AgentModeConfig {
    pub fn resolve(cli: &Cli) -> Self {
        let cwd = cli
            .cwd
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        Self { cwd }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn backend_defaults_to_gemini_with_no_flag_or_env() {
        std::env::remove_var("ACP_PROXY_BACKEND");
        let cli = Cli::try_parse_from(["acpbridge", "--server"]).unwrap();
        assert_eq!(ProxyConfig::resolve(&cli).backend, "gemini");
    }

    #[test]
    fn backend_flag_overrides_default() {
        let cli = Cli::try_parse_from(["acpbridge", "--server", "--backend", "copilot"]).unwrap();
        assert_eq!(ProxyConfig::resolve(&cli).backend, "copilot");
    }

    #[test]
    fn log_level_defaults_to_warning() {
        std::env::remove_var("ACP_PROXY_LOG_LEVEL");
        let cli = Cli::try_parse_from(["acpbridge", "--stdio"]).unwrap();
        assert!(matches!(resolve_log_level(&cli), LogLevel::Warning));
    }

    #[test]
    fn log_level_flag_overrides_env() {
        std::env::set_var("ACP_PROXY_LOG_LEVEL", "debug");
        let cli = Cli::try_parse_from(["acpbridge", "--stdio", "--log-level", "error"]).unwrap();
        assert!(matches!(resolve_log_level(&cli), LogLevel::Error));
        std::env::remove_var("ACP_PROXY_LOG_LEVEL");
    }
}
