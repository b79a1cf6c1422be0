//! Flag definitions (spec §6.5), mirroring `crucible_cli::cli::Cli`'s flat
//! `#[arg(long)]` struct with a `ValueEnum` for the log-level choice.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Log level names accepted on the CLI, matching the original proxy's own
/// vocabulary rather than `tracing`'s (spec §6.5/§10.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    None,
    Error,
    Warning,
    Info,
    Debug,
    All,
}

impl LogLevel {
    /// Maps onto a `tracing` level name; `None` has no `tracing::Level`
    /// equivalent and is handled by installing no subscriber at all.
    pub fn as_env_filter_directive(self) -> Option<&'static str> {
        match self {
            LogLevel::None => None,
            LogLevel::Error => Some("error"),
            LogLevel::Warning => Some("warn"),
            LogLevel::Info => Some("info"),
            LogLevel::Debug => Some("debug"),
            LogLevel::All => Some("trace"),
        }
    }
}

/// Accepts the same flags as the original proxy's CLI (spec §6.5), so it can
/// be dropped into an existing launch configuration unchanged.
#[derive(Parser, Debug)]
#[command(name = "acpbridge")]
#[command(about = "A protocol bridge and multiplexer for interactive coding-assistant agents")]
#[command(version)]
pub struct Cli {
    /// Accepted for Copilot SDK compatibility; proxy mode is always headless.
    #[arg(long)]
    pub headless: bool,

    /// Selects proxy mode (component F over stdio, driving E/B).
    #[arg(long)]
    pub server: bool,

    /// Selects agent mode: this process becomes the ACP agent (component D).
    #[arg(long)]
    pub stdio: bool,

    /// TCP port for server mode; not yet supported, any value > 0 is fatal.
    #[arg(long, default_value_t = 0)]
    pub port: u16,

    /// Log level; falls back to `ACP_PROXY_LOG_LEVEL` then `warning` if unset.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Environment variable name to read an auth token from (accepted, unused).
    #[arg(long, default_value = "")]
    pub auth_token_env: String,

    /// Disables auto-login (accepted, unused).
    #[arg(long)]
    pub no_auto_login: bool,

    /// Backend ACP server to connect to in proxy mode (gemini, claude-code-acp, copilot, …).
    #[arg(long)]
    pub backend: Option<String>,

    /// Additional arguments forwarded to the backend CLI.
    #[arg(long, num_args = 0.., value_name = "ARG")]
    pub backend_args: Vec<String>,

    /// Working directory; defaults to the process's current directory.
    #[arg(long)]
    pub cwd: Option<PathBuf>,
}

/// The run mode this invocation resolves to (spec §6.5: "Exactly one of
/// `--stdio` or `--server`/`--headless` is required").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Agent,
    Proxy,
}

impl Cli {
    pub fn run_mode(&self) -> Result<RunMode, String> {
        let wants_proxy = self.server || self.headless;
        match (self.stdio, wants_proxy) {
            (true, false) => Ok(RunMode::Agent),
            (false, true) => Ok(RunMode::Proxy),
            (false, false) => Err("one of --stdio or --server/--headless is required".into()),
            (true, true) => Err("--stdio is mutually exclusive with --server/--headless".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdio_alone_resolves_to_agent_mode() {
        let cli = Cli::try_parse_from(["acpbridge", "--stdio"]).unwrap();
        assert_eq!(cli.run_mode(), Ok(RunMode::Agent));
    }

    #[test]
    fn server_alone_resolves_to_proxy_mode() {
        let cli = Cli::try_parse_from(["acpbridge", "--server", "--backend", "gemini"]).unwrap();
        assert_eq!(cli.run_mode(), Ok(RunMode::Proxy));
    }

    #[test]
    fn headless_alone_also_resolves_to_proxy_mode() {
        let cli = Cli::try_parse_from(["acpbridge", "--headless"]).unwrap();
        assert_eq!(cli.run_mode(), Ok(RunMode::Proxy));
    }

    #[test]
    fn neither_flag_is_an_error() {
        let cli = Cli::try_parse_from(["acpbridge"]).unwrap();
        assert!(cli.run_mode().is_err());
    }

    #[test]
    fn both_flags_is_an_error() {
        let cli = Cli::try_parse_from(["acpbridge", "--stdio", "--server"]).unwrap();
        assert!(cli.run_mode().is_err());
    }

    #[test]
    fn backend_args_parses_multiple_values() {
        let cli = Cli::try_parse_from(["acpbridge", "--server", "--backend-args", "--foo", "bar"]).unwrap();
        assert_eq!(cli.backend_args, vec!["--foo".to_string(), "bar".to_string()]);
    }
}
