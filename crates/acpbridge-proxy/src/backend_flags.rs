//! Backend-specific launch flag selection and model catalogue (spec §6.3).
//!
//! Grounded on `session_manager.py`'s `create_session` `if/elif` chain over
//! `self.backend_command`.

/// How a session's `model` should be delivered to a given backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelDelivery {
    /// Passed as a `--model` CLI flag at spawn time.
    Flags,
    /// Applied via the ACP `set_session_model` request after connecting.
    SetSessionModel,
}

/// Resolves the full argv (beyond the base `backend_args`) and the model
/// delivery mechanism for a given backend command name.
pub fn resolve_backend_args(backend_command: &str, backend_args: &[String], model: Option<&str>) -> (Vec<String>, ModelDelivery) {
    let mut args = backend_args.to_vec();

    match backend_command {
        "gemini" => {
            if !args.iter().any(|a| a == "--experimental-acp") {
                args.push("--experimental-acp".to_string());
            }
            if let Some(model) = model {
                if !args.iter().any(|a| a == "--model" || a == "-m") {
                    args.push("--model".to_string());
                    args.push(model.to_string());
                }
            }
            (args, ModelDelivery::Flags)
        }
        "copilot" => {
            if !args.iter().any(|a| a == "--acp") {
                args.push("--acp".to_string());
            }
            if let Some(model) = model {
                if !args.iter().any(|a| a == "--model") {
                    args.push("--model".to_string());
                    args.push(model.to_string());
                }
            }
            (args, ModelDelivery::Flags)
        }
        // "claude" | "claude-code" | "claude-code-acp" and anything else:
        // no additional flags, model applied via `set_session_model`.
        _ => (args, ModelDelivery::SetSessionModel),
    }
}

/// Static per-backend model catalogue for the CPP `models.list` method.
pub fn models_for_backend(backend_command: &str) -> Vec<&'static str> {
    match backend_command {
        "gemini" => vec!["gemini-2.0-flash", "gemini-1.5-pro"],
        "claude" | "claude-code" | "claude-code-acp" => vec!["claude-sonnet-4-20250514", "claude-opus-4-20250514"],
        _ => vec!["default"],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_gets_experimental_acp_and_model_flag() {
        let (args, delivery) = resolve_backend_args("gemini", &[], Some("gemini-1.5-pro"));
        assert_eq!(args, vec!["--experimental-acp", "--model", "gemini-1.5-pro"]);
        assert_eq!(delivery, ModelDelivery::Flags);
    }

    #[test]
    fn gemini_does_not_duplicate_existing_flag() {
        let (args, _) = resolve_backend_args("gemini", &["--experimental-acp".to_string()], None);
        assert_eq!(args, vec!["--experimental-acp"]);
    }

    #[test]
    fn copilot_gets_acp_flag() {
        let (args, delivery) = resolve_backend_args("copilot", &[], None);
        assert_eq!(args, vec!["--acp"]);
        assert_eq!(delivery, ModelDelivery::Flags);
    }

    #[test]
    fn claude_code_adds_no_flags_and_uses_set_session_model() {
        let (args, delivery) = resolve_backend_args("claude-code", &[], Some("claude-sonnet-4-20250514"));
        assert!(args.is_empty());
        assert_eq!(delivery, ModelDelivery::SetSessionModel);
    }

    #[test]
    fn models_list_is_static_per_backend() {
        assert_eq!(models_for_backend("gemini"), vec!["gemini-2.0-flash", "gemini-1.5-pro"]);
        assert_eq!(models_for_backend("unknown-backend"), vec!["default"]);
    }
}
