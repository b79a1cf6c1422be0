//! Auto-allow rules and the three-option permission request (spec §4.D).
//!
//! Grounded on `agent.py`'s `_create_permission_handler`.

/// Tool names that `acceptEdits` mode auto-allows.
const AUTO_ALLOW_ON_ACCEPT_EDITS: &[&str] = &["Write", "Edit", "MultiEdit"];

/// Whether `tool_name` should be auto-allowed under `permission_mode`
/// without consulting the ACP client.
pub fn auto_allow(permission_mode: &str, tool_name: &str) -> bool {
    permission_mode == "bypassPermissions"
        || (permission_mode == "acceptEdits" && AUTO_ALLOW_ON_ACCEPT_EDITS.contains(&tool_name))
}

/// The three permission options offered when a decision must be forwarded
/// to the ACP client (spec §4.D: `{allow_always, allow_once, reject_once}`).
pub struct PermissionOptionSpec {
    pub id: &'static str,
    pub name: &'static str,
}

pub const PERMISSION_OPTIONS: &[PermissionOptionSpec] = &[
    PermissionOptionSpec { id: "allow_always", name: "Always Allow" },
    PermissionOptionSpec { id: "allow", name: "Allow" },
    PermissionOptionSpec { id: "reject", name: "Reject" },
];

/// Translates a selected option id into an allow/deny decision.
pub fn decide(selected_option_id: &str) -> bool {
    matches!(selected_option_id, "allow" | "allow_always")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bypass_permissions_always_auto_allows() {
        assert!(auto_allow("bypassPermissions", "Bash"));
        assert!(auto_allow("bypassPermissions", "Write"));
    }

    #[test]
    fn accept_edits_only_auto_allows_edit_tools() {
        assert!(auto_allow("acceptEdits", "Write"));
        assert!(auto_allow("acceptEdits", "Edit"));
        assert!(auto_allow("acceptEdits", "MultiEdit"));
        assert!(!auto_allow("acceptEdits", "Bash"));
    }

    #[test]
    fn default_mode_never_auto_allows() {
        assert!(!auto_allow("default", "Write"));
    }

    #[test]
    fn decide_allows_only_allow_variants() {
        assert!(decide("allow"));
        assert!(decide("allow_always"));
        assert!(!decide("reject"));
        assert!(!decide("anything_else"));
    }
}
