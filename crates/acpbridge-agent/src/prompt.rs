//! Prompt-block flattening and tool-title derivation (spec §4.D).
//!
//! Grounded on `agent.py`'s `_convert_prompt_to_text` and `_get_tool_title`.

use agent_client_protocol::ContentBlock;
use serde_json::Value;

/// Flattens an ACP prompt's content blocks into a single text string for
/// the embedded assistant, joining parts with newlines.
pub fn flatten_prompt(blocks: &[ContentBlock]) -> String {
    let mut parts = Vec::with_capacity(blocks.len());
    for block in blocks {
        match block {
            ContentBlock::Text(text) => parts.push(text.text.clone()),
            ContentBlock::Resource(resource) => {
                if let agent_client_protocol::EmbeddedResourceResource::TextResourceContents(text_res) =
                    &resource.resource
                {
                    parts.push(format!(
                        "\n<context ref=\"{}\">\n{}\n</context>",
                        text_res.uri, text_res.text
                    ));
                }
            }
            ContentBlock::ResourceLink(link) => {
                let name = link
                    .name
                    .clone()
                    .unwrap_or_else(|| link.uri.rsplit('/').next().unwrap_or(&link.uri).to_string());
                parts.push(format!("[@{}]({})", name, link.uri));
            }
            ContentBlock::Image(_) | ContentBlock::Audio(_) => {}
        }
    }
    parts.join("\n")
}

/// Derives a human-readable tool-call title by a fixed rule per known tool
/// name (spec §4.D).
pub fn tool_title(tool_name: &str, tool_input: &Value) -> String {
    let field = |key: &str| tool_input.get(key).and_then(Value::as_str).unwrap_or("");

    match tool_name {
        "Read" => {
            let path = if tool_input.get("file_path").is_some() { field("file_path") } else { field("path") };
            format!("Read {path}")
        }
        "Write" | "Edit" => {
            let path = if tool_input.get("file_path").is_some() { field("file_path") } else { field("path") };
            format!("{tool_name} {path}")
        }
        "Bash" => {
            let cmd = field("command");
            if cmd.chars().count() > 50 {
                let truncated: String = cmd.chars().take(50).collect();
                format!("Run: {truncated}…")
            } else {
                format!("Run: {cmd}")
            }
        }
        "Glob" => format!("Find files: {}", field("pattern")),
        "Grep" => format!("Search: {}", field("pattern")),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flatten_joins_text_blocks() {
        let blocks = vec![
            ContentBlock::Text(agent_client_protocol::TextContent {
                text: "hello".into(),
                annotations: None,
                meta: None,
            }),
            ContentBlock::Text(agent_client_protocol::TextContent {
                text: "world".into(),
                annotations: None,
                meta: None,
            }),
        ];
        assert_eq!(flatten_prompt(&blocks), "hello\nworld");
    }

    #[test]
    fn tool_title_read_uses_file_path() {
        assert_eq!(tool_title("Read", &json!({"file_path": "src/lib.rs"})), "Read src/lib.rs");
    }

    #[test]
    fn tool_title_bash_truncates_long_commands() {
        let cmd = "x".repeat(60);
        let title = tool_title("Bash", &json!({"command": cmd}));
        assert!(title.starts_with("Run: "));
        assert!(title.ends_with('…'));
    }

    #[test]
    fn tool_title_bash_keeps_short_commands_verbatim() {
        assert_eq!(tool_title("Bash", &json!({"command": "ls"})), "Run: ls");
    }

    #[test]
    fn tool_title_unknown_tool_falls_back_to_name() {
        assert_eq!(tool_title("CustomTool", &json!({})), "CustomTool");
    }
}
