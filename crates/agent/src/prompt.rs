//! System prompt assembly.
//!
//! The prompt sent on every reasoning step is the caller's system
//! instruction, a generated registry of the available tools, and the
//! response-format rules the parser understands.

use ironhive_core::tool::ToolDescriptor;

/// Response-format rules appended to every system prompt.
pub const REACT_FORMAT_SUFFIX: &str = r#"When you need a tool, respond with exactly:

Thought: <why you need the tool>
Action: {"tool": "<tool_name>", "parameters": {<JSON arguments>}}

Then stop and wait for the observation. When you can answer, respond with exactly:

Final Answer: <your answer>

Rules:
- Use only tools listed in the AVAILABLE TOOLS registry, with the parameters they declare.
- One action per response. Never write an observation yourself; the system provides it.
- Never invent tool results. If a tool failed, report the error it returned.
- Plain text only, no markdown styling around the markers."#;

/// Render the tool registry section shown to the model.
pub fn render_tools_section(tools: &[ToolDescriptor]) -> String {
    if tools.is_empty() {
        return "No tools are available. Answer directly.".to_string();
    }

    let mut sections = Vec::with_capacity(tools.len());
    for tool in tools {
        let mut md = format!("### `{}`\n{}", tool.name, tool.description);

        if let Some(properties) = tool.parameters.get("properties").and_then(|p| p.as_object()) {
            if !properties.is_empty() {
                md.push_str("\n\n**Parameters:**\n");
                md.push_str("| Name | Type | Description |\n");
                md.push_str("|------|------|-------------|\n");
                for (name, info) in properties {
                    let type_name = info.get("type").and_then(|t| t.as_str()).unwrap_or("any");
                    let description = info
                        .get("description")
                        .and_then(|d| d.as_str())
                        .unwrap_or("No description");
                    md.push_str(&format!("| `{name}` | `{type_name}` | {description} |\n"));
                }
            }
        }

        sections.push(md);
    }

    sections.join("\n\n")
}

/// Assemble the full system prompt for an episode.
pub fn build_system_prompt(system_instruction: &str, tools: &[ToolDescriptor]) -> String {
    let instruction = if system_instruction.trim().is_empty() {
        "You are a helpful assistant that solves tasks step by step."
    } else {
        system_instruction
    };

    format!(
        "{}\n\n[AVAILABLE TOOLS]\n\n{}\n\n{}",
        instruction.trim_end(),
        render_tools_section(tools),
        REACT_FORMAT_SUFFIX
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironhive_core::tool::ProviderKind;

    fn descriptor() -> ToolDescriptor {
        ToolDescriptor {
            name: "add".into(),
            description: "Add two integers".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "a": { "type": "integer", "description": "First addend" },
                    "b": { "type": "integer", "description": "Second addend" }
                },
                "required": ["a", "b"]
            }),
            provider: ProviderKind::Local,
        }
    }

    #[test]
    fn tools_section_contains_parameter_table() {
        let section = render_tools_section(&[descriptor()]);
        assert!(section.contains("### `add`"));
        assert!(section.contains("| `a` | `integer` | First addend |"));
    }

    #[test]
    fn empty_catalog_says_so() {
        let section = render_tools_section(&[]);
        assert!(section.contains("No tools"));
    }

    #[test]
    fn full_prompt_has_all_sections() {
        let prompt = build_system_prompt("You can call `add`.", &[descriptor()]);
        assert!(prompt.starts_with("You can call `add`."));
        assert!(prompt.contains("[AVAILABLE TOOLS]"));
        assert!(prompt.contains("Final Answer:"));
    }

    #[test]
    fn blank_instruction_gets_a_default() {
        let prompt = build_system_prompt("  ", &[]);
        assert!(prompt.contains("helpful assistant"));
    }
}
