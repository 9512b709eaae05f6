//! Action grammar parser.
//!
//! The model is instructed to answer in one of two forms per step:
//!
//! ```text
//! Thought: <reasoning>
//! Action: {"tool": "<name>", "parameters": { ... }}
//! ```
//!
//! or
//!
//! ```text
//! Final Answer: <answer>
//! ```
//!
//! The parser also accepts the XML variant
//! (`<tool_call><tool_name>..</tool_name><parameters>..</parameters></tool_call>`,
//! `<final_answer>..</final_answer>`) and JSON wrapped in code fences.
//!
//! Tie-breaks: a final answer always wins over a tool call, and only the
//! first tool call in an output is used. Output that carries an action
//! marker but cannot be parsed is an error; output with no recognizable
//! marker at all is treated as a direct answer.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ParseError(pub String);

/// What one model output resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedAction {
    /// The episode's final answer
    FinalAnswer(String),
    /// A tool invocation request
    ToolUse {
        name: String,
        arguments: serde_json::Value,
    },
}

/// Parse one model output into a final answer or a tool call.
pub fn parse_output(output: &str) -> Result<ParsedAction, ParseError> {
    let text = output.trim();

    // Final answer wins over everything else.
    if let Some(answer) = extract_xml_final_answer(text) {
        return Ok(ParsedAction::FinalAnswer(answer));
    }
    if let Some(answer) = extract_marker_final_answer(text) {
        return Ok(ParsedAction::FinalAnswer(answer));
    }

    // Textual form: Action: {json}
    if let Some(idx) = find_case_insensitive(text, "action:") {
        let tail = &text[idx + "action:".len()..];
        return parse_action_json(tail);
    }

    // XML form: <tool_call>...</tool_call>
    if let Some(start) = text.find("<tool_call>") {
        let inner = match text[start..].find("</tool_call>") {
            Some(end) => &text[start + "<tool_call>".len()..start + end],
            None => &text[start + "<tool_call>".len()..],
        };
        return parse_xml_tool_call(inner);
    }

    // Bare or fenced JSON object that looks like a tool call.
    if let Some(json) = extract_json_object(text) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&sanitize_json(&json)) {
            if value.get("tool").and_then(|t| t.as_str()).is_some() {
                return tool_use_from_value(value);
            }
        }
    }

    // No markers at all: the whole output is the answer.
    Ok(ParsedAction::FinalAnswer(text.to_string()))
}

fn extract_xml_final_answer(text: &str) -> Option<String> {
    let start = text.find("<final_answer>")?;
    let body = &text[start + "<final_answer>".len()..];
    let answer = match body.find("</final_answer>") {
        Some(end) => &body[..end],
        None => body,
    };
    Some(answer.trim().to_string())
}

fn extract_marker_final_answer(text: &str) -> Option<String> {
    let idx = rfind_case_insensitive(text, "final answer:")?;
    Some(text[idx + "final answer:".len()..].trim().to_string())
}

// ASCII-needle search that returns byte offsets valid in the original
// string even when the surrounding text is non-ASCII.
fn find_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

fn rfind_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .rposition(|window| window.eq_ignore_ascii_case(needle))
}

/// Parse the JSON object following an `Action:` marker.
fn parse_action_json(tail: &str) -> Result<ParsedAction, ParseError> {
    let json = extract_json_object(tail)
        .ok_or_else(|| ParseError("no JSON object found after 'Action:'".into()))?;
    let value: serde_json::Value = serde_json::from_str(&sanitize_json(&json))
        .map_err(|e| ParseError(format!("invalid action JSON: {e}")))?;
    tool_use_from_value(value)
}

fn tool_use_from_value(value: serde_json::Value) -> Result<ParsedAction, ParseError> {
    let name = value
        .get("tool")
        .and_then(|t| t.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ParseError("action JSON has no 'tool' field".into()))?
        .to_string();

    let arguments = value
        .get("parameters")
        .or_else(|| value.get("arguments"))
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}));

    Ok(ParsedAction::ToolUse { name, arguments })
}

/// Extract the first balanced JSON object from the text, skipping an
/// optional ```json code fence. Brace counting is string-aware.
fn extract_json_object(text: &str) -> Option<String> {
    let text = match text.find("```json") {
        Some(fence) => {
            let body = &text[fence + 7..];
            match body.find("```") {
                Some(end) => &body[..end],
                None => body,
            }
        }
        None => text,
    };

    let start = text.find('{')?;
    let bytes = text[start..].char_indices();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in bytes {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + i + c.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Remove trailing commas before closing brackets, a common model quirk.
fn sanitize_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;
    let chars: Vec<char> = json.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            out.push(c);
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                // Drop the comma if the next non-whitespace closes a scope.
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Parse the inner body of a `<tool_call>` element.
fn parse_xml_tool_call(inner: &str) -> Result<ParsedAction, ParseError> {
    let name = extract_xml_element(inner, "tool_name")
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ParseError("tool_call has no tool_name".into()))?;

    let arguments = match extract_xml_element(inner, "parameters") {
        Some(body) => {
            let body = body.trim();
            if body.starts_with('{') {
                serde_json::from_str(&sanitize_json(body))
                    .map_err(|e| ParseError(format!("invalid parameters JSON: {e}")))?
            } else {
                parse_xml_parameters(body)
            }
        }
        None => serde_json::json!({}),
    };

    Ok(ParsedAction::ToolUse { name, arguments })
}

fn extract_xml_element(text: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = text.find(&open)? + open.len();
    let end = text[start..].find(&close)? + start;
    Some(text[start..end].to_string())
}

/// Turn `<key>value</key>` children into a JSON object. Values that look
/// like numbers or booleans are typed accordingly.
fn parse_xml_parameters(body: &str) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    let mut rest = body;

    while let Some(open_start) = rest.find('<') {
        let Some(open_end) = rest[open_start..].find('>') else {
            break;
        };
        let key = rest[open_start + 1..open_start + open_end].to_string();
        if key.starts_with('/') || key.is_empty() {
            rest = &rest[open_start + open_end + 1..];
            continue;
        }
        let close = format!("</{key}>");
        let value_start = open_start + open_end + 1;
        let Some(close_start) = rest[value_start..].find(&close) else {
            break;
        };
        let raw = rest[value_start..value_start + close_start].trim();
        map.insert(key.clone(), type_xml_value(raw));
        rest = &rest[value_start + close_start + close.len()..];
    }

    serde_json::Value::Object(map)
}

fn type_xml_value(raw: &str) -> serde_json::Value {
    if let Ok(n) = raw.parse::<i64>() {
        return serde_json::json!(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return serde_json::json!(f);
    }
    match raw {
        "true" => serde_json::json!(true),
        "false" => serde_json::json!(false),
        _ => serde_json::json!(raw),
    }
}
