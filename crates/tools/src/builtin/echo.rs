//! Echo tool — returns its input, handy for wiring checks.

use async_trait::async_trait;
use ironhive_core::error::ToolError;
use ironhive_core::tool::Tool;

pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo back the given text."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "The text to echo back" }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let text = arguments["text"]
            .as_str()
            .ok_or_else(|| ToolError::BadArguments {
                tool: "echo".into(),
                reason: "missing 'text' argument".into(),
            })?;
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_text() {
        let tool = EchoTool;
        let output = tool
            .execute(serde_json::json!({"text": "hello"}))
            .await
            .unwrap();
        assert_eq!(output, "hello");
    }

    #[tokio::test]
    async fn missing_text_is_an_error() {
        let tool = EchoTool;
        assert!(tool.execute(serde_json::json!({})).await.is_err());
    }
}
