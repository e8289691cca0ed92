//! Echo tool — returns its input. Handy for wiring checks and demos.

use async_trait::async_trait;
use countbot_core::error::ToolError;
use countbot_core::schema::ParameterSchema;
use countbot_core::tool::Tool;

pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo back the given message. Useful for testing tool calling."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::object()
            .required_property(
                "message",
                ParameterSchema::string().describe("The message to echo back"),
            )
            .property(
                "uppercase",
                ParameterSchema::boolean().describe("Convert the message to uppercase (default: false)"),
            )
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let message = arguments["message"].as_str().unwrap_or_default();
        let uppercase = arguments["uppercase"].as_bool().unwrap_or(false);

        let text = if uppercase {
            message.to_uppercase()
        } else {
            message.to_string()
        };
        Ok(format!("Echo: {text}"))
    }
}
