//! `countbot run` — Execute one tool call outside the agent loop.

use countbot_tools::default_registry;
use serde_json::Value;

use super::{audit_sink, load_config, workspace_scope};

pub async fn run(tool: &str, args: &str) -> Result<(), Box<dyn std::error::Error>> {
    let arguments: Value =
        serde_json::from_str(args).map_err(|e| format!("--args must be valid JSON: {e}"))?;

    let config = load_config()?;
    let registry = default_registry(&config, workspace_scope(&config)?, Some(audit_sink(&config)))?;
    registry.set_session("cli:run");
    registry.set_channel("cli");

    let outcome = registry.execute(tool, arguments).await;
    println!("{}", outcome.render());
    if !outcome.is_ok() {
        return Err(format!("Tool '{tool}' did not succeed").into());
    }
    Ok(())
}
