//! `countbot tools` — List the builtin tools.

use countbot_tools::default_registry;

use super::{load_config, workspace_scope};

pub async fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let registry = default_registry(&config, workspace_scope(&config)?, None)?;
    let definitions = registry.definitions();

    if json {
        println!("{}", serde_json::to_string_pretty(&definitions)?);
        return Ok(());
    }

    println!("🔧 {} tools available\n", definitions.len());
    for def in &definitions {
        println!("  {:<12} {}", def.name, def.description);
    }
    Ok(())
}
