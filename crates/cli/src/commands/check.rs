//! `countbot check` — Dry-run a command through the safety guard.

use countbot_tools::command_guard;

use super::{load_config, workspace_scope};

pub async fn run(command: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let guard = command_guard(&config)?;
    let root = workspace_scope(&config)?.canonical_root();

    match guard.check(command, &root, &root) {
        Ok(()) => println!("✅ Allowed: {command}"),
        Err(rejection) => {
            println!("❌ {rejection}");
            return Err("Command rejected".into());
        }
    }
    Ok(())
}
