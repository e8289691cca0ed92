//! `countbot onboard` — First-time setup.

use countbot_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("🤖 CountBot — First-Time Setup");
    println!("==============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
    }

    // Honour an existing config (or env override) when placing the workspace
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let workspace_dir = config.workspace_dir();
    if !workspace_dir.exists() {
        std::fs::create_dir_all(&workspace_dir)?;
        println!("✅ Created workspace directory: {}", workspace_dir.display());
    } else {
        println!("  Workspace directory exists: {}", workspace_dir.display());
    }

    println!("\n📝 Next steps:");
    println!("   1. Review {}", config_path.display());
    println!("   2. Run: countbot tools");
    println!("   3. Try: countbot check \"ls -la\"\n");

    Ok(())
}
