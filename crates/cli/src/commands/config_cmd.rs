//! `countbot config` — Configuration management commands.

use countbot_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();

            if !config.security.restrict_to_workspace {
                warnings.push("restrict_to_workspace is off: tools can touch any path");
            }

            if !config.security.dangerous_commands_blocked {
                warnings.push("dangerous_commands_blocked is off: destructive commands will run");
            }

            if config.security.command_whitelist_enabled && config.security.custom_allow_patterns.is_empty() {
                warnings.push("Command whitelist enabled with no patterns: every command is rejected");
            }

            if let Err(e) = countbot_tools::command_guard(&config) {
                println!("   ❌ {e}");
                return Err(e.into());
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Model:      {}", config.model.model);
            println!("   Iterations: {}", config.model.max_iterations);
            println!("   Retries:    {}", config.model.max_retries);
            println!("   Workspace:  {}", config.workspace_dir().display());
            println!(
                "   Web search: {}",
                if config.tools.web_search_api_key.is_some() { "configured" } else { "no API key" }
            );
            println!(
                "   Audit log:  {}",
                if config.security.audit_log_enabled {
                    config.audit_log_dir().display().to_string()
                } else {
                    "disabled".to_string()
                }
            );
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    mask_secrets(&mut config);
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn mask_secrets(config: &mut AppConfig) {
    if let Some(key) = config.tools.web_search_api_key.as_mut() {
        *key = "***".into();
    }
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn config_path_is_valid() {
        let path = countbot_config::AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains(".countbot"));
    }

    #[test]
    fn default_config_serializes_to_toml() {
        let toml_str = toml::to_string_pretty(&countbot_config::AppConfig::default()).unwrap();
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[security]"));
    }

    #[test]
    fn shown_config_hides_search_key() {
        let mut config = countbot_config::AppConfig::default();
        config.tools.web_search_api_key = Some("real-token".into());
        super::mask_secrets(&mut config);
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(!toml_str.contains("real-token"));
        assert!(toml_str.contains("web_search_api_key = \"***\""));
    }
}
