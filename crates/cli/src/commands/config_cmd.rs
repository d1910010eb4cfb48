//! `voxturn config` — Configuration management commands.

use voxturn_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ok  Config parsed and validated");

            let mut warnings = Vec::new();

            if !config.has_api_key() {
                warnings.push("No API key set (set VOXTURN_API_KEY or OPENAI_API_KEY)".to_string());
            }

            if config.handoff.delay_ms == 0 {
                warnings.push("handoff.delay_ms is 0; endSession fires immediately".to_string());
            }

            if !config.turn.buffer_trailing_fragment {
                warnings.push(
                    "turn.buffer_trailing_fragment is off; the final segment will be empty".to_string(),
                );
            }

            if warnings.is_empty() {
                println!("   ok  All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   warn  {w}");
                }
            }

            println!();
            println!("   Endpoint:  {}", config.api_url);
            println!("   Model:     {}", config.model);
            println!("   Handoff:   {} after {} ms", config.handoff.function_name, config.handoff.delay_ms);
            println!(
                "   Augment:   {}",
                config.augment.phone_number_functions.join(", ")
            );
        }
        Err(e) => {
            println!("   error  {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if config.api_key.is_some() {
        config.api_key = Some("***".into());
    }
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config_path().display());
    Ok(())
}

pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path();
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }
    std::fs::create_dir_all(AppConfig::config_dir())?;
    std::fs::write(&path, AppConfig::default_toml())?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

fn config_path() -> std::path::PathBuf {
    AppConfig::config_dir().join("config.toml")
}
