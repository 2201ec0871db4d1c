//! `nippo serve`: Start the HTTP gateway.

use nippo_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Nippo Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.default_model);
    println!(
        "   GitHub:    {}",
        if config.github.token.is_some() { "token set" } else { "no token (collection disabled)" }
    );

    nippo_gateway::start(config).await?;

    Ok(())
}
