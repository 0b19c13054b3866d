//! `modelmux check` - configuration diagnostics

use crate::server::config::AppConfig;
use modelmux_llm::util::mask_api_key;

pub fn run() -> anyhow::Result<()> {
    println!("modelmux check\n");

    let config = crate::server::load_config()?;
    println!("Configuration... ✅ valid");

    let all_ok = check_providers(&config);

    println!("\nEffective configuration:");
    println!("{}", serde_json::to_string_pretty(&config.masked_view())?);

    println!();
    if all_ok {
        println!("✅ All providers have credentials.");
    } else {
        println!("⚠️  Some providers have no credentials and will be reported unreachable.");
    }
    Ok(())
}

fn check_providers(config: &AppConfig) -> bool {
    let mut all_ok = true;
    for provider in &config.coordinator.providers {
        print!("Provider {:<12} ", provider.name);
        match (provider.resolve_api_key(), &provider.auth_credential_ref) {
            (Ok(Some(key)), Some(var)) => println!("✅ {var} = {}", mask_api_key(&key)),
            (Ok(_), _) => println!("✅ no credential required"),
            (Err(_), var) => {
                all_ok = false;
                println!("❌ {} not set", var.as_deref().unwrap_or("credential"));
            }
        }
    }
    all_ok
}
