//! Server configuration types

use modelmux_core::CoordinatorConfig;
use modelmux_llm::util::mask_api_key;
use serde::{Deserialize, Serialize};

/// Application configuration
///
/// `cache`, `routing`, `context` and `providers` sit at the top level next
/// to `server`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(flatten)]
    pub coordinator: CoordinatorConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8090
}

impl AppConfig {
    /// Effective configuration with credential state instead of secrets
    pub fn masked_view(&self) -> serde_json::Value {
        let mut view = serde_json::to_value(self).unwrap_or_default();

        if let Some(providers) = view.get_mut("providers").and_then(|p| p.as_array_mut()) {
            for (value, descriptor) in providers.iter_mut().zip(&self.coordinator.providers) {
                let credential = match descriptor.resolve_api_key() {
                    Ok(Some(key)) => mask_api_key(&key),
                    Ok(None) => "none".to_string(),
                    Err(_) => "missing".to_string(),
                };
                if let Some(obj) = value.as_object_mut() {
                    obj.insert("credential".to_string(), serde_json::Value::String(credential));
                }
            }
        }
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::loader::DEFAULT_CONFIG;

    #[test]
    fn test_embedded_default_parses() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.server.port, 8090);
        assert!(!config.coordinator.providers.is_empty());
        assert!(config.coordinator.validate().is_ok());
    }

    #[test]
    fn test_masked_view_has_no_secrets() {
        let mut config = AppConfig::default();
        config.coordinator.providers = vec![modelmux_llm::ProviderDescriptor::new(
            "test",
            "http://localhost:1/v1",
            "m",
            100,
        )
        .with_credential_ref("MODELMUX_TEST_MASKED_KEY")];
        std::env::set_var("MODELMUX_TEST_MASKED_KEY", "sk-abcdefghijklmnopqrstuvwxyz");

        let view = config.masked_view();
        let rendered = view.to_string();
        assert!(!rendered.contains("abcdefghijklmnop"));
        assert_eq!(view["providers"][0]["auth_credential_ref"], "MODELMUX_TEST_MASKED_KEY");
        assert_ne!(view["providers"][0]["credential"], "missing");
    }
}
