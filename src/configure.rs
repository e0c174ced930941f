use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub log_level: String,
    pub log_to_file: bool,
    pub log_file: String,
    pub listen_addr: String,
    pub merchant_id: String,
    pub merchant_secret: String,
    pub gateway_base_url: String,
    pub gateway_timeout_secs: u64,
    pub return_url: String,
}

pub fn load_config() -> Result<AppConfig, ConfigError> {
    let s = Config::builder()
        // Set defaults
        .set_default("log_level", "info")?
        .set_default("log_to_file", false)?
        .set_default("log_file", "log/paygate.log")?
        .set_default("listen_addr", "0.0.0.0:8080")?
        .set_default("merchant_id", "demo_merchant_123")?
        .set_default("merchant_secret", "demo_secret_key_456")?
        .set_default("gateway_base_url", "https://www.gamepay.tech")?
        .set_default("gateway_timeout_secs", 10)?
        .set_default("return_url", "https://example.com/return")?
        // Add configuration from a file
        .add_source(File::with_name("config/config.yaml").required(false))
        // Add configuration from environment variables
        .add_source(config::Environment::with_prefix("PAYGATE"))
        .build()?;

    s.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_load() {
        let cfg = load_config().expect("defaults should load without a file");
        assert_eq!(cfg.log_level, "info");
        assert!(!cfg.merchant_id.is_empty());
        assert!(cfg.gateway_timeout_secs > 0);
    }
}
