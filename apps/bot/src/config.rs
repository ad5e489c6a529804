use std::{env::var, time::Duration};

use anyhow::{Context, Result};

const DEFAULT_OPENAI_BASE_URL: &str = assistant::DEFAULT_BASE_API;
const DEFAULT_OPENAI_MODEL: &str = assistant::DEFAULT_MODEL;
const DEFAULT_OPENAI_TEMPERATURE: f32 = assistant::DEFAULT_TEMPERATURE;
const DEFAULT_MARKET_DATA_BASE_URL: &str = stock::DEFAULT_BASE_API;

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    pub version: String,
    /// Chat API key. When unset `/stock ask` replies with a setup notice.
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub openai_temperature: f32,
    pub market_data_base_url: String,
    pub price_cache_ttl: Duration,
    /// Chat sessions unused for this long are dropped.
    pub session_idle: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| var(name).ok())
    }

    /// Builds the config from any name -> value source. Blank values count as
    /// unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let openai_temperature = match get("OPENAI_TEMPERATURE") {
            Some(v) => v
                .parse()
                .with_context(|| format!("OPENAI_TEMPERATURE is not a number: {v}"))?,
            None => DEFAULT_OPENAI_TEMPERATURE,
        };
        let ttl_secs = match get("PRICE_CACHE_TTL_SECS") {
            Some(v) => v
                .parse()
                .with_context(|| format!("PRICE_CACHE_TTL_SECS is not a number: {v}"))?,
            None => stock::DEFAULT_TTL.as_secs(),
        };
        let idle_secs = match get("SESSION_IDLE_SECS") {
            Some(v) => v
                .parse()
                .with_context(|| format!("SESSION_IDLE_SECS is not a number: {v}"))?,
            None => assistant::DEFAULT_IDLE.as_secs(),
        };

        Ok(Self {
            discord_token: get("DISCORD_TOKEN").context("DISCORD_TOKEN not set")?,
            version: get("APP_VERSION").unwrap_or_else(|| "Unknown".to_string()),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            openai_temperature,
            market_data_base_url: get("MARKET_DATA_BASE_URL")
                .unwrap_or_else(|| DEFAULT_MARKET_DATA_BASE_URL.to_string()),
            price_cache_ttl: Duration::from_secs(ttl_secs),
            session_idle: Duration::from_secs(idle_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[("DISCORD_TOKEN", "token")]).unwrap();

        assert_eq!(config.discord_token, "token");
        assert_eq!(config.version, "Unknown");
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert_eq!(config.openai_temperature, 0.7);
        assert_eq!(config.market_data_base_url, "https://query1.finance.yahoo.com");
        assert_eq!(config.price_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.session_idle, Duration::from_secs(3600));
    }

    #[test]
    fn overrides_and_blank_values() {
        let config = config(&[
            ("DISCORD_TOKEN", "token"),
            ("OPENAI_API_KEY", "  "),
            ("OPENAI_MODEL", "gpt-4o"),
            ("OPENAI_TEMPERATURE", "0.2"),
            ("PRICE_CACHE_TTL_SECS", "60"),
            ("SESSION_IDLE_SECS", "900"),
        ])
        .unwrap();

        assert!(config.openai_api_key.is_none());
        assert_eq!(config.openai_model, "gpt-4o");
        assert_eq!(config.openai_temperature, 0.2);
        assert_eq!(config.price_cache_ttl, Duration::from_secs(60));
        assert_eq!(config.session_idle, Duration::from_secs(900));
    }

    #[test]
    fn missing_token_is_an_error() {
        let err = config(&[]).err().unwrap();
        assert!(err.to_string().contains("DISCORD_TOKEN"));
    }

    #[test]
    fn bad_number_is_an_error() {
        assert!(config(&[("DISCORD_TOKEN", "t"), ("PRICE_CACHE_TTL_SECS", "soon")]).is_err());
    }
}
