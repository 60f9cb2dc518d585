//! Environment-driven configuration
//!
//! Every knob comes from the environment with a workable local default, so
//! the backend starts against a stock mosquitto + TimescaleDB compose setup
//! with no configuration at all.

use tracing::trace;

/// Full backend configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub db: DbConfig,
    pub llm: LlmConfig,
    /// HTTP API port.
    pub api_port: u16,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker: String,
    pub port: u16,
    pub raw_topic: String,
    pub vitals_topic: String,
    pub alerts_topic: String,
    pub config_topic: String,
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
}

impl Config {
    /// Read configuration from the environment.
    ///
    /// Unparseable numeric values fall back to their defaults rather than
    /// failing startup.
    pub fn from_env() -> Self {
        let config = Self {
            mqtt: MqttConfig {
                broker: env_or("MQTT_BROKER", "localhost"),
                port: env_parse_or("MQTT_PORT", 1883),
                raw_topic: env_or("MQTT_RAW_TOPIC", "health/raw_vitals"),
                vitals_topic: env_or("MQTT_VITALS_TOPIC", "health/vitals"),
                alerts_topic: env_or("MQTT_ALERTS_TOPIC", "health/alerts"),
                config_topic: env_or("MQTT_CONFIG_TOPIC", "health/config"),
            },
            db: DbConfig {
                host: env_or("DB_HOST", "localhost"),
                port: env_parse_or("DB_PORT", 5432),
                name: env_or("DB_NAME", "health_monitoring"),
                user: env_or("DB_USER", "postgres"),
                password: env_or("DB_PASSWORD", "password"),
            },
            llm: LlmConfig {
                base_url: env_or("LLM_BASE_URL", "https://api.deepseek.com/v1"),
                api_key: env_or("LLM_API_KEY", ""),
                model: env_or("LLM_MODEL", "deepseek-chat"),
                temperature: env_parse_or("LLM_TEMPERATURE", 1.0),
            },
            api_port: env_parse_or("FLASK_PORT", 5001),
        };
        trace!("loaded config: {config:?}");
        config
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    std::env::var(key).map_or(default, |raw| raw.parse().unwrap_or(default))
}
