use serde::Deserialize;

use crate::domain::review::RefusalPolicy;

/// Process configuration, read from `SHOPPER__*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    pub db_host: String,
    #[serde(default = "default_db_port")]
    pub db_port: u16,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    #[serde(default = "default_db_connection_limit")]
    pub db_connection_limit: u32,
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    pub jwt_secret: String,
    #[serde(default = "default_jwt_expires_in_secs")]
    pub jwt_expires_in_secs: i64,

    /// Comma-separated list of allowed browser origins.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,

    /// Events are only logged when no broker is configured.
    #[serde(default)]
    pub rabbitmq_url: Option<String>,

    #[serde(default)]
    pub refusal_policy: RefusalPolicy,
}

fn default_port() -> u16 { 5000 }
fn default_db_port() -> u16 { 5432 }
fn default_db_connection_limit() -> u32 { 10 }
fn default_db_connect_timeout_secs() -> u64 { 10 }
fn default_jwt_expires_in_secs() -> i64 { 86_400 }
fn default_cors_origins() -> String { "http://localhost:3000".into() }

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let source = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("SHOPPER")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;
        Self::from_config(source)
    }

    pub fn from_config(source: config::Config) -> anyhow::Result<Self> {
        let config: Self = source.try_deserialize()?;

        for (name, value) in [
            ("db_host", &config.db_host),
            ("db_user", &config.db_user),
            ("db_password", &config.db_password),
            ("db_name", &config.db_name),
            ("jwt_secret", &config.jwt_secret),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("required configuration `{name}` is empty");
            }
        }
        if config.db_connection_limit == 0 {
            anyhow::bail!("db_connection_limit must be at least 1");
        }
        Ok(config)
    }

    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db_user, self.db_password, self.db_host, self.db_port, self.db_name
        )
    }

    pub fn cors_origin_list(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect()
    }
}
