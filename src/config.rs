use crate::error::ConfigError;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Settings for the live poll channels.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// How long a single subscriber may take to accept a broadcast.
    pub send_timeout: Duration,
    /// Messages buffered per connection before sends start waiting.
    pub outbound_buffer: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_millis(5000),
            outbound_buffer: 64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub bind_addr: SocketAddr,
    pub live: LiveConfig,
}

impl Config {
    /// Reads settings from the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = match lookup("DATABASE_URL") {
            Some(url) => url,
            None => {
                let user = required(&lookup, "POSTGRES_USER")?;
                let password = required(&lookup, "POSTGRES_PASSWORD")?;
                let db = required(&lookup, "POSTGRES_DB")?;
                let host = lookup("POSTGRES_HOST").unwrap_or_else(|| "db".to_string());
                let port: u16 = parsed(&lookup, "POSTGRES_PORT", 5432)?;
                format!("postgres://{user}:{password}@{host}:{port}/{db}")
            }
        };

        let jwt_secret = required(&lookup, "JWT_SECRET")?;
        if jwt_secret.is_empty() {
            return Err(ConfigError::Invalid {
                name: "JWT_SECRET",
                value: String::new(),
            });
        }

        let token_ttl_hours: i64 = parsed(&lookup, "TOKEN_TTL_HOURS", 24)?;
        let token_ttl = Some(token_ttl_hours)
            .filter(|hours| *hours > 0)
            .and_then(chrono::TimeDelta::try_hours)
            .ok_or_else(|| ConfigError::Invalid {
                name: "TOKEN_TTL_HOURS",
                value: token_ttl_hours.to_string(),
            })?;
        let bind_addr = parsed(&lookup, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?;
        let db_max_connections = parsed(&lookup, "DB_MAX_CONNECTIONS", 20)?;

        let defaults = LiveConfig::default();
        let send_timeout_ms: u64 = parsed(
            &lookup,
            "LIVE_SEND_TIMEOUT_MS",
            defaults.send_timeout.as_millis() as u64,
        )?;
        let outbound_buffer: usize =
            parsed(&lookup, "LIVE_OUTBOUND_BUFFER", defaults.outbound_buffer)?;
        if outbound_buffer == 0 {
            return Err(ConfigError::Invalid {
                name: "LIVE_OUTBOUND_BUFFER",
                value: "0".to_string(),
            });
        }

        Ok(Config {
            database_url,
            db_max_connections,
            jwt_secret,
            token_ttl,
            bind_addr,
            live: LiveConfig {
                send_timeout: Duration::from_millis(send_timeout_ms),
                outbound_buffer,
            },
        })
    }
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).ok_or(ConfigError::Missing(name))
}

fn parsed<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
