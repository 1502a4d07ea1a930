//! Environment-driven settings for the database, the record stack and the HTTP server.

use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::sql::Limit;

/// Read `key` from the environment, falling back to `default` when unset.
/// A set but unparsable value is a config error.
fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Load(format!("{} has invalid value '{}'", key, raw))),
        Err(_) => Ok(default),
    }
}

fn env_flag(key: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => parse_flag(&raw)
            .ok_or_else(|| ConfigError::Load(format!("{} has invalid value '{}'", key, raw))),
        Err(_) => Ok(default),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    /// `DATABASE_URL`; the scheme selects the vendor.
    pub url: String,
    /// `DATABASE_MAX_CONNECTIONS`
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            url: "postgres://localhost/mvc".into(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();
        Ok(DatabaseConfig {
            url: std::env::var("DATABASE_URL").unwrap_or(d.url),
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", d.max_connections)?,
        })
    }
}

/// Defaults applied to records built through [`crate::stack::Record::from_config`].
#[derive(Clone, Debug)]
pub struct StackConfig {
    /// `STACK_USE_TRANSACTION`
    pub use_transaction: bool,
    /// `STACK_DEFAULT_LIMIT`
    pub default_limit: u64,
}

impl Default for StackConfig {
    fn default() -> Self {
        StackConfig {
            use_transaction: false,
            default_limit: Limit::DEFAULT_COUNT,
        }
    }
}

impl StackConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();
        let default_limit = env_or("STACK_DEFAULT_LIMIT", d.default_limit)?;
        if default_limit == 0 {
            return Err(ConfigError::Validation("STACK_DEFAULT_LIMIT must be positive".into()));
        }
        Ok(StackConfig {
            use_transaction: env_flag("STACK_USE_TRANSACTION", d.use_transaction)?,
            default_limit,
        })
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// `BIND_ADDR`
    pub bind_addr: SocketAddr,
    /// `BODY_LIMIT_BYTES`
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            body_limit: 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();
        Ok(ServerConfig {
            bind_addr: env_or("BIND_ADDR", d.bind_addr)?,
            body_limit: env_or("BODY_LIMIT_BYTES", d.body_limit)?,
        })
    }
}

/// Load a `.env` file from the working directory if there is one.
/// Variables already set in the process environment win.
pub fn load_env() {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "loaded .env");
    }
}

/// Install the fmt subscriber, honouring `RUST_LOG` and falling back to `default_directive`.
pub fn init_tracing(default_directive: &str) {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    // a subscriber may already be installed (tests, embedding apps)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn defaults() {
        let stack = StackConfig::default();
        assert!(!stack.use_transaction);
        assert_eq!(stack.default_limit, 10);
        assert_eq!(ServerConfig::default().bind_addr.port(), 3000);
        assert_eq!(DatabaseConfig::default().max_connections, 5);
    }

    #[test]
    fn unparsable_env_value_is_load_error() {
        std::env::set_var("MVC_SDK_TEST_LIMIT", "ten");
        let err = env_or::<u64>("MVC_SDK_TEST_LIMIT", 10).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
        std::env::remove_var("MVC_SDK_TEST_LIMIT");
        assert_eq!(env_or::<u64>("MVC_SDK_TEST_LIMIT", 10).unwrap(), 10);
    }
}
