//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Supabase project URL
    pub supabase_url: String,
    /// Supabase service role key (bypasses RLS - server only!)
    pub supabase_service_role_key: String,
    /// Supabase JWT secret for token verification
    pub supabase_jwt_secret: String,

    /// Allowed client origin for CORS
    pub client_origin: String,

    /// Sessions older than this are stopped and removed
    pub session_max_lifetime: Duration,
    /// How often the expiry sweep runs
    pub session_sweep_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            supabase_url: env::var("SUPABASE_URL")
                .map_err(|_| ConfigError::Missing("SUPABASE_URL"))?,
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .map_err(|_| ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY"))?,
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .map_err(|_| ConfigError::Missing("SUPABASE_JWT_SECRET"))?,

            client_origin: env::var("CLIENT_ORIGIN")
                .map_err(|_| ConfigError::Missing("CLIENT_ORIGIN"))?,

            session_max_lifetime: secs_var("SESSION_MAX_LIFETIME_SECS", 30 * 60)?,
            session_sweep_interval: secs_var("SESSION_SWEEP_INTERVAL_SECS", 5)?,
        })
    }
}

/// Optional whole-second duration, zero rejected
fn secs_var(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    let secs = match env::var(name) {
        Ok(raw) => raw.trim().parse::<u64>().map_err(|_| ConfigError::Invalid(name))?,
        Err(_) => default,
    };
    if secs == 0 {
        return Err(ConfigError::Invalid(name));
    }
    Ok(Duration::from_secs(secs))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secs_var_default_and_override() {
        assert_eq!(
            secs_var("PONG_TEST_UNSET_LIFETIME", 1800).unwrap(),
            Duration::from_secs(1800)
        );

        env::set_var("PONG_TEST_SWEEP_SECS", "7");
        assert_eq!(secs_var("PONG_TEST_SWEEP_SECS", 5).unwrap(), Duration::from_secs(7));

        env::set_var("PONG_TEST_ZERO_SECS", "0");
        assert!(matches!(
            secs_var("PONG_TEST_ZERO_SECS", 5),
            Err(ConfigError::Invalid("PONG_TEST_ZERO_SECS"))
        ));
    }
}
