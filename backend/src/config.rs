use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Secret used when `JWT_SECRET` is unset in development
const DEV_JWT_SECRET: &str = "helphive-development-secret";

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    pub test_before_acquire: bool,
    /// Startup connection attempts before giving up
    pub connect_retries: u32,
    /// First backoff delay; doubled on every failed attempt
    pub retry_base_delay_ms: u64,
}

/// JWT settings
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub log_level: String,
    pub http_port: u16,
    pub ws_port: Option<u16>,
    pub environment: String,
    pub audit_log_dir: PathBuf,
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse::<T>().ok())
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable is required")?;

        let max_connections = parse_env("DATABASE_MAX_CONNECTIONS").unwrap_or(10);
        let acquire_timeout_secs = parse_env("DATABASE_ACQUIRE_TIMEOUT_SECS").unwrap_or(30);
        let idle_timeout_secs = parse_env("DATABASE_IDLE_TIMEOUT_SECS").unwrap_or(600); // 10 minutes
        let max_lifetime_secs = parse_env("DATABASE_MAX_LIFETIME_SECS").unwrap_or(1800); // 30 minutes
        let test_before_acquire = parse_env("DATABASE_TEST_BEFORE_ACQUIRE").unwrap_or(true);
        let connect_retries = parse_env("DATABASE_CONNECT_RETRIES").unwrap_or(5);
        let retry_base_delay_ms = parse_env("DATABASE_RETRY_BASE_DELAY_MS").unwrap_or(500);

        let config = Self {
            url,
            max_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
            test_before_acquire,
            connect_retries,
            retry_base_delay_ms,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("DATABASE_MAX_CONNECTIONS must be greater than 0".to_string());
        }

        if self.acquire_timeout_secs == 0 {
            return Err("DATABASE_ACQUIRE_TIMEOUT_SECS must be greater than 0".to_string());
        }

        if self.connect_retries == 0 {
            return Err("DATABASE_CONNECT_RETRIES must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get acquire timeout as Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Get idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Get max lifetime as Duration
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    /// Backoff before retry number `attempt` (1-based), capped at 30 seconds
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(factor).min(30_000))
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/helphive".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            test_before_acquire: true,
            connect_retries: 5,
            retry_base_delay_ms: 500,
        }
    }
}

impl AuthConfig {
    /// JWT secret is mandatory outside development
    pub fn from_env(environment: &str) -> Result<Self, String> {
        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if environment == "development" => DEV_JWT_SECRET.to_string(),
            _ => return Err("JWT_SECRET environment variable is required".to_string()),
        };

        let jwt_expiry_hours = parse_env("JWT_EXPIRY_HOURS").unwrap_or(168);
        if jwt_expiry_hours <= 0 {
            return Err("JWT_EXPIRY_HOURS must be greater than 0".to_string());
        }

        Ok(Self {
            jwt_secret,
            jwt_expiry_hours,
        })
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_expiry_hours: 168,
        }
    }
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let database = DatabaseConfig::from_env()?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let http_port = parse_env("HTTP_PORT").unwrap_or(5000);
        let ws_port = parse_env("WS_PORT");
        let environment = env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase();
        let audit_log_dir =
            PathBuf::from(env::var("AUDIT_LOG_DIR").unwrap_or_else(|_| "./logs".to_string()));

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        // Validate environment
        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&environment.as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                environment, valid_environments
            ));
        }

        if ws_port == Some(http_port) {
            return Err("WS_PORT must differ from HTTP_PORT".to_string());
        }

        let auth = AuthConfig::from_env(&environment)?;

        Ok(Self {
            database,
            auth,
            log_level: log_level.to_lowercase(),
            http_port,
            ws_port,
            environment,
            audit_log_dir,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Get database URL (convenience method)
    pub fn database_url(&self) -> &str {
        &self.database.url
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            log_level: "info".to_string(),
            http_port: 5000,
            ws_port: None,
            environment: "development".to_string(),
            audit_log_dir: PathBuf::from("./logs"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.http_port, 5000);
        assert!(config.is_development());
        assert!(!config.is_production());
    }

    #[test]
    fn test_retry_delay_doubles_and_caps() {
        let config = DatabaseConfig::default();
        assert_eq!(config.retry_delay(1), Duration::from_millis(500));
        assert_eq!(config.retry_delay(2), Duration::from_millis(1000));
        assert_eq!(config.retry_delay(4), Duration::from_millis(4000));
        assert_eq!(config.retry_delay(20), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_connections_rejected() {
        let config = DatabaseConfig {
            max_connections: 0,
            ..DatabaseConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
