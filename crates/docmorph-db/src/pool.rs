//! Database connection pool management.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use docmorph_core::defaults;
use docmorph_core::{Error, Result};

/// Pool configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Minimum number of connections to maintain.
    pub min_connections: u32,
    /// Connection timeout duration.
    pub connect_timeout: Duration,
    /// Idle connection timeout duration.
    pub idle_timeout: Duration,
    /// Maximum connection lifetime.
    pub max_lifetime: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: defaults::DB_MAX_CONNECTIONS,
            min_connections: defaults::DB_MIN_CONNECTIONS,
            connect_timeout: Duration::from_secs(defaults::DB_CONNECT_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(defaults::DB_IDLE_TIMEOUT_SECS),
            max_lifetime: Some(Duration::from_secs(defaults::DB_MAX_LIFETIME_SECS)),
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create pool configuration from environment variables (with defaults).
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DATABASE_MAX_CONNECTIONS` | 10 |
    /// | `DATABASE_MIN_CONNECTIONS` | 1 |
    /// | `DATABASE_CONNECT_TIMEOUT_SECS` | 30 |
    /// | `DATABASE_IDLE_TIMEOUT_SECS` | 600 |
    /// | `DATABASE_MAX_LIFETIME_SECS` | 1800, `0` disables |
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let max_connections = env_parse("DATABASE_MAX_CONNECTIONS")
            .unwrap_or(defaults::DB_MAX_CONNECTIONS)
            .max(1);

        let min_connections = env_parse("DATABASE_MIN_CONNECTIONS")
            .unwrap_or(defaults::DB_MIN_CONNECTIONS)
            .min(max_connections);

        let connect_timeout_secs =
            env_parse("DATABASE_CONNECT_TIMEOUT_SECS").unwrap_or(defaults::DB_CONNECT_TIMEOUT_SECS);

        let idle_timeout_secs =
            env_parse("DATABASE_IDLE_TIMEOUT_SECS").unwrap_or(defaults::DB_IDLE_TIMEOUT_SECS);

        let max_lifetime_secs =
            env_parse("DATABASE_MAX_LIFETIME_SECS").unwrap_or(defaults::DB_MAX_LIFETIME_SECS);

        Self {
            max_connections,
            min_connections,
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            idle_timeout: Duration::from_secs(idle_timeout_secs),
            max_lifetime: (max_lifetime_secs > 0).then(|| Duration::from_secs(max_lifetime_secs)),
        }
    }

    /// Set the maximum number of connections.
    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    /// Set the minimum number of connections.
    pub fn min_connections(mut self, n: u32) -> Self {
        self.min_connections = n;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the idle connection timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the maximum connection lifetime.
    pub fn max_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.max_lifetime = lifetime;
        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}

/// Create a new PostgreSQL connection pool with default configuration.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    create_pool_with_config(database_url, PoolConfig::default()).await
}

/// Create a new PostgreSQL connection pool with custom configuration.
pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    let start = Instant::now();

    info!(
        subsystem = "db",
        component = "pool",
        op = "create",
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        connect_timeout_secs = config.connect_timeout.as_secs(),
        idle_timeout_secs = config.idle_timeout.as_secs(),
        "Creating database connection pool"
    );

    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout)
        .idle_timeout(config.idle_timeout);

    if let Some(max_lifetime) = config.max_lifetime {
        options = options.max_lifetime(max_lifetime);
    }

    let pool = options
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "established",
        pool_size = pool.size(),
        pool_idle = pool.num_idle(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database connection pool established"
    );
    Ok(pool)
}

/// Log current pool health.
pub fn log_pool_metrics(pool: &PgPool) {
    let size = pool.size();
    let idle = pool.num_idle();

    debug!(
        subsystem = "db",
        component = "pool",
        op = "metrics",
        pool_size = size,
        pool_idle = idle,
        "Pool health check"
    );

    if idle == 0 && size > 0 {
        warn!(
            subsystem = "db",
            component = "pool",
            pool_size = size,
            "Connection pool has no idle connections"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_shared_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.max_connections, defaults::DB_MAX_CONNECTIONS);
        assert_eq!(config.min_connections, defaults::DB_MIN_CONNECTIONS);
        assert_eq!(config.max_lifetime, Some(Duration::from_secs(1800)));
    }

    #[test]
    fn test_pool_config_builder() {
        let config = PoolConfig::new()
            .max_connections(20)
            .min_connections(5)
            .connect_timeout(Duration::from_secs(60))
            .max_lifetime(None);

        assert_eq!(config.max_connections, 20);
        assert_eq!(config.min_connections, 5);
        assert_eq!(config.connect_timeout, Duration::from_secs(60));
        assert_eq!(config.max_lifetime, None);
    }

    #[test]
    fn test_from_env_without_overrides_is_default() {
        // Only meaningful when the variables are unset in the test environment.
        if std::env::vars().any(|(k, _)| k.starts_with("DATABASE_") && k != "DATABASE_URL") {
            return;
        }
        assert_eq!(PoolConfig::from_env(), PoolConfig::default());
    }

    #[test]
    fn test_env_parse_rejects_garbage() {
        assert_eq!(env_parse::<u32>("DOCMORPH_TEST_SURELY_UNSET_VARIABLE"), None);
    }
}
