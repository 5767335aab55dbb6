//! Connection configuration loaded from `DB_*` environment variables.
//!
//! Loading never fails: unset or empty variables take their defaults, and
//! malformed values are logged and replaced by the default. Semantic checks
//! (port range, ssl mode) happen when the driver config is built.

use crate::error::DbError;

use std::time::Duration;

pub const ENV_HOST: &str = "DB_HOST";
pub const ENV_PORT: &str = "DB_PORT";
pub const ENV_USER: &str = "DB_USER";
pub const ENV_PASSWORD: &str = "DB_PASSWORD";
pub const ENV_NAME: &str = "DB_NAME";
pub const ENV_SCHEMA: &str = "DB_SCHEMA";
pub const ENV_SSL_MODE: &str = "DB_SSL_MODE";
pub const ENV_DEBUG_MODE: &str = "DB_DEBUG_MODE";
pub const ENV_POOL_MAX_SIZE: &str = "DB_POOL_MAX_SIZE";
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "DB_CONNECT_TIMEOUT_SECS";
pub const ENV_POOL_WAIT_TIMEOUT_SECS: &str = "DB_POOL_WAIT_TIMEOUT_SECS";
pub const ENV_STATEMENT_TIMEOUT_MS: &str = "DB_STATEMENT_TIMEOUT_MS";
pub const ENV_SLOW_THRESHOLD_MS: &str = "DB_SLOW_THRESHOLD_MS";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: &str = "5432";
const DEFAULT_USER: &str = "postgres";
const DEFAULT_PASSWORD: &str = "postgres";
const DEFAULT_NAME: &str = "postgres";
const DEFAULT_SCHEMA: &str = "public";
const DEFAULT_SSL_MODE: &str = "disable";
const DEFAULT_DEBUG: bool = true;

/// SSL mode for database connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslMode {
    /// No SSL
    Disable,
    /// Use SSL if the server offers it, accept any certificate
    Prefer,
    /// Require SSL, accept any certificate
    Require,
    /// Require SSL, verify CA
    VerifyCa,
    /// Require SSL, verify CA and hostname
    VerifyFull,
}

impl SslMode {
    /// Convert to the libpq spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Prefer => "prefer",
            Self::Require => "require",
            Self::VerifyCa => "verify-ca",
            Self::VerifyFull => "verify-full",
        }
    }

    /// Parse the libpq spelling. Unknown modes are a config error.
    pub fn parse(s: &str) -> Result<Self, DbError> {
        match s.to_lowercase().as_str() {
            "disable" => Ok(Self::Disable),
            "prefer" => Ok(Self::Prefer),
            "require" => Ok(Self::Require),
            "verify-ca" | "verify_ca" => Ok(Self::VerifyCa),
            "verify-full" | "verify_full" => Ok(Self::VerifyFull),
            other => Err(DbError::config(format!("unknown sslmode: {other}"))),
        }
    }
}

/// Pool sizing and timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    /// Maximum number of connections in the pool
    pub max_size: usize,
    /// Timeout for establishing a new connection
    pub connect_timeout: Duration,
    /// How long to wait for a free connection when the pool is exhausted
    pub wait_timeout: Duration,
    /// Server-side statement timeout (None = server default)
    pub statement_timeout: Option<Duration>,
    /// Statements slower than this are logged at WARN
    pub slow_threshold: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_size: 16,
            connect_timeout: Duration::from_secs(10),
            wait_timeout: Duration::from_secs(30),
            statement_timeout: None,
            slow_threshold: Duration::from_millis(200),
        }
    }
}

/// Configuration for a database connection.
///
/// Built once at startup and passed by reference to [`crate::Client::open`].
#[derive(Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub schema: String,
    pub ssl_mode: String,
    /// Log every statement issued through the client
    pub debug: bool,
    pub pool: PoolOptions,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT.to_string(),
            user: DEFAULT_USER.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            dbname: DEFAULT_NAME.to_string(),
            schema: DEFAULT_SCHEMA.to_string(),
            ssl_mode: DEFAULT_SSL_MODE.to_string(),
            debug: DEFAULT_DEBUG,
            pool: PoolOptions::default(),
        }
    }
}

impl DbConfig {
    /// Load the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the configuration through an arbitrary variable lookup.
    ///
    /// `lookup` returns the raw value of a variable, or `None` when unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let defaults = PoolOptions::default();

        Self {
            host: env.string(ENV_HOST, DEFAULT_HOST),
            port: env.string(ENV_PORT, DEFAULT_PORT),
            user: env.string(ENV_USER, DEFAULT_USER),
            password: env.string(ENV_PASSWORD, DEFAULT_PASSWORD),
            dbname: env.string(ENV_NAME, DEFAULT_NAME),
            schema: env.string(ENV_SCHEMA, DEFAULT_SCHEMA),
            ssl_mode: env.string(ENV_SSL_MODE, DEFAULT_SSL_MODE),
            debug: env.bool(ENV_DEBUG_MODE, DEFAULT_DEBUG),
            pool: PoolOptions {
                max_size: env.positive(ENV_POOL_MAX_SIZE, defaults.max_size),
                connect_timeout: Duration::from_secs(
                    env.parsed(ENV_CONNECT_TIMEOUT_SECS, defaults.connect_timeout.as_secs()),
                ),
                wait_timeout: Duration::from_secs(
                    env.parsed(ENV_POOL_WAIT_TIMEOUT_SECS, defaults.wait_timeout.as_secs()),
                ),
                statement_timeout: env
                    .optional_parsed::<u64>(ENV_STATEMENT_TIMEOUT_MS)
                    .map(Duration::from_millis),
                slow_threshold: Duration::from_millis(env.parsed(
                    ENV_SLOW_THRESHOLD_MS,
                    defaults.slow_threshold.as_millis() as u64,
                )),
            },
        }
    }

    /// Connection descriptor in `key=value` form.
    ///
    /// Values are not escaped; a value containing a space or `=` produces a
    /// descriptor the server will misread.
    pub fn dsn(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={} search_path={} sslmode={}",
            self.host,
            self.port,
            self.user,
            self.password,
            self.dbname,
            self.schema,
            self.ssl_mode
        )
    }

    /// Get the display connection string (without password).
    pub fn display_url(&self) -> String {
        format!("postgresql://{}@{}:{}/{}", self.user, self.host, self.port, self.dbname)
    }

    /// Parse the configured ssl mode.
    pub fn ssl_mode(&self) -> Result<SslMode, DbError> {
        SslMode::parse(&self.ssl_mode)
    }

    /// Build the driver configuration.
    ///
    /// The schema and statement timeout travel as `-c` startup options since
    /// `tokio-postgres` has no dedicated setting for them.
    pub fn to_pg_config(&self) -> Result<tokio_postgres::Config, DbError> {
        let port: u16 = self
            .port
            .parse()
            .map_err(|_| DbError::config(format!("invalid port: {:?}", self.port)))?;

        let mut pg_config = tokio_postgres::Config::new();
        pg_config.host(&self.host);
        pg_config.port(port);
        pg_config.user(&self.user);
        pg_config.password(&self.password);
        pg_config.dbname(&self.dbname);
        pg_config.application_name("pgaccess");
        pg_config.connect_timeout(self.pool.connect_timeout);
        pg_config.keepalives(true);
        pg_config.ssl_mode(match self.ssl_mode()? {
            SslMode::Disable => tokio_postgres::config::SslMode::Disable,
            SslMode::Prefer => tokio_postgres::config::SslMode::Prefer,
            SslMode::Require | SslMode::VerifyCa | SslMode::VerifyFull => {
                tokio_postgres::config::SslMode::Require
            }
        });
        pg_config.options(&self.startup_options());

        Ok(pg_config)
    }

    fn startup_options(&self) -> String {
        let mut options = format!("-c search_path={}", self.schema);
        if let Some(timeout) = self.pool.statement_timeout {
            options.push_str(&format!(" -c statement_timeout={}", timeout.as_millis()));
        }
        options
    }
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("dbname", &self.dbname)
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .field("debug", &self.debug)
            .field("pool", &self.pool)
            .finish()
    }
}

/// Reads variables through a lookup, treating empty values as unset.
struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.raw(key).unwrap_or_else(|| default.to_string())
    }

    fn bool(&self, key: &str, default: bool) -> bool {
        let Some(value) = self.raw(key) else {
            return default;
        };
        match parse_bool(&value) {
            Some(parsed) => parsed,
            None => {
                tracing::warn!(key, value = %value, default, "Invalid boolean, using default");
                default
            }
        }
    }

    fn parsed<T>(&self, key: &str, default: T) -> T
    where
        T: std::str::FromStr + std::fmt::Display + Copy,
    {
        let Some(value) = self.raw(key) else {
            return default;
        };
        match value.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!(key, value = %value, %default, "Invalid number, using default");
                default
            }
        }
    }

    /// Like `parsed`, but zero is rejected too.
    fn positive(&self, key: &str, default: usize) -> usize {
        match self.parsed(key, default) {
            0 => {
                tracing::warn!(key, %default, "Value must be at least 1, using default");
                default
            }
            n => n,
        }
    }

    fn optional_parsed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        let value = self.raw(key)?;
        match value.parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                tracing::warn!(key, value = %value, "Invalid number, ignoring");
                None
            }
        }
    }
}

/// Accepts the same spellings as Go's `strconv.ParseBool`.
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> DbConfig {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        DbConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_produce_default_dsn() {
        let config = config_from(&[]);
        assert_eq!(
            config.dsn(),
            "host=localhost port=5432 user=postgres password=postgres dbname=postgres \
             search_path=public sslmode=disable"
        );
        assert!(config.debug);
        assert_eq!(config, DbConfig::default());
    }

    #[test]
    fn test_env_overrides_in_field_order() {
        let config = config_from(&[
            (ENV_HOST, "db.internal"),
            (ENV_PORT, "6432"),
            (ENV_USER, "app"),
            (ENV_PASSWORD, "s3cret"),
            (ENV_NAME, "orders"),
            (ENV_SCHEMA, "billing"),
            (ENV_SSL_MODE, "require"),
            (ENV_DEBUG_MODE, "false"),
        ]);
        assert_eq!(
            config.dsn(),
            "host=db.internal port=6432 user=app password=s3cret dbname=orders \
             search_path=billing sslmode=require"
        );
        assert!(!config.debug);
    }

    #[test]
    fn test_empty_value_uses_default() {
        let config = config_from(&[(ENV_HOST, ""), (ENV_DEBUG_MODE, "")]);
        assert_eq!(config.host, "localhost");
        assert!(config.debug);
    }

    #[test]
    fn test_invalid_debug_flag_falls_back() {
        let config = config_from(&[(ENV_DEBUG_MODE, "maybe")]);
        assert!(config.debug);

        let config = config_from(&[(ENV_DEBUG_MODE, "0")]);
        assert!(!config.debug);
    }

    #[test]
    fn test_parse_bool_spellings() {
        for s in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_bool(s), Some(true), "{s}");
        }
        for s in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_bool(s), Some(false), "{s}");
        }
        for s in ["yes", "tRuE", " true", "2"] {
            assert_eq!(parse_bool(s), None, "{s}");
        }
    }

    #[test]
    fn test_pool_options_from_env() {
        let config = config_from(&[
            (ENV_POOL_MAX_SIZE, "4"),
            (ENV_CONNECT_TIMEOUT_SECS, "3"),
            (ENV_STATEMENT_TIMEOUT_MS, "1500"),
            (ENV_SLOW_THRESHOLD_MS, "lots"),
        ]);
        assert_eq!(config.pool.max_size, 4);
        assert_eq!(config.pool.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.pool.wait_timeout, Duration::from_secs(30));
        assert_eq!(config.pool.statement_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.pool.slow_threshold, Duration::from_millis(200));
    }

    #[test]
    fn test_zero_pool_size_uses_default() {
        let config = config_from(&[(ENV_POOL_MAX_SIZE, "0")]);
        assert_eq!(config.pool.max_size, PoolOptions::default().max_size);

        let config = config_from(&[(ENV_POOL_MAX_SIZE, "-2")]);
        assert_eq!(config.pool.max_size, 16);
    }

    #[test]
    fn test_password_not_in_debug_or_display() {
        let config = config_from(&[(ENV_PASSWORD, "hunter2")]);
        assert!(!format!("{config:?}").contains("hunter2"));
        assert!(!config.display_url().contains("hunter2"));
        assert_eq!(config.display_url(), "postgresql://postgres@localhost:5432/postgres");
    }

    #[test]
    fn test_to_pg_config() {
        let mut config = DbConfig::default();
        config.pool.statement_timeout = Some(Duration::from_secs(2));
        let pg = config.to_pg_config().unwrap();

        assert_eq!(pg.get_ports(), &[5432]);
        assert_eq!(pg.get_user(), Some("postgres"));
        assert_eq!(pg.get_dbname(), Some("postgres"));
        assert_eq!(pg.get_options(), Some("-c search_path=public -c statement_timeout=2000"));
        assert_eq!(pg.get_ssl_mode(), tokio_postgres::config::SslMode::Disable);
    }

    #[test]
    fn test_to_pg_config_rejects_bad_port_and_sslmode() {
        let config = config_from(&[(ENV_PORT, "five")]);
        assert!(matches!(config.to_pg_config(), Err(DbError::Config { .. })));

        let config = config_from(&[(ENV_SSL_MODE, "sometimes")]);
        assert!(matches!(config.to_pg_config(), Err(DbError::Config { .. })));
    }

    #[test]
    fn test_ssl_mode_round_trip_names() {
        for mode in [
            SslMode::Disable,
            SslMode::Prefer,
            SslMode::Require,
            SslMode::VerifyCa,
            SslMode::VerifyFull,
        ] {
            assert_eq!(SslMode::parse(mode.as_str()).unwrap(), mode);
        }
        assert_eq!(SslMode::parse("VERIFY_FULL").unwrap(), SslMode::VerifyFull);
    }
}
