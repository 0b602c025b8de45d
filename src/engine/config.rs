//! Engine configuration
//!
//! Supports connection URLs of the form:
//! * mysql://[user[:password]@][host][:port][/database][?key=value&...]

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default port
pub const DEFAULT_PORT: u16 = 3306;

/// Driver options applied unless overridden
const DRIVER_DEFAULTS: &[(&str, &str)] = &[
    ("use_unicode", "true"),
    ("charset", "utf8"),
    ("collation", "utf8_general_ci"),
    ("autocommit", "false"),
];

/// Engine configuration
///
/// Holds the parameters handed to the driver each time a physical connection
/// is opened. Use `EngineConfig::builder()` to set host, port and driver options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Username
    pub user: String,
    /// Password (optional, never serialized)
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Database name
    pub database: String,
    /// Host (default: 127.0.0.1)
    #[serde(default = "default_host")]
    pub host: String,
    /// Port (default: 3306)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Driver-specific options
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl EngineConfig {
    /// Create new configuration with defaults
    ///
    /// # Arguments
    ///
    /// * `database` - Database name
    /// * `user` - Username
    pub fn new(database: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: None,
            database: database.into(),
            host: default_host(),
            port: DEFAULT_PORT,
            options: BTreeMap::new(),
        }
    }

    /// Create a builder
    ///
    /// # Examples
    ///
    /// ```
    /// use scopedb::EngineConfig;
    ///
    /// let config = EngineConfig::builder("test", "root")
    ///     .password("secret")
    ///     .host("db.internal")
    ///     .option("charset", "utf8mb4")
    ///     .build();
    ///
    /// assert_eq!(config.port, 3306);
    /// assert_eq!(config.driver_options()["charset"], "utf8mb4");
    /// ```
    pub fn builder(database: impl Into<String>, user: impl Into<String>) -> EngineConfigBuilder {
        EngineConfigBuilder {
            config: Self::new(database, user),
        }
    }

    /// Set password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Add a driver option
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Options as handed to the driver: defaults, then overrides, then `buffered=true`
    pub fn driver_options(&self) -> BTreeMap<String, String> {
        let mut merged: BTreeMap<String, String> = DRIVER_DEFAULTS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        merged.extend(self.options.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged.insert("buffered".to_string(), "true".to_string());
        merged
    }

    /// `host:port` address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parse a connection URL
    pub fn parse(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix("mysql://")
            .ok_or_else(|| Error::Config("connection string must start with mysql://".into()))?;

        // Format: [user[:password]@]host[:port][/database][?params]
        let (auth, rest) = match rest.rfind('@') {
            Some(pos) => (Some(&rest[..pos]), &rest[pos + 1..]),
            None => (None, rest),
        };

        let (user, password) = match auth {
            Some(auth) => match auth.split_once(':') {
                Some((user, pass)) => (user.to_string(), Some(pass.to_string())),
                None => (auth.to_string(), None),
            },
            None => (whoami::username(), None),
        };
        if user.is_empty() {
            return Err(Error::Config("empty user in connection string".into()));
        }

        let (rest, query_string) = rest.split_once('?').unwrap_or((rest, ""));

        let (host_port, database) = match rest.split_once('/') {
            Some((hp, db)) => (hp, db.to_string()),
            None => (rest, String::new()),
        };
        if database.is_empty() {
            return Err(Error::Config("connection string has no database".into()));
        }

        let (host, port) = match host_port.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| Error::Config(format!("invalid port: {}", port)))?;
                (host.to_string(), port)
            }
            None => (host_port.to_string(), DEFAULT_PORT),
        };
        let host = if host.is_empty() { default_host() } else { host };

        let options = parse_query_params(query_string)?;

        Ok(Self {
            user,
            password,
            database,
            host,
            port,
            options,
        })
    }
}

/// Split `a=1&b=2` into a map
fn parse_query_params(query_string: &str) -> Result<BTreeMap<String, String>> {
    let mut options = BTreeMap::new();
    for pair in query_string.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| Error::Config(format!("malformed option: {}", pair)))?;
        options.insert(key.to_string(), value.to_string());
    }
    Ok(options)
}

/// Builder for `EngineConfig`
#[derive(Debug, Clone)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set the password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    /// Set the host
    ///
    /// Default: 127.0.0.1
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the port
    ///
    /// Default: 3306
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Add a driver option
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.options.insert(key.into(), value.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> EngineConfig {
        self.config
    }
}
