use std::env;

/// Database configuration.
///
/// Reads from the `DAYPLAN_DATABASE_URL` environment variable, falling back to
/// `postgresql://localhost:5432/dayplan` when unset.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Full PostgreSQL connection URL.
    pub database_url: String,
}

impl DbConfig {
    /// The default connection URL used when no environment variable is set.
    pub const DEFAULT_URL: &str = "postgresql://localhost:5432/dayplan";

    /// Environment variable consulted by [`DbConfig::from_env`].
    pub const ENV_VAR: &str = "DAYPLAN_DATABASE_URL";

    /// Build a config from the environment.
    ///
    /// Priority: `DAYPLAN_DATABASE_URL` env var, then the compile-time default.
    /// A `postgres://` scheme is rewritten to `postgresql://`.
    pub fn from_env() -> Self {
        let database_url = env::var(Self::ENV_VAR).unwrap_or_else(|_| Self::DEFAULT_URL.to_owned());
        Self::new(database_url)
    }

    /// Build a config from an explicit URL (useful for tests and CLI flags).
    pub fn new(database_url: impl Into<String>) -> Self {
        let database_url = database_url.into();
        let database_url = match database_url.strip_prefix("postgres://") {
            Some(rest) => format!("postgresql://{rest}"),
            None => database_url,
        };
        Self { database_url }
    }

    /// Extract the database name from the URL, ignoring any query string.
    ///
    /// Returns `None` if the URL has no path component.
    pub fn database_name(&self) -> Option<&str> {
        let without_query = self
            .database_url
            .split_once('?')
            .map_or(self.database_url.as_str(), |(base, _)| base);
        without_query
            .strip_prefix("postgresql://")
            .and_then(|rest| rest.split_once('/'))
            .map(|(_, name)| name)
            .filter(|s| !s.is_empty())
    }

    /// Return a URL pointing at the `postgres` maintenance database on the
    /// same host. Used to issue `CREATE DATABASE` when the target DB does not
    /// yet exist.
    pub fn maintenance_url(&self) -> String {
        match self.database_url.rfind('/') {
            Some(pos) if pos > "postgresql://".len() => {
                let mut url = self.database_url[..pos].to_owned();
                url.push_str("/postgres");
                url
            }
            _ => self.database_url.clone(),
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
