//! Configuration file management for dayplan.
//!
//! Provides a TOML-based config file at `~/.config/dayplan/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use dayplan_core::config::{LlmConfig, SearchConfig, Timeouts, WeatherConfig};
use dayplan_db::config::DbConfig;

/// Provider override (`gemini` or `openai`).
pub const PROVIDER_ENV: &str = "DAYPLAN_LLM_PROVIDER";
pub const MODEL_ENV: &str = "DAYPLAN_LLM_MODEL";
pub const RETRIES_ENV: &str = "DAYPLAN_MODEL_RETRIES";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the dayplan config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/dayplan` or `~/.config/dayplan`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("dayplan");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("dayplan")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> Result<ConfigFile> {
    toml::from_str(contents).context("failed to parse config file")
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix, since API keys may be added by hand.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct DayplanConfig {
    pub db_config: DbConfig,
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub weather: WeatherConfig,
}

impl DayplanConfig {
    /// Resolve configuration from the process environment and the config file.
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let file_config = load_config().ok();
        Self::resolve_with(cli_db_url, file_config, |key| std::env::var(key).ok())
    }

    /// Resolution chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `DAYPLAN_DATABASE_URL` > `database.url` > `DbConfig::DEFAULT_URL`
    /// - Provider/model: `DAYPLAN_LLM_PROVIDER` / `DAYPLAN_LLM_MODEL` > `[llm]` > gemini defaults
    /// - API keys: provider env var (`GEMINI_API_KEY`, `TAVILY_API_KEY`, ...) > file
    pub fn resolve_with<F>(cli_db_url: Option<&str>, file_config: Option<ConfigFile>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (file_db_url, mut llm, mut search, mut weather) = match file_config {
            Some(cfg) => (Some(cfg.database.url), cfg.llm, cfg.search, cfg.weather),
            None => (
                None,
                LlmConfig::default(),
                SearchConfig::default(),
                WeatherConfig::default(),
            ),
        };

        let db_url = cli_db_url
            .map(str::to_string)
            .or_else(|| env(DbConfig::ENV_VAR))
            .or(file_db_url)
            .unwrap_or_else(|| DbConfig::DEFAULT_URL.to_string());

        if let Some(provider) = env(PROVIDER_ENV) {
            if provider != llm.provider {
                let (base_url, model) = LlmConfig::provider_defaults(&provider)
                    .with_context(|| format!("{PROVIDER_ENV}: unknown provider {provider:?}"))?;
                llm.base_url = base_url.to_string();
                llm.model = model.to_string();
                llm.provider = provider;
            }
        }
        if let Some(model) = env(MODEL_ENV) {
            llm.model = model;
        }
        if let Some(retries) = env(RETRIES_ENV) {
            llm.max_retries = retries
                .trim()
                .parse()
                .with_context(|| format!("{RETRIES_ENV} must be a non-negative integer"))?;
        }

        if let Some(key) = env(LlmConfig::api_key_env(&llm.provider)) {
            llm.api_key = Some(key);
        }
        if let Some(key) = env(SearchConfig::API_KEY_ENV) {
            search.api_key = Some(key);
        }
        if let Some(key) = env(WeatherConfig::API_KEY_ENV) {
            weather.api_key = Some(key);
        }

        Ok(Self {
            db_config: DbConfig::new(db_url),
            llm,
            search,
            weather,
        })
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            model: self.llm.call_budget(),
            tool: self.search.timeout().max(self.weather.timeout()),
        }
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn file_with_url(url: &str) -> ConfigFile {
        ConfigFile {
            database: DatabaseSection { url: url.to_string() },
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
            weather: WeatherConfig::default(),
        }
    }

    #[test]
    fn parse_minimal_config_fills_defaults() {
        let cfg = parse_config("[database]\nurl = \"postgresql://db:5432/dayplan\"\n").unwrap();
        assert_eq!(cfg.database.url, "postgresql://db:5432/dayplan");
        assert_eq!(cfg.llm.provider, "gemini");
        assert_eq!(cfg.search.max_results, 5);
        assert!(cfg.weather.api_key.is_none());
    }

    #[test]
    fn parse_config_reads_hand_added_keys() {
        let cfg = parse_config(
            "[database]\nurl = \"postgresql://db/dayplan\"\n\n[llm]\nprovider = \"openai\"\napi_key = \"sk-file\"\nmax_retries = 2\n",
        )
        .unwrap();
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.api_key.as_deref(), Some("sk-file"));
        assert_eq!(cfg.llm.max_retries, 2);
    }

    #[test]
    fn saved_config_omits_api_keys() {
        let mut cfg = file_with_url("postgresql://testhost:5432/testdb");
        cfg.llm.api_key = Some("secret-key".to_string());
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(!text.contains("secret-key"));

        let loaded = parse_config(&text).unwrap();
        assert_eq!(loaded.database.url, "postgresql://testhost:5432/testdb");
    }

    #[test]
    fn cli_flag_overrides_env_and_file() {
        let env = env_of(&[("DAYPLAN_DATABASE_URL", "postgresql://env:5432/envdb")]);
        let config = DayplanConfig::resolve_with(
            Some("postgresql://cli:5432/clidb"),
            Some(file_with_url("postgresql://file:5432/filedb")),
            env,
        )
        .unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://cli:5432/clidb");
    }

    #[test]
    fn env_overrides_file() {
        let env = env_of(&[("DAYPLAN_DATABASE_URL", "postgresql://env:5432/envdb")]);
        let config =
            DayplanConfig::resolve_with(None, Some(file_with_url("postgresql://file:5432/filedb")), env).unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://env:5432/envdb");

        let config = DayplanConfig::resolve_with(
            None,
            Some(file_with_url("postgresql://file:5432/filedb")),
            env_of(&[]),
        )
        .unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://file:5432/filedb");
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = DayplanConfig::resolve_with(None, None, env_of(&[])).unwrap();
        assert_eq!(config.db_config.database_url, DbConfig::DEFAULT_URL);
        assert_eq!(config.llm.provider, "gemini");
        assert!(config.llm.api_key.is_none());
        assert!(config.search.api_key.is_none());
    }

    #[test]
    fn api_keys_come_from_env() {
        let env = env_of(&[
            ("GEMINI_API_KEY", "g-key"),
            ("TAVILY_API_KEY", "tvly-key"),
            ("OPENWEATHER_API_KEY", "owm-key"),
        ]);
        let config = DayplanConfig::resolve_with(None, None, env).unwrap();
        assert_eq!(config.llm.api_key.as_deref(), Some("g-key"));
        assert_eq!(config.search.api_key.as_deref(), Some("tvly-key"));
        assert_eq!(config.weather.api_key.as_deref(), Some("owm-key"));
    }

    #[test]
    fn provider_switch_applies_provider_defaults() {
        let env = env_of(&[("DAYPLAN_LLM_PROVIDER", "openai"), ("OPENAI_API_KEY", "sk-env")]);
        let config = DayplanConfig::resolve_with(None, None, env).unwrap();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.base_url, "https://api.openai.com");
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-env"));

        let env = env_of(&[("DAYPLAN_LLM_PROVIDER", "llama")]);
        assert!(DayplanConfig::resolve_with(None, None, env).is_err());
    }

    #[test]
    fn retries_env_must_be_numeric() {
        let env = env_of(&[("DAYPLAN_MODEL_RETRIES", "two")]);
        assert!(DayplanConfig::resolve_with(None, None, env).is_err());

        let env = env_of(&[("DAYPLAN_MODEL_RETRIES", "2")]);
        let config = DayplanConfig::resolve_with(None, None, env).unwrap();
        assert_eq!(config.llm.effective_retries(), 2);
    }

    #[test]
    fn timeouts_follow_service_settings() {
        let mut config = DayplanConfig::resolve_with(None, None, env_of(&[])).unwrap();
        config.weather.timeout_secs = 20;
        let timeouts = config.timeouts();
        assert_eq!(timeouts.model, Duration::from_secs(60));
        assert_eq!(timeouts.tool, Duration::from_secs(20));
    }

    #[test]
    fn model_deadline_leaves_room_for_retries() {
        let config =
            DayplanConfig::resolve_with(None, None, env_of(&[("DAYPLAN_MODEL_RETRIES", "1")])).unwrap();
        assert_eq!(config.llm.effective_retries(), 1);
        assert_eq!(config.timeouts().model, Duration::from_secs(60 * 2 + 10));
    }

    #[test]
    fn resolve_reads_process_env() {
        let _lock = lock_env();

        unsafe { std::env::set_var("DAYPLAN_DATABASE_URL", "postgresql://env:5432/envdb") };
        let config = DayplanConfig::resolve(None).unwrap();
        unsafe { std::env::remove_var("DAYPLAN_DATABASE_URL") };

        assert_eq!(config.db_config.database_url, "postgresql://env:5432/envdb");
    }

    #[test]
    fn config_path_honours_xdg() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let orig_xdg = std::env::var("XDG_CONFIG_HOME").ok();
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };

        let path = config_path();
        save_config(&file_with_url("postgresql://x:5432/y")).unwrap();
        let loaded = load_config();

        match orig_xdg {
            Some(x) => unsafe { std::env::set_var("XDG_CONFIG_HOME", x) },
            None => unsafe { std::env::remove_var("XDG_CONFIG_HOME") },
        }

        assert_eq!(path, tmp.path().join("dayplan").join("config.toml"));
        assert_eq!(loaded.unwrap().database.url, "postgresql://x:5432/y");
    }
}
