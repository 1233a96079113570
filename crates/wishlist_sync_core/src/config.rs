use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://api.brickowl.com/v1";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_USER_AGENT: &str = concat!("wishlist-sync/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_CONFIG_FILENAME: &str = "wishlist-sync.toml";
pub const DEFAULT_COLORS_FILE: &str = "brickowl-wishlist-colors.json";
pub const DEFAULT_PARTS_FILE: &str = "brickowl-wishlist-boids.json";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct SyncConfig {
    #[serde(default)]
    pub catalog: CatalogSection,
    #[serde(default)]
    pub cache: CacheSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct CatalogSection {
    pub api_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct CacheSection {
    pub dir: Option<PathBuf>,
    pub colors_file: Option<String>,
    pub parts_file: Option<String>,
}

impl SyncConfig {
    /// Resolve the API base URL: env BRICKOWL_API_URL > config > DEFAULT_API_URL.
    pub fn api_url(&self, lookup_env: impl Fn(&str) -> Option<String>) -> String {
        non_empty_env(&lookup_env, "BRICKOWL_API_URL")
            .or_else(|| self.catalog.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// Resolve the per-request timeout: env BRICKOWL_HTTP_TIMEOUT_MS > config > default.
    pub fn timeout_ms(&self, lookup_env: impl Fn(&str) -> Option<String>) -> u64 {
        non_empty_env(&lookup_env, "BRICKOWL_HTTP_TIMEOUT_MS")
            .and_then(|value| value.parse::<u64>().ok())
            .or(self.catalog.timeout_ms)
            .unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    pub fn user_agent(&self, lookup_env: impl Fn(&str) -> Option<String>) -> String {
        non_empty_env(&lookup_env, "BRICKOWL_USER_AGENT")
            .or_else(|| self.catalog.user_agent.clone())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache.dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn colors_file(&self) -> &str {
        self.cache
            .colors_file
            .as_deref()
            .unwrap_or(DEFAULT_COLORS_FILE)
    }

    pub fn parts_file(&self) -> &str {
        self.cache.parts_file.as_deref().unwrap_or(DEFAULT_PARTS_FILE)
    }
}

/// Load and parse a SyncConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<SyncConfig> {
    if !config_path.exists() {
        return Ok(SyncConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: SyncConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

fn non_empty_env(lookup_env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup_env(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_apply_without_file_or_env() {
        let config = load_config(Path::new("/nonexistent/wishlist-sync.toml")).expect("load");
        assert_eq!(config.api_url(no_env), DEFAULT_API_URL);
        assert_eq!(config.timeout_ms(no_env), 10_000);
        assert_eq!(config.cache_dir(), PathBuf::from("."));
        assert_eq!(config.colors_file(), "brickowl-wishlist-colors.json");
        assert_eq!(config.parts_file(), "brickowl-wishlist-boids.json");
    }

    #[test]
    fn load_config_parses_sections() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("wishlist-sync.toml");
        fs::write(
            &config_path,
            r#"
[catalog]
api_url = "https://staging.example.org/v1/"
timeout_ms = 2500

[cache]
dir = "state"
parts_file = "parts.json"
"#,
        )
        .expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert_eq!(config.api_url(no_env), "https://staging.example.org/v1");
        assert_eq!(config.timeout_ms(no_env), 2500);
        assert_eq!(config.cache_dir(), PathBuf::from("state"));
        assert_eq!(config.parts_file(), "parts.json");
        assert_eq!(config.colors_file(), DEFAULT_COLORS_FILE);
    }

    #[test]
    fn env_overrides_config_values() {
        let config = SyncConfig {
            catalog: CatalogSection {
                api_url: Some("https://from-config.example".to_string()),
                timeout_ms: Some(1),
                user_agent: None,
            },
            cache: CacheSection::default(),
        };
        let lookup = |key: &str| match key {
            "BRICKOWL_API_URL" => Some(" https://from-env.example ".to_string()),
            "BRICKOWL_HTTP_TIMEOUT_MS" => Some("not-a-number".to_string()),
            _ => None,
        };
        assert_eq!(config.api_url(lookup), "https://from-env.example");
        assert_eq!(config.timeout_ms(lookup), 1);
    }

    #[test]
    fn load_config_returns_error_for_invalid_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("wishlist-sync.toml");
        fs::write(&config_path, "[catalog\napi_url = \"oops\"").expect("write config");
        let error = load_config(&config_path).expect_err("must fail");
        assert!(error.to_string().contains("failed to parse"));
    }
}
