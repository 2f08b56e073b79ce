//! Application configuration for mdharvest.
//!
//! User config lives at `~/.mdharvest/mdharvest.toml`.
//! CLI flags and environment variables override config file values,
//! which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "mdharvest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".mdharvest";

/// Browser-like User-Agent sent when none is configured. Many article hosts
/// reject obvious bot agents outright.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

// ---------------------------------------------------------------------------
// Config structs (matching mdharvest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// HTTP client settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Markdown output settings.
    #[serde(default)]
    pub markdown: MarkdownConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default output directory. Empty means unset.
    #[serde(default)]
    pub output_dir: String,

    /// Maximum concurrent fetches per batch.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Skip URLs that already have a success row in their domain ledger.
    #[serde(default = "default_true")]
    pub skip_existing: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: String::new(),
            concurrency: default_concurrency(),
            skip_existing: true,
        }
    }
}

fn default_concurrency() -> u32 {
    4
}
fn default_true() -> bool {
    true
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum redirects followed per request.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            max_redirects: default_max_redirects(),
        }
    }
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_redirects() -> usize {
    5
}

/// `[markdown]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownConfig {
    /// Prepend YAML frontmatter (source_url, title, fetched_at).
    #[serde(default = "default_true")]
    pub frontmatter: bool,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self { frontmatter: true }
    }
}

// ---------------------------------------------------------------------------
// Runtime config (merged from config file + env + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime HTTP configuration for the fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_redirects: usize,
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.http.user_agent.clone(),
            timeout_secs: config.http.timeout_secs,
            max_redirects: config.http.max_redirects,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

/// Runtime configuration for one harvest run.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Root directory holding one folder per domain.
    pub output_dir: PathBuf,
    /// Skip URLs already recorded as success.
    pub skip_existing: bool,
    /// Maximum concurrent fetches per batch (at least 1).
    pub concurrency: usize,
    /// Prepend YAML frontmatter to written files.
    pub frontmatter: bool,
    /// HTTP settings.
    pub fetch: FetchConfig,
}

impl HarvestConfig {
    /// Build a runtime config from the file config, with an explicit output directory.
    pub fn new(config: &AppConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            skip_existing: config.defaults.skip_existing,
            concurrency: config.defaults.concurrency.max(1) as usize,
            frontmatter: config.markdown.frontmatter,
            fetch: FetchConfig::from(config),
        }
    }

    /// The configured default output directory, if set.
    pub fn default_output_dir(config: &AppConfig) -> Option<PathBuf> {
        let raw = config.defaults.output_dir.trim();
        if raw.is_empty() {
            return None;
        }
        Some(expand_home(raw))
    }
}

/// Expand a leading `~/` to the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.mdharvest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| HarvestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.mdharvest/mdharvest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| HarvestError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| HarvestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        return Err(HarvestError::config(format!(
            "config file already exists at {}",
            path.display()
        )));
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| HarvestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| HarvestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("concurrency"));
        assert!(toml_str.contains("user_agent"));
        assert!(toml_str.contains("frontmatter"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
output_dir = "/tmp/vault"

[http]
timeout_secs = 5
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.output_dir, "/tmp/vault");
        assert_eq!(config.defaults.concurrency, 4);
        assert!(config.defaults.skip_existing);
        assert_eq!(config.http.timeout_secs, 5);
        assert_eq!(config.http.user_agent, DEFAULT_USER_AGENT);
        assert!(config.markdown.frontmatter);
    }

    #[test]
    fn harvest_config_from_app_config() {
        let mut app = AppConfig::default();
        app.defaults.concurrency = 0;
        let harvest = HarvestConfig::new(&app, "/tmp/out");
        assert_eq!(harvest.concurrency, 1);
        assert!(harvest.skip_existing);
        assert_eq!(harvest.fetch.timeout_secs, 30);
        assert_eq!(harvest.fetch.max_redirects, 5);
    }

    #[test]
    fn default_output_dir_unset_when_empty() {
        let app = AppConfig::default();
        assert!(HarvestConfig::default_output_dir(&app).is_none());

        let mut app = AppConfig::default();
        app.defaults.output_dir = "/srv/notes".into();
        assert_eq!(
            HarvestConfig::default_output_dir(&app),
            Some(PathBuf::from("/srv/notes"))
        );
    }

    #[test]
    fn load_config_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[defaults\nconcurrency = ").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }
}
