//! Loader for SiteLens configuration with YAML + environment overlays.
//!
//! Sources are merged in the order they are added, with `SITELENS__`-prefixed
//! environment variables applied on top (`SITELENS__BROWSER__HEADLESS=false`).
//! After merging, every string value goes through `${VAR}` expansion so
//! secrets can live in the environment while the YAML stays committed.
//!
//! Every section has defaults, so an empty document is a valid configuration:
//!
//! ```
//! use sitelens_config::SiteLensConfigLoader;
//!
//! let cfg = SiteLensConfigLoader::new().with_yaml_str("{}").load().unwrap();
//! assert_eq!(cfg.server.bind, "127.0.0.1:5000");
//! assert_eq!(cfg.browser.viewport_width, 1280);
//! assert!(cfg.gemini.is_none());
//! ```
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sitelens_common::observability::LogFormat;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "SITELENS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteLensConfig {
    #[serde(deserialize_with = "opt_string_or_number")]
    pub version: Option<String>,
    pub server: ServerConfig,
    pub screenshots: ScreenshotConfig,
    pub browser: BrowserConfig,
    pub clip: ClipConfig,
    pub gemini: Option<GeminiConfig>,
    pub cloudinary: Option<CloudinaryConfig>,
    pub scoring: ScoringConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub max_concurrent_comparisons: usize,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".into(),
            max_concurrent_comparisons: 1,
            request_timeout_secs: 900,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotConfig {
    pub dir: PathBuf,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("screenshots"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Firefox,
    Chrome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub kind: BrowserKind,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub page_load_timeout_secs: u64,
    pub settle_ms: u64,
    pub max_page_height: u32,
    pub min_main_height: u32,
    pub header_selectors: Option<Vec<String>>,
    pub footer_selectors: Option<Vec<String>>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:4444".into(),
            kind: BrowserKind::Firefox,
            headless: true,
            viewport_width: 1280,
            viewport_height: 3000,
            page_load_timeout_secs: 60,
            settle_ms: 3000,
            max_page_height: 16_000,
            min_main_height: 50,
            header_selectors: None,
            footer_selectors: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipConfig {
    pub enabled: bool,
    pub preprocess: bool,
    pub cache_dir: Option<PathBuf>,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            preprocess: true,
            cache_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_gemini_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_gemini_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: usize,
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_gemini_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta/".into()
}
fn default_gemini_timeout() -> u64 {
    180
}
fn default_retries() -> usize {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    /// Cloudinary keys are all digits, so env overrides arrive as numbers.
    #[serde(deserialize_with = "string_or_number")]
    pub api_key: String,
    pub api_secret: String,
    #[serde(default = "default_cloudinary_folder")]
    pub folder: String,
}

fn default_cloudinary_folder() -> String {
    "website_screenshots".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Share of the CLIP score in the blended section score; the LLM gets the rest.
    pub clip_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self { clip_weight: 0.5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub filter: String,
    pub dir: Option<PathBuf>,
    pub stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            filter: "info".into(),
            dir: None,
            stderr: true,
        }
    }
}

impl SiteLensConfig {
    /// Reject combinations that would only fail later, mid-comparison.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        let w = self.scoring.clip_weight;
        if !(0.0..=1.0).contains(&w) || w.is_nan() {
            return Err(ConfigLoadError::Invalid(format!(
                "scoring.clip_weight must be within [0, 1], got {w}"
            )));
        }
        if self.browser.viewport_width == 0 || self.browser.viewport_height == 0 {
            return Err(ConfigLoadError::Invalid(
                "browser viewport dimensions must be non-zero".into(),
            ));
        }
        if self.server.max_concurrent_comparisons == 0 {
            return Err(ConfigLoadError::Invalid(
                "server.max_concurrent_comparisons must be at least 1".into(),
            ));
        }
        if let Some(g) = &self.gemini {
            if is_unset(&g.api_key) {
                return Err(ConfigLoadError::Invalid("gemini.api_key is empty".into()));
            }
        }
        if let Some(c) = &self.cloudinary {
            for (field, value) in [
                ("cloud_name", &c.cloud_name),
                ("api_key", &c.api_key),
                ("api_secret", &c.api_secret),
            ] {
                if is_unset(value) {
                    return Err(ConfigLoadError::Invalid(format!(
                        "cloudinary.{field} is empty"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Render the effective configuration as YAML with credentials masked.
    pub fn to_redacted_yaml(&self) -> Result<String, ConfigLoadError> {
        let mut copy = self.clone();
        if let Some(g) = copy.gemini.as_mut() {
            g.api_key = mask(&g.api_key);
        }
        if let Some(c) = copy.cloudinary.as_mut() {
            c.api_key = mask(&c.api_key);
            c.api_secret = mask(&c.api_secret);
        }
        serde_yaml::to_string(&copy).map_err(|e| ConfigLoadError::Invalid(e.to_string()))
    }
}

fn string_or_number<'de, D>(de: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(de)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string, got {other}"
        ))),
    }
}

fn opt_string_or_number<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<Value>::deserialize(de)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a string, got {other}"
        ))),
    }
}

/// Blank, or still holding an unexpanded `${VAR}` placeholder.
fn is_unset(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v.contains("${")
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        "<redacted>".into()
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct SiteLensConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env: Environment,
}

impl Default for SiteLensConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteLensConfigLoader {
    /// Start with no file sources; `SITELENS__` env overrides are applied last.
    pub fn new() -> Self {
        let env = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("browser.header_selectors")
            .with_list_parse_key("browser.footer_selectors");
        Self {
            builder: Config::builder(),
            env,
        }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be absent, so deployments can rely purely on
    /// environment variables.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use sitelens_config::{BrowserKind, SiteLensConfigLoader};
    ///
    /// let cfg = SiteLensConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// browser:
    ///   kind: chrome
    ///   headless: false
    /// scoring:
    ///   clip_weight: 0.25
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.browser.kind, BrowserKind::Chrome);
    /// assert!(!cfg.browser.headless);
    /// assert_eq!(cfg.scoring.clip_weight, 0.25);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder, merge sources, expand `${VAR}` placeholders and
    /// deserialize into [`SiteLensConfig`]. The result is validated.
    ///
    /// ```
    /// use sitelens_config::SiteLensConfigLoader;
    ///
    /// unsafe { std::env::set_var("DOC_GEMINI_KEY", "injected-from-env"); }
    ///
    /// let config = SiteLensConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// gemini:
    ///   api_key: "${DOC_GEMINI_KEY}"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// let gemini = config.gemini.expect("gemini section");
    /// assert_eq!(gemini.api_key, "injected-from-env");
    /// assert_eq!(gemini.model, "gemini-2.0-flash");
    ///
    /// unsafe { std::env::remove_var("DOC_GEMINI_KEY"); }
    /// ```
    pub fn load(self) -> Result<SiteLensConfig, ConfigLoadError> {
        let cfg = self.builder.add_source(self.env).build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: SiteLensConfig =
            serde_json::from_value(v).map_err(|e| ConfigLoadError::Invalid(e.to_string()))?;
        typed.validate()?;
        Ok(typed)
    }
}
