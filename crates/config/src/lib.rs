//! Configuration loading, validation, and management for parley.
//!
//! Loads backend profiles from `~/.parley/config.toml` with environment
//! variable overrides. Each profile is one variant of [`ProfileConfig`],
//! selected by its `library` key, so family-specific required fields are
//! checked by the parser rather than at request time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.parley/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Profile used when a command names none
    #[serde(default = "default_profile")]
    pub default_profile: String,

    /// Battle defaults
    #[serde(default)]
    pub battle: BattleConfig,

    /// Backend profiles, keyed by name
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

fn default_profile() -> String {
    "gpt".into()
}
fn default_rounds() -> u32 {
    5
}
fn default_seed() -> Option<String> {
    Some("Hello".into())
}

/// Backend family selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendFamily {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Google,
}

impl BackendFamily {
    /// Environment variable consulted when a profile has no `api_key`.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            BackendFamily::OpenAi => "OPENAI_API_KEY",
            BackendFamily::Anthropic => "ANTHROPIC_API_KEY",
            BackendFamily::Google => "GOOGLE_API_KEY",
        }
    }
}

impl std::fmt::Display for BackendFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BackendFamily::OpenAi => "openai",
            BackendFamily::Anthropic => "anthropic",
            BackendFamily::Google => "google",
        })
    }
}

/// Fields every backend profile carries.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProfileBase {
    /// Model identifier sent to the backend
    pub model: String,

    /// Persona / system text
    #[serde(default)]
    pub tone: String,

    /// Default request used when a one-shot request is empty
    #[serde(default)]
    pub request: String,

    /// Truncate one-shot request text to this many characters; `<= 0` is unlimited
    #[serde(default)]
    pub request_char_limit: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl ProfileBase {
    pub fn new(model: impl Into<String>, tone: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            tone: tone.into(),
            request: String::new(),
            request_char_limit: 0,
            base_url: None,
            api_key: None,
        }
    }
}

/// Any OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiProfile {
    #[serde(flatten)]
    pub base: ProfileBase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Anthropic Messages API. The API requires both sampling fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicProfile {
    #[serde(flatten)]
    pub base: ProfileBase,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Google Gemini `generateContent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleProfile {
    #[serde(flatten)]
    pub base: ProfileBase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// One backend profile, discriminated by `library`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "library", rename_all = "lowercase")]
pub enum ProfileConfig {
    #[serde(rename = "openai")]
    OpenAi(OpenAiProfile),
    Anthropic(AnthropicProfile),
    Google(GoogleProfile),
}

impl ProfileConfig {
    pub fn family(&self) -> BackendFamily {
        match self {
            ProfileConfig::OpenAi(_) => BackendFamily::OpenAi,
            ProfileConfig::Anthropic(_) => BackendFamily::Anthropic,
            ProfileConfig::Google(_) => BackendFamily::Google,
        }
    }

    pub fn base(&self) -> &ProfileBase {
        match self {
            ProfileConfig::OpenAi(p) => &p.base,
            ProfileConfig::Anthropic(p) => &p.base,
            ProfileConfig::Google(p) => &p.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut ProfileBase {
        match self {
            ProfileConfig::OpenAi(p) => &mut p.base,
            ProfileConfig::Anthropic(p) => &mut p.base,
            ProfileConfig::Google(p) => &mut p.base,
        }
    }

    pub fn model(&self) -> &str {
        &self.base().model
    }

    pub fn temperature(&self) -> Option<f32> {
        match self {
            ProfileConfig::OpenAi(p) => p.temperature,
            ProfileConfig::Anthropic(p) => Some(p.temperature),
            ProfileConfig::Google(p) => p.temperature,
        }
    }

    pub fn max_tokens(&self) -> Option<u32> {
        match self {
            ProfileConfig::OpenAi(p) => p.max_tokens,
            ProfileConfig::Anthropic(p) => Some(p.max_tokens),
            ProfileConfig::Google(p) => p.max_tokens,
        }
    }

    /// `{family}-{model}` label.
    pub fn identity(&self) -> String {
        format!("{}-{}", self.family(), self.model())
    }
}

/// Defaults for the `battle` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleConfig {
    /// Number of rounds
    #[serde(default = "default_rounds")]
    pub rounds: u32,

    /// First participant's opening line; omit for a model-produced opening
    #[serde(default = "default_seed")]
    pub seed: Option<String>,

    /// Participants, by profile name, in turn order
    #[serde(default)]
    pub profiles: Vec<String>,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            rounds: default_rounds(),
            seed: default_seed(),
            profiles: Vec::new(),
        }
    }
}

impl std::fmt::Debug for ProfileBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileBase")
            .field("model", &self.model)
            .field("tone", &self.tone)
            .field("request", &self.request)
            .field("request_char_limit", &self.request_char_limit)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl AppConfig {
    /// Load configuration from the default location, then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup (highest priority).
    ///
    /// `PARLEY_PROFILE` replaces the default profile; family API key variables
    /// fill profiles that have no key of their own.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(profile) = lookup("PARLEY_PROFILE").filter(|p| !p.is_empty()) {
            self.default_profile = profile;
        }

        for profile in self.profiles.values_mut() {
            let env_key = profile.family().api_key_env();
            let base = profile.base_mut();
            if base.api_key.is_none() {
                base.api_key = lookup(env_key);
            }
        }
    }

    /// Get the config directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".parley")
    }

    /// Look up a profile; `"-"` and `""` mean the default profile.
    pub fn profile(&self, name: &str) -> Result<&ProfileConfig, ConfigError> {
        let name = self.resolve_name(name);
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))
    }

    /// Map `"-"` / `""` to the default profile name.
    pub fn resolve_name<'a>(&'a self, name: &'a str) -> &'a str {
        if name.is_empty() || name == "-" {
            &self.default_profile
        } else {
            name
        }
    }

    /// Configured profile names, sorted.
    pub fn profile_names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, profile) in &self.profiles {
            if profile.model().trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "profile '{name}' has an empty model"
                )));
            }
            if let Some(t) = profile.temperature() {
                if !(0.0..=2.0).contains(&t) {
                    return Err(ConfigError::ValidationError(format!(
                        "profile '{name}': temperature must be between 0.0 and 2.0"
                    )));
                }
            }
            if let ProfileConfig::Anthropic(p) = profile {
                if p.max_tokens == 0 {
                    return Err(ConfigError::ValidationError(format!(
                        "profile '{name}': max_tokens must be > 0"
                    )));
                }
            }
        }

        if !self.profiles.contains_key(&self.default_profile) {
            return Err(ConfigError::ValidationError(format!(
                "default_profile '{}' is not configured",
                self.default_profile
            )));
        }

        if let Some(missing) = self
            .battle
            .profiles
            .iter()
            .find(|p| !self.profiles.contains_key(self.resolve_name(p)))
        {
            return Err(ConfigError::ValidationError(format!(
                "battle profile '{missing}' is not configured"
            )));
        }

        Ok(())
    }

    /// Generate the default config as TOML.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            "gpt".to_string(),
            ProfileConfig::OpenAi(OpenAiProfile {
                base: ProfileBase::new("gpt-4o-mini", "You are a helpful assistant"),
                temperature: None,
                max_tokens: None,
            }),
        );
        profiles.insert(
            "claude".to_string(),
            ProfileConfig::Anthropic(AnthropicProfile {
                base: ProfileBase::new("claude-3-5-haiku-latest", "You are a helpful assistant"),
                temperature: 0.7,
                max_tokens: 1024,
            }),
        );
        profiles.insert(
            "gemini".to_string(),
            ProfileConfig::Google(GoogleProfile {
                base: ProfileBase::new("gemini-1.5-flash", "You are a helpful assistant"),
                temperature: None,
                max_tokens: None,
            }),
        );

        Self {
            default_profile: default_profile(),
            battle: BattleConfig {
                profiles: vec!["gpt".into(), "claude".into()],
                ..BattleConfig::default()
            },
            profiles,
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Unknown profile: {0}")]
    UnknownProfile(String),
}
