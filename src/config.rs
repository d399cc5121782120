use std::env;
use std::fmt;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::cli::Invocation;
use crate::codec::SecretCodec;
use crate::error::ConfigError;
use crate::keystore::KeyStore;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "llama3-70b-8192";
const DEFAULT_MAX_TOKENS: u32 = 150;
const APP_DIR_NAME: &str = "parley";
const CONFIG_FILE: &str = "config.json";
const RESOLVE_ATTEMPTS: usize = 2;

/// Where the config record and key pair live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    dir: PathBuf,
}

impl ConfigPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|key| env::var(key).ok(), dirs::config_dir)
    }

    fn from_env_with(
        mut get_var: impl FnMut(&str) -> Option<String>,
        default_root: impl FnOnce() -> Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        if let Some(dir) = non_empty(get_var("PARLEY_CONFIG_DIR")) {
            return Ok(Self::new(dir));
        }
        default_root()
            .map(|root| Self::new(root.join(APP_DIR_NAME)))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }
}

/// On-disk shape of `config.json`. Secret fields hold base64 ciphertext.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    #[serde(rename = "apiKey")]
    api_key: String,
    #[serde(rename = "baseURL", default, skip_serializing_if = "Option::is_none")]
    base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model: Option<String>,
}

/// A decrypted config record.
#[derive(Clone, PartialEq, Eq)]
pub struct StoredConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

impl fmt::Debug for StoredConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

/// Environment overrides, captured once per run.
#[derive(Clone, PartialEq, Eq)]
pub struct EnvOverrides {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub max_tokens: u32,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self::from_env_with(|key| env::var(key).ok())
    }

    pub fn from_env_with(mut get_var: impl FnMut(&str) -> Option<String>) -> Self {
        Self {
            api_key: non_empty(get_var("API_KEY")),
            base_url: non_empty(get_var("API_BASE_URL")),
            model: non_empty(get_var("MODEL")),
            max_tokens: parse_max_tokens(get_var("MAX_TOKENS").as_deref()),
        }
    }
}

impl Default for EnvOverrides {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: None,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl fmt::Debug for EnvOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvOverrides")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// The configuration actually used for one run. Never persisted.
#[derive(Clone, PartialEq)]
pub struct EffectiveSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl fmt::Debug for EffectiveSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectiveSettings")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Interactive source for a missing API key.
pub trait SecretPrompt {
    fn api_key(&mut self) -> io::Result<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl SecretPrompt for TerminalPrompt {
    fn api_key(&mut self) -> io::Result<String> {
        dialoguer::Password::new()
            .with_prompt("Enter your API key")
            .interact()
            .map_err(io::Error::other)
    }
}

/// Persists the config record with its secrets encrypted by the local key
/// pair, and resolves [`EffectiveSettings`] from flags, environment and the
/// stored record.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    paths: ConfigPaths,
    codec: SecretCodec,
}

impl ConfigStore {
    pub fn new(paths: ConfigPaths) -> Self {
        let codec = SecretCodec::new(KeyStore::new(paths.dir()));
        Self { paths, codec }
    }

    pub fn with_key_bits(self, bits: usize) -> Self {
        let codec = SecretCodec::new(KeyStore::new(self.paths.dir()).with_bits(bits));
        Self { codec, ..self }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn keys(&self) -> &KeyStore {
        self.codec.keys()
    }

    /// Returns `None` when no config file exists. Decryption failures are
    /// returned as errors, never as `None`.
    pub fn load(&self) -> Result<Option<StoredConfig>, ConfigError> {
        let path = self.paths.config_file();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(ConfigError::io(path, err)),
        };

        let record: StoredRecord = serde_json::from_str(&raw)
            .map_err(|source| ConfigError::Malformed { path, source })?;

        let api_key = self.codec.decrypt(&record.api_key)?;
        let base_url = record
            .base_url
            .as_deref()
            .map(|ciphertext| self.codec.decrypt(ciphertext))
            .transpose()?;

        Ok(Some(StoredConfig {
            api_key,
            base_url,
            model: record.model,
        }))
    }

    /// Overwrites the config file. The write goes through a temporary file
    /// and a rename so readers never see a torn record.
    pub fn save(&self, api_key: &str, base_url: &str, model: &str) -> Result<(), ConfigError> {
        let record = StoredRecord {
            api_key: self.codec.encrypt(api_key)?,
            base_url: Some(self.codec.encrypt(base_url)?),
            model: Some(model.to_string()),
        };
        let content = serde_json::to_string_pretty(&record)
            .map_err(|err| ConfigError::io(self.paths.config_file(), io::Error::other(err)))?;

        let dir = self.paths.dir();
        fs::create_dir_all(dir).map_err(|err| ConfigError::io(dir, err))?;

        let config_file = self.paths.config_file();
        let tmp_file = dir.join(format!(".config-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp_file, content).map_err(|err| ConfigError::io(&tmp_file, err))?;
        fs::rename(&tmp_file, &config_file).map_err(|err| {
            let _ = fs::remove_file(&tmp_file);
            ConfigError::io(&config_file, err)
        })?;

        debug!(path = %config_file.display(), model = %model, "saved configuration");
        Ok(())
    }

    /// Resolves each field independently: flag, then environment, then the
    /// stored record. A missing API key triggers one prompt-and-save followed
    /// by a single re-resolution.
    pub fn resolve(
        &self,
        invocation: &Invocation,
        env: &EnvOverrides,
        prompt: &mut dyn SecretPrompt,
    ) -> Result<EffectiveSettings, ConfigError> {
        for attempt in 1..=RESOLVE_ATTEMPTS {
            let stored = self.load()?;
            let base_url = resolve_base_url(invocation, env, stored.as_ref());
            let model = resolve_model(invocation, env, stored.as_ref());
            let api_key = first_present([
                invocation.api_key.as_deref(),
                env.api_key.as_deref(),
                stored.as_ref().map(|cfg| cfg.api_key.as_str()),
            ]);

            if let Some(api_key) = api_key {
                info!(model = %model, temperature = invocation.temperature, "resolved runtime configuration");
                return Ok(EffectiveSettings {
                    api_key: api_key.to_string(),
                    base_url,
                    model,
                    temperature: invocation.temperature,
                    max_tokens: env.max_tokens,
                });
            }

            if attempt == RESOLVE_ATTEMPTS {
                break;
            }

            if stored.is_none() {
                info!(dir = %self.paths.dir().display(), "no stored configuration; running first-time setup");
                self.keys().generate_key_pair()?;
            }
            self.prompt_and_save(prompt, &base_url, &model)?;
        }

        Err(ConfigError::MissingApiKey)
    }

    /// Deletes the stored record, rotates the key pair and asks for a new API
    /// key. Ciphertext written before the reset can no longer be decrypted.
    pub fn reset(
        &self,
        invocation: &Invocation,
        env: &EnvOverrides,
        prompt: &mut dyn SecretPrompt,
    ) -> Result<(), ConfigError> {
        let config_file = self.paths.config_file();
        match fs::remove_file(&config_file) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(ConfigError::io(config_file, err)),
        }
        info!(dir = %self.paths.dir().display(), "reset stored configuration");

        self.keys().generate_key_pair()?;
        let base_url = resolve_base_url(invocation, env, None);
        let model = resolve_model(invocation, env, None);
        self.prompt_and_save(prompt, &base_url, &model)
    }

    fn prompt_and_save(
        &self,
        prompt: &mut dyn SecretPrompt,
        base_url: &str,
        model: &str,
    ) -> Result<(), ConfigError> {
        let entered = prompt.api_key().map_err(ConfigError::Prompt)?;
        let api_key = entered.trim();
        if api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        self.save(api_key, base_url, model)
    }
}

fn resolve_base_url(
    invocation: &Invocation,
    env: &EnvOverrides,
    stored: Option<&StoredConfig>,
) -> String {
    first_present([
        invocation.base_url.as_deref(),
        env.base_url.as_deref(),
        stored.and_then(|cfg| cfg.base_url.as_deref()),
    ])
    .unwrap_or(DEFAULT_BASE_URL)
    .to_string()
}

fn resolve_model(
    invocation: &Invocation,
    env: &EnvOverrides,
    stored: Option<&StoredConfig>,
) -> String {
    first_present([
        invocation.model.as_deref(),
        env.model.as_deref(),
        stored.and_then(|cfg| cfg.model.as_deref()),
    ])
    .unwrap_or(DEFAULT_MODEL)
    .to_string()
}

fn first_present<'a>(candidates: [Option<&'a str>; 3]) -> Option<&'a str> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_max_tokens(raw: Option<&str>) -> u32 {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_MAX_TOKENS)
}
