//! Profile-scoped configuration store
//!
//! Persists named profiles (credentials, endpoint, tunables) and the pointer
//! to the active one in a single JSON document. The file is the only source
//! of truth: every read re-loads it and every write persists immediately.
//!
//! Invariants upheld by the store:
//! - a profile named [`DEFAULT_PROFILE`] always exists and cannot be removed;
//! - profile names are unique;
//! - `activeProfile` always names an existing profile.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the built-in profile
pub const DEFAULT_PROFILE: &str = "default";

/// Default request timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "FXK_CONFIG";

const TIMEOUT_ERROR: &str = "Timeout must be a positive number";

/// A named set of credentials and connection settings.
///
/// Known fields are typed; anything else set through
/// [`ProfileStore::set_profile_value`] lands in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corp_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Token expiry as epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expiry: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Request timeout in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permanent_code: Option<String>,
    /// Key used to resolve the acting user's identity before object calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_key: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Profile {
    /// Create an empty profile
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            corp_id: None,
            access_token: None,
            token_expiry: None,
            base_url: None,
            timeout: None,
            app_id: None,
            app_secret: None,
            permanent_code: None,
            lookup_key: None,
            extra: BTreeMap::new(),
        }
    }

    /// Stringified value of a field, known or extension
    pub fn get(&self, key: &str) -> Option<String> {
        match ProfileKey::parse(key) {
            Some(ProfileKey::Name) => Some(self.name.clone()),
            Some(ProfileKey::CorpId) => self.corp_id.clone(),
            Some(ProfileKey::AccessToken) => self.access_token.clone(),
            Some(ProfileKey::TokenExpiry) => self.token_expiry.map(|v| v.to_string()),
            Some(ProfileKey::BaseUrl) => self.base_url.clone(),
            Some(ProfileKey::Timeout) => self.timeout.map(|v| v.to_string()),
            Some(ProfileKey::AppId) => self.app_id.clone(),
            Some(ProfileKey::AppSecret) => self.app_secret.clone(),
            Some(ProfileKey::PermanentCode) => self.permanent_code.clone(),
            Some(ProfileKey::LookupKey) => self.lookup_key.clone(),
            None => self.extra.get(key).map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match ProfileKey::parse(key) {
            Some(ProfileKey::Name) => {
                return Err(Error::validation(
                    "Profile name cannot be changed with set",
                    "name",
                    Some(value.to_string()),
                ))
            }
            Some(ProfileKey::CorpId) => self.corp_id = Some(value.to_string()),
            Some(ProfileKey::AccessToken) => self.access_token = Some(value.to_string()),
            Some(ProfileKey::TokenExpiry) => {
                let expiry = value.trim().parse::<i64>().map_err(|_| {
                    Error::validation(
                        "Token expiry must be epoch milliseconds",
                        "tokenExpiry",
                        Some(value.to_string()),
                    )
                })?;
                self.token_expiry = Some(expiry);
            }
            Some(ProfileKey::BaseUrl) => self.base_url = Some(value.to_string()),
            Some(ProfileKey::Timeout) => self.timeout = Some(parse_timeout(value)?),
            Some(ProfileKey::AppId) => self.app_id = Some(value.to_string()),
            Some(ProfileKey::AppSecret) => self.app_secret = Some(value.to_string()),
            Some(ProfileKey::PermanentCode) => self.permanent_code = Some(value.to_string()),
            Some(ProfileKey::LookupKey) => self.lookup_key = Some(value.to_string()),
            None => {
                self.extra
                    .insert(key.to_string(), Value::String(value.to_string()));
            }
        }
        Ok(())
    }

    /// Returns whether anything was removed
    fn unset(&mut self, key: &str) -> Result<bool> {
        let removed = match ProfileKey::parse(key) {
            Some(ProfileKey::Name) => {
                return Err(Error::validation(
                    "Profile name cannot be unset",
                    "name",
                    None,
                ))
            }
            Some(ProfileKey::CorpId) => self.corp_id.take().is_some(),
            Some(ProfileKey::AccessToken) => self.access_token.take().is_some(),
            Some(ProfileKey::TokenExpiry) => self.token_expiry.take().is_some(),
            Some(ProfileKey::BaseUrl) => self.base_url.take().is_some(),
            Some(ProfileKey::Timeout) => self.timeout.take().is_some(),
            Some(ProfileKey::AppId) => self.app_id.take().is_some(),
            Some(ProfileKey::AppSecret) => self.app_secret.take().is_some(),
            Some(ProfileKey::PermanentCode) => self.permanent_code.take().is_some(),
            Some(ProfileKey::LookupKey) => self.lookup_key.take().is_some(),
            None => self.extra.remove(key).is_some(),
        };
        Ok(removed)
    }
}

/// Typed profile fields addressable by key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProfileKey {
    Name,
    CorpId,
    AccessToken,
    TokenExpiry,
    BaseUrl,
    Timeout,
    AppId,
    AppSecret,
    PermanentCode,
    LookupKey,
}

impl ProfileKey {
    /// Accepts the persisted camelCase names and their snake_case spellings
    fn parse(key: &str) -> Option<Self> {
        Some(match key {
            "name" => Self::Name,
            "corpId" | "corp_id" => Self::CorpId,
            "accessToken" | "access_token" => Self::AccessToken,
            "tokenExpiry" | "token_expiry" => Self::TokenExpiry,
            "baseUrl" | "base_url" => Self::BaseUrl,
            "timeout" => Self::Timeout,
            "appId" | "app_id" => Self::AppId,
            "appSecret" | "app_secret" => Self::AppSecret,
            "permanentCode" | "permanent_code" => Self::PermanentCode,
            "lookupKey" | "lookup_key" => Self::LookupKey,
            _ => return None,
        })
    }
}

fn parse_timeout(value: &str) -> Result<u64> {
    let parsed = value
        .trim()
        .parse::<i64>()
        .map_err(|_| Error::config(TIMEOUT_ERROR))?;
    u64::try_from(parsed).map_err(|_| Error::config(TIMEOUT_ERROR))
}

/// Root of the persisted configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub profiles: Vec<Profile>,
    pub active_profile: String,
    /// Fallback request timeout in milliseconds
    pub default_timeout: u64,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profiles: vec![Profile::new(DEFAULT_PROFILE)],
            active_profile: DEFAULT_PROFILE.to_string(),
            default_timeout: DEFAULT_TIMEOUT_MS,
            user_agent: format!("fxk-cli/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    /// Look up a profile by name
    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    fn profile_mut(&mut self, name: &str) -> Result<&mut Profile> {
        self.profiles
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| profile_not_found(name))
    }

    /// The profile the active pointer refers to
    pub fn active(&self) -> Option<&Profile> {
        self.profile(&self.active_profile)
    }

    /// Restore the store invariants; returns whether anything changed
    fn repair(&mut self) -> bool {
        let mut changed = false;

        let mut seen = std::collections::HashSet::new();
        let before = self.profiles.len();
        self.profiles.retain(|p| seen.insert(p.name.clone()));
        if self.profiles.len() != before {
            warn!("Dropped duplicate profile entries from config");
            changed = true;
        }

        if self.profile(DEFAULT_PROFILE).is_none() {
            warn!("Config has no '{}' profile, adding it", DEFAULT_PROFILE);
            self.profiles.insert(0, Profile::new(DEFAULT_PROFILE));
            changed = true;
        }

        if self.profile(&self.active_profile).is_none() {
            warn!(
                active = %self.active_profile,
                "Active profile does not exist, resetting to '{}'",
                DEFAULT_PROFILE
            );
            self.active_profile = DEFAULT_PROFILE.to_string();
            changed = true;
        }

        changed
    }
}

fn profile_not_found(name: &str) -> Error {
    Error::config(format!("Profile '{}' not found", name))
}

/// Outcome of reading the persisted config without applying any fallback
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigState {
    /// No config file exists yet
    Absent,
    /// The file exists but could not be read or parsed
    Corrupt(String),
    Valid(Config),
}

/// What [`ProfileStore::load`] does with a corrupt config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorruptConfigPolicy {
    /// Log a warning and continue with the default config
    #[default]
    UseDefaults,
    /// Fail with a configuration error
    Fail,
}

/// File-backed profile store
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
    corrupt_policy: CorruptConfigPolicy,
}

impl ProfileStore {
    /// Create a store backed by the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            corrupt_policy: CorruptConfigPolicy::default(),
        }
    }

    /// Create a store at [`ProfileStore::default_path`]
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Self::default_path()?))
    }

    /// `$FXK_CONFIG`, or `~/.fxk/config.json`
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        let home = dirs::home_dir()
            .ok_or_else(|| Error::config("Unable to determine home directory"))?;
        Ok(home.join(".fxk").join("config.json"))
    }

    pub fn with_corrupt_policy(mut self, policy: CorruptConfigPolicy) -> Self {
        self.corrupt_policy = policy;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted config, distinguishing absent, corrupt and valid
    pub fn read(&self) -> ConfigState {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == IoErrorKind::NotFound => return ConfigState::Absent,
            Err(e) => return ConfigState::Corrupt(format!("unreadable: {}", e)),
        };

        match serde_json::from_str::<Config>(&content) {
            Ok(config) => ConfigState::Valid(config),
            Err(e) => ConfigState::Corrupt(e.to_string()),
        }
    }

    /// Load the config, applying defaults for an absent file and the
    /// configured policy for a corrupt one
    pub fn load(&self) -> Result<Config> {
        match self.read() {
            ConfigState::Absent => {
                debug!(path = %self.path.display(), "No config file, using defaults");
                Ok(Config::default())
            }
            ConfigState::Corrupt(reason) => match self.corrupt_policy {
                CorruptConfigPolicy::UseDefaults => {
                    warn!(
                        path = %self.path.display(),
                        reason = %reason,
                        "Config file is corrupt, falling back to defaults"
                    );
                    Ok(Config::default())
                }
                CorruptConfigPolicy::Fail => Err(Error::config(format!(
                    "Config file {} is corrupt: {}",
                    self.path.display(),
                    reason
                ))),
            },
            ConfigState::Valid(mut config) => {
                config.repair();
                Ok(config)
            }
        }
    }

    /// Persist the whole config, replacing the file in one rename
    pub fn save(&self, config: &Config) -> Result<()> {
        let io_err = |e: std::io::Error| {
            Error::config(format!(
                "Failed to save config to {}: {}",
                self.path.display(),
                e
            ))
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let mut content = serde_json::to_string_pretty(config)
            .map_err(|e| Error::config(format!("Failed to serialize config: {}", e)))?;
        content.push('\n');

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content).map_err(io_err)?;
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(io_err(e));
        }

        debug!(path = %self.path.display(), "Config saved");
        Ok(())
    }

    /// Load, mutate and persist in one step
    fn update<T>(&self, f: impl FnOnce(&mut Config) -> Result<T>) -> Result<T> {
        let mut config = self.load()?;
        let out = f(&mut config)?;
        self.save(&config)?;
        Ok(out)
    }

    /// The active profile; `None` is a normal outcome, not an error
    pub fn get_active_profile(&self) -> Result<Option<Profile>> {
        let config = self.load()?;
        Ok(config.active().cloned())
    }

    pub fn set_active_profile(&self, name: &str) -> Result<()> {
        self.update(|config| {
            if config.profile(name).is_none() {
                return Err(profile_not_found(name));
            }
            config.active_profile = name.to_string();
            Ok(())
        })
    }

    /// Set a field on a profile. `timeout` must be a non-negative integer.
    pub fn set_profile_value(&self, name: &str, key: &str, value: &str) -> Result<()> {
        self.update(|config| config.profile_mut(name)?.set(key, value))
    }

    pub fn get_profile_value(&self, name: &str, key: &str) -> Result<Option<String>> {
        let config = self.load()?;
        let profile = config.profile(name).ok_or_else(|| profile_not_found(name))?;
        Ok(profile.get(key))
    }

    /// Remove a field from a profile; returns whether it was set
    pub fn unset_profile_value(&self, name: &str, key: &str) -> Result<bool> {
        self.update(|config| config.profile_mut(name)?.unset(key))
    }

    pub fn add_profile(&self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation(
                "Profile name cannot be empty",
                "name",
                None,
            ));
        }
        self.update(|config| {
            if config.profile(name).is_some() {
                return Err(Error::config(format!("Profile '{}' already exists", name)));
            }
            config.profiles.push(Profile::new(name));
            Ok(())
        })
    }

    /// Remove a profile. The default profile can never be removed; removing
    /// the active profile makes `default` active.
    pub fn remove_profile(&self, name: &str) -> Result<()> {
        if name == DEFAULT_PROFILE {
            return Err(Error::config(format!(
                "Cannot remove the '{}' profile",
                DEFAULT_PROFILE
            )));
        }
        self.update(|config| {
            if config.profile(name).is_none() {
                return Err(profile_not_found(name));
            }
            config.profiles.retain(|p| p.name != name);
            if config.active_profile == name {
                config.active_profile = DEFAULT_PROFILE.to_string();
            }
            Ok(())
        })
    }

    /// All profiles paired with whether each is active
    pub fn list_profiles(&self) -> Result<Vec<(Profile, bool)>> {
        let config = self.load()?;
        let active = config.active_profile.clone();
        Ok(config
            .profiles
            .into_iter()
            .map(|p| {
                let is_active = p.name == active;
                (p, is_active)
            })
            .collect())
    }
}
