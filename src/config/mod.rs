//! Configuration and the list of followed feeds.
//!
//! Configuration is read from `config.toml` in the first directory that has
//! one: `--config-dir` if given, else `$XDG_CONFIG_HOME/twet`, the platform
//! config dir (`~/.config/twet` on Linux) and finally `~/.twet`. The cache
//! blob lives next to it.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::app::{Result, TwetError};
use crate::fetcher::http_fetcher::Identity;
use crate::output::normalize_url;

pub const CONFIG_FILE: &str = "config.toml";
pub const CACHE_FILE: &str = "cache";

/// Where followed feeds live, by nick.
pub trait SourceRegistry {
    fn address(&self, nick: &str) -> Option<&str>;

    /// Records that the feed followed as `nick` now lives at `address`.
    fn relocate(&mut self, nick: &str, address: &str) -> Result<()>;
}

impl SourceRegistry for BTreeMap<String, String> {
    fn address(&self, nick: &str) -> Option<&str> {
        self.get(nick).map(String::as_str)
    }

    fn relocate(&mut self, nick: &str, address: &str) -> Result<()> {
        self.insert(nick.to_string(), address.to_string());
        Ok(())
    }
}

/// Which part of the timeline to show by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimelineMode {
    /// Everything in the cache
    #[default]
    Full,
    /// Only records newer than the previous run
    New,
}

impl FromStr for TimelineMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "full" => Ok(Self::Full),
            "new" => Ok(Self::New),
            other => Err(format!("unexpected timeline mode: {}", other)),
        }
    }
}

impl<'de> Deserialize<'de> for TimelineMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for TimelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::New => write!(f, "new"),
        }
    }
}

/// Shell commands run around `tweet`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hooks {
    pub pre: String,
    pub post: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Our own nick, used for identity disclosure and mentions
    pub nick: String,
    /// Where our own feed is published
    pub twturl: String,
    /// Local path of our own feed file
    pub twtfile: String,
    /// nick -> address
    pub following: BTreeMap<String, String>,
    pub disclose_identity: bool,
    pub timeline: TimelineMode,
    pub hooks: Hooks,

    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Config {
    /// Loads `config.toml` from `dir`, or searches the default locations.
    pub fn load(dir: Option<&Path>) -> std::result::Result<Self, ConfigError> {
        let candidates = match dir {
            Some(dir) => vec![dir.to_path_buf()],
            None => Self::default_dirs(),
        };

        for candidate in &candidates {
            let path = candidate.join(CONFIG_FILE);
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(ConfigError::Io { path, source: e }),
            };

            tracing::debug!("using config {}", path.display());
            return Self::parse(&content, path);
        }

        Err(ConfigError::NotFound {
            searched: candidates,
        })
    }

    pub fn parse(content: &str, path: PathBuf) -> std::result::Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.clone(),
            source: e,
        })?;
        config.path = Some(path);
        Ok(config)
    }

    /// Candidate config directories, most specific first.
    pub fn default_dirs() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
            candidates.push(PathBuf::from(xdg).join("twet"));
        }
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("twet"));
        }
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".twet"));
        }

        candidates.dedup();
        candidates
    }

    /// Writes the configuration back to the file it was loaded from.
    pub fn write(&self) -> std::result::Result<(), ConfigError> {
        let path = self.path.as_ref().ok_or(ConfigError::NoPath)?;
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })
    }

    /// The cache blob sits next to the config file.
    pub fn cache_path(&self) -> std::result::Result<PathBuf, ConfigError> {
        self.path
            .as_ref()
            .and_then(|p| p.parent())
            .map(|dir| dir.join(CACHE_FILE))
            .ok_or(ConfigError::NoPath)
    }

    /// Identity to disclose in requests, if we're configured and allowed to.
    pub fn identity(&self) -> Option<Identity> {
        if !self.disclose_identity || self.nick.is_empty() || self.twturl.is_empty() {
            return None;
        }
        Some(Identity {
            nick: self.nick.clone(),
            twturl: self.twturl.clone(),
        })
    }

    /// All followed sources, or only the one followed as `nick`.
    pub fn select_sources(&self, nick: Option<&str>) -> Result<BTreeMap<String, String>> {
        match nick {
            None => Ok(self.following.clone()),
            Some(nick) => {
                let address = self
                    .address(nick)
                    .ok_or_else(|| TwetError::SourceNotFound(nick.to_string()))?;
                Ok(BTreeMap::from([(nick.to_string(), address.to_string())]))
            }
        }
    }

    /// The nick we know the feed at `url` by, ourselves included.
    pub fn url_to_nick(&self, url: &str) -> Option<&str> {
        let wanted = normalize_url(url)?;

        let followed = self
            .following
            .iter()
            .find(|(_, address)| normalize_url(address).as_deref() == Some(wanted.as_str()))
            .map(|(nick, _)| nick.as_str());

        followed.or_else(|| {
            let own = !self.nick.is_empty()
                && normalize_url(&self.twturl).as_deref() == Some(wanted.as_str());
            own.then_some(self.nick.as_str())
        })
    }

    /// True when `url` points at our own feed.
    pub fn is_own_url(&self, url: &str) -> bool {
        match (normalize_url(url), normalize_url(&self.twturl)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl SourceRegistry for Config {
    fn address(&self, nick: &str) -> Option<&str> {
        self.following.get(nick).map(String::as_str)
    }

    fn relocate(&mut self, nick: &str, address: &str) -> Result<()> {
        self.following.insert(nick.to_string(), address.to_string());
        self.write()?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file config.toml not found; looked in {searched:?}")]
    NotFound { searched: Vec<PathBuf> },

    #[error("Configuration was not loaded from a file")]
    NoPath,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
