use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;

/// Separates alias entries in the `aliases` preference
pub const ALIAS_FIELD_SEPARATOR: char = ';';
/// Separates the short token from the command inside one alias entry
pub const ALIAS_VALUE_SEPARATOR: char = ':';

const MAX_CONSISTENCY_DELAY: f64 = 5.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("preferences file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse preferences: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot write preferences: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("malformed alias entry '{0}', expected 'short:command'")]
    MalformedAlias(String),
    #[error("unknown preference '{0}'")]
    UnknownKey(String),
    #[error("invalid value '{value}' for '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Raw user preferences as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Launcher keyword that activates the extension
    #[serde(default = "default_keyword")]
    pub keyword: String,
    /// `short:command` pairs separated by `;`
    #[serde(default = "default_aliases")]
    pub aliases: String,
    /// Results per search category and history length
    #[serde(default = "default_result_limit")]
    pub result_limit: u32,
    /// Seconds to wait after a mutation before re-reading playback state
    #[serde(default = "default_consistency_delay")]
    pub consistency_delay: f64,
    /// Local port for the authorization redirect
    #[serde(default = "default_auth_port")]
    pub auth_port: u16,
    /// Append a help shortcut to the now-playing menu
    #[serde(default = "default_show_help")]
    pub show_help: bool,
}

fn default_keyword() -> String {
    "sp".to_string()
}

fn default_aliases() -> String {
    "s:search; song:track".to_string()
}

fn default_result_limit() -> u32 {
    7
}

fn default_consistency_delay() -> f64 {
    0.5
}

fn default_auth_port() -> u16 {
    8080
}

fn default_show_help() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            keyword: default_keyword(),
            aliases: default_aliases(),
            result_limit: default_result_limit(),
            consistency_delay: default_consistency_delay(),
            auth_port: default_auth_port(),
            show_help: default_show_help(),
        }
    }
}

impl Settings {
    /// Current value of a preference, rendered as text
    pub fn get(&self, key: &str) -> Result<String, ConfigError> {
        let value = match key {
            "keyword" => self.keyword.clone(),
            "aliases" => self.aliases.clone(),
            "result_limit" => self.result_limit.to_string(),
            "consistency_delay" => self.consistency_delay.to_string(),
            "auth_port" => self.auth_port.to_string(),
            "show_help" => self.show_help.to_string(),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        };
        Ok(value)
    }

    /// Copy of these settings with one preference replaced
    pub fn with_value(&self, key: &str, value: &str) -> Result<Settings, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };
        let mut next = self.clone();
        match key {
            "keyword" => next.keyword = value.trim().to_string(),
            "aliases" => next.aliases = value.to_string(),
            "result_limit" => {
                next.result_limit = value.trim().parse().map_err(|_| invalid("not a number"))?
            }
            "consistency_delay" => {
                next.consistency_delay =
                    value.trim().parse().map_err(|_| invalid("not a number"))?
            }
            "auth_port" => {
                next.auth_port = value.trim().parse().map_err(|_| invalid("not a port"))?
            }
            "show_help" => {
                next.show_help = value.trim().parse().map_err(|_| invalid("expected true/false"))?
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(next)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, value: String, reason: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
            reason: reason.to_string(),
        };
        if self.keyword.is_empty() || self.keyword.contains(char::is_whitespace) {
            return Err(invalid("keyword", self.keyword.clone(), "must be a single word"));
        }
        if !(1..=crate::remote::MAX_PAGE_LIMIT).contains(&self.result_limit) {
            return Err(invalid(
                "result_limit",
                self.result_limit.to_string(),
                "must be between 1 and 50",
            ));
        }
        if !(0.0..=MAX_CONSISTENCY_DELAY).contains(&self.consistency_delay) {
            return Err(invalid(
                "consistency_delay",
                self.consistency_delay.to_string(),
                "must be between 0 and 5 seconds",
            ));
        }
        if self.auth_port == 0 {
            return Err(invalid("auth_port", "0".to_string(), "must not be 0"));
        }
        Ok(())
    }
}

/// Short tokens mapped to canonical command names
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AliasTable {
    aliases: HashMap<String, String>,
}

impl AliasTable {
    /// Parse `s:search; song:track`. Empty fields are skipped.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut aliases = HashMap::new();
        for field in text.split(ALIAS_FIELD_SEPARATOR) {
            let field = field.trim();
            if field.is_empty() {
                continue;
            }
            let mut parts = field.split(ALIAS_VALUE_SEPARATOR);
            let (short, command) = match (parts.next(), parts.next(), parts.next()) {
                (Some(short), Some(command), None) => (short.trim(), command.trim()),
                _ => return Err(ConfigError::MalformedAlias(field.to_string())),
            };
            if short.is_empty()
                || command.is_empty()
                || short.contains(char::is_whitespace)
                || command.contains(char::is_whitespace)
            {
                return Err(ConfigError::MalformedAlias(field.to_string()));
            }
            aliases.insert(short.to_string(), command.to_string());
        }
        Ok(AliasTable { aliases })
    }

    /// The canonical command for `token`, or `token` itself when it is not an alias
    pub fn resolve<'a>(&'a self, token: &'a str) -> &'a str {
        self.aliases.get(token).map(String::as_str).unwrap_or(token)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// Validated settings together with the alias table built from them
#[derive(Debug, Clone, PartialEq)]
pub struct Preferences {
    settings: Settings,
    aliases: AliasTable,
}

impl Preferences {
    pub fn from_settings(settings: Settings) -> Result<Self, ConfigError> {
        settings.validate()?;
        let aliases = AliasTable::parse(&settings.aliases)?;
        Ok(Preferences { settings, aliases })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn keyword(&self) -> &str {
        &self.settings.keyword
    }

    pub fn result_limit(&self) -> u32 {
        self.settings.result_limit
    }

    pub fn consistency_delay(&self) -> Duration {
        Duration::from_secs_f64(self.settings.consistency_delay)
    }

    pub fn auth_port(&self) -> u16 {
        self.settings.auth_port
    }

    pub fn show_help(&self) -> bool {
        self.settings.show_help
    }
}

impl Default for Preferences {
    fn default() -> Self {
        let settings = Settings::default();
        let aliases = AliasTable::parse(&settings.aliases).unwrap_or_default();
        Preferences { settings, aliases }
    }
}

/// Process-wide preferences, swapped as a whole on every change
pub struct PreferenceStore {
    current: RwLock<Arc<Preferences>>,
    path: Option<PathBuf>,
}

impl PreferenceStore {
    /// Store that never touches the disk
    pub fn in_memory(preferences: Preferences) -> Self {
        PreferenceStore {
            current: RwLock::new(Arc::new(preferences)),
            path: None,
        }
    }

    /// Load from `path`, writing the defaults there when the file is missing
    pub fn load(path: PathBuf) -> Result<Self, ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.clone(),
            source,
        };

        let settings = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(io_err)?;
            toml::from_str(&content)?
        } else {
            log::info!("No preferences at {}, writing defaults", path.display());
            let settings = Settings::default();
            write_settings(&path, &settings)?;
            settings
        };

        let preferences = Preferences::from_settings(settings)?;
        log::debug!(
            "Loaded preferences: keyword '{}', {} alias(es)",
            preferences.keyword(),
            preferences.aliases().len()
        );
        Ok(PreferenceStore {
            current: RwLock::new(Arc::new(preferences)),
            path: Some(path),
        })
    }

    /// `<config dir>/spotify-launcher/preferences.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("spotify-launcher")
            .join("preferences.toml")
    }

    /// The preferences in force right now; hold on to it for one operation
    pub fn current(&self) -> Arc<Preferences> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&*guard),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    /// Handle a preference-change notification.
    ///
    /// The new set (including a rebuilt alias table) is validated in full before
    /// it replaces the old one, so a bad value leaves the previous preferences in force.
    pub fn apply_change(&self, key: &str, old: &str, new: &str) -> Result<(), ConfigError> {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let found = guard.settings().get(key)?;
        if found != old {
            // The host's view is the source of truth; note the drift and carry on
            log::warn!(
                "Preference '{}' was '{}' but the change notification says '{}'",
                key,
                found,
                old
            );
        }

        let settings = guard.settings().with_value(key, new)?;
        let preferences = Preferences::from_settings(settings)?;
        if let Some(path) = &self.path {
            write_settings(path, preferences.settings())?;
        }
        log::debug!("Preference '{}' changed from '{}' to '{}'", key, old, new);
        *guard = Arc::new(preferences);
        Ok(())
    }
}

fn write_settings(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let content = toml::to_string_pretty(settings)?;
    std::fs::write(path, content).map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let prefs = Preferences::default();
        assert_eq!(prefs.keyword(), "sp");
        assert_eq!(prefs.result_limit(), 7);
        assert_eq!(prefs.consistency_delay(), Duration::from_millis(500));
        assert_eq!(prefs.auth_port(), 8080);
        assert!(prefs.show_help());
        assert_eq!(prefs.aliases().resolve("s"), "search");
        assert_eq!(prefs.aliases().resolve("song"), "track");
    }

    #[test]
    fn test_alias_parsing() {
        let table = AliasTable::parse(" s : search ;; v:volume; ").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.resolve("s"), "search");
        assert_eq!(table.resolve("v"), "volume");
        assert_eq!(table.resolve("track"), "track");

        assert!(AliasTable::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_alias_is_rejected() {
        for bad in ["s", "s:", ":search", "a:b:c", "two words:search"] {
            assert!(
                matches!(AliasTable::parse(bad), Err(ConfigError::MalformedAlias(_))),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_load_writes_defaults_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs").join("preferences.toml");

        let store = PreferenceStore::load(path.clone()).unwrap();
        assert!(path.exists());
        assert_eq!(store.current().settings(), &Settings::default());

        std::fs::write(&path, "keyword = \"spot\"\nresult_limit = 3\n").unwrap();
        let store = PreferenceStore::load(path).unwrap();
        assert_eq!(store.current().keyword(), "spot");
        assert_eq!(store.current().result_limit(), 3);
        // Missing keys fall back to defaults
        assert_eq!(store.current().auth_port(), 8080);
    }

    #[test]
    fn test_load_rejects_malformed_aliases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");
        std::fs::write(&path, "aliases = \"s=search\"\n").unwrap();
        assert!(matches!(
            PreferenceStore::load(path),
            Err(ConfigError::MalformedAlias(_))
        ));
    }

    #[test]
    fn test_apply_change_replaces_whole_set() {
        let store = PreferenceStore::in_memory(Preferences::default());
        let before = store.current();

        store.apply_change("aliases", "s:search; song:track", "x:shuffle").unwrap();
        let after = store.current();

        // Readers holding the old Arc keep a consistent view
        assert_eq!(before.aliases().resolve("s"), "search");
        assert_eq!(after.aliases().resolve("s"), "s");
        assert_eq!(after.aliases().resolve("x"), "shuffle");
    }

    #[test]
    fn test_invalid_change_keeps_previous_preferences() {
        let store = PreferenceStore::in_memory(Preferences::default());

        assert!(store.apply_change("result_limit", "7", "0").is_err());
        assert!(store.apply_change("result_limit", "7", "lots").is_err());
        assert!(store.apply_change("aliases", "", "broken").is_err());
        assert!(matches!(
            store.apply_change("colour", "", "blue"),
            Err(ConfigError::UnknownKey(_))
        ));

        let prefs = store.current();
        assert_eq!(prefs.result_limit(), 7);
        assert_eq!(prefs.aliases().resolve("s"), "search");
    }

    #[test]
    fn test_apply_change_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");
        let store = PreferenceStore::load(path.clone()).unwrap();

        store.apply_change("consistency_delay", "0.5", "1.5").unwrap();
        assert_eq!(store.current().consistency_delay(), Duration::from_millis(1500));

        let reloaded = PreferenceStore::load(path).unwrap();
        assert_eq!(reloaded.current().settings().consistency_delay, 1.5);
    }
}
