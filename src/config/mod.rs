//! Project discovery and layered settings.
//!
//! The project root is resolved once at startup into a [`ProjectContext`]
//! and passed by value to whatever needs paths; nothing is cached in
//! process globals.
//!
//! Settings come from layers merged lowest to highest: built-in defaults,
//! `.loopwork/config.yaml`, `LOOPWORK_*` environment variables, then CLI
//! flags.

use crate::error::{LoopError, Result};
use crate::model::Backend;
use crate::storage::{StateStore, local_id_pattern};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the state directory at the project root.
pub const STATE_DIR_NAME: &str = ".loopwork";
const ISSUES_DIR_NAME: &str = "issues";
const CONFIG_FILE_NAME: &str = "config.yaml";
/// Environment variable naming the state directory directly.
pub const DIR_ENV: &str = "LOOPWORK_DIR";
const ENV_PREFIX: &str = "LOOPWORK_";

const DEFAULT_PREFIX: &str = "LOC";

/// Resolved locations for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectContext {
    pub project_root: PathBuf,
    pub state_dir: PathBuf,
}

impl ProjectContext {
    /// Context for a project rooted at `project_root`.
    #[must_use]
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        let state_dir = project_root.join(STATE_DIR_NAME);
        Self {
            project_root,
            state_dir,
        }
    }

    /// Context for an explicitly named state directory.
    #[must_use]
    pub fn from_state_dir(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        let project_root = state_dir
            .parent()
            .map_or_else(|| state_dir.clone(), Path::to_path_buf);
        Self {
            project_root,
            state_dir,
        }
    }

    /// Locate the project.
    ///
    /// Honors `LOOPWORK_DIR` when set, otherwise walks up from `start` (or
    /// the CWD) looking for an existing `.loopwork` directory, and failing
    /// that for the nearest `.git` marker.
    ///
    /// # Errors
    ///
    /// Returns [`LoopError::NotInitialized`] if neither marker is found, or
    /// an I/O error if the CWD cannot be read.
    pub fn discover(start: Option<&Path>) -> Result<Self> {
        let env_override = env::var(DIR_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        Self::discover_with_env(start, env_override.as_deref())
    }

    fn discover_with_env(start: Option<&Path>, env_override: Option<&Path>) -> Result<Self> {
        if let Some(path) = env_override {
            debug!(state_dir = %path.display(), "Using state directory from environment");
            return Ok(Self::from_state_dir(path));
        }

        let start = match start {
            Some(path) => path.to_path_buf(),
            None => env::current_dir()?,
        };

        let mut git_root = None;
        let mut current = start.clone();
        loop {
            if current.join(STATE_DIR_NAME).is_dir() {
                return Ok(Self::new(current));
            }
            if git_root.is_none() && current.join(".git").exists() {
                git_root = Some(current.clone());
            }
            if !current.pop() {
                break;
            }
        }

        git_root
            .map(Self::new)
            .ok_or(LoopError::NotInitialized { path: start })
    }

    #[must_use]
    pub fn issues_dir(&self) -> PathBuf {
        self.state_dir.join(ISSUES_DIR_NAME)
    }

    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.state_dir.join(CONFIG_FILE_NAME)
    }

    /// State store over this project's issues directory.
    #[must_use]
    pub fn store(&self) -> StateStore {
        StateStore::new(self.issues_dir())
    }
}

/// One source of settings as flat `key -> value` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLayer {
    pub values: HashMap<String, String>,
}

impl ConfigLayer {
    /// Merge another layer on top of this one (higher precedence wins).
    pub fn merge_from(&mut self, other: &Self) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Merge multiple layers in precedence order (lowest to highest).
    #[must_use]
    pub fn merge_layers(layers: &[Self]) -> Self {
        let mut merged = Self::default();
        for layer in layers {
            merged.merge_from(layer);
        }
        merged
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&normalize_key(key)).map(String::as_str)
    }

    fn insert(&mut self, key: &str, value: String) {
        self.values.insert(normalize_key(key), value);
    }

    /// Build a layer from a YAML file path. Missing files return empty config.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let value: serde_yaml::Value = serde_yaml::from_str(&contents)?;
        let mut flat = HashMap::new();
        flatten_yaml(&value, "", &mut flat);

        let mut layer = Self::default();
        for (key, value) in flat {
            layer.insert(&key, value);
        }
        Ok(layer)
    }

    /// Build a layer from `LOOPWORK_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(env::vars())
    }

    fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut layer = Self::default();
        for (key, value) in vars {
            if key == DIR_ENV {
                continue;
            }
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layer.insert(stripped, value);
            }
        }
        layer
    }
}

/// Settings given on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub prefix: Option<String>,
    pub backend: Option<String>,
}

impl CliOverrides {
    #[must_use]
    pub fn as_layer(&self) -> ConfigLayer {
        let mut layer = ConfigLayer::default();
        if let Some(prefix) = &self.prefix {
            layer.insert("prefix", prefix.clone());
        }
        if let Some(backend) = &self.backend {
            layer.insert("backend", backend.clone());
        }
        layer
    }
}

/// Typed settings after all layers are merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Prefix of locally minted issue ids.
    pub prefix: String,
    pub backend: Backend,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            backend: Backend::default(),
        }
    }
}

impl Settings {
    /// Read typed settings out of a merged layer.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix is blank or malformed, or the backend
    /// is unknown.
    pub fn from_layer(layer: &ConfigLayer) -> Result<Self> {
        let defaults = Self::default();
        let prefix = layer
            .get("prefix")
            .map_or(defaults.prefix, |value| value.trim().to_string());
        local_id_pattern(&prefix)?;

        let backend = match layer.get("backend") {
            Some(value) => value.parse()?,
            None => defaults.backend,
        };

        Ok(Self { prefix, backend })
    }
}

/// The built-in lowest layer.
#[must_use]
pub fn default_config_layer() -> ConfigLayer {
    let defaults = Settings::default();
    let mut layer = ConfigLayer::default();
    layer.insert("prefix", defaults.prefix);
    layer.insert("backend", defaults.backend.as_str().to_string());
    layer
}

/// Load settings for `context` with full precedence.
///
/// # Errors
///
/// Returns an error if `config.yaml` exists but cannot be parsed, or a
/// merged value is invalid.
pub fn load_settings(context: &ProjectContext, cli: &CliOverrides) -> Result<Settings> {
    let merged = ConfigLayer::merge_layers(&[
        default_config_layer(),
        ConfigLayer::from_yaml(&context.config_path())?,
        ConfigLayer::from_env(),
        cli.as_layer(),
    ]);
    let settings = Settings::from_layer(&merged)?;
    debug!(prefix = %settings.prefix, backend = %settings.backend, "Settings loaded");
    Ok(settings)
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace('_', "-")
}

fn flatten_yaml(value: &serde_yaml::Value, prefix: &str, out: &mut HashMap<String, String>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (key, value) in map {
                let Some(key_str) = key.as_str() else {
                    continue;
                };
                let next_prefix = if prefix.is_empty() {
                    key_str.to_string()
                } else {
                    format!("{prefix}.{key_str}")
                };
                flatten_yaml(value, &next_prefix, out);
            }
        }
        serde_yaml::Value::Sequence(values) => {
            let joined = values
                .iter()
                .filter_map(yaml_scalar_to_string)
                .collect::<Vec<_>>()
                .join(",");
            out.insert(prefix.to_string(), joined);
        }
        _ => {
            if let Some(value) = yaml_scalar_to_string(value) {
                out.insert(prefix.to_string(), value);
            }
        }
    }
}

fn yaml_scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Bool(v) => Some(v.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Null
        | serde_yaml::Value::Sequence(_)
        | serde_yaml::Value::Mapping(_) => None,
        serde_yaml::Value::Tagged(tagged) => yaml_scalar_to_string(&tagged.value),
    }
}
