//! Configuration loading for the playbook crate.
//!
//! Configuration follows a precedence chain:
//! 1. Environment variables (highest priority)
//! 2. Project config (`.playbook/config.toml`)
//! 3. User config (`~/.playbook/config.toml`)
//! 4. Defaults (lowest priority)
//!
//! All configuration is optional. A cycle runs with defaults when no config
//! exists.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{FailOpen, PlaybookError, Result};

/// Model used for every stage unless configured otherwise.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Main configuration struct.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Model names handed to the collaborator per stage.
    pub models: ModelsConfig,
    /// Limits applied while running a cycle.
    pub pipeline: PipelineConfig,
    /// Where histories are stored.
    pub storage: StorageConfig,
}

/// Model names per stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelsConfig {
    /// Model for the produce stage.
    pub generator: String,
    /// Model for the critique stage.
    pub reflector: String,
    /// Model for the reconcile stage.
    pub curator: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            generator: DEFAULT_MODEL.to_string(),
            reflector: DEFAULT_MODEL.to_string(),
            curator: DEFAULT_MODEL.to_string(),
        }
    }
}

/// Per-cycle limits.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum edit operations applied per cycle (0 = unlimited).
    pub max_operations: usize,
    /// Maximum outcome tags applied per cycle (0 = unlimited).
    pub max_tags: usize,
}

/// History storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for history files. Defaults to `<playbook_home>/histories`.
    pub histories_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration with full precedence chain.
    pub fn load() -> Self {
        match env::current_dir() {
            Ok(cwd) => Self::load_from_cwd(&cwd),
            Err(_) => {
                let mut config = Config::default();
                if let Some(user_config) = Self::load_user_config() {
                    config = config.merge(user_config);
                }
                config.apply_env_overrides();
                config
            }
        }
    }

    /// Load configuration with a specific working directory.
    pub fn load_from_cwd(cwd: &Path) -> Self {
        let mut config = Config::default();

        if let Some(user_config) = Self::load_user_config() {
            config = config.merge(user_config);
        }

        if let Some(project_config) = Self::load_project_config(cwd) {
            config = config.merge(project_config);
        }

        config.apply_env_overrides();

        config
    }

    /// Load user config from `<playbook_home>/config.toml`.
    fn load_user_config() -> Option<Config> {
        let home = playbook_home()?;
        Self::load_if_present(&home.join("config.toml"))
    }

    /// Load project config from `.playbook/config.toml` under the project root.
    fn load_project_config(cwd: &Path) -> Option<Config> {
        let config_path = project_playbook_dir(cwd).join("config.toml");
        Self::load_if_present(&config_path)
    }

    /// A missing file is skipped quietly; an unreadable one is logged and skipped.
    fn load_if_present(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        Self::load_from_file(path)
            .map(Some)
            .fail_open_default(&format!("loading {}", path.display()))
    }

    /// Load config from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| PlaybookError::storage(path, e))?;
        toml::from_str(&content).map_err(|e| PlaybookError::config(e.to_string()))
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("PLAYBOOK_GENERATOR_MODEL") {
            override_model(&mut self.models.generator, "PLAYBOOK_GENERATOR_MODEL", val);
        }
        if let Ok(val) = env::var("PLAYBOOK_REFLECTOR_MODEL") {
            override_model(&mut self.models.reflector, "PLAYBOOK_REFLECTOR_MODEL", val);
        }
        if let Ok(val) = env::var("PLAYBOOK_CURATOR_MODEL") {
            override_model(&mut self.models.curator, "PLAYBOOK_CURATOR_MODEL", val);
        }

        if let Ok(val) = env::var("PLAYBOOK_MAX_OPERATIONS") {
            match val.parse::<usize>() {
                Ok(n) => self.pipeline.max_operations = n,
                Err(_) => eprintln!(
                    "Warning: Invalid PLAYBOOK_MAX_OPERATIONS value '{}'. \
                    Expected a non-negative integer. Using '{}'.",
                    val, self.pipeline.max_operations
                ),
            }
        }

        if let Ok(val) = env::var("PLAYBOOK_MAX_TAGS") {
            match val.parse::<usize>() {
                Ok(n) => self.pipeline.max_tags = n,
                Err(_) => eprintln!(
                    "Warning: Invalid PLAYBOOK_MAX_TAGS value '{}'. \
                    Expected a non-negative integer. Using '{}'.",
                    val, self.pipeline.max_tags
                ),
            }
        }

        if let Ok(val) = env::var("PLAYBOOK_HISTORIES_DIR") {
            if val.is_empty() {
                eprintln!("Warning: PLAYBOOK_HISTORIES_DIR is empty. Ignoring.");
            } else {
                self.storage.histories_dir = Some(PathBuf::from(val));
            }
        }
    }

    /// Merge another config into this one.
    ///
    /// Non-default fields of `other` win. A layer cannot set a value back to
    /// its default to undo a lower layer; each layer only needs to list its
    /// customizations.
    fn merge(mut self, other: Config) -> Self {
        let default_models = ModelsConfig::default();
        if other.models.generator != default_models.generator {
            self.models.generator = other.models.generator;
        }
        if other.models.reflector != default_models.reflector {
            self.models.reflector = other.models.reflector;
        }
        if other.models.curator != default_models.curator {
            self.models.curator = other.models.curator;
        }

        if other.pipeline.max_operations != 0 {
            self.pipeline.max_operations = other.pipeline.max_operations;
        }
        if other.pipeline.max_tags != 0 {
            self.pipeline.max_tags = other.pipeline.max_tags;
        }

        if other.storage.histories_dir.is_some() {
            self.storage.histories_dir = other.storage.histories_dir;
        }

        self
    }

    /// Directory where histories live, honoring `storage.histories_dir`.
    pub fn histories_dir(&self) -> Option<PathBuf> {
        self.storage.histories_dir.clone().or_else(histories_dir)
    }
}

fn override_model(slot: &mut String, name: &str, val: String) {
    if val.trim().is_empty() {
        eprintln!(
            "Warning: {} is empty. Using '{}'.",
            name, slot
        );
    } else {
        *slot = val;
    }
}

/// Get the playbook home directory.
///
/// Checks `PLAYBOOK_HOME` first, then falls back to `~/.playbook`.
pub fn playbook_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("PLAYBOOK_HOME") {
        if home.is_empty() {
            tracing::warn!("PLAYBOOK_HOME is empty, using default");
        } else {
            let path = PathBuf::from(&home);
            if path.is_absolute() {
                return Some(path);
            }
            if let Ok(canonical) = path.canonicalize() {
                return Some(canonical);
            }
            tracing::warn!("PLAYBOOK_HOME is relative and doesn't exist, using as-is");
            return Some(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return Some(home.join(".playbook"));
    }

    let fallback_path = env::temp_dir().join("playbook");
    tracing::warn!(
        "HOME not set, using fallback location: {}",
        fallback_path.display()
    );
    Some(fallback_path)
}

/// Find the project root: the nearest ancestor holding a `.playbook/`
/// directory, else `cwd` itself.
pub fn find_project_root(cwd: &Path) -> PathBuf {
    cwd.ancestors()
        .find(|ancestor| ancestor.join(".playbook").is_dir())
        .unwrap_or(cwd)
        .to_path_buf()
}

/// Get the project `.playbook/` directory for a working directory.
pub fn project_playbook_dir(cwd: &Path) -> PathBuf {
    find_project_root(cwd).join(".playbook")
}

/// Get the default histories directory.
///
/// Returns `<playbook_home>/histories/`.
pub fn histories_dir() -> Option<PathBuf> {
    playbook_home().map(|h| h.join("histories"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.models.generator, DEFAULT_MODEL);
        assert_eq!(config.models.reflector, DEFAULT_MODEL);
        assert_eq!(config.models.curator, DEFAULT_MODEL);
        assert_eq!(config.pipeline.max_operations, 0);
        assert_eq!(config.pipeline.max_tags, 0);
        assert!(config.storage.histories_dir.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");

        let toml_content = r#"
[models]
curator = "gemini-2.5-pro"

[pipeline]
max_operations = 3
"#;
        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();

        assert_eq!(config.models.curator, "gemini-2.5-pro");
        assert_eq!(config.models.generator, DEFAULT_MODEL);
        assert_eq!(config.pipeline.max_operations, 3);
        assert_eq!(config.pipeline.max_tags, 0);
    }

    #[test]
    fn test_load_from_file_missing() {
        assert!(Config::load_from_file(Path::new("/nonexistent/config.toml")).is_err());
    }

    #[test]
    fn test_load_from_file_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "this is not valid toml [[[").unwrap();

        let err = Config::load_from_file(&config_path).unwrap_err();
        assert!(matches!(err, PlaybookError::Config { .. }));
    }

    #[test]
    fn test_merge_prefers_non_default_fields() {
        let mut lower = Config::default();
        lower.models.generator = "model-a".to_string();
        lower.pipeline.max_tags = 10;

        let mut upper = Config::default();
        upper.pipeline.max_operations = 3;

        let merged = lower.merge(upper);
        assert_eq!(merged.models.generator, "model-a");
        assert_eq!(merged.pipeline.max_tags, 10);
        assert_eq!(merged.pipeline.max_operations, 3);
    }

    #[test]
    #[serial]
    fn test_project_config_precedence() {
        let dir = TempDir::new().unwrap();
        let project_dir = dir.path().join(".playbook");
        fs::create_dir_all(&project_dir).unwrap();
        fs::write(
            project_dir.join("config.toml"),
            "[pipeline]\nmax_operations = 7\n",
        )
        .unwrap();

        let config = Config::load_from_cwd(dir.path());

        assert_eq!(config.pipeline.max_operations, 7);
        assert_eq!(config.models.generator, DEFAULT_MODEL);
    }

    #[test]
    #[serial]
    fn test_project_config_found_from_subdirectory() {
        let dir = TempDir::new().unwrap();
        let project_dir = dir.path().join(".playbook");
        fs::create_dir_all(&project_dir).unwrap();
        fs::write(project_dir.join("config.toml"), "[pipeline]\nmax_tags = 4\n").unwrap();
        let nested = dir.path().join("src").join("deep");
        fs::create_dir_all(&nested).unwrap();

        let config = Config::load_from_cwd(&nested);

        assert_eq!(config.pipeline.max_tags, 4);
    }

    #[test]
    #[serial]
    fn test_env_var_precedence() {
        let dir = TempDir::new().unwrap();
        let project_dir = dir.path().join(".playbook");
        fs::create_dir_all(&project_dir).unwrap();
        fs::write(
            project_dir.join("config.toml"),
            "[pipeline]\nmax_operations = 7\n",
        )
        .unwrap();

        env::set_var("PLAYBOOK_MAX_OPERATIONS", "2");
        let config = Config::load_from_cwd(dir.path());
        env::remove_var("PLAYBOOK_MAX_OPERATIONS");

        assert_eq!(config.pipeline.max_operations, 2);
    }

    #[test]
    #[serial]
    fn test_env_var_overrides() {
        env::set_var("PLAYBOOK_GENERATOR_MODEL", "gen-x");
        env::set_var("PLAYBOOK_REFLECTOR_MODEL", "ref-x");
        env::set_var("PLAYBOOK_CURATOR_MODEL", "cur-x");
        env::set_var("PLAYBOOK_MAX_TAGS", "9");
        env::set_var("PLAYBOOK_HISTORIES_DIR", "/tmp/histories");

        let mut config = Config::default();
        config.apply_env_overrides();

        env::remove_var("PLAYBOOK_GENERATOR_MODEL");
        env::remove_var("PLAYBOOK_REFLECTOR_MODEL");
        env::remove_var("PLAYBOOK_CURATOR_MODEL");
        env::remove_var("PLAYBOOK_MAX_TAGS");
        env::remove_var("PLAYBOOK_HISTORIES_DIR");

        assert_eq!(config.models.generator, "gen-x");
        assert_eq!(config.models.reflector, "ref-x");
        assert_eq!(config.models.curator, "cur-x");
        assert_eq!(config.pipeline.max_tags, 9);
        assert_eq!(
            config.histories_dir(),
            Some(PathBuf::from("/tmp/histories"))
        );
    }

    #[test]
    #[serial]
    fn test_invalid_env_values_keep_previous() {
        env::set_var("PLAYBOOK_MAX_OPERATIONS", "lots");
        env::set_var("PLAYBOOK_CURATOR_MODEL", "  ");

        let mut config = Config::default();
        config.pipeline.max_operations = 5;
        config.apply_env_overrides();

        env::remove_var("PLAYBOOK_MAX_OPERATIONS");
        env::remove_var("PLAYBOOK_CURATOR_MODEL");

        assert_eq!(config.pipeline.max_operations, 5);
        assert_eq!(config.models.curator, DEFAULT_MODEL);
    }

    #[test]
    #[serial]
    fn test_playbook_home_env() {
        env::set_var("PLAYBOOK_HOME", "/tmp/pb-home");
        let home = playbook_home();
        let histories = histories_dir();
        env::remove_var("PLAYBOOK_HOME");

        assert_eq!(home, Some(PathBuf::from("/tmp/pb-home")));
        assert_eq!(histories, Some(PathBuf::from("/tmp/pb-home/histories")));
    }
}
