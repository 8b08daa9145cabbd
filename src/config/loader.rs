use std::{collections::HashMap, env, fs, path::{Path, PathBuf}};

use super::container_config::{ContainerConfig, PartialContainerConfig};
use super::{CONFIG_FILE_NAME, USER_CONFIG_PATH};
use crate::errors::ConfigError;

/// 识别的环境变量
const ENV_KEYS: [&str; 5] = [
    "IOCORE_DEFAULT_SOURCES",
    "IOCORE_ALLOW_OVERRIDES",
    "IOCORE_TRACE_RESOLUTIONS",
    "IOCORE_LOG_LEVEL",
    "IOCORE_LOG_FORMAT",
];

/// Configuration loader responsible for loading config from files and environment
pub struct ConfigLoader {
    base_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
    read_env: bool,
}

impl ConfigLoader {
    /// Create a new config loader with default paths
    pub fn new() -> Self {
        Self {
            base_path: None,
            config_path: None,
            read_env: true,
        }
    }

    /// Create a config loader with custom base path (for testing)
    pub fn with_base_path(base_path: PathBuf) -> Self {
        Self {
            base_path: Some(base_path),
            ..Self::new()
        }
    }

    /// 使用指定的配置文件
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: Some(path.into()),
            ..Self::new()
        }
    }

    /// 不读取进程环境变量
    pub fn without_env(mut self) -> Self {
        self.read_env = false;
        self
    }

    /// Load container configuration
    ///
    /// 配置文件不存在时使用默认值，再叠加 `IOCORE_*` 环境变量。
    pub fn load_config(&self) -> Result<ContainerConfig, ConfigError> {
        let config_path = self.config_file_path();
        let partial = self.load_partial_config(&config_path)?;
        let env_map = if self.read_env {
            self.collect_env_vars()
        } else {
            HashMap::new()
        };

        ContainerConfig::from_partial_and_env(partial, env_map)
    }

    /// 配置文件路径
    pub fn config_file_path(&self) -> PathBuf {
        if let Some(path) = &self.config_path {
            return path.clone();
        }
        self.extract_file_path(USER_CONFIG_PATH, CONFIG_FILE_NAME)
    }

    /// Extract file path with tilde expansion and base path override
    fn extract_file_path(&self, base_dir: &str, file_name: &str) -> PathBuf {
        let expanded_base = if let Some(base_path) = &self.base_path {
            base_path.join(base_dir.trim_start_matches("~/"))
        } else {
            let expanded = shellexpand::tilde(base_dir);
            PathBuf::from(expanded.as_ref())
        };

        expanded_base.join(file_name)
    }

    /// Load partial configuration from TOML file
    fn load_partial_config(&self, config_path: &Path) -> Result<Option<PartialContainerConfig>, ConfigError> {
        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "Container config file not found, using defaults");
            return Ok(None);
        }

        let file_label = config_path.to_string_lossy().to_string();
        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::FileRead(file_label.clone(), e))?;
        let partial: PartialContainerConfig =
            toml::from_str(&content).map_err(|e| ConfigError::TomlParse(file_label.clone(), e))?;

        tracing::info!("已加载容器配置文件: {}", file_label);
        Ok(Some(partial))
    }

    /// Collect relevant environment variables
    fn collect_env_vars(&self) -> HashMap<String, String> {
        let mut env_map = HashMap::new();
        for key in &ENV_KEYS {
            if let Ok(value) = env::var(key) {
                env_map.insert(key.to_string(), value);
            }
        }
        env_map
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_loader() -> (ConfigLoader, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_base_path(temp_dir.path().to_path_buf()).without_env();
        (loader, temp_dir)
    }

    #[test]
    fn test_extract_file_path() {
        let (loader, temp_dir) = create_test_loader();
        let path = loader.config_file_path();
        assert!(path.starts_with(temp_dir.path()));
        assert!(path.ends_with(".config/iocore/container.toml"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let (loader, _temp_dir) = create_test_loader();
        assert_eq!(loader.load_config().unwrap(), ContainerConfig::default());
    }

    #[test]
    fn test_load_from_base_path() {
        let (loader, _temp_dir) = create_test_loader();
        let config_path = loader.config_file_path();
        fs::create_dir_all(config_path.parent().unwrap()).unwrap();
        fs::write(&config_path, "trace_resolutions = true\n[logging]\nformat = \"compact\"\n").unwrap();

        let config = loader.load_config().unwrap();
        assert!(config.trace_resolutions);
        assert_eq!(config.logging.format, "compact");
    }

    #[test]
    fn test_parse_error_names_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        fs::write(&path, "default_sources = [").unwrap();

        match ConfigLoader::with_file(&path).without_env().load_config() {
            Err(ConfigError::TomlParse(file, _)) => assert!(file.ends_with("broken.toml")),
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
