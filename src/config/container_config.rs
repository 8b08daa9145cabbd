use serde::Deserialize;
use std::collections::HashMap;

use crate::errors::ConfigError;
use crate::logging::{parse_log_level, LogFormat, LoggingConfig};

/// Container configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfig {
    /// 安装内置的包装形状服务源
    pub default_sources: bool,
    /// 允许标记为覆盖的注册替换已有的单实现注册
    pub allow_overrides: bool,
    /// 每次解析输出 trace 级别日志
    pub trace_resolutions: bool,
    pub logging: LoggingSettings,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            default_sources: true,
            allow_overrides: true,
            trace_resolutions: false,
            logging: LoggingSettings::default(),
        }
    }
}

/// Logging section of the configuration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingSettings {
    /// 转换为日志系统配置
    pub fn to_logging_config(&self) -> Result<LoggingConfig, ConfigError> {
        Ok(LoggingConfig {
            level: parse_log_level(&self.level)?,
            format: self.format.parse::<LogFormat>()?,
            ..LoggingConfig::default()
        })
    }
}

/// Partial container configuration for loading from files
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialContainerConfig {
    pub default_sources: Option<bool>,
    pub allow_overrides: Option<bool>,
    pub trace_resolutions: Option<bool>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
    pub format: Option<String>,
}

impl ContainerConfig {
    /// Create ContainerConfig from partial config and environment
    ///
    /// 优先级：环境变量 > 配置文件 > 默认值
    pub fn from_partial_and_env(
        partial: Option<PartialContainerConfig>,
        env_map: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let partial = partial.unwrap_or_default();
        let defaults = Self::default();
        let logging = partial.logging.unwrap_or_default();

        let config = Self {
            default_sources: env_bool(&env_map, "IOCORE_DEFAULT_SOURCES")?
                .or(partial.default_sources)
                .unwrap_or(defaults.default_sources),
            allow_overrides: env_bool(&env_map, "IOCORE_ALLOW_OVERRIDES")?
                .or(partial.allow_overrides)
                .unwrap_or(defaults.allow_overrides),
            trace_resolutions: env_bool(&env_map, "IOCORE_TRACE_RESOLUTIONS")?
                .or(partial.trace_resolutions)
                .unwrap_or(defaults.trace_resolutions),
            logging: LoggingSettings {
                level: env_map
                    .get("IOCORE_LOG_LEVEL")
                    .cloned()
                    .or(logging.level)
                    .unwrap_or(defaults.logging.level),
                format: env_map
                    .get("IOCORE_LOG_FORMAT")
                    .cloned()
                    .or(logging.format)
                    .unwrap_or(defaults.logging.format),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.logging.to_logging_config().map(|_| ())
    }
}

fn env_bool(env_map: &HashMap<String, String>, key: &str) -> Result<Option<bool>, ConfigError> {
    let Some(value) = env_map.get(key) else {
        return Ok(None);
    };
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.clone(),
        }),
    }
}
