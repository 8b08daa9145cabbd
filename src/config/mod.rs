pub mod container_config;
pub mod loader;

pub use container_config::{ContainerConfig, LoggingSettings, PartialContainerConfig, PartialLoggingSettings};
pub use loader::ConfigLoader;

/// 用户配置目录
pub const USER_CONFIG_PATH: &str = "~/.config/iocore";
/// 配置文件名
pub const CONFIG_FILE_NAME: &str = "container.toml";
