//! 容器错误类型
//!
//! 所有错误都由检测到它的操作直接返回，容器内部不做任何重试或降级。

use thiserror::Error;

/// 容器操作结果
pub type ContainerResult<T> = Result<T, ContainerError>;

/// 依赖注入容器错误
#[derive(Debug, Error)]
pub enum ContainerError {
    /// 构造参数或工厂输入没有可用的注册
    #[error("Cannot resolve '{contract}': dependency '{parameter}' has no satisfying registration")]
    UnresolvableDependency { contract: String, parameter: String },

    /// 没有任何构造函数的参数可以全部满足
    #[error(
        "No constructor of '{implementation}' can be satisfied; unresolvable parameter types: [{}]",
        .unresolved.join(", ")
    )]
    MissingConstructor {
        implementation: String,
        unresolved: Vec<String>,
    },

    /// 存在两个参数数量相同且都可满足的构造函数
    #[error(
        "Ambiguous constructors on '{implementation}': ({}) and ({})",
        .first.join(", "),
        .second.join(", ")
    )]
    AmbiguousConstructor {
        implementation: String,
        first: Vec<String>,
        second: Vec<String>,
    },

    /// 同一线程上的循环依赖
    #[error("Circular dependency detected: {}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    /// 同一契约上 allow_multiple 声明冲突，或重复注册单实现契约
    #[error(
        "Registration conflict for '{contract}' (existing allows multiple: {existing_allows_multiple}, incoming allows multiple: {incoming_allows_multiple})"
    )]
    MultiplicityConflict {
        contract: String,
        existing_allows_multiple: bool,
        incoming_allows_multiple: bool,
    },

    /// 单实现契约被加入多实现注册
    #[error("Registration for '{contract}' does not allow multiple implementations")]
    LifetimeMismatch { contract: String },

    /// 契约没有任何实现
    #[error("No implementation registered for '{contract}'")]
    NoImplementation { contract: String },

    /// 期望唯一实现却找到多个
    #[error("'{contract}' has {count} registrations where exactly one was expected")]
    Ambiguous { contract: String, count: usize },

    /// 注册无法按给定泛型参数闭合
    #[error("Registration for '{contract}' cannot be closed over <{}>: {reason}", .arguments.join(", "))]
    NotConstructible {
        contract: String,
        arguments: Vec<String>,
        reason: String,
    },

    /// 元数据无法投影为目标视图
    #[error("Metadata of '{contract}' cannot be projected into '{view}': {reason}")]
    MetadataProjectionFailed {
        contract: String,
        view: String,
        reason: String,
    },

    /// 实例类型与请求类型不符
    #[error("Type cast failed: '{contract}' did not produce a '{expected}'")]
    TypeCastFailed { contract: String, expected: String },

    /// 工厂或构造函数自身失败
    #[error("Failed to create '{contract}': {reason}")]
    CreationFailed { contract: String, reason: String },

    #[error("The service registry has been disposed")]
    RegistryDisposed,

    #[error("The container hosting this resolver no longer exists")]
    HostDisposed,
}

impl ContainerError {
    /// 用任意错误构造 `CreationFailed`
    pub fn creation_failed(contract: impl ToString, reason: impl ToString) -> Self {
        ContainerError::CreationFailed {
            contract: contract.to_string(),
            reason: reason.to_string(),
        }
    }

    /// 配置期错误，应当中止启动
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ContainerError::MultiplicityConflict { .. } | ContainerError::LifetimeMismatch { .. }
        )
    }

    /// 使用已销毁的容器
    pub fn is_disposed(&self) -> bool {
        matches!(
            self,
            ContainerError::RegistryDisposed | ContainerError::HostDisposed
        )
    }
}

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read file '{0}': {1}")]
    FileRead(String, #[source] std::io::Error),
    #[error("Failed to parse TOML from file '{0}': {1}")]
    TomlParse(String, #[source] toml::de::Error),
    #[error("Invalid value '{value}' for '{key}'")]
    InvalidValue { key: String, value: String },
}
