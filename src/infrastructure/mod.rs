//! 基础设施层
//!
//! - 依赖注入容器
//! - 注册模块
//! - 容器构建器

pub mod builder;
pub mod container;
pub mod module;

pub use builder::ContainerBuilder;
pub use container::{ContainerStats, ContractType, ResolverEngine, ServiceContainer, ServiceLifetime};
pub use module::{Module, ModuleError, ModuleManager, ModuleStatus};
