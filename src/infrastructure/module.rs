//! 模块抽象层
//!
//! 模块是一组相关注册的来源，声明对其他模块的依赖，按依赖顺序初始化。

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

use super::container::ServiceContainer;
use crate::errors::ContainerError;

/// 模块状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStatus {
    /// 未初始化
    NotInitialized,
    /// 初始化中
    Initializing,
    /// 已初始化
    Initialized,
    /// 初始化失败
    Failed,
    /// 已禁用，跳过初始化
    Disabled,
    /// 已卸载
    Unloaded,
}

/// 模块接口
pub trait Module: Send + Sync {
    /// 模块名称
    fn name(&self) -> &str;

    /// 模块版本
    fn version(&self) -> &str {
        "1.0.0"
    }

    /// 依赖的模块
    fn dependencies(&self) -> Vec<&str> {
        Vec::new()
    }

    /// 向容器注册服务
    fn initialize(&self, container: &ServiceContainer) -> Result<(), ModuleError>;

    /// 卸载模块
    fn unload(&self, _container: &ServiceContainer) -> Result<(), ModuleError> {
        Ok(())
    }

    /// 检查模块是否可用
    fn is_enabled(&self) -> bool {
        true
    }
}

/// 模块错误
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("Module '{module}' depends on unknown module '{dependency}'")]
    DependencyNotFound { module: String, dependency: String },

    #[error("Module '{module}' depends on module '{dependency}', which is not initialized")]
    DependencyNotInitialized { module: String, dependency: String },

    #[error("Module initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Module unload failed: {0}")]
    UnloadFailed(String),

    #[error("Circular module dependency detected: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),

    #[error("Container error: {0}")]
    Container(#[from] ContainerError),
}

/// 模块管理器
pub struct ModuleManager {
    modules: RwLock<Vec<Arc<dyn Module>>>,
    status: RwLock<HashMap<String, ModuleStatus>>,
    initialized: RwLock<Vec<String>>,
    container: ServiceContainer,
}

impl ModuleManager {
    /// 创建新的模块管理器
    pub fn new(container: ServiceContainer) -> Self {
        Self {
            modules: RwLock::new(Vec::new()),
            status: RwLock::new(HashMap::new()),
            initialized: RwLock::new(Vec::new()),
            container,
        }
    }

    pub fn container(&self) -> &ServiceContainer {
        &self.container
    }

    /// 注册模块，同名模块只保留第一个
    pub fn register_module(&self, module: Arc<dyn Module>) {
        let mut modules = self.modules.write();
        let module_name = module.name().to_string();

        if modules.iter().any(|m| m.name() == module_name) {
            tracing::warn!(module = %module_name, "Module already registered, ignoring duplicate");
            return;
        }

        modules.push(module);
        self.status.write().insert(module_name, ModuleStatus::NotInitialized);
    }

    /// 按依赖顺序初始化所有模块，返回实际初始化的模块名
    pub fn initialize_all(&self) -> Result<Vec<String>, ModuleError> {
        let modules = self.modules.read().clone();
        let ordered = initialization_order(&modules)?;

        let mut initialized = Vec::new();
        for module in ordered {
            if self.module_status(module.name()) == Some(ModuleStatus::Initialized) {
                continue;
            }
            if self.initialize_module(&module)? {
                initialized.push(module.name().to_string());
            }
        }

        tracing::info!(modules = ?initialized, "Modules initialized");
        Ok(initialized)
    }

    /// 初始化特定模块；禁用的模块返回 false
    fn initialize_module(&self, module: &Arc<dyn Module>) -> Result<bool, ModuleError> {
        let module_name = module.name().to_string();

        if !module.is_enabled() {
            tracing::debug!(module = %module_name, "Module disabled, skipping");
            self.set_status(&module_name, ModuleStatus::Disabled);
            return Ok(false);
        }

        for dependency in module.dependencies() {
            if self.module_status(dependency) != Some(ModuleStatus::Initialized) {
                return Err(ModuleError::DependencyNotInitialized {
                    module: module_name,
                    dependency: dependency.to_string(),
                });
            }
        }

        self.set_status(&module_name, ModuleStatus::Initializing);
        let result = module.initialize(&self.container);

        match &result {
            Ok(()) => {
                tracing::debug!(module = %module_name, version = module.version(), "Module initialized");
                self.set_status(&module_name, ModuleStatus::Initialized);
                self.initialized.write().push(module_name);
            }
            Err(e) => {
                tracing::error!(module = %module_name, error = %e, "Module initialization failed");
                self.set_status(&module_name, ModuleStatus::Failed);
            }
        }

        result.map(|_| true)
    }

    /// 按初始化的逆序卸载
    pub fn unload_all(&self) -> Result<(), ModuleError> {
        let order: Vec<String> = self.initialized.write().drain(..).rev().collect();
        let modules = self.modules.read().clone();

        for name in order {
            if let Some(module) = modules.iter().find(|m| m.name() == name) {
                self.set_status(&name, ModuleStatus::Unloaded);
                module.unload(&self.container)?;
            }
        }

        Ok(())
    }

    /// 获取模块状态
    pub fn module_status(&self, module_name: &str) -> Option<ModuleStatus> {
        self.status.read().get(module_name).copied()
    }

    /// 获取所有模块状态
    pub fn all_module_statuses(&self) -> HashMap<String, ModuleStatus> {
        self.status.read().clone()
    }

    /// 获取已初始化的模块，按初始化顺序
    pub fn initialized_modules(&self) -> Vec<String> {
        self.initialized.read().clone()
    }

    fn set_status(&self, module_name: &str, status: ModuleStatus) {
        self.status.write().insert(module_name.to_string(), status);
    }
}

/// 依赖优先的初始化顺序；无依赖关系的模块保持注册顺序
fn initialization_order(modules: &[Arc<dyn Module>]) -> Result<Vec<Arc<dyn Module>>, ModuleError> {
    let by_name: HashMap<&str, &Arc<dyn Module>> = modules.iter().map(|m| (m.name(), m)).collect();
    let mut done = HashSet::new();
    let mut stack = Vec::new();
    let mut ordered = Vec::with_capacity(modules.len());

    for module in modules {
        visit(module, &by_name, &mut done, &mut stack, &mut ordered)?;
    }
    Ok(ordered)
}

fn visit<'a>(
    module: &'a Arc<dyn Module>,
    by_name: &HashMap<&'a str, &'a Arc<dyn Module>>,
    done: &mut HashSet<&'a str>,
    stack: &mut Vec<&'a str>,
    ordered: &mut Vec<Arc<dyn Module>>,
) -> Result<(), ModuleError> {
    let name = module.name();
    if done.contains(name) {
        return Ok(());
    }
    if let Some(start) = stack.iter().position(|entry| *entry == name) {
        let mut chain: Vec<String> = stack[start..].iter().map(|entry| entry.to_string()).collect();
        chain.push(name.to_string());
        return Err(ModuleError::CircularDependency(chain));
    }

    stack.push(name);
    for dependency in module.dependencies() {
        let target = by_name.get(dependency).ok_or_else(|| ModuleError::DependencyNotFound {
            module: name.to_string(),
            dependency: dependency.to_string(),
        })?;
        visit(*target, by_name, done, stack, ordered)?;
    }
    stack.pop();

    done.insert(name);
    ordered.push(module.clone());
    Ok(())
}
