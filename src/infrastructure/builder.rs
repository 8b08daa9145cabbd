//! 容器构建器
//!
//! 在启动阶段收集注册、服务源、元数据视图和模块，一次性构建容器。
//! 配置错误在构建时立即返回，而不是推迟到首次解析。

use std::sync::Arc;

use super::container::metadata::projector_for;
use super::container::{ContractType, MetadataProjector, MetadataView, Registration, ServiceContainer, ServiceSource};
use super::module::{Module, ModuleError, ModuleManager};
use crate::config::ContainerConfig;
use crate::logging::OperationTimer;

/// 容器构建器
#[derive(Default)]
pub struct ContainerBuilder {
    config: ContainerConfig,
    declarations: Vec<ContractType>,
    registrations: Vec<Registration>,
    sources: Vec<Arc<dyn ServiceSource>>,
    projectors: Vec<(ContractType, MetadataProjector)>,
    modules: Vec<Arc<dyn Module>>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn register(mut self, registration: Registration) -> Self {
        self.registrations.push(registration);
        self
    }

    pub fn declare_multiple(mut self, contract: ContractType) -> Self {
        self.declarations.push(contract);
        self
    }

    pub fn source<S: ServiceSource + 'static>(mut self, source: S) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    pub fn metadata_view<M: MetadataView>(mut self) -> Self {
        self.projectors.push((ContractType::of::<M>(), projector_for::<M>()));
        self
    }

    pub fn module<M: Module + 'static>(self, module: M) -> Self {
        self.module_arc(Arc::new(module))
    }

    pub fn module_arc(mut self, module: Arc<dyn Module>) -> Self {
        self.modules.push(module);
        self
    }

    /// 构建容器
    pub fn build(self) -> Result<ServiceContainer, ModuleError> {
        self.build_with_modules().map(|(container, _)| container)
    }

    /// 构建容器，同时返回管理已初始化模块的管理器
    pub fn build_with_modules(self) -> Result<(ServiceContainer, ModuleManager), ModuleError> {
        let timer = OperationTimer::new("container_build")
            .with_metadata("registrations", &self.registrations.len().to_string())
            .with_metadata("modules", &self.modules.len().to_string());

        let container = ServiceContainer::with_config(&self.config);
        let registry = container.registry();

        for contract in self.declarations {
            registry.declare_multiple(contract)?;
        }
        for registration in self.registrations {
            registry.register(registration)?;
        }
        for source in self.sources {
            registry.register_source(source)?;
        }
        for (view, projector) in self.projectors {
            registry.register_projector(view, projector)?;
        }

        let manager = ModuleManager::new(container.clone());
        for module in self.modules {
            manager.register_module(module);
        }
        manager.initialize_all()?;

        timer.finish();
        Ok((container, manager))
    }
}
