//! 服务容器
//!
//! 注册表与解析引擎的组合，提供注册和解析的便捷 API。
//! 克隆共享同一个注册表；最后一个克隆被丢弃时注册表随之拆除。

use std::sync::Arc;

use super::contract::ContractType;
use super::implementation::Implementation;
use super::metadata::MetadataView;
use super::registration::{Registration, ServiceLifetime};
use super::registry::ServiceRegistry;
use super::resolver::ResolverEngine;
use super::source::ServiceSource;
use super::stats::ContainerStats;
use super::wrappers::ServiceSequence;
use super::Instance;
use crate::config::ContainerConfig;
use crate::errors::ContainerResult;
use crate::infrastructure::builder::ContainerBuilder;

/// 依赖注入容器
#[derive(Clone)]
pub struct ServiceContainer {
    registry: Arc<ServiceRegistry>,
    resolver: ResolverEngine,
}

impl ServiceContainer {
    /// 使用默认配置创建容器
    pub fn new() -> Self {
        Self::with_config(&ContainerConfig::default())
    }

    pub fn with_config(config: &ContainerConfig) -> Self {
        let registry = Arc::new(ServiceRegistry::new(config));
        let resolver = ResolverEngine::new(&registry);
        Self { registry, resolver }
    }

    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// 绑定到本容器的解析引擎
    pub fn resolver(&self) -> ResolverEngine {
        self.resolver.clone()
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn register(&self, registration: Registration) -> ContainerResult<()> {
        self.registry.register(registration)
    }

    /// 注册现成实例（始终是单例）
    pub fn register_instance(&self, contract: ContractType, instance: Instance, allow_multiple: bool) -> ContainerResult<()> {
        self.register(
            Registration::instance(contract, instance)
                .allow_multiple(allow_multiple)
                .build(),
        )
    }

    /// 以值自身的类型作为契约注册单例
    pub fn register_value<T: Send + Sync + 'static>(&self, value: T) -> ContainerResult<()> {
        self.register_instance(ContractType::of::<T>(), Arc::new(value), false)
    }

    pub fn register_type(
        &self,
        contract: ContractType,
        implementation: impl Into<Implementation>,
        lifetime: ServiceLifetime,
        allow_multiple: bool,
    ) -> ContainerResult<()> {
        self.register(
            Registration::implementation(contract, implementation)
                .lifetime(lifetime)
                .allow_multiple(allow_multiple)
                .build(),
        )
    }

    /// 注册类型化工厂
    pub fn register_factory<T, F>(
        &self,
        contract: ContractType,
        factory: F,
        lifetime: ServiceLifetime,
        allow_multiple: bool,
    ) -> ContainerResult<()>
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverEngine) -> ContainerResult<T> + Send + Sync + 'static,
    {
        self.register(
            Registration::factory(contract, move |resolver, _| factory(resolver).map(|value| Arc::new(value) as Instance))
                .lifetime(lifetime)
                .allow_multiple(allow_multiple)
                .build(),
        )
    }

    pub fn register_source<S: ServiceSource + 'static>(&self, source: S) -> ContainerResult<()> {
        self.registry.register_source(Arc::new(source))
    }

    /// 让 `MetadataExportFactory<T, M>` 能把注册元数据投影为 `M`
    pub fn register_metadata_view<M: MetadataView>(&self) -> ContainerResult<()> {
        self.registry.register_metadata_view::<M>()
    }

    pub fn declare_multiple(&self, contract: ContractType) -> ContainerResult<()> {
        self.registry.declare_multiple(contract)
    }

    pub fn resolve(&self, contract: &ContractType) -> ContainerResult<Instance> {
        self.resolver.resolve(contract)
    }

    pub fn try_resolve(&self, contract: &ContractType) -> ContainerResult<Option<Instance>> {
        self.resolver.try_resolve(contract)
    }

    pub fn resolve_all(&self, contract: &ContractType) -> ContainerResult<ServiceSequence> {
        self.resolver.resolve_all(contract)
    }

    pub fn resolve_as<T: Send + Sync + 'static>(&self, contract: &ContractType) -> ContainerResult<Arc<T>> {
        self.resolver.resolve_as::<T>(contract)
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> ContainerResult<Arc<T>> {
        self.resolver.get::<T>()
    }

    pub fn is_registered(&self, contract: &ContractType) -> bool {
        self.registry.is_registered(contract)
    }

    pub fn registered_contracts(&self) -> Vec<ContractType> {
        self.registry.contracts()
    }

    pub fn stats(&self) -> ContainerStats {
        self.registry.stats()
    }

    /// 拆除容器，所有克隆共享此效果
    pub fn dispose(&self) {
        self.registry.dispose();
    }
}

impl Default for ServiceContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("contracts", &self.registry.contracts().len())
            .field("disposed", &self.registry.is_disposed())
            .finish()
    }
}
