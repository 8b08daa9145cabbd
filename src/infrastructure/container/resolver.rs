//! 解析引擎
//!
//! 对外的解析入口。引擎只持有注册表的弱引用，不会延长容器的生命周期；
//! 嵌套的参数解析始终回到同一个引擎，生产者的循环检测因此能看到完整调用链。

use std::sync::{Arc, Weak};

use super::contract::ContractType;
use super::registry::{Lookup, ServiceRegistry};
use super::source::element_shape;
use super::wrappers::ServiceSequence;
use super::{downcast, Instance};
use crate::errors::{ContainerError, ContainerResult};

/// 解析引擎
#[derive(Clone)]
pub struct ResolverEngine {
    registry: Weak<ServiceRegistry>,
}

impl ResolverEngine {
    pub(crate) fn new(registry: &Arc<ServiceRegistry>) -> Self {
        Self {
            registry: Arc::downgrade(registry),
        }
    }

    /// 宿主仍存活时返回注册表
    pub fn registry(&self) -> ContainerResult<Arc<ServiceRegistry>> {
        self.registry.upgrade().ok_or(ContainerError::HostDisposed)
    }

    /// 解析契约；没有匹配的注册或服务源时返回 `NoImplementation`
    pub fn resolve(&self, contract: &ContractType) -> ContainerResult<Instance> {
        self.try_resolve(contract)?
            .ok_or_else(|| ContainerError::NoImplementation {
                contract: contract.to_string(),
            })
    }

    /// 解析契约；没有匹配时返回 `None`，其余失败照常返回错误
    pub fn try_resolve(&self, contract: &ContractType) -> ContainerResult<Option<Instance>> {
        let registry = self.registry()?;
        registry.stats_recorder().record_resolution();
        if registry.trace_resolutions() {
            tracing::trace!(contract = %contract, "Resolving");
        }

        match registry.lookup(contract)? {
            Some(Lookup::Entry(entry)) => entry.produce(self).map(Some),
            Some(Lookup::Source(source)) => {
                registry.stats_recorder().record_source_resolution();
                tracing::debug!(contract = %contract, source = source.name(), "Resolving through service source");
                source.resolve(self, contract).map(Some)
            }
            None => Ok(None),
        }
    }

    /// 全部注册的惰性序列；单实现契约得到 0 或 1 个元素
    pub fn resolve_all(&self, contract: &ContractType) -> ContainerResult<ServiceSequence> {
        let registry = self.registry()?;
        registry.stats_recorder().record_resolution();
        let (target, shape) = element_shape(&registry, contract);
        let entries = registry.registrations_for(&target)?;
        Ok(ServiceSequence::new(target, entries, shape, self.clone()))
    }

    /// 解析并向下转型
    pub fn resolve_as<T: Send + Sync + 'static>(&self, contract: &ContractType) -> ContainerResult<Arc<T>> {
        downcast::<T>(self.resolve(contract)?, contract)
    }

    pub fn resolve_cloned<T: Clone + Send + Sync + 'static>(&self, contract: &ContractType) -> ContainerResult<T> {
        self.resolve_as::<T>(contract).map(|value| T::clone(&value))
    }

    /// 以 Rust 类型本身作为契约解析
    pub fn get<T: Send + Sync + 'static>(&self) -> ContainerResult<Arc<T>> {
        self.resolve_as::<T>(&ContractType::of::<T>())
    }

    pub fn can_resolve(&self, contract: &ContractType) -> bool {
        self.registry
            .upgrade()
            .map(|registry| registry.can_resolve(contract))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for ResolverEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverEngine")
            .field("host_alive", &(self.registry.strong_count() > 0))
            .finish()
    }
}
