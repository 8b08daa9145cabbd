//! 包装形状的运行时值
//!
//! 服务源为 `Sequence<T>`、`ExportFactory<T>`、`MetadataExportFactory<T, M>`、
//! `Deferred<T>`、`List<T>` / `Collection<T>` 产出的实例类型。

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use super::contract::ContractType;
use super::metadata::{Metadata, MetadataProjector};
use super::producer::LazyProducer;
use super::registration::{Registration, ServiceLifetime};
use super::resolver::ResolverEngine;
use super::{downcast, Instance};
use crate::errors::{ContainerError, ContainerResult};

/// 序列元素的形状
#[derive(Clone)]
pub(crate) enum ItemShape {
    Value,
    Factory,
    MetadataFactory {
        view: ContractType,
        projector: Option<MetadataProjector>,
    },
    Deferred,
}

/// 按注册顺序的惰性序列，每个元素只在迭代到时才生产
#[derive(Clone)]
pub struct ServiceSequence {
    contract: ContractType,
    entries: Vec<Arc<Registration>>,
    shape: ItemShape,
    resolver: ResolverEngine,
}

impl ServiceSequence {
    pub(crate) fn new(
        contract: ContractType,
        entries: Vec<Arc<Registration>>,
        shape: ItemShape,
        resolver: ResolverEngine,
    ) -> Self {
        Self {
            contract,
            entries,
            shape,
            resolver,
        }
    }

    pub(crate) fn values(contract: ContractType, entries: Vec<Arc<Registration>>, resolver: ResolverEngine) -> Self {
        Self::new(contract, entries, ItemShape::Value, resolver)
    }

    /// 元素契约
    pub fn contract(&self) -> &ContractType {
        &self.contract
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn registrations(&self) -> &[Arc<Registration>] {
        &self.entries
    }

    /// 惰性迭代，部分消费时不会生产未访问的实现
    pub fn iter(&self) -> impl Iterator<Item = ContainerResult<Instance>> + '_ {
        self.entries.iter().map(move |registration| self.element(registration))
    }

    pub fn iter_as<T: Send + Sync + 'static>(&self) -> impl Iterator<Item = ContainerResult<Arc<T>>> + '_ {
        self.iter()
            .map(move |instance| instance.and_then(|instance| downcast::<T>(instance, &self.contract)))
    }

    /// 生产全部元素，遇到第一个错误即返回
    pub fn collect_all(&self) -> ContainerResult<Vec<Instance>> {
        self.iter().collect()
    }

    pub fn collect_as<T: Send + Sync + 'static>(&self) -> ContainerResult<Vec<Arc<T>>> {
        self.iter_as::<T>().collect()
    }

    /// 按 `container.priority` 降序，同优先级保持注册顺序
    pub fn by_priority(&self) -> ServiceSequence {
        let mut sorted = self.clone();
        sorted
            .entries
            .sort_by(|a, b| b.metadata().priority().cmp(&a.metadata().priority()));
        sorted
    }

    /// 按元数据过滤
    pub fn filter_metadata<F>(&self, predicate: F) -> ServiceSequence
    where
        F: Fn(&Metadata) -> bool,
    {
        let mut filtered = self.clone();
        filtered
            .entries
            .retain(|registration| predicate(registration.metadata()));
        filtered
    }

    fn element(&self, registration: &Arc<Registration>) -> ContainerResult<Instance> {
        match &self.shape {
            ItemShape::Value => registration.produce(&self.resolver),
            ItemShape::Factory => Ok(Arc::new(ExportFactory::new(registration.clone(), self.resolver.clone())) as Instance),
            ItemShape::MetadataFactory { view, projector } => {
                let factory = ExportFactory::new(registration.clone(), self.resolver.clone());
                Ok(Arc::new(MetadataExportFactory::project(factory, view, projector.as_ref())?) as Instance)
            }
            ItemShape::Deferred => Ok(Arc::new(Deferred::for_registration(registration.clone(), self.resolver.clone())) as Instance),
        }
    }
}

impl fmt::Debug for ServiceSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceSequence")
            .field("contract", &self.contract)
            .field("len", &self.entries.len())
            .finish()
    }
}

/// 单个注册的延迟创建句柄
#[derive(Clone)]
pub struct ExportFactory {
    registration: Arc<Registration>,
    resolver: ResolverEngine,
}

impl ExportFactory {
    pub(crate) fn new(registration: Arc<Registration>, resolver: ResolverEngine) -> Self {
        Self {
            registration,
            resolver,
        }
    }

    pub fn contract(&self) -> &ContractType {
        self.registration.contract()
    }

    pub fn metadata(&self) -> &Metadata {
        self.registration.metadata()
    }

    pub fn registration(&self) -> &Arc<Registration> {
        &self.registration
    }

    /// 按注册的生命周期产出实例
    pub fn create(&self) -> ContainerResult<Instance> {
        self.registration.produce(&self.resolver)
    }

    pub fn create_as<T: Send + Sync + 'static>(&self) -> ContainerResult<Arc<T>> {
        downcast::<T>(self.create()?, self.contract())
    }
}

impl fmt::Debug for ExportFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExportFactory({})", self.contract())
    }
}

/// 带元数据视图的延迟创建句柄
#[derive(Clone)]
pub struct MetadataExportFactory {
    factory: ExportFactory,
    view: ContractType,
    metadata: Instance,
}

impl MetadataExportFactory {
    pub(crate) fn project(
        factory: ExportFactory,
        view: &ContractType,
        projector: Option<&MetadataProjector>,
    ) -> ContainerResult<Self> {
        let failed = |reason: String| ContainerError::MetadataProjectionFailed {
            contract: factory.contract().to_string(),
            view: view.to_string(),
            reason,
        };
        let projector = projector.ok_or_else(|| failed("no metadata view is registered for this type".to_string()))?;
        let metadata = projector(factory.metadata()).map_err(failed)?;
        Ok(Self {
            factory,
            view: view.clone(),
            metadata,
        })
    }

    pub fn factory(&self) -> &ExportFactory {
        &self.factory
    }

    pub fn create(&self) -> ContainerResult<Instance> {
        self.factory.create()
    }

    pub fn create_as<T: Send + Sync + 'static>(&self) -> ContainerResult<Arc<T>> {
        self.factory.create_as::<T>()
    }

    pub fn metadata_instance(&self) -> &Instance {
        &self.metadata
    }

    pub fn metadata_as<M: Send + Sync + 'static>(&self) -> ContainerResult<Arc<M>> {
        downcast::<M>(self.metadata.clone(), &self.view)
    }
}

impl fmt::Debug for MetadataExportFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MetadataExportFactory({}, {})", self.factory.contract(), self.view)
    }
}

/// 首次取值时才生产，之后始终返回同一实例
///
/// 包装器本身就是缓存，与内部契约声明的生命周期无关。
pub struct Deferred {
    producer: LazyProducer,
    resolver: ResolverEngine,
}

impl Deferred {
    /// 通过解析器解析整个契约
    pub(crate) fn for_contract(contract: ContractType, resolver: ResolverEngine) -> Self {
        let inner = contract.clone();
        Self {
            producer: LazyProducer::new(
                contract,
                ServiceLifetime::Singleton,
                Arc::new(move |resolver: &ResolverEngine| resolver.resolve(&inner)),
            ),
            resolver,
        }
    }

    /// 绑定到某一个具体注册
    pub(crate) fn for_registration(registration: Arc<Registration>, resolver: ResolverEngine) -> Self {
        let contract = registration.contract().clone();
        Self {
            producer: LazyProducer::new(
                contract,
                ServiceLifetime::Singleton,
                Arc::new(move |resolver: &ResolverEngine| registration.produce(resolver)),
            ),
            resolver,
        }
    }

    pub fn contract(&self) -> &ContractType {
        self.producer.contract()
    }

    pub fn is_value_created(&self) -> bool {
        self.producer.state() == super::producer::ProducerState::Done
    }

    pub fn value(&self) -> ContainerResult<Instance> {
        self.producer.get(&self.resolver)
    }

    pub fn value_as<T: Send + Sync + 'static>(&self) -> ContainerResult<Arc<T>> {
        downcast::<T>(self.value()?, self.contract())
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("contract", self.contract())
            .field("created", &self.is_value_created())
            .finish()
    }
}

/// 立即生产、可修改的有序容器
pub struct ServiceList {
    contract: ContractType,
    items: RwLock<Vec<Instance>>,
}

impl ServiceList {
    pub(crate) fn new(contract: ContractType, items: Vec<Instance>) -> Self {
        Self {
            contract,
            items: RwLock::new(items),
        }
    }

    pub fn contract(&self) -> &ContractType {
        &self.contract
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Instance> {
        self.items.read().get(index).cloned()
    }

    pub fn push(&self, instance: Instance) {
        self.items.write().push(instance);
    }

    pub fn insert(&self, index: usize, instance: Instance) {
        let mut items = self.items.write();
        let index = index.min(items.len());
        items.insert(index, instance);
    }

    pub fn remove(&self, index: usize) -> Option<Instance> {
        let mut items = self.items.write();
        (index < items.len()).then(|| items.remove(index))
    }

    pub fn clear(&self) {
        self.items.write().clear();
    }

    pub fn snapshot(&self) -> Vec<Instance> {
        self.items.read().clone()
    }

    pub fn snapshot_as<T: Send + Sync + 'static>(&self) -> ContainerResult<Vec<Arc<T>>> {
        self.snapshot()
            .into_iter()
            .map(|instance| downcast::<T>(instance, &self.contract))
            .collect()
    }
}

impl fmt::Debug for ServiceList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceList")
            .field("contract", &self.contract)
            .field("len", &self.len())
            .finish()
    }
}
