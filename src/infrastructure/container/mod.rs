//! 依赖注入容器
//!
//! 叶子在前：契约与实现描述、注册、多实现注册、惰性生产者、构造函数选择、
//! 服务源、注册表、解析引擎，最后是对外的 [`ServiceContainer`]。

pub mod constructor;
pub mod contract;
pub mod implementation;
pub mod metadata;
pub mod multi;
pub mod producer;
pub mod registration;
pub mod registry;
pub mod resolver;
pub mod service_container;
pub mod source;
pub mod stats;
pub mod wrappers;

use std::any::Any;
use std::sync::Arc;

use crate::errors::{ContainerError, ContainerResult};

pub use constructor::ConstructorSelector;
pub use contract::{shapes, ContractType, GenericDefinition};
pub use implementation::{Arguments, Constructor, GenericImplementation, Implementation, ImplementationType, Parameter};
pub use metadata::{Metadata, MetadataProjector, MetadataValue, MetadataView};
pub use multi::{MultiRegistration, RegistryEntry};
pub use producer::{LazyProducer, ProducerState};
pub use registration::{InstancingStrategy, Registration, RegistrationBuilder, ServiceLifetime};
pub use registry::{Lookup, ServiceRegistry};
pub use resolver::ResolverEngine;
pub use service_container::ServiceContainer;
pub use source::{
    default_sources, DeferredSource, FactorySource, ListSource, MetadataFactorySource, SequenceSource, ServiceSource,
};
pub use stats::ContainerStats;
pub use wrappers::{Deferred, ExportFactory, MetadataExportFactory, ServiceList, ServiceSequence};

/// 类型擦除的实例
pub type Instance = Arc<dyn Any + Send + Sync>;

/// 向下转型，失败时报告产出它的契约
pub fn downcast<T: Send + Sync + 'static>(instance: Instance, contract: &ContractType) -> ContainerResult<Arc<T>> {
    instance.downcast::<T>().map_err(|_| ContainerError::TypeCastFailed {
        contract: contract.to_string(),
        expected: std::any::type_name::<T>().to_string(),
    })
}
