//! 服务源
//!
//! 服务源为它识别的一族泛型契约合成解析结果，这些包装契约无需显式注册。
//! 注册表在找不到直接条目时按注册顺序询问各服务源。

use std::sync::Arc;

use super::contract::{shapes, ContractType};
use super::registration::Registration;
use super::registry::ServiceRegistry;
use super::resolver::ResolverEngine;
use super::wrappers::{
    Deferred, ExportFactory, ItemShape, MetadataExportFactory, ServiceList, ServiceSequence,
};
use super::Instance;
use crate::errors::{ContainerError, ContainerResult};

/// 服务源描述出的注册序列
pub type Described = Box<dyn Iterator<Item = Arc<Registration>> + Send>;

/// 可插拔的合成策略
pub trait ServiceSource: Send + Sync {
    /// 用于日志
    fn name(&self) -> &str;

    /// 是否能为该契约合成结果
    fn matches(&self, contract: &ContractType) -> bool;

    /// 合成解析结果
    fn resolve(&self, resolver: &ResolverEngine, contract: &ContractType) -> ContainerResult<Instance>;

    /// 合成结果背后的注册（每个注册持有自己的生产者）
    fn describe(&self, resolver: &ResolverEngine, contract: &ContractType) -> ContainerResult<Described>;
}

/// 默认安装的服务源，按此顺序询问
pub fn default_sources() -> Vec<Arc<dyn ServiceSource>> {
    vec![
        Arc::new(SequenceSource),
        Arc::new(FactorySource),
        Arc::new(MetadataFactorySource),
        Arc::new(DeferredSource),
        Arc::new(ListSource),
    ]
}

/// 元素契约拆解为 (注册所在契约, 元素形状)
pub(crate) fn element_shape(registry: &ServiceRegistry, element: &ContractType) -> (ContractType, ItemShape) {
    if let Some(inner) = element.single_argument_of(&shapes::factory()) {
        return (inner.clone(), ItemShape::Factory);
    }
    if let Some([inner, view]) = element.arguments_of(&shapes::metadata_factory()) {
        return (
            inner.clone(),
            ItemShape::MetadataFactory {
                view: view.clone(),
                projector: registry.projector(view),
            },
        );
    }
    if let Some(inner) = element.single_argument_of(&shapes::deferred()) {
        return (inner.clone(), ItemShape::Deferred);
    }
    (element.clone(), ItemShape::Value)
}

fn sequence_over(resolver: &ResolverEngine, element: &ContractType) -> ContainerResult<ServiceSequence> {
    let registry = resolver.registry()?;
    let (target, shape) = element_shape(&registry, element);
    let entries = registry.registrations_for(&target)?;
    Ok(ServiceSequence::new(target, entries, shape, resolver.clone()))
}

fn describe_registrations(resolver: &ResolverEngine, contract: &ContractType) -> ContainerResult<Described> {
    let registry = resolver.registry()?;
    let (target, _) = element_shape(&registry, contract);
    Ok(Box::new(registry.registrations_for(&target)?.into_iter()))
}

/// 恰好一个注册，否则报错
fn single_registration(resolver: &ResolverEngine, inner: &ContractType) -> ContainerResult<Arc<Registration>> {
    let mut entries = resolver.registry()?.registrations_for(inner)?;
    match entries.len() {
        0 => Err(ContainerError::NoImplementation {
            contract: inner.to_string(),
        }),
        1 => Ok(entries.remove(0)),
        count => Err(ContainerError::Ambiguous {
            contract: inner.to_string(),
            count,
        }),
    }
}

fn unmatched(source: &str, contract: &ContractType) -> ContainerError {
    ContainerError::NotConstructible {
        contract: contract.to_string(),
        arguments: contract.generic_arguments().iter().map(ToString::to_string).collect(),
        reason: format!("source '{}' does not handle this contract", source),
    }
}

/// `Sequence<T>`：全部注册的惰性序列
pub struct SequenceSource;

impl ServiceSource for SequenceSource {
    fn name(&self) -> &str {
        shapes::SEQUENCE
    }

    fn matches(&self, contract: &ContractType) -> bool {
        contract.single_argument_of(&shapes::sequence()).is_some()
    }

    fn resolve(&self, resolver: &ResolverEngine, contract: &ContractType) -> ContainerResult<Instance> {
        let element = contract
            .single_argument_of(&shapes::sequence())
            .ok_or_else(|| unmatched(self.name(), contract))?;
        Ok(Arc::new(sequence_over(resolver, element)?))
    }

    fn describe(&self, resolver: &ResolverEngine, contract: &ContractType) -> ContainerResult<Described> {
        match contract.single_argument_of(&shapes::sequence()) {
            Some(element) => describe_registrations(resolver, element),
            None => Ok(Box::new(std::iter::empty())),
        }
    }
}

/// `ExportFactory<T>`：包装唯一注册的创建句柄
pub struct FactorySource;

impl ServiceSource for FactorySource {
    fn name(&self) -> &str {
        shapes::FACTORY
    }

    fn matches(&self, contract: &ContractType) -> bool {
        contract.single_argument_of(&shapes::factory()).is_some()
    }

    fn resolve(&self, resolver: &ResolverEngine, contract: &ContractType) -> ContainerResult<Instance> {
        let inner = contract
            .single_argument_of(&shapes::factory())
            .ok_or_else(|| unmatched(self.name(), contract))?;
        let registration = single_registration(resolver, inner)?;
        Ok(Arc::new(ExportFactory::new(registration, resolver.clone())))
    }

    fn describe(&self, resolver: &ResolverEngine, contract: &ContractType) -> ContainerResult<Described> {
        match contract.single_argument_of(&shapes::factory()) {
            Some(inner) => describe_registrations(resolver, inner),
            None => Ok(Box::new(std::iter::empty())),
        }
    }
}

/// `MetadataExportFactory<T, M>`：创建句柄加上投影后的元数据视图
pub struct MetadataFactorySource;

impl ServiceSource for MetadataFactorySource {
    fn name(&self) -> &str {
        shapes::METADATA_FACTORY
    }

    fn matches(&self, contract: &ContractType) -> bool {
        contract.arguments_of(&shapes::metadata_factory()).is_some()
    }

    fn resolve(&self, resolver: &ResolverEngine, contract: &ContractType) -> ContainerResult<Instance> {
        let (inner, view) = match contract.arguments_of(&shapes::metadata_factory()) {
            Some([inner, view]) => (inner, view),
            _ => return Err(unmatched(self.name(), contract)),
        };
        let registration = single_registration(resolver, inner)?;
        let projector = resolver.registry()?.projector(view);
        let factory = ExportFactory::new(registration, resolver.clone());
        Ok(Arc::new(MetadataExportFactory::project(factory, view, projector.as_ref())?))
    }

    fn describe(&self, resolver: &ResolverEngine, contract: &ContractType) -> ContainerResult<Described> {
        match contract.arguments_of(&shapes::metadata_factory()) {
            Some([inner, _]) => describe_registrations(resolver, inner),
            _ => Ok(Box::new(std::iter::empty())),
        }
    }
}

/// `Deferred<T>`：首次取值时解析 `T`，之后复用
pub struct DeferredSource;

impl ServiceSource for DeferredSource {
    fn name(&self) -> &str {
        shapes::DEFERRED
    }

    fn matches(&self, contract: &ContractType) -> bool {
        contract.single_argument_of(&shapes::deferred()).is_some()
    }

    fn resolve(&self, resolver: &ResolverEngine, contract: &ContractType) -> ContainerResult<Instance> {
        let inner = contract
            .single_argument_of(&shapes::deferred())
            .ok_or_else(|| unmatched(self.name(), contract))?;
        if !resolver.registry()?.can_resolve(inner) {
            return Err(ContainerError::NoImplementation {
                contract: inner.to_string(),
            });
        }
        Ok(Arc::new(Deferred::for_contract(inner.clone(), resolver.clone())))
    }

    fn describe(&self, resolver: &ResolverEngine, contract: &ContractType) -> ContainerResult<Described> {
        match contract.single_argument_of(&shapes::deferred()) {
            Some(inner) => describe_registrations(resolver, inner),
            None => Ok(Box::new(std::iter::empty())),
        }
    }
}

/// `List<T>` / `Collection<T>`：立即生产全部元素
pub struct ListSource;

impl ListSource {
    fn element<'a>(&self, contract: &'a ContractType) -> Option<&'a ContractType> {
        contract
            .single_argument_of(&shapes::list())
            .or_else(|| contract.single_argument_of(&shapes::collection()))
    }
}

impl ServiceSource for ListSource {
    fn name(&self) -> &str {
        shapes::LIST
    }

    fn matches(&self, contract: &ContractType) -> bool {
        self.element(contract).is_some()
    }

    fn resolve(&self, resolver: &ResolverEngine, contract: &ContractType) -> ContainerResult<Instance> {
        let element = self
            .element(contract)
            .ok_or_else(|| unmatched(self.name(), contract))?;
        let sequence = sequence_over(resolver, element)?;
        let items = sequence.collect_all()?;
        Ok(Arc::new(ServiceList::new(sequence.contract().clone(), items)))
    }

    fn describe(&self, resolver: &ResolverEngine, contract: &ContractType) -> ContainerResult<Described> {
        match self.element(contract) {
            Some(element) => describe_registrations(resolver, element),
            None => Ok(Box::new(std::iter::empty())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::container::registration::ServiceLifetime;
    use crate::infrastructure::container::ServiceContainer;

    fn plugin() -> ContractType {
        ContractType::named("IPlugin")
    }

    fn with_plugins(names: &[&'static str]) -> ServiceContainer {
        let container = ServiceContainer::new();
        for name in names {
            let name = *name;
            container
                .register(
                    Registration::factory(plugin(), move |_, _| Ok(Arc::new(name) as Instance))
                        .allow_multiple(true)
                        .build(),
                )
                .unwrap();
        }
        container
    }

    #[test]
    fn test_default_sources_match_their_shapes() {
        let inner = plugin();
        let cases = [
            (shapes::sequence_of(inner.clone()), shapes::SEQUENCE),
            (shapes::factory_of(inner.clone()), shapes::FACTORY),
            (
                shapes::metadata_factory_of(inner.clone(), ContractType::named("View")),
                shapes::METADATA_FACTORY,
            ),
            (shapes::deferred_of(inner.clone()), shapes::DEFERRED),
            (shapes::list_of(inner.clone()), shapes::LIST),
            (shapes::collection_of(inner.clone()), shapes::LIST),
        ];

        let sources = default_sources();
        for (contract, expected) in cases {
            let matched = sources.iter().find(|source| source.matches(&contract)).map(|source| source.name());
            assert_eq!(matched, Some(expected), "contract {}", contract);
        }
        assert!(sources.iter().all(|source| !source.matches(&inner)));
    }

    #[test]
    fn test_factory_source_cardinality() {
        let none = ServiceContainer::new();
        assert!(matches!(
            FactorySource.resolve(&none.resolver(), &shapes::factory_of(plugin())),
            Err(ContainerError::NoImplementation { .. })
        ));

        let one = with_plugins(&["p1"]);
        let factory = FactorySource
            .resolve(&one.resolver(), &shapes::factory_of(plugin()))
            .unwrap()
            .downcast::<ExportFactory>()
            .unwrap();
        assert_eq!(*factory.create_as::<&str>().unwrap(), "p1");

        let many = with_plugins(&["p1", "p2"]);
        assert!(matches!(
            FactorySource.resolve(&many.resolver(), &shapes::factory_of(plugin())),
            Err(ContainerError::Ambiguous { count: 2, .. })
        ));
    }

    #[test]
    fn test_sequence_of_factories() {
        let container = with_plugins(&["p1", "p2", "p3"]);
        let contract = shapes::sequence_of(shapes::factory_of(plugin()));
        let sequence = SequenceSource
            .resolve(&container.resolver(), &contract)
            .unwrap()
            .downcast::<ServiceSequence>()
            .unwrap();

        let names: Vec<&str> = sequence
            .collect_as::<ExportFactory>()
            .unwrap()
            .iter()
            .map(|factory| *factory.create_as::<&str>().unwrap())
            .collect();
        assert_eq!(names, vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_describe_lists_backing_registrations() {
        let container = with_plugins(&["p1", "p2"]);
        let described: Vec<Arc<Registration>> = SequenceSource
            .describe(&container.resolver(), &shapes::sequence_of(plugin()))
            .unwrap()
            .collect();
        assert_eq!(described.len(), 2);
        assert!(described.iter().all(|registration| registration.contract() == &plugin()));
        assert_eq!(described[0].lifetime(), ServiceLifetime::Transient);
    }

    #[test]
    fn test_deferred_requires_resolvable_inner() {
        let container = ServiceContainer::new();
        assert!(matches!(
            DeferredSource.resolve(&container.resolver(), &shapes::deferred_of(plugin())),
            Err(ContainerError::NoImplementation { .. })
        ));
    }

    #[test]
    fn test_list_source_materializes_eagerly() {
        let container = with_plugins(&["p1", "p2"]);
        let list = ListSource
            .resolve(&container.resolver(), &shapes::collection_of(plugin()))
            .unwrap()
            .downcast::<ServiceList>()
            .unwrap();
        assert_eq!(list.len(), 2);
        list.push(Arc::new("extra"));
        assert_eq!(list.len(), 3);
    }
}
