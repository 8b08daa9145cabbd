//! 服务注册
//!
//! 注册创建后不可变，描述如何为一个契约产出实例。
//! 每个注册持有自己的 [`LazyProducer`]，因此生命周期与循环检测都按注册隔离。

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::constructor::ConstructorSelector;
use super::contract::ContractType;
use super::implementation::{Arguments, Implementation, ImplementationType};
use super::metadata::{keys, Metadata, MetadataValue};
use super::producer::{LazyProducer, ProduceFn, Production};
use super::resolver::ResolverEngine;
use super::Instance;
use crate::errors::{ContainerError, ContainerResult};

/// 服务生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceLifetime {
    /// 单例 - 首次生产后缓存
    Singleton,
    /// 瞬态 - 每次请求都创建新实例
    Transient,
}

/// 工厂函数，接收解析器和正在产出的契约
pub type FactoryFn = Arc<dyn Fn(&ResolverEngine, &ContractType) -> ContainerResult<Instance> + Send + Sync>;

/// 销毁钩子，容器拆除时对缓存的单例调用
pub type Disposer = Arc<dyn Fn(&Instance) + Send + Sync>;

/// 实例化策略
#[derive(Clone)]
pub enum InstancingStrategy {
    /// 现成实例，生命周期强制为单例
    Instance(Instance),
    /// 由构造函数选择器构造的实现类型
    Type(Implementation),
    /// 工厂函数
    Factory(FactoryFn),
}

impl fmt::Debug for InstancingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstancingStrategy::Instance(_) => write!(f, "Instance"),
            InstancingStrategy::Type(implementation) => write!(f, "Type({})", implementation.name()),
            InstancingStrategy::Factory(_) => write!(f, "Factory"),
        }
    }
}

/// 服务注册
pub struct Registration {
    contract: ContractType,
    lifetime: ServiceLifetime,
    strategy: InstancingStrategy,
    allow_multiple: bool,
    externally_owned: bool,
    metadata: Metadata,
    disposer: Option<Disposer>,
    producer: LazyProducer,
}

impl Registration {
    /// 现成实例
    pub fn instance(contract: ContractType, instance: Instance) -> RegistrationBuilder {
        RegistrationBuilder::new(contract, InstancingStrategy::Instance(instance))
    }

    /// 由实现类型构造
    pub fn implementation(contract: ContractType, implementation: impl Into<Implementation>) -> RegistrationBuilder {
        RegistrationBuilder::new(contract, InstancingStrategy::Type(implementation.into()))
    }

    /// 由工厂函数产出
    pub fn factory<F>(contract: ContractType, factory: F) -> RegistrationBuilder
    where
        F: Fn(&ResolverEngine, &ContractType) -> ContainerResult<Instance> + Send + Sync + 'static,
    {
        RegistrationBuilder::new(contract, InstancingStrategy::Factory(Arc::new(factory)))
    }

    pub fn contract(&self) -> &ContractType {
        &self.contract
    }

    pub fn lifetime(&self) -> ServiceLifetime {
        self.lifetime
    }

    pub fn strategy(&self) -> &InstancingStrategy {
        &self.strategy
    }

    pub fn allows_multiple(&self) -> bool {
        self.allow_multiple
    }

    pub fn is_externally_owned(&self) -> bool {
        self.externally_owned
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn is_override(&self) -> bool {
        self.metadata.is_override()
    }

    pub fn producer(&self) -> &LazyProducer {
        &self.producer
    }

    /// 产出实例
    pub fn produce(&self, resolver: &ResolverEngine) -> ContainerResult<Instance> {
        let (instance, production) = self.producer.get_tracked(resolver)?;
        if let Ok(registry) = resolver.registry() {
            let stats = registry.stats_recorder();
            match (self.lifetime, production) {
                (ServiceLifetime::Singleton, Production::Cached) => stats.record_singleton_hit(),
                (ServiceLifetime::Singleton, Production::Created) => stats.record_singleton_miss(),
                (ServiceLifetime::Transient, _) => stats.record_transient_creation(),
            }
        }
        Ok(instance)
    }

    /// 按泛型参数闭合注册
    ///
    /// 只有开放泛型契约且实现本身是同元数的开放泛型（或工厂）时才可闭合；
    /// 直接注册到泛型契约上的非泛型实现只能原样复用。
    pub fn make_closed(&self, arguments: &[ContractType]) -> ContainerResult<Registration> {
        let not_constructible = |reason: String| ContainerError::NotConstructible {
            contract: self.contract.to_string(),
            arguments: arguments.iter().map(ToString::to_string).collect(),
            reason,
        };

        let definition = match self.contract.generic_definition() {
            Some(definition) if self.contract.is_open_generic() => definition,
            _ => return Err(not_constructible("contract is not an open generic".to_string())),
        };
        if definition.arity() != arguments.len() {
            return Err(not_constructible(format!(
                "expected {} generic arguments, got {}",
                definition.arity(),
                arguments.len()
            )));
        }

        let strategy = match &self.strategy {
            InstancingStrategy::Type(Implementation::Generic(generic)) => {
                if generic.arity() != arguments.len() {
                    return Err(not_constructible(format!(
                        "implementation '{}' takes {} generic arguments",
                        generic.name(),
                        generic.arity()
                    )));
                }
                let closed = generic.close(arguments)?;
                InstancingStrategy::Type(Implementation::Concrete(Arc::new(closed)))
            }
            InstancingStrategy::Type(Implementation::Concrete(implementation)) => {
                return Err(not_constructible(format!(
                    "implementation '{}' has no generic arguments to close",
                    implementation.name()
                )));
            }
            InstancingStrategy::Instance(_) => {
                return Err(not_constructible("an existing instance cannot be re-closed".to_string()));
            }
            InstancingStrategy::Factory(factory) => InstancingStrategy::Factory(factory.clone()),
        };

        Ok(RegistrationBuilder {
            contract: definition.close(arguments.iter().cloned()),
            lifetime: self.lifetime,
            strategy,
            allow_multiple: self.allow_multiple,
            externally_owned: self.externally_owned,
            metadata: self.metadata.clone(),
            disposer: self.disposer.clone(),
        }
        .build())
    }

    /// 释放单例缓存；外部拥有的实例不调用销毁钩子
    pub(crate) fn dispose(&self) {
        if self.lifetime != ServiceLifetime::Singleton {
            return;
        }
        if let Some(instance) = self.producer.release() {
            if self.externally_owned {
                return;
            }
            if let Some(disposer) = &self.disposer {
                tracing::debug!(contract = %self.contract, "Disposing singleton");
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| disposer(&instance)));
                if outcome.is_err() {
                    tracing::warn!(contract = %self.contract, "Disposer panicked; instance dropped");
                }
            }
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("contract", &self.contract)
            .field("lifetime", &self.lifetime)
            .field("strategy", &self.strategy)
            .field("allow_multiple", &self.allow_multiple)
            .field("externally_owned", &self.externally_owned)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// 注册构建器
pub struct RegistrationBuilder {
    contract: ContractType,
    lifetime: ServiceLifetime,
    strategy: InstancingStrategy,
    allow_multiple: bool,
    externally_owned: bool,
    metadata: Metadata,
    disposer: Option<Disposer>,
}

impl RegistrationBuilder {
    fn new(contract: ContractType, strategy: InstancingStrategy) -> Self {
        Self {
            contract,
            lifetime: ServiceLifetime::Transient,
            strategy,
            allow_multiple: false,
            externally_owned: false,
            metadata: Metadata::new(),
            disposer: None,
        }
    }

    /// 现成实例忽略此设置
    pub fn lifetime(mut self, lifetime: ServiceLifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn singleton(self) -> Self {
        self.lifetime(ServiceLifetime::Singleton)
    }

    pub fn transient(self) -> Self {
        self.lifetime(ServiceLifetime::Transient)
    }

    pub fn allow_multiple(mut self, allow_multiple: bool) -> Self {
        self.allow_multiple = allow_multiple;
        self
    }

    pub fn externally_owned(mut self) -> Self {
        self.externally_owned = true;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        for (key, value) in metadata.iter() {
            self.metadata.insert(key, value.clone());
        }
        self
    }

    pub fn priority(self, priority: i64) -> Self {
        self.metadata(keys::PRIORITY, priority)
    }

    /// 显式覆盖同一单实现契约上的已有注册
    pub fn as_override(self) -> Self {
        self.metadata(keys::OVERRIDE, true)
    }

    pub fn on_dispose<T, F>(mut self, disposer: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.disposer = Some(Arc::new(move |instance: &Instance| {
            if let Some(value) = instance.downcast_ref::<T>() {
                disposer(value);
            }
        }));
        self
    }

    pub fn build(self) -> Registration {
        let RegistrationBuilder {
            contract,
            mut lifetime,
            strategy,
            allow_multiple,
            externally_owned,
            metadata,
            disposer,
        } = self;

        let producer = match &strategy {
            InstancingStrategy::Instance(instance) => {
                lifetime = ServiceLifetime::Singleton;
                LazyProducer::ready(contract.clone(), instance.clone())
            }
            InstancingStrategy::Type(implementation) => {
                LazyProducer::new(contract.clone(), lifetime, construct(&contract, implementation))
            }
            InstancingStrategy::Factory(factory) => {
                let factory = factory.clone();
                let produced = contract.clone();
                LazyProducer::new(
                    contract.clone(),
                    lifetime,
                    Arc::new(move |resolver: &ResolverEngine| factory(resolver, &produced)),
                )
            }
        };

        Registration {
            contract,
            lifetime,
            strategy,
            allow_multiple,
            externally_owned,
            metadata,
            disposer,
            producer,
        }
    }
}

fn construct(contract: &ContractType, implementation: &Implementation) -> ProduceFn {
    let contract = contract.clone();
    match implementation {
        Implementation::Concrete(implementation) => {
            let implementation = implementation.clone();
            Arc::new(move |resolver: &ResolverEngine| build_instance(&contract, &implementation, resolver))
        }
        Implementation::Generic(generic) => {
            let name = generic.name().to_string();
            Arc::new(move |_: &ResolverEngine| {
                Err(ContainerError::NotConstructible {
                    contract: contract.to_string(),
                    arguments: Vec::new(),
                    reason: format!("open generic implementation '{}' must be closed before use", name),
                })
            })
        }
    }
}

/// 选择构造函数、逐个解析参数并调用
fn build_instance(
    contract: &ContractType,
    implementation: &Arc<ImplementationType>,
    resolver: &ResolverEngine,
) -> ContainerResult<Instance> {
    let registry = resolver.registry()?;
    let constructor = ConstructorSelector::select_cached(implementation, |parameter| {
        parameter.has_default() || registry.can_resolve(parameter.contract())
    })?;

    let mut values = Vec::with_capacity(constructor.arity());
    for parameter in constructor.parameters() {
        let resolved = match resolver.try_resolve(parameter.contract()) {
            Ok(resolved) => resolved,
            // 只声明未注册的参数契约与未注册同等对待；更深层的缺失照常返回
            Err(ContainerError::NoImplementation { contract: missing }) if missing == parameter.contract().to_string() => {
                None
            }
            Err(e) => return Err(e),
        };
        match resolved.or_else(|| parameter.default_value()) {
            Some(instance) => values.push(instance),
            None => {
                return Err(ContainerError::UnresolvableDependency {
                    contract: contract.to_string(),
                    parameter: parameter.contract().to_string(),
                })
            }
        }
    }

    let parameters = constructor
        .parameters()
        .iter()
        .map(|parameter| parameter.contract().clone())
        .collect();
    constructor.invoke(&Arguments::new(implementation.shared_name(), parameters, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::container::contract::GenericDefinition;
    use crate::infrastructure::container::implementation::{Constructor, GenericImplementation};

    fn repository() -> GenericDefinition {
        GenericDefinition::new("Repository", 1)
    }

    #[test]
    fn test_instance_forces_singleton() {
        let registration = Registration::instance(ContractType::of::<u8>(), Arc::new(1_u8))
            .transient()
            .build();
        assert_eq!(registration.lifetime(), ServiceLifetime::Singleton);
    }

    #[test]
    fn test_builder_flags() {
        let registration = Registration::factory(ContractType::named("IPlugin"), |_, _| Ok(Arc::new(()) as Instance))
            .singleton()
            .allow_multiple(true)
            .externally_owned()
            .priority(5)
            .as_override()
            .build();

        assert!(registration.allows_multiple());
        assert!(registration.is_externally_owned());
        assert!(registration.is_override());
        assert_eq!(registration.metadata().priority(), 5);
    }

    #[test]
    fn test_make_closed_with_generic_implementation() {
        let implementation = GenericImplementation::new("SqlRepository", 1, |arguments| {
            let name = format!("SqlRepository<{}>", arguments[0]);
            Ok(ImplementationType::new(name.clone())
                .with_constructor(Constructor::nullary(move || Ok(name.clone()))))
        });
        let registration = Registration::implementation(repository().open(), implementation)
            .singleton()
            .build();

        let closed = registration.make_closed(&[ContractType::of::<i32>()]).unwrap();
        assert_eq!(closed.contract(), &repository().close([ContractType::of::<i32>()]));
        assert_eq!(closed.lifetime(), ServiceLifetime::Singleton);
        match closed.strategy() {
            InstancingStrategy::Type(Implementation::Concrete(implementation)) => {
                assert_eq!(implementation.name(), "SqlRepository<i32>");
            }
            other => panic!("unexpected strategy {:?}", other),
        }
    }

    #[test]
    fn test_make_closed_rejects_non_generic_implementation() {
        let registration = Registration::implementation(repository().open(), ImplementationType::new("Fixed"))
            .build();
        let result = registration.make_closed(&[ContractType::of::<i32>()]);
        assert!(matches!(result, Err(ContainerError::NotConstructible { .. })));
    }

    #[test]
    fn test_make_closed_rejects_wrong_arity_and_closed_contracts() {
        let registration = Registration::factory(repository().open(), |_, _| Ok(Arc::new(()) as Instance)).build();
        assert!(matches!(
            registration.make_closed(&[ContractType::of::<i32>(), ContractType::of::<u8>()]),
            Err(ContainerError::NotConstructible { .. })
        ));

        let concrete = Registration::factory(ContractType::named("Plain"), |_, _| Ok(Arc::new(()) as Instance)).build();
        assert!(matches!(
            concrete.make_closed(&[ContractType::of::<i32>()]),
            Err(ContainerError::NotConstructible { .. })
        ));
    }

    #[test]
    fn test_make_closed_factory_sees_closed_contract() {
        let registration = Registration::factory(repository().open(), |_, contract| {
            Ok(Arc::new(contract.to_string()) as Instance)
        })
        .build();
        let closed = registration.make_closed(&[ContractType::named("User")]).unwrap();
        let container = crate::infrastructure::container::ServiceContainer::new();
        let produced = closed.produce(&container.resolver()).unwrap();
        assert_eq!(*produced.downcast::<String>().unwrap(), "Repository<User>");
    }
}
