//! 实现类型描述
//!
//! Rust 没有运行时反射，实现类型以显式描述符的形式给出：
//! 一组构造函数，每个构造函数声明参数契约并提供调用闭包。
//! 开放泛型实现通过绑定函数按泛型参数生成具体描述符。

use parking_lot::RwLock;
use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use super::contract::ContractType;
use super::{downcast, Instance};
use crate::errors::{ContainerError, ContainerResult};

type DefaultFn = Arc<dyn Fn() -> Instance + Send + Sync>;
type InvokeFn = Arc<dyn Fn(&Arguments) -> ContainerResult<Instance> + Send + Sync>;
type BindFn = Arc<dyn Fn(&[ContractType]) -> ContainerResult<ImplementationType> + Send + Sync>;

/// 构造函数参数
#[derive(Clone)]
pub struct Parameter {
    contract: ContractType,
    default: Option<DefaultFn>,
}

impl Parameter {
    /// 必需参数
    pub fn required(contract: ContractType) -> Self {
        Self {
            contract,
            default: None,
        }
    }

    /// 带默认值的参数，契约不可解析时使用默认值
    pub fn optional<F>(contract: ContractType, default: F) -> Self
    where
        F: Fn() -> Instance + Send + Sync + 'static,
    {
        Self {
            contract,
            default: Some(Arc::new(default)),
        }
    }

    pub fn contract(&self) -> &ContractType {
        &self.contract
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub(crate) fn default_value(&self) -> Option<Instance> {
        self.default.as_ref().map(|default| default())
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("contract", &self.contract)
            .field("has_default", &self.has_default())
            .finish()
    }
}

/// 构造函数调用时的已解析参数
pub struct Arguments {
    implementation: Arc<str>,
    parameters: Vec<ContractType>,
    values: Vec<Instance>,
}

impl Arguments {
    pub(crate) fn new(implementation: Arc<str>, parameters: Vec<ContractType>, values: Vec<Instance>) -> Self {
        Self {
            implementation,
            parameters,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 第 `index` 个参数的原始实例
    pub fn instance(&self, index: usize) -> ContainerResult<Instance> {
        self.values.get(index).cloned().ok_or_else(|| {
            ContainerError::creation_failed(
                &self.implementation,
                format!("constructor argument {} is out of range ({} supplied)", index, self.values.len()),
            )
        })
    }

    /// 第 `index` 个参数，向下转型为 `T`
    pub fn get<T: Send + Sync + 'static>(&self, index: usize) -> ContainerResult<Arc<T>> {
        let instance = self.instance(index)?;
        let contract = self
            .parameters
            .get(index)
            .cloned()
            .unwrap_or_else(|| ContractType::named(self.implementation.clone()));
        downcast::<T>(instance, &contract)
    }

    /// 第 `index` 个参数的克隆，适用于 `Arc<dyn Trait>` 形式的实例
    pub fn cloned<T: Clone + Send + Sync + 'static>(&self, index: usize) -> ContainerResult<T> {
        self.get::<T>(index).map(|value| (*value).clone())
    }
}

/// 构造函数描述
pub struct Constructor {
    parameters: Vec<Parameter>,
    invoke: InvokeFn,
}

impl Constructor {
    /// 产出类型为 `T` 的构造函数
    pub fn new<T, F>(parameters: impl IntoIterator<Item = Parameter>, invoke: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Arguments) -> ContainerResult<T> + Send + Sync + 'static,
    {
        Self::erased(parameters, move |arguments| {
            invoke(arguments).map(|value| Arc::new(value) as Instance)
        })
    }

    /// 无参构造函数
    pub fn nullary<T, F>(invoke: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> ContainerResult<T> + Send + Sync + 'static,
    {
        Self::new(Vec::new(), move |_: &Arguments| invoke())
    }

    /// 直接产出类型擦除实例的构造函数
    pub fn erased<F>(parameters: impl IntoIterator<Item = Parameter>, invoke: F) -> Self
    where
        F: Fn(&Arguments) -> ContainerResult<Instance> + Send + Sync + 'static,
    {
        Self {
            parameters: parameters.into_iter().collect(),
            invoke: Arc::new(invoke),
        }
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// 参数类型签名，用于错误信息
    pub fn signature(&self) -> Vec<String> {
        self.parameters
            .iter()
            .map(|parameter| parameter.contract.to_string())
            .collect()
    }

    pub(crate) fn invoke(&self, arguments: &Arguments) -> ContainerResult<Instance> {
        (self.invoke)(arguments)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Constructor({})", self.signature().join(", "))
    }
}

/// 具体实现类型
pub struct ImplementationType {
    name: Arc<str>,
    constructors: Vec<Arc<Constructor>>,
    /// 首次使用时选定的构造函数，之后不再重新评估
    pub(crate) selected: RwLock<Option<Arc<Constructor>>>,
}

impl ImplementationType {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            constructors: Vec::new(),
            selected: RwLock::new(None),
        }
    }

    /// 以 Rust 类型名命名
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(type_name::<T>())
    }

    pub fn with_constructor(mut self, constructor: Constructor) -> Self {
        self.constructors.push(Arc::new(constructor));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        self.name.clone()
    }

    pub fn constructors(&self) -> &[Arc<Constructor>] {
        &self.constructors
    }

    /// 已缓存的构造函数选择结果
    pub fn selected_constructor(&self) -> Option<Arc<Constructor>> {
        self.selected.read().clone()
    }
}

impl fmt::Debug for ImplementationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImplementationType")
            .field("name", &self.name)
            .field("constructors", &self.constructors)
            .finish()
    }
}

/// 开放泛型实现
pub struct GenericImplementation {
    name: Arc<str>,
    arity: usize,
    bind: BindFn,
}

impl GenericImplementation {
    /// `bind` 收到与 `arity` 等长的泛型参数，返回闭合后的实现描述
    pub fn new<F>(name: impl Into<Arc<str>>, arity: usize, bind: F) -> Self
    where
        F: Fn(&[ContractType]) -> ContainerResult<ImplementationType> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            arity,
            bind: Arc::new(bind),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub(crate) fn close(&self, arguments: &[ContractType]) -> ContainerResult<ImplementationType> {
        (self.bind)(arguments)
    }
}

impl fmt::Debug for GenericImplementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GenericImplementation({}/{})", self.name, self.arity)
    }
}

/// 注册所用的实现
#[derive(Debug, Clone)]
pub enum Implementation {
    Concrete(Arc<ImplementationType>),
    Generic(Arc<GenericImplementation>),
}

impl Implementation {
    pub fn name(&self) -> &str {
        match self {
            Implementation::Concrete(implementation) => implementation.name(),
            Implementation::Generic(implementation) => implementation.name(),
        }
    }
}

impl From<ImplementationType> for Implementation {
    fn from(implementation: ImplementationType) -> Self {
        Implementation::Concrete(Arc::new(implementation))
    }
}

impl From<GenericImplementation> for Implementation {
    fn from(implementation: GenericImplementation) -> Self {
        Implementation::Generic(Arc::new(implementation))
    }
}

impl From<Arc<ImplementationType>> for Implementation {
    fn from(implementation: Arc<ImplementationType>) -> Self {
        Implementation::Concrete(implementation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Port(u16);

    #[test]
    fn test_arguments_downcast_by_position() {
        let arguments = Arguments::new(
            Arc::from("Server"),
            vec![ContractType::of::<Port>()],
            vec![Arc::new(Port(8080)) as Instance],
        );

        assert_eq!(*arguments.get::<Port>(0).unwrap(), Port(8080));
        assert!(matches!(
            arguments.get::<String>(0),
            Err(ContainerError::TypeCastFailed { .. })
        ));
        assert!(matches!(
            arguments.instance(3),
            Err(ContainerError::CreationFailed { .. })
        ));
    }

    #[test]
    fn test_constructor_signature_and_invoke() {
        let constructor = Constructor::new(
            [Parameter::required(ContractType::of::<Port>())],
            |arguments: &Arguments| Ok(arguments.get::<Port>(0)?.0 + 1),
        );
        assert_eq!(constructor.arity(), 1);
        assert_eq!(constructor.signature().len(), 1);

        let arguments = Arguments::new(
            Arc::from("Next"),
            vec![ContractType::of::<Port>()],
            vec![Arc::new(Port(1)) as Instance],
        );
        let produced = constructor.invoke(&arguments).unwrap();
        assert_eq!(*produced.downcast::<u16>().unwrap(), 2);
    }

    #[test]
    fn test_optional_parameter_default() {
        let parameter = Parameter::optional(ContractType::of::<Port>(), || Arc::new(Port(80)) as Instance);
        assert!(parameter.has_default());
        let value = parameter.default_value().unwrap();
        assert_eq!(*value.downcast::<Port>().unwrap(), Port(80));
    }
}
