//! 契约类型标识
//!
//! 契约类型是查找键：具体 Rust 类型、具名契约、开放泛型或闭合泛型。
//! 相等性只比较类型定义和泛型参数，显示名称不参与比较。

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// 泛型定义（未绑定参数的泛型类型）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericDefinition {
    name: Arc<str>,
    arity: usize,
}

impl GenericDefinition {
    pub fn new(name: impl Into<Arc<str>>, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// 开放形式，如 `Repository<_>`
    pub fn open(&self) -> ContractType {
        ContractType {
            key: TypeKey::Generic(self.clone()),
            name: self.name.clone(),
            arguments: Arc::from(Vec::new()),
        }
    }

    /// 以给定参数闭合，参数数量由调用方保证与 arity 一致
    pub fn close(&self, arguments: impl IntoIterator<Item = ContractType>) -> ContractType {
        ContractType {
            key: TypeKey::Generic(self.clone()),
            name: self.name.clone(),
            arguments: arguments.into_iter().collect::<Vec<_>>().into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TypeKey {
    Rust(TypeId),
    Named(Arc<str>),
    Generic(GenericDefinition),
}

/// 契约类型
#[derive(Clone)]
pub struct ContractType {
    key: TypeKey,
    name: Arc<str>,
    arguments: Arc<[ContractType]>,
}

impl ContractType {
    /// 具体 Rust 类型，`dyn Trait` 同样可用
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            key: TypeKey::Rust(TypeId::of::<T>()),
            name: Arc::from(std::any::type_name::<T>()),
            arguments: Arc::from(Vec::new()),
        }
    }

    /// 以名称标识的契约
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        let name = name.into();
        Self {
            key: TypeKey::Named(name.clone()),
            name,
            arguments: Arc::from(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_generic(&self) -> bool {
        matches!(self.key, TypeKey::Generic(_))
    }

    pub fn is_open_generic(&self) -> bool {
        self.is_generic() && self.arguments.is_empty()
    }

    pub fn is_closed_generic(&self) -> bool {
        self.is_generic() && !self.arguments.is_empty()
    }

    pub fn generic_definition(&self) -> Option<&GenericDefinition> {
        match &self.key {
            TypeKey::Generic(definition) => Some(definition),
            _ => None,
        }
    }

    pub fn generic_arguments(&self) -> &[ContractType] {
        &self.arguments
    }

    /// 闭合泛型对应的开放形式
    pub fn open_form(&self) -> Option<ContractType> {
        if self.is_closed_generic() {
            self.generic_definition().map(GenericDefinition::open)
        } else {
            None
        }
    }

    /// 若为 `definition` 的闭合形式，返回唯一的泛型参数
    pub(crate) fn single_argument_of(&self, definition: &GenericDefinition) -> Option<&ContractType> {
        self.arguments_of(definition).and_then(|args| match args {
            [inner] => Some(inner),
            _ => None,
        })
    }

    /// 若为 `definition` 的闭合形式，返回全部泛型参数
    pub(crate) fn arguments_of(&self, definition: &GenericDefinition) -> Option<&[ContractType]> {
        match &self.key {
            TypeKey::Generic(own)
                if own == definition && self.arguments.len() == definition.arity() =>
            {
                Some(&self.arguments)
            }
            _ => None,
        }
    }
}

impl PartialEq for ContractType {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.arguments == other.arguments
    }
}

impl Eq for ContractType {}

impl Hash for ContractType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.arguments.hash(state);
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        match &self.key {
            TypeKey::Generic(definition) if self.arguments.is_empty() => {
                let placeholders = vec!["_"; definition.arity()];
                write!(f, "<{}>", placeholders.join(", "))
            }
            TypeKey::Generic(_) => {
                let arguments: Vec<String> = self.arguments.iter().map(ToString::to_string).collect();
                write!(f, "<{}>", arguments.join(", "))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContractType({})", self)
    }
}

/// 内置的包装形状定义
///
/// 这些泛型从不需要显式注册，由默认的 [`ServiceSource`](super::ServiceSource) 合成。
pub mod shapes {
    use super::{ContractType, GenericDefinition};

    pub const SEQUENCE: &str = "Sequence";
    pub const FACTORY: &str = "ExportFactory";
    pub const METADATA_FACTORY: &str = "MetadataExportFactory";
    pub const DEFERRED: &str = "Deferred";
    pub const LIST: &str = "List";
    pub const COLLECTION: &str = "Collection";

    pub fn sequence() -> GenericDefinition {
        GenericDefinition::new(SEQUENCE, 1)
    }

    pub fn factory() -> GenericDefinition {
        GenericDefinition::new(FACTORY, 1)
    }

    pub fn metadata_factory() -> GenericDefinition {
        GenericDefinition::new(METADATA_FACTORY, 2)
    }

    pub fn deferred() -> GenericDefinition {
        GenericDefinition::new(DEFERRED, 1)
    }

    pub fn list() -> GenericDefinition {
        GenericDefinition::new(LIST, 1)
    }

    pub fn collection() -> GenericDefinition {
        GenericDefinition::new(COLLECTION, 1)
    }

    pub fn sequence_of(inner: ContractType) -> ContractType {
        sequence().close([inner])
    }

    pub fn factory_of(inner: ContractType) -> ContractType {
        factory().close([inner])
    }

    pub fn metadata_factory_of(inner: ContractType, view: ContractType) -> ContractType {
        metadata_factory().close([inner, view])
    }

    pub fn deferred_of(inner: ContractType) -> ContractType {
        deferred().close([inner])
    }

    pub fn list_of(inner: ContractType) -> ContractType {
        list().close([inner])
    }

    pub fn collection_of(inner: ContractType) -> ContractType {
        collection().close([inner])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    trait Logger {}

    #[test]
    fn test_rust_types_compare_by_type_id() {
        assert_eq!(ContractType::of::<i32>(), ContractType::of::<i32>());
        assert_ne!(ContractType::of::<i32>(), ContractType::of::<u32>());
        assert_ne!(ContractType::of::<dyn Logger>(), ContractType::of::<i32>());
    }

    #[test]
    fn test_closed_generics_compare_arguments() {
        let repository = GenericDefinition::new("Repository", 1);
        let of_int = repository.close([ContractType::of::<i32>()]);
        let of_int_again = repository.close([ContractType::of::<i32>()]);
        let of_string = repository.close([ContractType::of::<String>()]);

        assert_eq!(of_int, of_int_again);
        assert_ne!(of_int, of_string);
        assert_ne!(of_int, repository.open());

        let mut set = HashSet::new();
        set.insert(of_int.clone());
        assert!(set.contains(&of_int_again));
    }

    #[test]
    fn test_open_and_closed_forms() {
        let repository = GenericDefinition::new("Repository", 1);
        let open = repository.open();
        let closed = repository.close([ContractType::named("User")]);

        assert!(open.is_open_generic());
        assert!(!open.is_closed_generic());
        assert!(closed.is_closed_generic());
        assert_eq!(closed.open_form(), Some(open.clone()));
        assert_eq!(open.open_form(), None);
        assert_eq!(ContractType::named("User").open_form(), None);
    }

    #[test]
    fn test_display_formats() {
        let pair = GenericDefinition::new("Pair", 2);
        assert_eq!(pair.open().to_string(), "Pair<_, _>");
        assert_eq!(
            pair.close([ContractType::named("A"), ContractType::named("B")]).to_string(),
            "Pair<A, B>"
        );
        assert_eq!(
            shapes::sequence_of(ContractType::named("IPlugin")).to_string(),
            "Sequence<IPlugin>"
        );
    }

    #[test]
    fn test_shape_argument_extraction() {
        let inner = ContractType::named("IPlugin");
        let sequence = shapes::sequence_of(inner.clone());

        assert_eq!(sequence.single_argument_of(&shapes::sequence()), Some(&inner));
        assert_eq!(sequence.single_argument_of(&shapes::factory()), None);

        let with_view = shapes::metadata_factory_of(inner.clone(), ContractType::named("View"));
        assert_eq!(
            with_view.arguments_of(&shapes::metadata_factory()).map(<[_]>::len),
            Some(2)
        );
    }
}
