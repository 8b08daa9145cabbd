//! 注册元数据
//!
//! 保持插入顺序的键值表。`container.` 前缀的键保留给容器自身使用，
//! 其余键由服务源和元数据视图按约定解释。

use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

use super::Instance;

/// 保留键
pub mod keys {
    /// 布尔值，标记显式覆盖注册
    pub const OVERRIDE: &str = "container.override";
    /// 整数，数值越大越靠前
    pub const PRIORITY: &str = "container.priority";
}

/// 元数据值
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<MetadataValue>),
}

impl MetadataValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetadataValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            MetadataValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(value) => Some(*value),
            MetadataValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[MetadataValue]> {
        match self {
            MetadataValue::List(values) => Some(values),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(value) => write!(f, "{}", value),
            MetadataValue::Int(value) => write!(f, "{}", value),
            MetadataValue::Float(value) => write!(f, "{}", value),
            MetadataValue::Text(value) => write!(f, "{}", value),
            MetadataValue::List(values) => {
                let items: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Int(value)
    }
}

impl From<i32> for MetadataValue {
    fn from(value: i32) -> Self {
        MetadataValue::Int(i64::from(value))
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl<T: Into<MetadataValue>> From<Vec<T>> for MetadataValue {
    fn from(values: Vec<T>) -> Self {
        MetadataValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// 注册元数据表
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    entries: IndexMap<String, MetadataValue>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// 链式添加
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// 插入或替换，替换时保留原位置
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Option<MetadataValue> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn is_override(&self) -> bool {
        self.get(keys::OVERRIDE)
            .and_then(MetadataValue::as_bool)
            .unwrap_or(false)
    }

    /// 未设置时为 0
    pub fn priority(&self) -> i64 {
        self.get(keys::PRIORITY)
            .and_then(MetadataValue::as_int)
            .unwrap_or(0)
    }
}

/// 从注册元数据构造的类型化视图
///
/// ```
/// use iocore::{Metadata, MetadataView};
///
/// struct PluginInfo {
///     name: String,
/// }
///
/// impl MetadataView for PluginInfo {
///     fn from_metadata(metadata: &Metadata) -> Result<Self, String> {
///         let name = metadata
///             .get("name")
///             .and_then(|value| value.as_str())
///             .ok_or("missing 'name'")?;
///         Ok(Self { name: name.to_string() })
///     }
/// }
///
/// let info = PluginInfo::from_metadata(&Metadata::new().with("name", "csv")).unwrap();
/// assert_eq!(info.name, "csv");
/// ```
pub trait MetadataView: Sized + Send + Sync + 'static {
    fn from_metadata(metadata: &Metadata) -> Result<Self, String>;
}

/// 类型擦除的元数据投影器
pub type MetadataProjector = Arc<dyn Fn(&Metadata) -> Result<Instance, String> + Send + Sync>;

pub(crate) fn projector_for<M: MetadataView>() -> MetadataProjector {
    Arc::new(|metadata: &Metadata| {
        M::from_metadata(metadata).map(|view| Arc::new(view) as Instance)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_is_preserved() {
        let metadata = Metadata::new()
            .with("zeta", 1)
            .with("alpha", "a")
            .with("mid", true);
        let keys: Vec<&str> = metadata.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_reserved_keys() {
        let plain = Metadata::new();
        assert!(!plain.is_override());
        assert_eq!(plain.priority(), 0);

        let tagged = Metadata::new()
            .with(keys::OVERRIDE, true)
            .with(keys::PRIORITY, 7);
        assert!(tagged.is_override());
        assert_eq!(tagged.priority(), 7);
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(MetadataValue::from(3).as_float(), Some(3.0));
        assert_eq!(MetadataValue::from("x").as_int(), None);
        assert_eq!(
            MetadataValue::from(vec!["a", "b"]).to_string(),
            "[a, b]"
        );
    }
}
