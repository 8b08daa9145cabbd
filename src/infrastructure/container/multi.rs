//! 多实现注册
//!
//! 同一契约下按插入顺序排列的注册集合。单值解析取最后一个（后注册者覆盖），
//! 枚举形式按插入顺序返回全部。注册表以写时复制的方式替换它，
//! 正在进行的解析持有的旧快照不受影响。

use std::sync::Arc;

use super::contract::ContractType;
use super::registration::Registration;
use super::resolver::ResolverEngine;
use super::wrappers::ServiceSequence;
use super::Instance;
use crate::errors::{ContainerError, ContainerResult};

#[derive(Debug, Clone)]
pub struct MultiRegistration {
    contract: ContractType,
    entries: Vec<Arc<Registration>>,
}

impl MultiRegistration {
    /// 空的多实现注册（前置声明）
    pub fn new(contract: ContractType) -> Self {
        Self {
            contract,
            entries: Vec::new(),
        }
    }

    pub fn contract(&self) -> &ContractType {
        &self.contract
    }

    /// 追加注册；不允许多实现的注册会被拒绝
    pub fn add(&mut self, registration: Arc<Registration>) -> ContainerResult<()> {
        if !registration.allows_multiple() {
            return Err(ContainerError::LifetimeMismatch {
                contract: registration.contract().to_string(),
            });
        }
        self.entries.push(registration);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Arc<Registration>] {
        &self.entries
    }

    pub fn last(&self) -> Option<&Arc<Registration>> {
        self.entries.last()
    }

    /// 最后注册者的实例
    pub fn produce(&self, resolver: &ResolverEngine) -> ContainerResult<Instance> {
        match self.entries.last() {
            Some(registration) => registration.produce(resolver),
            None => Err(ContainerError::NoImplementation {
                contract: self.contract.to_string(),
            }),
        }
    }

    /// 全部实例的惰性序列
    pub fn all(&self, resolver: &ResolverEngine) -> ServiceSequence {
        ServiceSequence::values(self.contract.clone(), self.entries.clone(), resolver.clone())
    }

    /// 逐个闭合内部注册
    pub fn make_closed(&self, arguments: &[ContractType]) -> ContainerResult<MultiRegistration> {
        let contract = match self.contract.generic_definition() {
            Some(definition) if self.contract.is_open_generic() => definition.close(arguments.iter().cloned()),
            _ => {
                return Err(ContainerError::NotConstructible {
                    contract: self.contract.to_string(),
                    arguments: arguments.iter().map(ToString::to_string).collect(),
                    reason: "contract is not an open generic".to_string(),
                })
            }
        };

        let entries = self
            .entries
            .iter()
            .map(|registration| registration.make_closed(arguments).map(Arc::new))
            .collect::<ContainerResult<Vec<_>>>()?;

        Ok(Self { contract, entries })
    }
}

/// 注册表中一个契约对应的条目
#[derive(Debug, Clone)]
pub enum RegistryEntry {
    Single(Arc<Registration>),
    Multiple(Arc<MultiRegistration>),
}

impl RegistryEntry {
    pub fn produce(&self, resolver: &ResolverEngine) -> ContainerResult<Instance> {
        match self {
            RegistryEntry::Single(registration) => registration.produce(resolver),
            RegistryEntry::Multiple(multi) => multi.produce(resolver),
        }
    }

    /// 按插入顺序的全部注册
    pub fn registrations(&self) -> Vec<Arc<Registration>> {
        match self {
            RegistryEntry::Single(registration) => vec![registration.clone()],
            RegistryEntry::Multiple(multi) => multi.entries().to_vec(),
        }
    }

    pub fn allows_multiple(&self) -> bool {
        match self {
            RegistryEntry::Single(registration) => registration.allows_multiple(),
            RegistryEntry::Multiple(_) => true,
        }
    }

    pub fn make_closed(&self, arguments: &[ContractType]) -> ContainerResult<RegistryEntry> {
        Ok(match self {
            RegistryEntry::Single(registration) => RegistryEntry::Single(Arc::new(registration.make_closed(arguments)?)),
            RegistryEntry::Multiple(multi) => RegistryEntry::Multiple(Arc::new(multi.make_closed(arguments)?)),
        })
    }
}
