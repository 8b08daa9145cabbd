//! 服务注册表
//!
//! 契约到注册条目的并发映射，外加按需物化的闭合泛型缓存和服务源列表。
//! 查找顺序：精确匹配、闭合泛型（由开放泛型注册物化并缓存）、服务源。

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::contract::ContractType;
use super::metadata::{projector_for, MetadataProjector, MetadataView};
use super::multi::{MultiRegistration, RegistryEntry};
use super::registration::Registration;
use super::source::{default_sources, ServiceSource};
use super::stats::{ContainerStats, StatsRecorder};
use crate::config::ContainerConfig;
use crate::errors::{ContainerError, ContainerResult};
use crate::logging::OperationTimer;

/// 查找结果
#[derive(Clone)]
pub enum Lookup {
    /// 直接注册或物化后的闭合泛型
    Entry(RegistryEntry),
    /// 由服务源合成
    Source(Arc<dyn ServiceSource>),
}

/// 服务注册表
pub struct ServiceRegistry {
    entries: DashMap<ContractType, RegistryEntry>,
    /// 闭合泛型缓存，只在整体拆除时清除
    closed: DashMap<ContractType, RegistryEntry>,
    sources: RwLock<Vec<Arc<dyn ServiceSource>>>,
    projectors: DashMap<ContractType, MetadataProjector>,
    /// 被覆盖的注册，拆除时一并释放
    retired: Mutex<Vec<Arc<Registration>>>,
    /// 写入表的操作持读锁，拆除持写锁
    teardown: RwLock<()>,
    allow_overrides: bool,
    trace_resolutions: bool,
    stats: StatsRecorder,
    disposed: AtomicBool,
}

impl ServiceRegistry {
    pub fn new(config: &ContainerConfig) -> Self {
        let sources = if config.default_sources {
            default_sources()
        } else {
            Vec::new()
        };

        Self {
            entries: DashMap::new(),
            closed: DashMap::new(),
            sources: RwLock::new(sources),
            projectors: DashMap::new(),
            retired: Mutex::new(Vec::new()),
            teardown: RwLock::new(()),
            allow_overrides: config.allow_overrides,
            trace_resolutions: config.trace_resolutions,
            stats: StatsRecorder::default(),
            disposed: AtomicBool::new(false),
        }
    }

    /// 注册
    ///
    /// - 新契约直接存入
    /// - 双方都允许多实现时追加到多实现注册（写时复制）
    /// - 只有一方允许多实现时返回 `MultiplicityConflict`
    /// - 双方都是单实现时，只有启用覆盖且新注册标记为覆盖才替换
    ///
    /// 已物化的闭合形式不受之后开放泛型注册的影响。
    pub fn register(&self, registration: Registration) -> ContainerResult<()> {
        let _live = self.live_guard()?;
        let registration = Arc::new(registration);
        let contract = registration.contract().clone();

        match self.entries.entry(contract.clone()) {
            Entry::Vacant(vacant) => {
                let entry = if registration.allows_multiple() {
                    let mut multi = MultiRegistration::new(contract.clone());
                    multi.add(registration.clone())?;
                    RegistryEntry::Multiple(Arc::new(multi))
                } else {
                    RegistryEntry::Single(registration.clone())
                };
                vacant.insert(entry);
            }
            Entry::Occupied(mut occupied) => {
                let replacement = match occupied.get() {
                    RegistryEntry::Multiple(multi) => {
                        if !registration.allows_multiple() {
                            return Err(conflict(&contract, true, false));
                        }
                        let mut next = MultiRegistration::clone(multi);
                        next.add(registration.clone())?;
                        RegistryEntry::Multiple(Arc::new(next))
                    }
                    RegistryEntry::Single(existing) => {
                        if registration.allows_multiple() {
                            return Err(conflict(&contract, false, true));
                        }
                        if !(self.allow_overrides && registration.is_override()) {
                            return Err(conflict(&contract, false, false));
                        }
                        tracing::warn!(contract = %contract, "Overriding existing registration");
                        self.retired.lock().push(existing.clone());
                        RegistryEntry::Single(registration.clone())
                    }
                };
                occupied.insert(replacement);
            }
        }

        tracing::debug!(
            contract = %contract,
            lifetime = ?registration.lifetime(),
            allow_multiple = registration.allows_multiple(),
            "Registered service"
        );
        Ok(())
    }

    /// 前置声明多实现契约；已存在的多实现声明保持不变
    pub fn declare_multiple(&self, contract: ContractType) -> ContainerResult<()> {
        let _live = self.live_guard()?;
        match self.entries.entry(contract.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(RegistryEntry::Multiple(Arc::new(MultiRegistration::new(contract.clone()))));
                tracing::debug!(contract = %contract, "Declared multi-implementation contract");
                Ok(())
            }
            Entry::Occupied(occupied) => match occupied.get() {
                RegistryEntry::Multiple(_) => Ok(()),
                RegistryEntry::Single(_) => Err(conflict(&contract, false, true)),
            },
        }
    }

    pub fn register_source(&self, source: Arc<dyn ServiceSource>) -> ContainerResult<()> {
        let _live = self.live_guard()?;
        tracing::debug!(source = source.name(), "Registered service source");
        self.sources.write().push(source);
        Ok(())
    }

    /// 为元数据视图类型登记投影函数
    pub fn register_projector(&self, view: ContractType, projector: MetadataProjector) -> ContainerResult<()> {
        let _live = self.live_guard()?;
        self.projectors.insert(view, projector);
        Ok(())
    }

    pub fn register_metadata_view<M: MetadataView>(&self) -> ContainerResult<()> {
        self.register_projector(ContractType::of::<M>(), projector_for::<M>())
    }

    pub fn projector(&self, view: &ContractType) -> Option<MetadataProjector> {
        self.projectors.get(view).map(|projector| projector.value().clone())
    }

    /// 查找契约
    pub fn lookup(&self, contract: &ContractType) -> ContainerResult<Option<Lookup>> {
        self.ensure_live()?;

        if let Some(entry) = self.entries.get(contract) {
            return Ok(Some(Lookup::Entry(entry.value().clone())));
        }
        if let Some(entry) = self.closed_entry(contract)? {
            return Ok(Some(Lookup::Entry(entry)));
        }
        Ok(self.source_for(contract).map(Lookup::Source))
    }

    /// 契约下按注册顺序的全部注册；没有注册时为空
    pub fn registrations_for(&self, contract: &ContractType) -> ContainerResult<Vec<Arc<Registration>>> {
        self.ensure_live()?;

        if let Some(entry) = self.entries.get(contract) {
            return Ok(entry.value().registrations());
        }
        Ok(self
            .closed_entry(contract)?
            .map(|entry| entry.registrations())
            .unwrap_or_default())
    }

    /// 参数是否可以满足，供构造函数选择使用
    pub fn can_resolve(&self, contract: &ContractType) -> bool {
        if self.is_disposed() {
            return false;
        }
        if self.has_entry(contract) {
            return true;
        }
        self.source_for(contract).is_some()
    }

    /// 是否有直接注册（含可由开放泛型闭合得到的契约）
    pub fn is_registered(&self, contract: &ContractType) -> bool {
        !self.is_disposed() && self.has_entry(contract)
    }

    /// 已注册的契约，按名称排序
    pub fn contracts(&self) -> Vec<ContractType> {
        let mut contracts: Vec<ContractType> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        contracts.sort_by_key(|contract| contract.to_string());
        contracts
    }

    pub fn trace_resolutions(&self) -> bool {
        self.trace_resolutions
    }

    pub(crate) fn stats_recorder(&self) -> &StatsRecorder {
        &self.stats
    }

    pub fn stats(&self) -> ContainerStats {
        self.stats.snapshot(self.entries.len(), self.sources.read().len())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// 拆除：先释放所有拥有的单例，再清空全部表；重复调用无效果
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let timer = OperationTimer::new("container_teardown")
            .with_metadata("contracts", &self.entries.len().to_string());

        // 等待进行中的注册完成；之后的注册都会看到 disposed
        let owned: Vec<Arc<Registration>> = {
            let _teardown = self.teardown.write();
            let mut owned: Vec<Arc<Registration>> = self
                .entries
                .iter()
                .chain(self.closed.iter())
                .flat_map(|entry| entry.value().registrations())
                .collect();
            owned.append(&mut self.retired.lock());
            owned
        };

        for registration in &owned {
            registration.dispose();
        }

        {
            let _teardown = self.teardown.write();
            self.entries.clear();
            self.closed.clear();
            self.projectors.clear();
            self.sources.write().clear();
        }

        tracing::debug!(registrations = owned.len(), "Service registry disposed");
        timer.finish();
    }

    fn ensure_live(&self) -> ContainerResult<()> {
        if self.is_disposed() {
            Err(ContainerError::RegistryDisposed)
        } else {
            Ok(())
        }
    }

    /// 读锁期间拆除无法开始
    fn live_guard(&self) -> ContainerResult<RwLockReadGuard<'_, ()>> {
        let guard = self.teardown.read();
        self.ensure_live()?;
        Ok(guard)
    }

    fn has_entry(&self, contract: &ContractType) -> bool {
        if let Some(entry) = self.entries.get(contract) {
            return entry_has_registrations(entry.value());
        }
        contract
            .open_form()
            .and_then(|open| self.entries.get(&open).map(|entry| entry_has_registrations(entry.value())))
            .unwrap_or(false)
    }

    fn source_for(&self, contract: &ContractType) -> Option<Arc<dyn ServiceSource>> {
        self.sources
            .read()
            .iter()
            .find(|source| source.matches(contract))
            .cloned()
    }

    /// 闭合泛型：命中缓存直接返回，否则由开放泛型注册物化后缓存
    fn closed_entry(&self, contract: &ContractType) -> ContainerResult<Option<RegistryEntry>> {
        if !contract.is_closed_generic() {
            return Ok(None);
        }
        if let Some(entry) = self.closed.get(contract) {
            return Ok(Some(entry.value().clone()));
        }

        let open_entry = match contract.open_form().and_then(|open| self.entries.get(&open).map(|entry| entry.value().clone())) {
            Some(entry) => entry,
            None => return Ok(None),
        };

        let _live = self.live_guard()?;
        match self.closed.entry(contract.clone()) {
            Entry::Occupied(occupied) => Ok(Some(occupied.get().clone())),
            Entry::Vacant(vacant) => {
                let closed = open_entry.make_closed(contract.generic_arguments())?;
                self.stats.record_materialization();
                tracing::debug!(contract = %contract, "Materialized closed generic registration");
                vacant.insert(closed.clone());
                Ok(Some(closed))
            }
        }
    }
}

impl Drop for ServiceRegistry {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn entry_has_registrations(entry: &RegistryEntry) -> bool {
    match entry {
        RegistryEntry::Single(_) => true,
        RegistryEntry::Multiple(multi) => !multi.is_empty(),
    }
}

fn conflict(contract: &ContractType, existing_allows_multiple: bool, incoming_allows_multiple: bool) -> ContainerError {
    ContainerError::MultiplicityConflict {
        contract: contract.to_string(),
        existing_allows_multiple,
        incoming_allows_multiple,
    }
}
