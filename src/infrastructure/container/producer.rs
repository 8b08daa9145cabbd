//! 惰性生产者
//!
//! 负责单例缓存与循环依赖检测：
//! - 每个线程维护一个正在生产的生产者栈，重入即判定为循环依赖
//! - 单例使用生产者级别的双重检查锁，首个成功的生产结果胜出
//! - 跨线程（例如异步交接）形成的环不在检测范围内

use parking_lot::{Mutex, RwLock};
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use super::contract::ContractType;
use super::registration::ServiceLifetime;
use super::resolver::ResolverEngine;
use super::Instance;
use crate::errors::{ContainerError, ContainerResult};

/// 生产闭包
pub type ProduceFn = Arc<dyn Fn(&ResolverEngine) -> ContainerResult<Instance> + Send + Sync>;

static NEXT_PRODUCER_ID: AtomicU64 = AtomicU64::new(1);

struct InFlight {
    producer: u64,
    contract: String,
}

thread_local! {
    static IN_FLIGHT: RefCell<Vec<InFlight>> = const { RefCell::new(Vec::new()) };
}

/// 在线程本地栈上登记一次生产，析构时出栈
struct ProductionGuard {
    producer: u64,
}

impl ProductionGuard {
    fn enter(producer: u64, contract: &ContractType) -> ContainerResult<Self> {
        IN_FLIGHT.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(start) = stack.iter().position(|entry| entry.producer == producer) {
                let mut chain: Vec<String> = stack[start..]
                    .iter()
                    .map(|entry| entry.contract.clone())
                    .collect();
                chain.push(contract.to_string());
                return Err(ContainerError::CircularDependency { chain });
            }
            stack.push(InFlight {
                producer,
                contract: contract.to_string(),
            });
            Ok(Self { producer })
        })
    }
}

impl Drop for ProductionGuard {
    fn drop(&mut self) {
        // 线程退出时 TLS 可能已销毁，忽略即可
        let _ = IN_FLIGHT.try_with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(position) = stack.iter().rposition(|entry| entry.producer == self.producer) {
                stack.remove(position);
            }
        });
    }
}

/// 生产期间计数，生产闭包 panic 时同样归还
struct InFlightCount<'a>(&'a AtomicUsize);

impl<'a> InFlightCount<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for InFlightCount<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// 生产者状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerState {
    Idle,
    Producing,
    Done,
}

/// 一次生产的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Production {
    Cached,
    Created,
}

/// 惰性、可检测循环的记忆化生产者
pub struct LazyProducer {
    id: u64,
    contract: ContractType,
    lifetime: ServiceLifetime,
    produce: ProduceFn,
    value: RwLock<Option<Instance>>,
    production: Mutex<()>,
    in_flight: AtomicUsize,
}

impl LazyProducer {
    pub fn new(contract: ContractType, lifetime: ServiceLifetime, produce: ProduceFn) -> Self {
        Self {
            id: NEXT_PRODUCER_ID.fetch_add(1, Ordering::Relaxed),
            contract,
            lifetime,
            produce,
            value: RwLock::new(None),
            production: Mutex::new(()),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// 已持有现成实例的单例生产者
    pub fn ready(contract: ContractType, instance: Instance) -> Self {
        let failing_contract = contract.clone();
        let producer = Self::new(
            contract,
            ServiceLifetime::Singleton,
            Arc::new(move |_: &ResolverEngine| {
                Err(ContainerError::creation_failed(
                    &failing_contract,
                    "the existing instance has been released",
                ))
            }),
        );
        *producer.value.write() = Some(instance);
        producer
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn contract(&self) -> &ContractType {
        &self.contract
    }

    pub fn lifetime(&self) -> ServiceLifetime {
        self.lifetime
    }

    pub fn state(&self) -> ProducerState {
        if self.value.read().is_some() {
            ProducerState::Done
        } else if self.in_flight.load(Ordering::Acquire) > 0 {
            ProducerState::Producing
        } else {
            ProducerState::Idle
        }
    }

    /// 获取实例
    pub fn get(&self, resolver: &ResolverEngine) -> ContainerResult<Instance> {
        self.get_tracked(resolver).map(|(instance, _)| instance)
    }

    pub(crate) fn get_tracked(&self, resolver: &ResolverEngine) -> ContainerResult<(Instance, Production)> {
        if self.lifetime == ServiceLifetime::Singleton {
            if let Some(instance) = self.cached() {
                return Ok((instance, Production::Cached));
            }
        }

        let _guard = ProductionGuard::enter(self.id, &self.contract)?;

        match self.lifetime {
            ServiceLifetime::Transient => self.run(resolver).map(|instance| (instance, Production::Created)),
            ServiceLifetime::Singleton => {
                let _lock = self.production.lock();
                if let Some(instance) = self.cached() {
                    return Ok((instance, Production::Cached));
                }
                let instance = self.run(resolver)?;
                *self.value.write() = Some(instance.clone());
                Ok((instance, Production::Created))
            }
        }
    }

    /// 释放缓存的实例，返回给调用方处理
    pub fn release(&self) -> Option<Instance> {
        let _lock = self.production.lock();
        self.value.write().take()
    }

    fn cached(&self) -> Option<Instance> {
        self.value.read().clone()
    }

    fn run(&self, resolver: &ResolverEngine) -> ContainerResult<Instance> {
        let _producing = InFlightCount::enter(&self.in_flight);
        (self.produce)(resolver)
    }
}

impl fmt::Debug for LazyProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyProducer")
            .field("id", &self.id)
            .field("contract", &self.contract)
            .field("lifetime", &self.lifetime)
            .field("state", &self.state())
            .finish()
    }
}
