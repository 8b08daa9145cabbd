//! 容器统计信息

use std::sync::atomic::{AtomicU64, Ordering};

/// 内部容器统计信息（原子计数器）
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    total_resolutions: AtomicU64,
    singleton_cache_hits: AtomicU64,
    singleton_cache_misses: AtomicU64,
    transient_creations: AtomicU64,
    closed_generic_materializations: AtomicU64,
    source_resolutions: AtomicU64,
}

impl StatsRecorder {
    pub(crate) fn record_resolution(&self) {
        self.total_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_singleton_hit(&self) {
        self.singleton_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_singleton_miss(&self) {
        self.singleton_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transient_creation(&self) {
        self.transient_creations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_materialization(&self) {
        self.closed_generic_materializations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_source_resolution(&self) {
        self.source_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, registered_contracts: usize, registered_sources: usize) -> ContainerStats {
        ContainerStats {
            total_resolutions: self.total_resolutions.load(Ordering::Relaxed),
            singleton_cache_hits: self.singleton_cache_hits.load(Ordering::Relaxed),
            singleton_cache_misses: self.singleton_cache_misses.load(Ordering::Relaxed),
            transient_creations: self.transient_creations.load(Ordering::Relaxed),
            closed_generic_materializations: self.closed_generic_materializations.load(Ordering::Relaxed),
            source_resolutions: self.source_resolutions.load(Ordering::Relaxed),
            registered_contracts,
            registered_sources,
        }
    }
}

/// 容器统计快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerStats {
    /// 总解析次数（含嵌套的参数解析）
    pub total_resolutions: u64,
    /// 单例缓存命中次数
    pub singleton_cache_hits: u64,
    /// 单例缓存未命中次数，即单例实际构造次数
    pub singleton_cache_misses: u64,
    /// 瞬态服务创建次数
    pub transient_creations: u64,
    /// 闭合泛型物化次数
    pub closed_generic_materializations: u64,
    /// 由服务源合成的解析次数
    pub source_resolutions: u64,
    /// 已注册契约数量
    pub registered_contracts: usize,
    /// 已注册服务源数量
    pub registered_sources: usize,
}

impl ContainerStats {
    /// 获取缓存命中率（小数形式）
    pub fn hit_rate(&self) -> f64 {
        let total = self.singleton_cache_hits + self.singleton_cache_misses;
        if total == 0 {
            0.0
        } else {
            self.singleton_cache_hits as f64 / total as f64
        }
    }

    /// 获取性能指标摘要
    pub fn performance_summary(&self) -> String {
        format!(
            "Container Performance: {} total resolutions, {:.1}% cache hit rate, {} registered contracts, {} transient creations",
            self.total_resolutions,
            self.hit_rate() * 100.0,
            self.registered_contracts,
            self.transient_creations
        )
    }
}
