//! 构造函数选择
//!
//! 按参数数量从多到少尝试，第一个参数全部可满足的构造函数胜出；
//! 同样参数数量的两个候选都可满足时视为歧义。
//!
//! 选择结果按实现类型缓存一次。缓存基于首次使用时注册表的内容，
//! 之后新增的注册不会让已缓存的选择重新评估。

use std::collections::BTreeSet;
use std::sync::Arc;

use super::implementation::{Constructor, ImplementationType, Parameter};
use crate::errors::{ContainerError, ContainerResult};

/// 构造函数选择器
pub struct ConstructorSelector;

impl ConstructorSelector {
    /// 选择构造函数，不使用缓存
    pub fn select<F>(implementation: &ImplementationType, is_resolvable: F) -> ContainerResult<Arc<Constructor>>
    where
        F: Fn(&Parameter) -> bool,
    {
        let mut candidates: Vec<&Arc<Constructor>> = implementation.constructors().iter().collect();
        // 稳定排序，同参数数量保持声明顺序
        candidates.sort_by(|a, b| b.arity().cmp(&a.arity()));

        let mut unresolved = BTreeSet::new();
        let mut selected: Option<&Arc<Constructor>> = None;

        for candidate in candidates {
            if let Some(chosen) = selected {
                if candidate.arity() < chosen.arity() {
                    break;
                }
            }

            let missing: Vec<&Parameter> = candidate
                .parameters()
                .iter()
                .filter(|parameter| !is_resolvable(parameter))
                .collect();

            if !missing.is_empty() {
                unresolved.extend(missing.iter().map(|parameter| parameter.contract().to_string()));
                continue;
            }

            match selected {
                None => selected = Some(candidate),
                Some(chosen) => {
                    return Err(ContainerError::AmbiguousConstructor {
                        implementation: implementation.name().to_string(),
                        first: chosen.signature(),
                        second: candidate.signature(),
                    });
                }
            }
        }

        selected.cloned().ok_or_else(|| ContainerError::MissingConstructor {
            implementation: implementation.name().to_string(),
            unresolved: unresolved.into_iter().collect(),
        })
    }

    /// 选择构造函数，结果缓存在实现类型上；失败不缓存
    pub fn select_cached<F>(
        implementation: &ImplementationType,
        is_resolvable: F,
    ) -> ContainerResult<Arc<Constructor>>
    where
        F: Fn(&Parameter) -> bool,
    {
        if let Some(constructor) = implementation.selected.read().clone() {
            return Ok(constructor);
        }

        let constructor = Self::select(implementation, is_resolvable)?;
        let mut slot = implementation.selected.write();
        // 并发首选时保留先写入的结果
        let chosen = slot.get_or_insert(constructor).clone();
        tracing::debug!(
            implementation = implementation.name(),
            signature = ?chosen.signature(),
            "Constructor selected"
        );
        Ok(chosen)
    }
}
