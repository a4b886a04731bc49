//! 方法缓存与缓存切面
//!
//! `MethodCache` 属于 `AopContext`，与上下文同生命周期。没有过期策略，只能显式清除

use crate::advice::AdviceHandler;
use crate::aspect::{Aspect, AspectDefinition};
use crate::pointcut::PointcutExpression;
use crate::JoinPoint;
use dashmap::DashMap;
use serde::Serialize;
use spindle_core::{MethodSignature, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 缓存键：Bean、方法与参数的规范 JSON 形式
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub bean: String,
    pub method: MethodSignature,
    pub args: String,
}

impl Fingerprint {
    pub fn new(bean: impl Into<String>, method: MethodSignature, args: &[Value]) -> Self {
        Self {
            bean: bean.into(),
            method,
            args: Value::Array(args.to_vec()).to_string(),
        }
    }

    pub fn of(join_point: &JoinPoint) -> Self {
        Self::new(
            join_point.bean_name.as_str(),
            join_point.method.clone(),
            &join_point.args,
        )
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.bean, self.method, self.args)
    }
}

/// 缓存统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub regions: usize,
    pub entries: usize,
}

/// 方法缓存：区域 → (指纹 → 结果)
///
/// 支持并发读、写与清除。清除和并发读之间的竞争可能读到旧值，这是允许的
#[derive(Debug, Default)]
pub struct MethodCache {
    regions: DashMap<String, DashMap<Fingerprint, Value>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MethodCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取缓存，同时记录命中/未命中
    pub fn get(&self, region: &str, key: &Fingerprint) -> Option<Value> {
        let value = self
            .regions
            .get(region)
            .and_then(|entries| entries.get(key).map(|v| v.value().clone()));

        match value {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        value
    }

    pub fn put(&self, region: &str, key: Fingerprint, value: Value) {
        self.regions
            .entry(region.to_string())
            .or_default()
            .insert(key, value);
    }

    /// 清空一个区域，返回被清除的条目数
    pub fn evict_region(&self, region: &str) -> usize {
        self.regions
            .remove(region)
            .map(|(_, entries)| entries.len())
            .unwrap_or(0)
    }

    pub fn clear(&self) {
        self.regions.clear();
    }

    pub fn region_len(&self, region: &str) -> usize {
        self.regions.get(region).map(|entries| entries.len()).unwrap_or(0)
    }

    /// 所有区域的条目总数
    pub fn len(&self) -> usize {
        self.regions.iter().map(|entries| entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            regions: self.regions.len(),
            entries: self.len(),
        }
    }
}

/// 缓存切面
///
/// 通知：`cache`（Around，记忆化带 `cacheable` 指令的方法）、
/// `evictCache`（Before，按 `cache_evict` 指令清空区域）。
/// 两者的切点都是 `within("*")`，没有指令的方法直接放行
#[derive(Debug, Clone)]
pub struct CacheAspect {
    cache: Arc<MethodCache>,
}

impl CacheAspect {
    pub const NAME: &'static str = "cacheAspect";

    pub fn new(cache: Arc<MethodCache>) -> Self {
        Self { cache }
    }

    /// 织入时自动加入的切面定义
    pub fn definition(cache: Arc<MethodCache>) -> AspectDefinition {
        AspectDefinition::of(Self::new(cache))
            .named(Self::NAME)
            .around(PointcutExpression::any(), "cache")
            .before(PointcutExpression::any(), "evictCache")
    }
}

/// 可缓存方法所属的区域，未命名时为 `bean.method`
fn cache_region(join_point: &JoinPoint) -> Option<String> {
    let method = join_point.method_descriptor()?;
    let region = method.cacheable.as_ref()?;

    if region.is_empty() {
        Some(format!("{}.{}", join_point.bean_name, method.name()))
    } else {
        Some(region.clone())
    }
}

impl Aspect for CacheAspect {
    fn advice(&self, name: &str) -> Option<AdviceHandler> {
        let cache = Arc::clone(&self.cache);

        match name {
            "cache" => Some(AdviceHandler::around(move |pjp| {
                let region = match cache_region(&pjp) {
                    Some(region) => region,
                    None => return pjp.proceed(),
                };

                let key = Fingerprint::of(&pjp);
                if let Some(value) = cache.get(&region, &key) {
                    tracing::trace!("Cache hit in '{}' for {}", region, key);
                    return Ok(value);
                }

                tracing::trace!("Cache miss in '{}' for {}", region, key);
                let value = pjp.proceed()?;
                cache.put(&region, key, value.clone());
                Ok(value)
            })),
            "evictCache" => Some(AdviceHandler::before(move |join_point| {
                if let Some(method) = join_point.method_descriptor() {
                    for region in &method.cache_evict {
                        let evicted = cache.evict_region(region);
                        tracing::debug!(
                            "Evicted {} entr(ies) from cache region '{}' before {}",
                            evicted,
                            region,
                            join_point
                        );
                    }
                }
                Ok(())
            })),
            _ => None,
        }
    }
}
