//! 切面（Aspect）定义
//!
//! 切面是横切关注点的模块化。切面定义是织入器的输入：名称、实现类型以及有序的通知列表

use crate::advice::{AdviceHandler, AdviceLocation};
use crate::pointcut::PointcutExpression;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// 切面 Trait
///
/// 切面实例按名称提供通知处理器，名称在编译切点时解析一次
pub trait Aspect: Send + Sync {
    fn advice(&self, name: &str) -> Option<AdviceHandler>;
}

/// 通知处理器引用
#[derive(Clone)]
pub enum HandlerRef {
    /// 按名称在切面实例上解析
    Named(String),

    /// 已绑定的处理器
    Bound { name: String, handler: AdviceHandler },
}

impl HandlerRef {
    pub fn name(&self) -> &str {
        match self {
            HandlerRef::Named(name) => name,
            HandlerRef::Bound { name, .. } => name,
        }
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerRef::Named(name) => write!(f, "Named({})", name),
            HandlerRef::Bound { name, handler } => write!(f, "Bound({}, {:?})", name, handler),
        }
    }
}

/// 通知定义
#[derive(Debug, Clone)]
pub struct AdviceDefinition {
    pub location: AdviceLocation,
    pub pointcut: PointcutExpression,
    pub handler: HandlerRef,
}

impl AdviceDefinition {
    pub fn new(location: AdviceLocation, pointcut: PointcutExpression, handler: impl Into<String>) -> Self {
        Self {
            location,
            pointcut,
            handler: HandlerRef::Named(handler.into()),
        }
    }

    pub fn before(pointcut: PointcutExpression, handler: impl Into<String>) -> Self {
        Self::new(AdviceLocation::Before, pointcut, handler)
    }

    pub fn after(pointcut: PointcutExpression, handler: impl Into<String>) -> Self {
        Self::new(AdviceLocation::After, pointcut, handler)
    }

    pub fn around(pointcut: PointcutExpression, handler: impl Into<String>) -> Self {
        Self::new(AdviceLocation::Around, pointcut, handler)
    }

    /// 使用已绑定的处理器，位置由处理器决定
    pub fn bound(name: impl Into<String>, pointcut: PointcutExpression, handler: AdviceHandler) -> Self {
        Self {
            location: handler.location(),
            pointcut,
            handler: HandlerRef::Bound {
                name: name.into(),
                handler,
            },
        }
    }

    pub fn handler_name(&self) -> &str {
        self.handler.name()
    }
}

/// 切面定义
#[derive(Clone)]
pub struct AspectDefinition {
    /// 切面名称（在一次织入中唯一）
    pub name: String,

    /// 实现类型
    pub aspect_type: String,

    /// 切面实例，解析 `HandlerRef::Named` 时需要
    pub instance: Option<Arc<dyn Aspect>>,

    pub advice: Vec<AdviceDefinition>,
}

impl AspectDefinition {
    /// 创建切面定义，名称由类型名推导
    pub fn new(aspect_type: impl Into<String>) -> Self {
        let aspect_type = aspect_type.into();
        Self {
            name: derive_aspect_name(&aspect_type),
            aspect_type,
            instance: None,
            advice: Vec::new(),
        }
    }

    /// 由切面实例创建定义
    pub fn of<A: Aspect + 'static>(instance: A) -> Self {
        Self::new(std::any::type_name::<A>()).with_instance(Arc::new(instance))
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_instance(mut self, instance: Arc<dyn Aspect>) -> Self {
        self.instance = Some(instance);
        self
    }

    pub fn with_advice(mut self, advice: AdviceDefinition) -> Self {
        self.advice.push(advice);
        self
    }

    pub fn before(self, pointcut: PointcutExpression, handler: impl Into<String>) -> Self {
        self.with_advice(AdviceDefinition::before(pointcut, handler))
    }

    pub fn after(self, pointcut: PointcutExpression, handler: impl Into<String>) -> Self {
        self.with_advice(AdviceDefinition::after(pointcut, handler))
    }

    pub fn around(self, pointcut: PointcutExpression, handler: impl Into<String>) -> Self {
        self.with_advice(AdviceDefinition::around(pointcut, handler))
    }
}

impl fmt::Debug for AspectDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AspectDefinition")
            .field("name", &self.name)
            .field("aspect_type", &self.aspect_type)
            .field("has_instance", &self.instance.is_some())
            .field("advice", &self.advice)
            .finish()
    }
}

/// 由类型名推导切面名称：简单类型名首字母小写
///
/// `app::aspects::CacheAspect` → `cacheAspect`
pub fn derive_aspect_name(aspect_type: &str) -> String {
    let without_generics = aspect_type.split('<').next().unwrap_or(aspect_type);
    let simple = without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics);

    let mut chars = simple.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// 切面集合
///
/// 保持插入顺序，以名称作为身份，重复插入同名切面会被忽略
#[derive(Debug, Clone, Default)]
pub struct AspectSet {
    aspects: Vec<AspectDefinition>,
}

impl AspectSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入切面定义，名称已存在时返回 false
    pub fn insert(&mut self, aspect: AspectDefinition) -> bool {
        if self.contains(&aspect.name) {
            tracing::debug!("Aspect '{}' already present, ignoring duplicate", aspect.name);
            return false;
        }
        self.aspects.push(aspect);
        true
    }

    pub fn with(mut self, aspect: AspectDefinition) -> Self {
        self.insert(aspect);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.aspects.iter().any(|a| a.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&AspectDefinition> {
        self.aspects.iter().find(|a| a.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.aspects.iter().map(|a| a.name.clone()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AspectDefinition> {
        self.aspects.iter()
    }

    pub fn len(&self) -> usize {
        self.aspects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aspects.is_empty()
    }
}

impl Extend<AspectDefinition> for AspectSet {
    fn extend<T: IntoIterator<Item = AspectDefinition>>(&mut self, iter: T) {
        for aspect in iter {
            self.insert(aspect);
        }
    }
}

impl FromIterator<AspectDefinition> for AspectSet {
    fn from_iter<T: IntoIterator<Item = AspectDefinition>>(iter: T) -> Self {
        let mut set = AspectSet::new();
        set.extend(iter);
        set
    }
}

impl<'a> IntoIterator for &'a AspectSet {
    type Item = &'a AspectDefinition;
    type IntoIter = std::slice::Iter<'a, AspectDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.aspects.iter()
    }
}

/// 切面注册器
///
/// 用于 inventory 自动收集切面，开启组件扫描时由 `AopContext` 加入织入
pub struct AspectRegistration {
    /// 切面名称
    pub name: &'static str,

    /// 创建切面定义的函数
    pub definition: fn() -> AspectDefinition,
}

impl AspectRegistration {
    /// 创建新的切面注册器
    pub const fn new(name: &'static str, definition: fn() -> AspectDefinition) -> Self {
        Self { name, definition }
    }

    /// 创建切面定义
    pub fn create_definition(&self) -> AspectDefinition {
        (self.definition)()
    }
}

// 使用 inventory 收集所有切面注册器
inventory::collect!(AspectRegistration);

/// 获取所有注册的切面注册器（按名称排序）
pub fn get_all_aspect_registrations() -> Vec<&'static AspectRegistration> {
    let mut registrations: Vec<_> = inventory::iter::<AspectRegistration>().collect();
    registrations.sort_by_key(|r| r.name);
    registrations
}

// ============================================================================
// 预定义的常用切面
// ============================================================================

/// 日志切面 - 记录方法调用
///
/// 通知：`logEntry`（Before）、`logExit`（After）
#[derive(Debug, Clone, Default)]
pub struct LoggingAspect {
    log_args: bool,
    log_result: bool,
}

impl LoggingAspect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_args(mut self) -> Self {
        self.log_args = true;
        self
    }

    pub fn with_result(mut self) -> Self {
        self.log_result = true;
        self
    }

    /// 在 `pointcut` 上声明 `logEntry` 和 `logExit`
    pub fn definition(self, pointcut: PointcutExpression) -> AspectDefinition {
        AspectDefinition::of(self)
            .before(pointcut.clone(), "logEntry")
            .after(pointcut, "logExit")
    }
}

impl Aspect for LoggingAspect {
    fn advice(&self, name: &str) -> Option<AdviceHandler> {
        let log_args = self.log_args;
        let log_result = self.log_result;

        match name {
            "logEntry" => Some(AdviceHandler::before(move |join_point| {
                if log_args {
                    tracing::info!("→ Entering: {} args={:?}", join_point, join_point.args);
                } else {
                    tracing::info!("→ Entering: {}", join_point);
                }
                Ok(())
            })),
            "logExit" => Some(AdviceHandler::after(move |join_point, outcome| {
                let elapsed = join_point.timestamp.elapsed();
                match outcome {
                    Ok(value) if log_result => {
                        tracing::info!("← Exiting: {} = {} (took {:?})", join_point, value, elapsed)
                    }
                    Ok(_) => tracing::info!("← Exiting: {} (took {:?})", join_point, elapsed),
                    Err(e) => tracing::error!("❌ Exception in {}: {}", join_point, e),
                }
                Ok(())
            })),
            _ => None,
        }
    }
}

/// 性能监控切面
///
/// 通知：`monitor`（Around），超过阈值时输出警告
#[derive(Debug, Clone)]
pub struct PerformanceAspect {
    threshold_ms: u128,
}

impl PerformanceAspect {
    pub fn new(threshold_ms: u128) -> Self {
        Self { threshold_ms }
    }

    pub fn definition(self, pointcut: PointcutExpression) -> AspectDefinition {
        AspectDefinition::of(self).around(pointcut, "monitor")
    }
}

impl Aspect for PerformanceAspect {
    fn advice(&self, name: &str) -> Option<AdviceHandler> {
        let threshold_ms = self.threshold_ms;

        match name {
            "monitor" => Some(AdviceHandler::around(move |pjp| {
                let signature = pjp.signature();
                let start = Instant::now();
                let result = pjp.proceed();
                let elapsed = start.elapsed().as_millis();

                if elapsed > threshold_ms {
                    tracing::warn!(
                        "⚠️ Slow method detected: {} took {}ms (threshold: {}ms)",
                        signature,
                        elapsed,
                        threshold_ms
                    );
                } else {
                    tracing::debug!("{} took {}ms", signature, elapsed);
                }
                result
            })),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_aspect_name() {
        assert_eq!(derive_aspect_name("CacheAspect"), "cacheAspect");
        assert_eq!(derive_aspect_name("app::aspects::LoggingAspect"), "loggingAspect");
        assert_eq!(derive_aspect_name("my::Wrapper<u8>"), "wrapper");
        assert_eq!(derive_aspect_name(""), "");
    }

    #[test]
    fn test_definition_of_instance() {
        let definition = LoggingAspect::new().definition(PointcutExpression::any());
        assert_eq!(definition.name, "loggingAspect");
        assert!(definition.instance.is_some());
        assert_eq!(definition.advice.len(), 2);
        assert_eq!(definition.advice[0].location, AdviceLocation::Before);
        assert_eq!(definition.advice[0].handler_name(), "logEntry");
    }

    #[test]
    fn test_aspect_set_collapses_duplicates() {
        let mut set = AspectSet::new();
        assert!(set.insert(AspectDefinition::new("Audit").before(PointcutExpression::any(), "a")));
        assert!(!set.insert(AspectDefinition::new("Audit").after(PointcutExpression::any(), "b")));
        assert!(set.insert(AspectDefinition::new("Other").before(PointcutExpression::any(), "c")));

        assert_eq!(set.len(), 2);
        assert_eq!(set.names(), vec!["audit", "other"]);
        assert_eq!(set.get("audit").unwrap().advice[0].handler_name(), "a");
    }

    #[test]
    fn test_bound_advice_takes_handler_location() {
        let advice = AdviceDefinition::bound(
            "trace",
            PointcutExpression::any(),
            AdviceHandler::around(|pjp| pjp.proceed()),
        );
        assert_eq!(advice.location, AdviceLocation::Around);
        assert_eq!(advice.handler_name(), "trace");
    }

    #[test]
    fn test_builtin_aspects_resolve_handlers() {
        let logging = LoggingAspect::new().with_args();
        assert_eq!(logging.advice("logEntry").unwrap().location(), AdviceLocation::Before);
        assert_eq!(logging.advice("logExit").unwrap().location(), AdviceLocation::After);
        assert!(logging.advice("monitor").is_none());

        let performance = PerformanceAspect::new(100);
        assert_eq!(performance.advice("monitor").unwrap().location(), AdviceLocation::Around);
    }
}
