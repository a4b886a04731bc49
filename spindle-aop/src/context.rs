//! AOP 上下文
//!
//! 持有容器、方法缓存与配置，保证织入只执行一次

use crate::aspect::{get_all_aspect_registrations, AspectDefinition, AspectSet};
use crate::cache::{CacheAspect, MethodCache};
use crate::error::{AopError, AopResult};
use crate::proxy::AdvisedProxyFactory;
use crate::weaver::{AspectWeaver, WeaveReport};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use spindle_core::{Bean, BeanFactory, ContainerResult, Environment};
use std::sync::Arc;

/// AOP 配置（`spindle.aop.*`）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AopProperties {
    /// 优先使用子类代理
    pub prefer_bytecode_instrumentation: bool,

    /// 运行环境是否支持子类代理
    pub subclass_proxies: bool,

    /// 自动收集通过 inventory 注册的切面
    pub component_scan: bool,

    /// 输出编译后的切点
    pub debug: bool,
}

impl Default for AopProperties {
    fn default() -> Self {
        Self {
            prefer_bytecode_instrumentation: true,
            subclass_proxies: true,
            component_scan: false,
            debug: false,
        }
    }
}

impl AopProperties {
    pub const PREFIX: &'static str = "spindle.aop";

    /// 从配置环境读取，缺省的键使用默认值
    pub fn from_environment(environment: &Environment) -> Self {
        let defaults = Self::default();
        let key = |name: &str| format!("{}.{}", Self::PREFIX, name);

        Self {
            prefer_bytecode_instrumentation: environment.get_bool_or(
                &key("prefer-bytecode-instrumentation"),
                defaults.prefer_bytecode_instrumentation,
            ),
            subclass_proxies: environment.get_bool_or(&key("subclass-proxies"), defaults.subclass_proxies),
            component_scan: environment.get_bool_or(&key("component-scan"), defaults.component_scan),
            debug: environment.get_bool_or(&key("debug"), defaults.debug),
        }
    }
}

/// AOP 上下文
///
/// 方法缓存随上下文创建、随上下文释放。缓存切面参与每一次织入，不受配置影响
pub struct AopContext {
    bean_factory: Arc<dyn BeanFactory>,
    method_cache: Arc<MethodCache>,
    properties: AopProperties,
    aspects: RwLock<AspectSet>,
    report: OnceCell<WeaveReport>,
}

impl AopContext {
    pub fn new(bean_factory: Arc<dyn BeanFactory>) -> Self {
        Self {
            bean_factory,
            method_cache: Arc::new(MethodCache::new()),
            properties: AopProperties::default(),
            aspects: RwLock::new(AspectSet::new()),
            report: OnceCell::new(),
        }
    }

    /// 使用配置环境中的 `spindle.aop.*` 创建上下文
    pub fn from_environment(bean_factory: Arc<dyn BeanFactory>, environment: &Environment) -> Self {
        Self::new(bean_factory).with_properties(AopProperties::from_environment(environment))
    }

    pub fn with_properties(mut self, properties: AopProperties) -> Self {
        self.properties = properties;
        self
    }

    /// 注册切面，在下一次（也是唯一一次）织入时生效
    pub fn register_aspect(&self, aspect: AspectDefinition) -> bool {
        if self.is_woven() {
            tracing::warn!(
                "Aspect '{}' registered after weaving, it will not be applied",
                aspect.name
            );
        }
        self.aspects.write().insert(aspect)
    }

    pub fn bean_factory(&self) -> &Arc<dyn BeanFactory> {
        &self.bean_factory
    }

    pub fn method_cache(&self) -> &Arc<MethodCache> {
        &self.method_cache
    }

    pub fn properties(&self) -> &AopProperties {
        &self.properties
    }

    pub fn is_woven(&self) -> bool {
        self.report.get().is_some()
    }

    /// 第一次成功织入的结果
    pub fn report(&self) -> Option<&WeaveReport> {
        self.report.get()
    }

    /// 通过容器加载 Bean（织入后返回代理）
    pub fn load_bean(&self, name: &str) -> ContainerResult<Arc<dyn Bean>> {
        self.bean_factory.load_bean(name)
    }

    /// 使用已注册的切面织入
    pub fn post_process(&self) -> AopResult<&WeaveReport> {
        self.weave(AspectSet::new())
    }

    /// 织入切面
    ///
    /// 只会执行一次：重复或并发的调用返回第一次成功织入的结果，不做任何其他事情。
    /// 织入失败时不会发布任何代理，之后可以再次尝试
    pub fn weave(&self, aspects: AspectSet) -> AopResult<&WeaveReport> {
        if let Some(report) = self.report.get() {
            tracing::debug!("Aspects already woven, skipping");
            return Ok(report);
        }

        self.report.get_or_try_init(|| self.weave_once(aspects))
    }

    fn weave_once(&self, aspects: AspectSet) -> AopResult<WeaveReport> {
        let aspects = self.collect_aspects(aspects)?;

        AspectWeaver::new(self.bean_factory.as_ref())
            .with_proxy_factory(
                AdvisedProxyFactory::new().with_subclass_support(self.properties.subclass_proxies),
            )
            .with_bytecode_preference(self.properties.prefer_bytecode_instrumentation)
            .with_debug(self.properties.debug)
            .weave(&aspects)
    }

    /// 合并切面：已注册的 → 调用参数 → 扫描到的 → 缓存切面
    ///
    /// `cacheAspect` 保留给内置缓存切面，同名的用户切面是编译错误
    fn collect_aspects(&self, aspects: AspectSet) -> AopResult<AspectSet> {
        let mut all: AspectSet = self.aspects.read().iter().cloned().collect();
        all.extend(aspects.iter().cloned());

        if self.properties.component_scan {
            for registration in get_all_aspect_registrations() {
                if all.insert(registration.create_definition()) {
                    tracing::debug!("Discovered aspect '{}' by component scan", registration.name);
                }
            }
        }

        if let Some(aspect) = all.get(CacheAspect::NAME) {
            return Err(AopError::compilation(
                CacheAspect::NAME,
                format!(
                    "aspect name is reserved for the built-in cache aspect (declared by '{}')",
                    aspect.aspect_type
                ),
            ));
        }

        all.insert(CacheAspect::definition(Arc::clone(&self.method_cache)));
        Ok(all)
    }
}
