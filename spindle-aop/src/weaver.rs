//! 织入器
//!
//! 编译切点 → 加载 Bean → 创建代理 → 发布代理。
//! 所有代理先全部创建，再统一发布，任何一步失败都不会留下部分织入的状态

use crate::aspect::AspectSet;
use crate::error::{AopError, AopResult};
use crate::pointcut_builder::PointcutBuilder;
use crate::proxy::{AdvisedProxyFactory, ProxyStrategyKind};
use serde::Serialize;
use spindle_core::{Bean, BeanFactory, ContainerError};
use std::sync::Arc;

/// 一次织入的结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WeaveReport {
    /// 已织入的 Bean 及其代理策略（按 Bean 名称排序）
    pub woven: Vec<(String, ProxyStrategyKind)>,

    /// 参与织入的切面（按织入顺序）
    pub aspects: Vec<String>,
}

impl WeaveReport {
    pub fn is_woven(&self, bean: &str) -> bool {
        self.strategy_of(bean).is_some()
    }

    pub fn strategy_of(&self, bean: &str) -> Option<ProxyStrategyKind> {
        self.woven
            .iter()
            .find(|(name, _)| name == bean)
            .map(|(_, strategy)| *strategy)
    }

    pub fn woven_count(&self) -> usize {
        self.woven.len()
    }
}

/// 切面织入器
pub struct AspectWeaver<'a> {
    bean_factory: &'a dyn BeanFactory,
    proxy_factory: AdvisedProxyFactory,
    prefer_bytecode_instrumentation: bool,
    debug: bool,
}

impl<'a> AspectWeaver<'a> {
    pub fn new(bean_factory: &'a dyn BeanFactory) -> Self {
        Self {
            bean_factory,
            proxy_factory: AdvisedProxyFactory::new(),
            prefer_bytecode_instrumentation: true,
            debug: false,
        }
    }

    pub fn with_proxy_factory(mut self, proxy_factory: AdvisedProxyFactory) -> Self {
        self.proxy_factory = proxy_factory;
        self
    }

    pub fn with_bytecode_preference(mut self, prefer: bool) -> Self {
        self.prefer_bytecode_instrumentation = prefer;
        self
    }

    /// 输出编译后的切点
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// 执行织入
    pub fn weave(&self, aspects: &AspectSet) -> AopResult<WeaveReport> {
        tracing::debug!("Weaving {} aspect(s): {:?}", aspects.len(), aspects.names());

        let pointcuts = PointcutBuilder::new(self.bean_factory).build(aspects)?;

        if self.debug {
            for pointcut in &pointcuts {
                tracing::info!("Pointcut: {}", pointcut);
            }
        }

        // 先创建全部代理
        let mut staged = Vec::with_capacity(pointcuts.len());
        for pointcut in &pointcuts {
            let bean = pointcut.bean_name.as_str();

            let definition = self
                .bean_factory
                .get_bean_definition(bean)
                .map_err(|source| AopError::UnresolvedBean {
                    bean: bean.to_string(),
                    source,
                })?;

            if definition.is_proxied() {
                return Err(AopError::Publication {
                    bean: bean.to_string(),
                    source: ContainerError::ProxyAlreadyPublished(bean.to_string()),
                });
            }

            let target = self
                .bean_factory
                .load_bean(bean)
                .map_err(|source| AopError::UnresolvedBean {
                    bean: bean.to_string(),
                    source,
                })?;

            let proxy = self
                .proxy_factory
                .create_proxy(target, pointcut, self.prefer_bytecode_instrumentation)?;

            staged.push((definition, proxy));
        }

        // 再统一发布
        let mut report = WeaveReport {
            woven: Vec::with_capacity(staged.len()),
            aspects: aspects.names(),
        };

        for (definition, proxy) in staged {
            let strategy = proxy.strategy();
            definition
                .set_bean_proxy(Arc::new(proxy) as Arc<dyn Bean>)
                .map_err(|source| AopError::Publication {
                    bean: definition.name.clone(),
                    source,
                })?;

            tracing::debug!("Published {} proxy for bean '{}'", strategy, definition.name);
            report.woven.push((definition.name.clone(), strategy));
        }

        tracing::info!(
            "Weaving complete: {} bean(s) proxied by {} aspect(s)",
            report.woven_count(),
            report.aspects.len()
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::AdviceHandler;
    use crate::aspect::{AdviceDefinition, AspectDefinition};
    use crate::pointcut::PointcutExpression;
    use crate::proxy::test_support::Probe;
    use serde_json::json;
    use spindle_core::{BeanDefinition, ContainerResult, DefaultListableBeanFactory, MethodDescriptor, TypeDescriptor};
    use std::collections::HashMap;

    fn factory() -> DefaultListableBeanFactory {
        let factory = DefaultListableBeanFactory::new();
        factory.register_instance("list", Arc::new(Probe::list())).unwrap();
        factory.register_instance("object", Arc::new(Probe::object())).unwrap();
        factory
    }

    /// 指定名称的 Bean 无法实例化
    struct FailingBeanFactory {
        inner: DefaultListableBeanFactory,
        broken: &'static str,
    }

    impl BeanFactory for FailingBeanFactory {
        fn load_bean(&self, name: &str) -> ContainerResult<Arc<dyn Bean>> {
            if name == self.broken {
                return Err(ContainerError::BeanCreationFailed(format!("{} cannot be instantiated", name)));
            }
            self.inner.load_bean(name)
        }

        fn contains_bean(&self, name: &str) -> bool {
            self.inner.contains_bean(name)
        }

        fn bean_names(&self) -> Vec<String> {
            self.inner.bean_names()
        }

        fn get_bean_definitions(&self) -> HashMap<String, Arc<BeanDefinition>> {
            self.inner.get_bean_definitions()
        }

        fn get_bean_definition(&self, name: &str) -> ContainerResult<Arc<BeanDefinition>> {
            self.inner.get_bean_definition(name)
        }
    }

    fn tagging_aspect(pointcut: PointcutExpression) -> AspectDefinition {
        AspectDefinition::new("Tagging").with_advice(AdviceDefinition::bound(
            "tag",
            pointcut,
            AdviceHandler::around(|pjp| {
                let value = pjp.proceed()?;
                Ok(json!(format!("[{}]", value.as_str().unwrap_or_default())))
            }),
        ))
    }

    #[test]
    fn test_weave_publishes_proxies() {
        let factory = factory();
        let aspects = AspectSet::new().with(tagging_aspect(PointcutExpression::within(["Object"])));

        let report = AspectWeaver::new(&factory).weave(&aspects).unwrap();
        assert_eq!(report.woven, vec![("object".to_string(), ProxyStrategyKind::Subclass)]);
        assert_eq!(report.aspects, vec!["tagging"]);

        let object = factory.load_bean("object").unwrap();
        assert_eq!(object.invoke("greet", &[json!("Ann")]).unwrap(), json!("[Hello, Ann]"));
        assert!(!factory.get_bean_definition("list").unwrap().is_proxied());
    }

    #[test]
    fn test_bytecode_preference_off_uses_interface_where_possible() {
        let factory = factory();
        let aspects = AspectSet::new().with(tagging_aspect(PointcutExpression::any()));

        let report = AspectWeaver::new(&factory)
            .with_bytecode_preference(false)
            .weave(&aspects)
            .unwrap();
        assert_eq!(report.strategy_of("list"), Some(ProxyStrategyKind::Interface));
        assert_eq!(report.strategy_of("object"), Some(ProxyStrategyKind::Subclass));
    }

    #[test]
    fn test_proxy_failure_leaves_every_bean_untouched() {
        let factory = factory();
        factory
            .register_instance(
                "token",
                Arc::new(Probe::new(
                    TypeDescriptor::sealed("Token").with_method(MethodDescriptor::new("size", 0)),
                )),
            )
            .unwrap();
        let aspects = AspectSet::new().with(tagging_aspect(PointcutExpression::any()));

        let error = AspectWeaver::new(&factory).weave(&aspects).unwrap_err();
        assert!(matches!(error, AopError::ProxyCreation { ref bean, .. } if bean == "token"));
        for name in ["list", "object", "token"] {
            assert!(!factory.get_bean_definition(name).unwrap().is_proxied());
        }
    }

    #[test]
    fn test_unloadable_bean_leaves_every_bean_untouched() {
        let inner = factory();
        inner.register_instance("zeta", Arc::new(Probe::object())).unwrap();
        let factory = FailingBeanFactory { inner, broken: "zeta" };
        let aspects = AspectSet::new().with(tagging_aspect(PointcutExpression::within(["Object", "ArrayList"])));

        let error = AspectWeaver::new(&factory).weave(&aspects).unwrap_err();
        match error {
            AopError::UnresolvedBean { ref bean, ref source } => {
                assert_eq!(bean, "zeta");
                assert!(matches!(source, ContainerError::BeanCreationFailed(_)));
            }
            other => panic!("expected unresolved bean, got {:?}", other),
        }
        for name in ["list", "object", "zeta"] {
            assert!(!factory.get_bean_definition(name).unwrap().is_proxied());
        }
        assert_eq!(
            factory.inner.load_bean("object").unwrap().invoke("greet", &[json!("Ann")]).unwrap(),
            json!("Hello, Ann")
        );
    }

    #[test]
    fn test_already_proxied_bean_is_rejected() {
        let factory = factory();
        let aspects = AspectSet::new().with(tagging_aspect(PointcutExpression::within(["Object"])));

        AspectWeaver::new(&factory).weave(&aspects).unwrap();
        let error = AspectWeaver::new(&factory).weave(&aspects).unwrap_err();
        assert!(matches!(error, AopError::Publication { .. }));
    }

    #[test]
    fn test_compile_error_publishes_nothing() {
        let factory = factory();
        let aspects = AspectSet::new()
            .with(tagging_aspect(PointcutExpression::any()))
            .with(AspectDefinition::new("Broken").before(PointcutExpression::any(), "missing"));

        let error = AspectWeaver::new(&factory).weave(&aspects).unwrap_err();
        assert!(matches!(error, AopError::Compilation { .. }));
        assert!(!factory.get_bean_definition("object").unwrap().is_proxied());
    }
}
