use super::{
    AdvisedProxy, InterfaceProxyStrategy, ProxyStrategy, ProxyStrategyKind, SubclassProxyStrategy,
};
use crate::error::{AopError, AopResult};
use crate::pointcut::Pointcut;
use spindle_core::{Bean, TypeDescriptor};
use std::sync::Arc;

/// 代理工厂
///
/// 策略选择规则：
/// 1. 偏好字节码插桩且子类策略可用 → 子类代理
/// 2. 否则目标声明了接口 → 接口代理
/// 3. 否则子类策略可用 → 子类代理（偏好只是提示）
/// 4. 都不可用 → `AopError::ProxyCreation`
#[derive(Debug, Clone, Copy, Default)]
pub struct AdvisedProxyFactory {
    interface: InterfaceProxyStrategy,
    subclass: SubclassProxyStrategy,
}

impl AdvisedProxyFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置运行环境是否支持子类代理
    pub fn with_subclass_support(mut self, supported: bool) -> Self {
        self.subclass = if supported {
            SubclassProxyStrategy::new()
        } else {
            SubclassProxyStrategy::unsupported()
        };
        self
    }

    /// 为类型选择拦截策略
    pub fn select_strategy(
        &self,
        target_type: &TypeDescriptor,
        prefer_bytecode_instrumentation: bool,
    ) -> Option<&dyn ProxyStrategy> {
        let subclass_ok = self.subclass.is_applicable(target_type);

        if prefer_bytecode_instrumentation && subclass_ok {
            Some(&self.subclass)
        } else if self.interface.is_applicable(target_type) {
            Some(&self.interface)
        } else if subclass_ok {
            Some(&self.subclass)
        } else {
            None
        }
    }

    /// 为目标实例创建代理，策略按实例的实际类型决定
    pub fn create_proxy(
        &self,
        target: Arc<dyn Bean>,
        pointcut: &Pointcut,
        prefer_bytecode_instrumentation: bool,
    ) -> AopResult<AdvisedProxy> {
        let target_type = target.type_descriptor();

        let strategy = self
            .select_strategy(&target_type, prefer_bytecode_instrumentation)
            .ok_or_else(|| AopError::ProxyCreation {
                bean: pointcut.bean_name.clone(),
                type_name: target_type.qualified_name(),
                reason: self.rejection_reason(&target_type),
            })?;

        tracing::debug!(
            "Selected {} proxy for bean '{}' of type '{}' (prefer bytecode: {})",
            strategy.kind(),
            pointcut.bean_name,
            target_type.qualified_name(),
            prefer_bytecode_instrumentation
        );

        strategy.create(target, pointcut)
    }

    /// 使用默认偏好（子类代理优先）创建代理
    pub fn create_proxy_default(&self, target: Arc<dyn Bean>, pointcut: &Pointcut) -> AopResult<AdvisedProxy> {
        self.create_proxy(target, pointcut, true)
    }

    /// 预判会选择的策略种类
    pub fn strategy_for(
        &self,
        target_type: &TypeDescriptor,
        prefer_bytecode_instrumentation: bool,
    ) -> Option<ProxyStrategyKind> {
        self.select_strategy(target_type, prefer_bytecode_instrumentation)
            .map(|s| s.kind())
    }

    fn rejection_reason(&self, target_type: &TypeDescriptor) -> String {
        if self.subclass.is_supported() {
            "type is sealed and declares no interfaces".to_string()
        } else {
            format!(
                "type '{}' declares no interfaces and subclass generation is not supported",
                target_type.name
            )
        }
    }
}
