use super::{AdvisedProxy, ProxyStrategy, ProxyStrategyKind};
use crate::error::{AopError, AopResult};
use crate::pointcut::Pointcut;
use spindle_core::{Bean, TypeDescriptor, TypeKind};
use std::sync::Arc;

/// 子类代理策略
///
/// 生成目标类型的派生类型，覆盖全部方法。分派表由 `#[advisable]` 在编译期生成，
/// 所以这里只需要包装目标并继承其能力面。密封类型不能派生。
#[derive(Debug, Clone, Copy)]
pub struct SubclassProxyStrategy {
    supported: bool,
}

impl SubclassProxyStrategy {
    pub fn new() -> Self {
        Self { supported: true }
    }

    /// 关闭派生类型生成（例如运行环境不支持时）
    pub fn unsupported() -> Self {
        Self { supported: false }
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    fn proxy_descriptor(target_type: &TypeDescriptor) -> TypeDescriptor {
        let mut descriptor = TypeDescriptor::concrete(format!("{}$$Advised", target_type.name))
            .in_module(target_type.module.clone())
            .with_superclass(target_type.qualified_name());
        descriptor.interfaces = target_type.interfaces.clone();
        descriptor.methods = target_type.methods.clone();
        descriptor
    }
}

impl Default for SubclassProxyStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyStrategy for SubclassProxyStrategy {
    fn kind(&self) -> ProxyStrategyKind {
        ProxyStrategyKind::Subclass
    }

    fn is_applicable(&self, target_type: &TypeDescriptor) -> bool {
        self.supported && target_type.kind != TypeKind::Sealed
    }

    fn create(&self, target: Arc<dyn Bean>, pointcut: &Pointcut) -> AopResult<AdvisedProxy> {
        let target_type = target.type_descriptor();
        if !self.is_applicable(&target_type) {
            let reason = if self.supported {
                "sealed types cannot be subclassed"
            } else {
                "subclass generation is not supported"
            };
            return Err(AopError::ProxyCreation {
                bean: pointcut.bean_name.clone(),
                type_name: target_type.qualified_name(),
                reason: reason.to_string(),
            });
        }

        let descriptor = Self::proxy_descriptor(&target_type);

        tracing::trace!(
            "Creating subclass proxy {} for bean '{}'",
            descriptor.name,
            pointcut.bean_name
        );

        Ok(AdvisedProxy::new(
            ProxyStrategyKind::Subclass,
            target,
            pointcut,
            descriptor,
            None,
        ))
    }
}
