use super::{AdvisedProxy, ProxyStrategy, ProxyStrategyKind};
use crate::error::{AopError, AopResult};
use crate::pointcut::Pointcut;
use spindle_core::{Bean, MethodSignature, TypeDescriptor, TypeKind};
use std::collections::HashSet;
use std::sync::Arc;

/// 接口代理策略
///
/// 代理实现与目标相同的接口集合，只暴露接口方法
#[derive(Debug, Clone, Copy, Default)]
pub struct InterfaceProxyStrategy;

impl InterfaceProxyStrategy {
    pub fn new() -> Self {
        Self
    }

    /// 对外暴露的方法集合
    fn exposed_methods(target_type: &TypeDescriptor) -> HashSet<MethodSignature> {
        if target_type.has_interfaces() {
            target_type.interface_methods().into_iter().collect()
        } else {
            // 纯接口类型本身就是能力面
            target_type.methods.iter().map(|m| m.signature.clone()).collect()
        }
    }

    fn proxy_descriptor(target_type: &TypeDescriptor, exposed: &HashSet<MethodSignature>) -> TypeDescriptor {
        let contracts = if target_type.has_interfaces() {
            target_type
                .interfaces
                .iter()
                .map(|i| i.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            target_type.name.clone()
        };

        let mut descriptor = TypeDescriptor::interface(format!("$Proxy({})", contracts))
            .in_module(target_type.module.clone());
        descriptor.interfaces = target_type.interfaces.clone();
        descriptor.methods = target_type
            .methods
            .iter()
            .filter(|m| exposed.contains(&m.signature))
            .cloned()
            .collect();
        descriptor
    }
}

impl ProxyStrategy for InterfaceProxyStrategy {
    fn kind(&self) -> ProxyStrategyKind {
        ProxyStrategyKind::Interface
    }

    fn is_applicable(&self, target_type: &TypeDescriptor) -> bool {
        target_type.kind == TypeKind::Interface || target_type.has_interfaces()
    }

    fn create(&self, target: Arc<dyn Bean>, pointcut: &Pointcut) -> AopResult<AdvisedProxy> {
        let target_type = target.type_descriptor();
        if !self.is_applicable(&target_type) {
            return Err(AopError::ProxyCreation {
                bean: pointcut.bean_name.clone(),
                type_name: target_type.qualified_name(),
                reason: "type declares no interfaces".to_string(),
            });
        }

        let exposed = Self::exposed_methods(&target_type);
        let descriptor = Self::proxy_descriptor(&target_type, &exposed);

        tracing::trace!(
            "Creating interface proxy {} for bean '{}' ({} exposed method(s))",
            descriptor.name,
            pointcut.bean_name,
            exposed.len()
        );

        Ok(AdvisedProxy::new(
            ProxyStrategyKind::Interface,
            target,
            pointcut,
            descriptor,
            Some(exposed),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::test_support::Probe;
    use serde_json::json;
    use spindle_core::InvocationError;

    #[test]
    fn test_applicability() {
        let strategy = InterfaceProxyStrategy::new();
        assert!(strategy.is_applicable(&Probe::list().descriptor));
        assert!(!strategy.is_applicable(&Probe::object().descriptor));
        assert!(strategy.is_applicable(&TypeDescriptor::interface("Greeter")));
    }

    #[test]
    fn test_hides_non_interface_methods() {
        let target = Arc::new(Probe::list());
        let pointcut = Pointcut::new("list", target.descriptor.clone());
        let proxy = InterfaceProxyStrategy::new().create(target, &pointcut).unwrap();

        assert_eq!(proxy.type_descriptor().name, "$Proxy(List)");
        assert_eq!(proxy.type_descriptor().kind, TypeKind::Interface);
        assert!(proxy.type_descriptor().is_assignable_to("List"));

        assert_eq!(proxy.invoke("size", &[]).unwrap(), json!(1));
        let error = proxy.invoke("greet", &[json!("Ann")]).unwrap_err();
        assert!(matches!(error, InvocationError::NoSuchMethod { .. }));
    }

    #[test]
    fn test_rejects_type_without_interfaces() {
        let target = Arc::new(Probe::object());
        let pointcut = Pointcut::new("object", target.descriptor.clone());
        let error = InterfaceProxyStrategy::new().create(target, &pointcut).unwrap_err();
        assert!(matches!(error, AopError::ProxyCreation { .. }));
    }
}
