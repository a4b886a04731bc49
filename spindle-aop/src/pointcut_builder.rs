//! 切点编译器
//!
//! 把切面定义展开为绑定到具体 Bean 和方法的切点

use crate::advice::CompiledAdvice;
use crate::aspect::{AdviceDefinition, AspectDefinition, AspectSet, HandlerRef};
use crate::error::{AopError, AopResult};
use crate::pointcut::Pointcut;
use spindle_core::{BeanDefinition, BeanFactory, MethodSignature, TypeDescriptor};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// 切点编译器
///
/// 以容器中的 Bean 定义作为注册表，任何解析失败都会中止整个编译
pub struct PointcutBuilder<'a> {
    bean_factory: &'a dyn BeanFactory,
}

impl<'a> PointcutBuilder<'a> {
    pub fn new(bean_factory: &'a dyn BeanFactory) -> Self {
        Self { bean_factory }
    }

    /// 编译切面集合
    ///
    /// 每个 Bean 最多产生一个切点（按 Bean 名称排序），通知保持全局声明顺序
    pub fn build(&self, aspects: &AspectSet) -> AopResult<Vec<Pointcut>> {
        let definitions = self.bean_factory.get_bean_definitions();
        let mut bean_names: Vec<&String> = definitions.keys().collect();
        bean_names.sort();

        let mut pointcuts: BTreeMap<String, Pointcut> = BTreeMap::new();

        for aspect in aspects {
            if aspect.advice.is_empty() {
                return Err(AopError::compilation(&aspect.name, "aspect declares no advice"));
            }

            for advice in &aspect.advice {
                let compiled = resolve_handler(aspect, advice)?;
                check_referenced_beans(aspect, advice, &definitions)?;

                for name in &bean_names {
                    let definition = &definitions[name.as_str()];
                    let methods = matched_methods(name, &definition.bean_type, advice);
                    if methods.is_empty() {
                        continue;
                    }

                    tracing::trace!(
                        "Advice {} matched {} method(s) of bean '{}'",
                        compiled.qualified_name(),
                        methods.len(),
                        name
                    );

                    pointcuts
                        .entry(name.to_string())
                        .or_insert_with(|| Pointcut::new(name.as_str(), definition.bean_type.clone()))
                        .bind(compiled.clone(), methods);
                }
            }
        }

        tracing::debug!(
            "Compiled {} aspect(s) into {} pointcut(s)",
            aspects.len(),
            pointcuts.len()
        );

        Ok(pointcuts.into_values().collect())
    }
}

/// 解析通知处理器，并确认处理器与声明的位置一致
fn resolve_handler(aspect: &AspectDefinition, advice: &AdviceDefinition) -> AopResult<CompiledAdvice> {
    let handler = match &advice.handler {
        HandlerRef::Bound { handler, .. } => handler.clone(),
        HandlerRef::Named(name) => {
            let instance = aspect.instance.as_ref().ok_or_else(|| {
                AopError::advice_compilation(
                    &aspect.name,
                    name,
                    format!("aspect type '{}' has no instance to resolve handlers on", aspect.aspect_type),
                )
            })?;

            instance.advice(name).ok_or_else(|| {
                AopError::advice_compilation(
                    &aspect.name,
                    name,
                    format!("no advice handler named '{}' on '{}'", name, aspect.aspect_type),
                )
            })?
        }
    };

    if handler.location() != advice.location {
        return Err(AopError::advice_compilation(
            &aspect.name,
            advice.handler_name(),
            format!(
                "declared as {} advice but handler is {} advice",
                advice.location,
                handler.location()
            ),
        ));
    }

    Ok(CompiledAdvice::new(&aspect.name, advice.handler_name(), handler))
}

fn check_referenced_beans(
    aspect: &AspectDefinition,
    advice: &AdviceDefinition,
    definitions: &HashMap<String, Arc<BeanDefinition>>,
) -> AopResult<()> {
    match advice
        .pointcut
        .referenced_beans()
        .into_iter()
        .find(|bean| !definitions.contains_key(*bean))
    {
        Some(bean) => Err(AopError::advice_compilation(
            &aspect.name,
            advice.handler_name(),
            format!("unknown bean '{}' in pointcut {}", bean, advice.pointcut),
        )),
        None => Ok(()),
    }
}

/// 类型声明的全部方法（包括只在接口中声明的方法）
pub(crate) fn method_universe(target_type: &TypeDescriptor) -> Vec<MethodSignature> {
    let mut methods: Vec<MethodSignature> =
        target_type.methods.iter().map(|m| m.signature.clone()).collect();
    for signature in target_type.interface_methods() {
        if !methods.contains(&signature) {
            methods.push(signature);
        }
    }
    methods
}

fn matched_methods(
    bean_name: &str,
    target_type: &TypeDescriptor,
    advice: &AdviceDefinition,
) -> BTreeSet<MethodSignature> {
    method_universe(target_type)
        .into_iter()
        .filter(|method| advice.pointcut.matches(bean_name, target_type, method))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::{AdviceHandler, AdviceLocation};
    use crate::aspect::{Aspect, LoggingAspect};
    use crate::pointcut::PointcutExpression;
    use spindle_core::{
        Bean, DefaultListableBeanFactory, InterfaceDescriptor, InvocationError, InvocationResult,
        MethodDescriptor, Value,
    };
    use std::any::Any;

    struct Stub(TypeDescriptor);

    impl Bean for Stub {
        fn type_descriptor(&self) -> TypeDescriptor {
            self.0.clone()
        }

        fn invoke(&self, method: &str, args: &[Value]) -> InvocationResult {
            Err(InvocationError::no_such_method(&self.0.name, method, args.len()))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn registry() -> DefaultListableBeanFactory {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_instance(
                "repo",
                Arc::new(Stub(
                    TypeDescriptor::concrete("UserRepository")
                        .with_method(MethodDescriptor::new("find_by_id", 1))
                        .with_method(MethodDescriptor::new("save", 1)),
                )),
            )
            .unwrap();
        factory
            .register_instance(
                "greeter",
                Arc::new(Stub(
                    TypeDescriptor::interface("Greeter")
                        .with_interface(InterfaceDescriptor::new("Greeter").with_method("greet", 1)),
                )),
            )
            .unwrap();
        factory
    }

    struct Audit;

    impl Aspect for Audit {
        fn advice(&self, name: &str) -> Option<AdviceHandler> {
            match name {
                "audit" => Some(AdviceHandler::before(|_| Ok(()))),
                "wrap" => Some(AdviceHandler::around(|pjp| pjp.proceed())),
                _ => None,
            }
        }
    }

    #[test]
    fn test_within_any_matches_every_bean() {
        let factory = registry();
        let aspects = AspectSet::new().with(LoggingAspect::new().definition(PointcutExpression::any()));

        let pointcuts = PointcutBuilder::new(&factory).build(&aspects).unwrap();
        let names: Vec<_> = pointcuts.iter().map(|p| p.bean_name.as_str()).collect();
        assert_eq!(names, vec!["greeter", "repo"]);

        // 只在接口中声明的方法也会被匹配
        assert!(pointcuts[0].matches(&MethodSignature::new("greet", 1)));
        assert_eq!(pointcuts[1].matched_methods().len(), 2);
    }

    #[test]
    fn test_advice_merged_in_declaration_order() {
        let factory = registry();
        let aspects = AspectSet::new()
            .with(
                AspectDefinition::of(Audit)
                    .around(PointcutExpression::within(["UserRepository"]), "wrap")
                    .before(PointcutExpression::beans(["repo.save"]), "audit"),
            )
            .with(LoggingAspect::new().definition(PointcutExpression::within(["*Repository"])));

        let pointcuts = PointcutBuilder::new(&factory).build(&aspects).unwrap();
        assert_eq!(pointcuts.len(), 1);

        let order: Vec<String> = pointcuts[0]
            .advice
            .iter()
            .map(|b| b.advice.qualified_name())
            .collect();
        assert_eq!(
            order,
            vec!["audit.wrap", "audit.audit", "loggingAspect.logEntry", "loggingAspect.logExit"]
        );

        let save_chain = pointcuts[0].chain_for(&MethodSignature::new("save", 1));
        assert_eq!(save_chain.len(), 4);
        let find_chain = pointcuts[0].chain_for(&MethodSignature::new("find_by_id", 1));
        assert_eq!(find_chain.len(), 3);
    }

    #[test]
    fn test_unknown_handler_aborts() {
        let factory = registry();
        let aspects = AspectSet::new()
            .with(AspectDefinition::of(Audit).before(PointcutExpression::any(), "missing"));

        let error = PointcutBuilder::new(&factory).build(&aspects).unwrap_err();
        assert!(matches!(
            error,
            AopError::Compilation { ref aspect, advice: Some(ref advice), .. }
                if aspect == "audit" && advice == "missing"
        ));
    }

    #[test]
    fn test_location_mismatch_aborts() {
        let factory = registry();
        let aspects = AspectSet::new().with(AspectDefinition::of(Audit).after(PointcutExpression::any(), "wrap"));

        let error = PointcutBuilder::new(&factory).build(&aspects).unwrap_err();
        assert!(error.to_string().contains("declared as after advice but handler is around advice"));
    }

    #[test]
    fn test_named_handler_without_instance_aborts() {
        let factory = registry();
        let aspects = AspectSet::new().with(AspectDefinition::new("Detached").before(PointcutExpression::any(), "x"));

        let error = PointcutBuilder::new(&factory).build(&aspects).unwrap_err();
        assert!(matches!(error, AopError::Compilation { .. }));
    }

    #[test]
    fn test_unknown_bean_aborts() {
        let factory = registry();
        let aspects = AspectSet::new()
            .with(AspectDefinition::of(Audit).before(PointcutExpression::beans(["ghost.save"]), "audit"));

        let error = PointcutBuilder::new(&factory).build(&aspects).unwrap_err();
        assert!(error.to_string().contains("unknown bean 'ghost'"));
    }

    #[test]
    fn test_empty_aspect_aborts() {
        let factory = registry();
        let aspects = AspectSet::new().with(AspectDefinition::of(Audit));

        let error = PointcutBuilder::new(&factory).build(&aspects).unwrap_err();
        assert!(matches!(error, AopError::Compilation { advice: None, .. }));
    }

    #[test]
    fn test_bound_handler_needs_no_instance() {
        let factory = registry();
        let aspects = AspectSet::new().with(AspectDefinition::new("Inline").with_advice(
            crate::aspect::AdviceDefinition::bound(
                "check",
                PointcutExpression::beans(["greeter"]),
                AdviceHandler::before(|_| Ok(())),
            ),
        ));

        let pointcuts = PointcutBuilder::new(&factory).build(&aspects).unwrap();
        assert_eq!(pointcuts.len(), 1);
        assert_eq!(pointcuts[0].advice[0].advice.location(), AdviceLocation::Before);
    }

    #[test]
    fn test_unmatched_beans_get_no_pointcut() {
        let factory = registry();
        let aspects = AspectSet::new()
            .with(AspectDefinition::of(Audit).before(PointcutExpression::within(["Order*"]), "audit"));

        let pointcuts = PointcutBuilder::new(&factory).build(&aspects).unwrap();
        assert!(pointcuts.is_empty());
    }
}
