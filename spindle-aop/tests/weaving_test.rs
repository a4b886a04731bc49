//! 织入集成测试：宏生成的 Bean 与切面经过完整的织入流程

use parking_lot::Mutex;
use serde_json::json;
use spindle_aop::prelude::*;
use spindle_aop_macros::{advisable, aspect};
use spindle_core::invoke;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub struct Greeter {
    calls: AtomicUsize,
}

#[advisable(interface = "Greeting")]
impl Greeter {
    pub fn greet(&self, name: &str) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        format!("Hello, {}", name)
    }

    pub fn fail(&self) -> Result<String, String> {
        Err("greeter is broken".to_string())
    }

    #[internal]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
pub struct Recorder {
    trace: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.trace.lock())
    }
}

#[aspect(name = "recorder")]
impl Recorder {
    #[before("within(Greeter)")]
    fn enter(&self, jp: &JoinPoint) -> Result<(), InvocationError> {
        self.trace.lock().push(format!("before {}", jp.method_name()));
        Ok(())
    }

    #[around("beans(greeter.greet)")]
    fn wrap(&self, pjp: ProceedingJoinPoint<'_>) -> InvocationResult {
        self.trace.lock().push("around:in".to_string());
        let result = pjp.proceed();
        self.trace.lock().push("around:out".to_string());
        result
    }

    #[after("execution(* Greeter.*(..))")]
    fn exit(&self, jp: &JoinPoint, outcome: &InvocationResult) -> Result<(), InvocationError> {
        let status = if outcome.is_ok() { "ok" } else { "err" };
        self.trace.lock().push(format!("after {} {}", jp.method_name(), status));
        Ok(())
    }
}

fn context(properties: AopProperties) -> AopContext {
    let factory = DefaultListableBeanFactory::new();
    factory
        .register_singleton("greeter", || Ok(Greeter::default()))
        .unwrap();
    AopContext::new(Arc::new(factory)).with_properties(properties)
}

#[test]
fn test_generated_descriptor() {
    let descriptor = Greeter::descriptor();
    assert_eq!(descriptor.name, "Greeter");
    assert_eq!(descriptor.kind, TypeKind::Concrete);
    assert!(descriptor.module.ends_with("weaving_test"));
    assert_eq!(descriptor.methods.len(), 3);

    let greeting = &descriptor.interfaces[0];
    assert_eq!(greeting.name, "Greeting");
    assert!(greeting.declares(&MethodSignature::new("greet", 1)));
    assert!(greeting.declares(&MethodSignature::new("fail", 0)));
    assert!(!greeting.declares(&MethodSignature::new("calls", 0)));
}

#[test]
fn test_generated_dispatch() {
    let greeter = Arc::new(Greeter::default());
    assert_eq!(invoke!(greeter, "greet", "Ann").unwrap(), json!("Hello, Ann"));
    assert_eq!(
        greeter.invoke("fail", &[]).unwrap_err(),
        InvocationError::failed("greeter is broken")
    );
    assert!(matches!(
        greeter.invoke("greet", &[]),
        Err(InvocationError::NoSuchMethod { .. })
    ));
    assert!(matches!(
        greeter.invoke("greet", &[json!(42)]),
        Err(InvocationError::InvalidArguments { .. })
    ));
}

#[test]
fn test_advice_phase_order() {
    let context = context(AopProperties::default());
    let recorder = Recorder::default();
    context.register_aspect(recorder.clone().aspect_definition());

    let report = context.post_process().unwrap();
    assert_eq!(report.aspects, vec!["recorder", CacheAspect::NAME]);
    assert_eq!(report.strategy_of("greeter"), Some(ProxyStrategyKind::Subclass));

    let greeter = context.load_bean("greeter").unwrap();
    let greeting: String = greeter.call("greet", &[json!("Bob")]).unwrap();
    assert_eq!(greeting, "Hello, Bob");
    assert_eq!(
        recorder.take(),
        vec!["before greet", "around:in", "around:out", "after greet ok"]
    );

    assert!(greeter.invoke("fail", &[]).is_err());
    assert_eq!(recorder.take(), vec!["before fail", "after fail err"]);

    // 子类代理暴露内部方法
    assert_eq!(greeter.call::<usize>("calls", &[]).unwrap(), 1);
    recorder.take();

    // 没有缓存注解的方法不经过缓存
    assert!(context.method_cache().is_empty());
}

#[test]
fn test_interface_proxy_hides_internal_methods() {
    let context = context(AopProperties {
        prefer_bytecode_instrumentation: false,
        ..AopProperties::default()
    });
    context.register_aspect(Recorder::default().aspect_definition());

    let report = context.post_process().unwrap();
    assert_eq!(report.strategy_of("greeter"), Some(ProxyStrategyKind::Interface));

    let greeter = context.load_bean("greeter").unwrap();
    assert_eq!(greeter.type_descriptor().kind, TypeKind::Interface);
    assert!(greeter.invoke("greet", &[json!("Cy")]).is_ok());
    assert!(matches!(
        greeter.invoke("calls", &[]),
        Err(InvocationError::NoSuchMethod { .. })
    ));
}

#[test]
fn test_weaving_twice_does_not_double_wrap() {
    let context = context(AopProperties::default());
    let recorder = Recorder::default();
    let aspects = || AspectSet::new().with(recorder.clone().aspect_definition());

    let first = context.weave(aspects()).unwrap().clone();
    let second = context.weave(aspects()).unwrap().clone();
    assert_eq!(first, second);

    let greeter = context.load_bean("greeter").unwrap();
    greeter.invoke("greet", &[json!("Di")]).unwrap();
    assert_eq!(recorder.take().len(), 4);
}

#[test]
fn test_builtin_aspects_leave_results_untouched() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let context = context(AopProperties::default());
    context.register_aspect(LoggingAspect::new().with_args().definition(PointcutExpression::any()));
    context.register_aspect(PerformanceAspect::new(1_000).definition(PointcutExpression::within(["*"])));
    context.post_process().unwrap();

    let greeter = context.load_bean("greeter").unwrap();
    assert_eq!(invoke!(greeter, "greet", "Eve").unwrap(), json!("Hello, Eve"));
    assert_eq!(
        greeter.invoke("fail", &[]).unwrap_err().primary(),
        &InvocationError::failed("greeter is broken")
    );
}
