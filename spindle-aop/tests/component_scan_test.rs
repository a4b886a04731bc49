//! 组件扫描：通过 inventory 注册的切面

use serde_json::json;
use spindle_aop::prelude::*;
use spindle_aop::{get_all_aspect_registrations, AdviceHandler};
use spindle_aop_macros::{advisable, aspect};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static AUDITED: AtomicUsize = AtomicUsize::new(0);
static GUARDED: AtomicUsize = AtomicUsize::new(0);

pub struct OrderService;

#[advisable(kind = "sealed", interface = "Orders")]
impl OrderService {
    pub fn place(&self, item: String, quantity: u32) -> String {
        format!("{} x{}", item, quantity)
    }
}

#[derive(Clone, Default)]
pub struct AuditAspect;

#[aspect(scan)]
impl AuditAspect {
    #[before("within(*Service)")]
    fn audit(&self, _jp: &JoinPoint) -> Result<(), InvocationError> {
        AUDITED.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn guard_aspect() -> AspectDefinition {
    AspectDefinition::new("GuardAspect").with_advice(AdviceDefinition::bound(
        "guard",
        PointcutExpression::beans(["orders.place"]),
        AdviceHandler::before(|jp| {
            GUARDED.fetch_add(1, Ordering::SeqCst);
            if jp.arg::<u32>(1)? == 0 {
                return Err(InvocationError::failed("quantity must be positive"));
            }
            Ok(())
        }),
    ))
}

register_aspect!("guardAspect", guard_aspect);

fn context(component_scan: bool) -> AopContext {
    let factory = DefaultListableBeanFactory::new();
    factory.register_singleton("orders", || Ok(OrderService)).unwrap();
    AopContext::new(Arc::new(factory)).with_properties(AopProperties {
        component_scan,
        ..AopProperties::default()
    })
}

#[test]
fn test_registrations_are_sorted_by_name() {
    let names: Vec<&str> = get_all_aspect_registrations().iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["auditAspect", "guardAspect"]);
}

#[test]
fn test_scanned_aspects_are_woven() {
    let context = context(true);
    let report = context.post_process().unwrap();

    assert_eq!(report.aspects, vec!["auditAspect", "guardAspect", CacheAspect::NAME]);
    // 密封类型只能使用接口代理
    assert_eq!(report.strategy_of("orders"), Some(ProxyStrategyKind::Interface));

    let orders = context.load_bean("orders").unwrap();
    let audited = AUDITED.load(Ordering::SeqCst);
    assert_eq!(
        orders.invoke("place", &[json!("pen"), json!(2)]).unwrap(),
        json!("pen x2")
    );
    assert!(AUDITED.load(Ordering::SeqCst) > audited);

    let error = orders.invoke("place", &[json!("pen"), json!(0)]).unwrap_err();
    assert_eq!(error, InvocationError::failed("quantity must be positive"));
    assert!(GUARDED.load(Ordering::SeqCst) >= 2);
}

#[test]
fn test_scan_disabled_ignores_registrations() {
    let context = context(false);
    let report = context.post_process().unwrap();

    assert_eq!(report.aspects, vec![CacheAspect::NAME]);

    // 只有缓存切面参与，守卫没有生效
    let orders = context.load_bean("orders").unwrap();
    assert_eq!(
        orders.invoke("place", &[json!("pen"), json!(0)]).unwrap(),
        json!("pen x0")
    );
}
