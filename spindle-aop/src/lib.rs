//! Spindle AOP - 切面织入引擎
//!
//! 为容器中的 Bean 织入切面，支持：
//! - 声明式切面定义（Before、After、Around）
//! - within / beans / execution 切点表达式，织入期一次性编译
//! - 接口代理与子类代理两种拦截策略
//! - 内置的方法缓存切面
//! - 通过 inventory 在编译期注册切面，由组件扫描收集

pub mod advice;
pub mod aspect;
pub mod cache;
pub mod context;
pub mod error;
pub mod invocation;
pub mod joinpoint;
pub mod pointcut;
pub mod pointcut_builder;
pub mod proxy;
pub mod weaver;

// 重新导出核心类型
pub use advice::{AdviceHandler, AdviceLocation, AfterAdvice, AroundAdvice, BeforeAdvice, CompiledAdvice};
pub use aspect::{
    derive_aspect_name, get_all_aspect_registrations, AdviceDefinition, Aspect, AspectDefinition,
    AspectRegistration, AspectSet, HandlerRef, LoggingAspect, PerformanceAspect,
};
pub use cache::{CacheAspect, CacheStats, Fingerprint, MethodCache};
pub use context::{AopContext, AopProperties};
pub use error::{AopError, AopResult};
pub use invocation::AdviceChain;
pub use joinpoint::{JoinPoint, ProceedingJoinPoint};
pub use pointcut::{BeanPattern, BoundAdvice, Pointcut, PointcutExpression, ScopePattern};
pub use pointcut_builder::PointcutBuilder;
pub use proxy::{
    AdvisedProxy, AdvisedProxyFactory, InterfaceProxyStrategy, ProxyStrategy, ProxyStrategyKind,
    SubclassProxyStrategy,
};
pub use weaver::{AspectWeaver, WeaveReport};

// 导出依赖供宏使用
pub use inventory;
pub use spindle_core;

/// 预导入模块
pub mod prelude {
    pub use crate::advice::{AdviceHandler, AdviceLocation};
    pub use crate::aspect::{AdviceDefinition, Aspect, AspectDefinition, AspectSet, LoggingAspect, PerformanceAspect};
    pub use crate::cache::{CacheAspect, MethodCache};
    pub use crate::context::{AopContext, AopProperties};
    pub use crate::error::{AopError, AopResult};
    pub use crate::joinpoint::{JoinPoint, ProceedingJoinPoint};
    pub use crate::pointcut::PointcutExpression;
    pub use crate::proxy::{AdvisedProxyFactory, ProxyStrategyKind};
    pub use crate::weaver::WeaveReport;
    pub use crate::register_aspect;
    pub use spindle_core::prelude::*;
}

/// 在编译期注册切面，开启组件扫描后由 `AopContext` 自动收集
///
/// 使用示例：
/// ```ignore
/// use spindle_aop::prelude::*;
///
/// fn audit_aspect() -> AspectDefinition {
///     AuditAspect.definition()
/// }
///
/// register_aspect!("auditAspect", audit_aspect);
/// ```
#[macro_export]
macro_rules! register_aspect {
    ($name:expr, $definition:expr) => {
        $crate::inventory::submit! {
            $crate::AspectRegistration::new($name, $definition)
        }
    };
}
