//! 通知（Advice）定义
//!
//! 通知处理器在编译切点时绑定，运行期不再按名称查找

use crate::{JoinPoint, ProceedingJoinPoint};
use serde::{Deserialize, Serialize};
use spindle_core::{InvocationError, InvocationResult};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// 通知位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdviceLocation {
    /// 前置通知，不能阻止调用
    Before,
    /// 后置通知（无论成功还是失败都执行）
    After,
    /// 环绕通知（可以控制方法执行）
    Around,
}

impl AdviceLocation {
    /// 执行阶段：Before → Around → After
    pub fn phase(&self) -> u8 {
        match self {
            AdviceLocation::Before => 0,
            AdviceLocation::Around => 1,
            AdviceLocation::After => 2,
        }
    }
}

impl FromStr for AdviceLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "before" => Ok(AdviceLocation::Before),
            "after" => Ok(AdviceLocation::After),
            "around" => Ok(AdviceLocation::Around),
            _ => Err(format!("Invalid advice location: {}", s)),
        }
    }
}

impl fmt::Display for AdviceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdviceLocation::Before => "before",
            AdviceLocation::After => "after",
            AdviceLocation::Around => "around",
        };
        f.write_str(name)
    }
}

/// 前置通知 Trait
///
/// 在目标方法执行前调用，返回错误会中止调用（After 通知仍会执行）
pub trait BeforeAdvice: Send + Sync {
    fn before(&self, join_point: &JoinPoint) -> Result<(), InvocationError>;
}

/// 后置通知 Trait
///
/// 在调用结束后执行，`outcome` 是最终结果（成功或失败），只观察不修改
pub trait AfterAdvice: Send + Sync {
    fn after(&self, join_point: &JoinPoint, outcome: &InvocationResult) -> Result<(), InvocationError>;
}

/// 环绕通知 Trait
///
/// 通过 `ProceedingJoinPoint::proceed` 继续执行；不调用即短路后续所有层和目标方法
pub trait AroundAdvice: Send + Sync {
    fn around(&self, pjp: ProceedingJoinPoint<'_>) -> InvocationResult;
}

impl<F> BeforeAdvice for F
where
    F: Fn(&JoinPoint) -> Result<(), InvocationError> + Send + Sync,
{
    fn before(&self, join_point: &JoinPoint) -> Result<(), InvocationError> {
        self(join_point)
    }
}

impl<F> AfterAdvice for F
where
    F: Fn(&JoinPoint, &InvocationResult) -> Result<(), InvocationError> + Send + Sync,
{
    fn after(&self, join_point: &JoinPoint, outcome: &InvocationResult) -> Result<(), InvocationError> {
        self(join_point, outcome)
    }
}

impl<F> AroundAdvice for F
where
    F: Fn(ProceedingJoinPoint<'_>) -> InvocationResult + Send + Sync,
{
    fn around(&self, pjp: ProceedingJoinPoint<'_>) -> InvocationResult {
        self(pjp)
    }
}

/// 通知处理器
#[derive(Clone)]
pub enum AdviceHandler {
    Before(Arc<dyn BeforeAdvice>),
    After(Arc<dyn AfterAdvice>),
    Around(Arc<dyn AroundAdvice>),
}

impl AdviceHandler {
    pub fn before<F>(handler: F) -> Self
    where
        F: Fn(&JoinPoint) -> Result<(), InvocationError> + Send + Sync + 'static,
    {
        AdviceHandler::Before(Arc::new(handler))
    }

    pub fn after<F>(handler: F) -> Self
    where
        F: Fn(&JoinPoint, &InvocationResult) -> Result<(), InvocationError> + Send + Sync + 'static,
    {
        AdviceHandler::After(Arc::new(handler))
    }

    pub fn around<F>(handler: F) -> Self
    where
        F: Fn(ProceedingJoinPoint<'_>) -> InvocationResult + Send + Sync + 'static,
    {
        AdviceHandler::Around(Arc::new(handler))
    }

    pub fn location(&self) -> AdviceLocation {
        match self {
            AdviceHandler::Before(_) => AdviceLocation::Before,
            AdviceHandler::After(_) => AdviceLocation::After,
            AdviceHandler::Around(_) => AdviceLocation::Around,
        }
    }
}

impl fmt::Debug for AdviceHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AdviceHandler({})", self.location())
    }
}

/// 编译后的通知：所属切面、处理器名称与已解析的处理器
#[derive(Debug, Clone)]
pub struct CompiledAdvice {
    pub aspect: String,
    pub name: String,
    pub handler: AdviceHandler,
}

impl CompiledAdvice {
    pub fn new(aspect: impl Into<String>, name: impl Into<String>, handler: AdviceHandler) -> Self {
        Self {
            aspect: aspect.into(),
            name: name.into(),
            handler,
        }
    }

    pub fn location(&self) -> AdviceLocation {
        self.handler.location()
    }

    /// `aspect.name` 形式的标识，用于日志
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.aspect, self.name)
    }

    pub(crate) fn run_before(&self, join_point: &JoinPoint) -> Result<(), InvocationError> {
        match &self.handler {
            AdviceHandler::Before(advice) => advice.before(join_point),
            _ => Ok(()),
        }
    }

    pub(crate) fn run_around(&self, pjp: ProceedingJoinPoint<'_>) -> InvocationResult {
        match &self.handler {
            AdviceHandler::Around(advice) => advice.around(pjp),
            _ => pjp.proceed(),
        }
    }

    pub(crate) fn run_after(&self, join_point: &JoinPoint, outcome: &InvocationResult) -> Result<(), InvocationError> {
        match &self.handler {
            AdviceHandler::After(advice) => advice.after(join_point, outcome),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_from_str() {
        assert_eq!("Before".parse::<AdviceLocation>().unwrap(), AdviceLocation::Before);
        assert_eq!("around".parse::<AdviceLocation>().unwrap(), AdviceLocation::Around);
        assert!("afterReturning".parse::<AdviceLocation>().is_err());
    }

    #[test]
    fn test_phase_order() {
        let mut locations = vec![AdviceLocation::After, AdviceLocation::Around, AdviceLocation::Before];
        locations.sort_by_key(|l| l.phase());
        assert_eq!(
            locations,
            vec![AdviceLocation::Before, AdviceLocation::Around, AdviceLocation::After]
        );
    }

    #[test]
    fn test_handler_location() {
        assert_eq!(AdviceHandler::before(|_| Ok(())).location(), AdviceLocation::Before);
        assert_eq!(AdviceHandler::after(|_, _| Ok(())).location(), AdviceLocation::After);
        assert_eq!(
            AdviceHandler::around(|pjp| pjp.proceed()).location(),
            AdviceLocation::Around
        );
    }
}
