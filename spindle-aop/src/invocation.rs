//! 通知链
//!
//! 一个被拦截方法的完整通知序列，按阶段执行：Before → Around（嵌套）→ After

use crate::advice::{AdviceLocation, CompiledAdvice};
use crate::{JoinPoint, ProceedingJoinPoint};
use spindle_core::{InvocationError, InvocationResult};

/// 通知链
#[derive(Debug, Clone, Default)]
pub struct AdviceChain {
    before: Vec<CompiledAdvice>,
    around: Vec<CompiledAdvice>,
    after: Vec<CompiledAdvice>,
}

impl AdviceChain {
    /// 按位置拆分通知，同一阶段内保持声明顺序
    pub fn new(advice: impl IntoIterator<Item = CompiledAdvice>) -> Self {
        let mut chain = Self::default();
        for item in advice {
            match item.location() {
                AdviceLocation::Before => chain.before.push(item),
                AdviceLocation::Around => chain.around.push(item),
                AdviceLocation::After => chain.after.push(item),
            }
        }
        chain
    }

    pub fn len(&self) -> usize {
        self.before.len() + self.around.len() + self.after.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 按执行顺序列出通知
    pub fn advice(&self) -> impl Iterator<Item = &CompiledAdvice> {
        self.before.iter().chain(self.around.iter()).chain(self.after.iter())
    }

    /// 执行通知链
    ///
    /// - Before 通知失败时跳过剩余 Before 通知和目标方法
    /// - After 通知总会执行，且每一个都会执行
    /// - 调用错误优先，After 通知的错误作为附带错误返回
    pub fn invoke(&self, join_point: &JoinPoint) -> InvocationResult {
        tracing::trace!(
            "Intercepting {} ({} before, {} around, {} after)",
            join_point,
            self.before.len(),
            self.around.len(),
            self.after.len()
        );

        let outcome = self
            .run_before(join_point)
            .and_then(|_| ProceedingJoinPoint::new(join_point, &self.around).proceed());

        let mut after_errors = Vec::new();
        for advice in &self.after {
            if let Err(e) = advice.run_after(join_point, &outcome) {
                tracing::warn!(
                    "After advice {} failed on {}: {}",
                    advice.qualified_name(),
                    join_point,
                    e
                );
                after_errors.push(e);
            }
        }

        merge_outcome(outcome, after_errors)
    }

    fn run_before(&self, join_point: &JoinPoint) -> Result<(), InvocationError> {
        for advice in &self.before {
            tracing::trace!("→ before {} for {}", advice.qualified_name(), join_point);
            advice.run_before(join_point).map_err(|e| {
                tracing::warn!(
                    "Before advice {} failed on {}: {}",
                    advice.qualified_name(),
                    join_point,
                    e
                );
                e
            })?;
        }
        Ok(())
    }
}

fn merge_outcome(outcome: InvocationResult, mut after_errors: Vec<InvocationError>) -> InvocationResult {
    if after_errors.is_empty() {
        return outcome;
    }

    match outcome {
        Err(primary) => Err(primary.with_suppressed(after_errors)),
        Ok(_) => {
            let first = after_errors.remove(0);
            Err(first.with_suppressed(after_errors))
        }
    }
}
