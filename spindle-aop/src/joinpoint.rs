//! 连接点（JoinPoint）定义
//!
//! 连接点是一次被拦截调用的只读快照，每次调用新建，调用结束后丢弃

use crate::advice::CompiledAdvice;
use serde::de::DeserializeOwned;
use spindle_core::{
    decode_arg, Bean, InvocationError, InvocationResult, MethodDescriptor, MethodSignature,
    TypeDescriptor, Value,
};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Instant;

/// 连接点信息
#[derive(Clone)]
pub struct JoinPoint {
    /// 目标 Bean 名称
    pub bean_name: String,

    /// 原始目标对象
    pub target: Arc<dyn Bean>,

    /// 目标类型
    pub target_type: Arc<TypeDescriptor>,

    /// 被调用的方法
    pub method: MethodSignature,

    /// 方法参数
    pub args: Vec<Value>,

    /// 调用时间戳
    pub timestamp: Instant,
}

impl JoinPoint {
    /// 创建新的连接点
    pub fn new(
        bean_name: impl Into<String>,
        target: Arc<dyn Bean>,
        target_type: Arc<TypeDescriptor>,
        method: &str,
        args: Vec<Value>,
    ) -> Self {
        let method = MethodSignature::new(method, args.len());
        Self {
            bean_name: bean_name.into(),
            target,
            target_type,
            method,
            args,
            timestamp: Instant::now(),
        }
    }

    /// 获取完整的方法签名，例如 `Greeter::greet`
    pub fn signature(&self) -> String {
        format!("{}::{}", self.target_type.name, self.method.name)
    }

    pub fn method_name(&self) -> &str {
        &self.method.name
    }

    /// 获取方法描述（包含缓存指令）
    pub fn method_descriptor(&self) -> Option<&MethodDescriptor> {
        self.target_type.find_method(&self.method.name, self.method.arity)
    }

    /// 解码第 `index` 个参数
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T, InvocationError> {
        decode_arg(&self.method.name, &self.args, index)
    }

    /// 直接调用原始目标方法
    pub(crate) fn invoke_target(&self) -> InvocationResult {
        self.target.invoke(&self.method.name, &self.args)
    }
}

impl fmt::Debug for JoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinPoint")
            .field("bean_name", &self.bean_name)
            .field("signature", &self.signature())
            .field("args", &self.args)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

impl fmt::Display for JoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}

/// 环绕通知的执行链
///
/// 持有连接点和尚未执行的环绕通知。`proceed` 消耗自身，因此最多只能调用一次
pub struct ProceedingJoinPoint<'a> {
    join_point: &'a JoinPoint,
    remaining: &'a [CompiledAdvice],
}

impl<'a> ProceedingJoinPoint<'a> {
    pub(crate) fn new(join_point: &'a JoinPoint, remaining: &'a [CompiledAdvice]) -> Self {
        Self {
            join_point,
            remaining,
        }
    }

    /// 继续执行：运行下一层环绕通知，没有剩余通知时调用原始方法
    pub fn proceed(self) -> InvocationResult {
        match self.remaining.split_first() {
            Some((next, rest)) => {
                tracing::trace!("→ around {} for {}", next.qualified_name(), self.join_point);
                next.run_around(ProceedingJoinPoint::new(self.join_point, rest))
            }
            None => {
                tracing::trace!("→ invoking target {}", self.join_point);
                self.join_point.invoke_target()
            }
        }
    }

    /// 获取连接点信息
    pub fn join_point(&self) -> &JoinPoint {
        self.join_point
    }
}

impl Deref for ProceedingJoinPoint<'_> {
    type Target = JoinPoint;

    fn deref(&self) -> &JoinPoint {
        self.join_point
    }
}

impl fmt::Debug for ProceedingJoinPoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProceedingJoinPoint")
            .field("join_point", &self.join_point)
            .field("remaining_layers", &self.remaining.len())
            .finish()
    }
}
