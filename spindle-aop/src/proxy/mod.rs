//! 拦截代理
//!
//! 两种拦截策略：
//! - 接口代理：只暴露目标类型声明的接口方法
//! - 子类代理：派生类型，暴露目标的全部方法
//!
//! 两者都把被匹配的调用交给对应方法的 `AdviceChain`，其余调用直接转发给原始目标

mod factory;
mod interface;
mod subclass;

pub use factory::AdvisedProxyFactory;
pub use interface::InterfaceProxyStrategy;
pub use subclass::SubclassProxyStrategy;

use crate::error::AopResult;
use crate::invocation::AdviceChain;
use crate::pointcut::Pointcut;
use crate::JoinPoint;
use serde::{Deserialize, Serialize};
use spindle_core::{Bean, InvocationError, InvocationResult, MethodSignature, TypeDescriptor, Value};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// 拦截策略种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProxyStrategyKind {
    /// 实现相同接口集合的包装对象
    Interface,
    /// 生成的派生类型
    Subclass,
}

impl fmt::Display for ProxyStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyStrategyKind::Interface => write!(f, "interface"),
            ProxyStrategyKind::Subclass => write!(f, "subclass"),
        }
    }
}

/// 代理策略 Trait
pub trait ProxyStrategy: Send + Sync {
    fn kind(&self) -> ProxyStrategyKind;

    /// 该策略能否拦截此类型
    fn is_applicable(&self, target_type: &TypeDescriptor) -> bool;

    /// 创建代理
    fn create(&self, target: Arc<dyn Bean>, pointcut: &Pointcut) -> AopResult<AdvisedProxy>;
}

/// 拦截代理
///
/// 织入后取代 Bean 的对外句柄，原始实例只能通过代理访问
pub struct AdvisedProxy {
    strategy: ProxyStrategyKind,
    bean_name: String,
    target: Arc<dyn Bean>,
    target_type: Arc<TypeDescriptor>,
    descriptor: TypeDescriptor,

    /// 对外暴露的方法，`None` 表示目标的全部方法
    exposed: Option<HashSet<MethodSignature>>,

    chains: HashMap<MethodSignature, AdviceChain>,
}

impl AdvisedProxy {
    pub(crate) fn new(
        strategy: ProxyStrategyKind,
        target: Arc<dyn Bean>,
        pointcut: &Pointcut,
        descriptor: TypeDescriptor,
        exposed: Option<HashSet<MethodSignature>>,
    ) -> Self {
        let target_type = Arc::new(target.type_descriptor());
        Self {
            strategy,
            bean_name: pointcut.bean_name.clone(),
            target,
            target_type,
            descriptor,
            exposed,
            chains: pointcut.chains(),
        }
    }

    pub fn strategy(&self) -> ProxyStrategyKind {
        self.strategy
    }

    pub fn bean_name(&self) -> &str {
        &self.bean_name
    }

    /// 原始目标对象
    pub fn target(&self) -> &Arc<dyn Bean> {
        &self.target
    }

    pub fn target_type(&self) -> &TypeDescriptor {
        &self.target_type
    }

    /// 方法是否对外暴露
    pub fn exposes(&self, method: &MethodSignature) -> bool {
        self.exposed
            .as_ref()
            .map_or(true, |exposed| exposed.contains(method))
    }

    /// 方法是否带有通知
    pub fn is_intercepted(&self, method: &MethodSignature) -> bool {
        self.exposes(method) && self.chains.contains_key(method)
    }
}

impl Bean for AdvisedProxy {
    fn type_descriptor(&self) -> TypeDescriptor {
        self.descriptor.clone()
    }

    fn invoke(&self, method: &str, args: &[Value]) -> InvocationResult {
        let signature = MethodSignature::new(method, args.len());

        if !self.exposes(&signature) {
            return Err(InvocationError::no_such_method(
                &self.descriptor.name,
                method,
                args.len(),
            ));
        }

        match self.chains.get(&signature) {
            Some(chain) => {
                let join_point = JoinPoint::new(
                    self.bean_name.as_str(),
                    Arc::clone(&self.target),
                    Arc::clone(&self.target_type),
                    method,
                    args.to_vec(),
                );
                chain.invoke(&join_point)
            }
            None => self.target.invoke(method, args),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for AdvisedProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdvisedProxy")
            .field("strategy", &self.strategy)
            .field("bean_name", &self.bean_name)
            .field("type", &self.descriptor.name)
            .field("target_type", &self.target_type.qualified_name())
            .field("intercepted_methods", &self.chains.len())
            .finish()
    }
}
