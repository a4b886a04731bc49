//! 织入期错误
//!
//! 运行期的调用失败使用 `spindle_core::InvocationError`，这里只描述织入阶段的致命错误

use spindle_core::ContainerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AopError {
    /// 切点、Bean 引用或通知处理器无法解析，整个织入中止
    #[error("Failed to compile aspect '{aspect}'{}: {reason}", advice_suffix(.advice))]
    Compilation {
        aspect: String,
        advice: Option<String>,
        reason: String,
    },

    /// 切点引用的 Bean 在容器中不存在
    #[error("Unresolved bean '{bean}': {source}")]
    UnresolvedBean {
        bean: String,
        #[source]
        source: ContainerError,
    },

    /// 没有可用的拦截策略
    #[error("Cannot create proxy for bean '{bean}' of type '{type_name}': {reason}")]
    ProxyCreation {
        bean: String,
        type_name: String,
        reason: String,
    },

    /// 代理无法写回 Bean 定义
    #[error("Failed to publish proxy for bean '{bean}': {source}")]
    Publication {
        bean: String,
        #[source]
        source: ContainerError,
    },
}

fn advice_suffix(advice: &Option<String>) -> String {
    match advice {
        Some(advice) => format!(" (advice '{}')", advice),
        None => String::new(),
    }
}

impl AopError {
    pub fn compilation(aspect: impl Into<String>, reason: impl Into<String>) -> Self {
        AopError::Compilation {
            aspect: aspect.into(),
            advice: None,
            reason: reason.into(),
        }
    }

    pub fn advice_compilation(
        aspect: impl Into<String>,
        advice: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        AopError::Compilation {
            aspect: aspect.into(),
            advice: Some(advice.into()),
            reason: reason.into(),
        }
    }
}

pub type AopResult<T> = std::result::Result<T, AopError>;
