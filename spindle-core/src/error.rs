//! 错误类型定义
//!
//! 容器错误、方法调用错误与应用级错误

use thiserror::Error;

/// 容器错误
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Bean '{0}' not found")]
    BeanNotFound(String),

    #[error("Bean '{0}' already exists")]
    BeanAlreadyExists(String),

    #[error("Failed to create bean: {0}")]
    BeanCreationFailed(String),

    /// Bean 的代理槽位只允许写入一次
    #[error("Proxy for bean '{0}' has already been published")]
    ProxyAlreadyPublished(String),

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ContainerResult<T> = std::result::Result<T, ContainerError>;

/// 方法调用错误
///
/// 目标方法和通知在运行时产生的失败，经过调用链原样传递给调用者
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvocationError {
    #[error("No such method '{method}' with {arity} argument(s) on '{type_name}'")]
    NoSuchMethod {
        type_name: String,
        method: String,
        arity: usize,
    },

    #[error("Invalid arguments for '{method}': {message}")]
    InvalidArguments { method: String, message: String },

    /// 业务方法或通知抛出的错误
    #[error("{0}")]
    Failed(String),

    /// 主错误加上在 After 通知中产生的附带错误
    #[error("{primary} (suppressed: {})", join_errors(.suppressed))]
    Suppressed {
        primary: Box<InvocationError>,
        suppressed: Vec<InvocationError>,
    },
}

impl InvocationError {
    pub fn failed(message: impl Into<String>) -> Self {
        InvocationError::Failed(message.into())
    }

    pub fn no_such_method(type_name: impl Into<String>, method: impl Into<String>, arity: usize) -> Self {
        InvocationError::NoSuchMethod {
            type_name: type_name.into(),
            method: method.into(),
            arity,
        }
    }

    pub fn invalid_arguments(method: impl Into<String>, message: impl Into<String>) -> Self {
        InvocationError::InvalidArguments {
            method: method.into(),
            message: message.into(),
        }
    }

    /// 合并附带错误，主错误保持不变
    pub fn with_suppressed(self, mut errors: Vec<InvocationError>) -> Self {
        if errors.is_empty() {
            return self;
        }

        match self {
            InvocationError::Suppressed {
                primary,
                mut suppressed,
            } => {
                suppressed.append(&mut errors);
                InvocationError::Suppressed {
                    primary,
                    suppressed,
                }
            }
            other => InvocationError::Suppressed {
                primary: Box::new(other),
                suppressed: errors,
            },
        }
    }

    /// 获取主错误（去掉附带错误）
    pub fn primary(&self) -> &InvocationError {
        match self {
            InvocationError::Suppressed { primary, .. } => primary.primary(),
            other => other,
        }
    }

    /// 获取附带错误列表
    pub fn suppressed(&self) -> &[InvocationError] {
        match self {
            InvocationError::Suppressed { suppressed, .. } => suppressed,
            _ => &[],
        }
    }
}

fn join_errors(errors: &[InvocationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// 应用级错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInitFailed(String),

    #[error("Failed to load configuration: {0}")]
    ConfigLoadFailed(String),
}

pub type ApplicationResult<T> = std::result::Result<T, ApplicationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suppressed_keeps_primary() {
        let error = InvocationError::failed("boom")
            .with_suppressed(vec![InvocationError::failed("after failed")]);

        assert_eq!(error.primary(), &InvocationError::failed("boom"));
        assert_eq!(error.suppressed().len(), 1);
        assert_eq!(error.to_string(), "boom (suppressed: after failed)");
    }

    #[test]
    fn test_suppressed_merges() {
        let error = InvocationError::failed("boom")
            .with_suppressed(vec![InvocationError::failed("a")])
            .with_suppressed(vec![InvocationError::failed("b")]);

        assert_eq!(error.suppressed().len(), 2);
        assert_eq!(error.primary(), &InvocationError::failed("boom"));
    }

    #[test]
    fn test_no_suppressed_is_identity() {
        let error = InvocationError::failed("boom").with_suppressed(Vec::new());
        assert_eq!(error, InvocationError::failed("boom"));
    }
}
