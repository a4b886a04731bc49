// spindle-core: 织入引擎所依赖的容器契约
//
// 提供：
// - Bean 的动态调用契约与类型描述符
// - 带代理槽位的 Bean 定义与默认容器实现
// - 配置环境与日志初始化

pub mod bean;
pub mod bean_factory;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod logging;
pub mod scope;

// 重新导出常用类型
pub use bean::{
    decode_arg, encode_return, Bean, BeanDefinition, BeanExt, BeanType, FunctionFactory,
    InstanceFactory, InvocationResult, Value,
};
pub use bean_factory::{BeanFactory, DefaultListableBeanFactory};
pub use config::{
    ConfigValue, Environment, EnvironmentPropertySource, MapPropertySource, PropertySource,
    TomlPropertySource,
};
pub use descriptor::{InterfaceDescriptor, MethodDescriptor, MethodSignature, TypeDescriptor, TypeKind};
pub use error::{
    ApplicationError, ApplicationResult, ContainerError, ContainerResult, InvocationError,
};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use scope::Scope;

// 导出 serde_json，供宏使用
pub use serde_json;

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::bean::{Bean, BeanDefinition, BeanExt, BeanType, InvocationResult, Value};
    pub use crate::bean_factory::{BeanFactory, DefaultListableBeanFactory};
    pub use crate::config::{ConfigValue, Environment, MapPropertySource, PropertySource, TomlPropertySource};
    pub use crate::descriptor::{
        InterfaceDescriptor, MethodDescriptor, MethodSignature, TypeDescriptor, TypeKind,
    };
    pub use crate::error::{ContainerError, ContainerResult, InvocationError};
    pub use crate::logging::{LogFormat, LogLevel, LoggingConfig};
    pub use crate::scope::Scope;
    pub use crate::invoke;
}

/// 以可序列化的参数调用 Bean 方法
///
/// 使用示例：
/// ```ignore
/// use spindle_core::prelude::*;
///
/// let greeting = invoke!(greeter, "greet", "Ann")?;
/// ```
#[macro_export]
macro_rules! invoke {
    ($bean:expr, $method:expr $(, $arg:expr)* $(,)?) => {{
        let args: ::std::vec::Vec<$crate::Value> = ::std::vec![$($crate::serde_json::json!($arg)),*];
        $crate::Bean::invoke(&*$bean, $method, &args)
    }};
}
