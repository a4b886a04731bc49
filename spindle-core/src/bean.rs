use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::{ContainerError, ContainerResult, InvocationError, Scope, TypeDescriptor};

/// 方法参数与返回值的动态表示
pub type Value = serde_json::Value;

/// 方法调用结果
pub type InvocationResult = Result<Value, InvocationError>;

/// Bean trait - 所有可以被容器管理并被拦截的对象都需要实现此 trait
///
/// 方法调用通过 `invoke` 按名称分派，类型信息通过 `type_descriptor` 暴露。
/// 通常由 `#[advisable]` 宏生成实现。
pub trait Bean: Any + Send + Sync {
    /// 获取实例的类型描述符
    fn type_descriptor(&self) -> TypeDescriptor;

    /// 调用指定方法
    fn invoke(&self, method: &str, args: &[Value]) -> InvocationResult;

    /// 转换为 Any，用于向下转型
    fn as_any(&self) -> &dyn Any;
}

/// 可以在实例化之前提供类型描述符的 Bean 类型
pub trait BeanType: Bean + Sized {
    fn descriptor() -> TypeDescriptor;
}

/// Bean 的类型化调用扩展
pub trait BeanExt {
    /// 调用方法并把返回值反序列化为 `T`
    fn call<T: DeserializeOwned>(&self, method: &str, args: &[Value]) -> Result<T, InvocationError>;
}

impl<B: Bean + ?Sized> BeanExt for B {
    fn call<T: DeserializeOwned>(&self, method: &str, args: &[Value]) -> Result<T, InvocationError> {
        let value = self.invoke(method, args)?;
        serde_json::from_value(value).map_err(|e| {
            InvocationError::failed(format!("Cannot decode result of '{}': {}", method, e))
        })
    }
}

/// 从参数列表中解码第 `index` 个参数
pub fn decode_arg<T: DeserializeOwned>(method: &str, args: &[Value], index: usize) -> Result<T, InvocationError> {
    let value = args.get(index).ok_or_else(|| {
        InvocationError::invalid_arguments(method, format!("missing argument #{}", index))
    })?;

    T::deserialize(value).map_err(|e| {
        InvocationError::invalid_arguments(method, format!("argument #{}: {}", index, e))
    })
}

/// 将方法返回值编码为 `Value`
pub fn encode_return<T: Serialize>(method: &str, value: T) -> InvocationResult {
    serde_json::to_value(value).map_err(|e| {
        InvocationError::failed(format!("Cannot encode result of '{}': {}", method, e))
    })
}

/// 实例工厂 trait - 用于创建 Bean 实例
pub trait InstanceFactory: Send + Sync {
    fn create(&self) -> ContainerResult<Arc<dyn Bean>>;
}

/// 简单的函数工厂实现
pub struct FunctionFactory<F>
where
    F: Fn() -> ContainerResult<Arc<dyn Bean>> + Send + Sync,
{
    factory_fn: F,
}

impl<F> FunctionFactory<F>
where
    F: Fn() -> ContainerResult<Arc<dyn Bean>> + Send + Sync,
{
    pub fn new(factory_fn: F) -> Self {
        Self { factory_fn }
    }
}

impl<F> InstanceFactory for FunctionFactory<F>
where
    F: Fn() -> ContainerResult<Arc<dyn Bean>> + Send + Sync,
{
    fn create(&self) -> ContainerResult<Arc<dyn Bean>> {
        (self.factory_fn)()
    }
}

/// Bean 定义 - 每个 Bean 名称唯一的权威注册项
///
/// 除了创建方式之外还持有一个"当前句柄"槽位：织入后写入代理，
/// 之后所有对该名称的查找都返回代理而不是原始实例。
pub struct BeanDefinition {
    /// Bean 的名称
    pub name: String,

    /// 声明的类型
    pub bean_type: TypeDescriptor,

    /// Bean 的作用域
    pub scope: Scope,

    /// 是否延迟初始化（仅对单例有效）
    pub lazy: bool,

    factory: Box<dyn InstanceFactory>,

    proxy: RwLock<Option<Arc<dyn Bean>>>,
}

impl BeanDefinition {
    /// 创建新的 Bean 定义
    pub fn new<F>(name: impl Into<String>, bean_type: TypeDescriptor, factory: F) -> Self
    where
        F: InstanceFactory + 'static,
    {
        Self {
            name: name.into(),
            bean_type,
            scope: Scope::default(),
            lazy: false,
            factory: Box::new(factory),
            proxy: RwLock::new(None),
        }
    }

    /// 通过类型化的构造函数创建 Bean 定义
    pub fn of<T, F>(name: impl Into<String>, constructor: F) -> Self
    where
        T: BeanType,
        F: Fn() -> ContainerResult<T> + Send + Sync + 'static,
    {
        let factory = FunctionFactory::new(move || {
            let instance = constructor()?;
            Ok(Arc::new(instance) as Arc<dyn Bean>)
        });
        Self::new(name, T::descriptor(), factory)
    }

    /// 以已存在的实例创建单例 Bean 定义
    pub fn from_instance(name: impl Into<String>, instance: Arc<dyn Bean>) -> Self {
        let bean_type = instance.type_descriptor();
        let factory = FunctionFactory::new(move || Ok(Arc::clone(&instance)));
        Self::new(name, bean_type, factory).with_scope(Scope::Singleton)
    }

    /// 设置作用域
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// 设置延迟初始化
    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// 使用工厂创建新实例
    pub fn create_instance(&self) -> ContainerResult<Arc<dyn Bean>> {
        self.factory
            .create()
            .map_err(|e| ContainerError::BeanCreationFailed(format!("{}: {}", self.name, e)))
    }

    /// 发布代理，之后对该 Bean 的查找都返回代理
    pub fn set_bean_proxy(&self, proxy: Arc<dyn Bean>) -> ContainerResult<()> {
        let mut slot = self.proxy.write();
        if slot.is_some() {
            return Err(ContainerError::ProxyAlreadyPublished(self.name.clone()));
        }
        *slot = Some(proxy);
        Ok(())
    }

    /// 获取已发布的代理
    pub fn bean_proxy(&self) -> Option<Arc<dyn Bean>> {
        self.proxy.read().clone()
    }

    pub fn is_proxied(&self) -> bool {
        self.proxy.read().is_some()
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("name", &self.name)
            .field("bean_type", &self.bean_type.qualified_name())
            .field("scope", &self.scope)
            .field("lazy", &self.lazy)
            .field("proxied", &self.is_proxied())
            .finish()
    }
}
