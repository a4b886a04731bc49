//! Bean Factory - 容器边界接口
//!
//! 织入引擎只通过 `BeanFactory` 与容器交互：按名称加载实例、列举 Bean 定义、
//! 向定义的代理槽位发布代理。

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    bean::{Bean, BeanDefinition, BeanType},
    error::{ContainerError, ContainerResult},
    Scope, TypeDescriptor,
};

/// BeanFactory - 织入引擎使用的容器接口
///
/// 注意：此 trait 不包含泛型方法，因此可以作为 trait object 使用
pub trait BeanFactory: Send + Sync {
    /// 通过名称加载 Bean
    ///
    /// 如果该 Bean 已发布代理，返回代理而不是原始实例
    fn load_bean(&self, name: &str) -> ContainerResult<Arc<dyn Bean>>;

    /// 检查是否包含指定名称的 Bean
    fn contains_bean(&self, name: &str) -> bool;

    /// 获取所有 Bean 的名称（按名称排序）
    fn bean_names(&self) -> Vec<String>;

    /// 获取所有 Bean 定义
    fn get_bean_definitions(&self) -> HashMap<String, Arc<BeanDefinition>>;

    /// 获取单个 Bean 定义
    fn get_bean_definition(&self, name: &str) -> ContainerResult<Arc<BeanDefinition>> {
        self.get_bean_definitions()
            .remove(name)
            .ok_or_else(|| ContainerError::BeanNotFound(name.to_string()))
    }

    /// 获取 Bean 声明的类型
    fn bean_type(&self, name: &str) -> Option<TypeDescriptor> {
        self.get_bean_definition(name)
            .ok()
            .map(|definition| definition.bean_type.clone())
    }
}

/// DefaultListableBeanFactory - BeanFactory 的默认实现
pub struct DefaultListableBeanFactory {
    /// Bean 定义存储
    definitions: RwLock<HashMap<String, Arc<BeanDefinition>>>,

    /// 单例 Bean 缓存
    singletons: RwLock<HashMap<String, Arc<dyn Bean>>>,
}

impl DefaultListableBeanFactory {
    /// 创建新的 Bean 工厂
    pub fn new() -> Self {
        Self {
            definitions: RwLock::new(HashMap::new()),
            singletons: RwLock::new(HashMap::new()),
        }
    }

    /// 注册 Bean 定义
    pub fn register_bean_definition(&self, definition: BeanDefinition) -> ContainerResult<()> {
        let name = definition.name.clone();

        tracing::trace!(
            "Attempting to register bean: name='{}', type='{}', scope={:?}",
            name,
            definition.bean_type.qualified_name(),
            definition.scope
        );

        let mut definitions = self.definitions.write();
        if definitions.contains_key(&name) {
            tracing::warn!("Bean '{}' already exists, registration failed", name);
            return Err(ContainerError::BeanAlreadyExists(name));
        }
        definitions.insert(name.clone(), Arc::new(definition));

        tracing::debug!("Bean definition registered successfully: '{}'", name);
        Ok(())
    }

    /// 注册单例 Bean
    pub fn register_singleton<T, F>(&self, name: impl Into<String>, constructor: F) -> ContainerResult<()>
    where
        T: BeanType,
        F: Fn() -> ContainerResult<T> + Send + Sync + 'static,
    {
        self.register_bean_definition(BeanDefinition::of(name, constructor).with_scope(Scope::Singleton))
    }

    /// 注册原型 Bean
    pub fn register_prototype<T, F>(&self, name: impl Into<String>, constructor: F) -> ContainerResult<()>
    where
        T: BeanType,
        F: Fn() -> ContainerResult<T> + Send + Sync + 'static,
    {
        self.register_bean_definition(BeanDefinition::of(name, constructor).with_scope(Scope::Prototype))
    }

    /// 注册已存在的实例
    pub fn register_instance(&self, name: impl Into<String>, instance: Arc<dyn Bean>) -> ContainerResult<()> {
        self.register_bean_definition(BeanDefinition::from_instance(name, instance))
    }

    /// 预实例化所有非延迟加载的单例 Bean
    pub fn preinstantiate_singletons(&self) -> ContainerResult<()> {
        let names: Vec<String> = {
            let definitions = self.definitions.read();
            let mut names: Vec<String> = definitions
                .values()
                .filter(|d| d.scope == Scope::Singleton && !d.lazy)
                .map(|d| d.name.clone())
                .collect();
            names.sort();
            names
        };

        for name in names {
            self.load_bean(&name)?;
        }

        Ok(())
    }

    /// 获取 Bean 定义的数量
    pub fn get_bean_definition_count(&self) -> usize {
        self.definitions.read().len()
    }
}

impl Default for DefaultListableBeanFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BeanFactory for DefaultListableBeanFactory {
    fn load_bean(&self, name: &str) -> ContainerResult<Arc<dyn Bean>> {
        tracing::trace!("Requesting bean: '{}'", name);

        let definition = {
            let definitions = self.definitions.read();
            definitions.get(name).cloned().ok_or_else(|| {
                tracing::debug!("Bean '{}' not found in container", name);
                ContainerError::BeanNotFound(name.to_string())
            })?
        };

        // 已织入的 Bean 只暴露代理
        if let Some(proxy) = definition.bean_proxy() {
            return Ok(proxy);
        }

        match definition.scope {
            Scope::Singleton => {
                // 检查缓存
                if let Some(bean) = self.singletons.read().get(name) {
                    tracing::debug!("Returning cached instance of singleton bean '{}'", name);
                    return Ok(Arc::clone(bean));
                }

                tracing::info!("Creating shared instance of singleton bean '{}'", name);
                let bean = definition.create_instance()?;

                // 并发创建时以先写入的实例为准
                let mut singletons = self.singletons.write();
                let bean = singletons
                    .entry(name.to_string())
                    .or_insert(bean)
                    .clone();

                tracing::debug!("Singleton bean '{}' created and cached", name);
                Ok(bean)
            }
            Scope::Prototype => {
                tracing::debug!("Creating new instance of prototype bean '{}'", name);
                definition.create_instance()
            }
        }
    }

    fn contains_bean(&self, name: &str) -> bool {
        self.definitions.read().contains_key(name)
    }

    fn bean_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.definitions.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn get_bean_definitions(&self) -> HashMap<String, Arc<BeanDefinition>> {
        self.definitions.read().clone()
    }

    fn get_bean_definition(&self, name: &str) -> ContainerResult<Arc<BeanDefinition>> {
        self.definitions
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ContainerError::BeanNotFound(name.to_string()))
    }
}
