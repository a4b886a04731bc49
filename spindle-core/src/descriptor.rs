//! 类型描述符
//!
//! 描述 Bean 类型对外暴露的能力面：类型种类、实现的接口、方法签名以及方法上的缓存指令。
//! 切点编译和代理策略选择都只依赖这里的静态信息，不需要运行时反射。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 方法标识：方法名 + 参数个数
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodSignature {
    pub name: String,
    pub arity: usize,
}

impl MethodSignature {
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity,
        }
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

/// 方法描述：签名以及缓存指令
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub signature: MethodSignature,

    /// 可缓存方法。`Some("")` 表示未指定缓存区域，使用 `bean.method` 作为默认区域
    pub cacheable: Option<String>,

    /// 调用前需要清空的缓存区域
    pub cache_evict: Vec<String>,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        Self {
            signature: MethodSignature::new(name, arity),
            cacheable: None,
            cache_evict: Vec::new(),
        }
    }

    /// 标记为可缓存方法
    pub fn cacheable(mut self, region: impl Into<String>) -> Self {
        self.cacheable = Some(region.into());
        self
    }

    /// 添加调用前需要清空的缓存区域
    pub fn evicts(mut self, region: impl Into<String>) -> Self {
        self.cache_evict.push(region.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }
}

/// 类型种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    /// 完全由接口契约组成
    Interface,
    /// 普通具体类型，可以派生子类型
    Concrete,
    /// 不允许派生子类型的具体类型
    Sealed,
}

impl Default for TypeKind {
    fn default() -> Self {
        TypeKind::Concrete
    }
}

/// 接口描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDescriptor {
    pub name: String,
    pub methods: Vec<MethodSignature>,
}

impl InterfaceDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    pub fn with_method(mut self, name: impl Into<String>, arity: usize) -> Self {
        self.methods.push(MethodSignature::new(name, arity));
        self
    }

    pub fn declares(&self, signature: &MethodSignature) -> bool {
        self.methods.contains(signature)
    }
}

/// 类型描述符
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// 简单类型名，例如 `UserRepository`
    pub name: String,

    /// 所在模块路径，例如 `app::repository`
    pub module: String,

    pub kind: TypeKind,

    /// 父类型的限定名（代理生成的子类型使用）
    pub superclass: Option<String>,

    pub interfaces: Vec<InterfaceDescriptor>,

    pub methods: Vec<MethodDescriptor>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ..Self::default()
        }
    }

    pub fn concrete(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Concrete)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    pub fn sealed(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Sealed)
    }

    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    pub fn with_superclass(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    pub fn with_interface(mut self, interface: InterfaceDescriptor) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    /// 限定名：`module::name`，模块为空时即为简单名
    pub fn qualified_name(&self) -> String {
        if self.module.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.module, self.name)
        }
    }

    pub fn has_interfaces(&self) -> bool {
        !self.interfaces.is_empty()
    }

    /// 所有接口声明的方法（去重，保持声明顺序）
    pub fn interface_methods(&self) -> Vec<MethodSignature> {
        let mut methods: Vec<MethodSignature> = Vec::new();
        for signature in self.interfaces.iter().flat_map(|i| i.methods.iter()) {
            if !methods.contains(signature) {
                methods.push(signature.clone());
            }
        }
        methods
    }

    /// 查找方法描述
    pub fn find_method(&self, name: &str, arity: usize) -> Option<&MethodDescriptor> {
        self.methods
            .iter()
            .find(|m| m.signature.name == name && m.signature.arity == arity)
    }

    /// 判断类型是否可以作为 `type_name` 使用（自身、父类型或实现的接口）
    pub fn is_assignable_to(&self, type_name: &str) -> bool {
        self.name == type_name
            || self.qualified_name() == type_name
            || self.superclass.as_deref() == Some(type_name)
            || self.interfaces.iter().any(|i| i.name == type_name)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified_name())
    }
}
