//! Spindle AOP 过程宏
//!
//! 提供 AOP 相关的过程宏，包括：
//! - `#[advisable]` - 为 impl 块生成动态分派表和类型描述符，使 Bean 可以被代理
//! - `#[aspect]` - 把 impl 块中的通知方法注册为切面

extern crate proc_macro;

use proc_macro::TokenStream;
use syn::{parse_macro_input, ItemImpl};

mod advisable;
mod aspect;
mod utils;

/// `#[advisable]` 属性宏
///
/// 为 impl 块实现 `Bean` 和 `BeanType`：按 (方法名, 参数个数) 分派调用，
/// 参数从 `Value` 解码，返回值编码为 `Value`，`Result` 的错误转换为 `InvocationError::Failed`。
/// 只有 `&self` 方法参与分派。
///
/// 选项：
/// - `interface = "Name"` - 类型实现的接口（可重复），默认包含所有未标记 `#[internal]` 的方法
/// - `kind = "concrete" | "interface" | "sealed"` - 类型种类，默认 `concrete`
///
/// 方法属性：
/// - `#[internal]` - 不属于任何接口
/// - `#[interface("Name")]` - 只属于指定接口
/// - `#[cacheable]` / `#[cacheable("region")]` - 结果可缓存
/// - `#[cache_evict("region", ...)]` - 调用前清空缓存区域
///
/// 使用示例：
/// ```ignore
/// use spindle_aop_macros::advisable;
///
/// pub struct UserRepository { /* ... */ }
///
/// #[advisable(interface = "Repository")]
/// impl UserRepository {
///     #[cacheable("users")]
///     pub fn find_by_id(&self, id: u64) -> Option<User> { /* ... */ }
///
///     #[cache_evict("users")]
///     pub fn save(&self, user: User) -> Result<(), RepositoryError> { /* ... */ }
/// }
/// ```
#[proc_macro_attribute]
pub fn advisable(attr: TokenStream, item: TokenStream) -> TokenStream {
    let item = parse_macro_input!(item as ItemImpl);
    advisable::impl_advisable(attr.into(), item)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

/// `#[aspect]` 属性宏
///
/// 把 impl 块中标记了 `#[before]`、`#[after]`、`#[around]` 的方法作为通知，
/// 实现 `Aspect` trait 并生成 `aspect_definition()`。切面类型需要实现 `Clone`。
///
/// 选项：
/// - `name = "..."` - 切面名称，默认为类型名首字母小写
/// - `scan` - 通过 inventory 注册，开启组件扫描时自动加入织入（需要实现 `Default`）
///
/// 使用示例：
/// ```ignore
/// use spindle_aop::prelude::*;
/// use spindle_aop_macros::aspect;
///
/// #[derive(Clone, Default)]
/// pub struct AuditAspect;
///
/// #[aspect(scan)]
/// impl AuditAspect {
///     #[before("within(*Repository)")]
///     fn audit(&self, jp: &JoinPoint) -> Result<(), InvocationError> {
///         tracing::info!("audit {}", jp);
///         Ok(())
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn aspect(attr: TokenStream, item: TokenStream) -> TokenStream {
    let item = parse_macro_input!(item as ItemImpl);
    aspect::impl_aspect(attr.into(), item)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}
