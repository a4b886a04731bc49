//! 工具函数

use syn::{Error, ItemImpl, Result, Type};

/// 检查 impl 块可以被宏处理：固有实现、无泛型
pub fn check_inherent_impl(item: &ItemImpl, macro_name: &str) -> Result<()> {
    if let Some((_, path, _)) = &item.trait_ {
        return Err(Error::new_spanned(
            path,
            format!("#[{}] must be applied to an inherent impl block", macro_name),
        ));
    }

    if !item.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &item.generics,
            format!("#[{}] does not support generic impl blocks", macro_name),
        ));
    }

    Ok(())
}

/// 获取 impl 块的类型名（路径的最后一段）
pub fn self_type_name(item: &ItemImpl) -> Result<String> {
    match &*item.self_ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.to_string())
            .ok_or_else(|| Error::new_spanned(&item.self_ty, "expected a named type")),
        other => Err(Error::new_spanned(other, "expected a named type")),
    }
}

/// 首字母小写：`CacheAspect` → `cacheAspect`
pub fn lower_camel(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
