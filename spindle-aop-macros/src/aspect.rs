//! #[aspect] 属性宏实现

use crate::utils::{check_inherent_impl, lower_camel, self_type_name};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Attribute, Error, ImplItem, ItemImpl, LitStr, Result};

#[derive(Default)]
struct AspectArgs {
    name: Option<String>,
    scan: bool,
}

impl AspectArgs {
    fn parse(attr: TokenStream) -> Result<Self> {
        let mut args = AspectArgs::default();

        let parser = syn::meta::parser(|meta| {
            if meta.path.is_ident("scan") {
                args.scan = true;
                Ok(())
            } else if meta.path.is_ident("name") {
                let name: LitStr = meta.value()?.parse()?;
                args.name = Some(name.value());
                Ok(())
            } else {
                Err(meta.error("unsupported #[aspect] option, expected `name` or `scan`"))
            }
        });

        syn::parse::Parser::parse2(parser, attr)?;
        Ok(args)
    }
}

#[derive(Clone, Copy)]
enum Location {
    Before,
    After,
    Around,
}

impl Location {
    fn of(attr: &Attribute) -> Option<Self> {
        if attr.path().is_ident("before") {
            Some(Location::Before)
        } else if attr.path().is_ident("after") {
            Some(Location::After)
        } else if attr.path().is_ident("around") {
            Some(Location::Around)
        } else {
            None
        }
    }

    fn tokens(&self) -> TokenStream {
        match self {
            Location::Before => quote!(::spindle_aop::AdviceLocation::Before),
            Location::After => quote!(::spindle_aop::AdviceLocation::After),
            Location::Around => quote!(::spindle_aop::AdviceLocation::Around),
        }
    }
}

struct AdviceMethod {
    ident: syn::Ident,
    location: Location,
    pointcut: TokenStream,
}

/// 在编译期解析切点表达式：`within(...)`、`beans(...)`、`execution(...)`
fn parse_pointcut(lit: &LitStr) -> Result<TokenStream> {
    let source = lit.value();
    let source = source.trim();

    let (kind, rest) = source
        .split_once('(')
        .ok_or_else(|| Error::new_spanned(lit, "expected `kind(values)`, e.g. \"within(*Service)\""))?;
    let body = rest
        .strip_suffix(')')
        .ok_or_else(|| Error::new_spanned(lit, "unbalanced parentheses in pointcut"))?;

    let values: Vec<String> = split_values(body);
    if values.is_empty() {
        return Err(Error::new_spanned(lit, format!("pointcut '{}' requires at least one value", kind.trim())));
    }

    match kind.trim() {
        "within" => Ok(quote!(::spindle_aop::PointcutExpression::within([#(#values),*]))),
        "beans" => Ok(quote!(::spindle_aop::PointcutExpression::beans([#(#values),*]))),
        "execution" => {
            let mut expressions = values.iter().map(|value| execution_tokens(lit, value));
            let mut combined = match expressions.next() {
                Some(first) => first?,
                None => return Err(Error::new_spanned(lit, "execution requires a value")),
            };
            for next in expressions {
                let next = next?;
                combined = quote!(#combined.or(#next));
            }
            Ok(combined)
        }
        other => Err(Error::new_spanned(
            lit,
            format!("unsupported pointcut kind '{}', expected within, beans or execution", other),
        )),
    }
}

/// 按顶层逗号拆分，括号内的逗号保留
fn split_values(body: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();

    for c in body.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => values.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    values.push(current);

    values
        .into_iter()
        .map(|v| v.trim().trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn execution_tokens(lit: &LitStr, value: &str) -> Result<TokenStream> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    let method_part = match parts.as_slice() {
        [single] => *single,
        [_, method_part] => *method_part,
        _ => return Err(Error::new_spanned(lit, format!("malformed execution expression '{}'", value))),
    };

    let method_part = method_part.trim_end_matches("(..)").trim_end_matches("()");
    let (type_pattern, method_pattern) = method_part
        .rsplit_once('.')
        .ok_or_else(|| Error::new_spanned(lit, format!("execution expression needs 'Type.method': '{}'", value)))?;

    Ok(quote! {
        ::spindle_aop::PointcutExpression::Execution {
            type_pattern: ::spindle_aop::ScopePattern::new(#type_pattern),
            method_pattern: ::spindle_aop::ScopePattern::new(#method_pattern),
        }
    })
}

pub fn impl_aspect(attr: TokenStream, mut item: ItemImpl) -> Result<TokenStream> {
    check_inherent_impl(&item, "aspect")?;
    let args = AspectArgs::parse(attr)?;
    let type_name = self_type_name(&item)?;
    let aspect_name = args.name.clone().unwrap_or_else(|| lower_camel(&type_name));

    let mut advice = Vec::new();
    for impl_item in item.items.iter_mut() {
        let ImplItem::Fn(method) = impl_item else {
            continue;
        };

        let mut found: Option<(Location, TokenStream)> = None;
        let mut kept = Vec::with_capacity(method.attrs.len());
        for attr in method.attrs.drain(..) {
            match Location::of(&attr) {
                Some(location) => {
                    if found.is_some() {
                        return Err(Error::new_spanned(attr, "a method can declare only one advice"));
                    }
                    let lit: LitStr = attr.parse_args()?;
                    found = Some((location, parse_pointcut(&lit)?));
                }
                None => kept.push(attr),
            }
        }
        method.attrs = kept;

        if let Some((location, pointcut)) = found {
            if method.sig.asyncness.is_some() || !method.sig.generics.params.is_empty() {
                return Err(Error::new_spanned(&method.sig, "advice methods must be non-generic and synchronous"));
            }
            advice.push(AdviceMethod {
                ident: method.sig.ident.clone(),
                location,
                pointcut,
            });
        }
    }

    if advice.is_empty() {
        return Err(Error::new_spanned(
            &item.self_ty,
            "#[aspect] requires at least one #[before], #[after] or #[around] method",
        ));
    }

    let self_ty = &item.self_ty;

    let definitions = advice.iter().map(|a| {
        let location = a.location.tokens();
        let pointcut = &a.pointcut;
        let handler = a.ident.to_string();
        quote! {
            .with_advice(::spindle_aop::AdviceDefinition::new(#location, #pointcut, #handler))
        }
    });

    let handlers = advice.iter().map(|a| {
        let ident = &a.ident;
        let handler = ident.to_string();
        let wrap = match a.location {
            Location::Before => quote!(::spindle_aop::AdviceHandler::before(move |jp| this.#ident(jp))),
            Location::After => {
                quote!(::spindle_aop::AdviceHandler::after(move |jp, outcome| this.#ident(jp, outcome)))
            }
            Location::Around => quote!(::spindle_aop::AdviceHandler::around(move |pjp| this.#ident(pjp))),
        };
        quote! {
            #handler => {
                let this = ::std::clone::Clone::clone(self);
                ::std::option::Option::Some(#wrap)
            }
        }
    });

    let registration = args.scan.then(|| {
        quote! {
            ::spindle_aop::inventory::submit! {
                ::spindle_aop::AspectRegistration::new(#aspect_name, || {
                    <#self_ty as ::std::default::Default>::default().aspect_definition()
                })
            }
        }
    });

    let expanded = quote! {
        #item

        impl #self_ty {
            /// 切面定义
            pub fn aspect_definition(self) -> ::spindle_aop::AspectDefinition {
                ::spindle_aop::AspectDefinition::of(self)
                    .named(#aspect_name)
                    #(#definitions)*
            }
        }

        impl ::spindle_aop::Aspect for #self_ty {
            fn advice(&self, name: &str) -> ::std::option::Option<::spindle_aop::AdviceHandler> {
                match name {
                    #(#handlers)*
                    _ => ::std::option::Option::None,
                }
            }
        }

        #registration
    };

    Ok(expanded)
}
