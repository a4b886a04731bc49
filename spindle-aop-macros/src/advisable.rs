//! #[advisable] 属性宏实现
//!
//! 生成 `BeanType` 与 `Bean` 实现，相当于在编译期生成代理所需的派生类型分派表

use crate::utils::{check_inherent_impl, self_type_name};
use proc_macro2::{Literal, TokenStream};
use quote::{format_ident, quote};
use syn::punctuated::Punctuated;
use syn::{
    Attribute, Error, FnArg, ImplItem, ImplItemFn, ItemImpl, LitStr, Meta, Result, ReturnType,
    Token, Type,
};

/// 类型种类
#[derive(Clone, Copy, PartialEq, Eq, Default)]
enum Kind {
    Interface,
    #[default]
    Concrete,
    Sealed,
}

impl Kind {
    fn tokens(&self) -> TokenStream {
        match self {
            Kind::Interface => quote!(::spindle_aop::spindle_core::TypeKind::Interface),
            Kind::Concrete => quote!(::spindle_aop::spindle_core::TypeKind::Concrete),
            Kind::Sealed => quote!(::spindle_aop::spindle_core::TypeKind::Sealed),
        }
    }
}

#[derive(Default)]
struct AdvisableArgs {
    interfaces: Vec<String>,
    kind: Kind,
}

impl AdvisableArgs {
    fn parse(attr: TokenStream) -> Result<Self> {
        let mut args = AdvisableArgs::default();

        let parser = syn::meta::parser(|meta| {
            if meta.path.is_ident("interface") {
                let name: LitStr = meta.value()?.parse()?;
                args.interfaces.push(name.value());
                Ok(())
            } else if meta.path.is_ident("kind") {
                let kind: LitStr = meta.value()?.parse()?;
                args.kind = match kind.value().as_str() {
                    "interface" => Kind::Interface,
                    "concrete" => Kind::Concrete,
                    "sealed" => Kind::Sealed,
                    other => {
                        return Err(meta.error(format!(
                            "unknown kind '{}', expected \"interface\", \"concrete\" or \"sealed\"",
                            other
                        )))
                    }
                };
                Ok(())
            } else {
                Err(meta.error("unsupported #[advisable] option, expected `interface` or `kind`"))
            }
        });

        syn::parse::Parser::parse2(parser, attr)?;
        Ok(args)
    }
}

/// 方法上的辅助属性
#[derive(Default)]
struct MethodDirectives {
    internal: bool,
    interface: Option<String>,
    cacheable: Option<String>,
    cache_evict: Vec<String>,
}

impl MethodDirectives {
    fn is_helper(attr: &Attribute) -> bool {
        ["internal", "interface", "cacheable", "cache_evict"]
            .iter()
            .any(|name| attr.path().is_ident(name))
    }

    fn is_empty(&self) -> bool {
        !self.internal && self.interface.is_none() && self.cacheable.is_none() && self.cache_evict.is_empty()
    }

    /// 解析并移除辅助属性
    fn take(method: &mut ImplItemFn) -> Result<Self> {
        let mut directives = MethodDirectives::default();
        let (helpers, kept): (Vec<Attribute>, Vec<Attribute>) =
            method.attrs.drain(..).partition(Self::is_helper);
        method.attrs = kept;

        for attr in helpers {
            if attr.path().is_ident("internal") {
                attr.meta.require_path_only()?;
                directives.internal = true;
            } else if attr.path().is_ident("interface") {
                let name: LitStr = attr.parse_args()?;
                directives.interface = Some(name.value());
            } else if attr.path().is_ident("cacheable") {
                let region = match &attr.meta {
                    Meta::Path(_) => String::new(),
                    _ => attr.parse_args::<LitStr>()?.value(),
                };
                directives.cacheable = Some(region);
            } else {
                let regions = attr.parse_args_with(Punctuated::<LitStr, Token![,]>::parse_terminated)?;
                if regions.is_empty() {
                    return Err(Error::new_spanned(attr, "#[cache_evict] requires at least one region"));
                }
                directives
                    .cache_evict
                    .extend(regions.iter().map(|region| region.value()));
            }
        }

        if directives.internal && directives.interface.is_some() {
            return Err(Error::new_spanned(
                &method.sig.ident,
                "a method cannot be both #[internal] and #[interface(...)]",
            ));
        }

        Ok(directives)
    }
}

/// 一个可分派的方法
struct DispatchMethod {
    name: String,
    arity: usize,
    directives: MethodDirectives,
    arm: TokenStream,
}

/// 判断方法能否参与分派：`&self` 接收者、无泛型、非 async
fn is_dispatchable(method: &ImplItemFn) -> bool {
    let shared_receiver = matches!(
        method.sig.inputs.first(),
        Some(FnArg::Receiver(receiver)) if receiver.reference.is_some() && receiver.mutability.is_none()
    );

    shared_receiver && method.sig.generics.params.is_empty() && method.sig.asyncness.is_none()
}

fn is_result(ty: &Type) -> bool {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|segment| segment.ident == "Result")
            .unwrap_or(false),
        _ => false,
    }
}

fn is_str(ty: &Type) -> bool {
    matches!(ty, Type::Path(type_path) if type_path.path.is_ident("str"))
}

/// 生成一个分派分支
fn dispatch_arm(method: &ImplItemFn, name: &str) -> Result<(usize, TokenStream)> {
    let ident = &method.sig.ident;
    let mut decodes = Vec::new();
    let mut call_args = Vec::new();

    for (index, input) in method.sig.inputs.iter().skip(1).enumerate() {
        let FnArg::Typed(pat_type) = input else {
            continue;
        };
        let arg = format_ident!("__arg{}", index);

        let (decode_ty, pass_by_ref) = match &*pat_type.ty {
            Type::Reference(reference) if reference.mutability.is_some() => {
                return Err(Error::new_spanned(
                    &pat_type.ty,
                    "#[advisable] methods cannot take `&mut` parameters",
                ));
            }
            Type::Reference(reference) if is_str(&reference.elem) => {
                (quote!(::std::string::String), true)
            }
            Type::Reference(reference) => {
                let elem = &reference.elem;
                (quote!(#elem), true)
            }
            other => (quote!(#other), false),
        };

        decodes.push(quote! {
            let #arg: #decode_ty = ::spindle_aop::spindle_core::decode_arg(method, args, #index)?;
        });
        call_args.push(if pass_by_ref { quote!(&#arg) } else { quote!(#arg) });
    }

    let arity = decodes.len();
    let arity_lit = Literal::usize_unsuffixed(arity);

    let encode = match &method.sig.output {
        ReturnType::Type(_, ty) if is_result(ty) => quote! {
            match __ret {
                ::std::result::Result::Ok(value) => ::spindle_aop::spindle_core::encode_return(method, value),
                ::std::result::Result::Err(error) => ::std::result::Result::Err(
                    ::spindle_aop::spindle_core::InvocationError::failed(::std::string::ToString::to_string(&error)),
                ),
            }
        },
        _ => quote! {
            ::spindle_aop::spindle_core::encode_return(method, __ret)
        },
    };

    let arm = quote! {
        (#name, #arity_lit) => {
            #(#decodes)*
            let __ret = self.#ident(#(#call_args),*);
            #encode
        }
    };

    Ok((arity, arm))
}

/// 生成接口描述：`interface = ...` 收集未标记的方法，`#[interface("X")]` 归入 X
fn interface_tokens(args: &AdvisableArgs, type_name: &str, methods: &[DispatchMethod]) -> Vec<TokenStream> {
    let mut defaults = args.interfaces.clone();
    if defaults.is_empty() && args.kind == Kind::Interface {
        defaults.push(type_name.to_string());
    }

    let mut interfaces: Vec<(String, Vec<(String, usize)>)> = defaults
        .iter()
        .map(|name| (name.clone(), Vec::new()))
        .collect();

    for method in methods {
        if method.directives.internal {
            continue;
        }

        match &method.directives.interface {
            Some(explicit) => {
                match interfaces.iter_mut().find(|(name, _)| name == explicit) {
                    Some((_, members)) => members.push((method.name.clone(), method.arity)),
                    None => interfaces.push((explicit.clone(), vec![(method.name.clone(), method.arity)])),
                }
            }
            None => {
                for (name, members) in interfaces.iter_mut() {
                    if defaults.contains(name) {
                        members.push((method.name.clone(), method.arity));
                    }
                }
            }
        }
    }

    interfaces
        .into_iter()
        .map(|(name, members)| {
            let member_names = members.iter().map(|(n, _)| n);
            let member_arities = members.iter().map(|(_, a)| Literal::usize_unsuffixed(*a));
            quote! {
                .with_interface(
                    ::spindle_aop::spindle_core::InterfaceDescriptor::new(#name)
                        #(.with_method(#member_names, #member_arities))*
                )
            }
        })
        .collect()
}

fn method_tokens(method: &DispatchMethod) -> TokenStream {
    let name = &method.name;
    let arity = Literal::usize_unsuffixed(method.arity);
    let cacheable = method
        .directives
        .cacheable
        .as_ref()
        .map(|region| quote!(.cacheable(#region)));
    let evicts = method.directives.cache_evict.iter();

    quote! {
        .with_method(
            ::spindle_aop::spindle_core::MethodDescriptor::new(#name, #arity)
                #cacheable
                #(.evicts(#evicts))*
        )
    }
}

pub fn impl_advisable(attr: TokenStream, mut item: ItemImpl) -> Result<TokenStream> {
    check_inherent_impl(&item, "advisable")?;
    let args = AdvisableArgs::parse(attr)?;
    let type_name = self_type_name(&item)?;

    let mut methods = Vec::new();
    for impl_item in item.items.iter_mut() {
        let ImplItem::Fn(method) = impl_item else {
            continue;
        };

        let directives = MethodDirectives::take(method)?;
        if !is_dispatchable(method) {
            if !directives.is_empty() {
                return Err(Error::new_spanned(
                    &method.sig,
                    "cache and interface directives require a non-generic, non-async `&self` method",
                ));
            }
            continue;
        }

        let name = method.sig.ident.to_string();
        let (arity, arm) = dispatch_arm(method, &name)?;
        methods.push(DispatchMethod {
            name,
            arity,
            directives,
            arm,
        });
    }

    let self_ty = &item.self_ty;
    let kind = args.kind.tokens();
    let interfaces = interface_tokens(&args, &type_name, &methods);
    let method_descriptors = methods.iter().map(method_tokens);
    let arms = methods.iter().map(|m| &m.arm);

    let expanded = quote! {
        #item

        impl ::spindle_aop::spindle_core::BeanType for #self_ty {
            fn descriptor() -> ::spindle_aop::spindle_core::TypeDescriptor {
                ::spindle_aop::spindle_core::TypeDescriptor::new(#type_name, #kind)
                    .in_module(::std::module_path!())
                    #(#interfaces)*
                    #(#method_descriptors)*
            }
        }

        impl ::spindle_aop::spindle_core::Bean for #self_ty {
            fn type_descriptor(&self) -> ::spindle_aop::spindle_core::TypeDescriptor {
                <Self as ::spindle_aop::spindle_core::BeanType>::descriptor()
            }

            #[allow(unused_variables)]
            fn invoke(
                &self,
                method: &str,
                args: &[::spindle_aop::spindle_core::Value],
            ) -> ::spindle_aop::spindle_core::InvocationResult {
                match (method, args.len()) {
                    #(#arms)*
                    _ => ::std::result::Result::Err(
                        ::spindle_aop::spindle_core::InvocationError::no_such_method(#type_name, method, args.len()),
                    ),
                }
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
        }
    };

    Ok(expanded)
}
