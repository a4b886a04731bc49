//! 切点（Pointcut）表达式系统
//!
//! 表达式在织入期对 (Bean 名称, 类型, 方法) 求值一次，结果固化为 `Pointcut`

use crate::advice::CompiledAdvice;
use crate::invocation::AdviceChain;
use regex::Regex;
use spindle_core::{MethodSignature, TypeDescriptor};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// 作用域模式（支持 `*` 通配符）
///
/// 支持的模式：
/// - `*` - 匹配任意字符串
/// - `User*` - 以 User 开头
/// - `*Service` - 以 Service 结尾
/// - `*Service*` - 包含 Service
#[derive(Clone)]
pub struct ScopePattern {
    raw: String,
    regex: Option<Regex>,
}

impl ScopePattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        let raw = pattern.into();
        let regex = if raw.contains('*') && raw != "*" {
            // 只有 * 是通配符，其余字符按字面匹配
            let body = raw
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*");
            Regex::new(&format!("^{}$", body)).ok()
        } else {
            None
        };

        Self { raw, regex }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_wildcard(&self) -> bool {
        self.raw.contains('*')
    }

    pub fn matches(&self, target: &str) -> bool {
        if self.raw == "*" {
            return true;
        }

        match &self.regex {
            Some(regex) => regex.is_match(target),
            None => !self.is_wildcard() && self.raw == target,
        }
    }

    /// 按简单名或限定名匹配类型
    fn matches_type(&self, target_type: &TypeDescriptor) -> bool {
        self.matches(&target_type.name) || self.matches(&target_type.qualified_name())
    }
}

impl fmt::Debug for ScopePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.raw)
    }
}

impl PartialEq for ScopePattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

/// Bean 名称模式：`repo` 或 `repo.find_by_id`
#[derive(Debug, Clone, PartialEq)]
pub struct BeanPattern {
    pub bean: ScopePattern,
    pub method: Option<ScopePattern>,
}

impl BeanPattern {
    pub fn parse(pattern: &str) -> Self {
        match pattern.split_once('.') {
            Some((bean, method)) => Self {
                bean: ScopePattern::new(bean),
                method: Some(ScopePattern::new(method)),
            },
            None => Self {
                bean: ScopePattern::new(pattern),
                method: None,
            },
        }
    }

    fn matches(&self, bean_name: &str, method: &MethodSignature) -> bool {
        self.bean.matches(bean_name)
            && self
                .method
                .as_ref()
                .map_or(true, |pattern| pattern.matches(&method.name))
    }
}

/// 切点表达式
#[derive(Debug, Clone, PartialEq)]
pub enum PointcutExpression {
    /// 匹配类型属于任一模式的 Bean 的所有方法
    /// 例如：within("*Repository")
    Within(Vec<ScopePattern>),

    /// 按 Bean 名称匹配，可以带方法名
    /// 例如：beans("repo.save")
    Beans(Vec<BeanPattern>),

    /// 匹配特定类型的特定方法
    /// 例如：execution(* UserService.get_user(..))
    Execution {
        type_pattern: ScopePattern,
        method_pattern: ScopePattern,
    },

    /// 与运算（AND）
    And(Box<PointcutExpression>, Box<PointcutExpression>),

    /// 或运算（OR）
    Or(Box<PointcutExpression>, Box<PointcutExpression>),

    /// 非运算（NOT）
    Not(Box<PointcutExpression>),
}

impl PointcutExpression {
    /// 创建 within 表达式
    pub fn within<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PointcutExpression::Within(patterns.into_iter().map(ScopePattern::new).collect())
    }

    /// 匹配所有 Bean 的所有方法
    pub fn any() -> Self {
        Self::within(["*"])
    }

    /// 创建 beans 表达式
    pub fn beans<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        PointcutExpression::Beans(
            patterns
                .into_iter()
                .map(|p| BeanPattern::parse(p.as_ref()))
                .collect(),
        )
    }

    /// 创建 execution 表达式
    ///
    /// 接受 `"* UserService.get_user(..)"` 或 `"UserService.get_user"`，
    /// 只支持类型和方法名匹配
    pub fn execution(expression: &str) -> Result<Self, String> {
        let method_part = match expression.split_whitespace().collect::<Vec<_>>().as_slice() {
            [single] => *single,
            [_, method_part] => *method_part,
            _ => return Err(format!("Malformed execution expression: '{}'", expression)),
        };

        let method_part = method_part.trim_end_matches("(..)").trim_end_matches("()");
        let (type_pattern, method_pattern) = method_part
            .rsplit_once('.')
            .ok_or_else(|| format!("Execution expression needs 'Type.method': '{}'", expression))?;

        Ok(PointcutExpression::Execution {
            type_pattern: ScopePattern::new(type_pattern),
            method_pattern: ScopePattern::new(method_pattern),
        })
    }

    /// 由表达式种类和取值构造
    pub fn parse<S: AsRef<str>>(kind: &str, values: &[S]) -> Result<Self, String> {
        if values.is_empty() {
            return Err(format!("Pointcut '{}' requires at least one value", kind));
        }

        match kind {
            "within" => Ok(Self::within(values.iter().map(|v| v.as_ref().to_string()))),
            "beans" => Ok(Self::beans(values)),
            "execution" => values
                .iter()
                .map(|v| Self::execution(v.as_ref()))
                .reduce(|acc, next| Ok(acc?.or(next?)))
                .unwrap_or_else(|| Err(format!("Pointcut '{}' requires a value", kind))),
            other => Err(format!("Unsupported pointcut kind: '{}'", other)),
        }
    }

    /// 检查 (Bean, 方法) 是否匹配
    pub fn matches(&self, bean_name: &str, target_type: &TypeDescriptor, method: &MethodSignature) -> bool {
        match self {
            PointcutExpression::Within(patterns) => {
                patterns.iter().any(|p| p.matches_type(target_type))
            }

            PointcutExpression::Beans(patterns) => {
                patterns.iter().any(|p| p.matches(bean_name, method))
            }

            PointcutExpression::Execution {
                type_pattern,
                method_pattern,
            } => type_pattern.matches_type(target_type) && method_pattern.matches(&method.name),

            PointcutExpression::And(left, right) => {
                left.matches(bean_name, target_type, method)
                    && right.matches(bean_name, target_type, method)
            }

            PointcutExpression::Or(left, right) => {
                left.matches(bean_name, target_type, method)
                    || right.matches(bean_name, target_type, method)
            }

            PointcutExpression::Not(expr) => !expr.matches(bean_name, target_type, method),
        }
    }

    /// 表达式中按字面引用的 Bean 名称（不含通配符）
    pub fn referenced_beans(&self) -> Vec<&str> {
        match self {
            PointcutExpression::Beans(patterns) => patterns
                .iter()
                .filter(|p| !p.bean.is_wildcard())
                .map(|p| p.bean.as_str())
                .collect(),
            PointcutExpression::And(left, right) | PointcutExpression::Or(left, right) => {
                let mut beans = left.referenced_beans();
                beans.extend(right.referenced_beans());
                beans
            }
            PointcutExpression::Not(expr) => expr.referenced_beans(),
            PointcutExpression::Within(_) | PointcutExpression::Execution { .. } => Vec::new(),
        }
    }

    /// 与运算
    pub fn and(self, other: PointcutExpression) -> Self {
        PointcutExpression::And(Box::new(self), Box::new(other))
    }

    /// 或运算
    pub fn or(self, other: PointcutExpression) -> Self {
        PointcutExpression::Or(Box::new(self), Box::new(other))
    }

    /// 非运算
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        PointcutExpression::Not(Box::new(self))
    }
}

impl fmt::Display for PointcutExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(patterns: impl Iterator<Item = String>) -> String {
            patterns.collect::<Vec<_>>().join(", ")
        }

        match self {
            PointcutExpression::Within(patterns) => {
                write!(f, "within({})", join(patterns.iter().map(|p| p.as_str().to_string())))
            }
            PointcutExpression::Beans(patterns) => write!(
                f,
                "beans({})",
                join(patterns.iter().map(|p| match &p.method {
                    Some(method) => format!("{}.{}", p.bean.as_str(), method.as_str()),
                    None => p.bean.as_str().to_string(),
                }))
            ),
            PointcutExpression::Execution {
                type_pattern,
                method_pattern,
            } => write!(f, "execution({}.{})", type_pattern.as_str(), method_pattern.as_str()),
            PointcutExpression::And(l, r) => write!(f, "({} && {})", l, r),
            PointcutExpression::Or(l, r) => write!(f, "({} || {})", l, r),
            PointcutExpression::Not(e) => write!(f, "!{}", e),
        }
    }
}

/// 绑定到具体方法集合的通知
#[derive(Debug, Clone)]
pub struct BoundAdvice {
    pub advice: CompiledAdvice,
    pub methods: BTreeSet<MethodSignature>,
}

/// 切点 - 编译结果
///
/// 一个 Bean 对应一个切点，通知按全局声明顺序排列
#[derive(Debug, Clone)]
pub struct Pointcut {
    pub bean_name: String,
    pub target_type: TypeDescriptor,
    pub advice: Vec<BoundAdvice>,
}

impl Pointcut {
    pub fn new(bean_name: impl Into<String>, target_type: TypeDescriptor) -> Self {
        Self {
            bean_name: bean_name.into(),
            target_type,
            advice: Vec::new(),
        }
    }

    /// 追加一条通知及其匹配的方法
    pub fn bind(&mut self, advice: CompiledAdvice, methods: BTreeSet<MethodSignature>) {
        if !methods.is_empty() {
            self.advice.push(BoundAdvice { advice, methods });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.advice.is_empty()
    }

    /// 所有被拦截的方法
    pub fn matched_methods(&self) -> BTreeSet<MethodSignature> {
        self.advice
            .iter()
            .flat_map(|bound| bound.methods.iter().cloned())
            .collect()
    }

    pub fn matches(&self, method: &MethodSignature) -> bool {
        self.advice.iter().any(|bound| bound.methods.contains(method))
    }

    /// 某个方法的通知链
    pub fn chain_for(&self, method: &MethodSignature) -> AdviceChain {
        AdviceChain::new(
            self.advice
                .iter()
                .filter(|bound| bound.methods.contains(method))
                .map(|bound| bound.advice.clone()),
        )
    }

    /// 每个被拦截方法的通知链
    pub fn chains(&self) -> HashMap<MethodSignature, AdviceChain> {
        self.matched_methods()
            .into_iter()
            .map(|method| {
                let chain = self.chain_for(&method);
                (method, chain)
            })
            .collect()
    }
}

impl fmt::Display for Pointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.bean_name, self.target_type)?;
        for bound in &self.advice {
            let methods = bound
                .methods
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            write!(
                f,
                "\n  {} {} -> [{}]",
                bound.advice.location(),
                bound.advice.qualified_name(),
                methods
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::AdviceHandler;
    use spindle_core::{InterfaceDescriptor, MethodDescriptor};

    fn user_service() -> TypeDescriptor {
        TypeDescriptor::concrete("UserService")
            .in_module("app::service")
            .with_interface(InterfaceDescriptor::new("Users").with_method("get_user", 1))
            .with_method(MethodDescriptor::new("get_user", 1))
            .with_method(MethodDescriptor::new("delete_user", 1))
    }

    fn get_user() -> MethodSignature {
        MethodSignature::new("get_user", 1)
    }

    #[test]
    fn test_scope_pattern_wildcards() {
        assert!(ScopePattern::new("*").matches("anything"));
        assert!(ScopePattern::new("User*").matches("UserService"));
        assert!(ScopePattern::new("*Service").matches("UserService"));
        assert!(ScopePattern::new("*Serv*").matches("UserService"));
        assert!(!ScopePattern::new("Order*").matches("UserService"));
        assert!(ScopePattern::new("UserService").matches("UserService"));
        assert!(!ScopePattern::new("UserService").matches("UserServiceImpl"));
    }

    #[test]
    fn test_scope_pattern_escapes_literals() {
        assert!(ScopePattern::new("app::*").matches("app::service::UserService"));
        assert!(!ScopePattern::new("a.c*").matches("abc"));
    }

    #[test]
    fn test_within_matches_simple_or_qualified_name() {
        let descriptor = user_service();
        assert!(PointcutExpression::within(["UserService"]).matches("users", &descriptor, &get_user()));
        assert!(PointcutExpression::within(["app::service::*"]).matches("users", &descriptor, &get_user()));
        assert!(!PointcutExpression::within(["Order*", "Cart*"]).matches("users", &descriptor, &get_user()));
    }

    #[test]
    fn test_beans_with_method() {
        let descriptor = user_service();
        let expr = PointcutExpression::beans(["users.get_*"]);
        assert!(expr.matches("users", &descriptor, &get_user()));
        assert!(!expr.matches("users", &descriptor, &MethodSignature::new("delete_user", 1)));
        assert!(!expr.matches("orders", &descriptor, &get_user()));
    }

    #[test]
    fn test_execution_expression() {
        let descriptor = user_service();
        let expr = PointcutExpression::execution("* UserService.get_user(..)").unwrap();
        assert!(expr.matches("users", &descriptor, &get_user()));
        assert!(!expr.matches("users", &descriptor, &MethodSignature::new("delete_user", 1)));

        assert!(PointcutExpression::execution("*Service.*").is_ok());
        assert!(PointcutExpression::execution("no_dot").is_err());
    }

    #[test]
    fn test_combinators() {
        let descriptor = user_service();
        let expr = PointcutExpression::any().and(PointcutExpression::beans(["users.delete_*"]).not());
        assert!(expr.matches("users", &descriptor, &get_user()));
        assert!(!expr.matches("users", &descriptor, &MethodSignature::new("delete_user", 1)));
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            PointcutExpression::parse("within", &["*"]).unwrap(),
            PointcutExpression::any()
        );
        assert!(PointcutExpression::parse::<&str>("within", &[]).is_err());
        assert!(PointcutExpression::parse("annotation", &["Cached"]).is_err());

        let expr = PointcutExpression::parse("execution", &["A.x", "B.y"]).unwrap();
        assert!(matches!(expr, PointcutExpression::Or(_, _)));
    }

    #[test]
    fn test_referenced_beans_skips_wildcards() {
        let expr = PointcutExpression::beans(["repo.save", "cache*"]).or(PointcutExpression::beans(["greeter"]));
        assert_eq!(expr.referenced_beans(), vec!["repo", "greeter"]);
    }

    #[test]
    fn test_display() {
        assert_eq!(PointcutExpression::within(["*"]).to_string(), "within(*)");
        assert_eq!(
            PointcutExpression::beans(["repo.save"]).not().to_string(),
            "!beans(repo.save)"
        );
    }

    #[test]
    fn test_pointcut_chain_for_method() {
        let mut pointcut = Pointcut::new("users", user_service());
        let all: BTreeSet<_> = [get_user(), MethodSignature::new("delete_user", 1)].into_iter().collect();
        let only_get: BTreeSet<_> = [get_user()].into_iter().collect();

        pointcut.bind(CompiledAdvice::new("a", "first", AdviceHandler::before(|_| Ok(()))), all);
        pointcut.bind(CompiledAdvice::new("b", "second", AdviceHandler::before(|_| Ok(()))), only_get);
        pointcut.bind(
            CompiledAdvice::new("c", "unused", AdviceHandler::before(|_| Ok(()))),
            BTreeSet::new(),
        );

        assert_eq!(pointcut.advice.len(), 2);
        assert_eq!(pointcut.chain_for(&get_user()).len(), 2);
        assert_eq!(pointcut.chain_for(&MethodSignature::new("delete_user", 1)).len(), 1);
        assert!(!pointcut.matches(&MethodSignature::new("other", 0)));
        assert_eq!(pointcut.chains().len(), 2);
    }
}
