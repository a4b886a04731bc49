use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use spindle_aop::prelude::*;
use spindle_aop_macros::{advisable, aspect};
use spindle_core::EnvironmentPropertySource;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ==================== 业务 Bean ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub sku: String,
    pub stock: u32,
}

/// 商品仓库 - 查询结果被缓存，写入时清空缓存
#[derive(Default)]
pub struct InventoryRepository {
    products: RwLock<HashMap<String, Product>>,
    queries: AtomicU64,
}

#[advisable(interface = "Inventory")]
impl InventoryRepository {
    #[cacheable("products")]
    pub fn find(&self, sku: &str) -> Option<Product> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.products.read().get(sku).cloned()
    }

    #[cache_evict("products")]
    pub fn restock(&self, sku: &str, stock: u32) -> Result<Product, String> {
        let product = Product {
            sku: sku.to_string(),
            stock,
        };
        if sku.is_empty() {
            return Err("sku must not be empty".to_string());
        }
        self.products.write().insert(product.sku.clone(), product.clone());
        Ok(product)
    }

    #[internal]
    pub fn queries(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }
}

/// 订单服务 - 密封类型，只能通过接口代理
pub struct OrderService;

#[advisable(kind = "sealed", interface = "Orders")]
impl OrderService {
    pub fn place(&self, sku: String, quantity: u32) -> Result<String, String> {
        if quantity == 0 {
            return Err("quantity must be positive".to_string());
        }
        Ok(format!("order: {} x{}", sku, quantity))
    }
}

// ==================== 切面 ====================

/// 审计切面 - 通过组件扫描自动加入
#[derive(Clone, Default)]
pub struct AuditAspect;

#[aspect(scan)]
impl AuditAspect {
    #[before("within(*Service)")]
    fn audit(&self, jp: &JoinPoint) -> Result<(), InvocationError> {
        tracing::info!("🔍 audit {} args={:?}", jp, jp.args);
        Ok(())
    }

    #[after("execution(* OrderService.place(..))")]
    fn report(&self, jp: &JoinPoint, outcome: &InvocationResult) -> Result<(), InvocationError> {
        if let Err(e) = outcome {
            tracing::warn!("order rejected in {}: {}", jp, e);
        }
        Ok(())
    }
}

// ==================== 主程序 ====================

fn main() -> anyhow::Result<()> {
    // 查找配置文件
    let config_file = ["demos/app-demo/application.toml", "application.toml"]
        .into_iter()
        .find(|path| std::path::Path::new(path).exists());

    let environment =
        Environment::new().with_property_source(Box::new(EnvironmentPropertySource::new("APP_")));
    if let Some(path) = config_file {
        environment.add_property_source(Box::new(TomlPropertySource::from_file(path)?));
    }

    LoggingConfig::from_environment(&environment).init()?;
    let app_name = environment.get_string("app.name").unwrap_or_else(|| "spindle".into());
    tracing::info!("Starting {}", app_name);

    let factory = DefaultListableBeanFactory::new();
    factory.register_singleton("inventory", || Ok(InventoryRepository::default()))?;
    factory.register_singleton("orders", || Ok(OrderService))?;

    let context = AopContext::from_environment(Arc::new(factory), &environment);
    context.register_aspect(
        LoggingAspect::new()
            .with_args()
            .with_result()
            .definition(PointcutExpression::beans(["inventory"])),
    );
    context.register_aspect(PerformanceAspect::new(50).definition(PointcutExpression::any()));

    let report = context.post_process()?;
    tracing::info!("Weave report: {}", serde_json::to_string(report)?);

    let inventory = context.load_bean("inventory")?;
    let orders = context.load_bean("orders")?;

    inventory.invoke("restock", &[json!("pen"), json!(12)])?;
    for _ in 0..3 {
        let product: Option<Product> = inventory.call("find", &[json!("pen")])?;
        tracing::info!("Found {:?}", product);
    }

    let placed: String = orders.call("place", &[json!("pen"), json!(2)])?;
    tracing::info!("{}", placed);

    if let Err(e) = orders.invoke("place", &[json!("pen"), json!(0)]) {
        tracing::info!("Order failed as expected: {}", e);
    }

    let queries: u64 = inventory.call("queries", &[]).unwrap_or_default();
    let stats = context.method_cache().stats();
    tracing::info!(
        "Repository queried {} time(s); cache hits={} misses={} entries={}",
        queries,
        stats.hits,
        stats.misses,
        stats.entries
    );
    Ok(())
}
