//! 商品管理器

use super::models::*;
use crate::error::{Result, ServiceError};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, instrument};
use validator::Validate;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        price REAL NOT NULL,
        sku TEXT NOT NULL UNIQUE,
        stock_quantity INTEGER NOT NULL DEFAULT 0,
        category TEXT,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS ix_products_category ON products (category)",
];

/// 保留两位小数；溢出为非有限值时拒绝
fn round_price(price: f64) -> Result<f64> {
    let rounded = (price * 100.0).round() / 100.0;
    if !rounded.is_finite() {
        return Err(ServiceError::Validation(
            "Price must be between 0.01 and 9999999999999999.99".into(),
        ));
    }
    Ok(rounded)
}

#[derive(Debug, Clone)]
pub struct ProductManager {
    pool: SqlitePool,
}

impl ProductManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// 列出商品，可按分类精确过滤（空字符串视为不过滤）
    #[instrument(skip(self))]
    pub async fn list(&self, category: Option<&str>) -> Result<Vec<Product>> {
        let products = match category.filter(|c| !c.is_empty()) {
            Some(category) => {
                sqlx::query_as::<_, Product>(
                    "SELECT * FROM products WHERE category = ? ORDER BY id",
                )
                .bind(category)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(products)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<Product> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(ServiceError::product_not_found)
    }

    #[instrument(skip(self))]
    pub async fn get_by_sku(&self, sku: &str) -> Result<Product> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE sku = ?")
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(ServiceError::product_not_found)
    }

    #[instrument(skip(self, req), fields(sku = %req.sku))]
    pub async fn create(&self, req: CreateProductRequest) -> Result<Product> {
        req.validate()?;
        let price = round_price(req.price)?;

        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE sku = ?")
            .bind(&req.sku)
            .fetch_one(&self.pool)
            .await?;
        if exists > 0 {
            return Err(ServiceError::AlreadyExists("SKU already exists".into()));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO products (name, description, price, sku, stock_quantity, category,
                                  is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(&req.name)
        .bind(&req.description)
        .bind(price)
        .bind(&req.sku)
        .bind(req.stock_quantity)
        .bind(&req.category)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| ServiceError::unique_violation(e, "SKU already exists"))?;

        let product = self.get(result.last_insert_rowid()).await?;
        info!(product_id = product.id, sku = %product.sku, "created product");
        Ok(product)
    }

    /// 只修改请求中提供的字段
    #[instrument(skip(self, req))]
    pub async fn update(&self, id: i64, req: UpdateProductRequest) -> Result<Product> {
        req.validate()?;
        let mut product = self.get(id).await?;

        if let Some(name) = req.name {
            product.name = name;
        }
        if let Some(description) = req.description {
            product.description = Some(description);
        }
        if let Some(price) = req.price {
            product.price = round_price(price)?;
        }
        if let Some(stock) = req.stock_quantity {
            product.stock_quantity = stock;
        }
        if let Some(category) = req.category {
            product.category = Some(category);
        }
        if let Some(is_active) = req.is_active {
            product.is_active = is_active;
        }

        sqlx::query(
            r#"
            UPDATE products
            SET name = ?, description = ?, price = ?, stock_quantity = ?, category = ?,
                is_active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.stock_quantity)
        .bind(&product.category)
        .bind(product.is_active)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        info!(product_id = id, "updated product");
        self.get(id).await
    }

    #[instrument(skip(self))]
    pub async fn update_stock(&self, id: i64, quantity: i64) -> Result<Product> {
        if quantity < 0 {
            return Err(ServiceError::Validation(
                "Stock quantity cannot be negative".into(),
            ));
        }
        let result =
            sqlx::query("UPDATE products SET stock_quantity = ?, updated_at = ? WHERE id = ?")
                .bind(quantity)
                .bind(Utc::now())
                .bind(id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::product_not_found());
        }

        info!(product_id = id, quantity, "updated stock");
        self.get(id).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::product_not_found());
        }
        info!(product_id = id, "deleted product");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn manager() -> ProductManager {
        let products = ProductManager::new(crate::db::memory().await.unwrap());
        products.ensure_schema().await.unwrap();
        products
    }

    fn widget(sku: &str, category: Option<&str>) -> CreateProductRequest {
        CreateProductRequest {
            name: format!("Widget {}", sku),
            description: Some("A widget".into()),
            price: 19.999,
            sku: sku.into(),
            stock_quantity: 5,
            category: category.map(Into::into),
        }
    }

    #[tokio::test]
    async fn create_and_lookup() {
        let products = manager().await;
        let created = products.create(widget("W-1", Some("tools"))).await.unwrap();
        assert_eq!(created.price, 20.0);
        assert!(created.is_active);
        assert!(created.updated_at.is_none());

        assert_eq!(products.get(created.id).await.unwrap(), created);
        assert_eq!(products.get_by_sku("W-1").await.unwrap().id, created.id);
        assert!(matches!(
            products.get_by_sku("missing").await.unwrap_err(),
            ServiceError::NotFound(m) if m == "Product not found"
        ));
    }

    #[tokio::test]
    async fn duplicate_sku_is_rejected() {
        let products = manager().await;
        products.create(widget("W-1", None)).await.unwrap();
        let err = products.create(widget("W-1", None)).await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists(m) if m == "SKU already exists"));
    }

    #[tokio::test]
    async fn create_validates_fields() {
        let products = manager().await;
        let mut req = widget("W-2", None);
        req.price = 0.0;
        assert!(matches!(
            products.create(req).await.unwrap_err(),
            ServiceError::Validation(m) if m.starts_with("Price must be between 0.01")
        ));

        let mut req = widget("W-3", None);
        req.stock_quantity = -1;
        assert!(products.create(req).await.is_err());

        let mut req = widget("W-4", None);
        req.name = "n".repeat(201);
        assert!(products.create(req).await.is_err());
    }

    #[tokio::test]
    async fn oversized_price_is_rejected() {
        let products = manager().await;
        let mut req = widget("BIG-1", None);
        req.price = 1e308;
        assert!(matches!(
            products.create(req).await.unwrap_err(),
            ServiceError::Validation(_)
        ));
        assert!(products.get_by_sku("BIG-1").await.is_err());

        let created = products.create(widget("BIG-2", None)).await.unwrap();
        let err = products
            .update(
                created.id,
                UpdateProductRequest {
                    price: Some(f64::MAX),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(products.get(created.id).await.unwrap().price, 20.0);
    }

    #[test]
    fn round_price_rejects_overflow() {
        assert_eq!(round_price(12.346).unwrap(), 12.35);
        assert!(round_price(1e307).is_err());
    }

    #[tokio::test]
    async fn list_filters_by_category() {
        let products = manager().await;
        products.create(widget("A", Some("tools"))).await.unwrap();
        products.create(widget("B", Some("toys"))).await.unwrap();
        products.create(widget("C", Some("tools"))).await.unwrap();

        assert_eq!(products.list(None).await.unwrap().len(), 3);
        assert_eq!(products.list(Some("")).await.unwrap().len(), 3);
        let tools = products.list(Some("tools")).await.unwrap();
        assert_eq!(
            tools.iter().map(|p| p.sku.as_str()).collect::<Vec<_>>(),
            vec!["A", "C"]
        );
    }

    #[tokio::test]
    async fn partial_update_keeps_other_fields() {
        let products = manager().await;
        let created = products.create(widget("P-1", Some("tools"))).await.unwrap();

        let updated = products
            .update(
                created.id,
                UpdateProductRequest {
                    price: Some(5.5),
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price, 5.5);
        assert!(!updated.is_active);
        assert_eq!(updated.name, created.name);
        assert_eq!(updated.category, created.category);
        assert!(updated.updated_at.is_some());

        let err = products
            .update(
                created.id,
                UpdateProductRequest {
                    stock_quantity: Some(-3),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(products
            .update(999, UpdateProductRequest::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn stock_and_delete() {
        let products = manager().await;
        let created = products.create(widget("S-1", None)).await.unwrap();

        assert_eq!(products.update_stock(created.id, 42).await.unwrap().stock_quantity, 42);
        assert!(matches!(
            products.update_stock(created.id, -1).await.unwrap_err(),
            ServiceError::Validation(_)
        ));
        assert!(matches!(
            products.update_stock(999, 1).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));

        products.delete(created.id).await.unwrap();
        assert!(products.get(created.id).await.is_err());
        assert!(products.delete(created.id).await.is_err());
    }
}
