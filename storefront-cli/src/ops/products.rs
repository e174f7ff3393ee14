//! 商品 CLI 操作

use super::ui::{
    format_flag, format_time, print_empty, print_header, print_kv, print_success,
    print_table_header, print_table_row,
};
use super::OutputFormat;
use crate::client::{read_envelope, Envelope};
use crossterm::style::Stylize;
use reqwest::Client;
use storefront_core::{CreateProductRequest, Product, UpdateProductRequest};

fn print_product(title: &str, product: &Product) {
    print_header(title);
    print_kv("ID", &product.id.to_string());
    print_kv("Name", &product.name.as_str().cyan().to_string());
    print_kv("SKU", &product.sku);
    print_kv("Price", &format!("{:.2}", product.price));
    print_kv("Stock", &product.stock_quantity.to_string());
    print_kv("Category", product.category.as_deref().unwrap_or("-"));
    print_kv("Active", &format_flag(product.is_active, "yes", "no"));
    if let Some(description) = &product.description {
        print_kv("Description", description);
    }
    print_kv("Created", &format_time(&product.created_at));
    println!();
}

fn report(output: OutputFormat, env: Envelope<Product>, title: &str) -> anyhow::Result<()> {
    if output.emit_json(&env.data)? {
        return Ok(());
    }
    if let Some(message) = &env.message {
        print_success(message);
    }
    print_product(title, &env.data);
    Ok(())
}

/// 商品列表，可按分类过滤
pub async fn list_products(
    client: &Client,
    base: &str,
    category: Option<&str>,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let url = format!("{}/api/products", base);
    let mut req = client.get(&url);
    if let Some(category) = category {
        req = req.query(&[("category", category)]);
    }
    let env: Envelope<Vec<Product>> = read_envelope(req.send().await?).await?;

    if output.emit_json(&env.data)? {
        return Ok(());
    }
    print_header("📦 Products");
    if env.data.is_empty() {
        print_empty("no products");
        return Ok(());
    }
    let widths = [6, 14, 28, 10, 7, 16];
    print_table_header(&[
        ("ID", widths[0]),
        ("SKU", widths[1]),
        ("NAME", widths[2]),
        ("PRICE", widths[3]),
        ("STOCK", widths[4]),
        ("CATEGORY", widths[5]),
    ]);
    for p in env.data {
        let id = p.id.to_string();
        let price = format!("{:.2}", p.price);
        let stock = p.stock_quantity.to_string();
        print_table_row(&[
            (&id, widths[0]),
            (&p.sku, widths[1]),
            (&p.name, widths[2]),
            (&price, widths[3]),
            (&stock, widths[4]),
            (p.category.as_deref().unwrap_or("-"), widths[5]),
        ]);
    }
    println!();
    Ok(())
}

pub async fn get_product(
    client: &Client,
    base: &str,
    id: i64,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let url = format!("{}/api/products/{}", base, id);
    let env = read_envelope(client.get(&url).send().await?).await?;
    report(output, env, &format!("📦 Product #{}", id))
}

pub async fn get_product_by_sku(
    client: &Client,
    base: &str,
    sku: &str,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let url = format!("{}/api/products/sku/{}", base, sku);
    let env = read_envelope(client.get(&url).send().await?).await?;
    report(output, env, &format!("📦 {}", sku))
}

pub async fn create_product(
    client: &Client,
    base: &str,
    product: CreateProductRequest,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let url = format!("{}/api/products", base);
    let env = read_envelope(client.post(&url).json(&product).send().await?).await?;
    report(output, env, "📦 Product created")
}

pub async fn update_product(
    client: &Client,
    base: &str,
    id: i64,
    changes: UpdateProductRequest,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let url = format!("{}/api/products/{}", base, id);
    let env = read_envelope(client.put(&url).json(&changes).send().await?).await?;
    report(output, env, &format!("📦 Product #{}", id))
}

/// 设置库存（请求体为裸整数）
pub async fn update_stock(
    client: &Client,
    base: &str,
    id: i64,
    quantity: i64,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let url = format!("{}/api/products/{}/stock", base, id);
    let env = read_envelope(client.patch(&url).json(&quantity).send().await?).await?;
    report(output, env, &format!("📦 Product #{}", id))
}

pub async fn delete_product(client: &Client, base: &str, id: i64) -> anyhow::Result<()> {
    let url = format!("{}/api/products/{}", base, id);
    let env: Envelope<bool> = read_envelope(client.delete(&url).send().await?).await?;
    print_success(env.message.as_deref().unwrap_or("Product deleted"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_update_sends_only_given_fields() {
        let changes = UpdateProductRequest {
            price: Some(12.5),
            is_active: Some(false),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&changes).unwrap(),
            serde_json::json!({ "price": 12.5, "isActive": false })
        );
    }
}
