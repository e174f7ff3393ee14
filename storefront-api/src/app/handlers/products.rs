//! 商品 API handlers

use axum::extract::State;
use axum::http::StatusCode;
use storefront_core::{
    CreateProductRequest, Permissions, Product, ProductQuery, UpdateProductRequest,
};

use super::super::error::ApiError;
use super::super::extract::{ApiJson, ApiPath, ApiQuery};
use super::super::middleware::RequireUser;
use super::super::response::ApiResponse;
use super::super::state::AppState;

/// GET /api/products?category= - 商品列表（匿名可读）
pub async fn list_products(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> Result<ApiResponse<Vec<Product>>, ApiError> {
    let products = state
        .product_manager
        .list(query.category.as_deref())
        .await?;
    Ok(ApiResponse::ok(products))
}

/// GET /api/products/:id
pub async fn get_product(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<ApiResponse<Product>, ApiError> {
    let product = state.product_manager.get(id).await?;
    Ok(ApiResponse::ok(product))
}

/// GET /api/products/sku/:sku
pub async fn get_product_by_sku(
    State(state): State<AppState>,
    ApiPath(sku): ApiPath<String>,
) -> Result<ApiResponse<Product>, ApiError> {
    let product = state.product_manager.get_by_sku(&sku).await?;
    Ok(ApiResponse::ok(product))
}

/// POST /api/products
pub async fn create_product(
    State(state): State<AppState>,
    RequireUser(auth): RequireUser,
    ApiJson(req): ApiJson<CreateProductRequest>,
) -> Result<(StatusCode, ApiResponse<Product>), ApiError> {
    auth.require(Permissions::EDIT_PRODUCTS)?;
    let product = state.product_manager.create(req).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(product, "Product created successfully"),
    ))
}

/// PUT /api/products/:id
pub async fn update_product(
    State(state): State<AppState>,
    RequireUser(auth): RequireUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateProductRequest>,
) -> Result<ApiResponse<Product>, ApiError> {
    auth.require(Permissions::EDIT_PRODUCTS)?;
    let product = state.product_manager.update(id, req).await?;
    Ok(ApiResponse::with_message(
        product,
        "Product updated successfully",
    ))
}

/// PATCH /api/products/:id/stock - 请求体为裸整数
pub async fn update_stock(
    State(state): State<AppState>,
    RequireUser(auth): RequireUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(quantity): ApiJson<i64>,
) -> Result<ApiResponse<Product>, ApiError> {
    auth.require(Permissions::EDIT_PRODUCTS)?;
    let product = state.product_manager.update_stock(id, quantity).await?;
    Ok(ApiResponse::with_message(product, "Stock updated successfully"))
}

/// DELETE /api/products/:id
pub async fn delete_product(
    State(state): State<AppState>,
    RequireUser(auth): RequireUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<ApiResponse<bool>, ApiError> {
    auth.require(Permissions::DELETE_PRODUCTS)?;
    state.product_manager.delete(id).await?;
    Ok(ApiResponse::with_message(true, "Product deleted successfully"))
}
