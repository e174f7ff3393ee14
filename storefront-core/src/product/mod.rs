//! 商品服务：商品目录 CRUD 与库存

mod manager;
mod models;

pub use manager::ProductManager;
pub use models::{CreateProductRequest, Product, ProductQuery, UpdateProductRequest};
