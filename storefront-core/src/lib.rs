//! Core library for the storefront backend: user accounts, permissions, and the product catalog.

pub mod db;
mod error;
pub mod notify;
pub mod product;
pub mod user;

pub use error::{Result, ServiceError};
pub use notify::{Message, MessageKind, Notifier};
pub use product::{CreateProductRequest, Product, ProductManager, ProductQuery, UpdateProductRequest};
pub use user::{
    AuthResponse, ChangePasswordRequest, ClientContext, CreateUserRequest, EmailRequest,
    LoginActivity, LoginRequest, Permissions, RegisterRequest, ResetPasswordRequest, Role,
    UpdatePermissionsRequest, UpdateUserRequest, User, UserManager, UserResponse,
};
