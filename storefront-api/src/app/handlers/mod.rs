mod auth;
mod health;
mod products;
mod users;

pub use auth::{
    change_password, forgot_password, get_me, login, login_activity, make_admin, register,
    resend_verification, reset_password, update_permissions, verify_email,
};
pub use health::{handler_404, health};
pub use products::{
    create_product, delete_product, get_product, get_product_by_sku, list_products,
    update_product, update_stock,
};
pub use users::{create_user, delete_user, get_user, list_users, update_user};
