mod auth;
mod output;
mod products;
mod ui;
mod users;

pub use auth::{
    change_password, forgot_password, login, login_activity, me, register, resend_verification,
    reset_password, verify_email,
};
pub use output::OutputFormat;
pub use products::{
    create_product, delete_product, get_product, get_product_by_sku, list_products,
    update_product, update_stock,
};
pub use users::{
    create_user, delete_user, get_user, list_users, make_admin, set_permissions, update_user,
};
