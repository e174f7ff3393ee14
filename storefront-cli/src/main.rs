mod client;
mod ops;

use clap::{Parser, Subcommand};
use ops::{
    change_password, create_product, create_user, delete_product, delete_user, forgot_password,
    get_product, get_product_by_sku, get_user, list_products, list_users, login, login_activity,
    make_admin, me, register, resend_verification, reset_password, set_permissions,
    update_product, update_stock, update_user, verify_email, OutputFormat,
};
use storefront_core::{
    CreateProductRequest, CreateUserRequest, RegisterRequest, UpdateProductRequest,
    UpdateUserRequest,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI wrapper around the Storefront HTTP API.
#[derive(Parser)]
#[command(
    name = "storefront-cli",
    author,
    version,
    about = "CLI for Storefront API"
)]
struct Cli {
    /// API base url
    #[arg(long, env = "SF_API_BASE", default_value = "http://127.0.0.1:8080")]
    api_base: String,

    /// 以该用户身份调用（X-User-Id）
    #[arg(long, env = "SF_USER_ID")]
    user_id: Option<i64>,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    // ==================== 认证 ====================
    /// 注册新账号
    Register {
        #[arg(long, short)]
        email: String,
        #[arg(long, short)]
        password: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    /// 登录
    Login {
        #[arg(long, short)]
        email: String,
        #[arg(long, short)]
        password: String,
    },
    /// 使用 token 验证邮箱
    Verify { token: String },
    /// 重新发送验证邮件
    ResendVerification {
        #[arg(long, short)]
        email: String,
    },
    /// 申请重置密码
    ForgotPassword {
        #[arg(long, short)]
        email: String,
    },
    /// 使用重置 token 设置新密码
    ResetPassword {
        token: String,
        #[arg(long, short)]
        password: String,
    },
    /// 修改当前用户密码（需要 --user-id）
    ChangePassword {
        #[arg(long)]
        current: String,
        #[arg(long, short)]
        password: String,
    },
    /// 最近登录记录，默认当前用户
    Activity { id: Option<i64> },
    /// 当前用户资料
    Me,

    // ==================== 用户管理 ====================
    /// 用户管理命令
    #[command(subcommand)]
    User(UserCommands),

    // ==================== 商品 ====================
    /// 商品管理命令
    #[command(subcommand)]
    Product(ProductCommands),
}

#[derive(Subcommand)]
enum UserCommands {
    /// 列出所有用户
    List,
    /// 获取用户详情
    Get { id: i64 },
    /// 创建用户（邮箱视为已验证）
    Create {
        #[arg(long, short)]
        email: String,
        #[arg(long, short)]
        password: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        /// 初始权限位（仅管理员可指定），缺省为无权限
        #[arg(long)]
        permissions: Option<i64>,
    },
    /// 更新用户
    Update {
        id: i64,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        active: Option<bool>,
        #[arg(long)]
        password: Option<String>,
    },
    /// 删除用户
    Delete { id: i64 },
    /// 覆盖权限位（管理员）
    Permissions { id: i64, permissions: i64 },
    /// 提升为管理员
    MakeAdmin { id: i64 },
}

#[derive(Subcommand)]
enum ProductCommands {
    /// 商品列表
    List {
        #[arg(long, short)]
        category: Option<String>,
    },
    /// 按 ID 获取
    Get { id: i64 },
    /// 按 SKU 获取
    Sku { sku: String },
    /// 创建商品
    Create {
        #[arg(long, short)]
        name: String,
        #[arg(long, short)]
        sku: String,
        #[arg(long)]
        price: f64,
        #[arg(long, default_value_t = 0)]
        stock: i64,
        #[arg(long, short)]
        category: Option<String>,
        #[arg(long, short)]
        description: Option<String>,
    },
    /// 更新商品
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        price: Option<f64>,
        #[arg(long)]
        stock: Option<i64>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        active: Option<bool>,
    },
    /// 删除商品
    Delete { id: i64 },
    /// 设置库存
    Stock { id: i64, quantity: i64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载 .env 文件（如果存在），忽略错误
    let _ = dotenvy::dotenv();
    init_tracing();
    let cli = Cli::parse();
    tracing::debug!(api_base = %cli.api_base, user_id = ?cli.user_id, "storefront-cli");
    let client = client::build_client(cli.user_id)?;
    let base = cli.api_base.as_str();
    let output = cli.output;

    match cli.command {
        // 认证命令
        Commands::Register {
            email,
            password,
            first_name,
            last_name,
        } => {
            let req = RegisterRequest {
                email,
                confirm_password: password.clone(),
                password,
                first_name,
                last_name,
            };
            register(&client, base, req, output).await?
        }
        Commands::Login { email, password } => {
            login(&client, base, &email, &password, output).await?
        }
        Commands::Verify { token } => verify_email(&client, base, &token, output).await?,
        Commands::ResendVerification { email } => {
            resend_verification(&client, base, &email, output).await?
        }
        Commands::ForgotPassword { email } => {
            forgot_password(&client, base, &email, output).await?
        }
        Commands::ResetPassword { token, password } => {
            reset_password(&client, base, &token, &password).await?
        }
        Commands::ChangePassword { current, password } => {
            let id = require_caller(cli.user_id)?;
            change_password(&client, base, id, &current, &password).await?
        }
        Commands::Activity { id } => {
            let id = match id {
                Some(id) => id,
                None => require_caller(cli.user_id)?,
            };
            login_activity(&client, base, id, output).await?
        }
        Commands::Me => me(&client, base, output).await?,

        // 用户管理命令
        Commands::User(user_cmd) => match user_cmd {
            UserCommands::List => list_users(&client, base, output).await?,
            UserCommands::Get { id } => get_user(&client, base, id, output).await?,
            UserCommands::Create {
                email,
                password,
                first_name,
                last_name,
                permissions,
            } => {
                let user = CreateUserRequest {
                    email,
                    password,
                    first_name,
                    last_name,
                    permissions,
                };
                create_user(&client, base, user, output).await?
            }
            UserCommands::Update {
                id,
                email,
                first_name,
                last_name,
                active,
                password,
            } => {
                let changes = UpdateUserRequest {
                    email,
                    first_name,
                    last_name,
                    is_active: active,
                    password,
                };
                update_user(&client, base, id, changes, output).await?
            }
            UserCommands::Delete { id } => delete_user(&client, base, id).await?,
            UserCommands::Permissions { id, permissions } => {
                set_permissions(&client, base, id, permissions, output).await?
            }
            UserCommands::MakeAdmin { id } => make_admin(&client, base, id, output).await?,
        },

        // 商品命令
        Commands::Product(product_cmd) => match product_cmd {
            ProductCommands::List { category } => {
                list_products(&client, base, category.as_deref(), output).await?
            }
            ProductCommands::Get { id } => get_product(&client, base, id, output).await?,
            ProductCommands::Sku { sku } => {
                get_product_by_sku(&client, base, &sku, output).await?
            }
            ProductCommands::Create {
                name,
                sku,
                price,
                stock,
                category,
                description,
            } => {
                let product = CreateProductRequest {
                    name,
                    description,
                    price,
                    sku,
                    stock_quantity: stock,
                    category,
                };
                create_product(&client, base, product, output).await?
            }
            ProductCommands::Update {
                id,
                name,
                price,
                stock,
                category,
                description,
                active,
            } => {
                let changes = UpdateProductRequest {
                    name,
                    description,
                    price,
                    stock_quantity: stock,
                    category,
                    is_active: active,
                };
                update_product(&client, base, id, changes, output).await?
            }
            ProductCommands::Delete { id } => delete_product(&client, base, id).await?,
            ProductCommands::Stock { id, quantity } => {
                update_stock(&client, base, id, quantity, output).await?
            }
        },
    }

    Ok(())
}

fn require_caller(user_id: Option<i64>) -> anyhow::Result<i64> {
    user_id.ok_or_else(|| anyhow::anyhow!("请通过 --user-id 或 SF_USER_ID 指定当前用户"))
}

fn init_tracing() {
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clap_parses() {
        let args = ["sf", "product", "list", "--category", "books"];
        let _ = Cli::parse_from(&args);
    }

    #[test]
    fn caller_flag_is_global_option() {
        let cli = Cli::parse_from(["sf", "--user-id", "7", "activity"]);
        assert_eq!(cli.user_id, Some(7));
        assert!(matches!(cli.command, Commands::Activity { id: None }));
    }

    #[test]
    fn change_password_requires_caller() {
        assert!(require_caller(None).is_err());
        assert_eq!(require_caller(Some(3)).unwrap(), 3);
    }
}
