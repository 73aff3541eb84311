//! Storefront command-line client
//!
//! Drives the cart, catalog, account and order containers against the
//! storefront REST API. Cart and session survive between runs in the data
//! directory (`STOREFRONT_DATA_DIR`).
//!
//! # Usage
//!
//! ```bash
//! storefront products --brand nike
//! storefront add 66f1c0ffee --size 42
//! storefront login me@example.com --password secret
//! storefront checkout --address "1 Main St" --city Oslo --postal-code 0150 --country NO
//! storefront orders
//! ```

use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::process;
use std::sync::Arc;
use storefront::account::{LoginRequest, RegisterRequest};
use storefront::config::{DEFAULT_LOG_FILTER, SHUTDOWN_TIMEOUT};
use storefront::{
    AuthService, CartError, CartStore, Catalog, Config, FileStorage, HttpStorefrontApi, Notice,
    Order, OrderId, OrderStatus, OrderWorkflow, ProductId, RefreshScope, ShippingAddress, UserId,
};
use storefront_core::environment::KeyValueStorage;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "storefront", about = "Storefront client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show the cart
    Cart,
    /// Add a product to the cart
    Add(AddArgs),
    /// Take one unit of a line off the cart
    Decrease(LineArgs),
    /// Remove a line from the cart
    Remove(LineArgs),
    /// Empty the cart
    Clear,
    /// List products
    Products(ProductsArgs),
    /// Create an account and sign in
    Register(RegisterArgs),
    /// Sign in
    Login(LoginArgs),
    /// Sign out
    Logout,
    /// Place an order for the cart
    Checkout(CheckoutArgs),
    /// List orders
    Orders(OrdersArgs),
    /// Show one order
    Order {
        /// Order id
        id: String,
    },
    /// Cancel a Pending or Confirmed order
    Cancel {
        /// Order id
        id: String,
    },
    /// Move an order to its next status (admin)
    SetStatus {
        /// Order id
        id: String,
        /// New status
        status: OrderStatus,
    },
    /// Delete an order (admin)
    DeleteOrder {
        /// Order id
        id: String,
    },
    /// Set per-size stock of a product (admin)
    Restock(RestockArgs),
    /// List users (admin)
    Users,
    /// Delete a user (admin)
    DeleteUser {
        /// User id
        id: String,
    },
}

#[derive(Debug, Args)]
struct AddArgs {
    /// Product id
    product_id: String,

    /// Size to order
    #[arg(long, default_value = "")]
    size: String,

    /// Units to add
    #[arg(long, default_value_t = 1)]
    quantity: u32,
}

#[derive(Debug, Args)]
struct LineArgs {
    /// Product id
    product_id: String,

    /// Size of the line
    #[arg(long)]
    size: String,
}

#[derive(Debug, Args)]
struct ProductsArgs {
    /// Only this brand
    #[arg(long, conflicts_with_all = ["category", "featured"])]
    brand: Option<String>,

    /// Only this category
    #[arg(long, conflicts_with = "featured")]
    category: Option<String>,

    /// Only featured products
    #[arg(long)]
    featured: bool,
}

#[derive(Debug, Args)]
struct RegisterArgs {
    /// Account email
    email: String,

    /// Display name
    username: String,

    /// Password
    #[arg(long, env = "STOREFRONT_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Debug, Args)]
struct LoginArgs {
    /// Account email
    email: String,

    /// Password
    #[arg(long, env = "STOREFRONT_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Debug, Args)]
struct CheckoutArgs {
    /// Street address
    #[arg(long)]
    address: String,

    /// City
    #[arg(long)]
    city: String,

    /// Postal code
    #[arg(long)]
    postal_code: String,

    /// Country
    #[arg(long)]
    country: String,
}

#[derive(Debug, Args)]
struct OrdersArgs {
    /// Every order instead of your own (admin)
    #[arg(long)]
    all: bool,
}

#[derive(Debug, Args)]
struct RestockArgs {
    /// Product id
    product_id: String,

    /// Stock per size as SIZE=COUNT, e.g. 42=5
    #[arg(required = true, value_parser = parse_stock)]
    sizes: Vec<(String, u32)>,
}

fn parse_stock(value: &str) -> Result<(String, u32), String> {
    let (size, count) = value
        .split_once('=')
        .ok_or_else(|| format!("expected SIZE=COUNT, got '{value}'"))?;
    let count = count
        .trim()
        .parse()
        .map_err(|error| format!("invalid count in '{value}': {error}"))?;
    Ok((size.trim().to_string(), count))
}

/// Everything a command may need, built once per run
struct App {
    cart: CartStore,
    catalog: Catalog,
    orders: OrderWorkflow,
    auth: AuthService,
}

impl App {
    fn open(config: &Config) -> Result<Self, String> {
        let storage: Arc<dyn KeyValueStorage> = Arc::new(
            FileStorage::open(config.data_dir.clone())
                .map_err(|error| format!("failed to open data directory: {error}"))?,
        );
        let api = Arc::new(HttpStorefrontApi::new(
            config.api_url.clone(),
            Arc::clone(&storage),
        ));

        Ok(Self {
            cart: CartStore::hydrate(Arc::clone(&storage)),
            catalog: Catalog::new(api.clone(), config.response_timeout),
            orders: OrderWorkflow::new(api.clone(), config.response_timeout),
            auth: AuthService::new(api, storage),
        })
    }

    /// Let outstanding round trips finish before the process exits
    async fn shutdown(&self) {
        if let Err(error) = self.orders.shutdown(SHUTDOWN_TIMEOUT).await {
            tracing::warn!(%error, "Order requests still running at exit");
        }
        if let Err(error) = self.catalog.shutdown(SHUTDOWN_TIMEOUT).await {
            tracing::warn!(%error, "Catalog requests still running at exit");
        }
    }
}

#[tokio::main]
async fn main() {
    let _env = dotenvy::dotenv();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_new(&config.log_filter)
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let metrics = if config.print_metrics {
        storefront_runtime::metrics::install_recorder()
            .inspect_err(|error| tracing::warn!(%error, "Metrics disabled"))
            .ok()
    } else {
        None
    };

    let cli = Cli::parse();
    tracing::debug!(api_url = %config.api_url, data_dir = %config.data_dir.display(), "Configuration loaded");

    let notice = match App::open(&config) {
        Ok(mut app) => {
            let notice = run(&mut app, cli.command).await;
            app.shutdown().await;
            notice
        },
        Err(message) => Notice::error(message),
    };

    println!("{notice}");
    if let Some(handle) = metrics {
        eprint!("{}", handle.render());
    }
    if notice.is_error() {
        process::exit(1);
    }
}

async fn run(app: &mut App, command: Commands) -> Notice {
    match command {
        Commands::Cart => {
            print_cart(&app.cart);
            Notice::success(format!("{} item(s) in your cart", app.cart.item_count()))
        },
        Commands::Add(args) => add_to_cart(app, args).await,
        Commands::Decrease(args) => {
            let result = app.cart.decrease(&ProductId::new(args.product_id), &args.size);
            Notice::from_result(&result, "Cart updated")
        },
        Commands::Remove(args) => {
            let result = app.cart.remove(&ProductId::new(args.product_id), &args.size);
            Notice::from_result(&result, "Removed from cart")
        },
        Commands::Clear => Notice::from_result(&app.cart.clear(), "Cart cleared"),
        Commands::Products(args) => list_products(app, args).await,
        Commands::Register(args) => {
            let result = app
                .auth
                .register(RegisterRequest {
                    email: args.email,
                    username: args.username,
                    password: args.password,
                })
                .await;
            Notice::from_result(&result, "Welcome! Your account is ready")
        },
        Commands::Login(args) => {
            let result = app
                .auth
                .login(LoginRequest {
                    email: args.email,
                    password: args.password,
                })
                .await;
            Notice::from_result(&result, "Signed in")
        },
        Commands::Logout => {
            let result = app.auth.logout();
            if let Err(error) = app.orders.clear().await {
                tracing::warn!(%error, "Failed to clear order mirror");
            }
            Notice::from_result(&result, "Signed out")
        },
        Commands::Checkout(args) => {
            let address = ShippingAddress {
                address: args.address,
                city: args.city,
                postal_code: args.postal_code,
                country: args.country,
            };
            match storefront::checkout(&mut app.cart, &app.orders, address).await {
                Ok(order) => {
                    print_order(&order);
                    Notice::success("Order placed successfully!")
                },
                Err(error) => Notice::error(error.to_string()),
            }
        },
        Commands::Orders(args) => {
            let result = if args.all {
                app.orders.fetch_all_orders().await
            } else {
                app.orders.fetch_user_orders().await
            };
            match result {
                Ok(orders) => {
                    orders.iter().for_each(print_order);
                    Notice::success(format!("{} order(s)", orders.len()))
                },
                Err(error) => Notice::error(error.to_string()),
            }
        },
        Commands::Order { id } => match app.orders.fetch_order(OrderId::new(id)).await {
            Ok(order) => {
                print_order(&order);
                Notice::success(format!("Next statuses: {}", join_statuses(order.next_statuses())))
            },
            Err(error) => Notice::error(error.to_string()),
        },
        Commands::Cancel { id } => {
            // Load the mirror first so the Pending/Confirmed gate applies.
            let result = match app.orders.refresh(RefreshScope::MyOrders).await {
                Ok(()) => {
                    app.orders
                        .cancel_and_refresh(OrderId::new(id), RefreshScope::MyOrders)
                        .await
                },
                Err(error) => Err(error),
            };
            Notice::from_result(&result, "Order cancelled!")
        },
        Commands::SetStatus { id, status } => {
            let result = match app.orders.refresh(RefreshScope::AllOrders).await {
                Ok(()) => {
                    app.orders
                        .update_status_and_refresh(OrderId::new(id), status)
                        .await
                },
                Err(error) => Err(error),
            };
            Notice::from_result(&result, "Order status updated!")
        },
        Commands::DeleteOrder { id } => {
            let result = app.orders.delete_and_refresh(OrderId::new(id)).await;
            Notice::from_result(&result, "Order deleted")
        },
        Commands::Restock(args) => {
            let sizes: BTreeMap<String, u32> = args.sizes.into_iter().collect();
            let result = app
                .catalog
                .restock_product(ProductId::new(args.product_id), sizes)
                .await;
            catalog_notice(app, result, "Product restocked").await
        },
        Commands::Users => match app.auth.fetch_all_users().await {
            Ok(users) => {
                for user in &users {
                    let role = if user.is_admin { "admin" } else { "customer" };
                    println!("{}  {:<20} {:<30} {role}", user.id, user.username, user.email);
                }
                Notice::success(format!("{} user(s)", users.len()))
            },
            Err(error) => Notice::error(error.to_string()),
        },
        Commands::DeleteUser { id } => {
            let result = app.auth.delete_user(UserId::new(id)).await;
            Notice::from_result(&result, "User deleted")
        },
    }
}

async fn add_to_cart(app: &mut App, args: AddArgs) -> Notice {
    if args.quantity == 0 {
        return Notice::error(CartError::InvalidQuantity.to_string());
    }
    if let Err(error) = app.catalog.fetch_product(ProductId::new(args.product_id)).await {
        return Notice::error(error.to_string());
    }
    if let Some(message) = app.catalog.error().await {
        return Notice::error(message);
    }
    let Some(product) = app.catalog.product().await else {
        return Notice::error("Product not found");
    };

    match product.to_cart_line(&args.size) {
        Ok(mut line) => {
            line.quantity = args.quantity;
            Notice::from_result(&app.cart.add(line), "Successfully added to cart!")
        },
        Err(error) => Notice::error(error.to_string()),
    }
}

async fn list_products(app: &App, args: ProductsArgs) -> Notice {
    let result = if let Some(brand) = &args.brand {
        app.catalog.fetch_products_by_brand(brand).await
    } else if let Some(category) = &args.category {
        app.catalog.fetch_products_by_category(category).await
    } else if args.featured {
        app.catalog.fetch_featured_products().await
    } else {
        app.catalog.fetch_products().await
    };

    let notice = catalog_notice(app, result, "").await;
    if notice.is_error() {
        return notice;
    }

    let products = app.catalog.products().await;
    for product in &products {
        let sizes: Vec<String> = product
            .sizes
            .iter()
            .filter(|(_, stock)| **stock > 0)
            .map(|(size, _)| size.clone())
            .collect();
        println!(
            "{}  {:<30} {:>10.2}  sizes: {}",
            product.id,
            product.name,
            product.price,
            sizes.join(", ")
        );
    }
    Notice::success(format!("{} product(s)", products.len()))
}

async fn catalog_notice<E: std::fmt::Display>(
    app: &App,
    result: Result<(), E>,
    success_message: &str,
) -> Notice {
    if let Err(error) = result {
        return Notice::error(error.to_string());
    }
    match app.catalog.error().await {
        Some(message) => Notice::error(message),
        None => Notice::success(success_message),
    }
}

fn print_cart(cart: &CartStore) {
    for line in cart.lines() {
        println!(
            "{}  {:<30} size {:<4} x{:<3} {:>10.2}",
            line.product_id,
            line.name,
            line.size,
            line.quantity,
            line.subtotal()
        );
    }
    println!("Total: {:.2}", cart.total());
}

fn print_order(order: &Order) {
    println!(
        "{}  {:<10} {:>10.2}  {} item(s)  placed {}",
        order.id,
        order.order_status,
        order.total_price,
        order.order_items.len(),
        order.created_at.format("%Y-%m-%d")
    );
}

fn join_statuses(statuses: &[OrderStatus]) -> String {
    if statuses.is_empty() {
        return "none".to_string();
    }
    statuses
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
