use std::{collections::HashMap, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use uuid::Uuid;

use salonpro_api::{
    auth::{AuthConfig, AuthService},
    client::{Cart, StorefrontClient},
    entities::order::{PaymentMethod, ShippingMethod},
    gateway::mock::MockProvider,
    services::{
        checkout::{VerificationStatus, VerifyPaymentRequest},
        orders::ShippingAddress,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Products(args) => handle_products(args, cli.json).await,
        Commands::Agents(args) => handle_agents(args, cli.json).await,
        Commands::Checkout(args) => handle_checkout(args, cli.json).await,
        Commands::Orders(command) => handle_orders_command(command, cli.json).await,
        Commands::Verify(args) => handle_verify(args, cli.json).await,
    }
}

#[derive(Parser)]
#[command(
    name = "salon-checkout",
    about = "SalonPro storefront CLI: browse the catalog and run checkouts end to end",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the active product catalog
    Products(ConnectionArgs),
    /// List active sales agents
    Agents(ConnectionArgs),
    /// Place an order and optionally run the payment flow against a dev server
    Checkout(CheckoutArgs),
    /// Inspect the buyer's order history
    #[command(subcommand)]
    Orders(OrdersCommands),
    /// Submit a payment verification callback by hand
    Verify(VerifyArgs),
}

#[derive(Subcommand)]
enum OrdersCommands {
    List(ListOrdersArgs),
    Get(GetOrderArgs),
}

#[derive(Args, Clone)]
struct ConnectionArgs {
    #[arg(
        long,
        default_value = "http://localhost:8080",
        help = "Base URL of the storefront API"
    )]
    base_url: String,
    #[arg(long, help = "Bearer token; defaults to a locally minted dev token")]
    token: Option<String>,
    #[arg(
        long,
        env = "APP__JWT_SECRET",
        hide_env_values = true,
        help = "JWT secret used to mint a dev token when --token is absent"
    )]
    jwt_secret: Option<String>,
    #[arg(long, help = "Buyer id for the minted dev token (random if omitted)")]
    user_id: Option<Uuid>,
}

#[derive(Args)]
struct CheckoutArgs {
    #[command(flatten)]
    connection: ConnectionArgs,
    #[arg(
        long = "item",
        value_parser = parse_item,
        action = ArgAction::Append,
        required = true,
        help = "Cart line as SKU=QUANTITY (e.g. SAL-ARG-100=2); repeat for more lines"
    )]
    items: Vec<ItemSpec>,
    #[arg(long, value_enum, default_value_t = PaymentMethodArg::Upi)]
    payment_method: PaymentMethodArg,
    #[arg(long, value_enum, default_value_t = ShippingMethodArg::Standard)]
    shipping_method: ShippingMethodArg,
    #[arg(long, help = "Sales agent to attribute the order to")]
    agent_id: Option<Uuid>,
    #[arg(long, default_value = "", help = "Recipient name")]
    ship_name: String,
    #[arg(long, help = "Street address")]
    street: String,
    #[arg(long, help = "City")]
    city: String,
    #[arg(long, default_value = "", help = "State")]
    state: String,
    #[arg(long, help = "Postal code")]
    postal_code: String,
    #[arg(long, default_value = "", help = "Contact phone")]
    phone: String,
    #[arg(
        long,
        action = ArgAction::SetTrue,
        help = "Complete the hosted payment locally (mock provider dev servers only)"
    )]
    simulate_payment: bool,
    #[arg(
        long,
        env = "APP__GATEWAY_KEY_SECRET",
        hide_env_values = true,
        help = "Gateway secret for --simulate-payment signatures"
    )]
    gateway_secret: Option<String>,
}

#[derive(Args)]
struct ListOrdersArgs {
    #[command(flatten)]
    connection: ConnectionArgs,
    #[arg(long, default_value_t = 1)]
    page: u64,
    #[arg(long, default_value_t = 20)]
    per_page: u64,
}

#[derive(Args)]
struct GetOrderArgs {
    #[command(flatten)]
    connection: ConnectionArgs,
    #[arg(long, help = "Order id (UUID)")]
    id: Uuid,
}

#[derive(Args)]
struct VerifyArgs {
    #[command(flatten)]
    connection: ConnectionArgs,
    #[arg(long, help = "Order id (UUID)")]
    order_id: Uuid,
    #[arg(long)]
    gateway_order_id: String,
    #[arg(long)]
    gateway_payment_id: String,
    #[arg(long)]
    signature: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum PaymentMethodArg {
    Upi,
    Card,
    Cod,
}

impl From<PaymentMethodArg> for PaymentMethod {
    fn from(arg: PaymentMethodArg) -> Self {
        match arg {
            PaymentMethodArg::Upi => PaymentMethod::Upi,
            PaymentMethodArg::Card => PaymentMethod::Card,
            PaymentMethodArg::Cod => PaymentMethod::Cod,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ShippingMethodArg {
    Standard,
    Express,
}

impl From<ShippingMethodArg> for ShippingMethod {
    fn from(arg: ShippingMethodArg) -> Self {
        match arg {
            ShippingMethodArg::Standard => ShippingMethod::Standard,
            ShippingMethodArg::Express => ShippingMethod::Express,
        }
    }
}

#[derive(Clone, Debug)]
struct ItemSpec {
    sku: String,
    quantity: i32,
}

fn parse_item(raw: &str) -> Result<ItemSpec, String> {
    let (sku, quantity) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SKU=QUANTITY, got {:?}", raw))?;
    let quantity: i32 = quantity
        .trim()
        .parse()
        .map_err(|_| format!("quantity in {:?} is not a number", raw))?;
    if sku.trim().is_empty() {
        return Err(format!("missing SKU in {:?}", raw));
    }
    if quantity < 1 {
        return Err("quantity must be at least 1".to_string());
    }
    Ok(ItemSpec {
        sku: sku.trim().to_string(),
        quantity,
    })
}

fn build_client(connection: &ConnectionArgs) -> Result<StorefrontClient> {
    let token = resolve_token(connection)?;
    Ok(StorefrontClient::new(connection.base_url.clone(), token))
}

fn resolve_token(connection: &ConnectionArgs) -> Result<String> {
    if let Some(token) = &connection.token {
        return Ok(token.clone());
    }

    let secret = connection.jwt_secret.clone().context(
        "provide --token, or --jwt-secret / APP__JWT_SECRET to mint a development token",
    )?;
    let auth = AuthService::new(AuthConfig::new(
        secret,
        "salonpro-api".to_string(),
        Duration::from_secs(3600),
    ));
    let user_id = connection.user_id.unwrap_or_else(Uuid::new_v4);
    let token = auth
        .issue_token(user_id, None, None)
        .context("failed to mint development token")?;
    Ok(token)
}

async fn handle_products(args: ConnectionArgs, json: bool) -> Result<()> {
    let client = build_client(&args)?;
    let products = client
        .list_products()
        .await
        .context("failed to list products")?;

    if json {
        print_json(&products)?;
    } else {
        for product in &products {
            println!(
                "{}  {}  {} {}  (stock {})",
                product.sku,
                product.name,
                format_amount(product.unit_price),
                product.currency,
                product.stock_quantity
            );
        }
    }
    Ok(())
}

async fn handle_agents(args: ConnectionArgs, json: bool) -> Result<()> {
    let client = build_client(&args)?;
    let agents = client.list_agents().await.context("failed to list agents")?;

    if json {
        print_json(&agents)?;
    } else {
        for agent in &agents {
            println!(
                "{}  {}  region {}  commission {}%",
                agent.id,
                agent.name,
                agent.region.as_deref().unwrap_or("-"),
                agent.commission_rate
            );
        }
    }
    Ok(())
}

async fn handle_checkout(args: CheckoutArgs, json: bool) -> Result<()> {
    let client = build_client(&args.connection)?;

    let products = client
        .list_products()
        .await
        .context("failed to load the catalog")?;
    let by_sku: HashMap<&str, (Uuid, i64)> = products
        .iter()
        .map(|p| (p.sku.as_str(), (p.id, p.unit_price)))
        .collect();

    let mut cart = Cart::new();
    let mut unit_prices: HashMap<Uuid, i64> = HashMap::new();
    for item in &args.items {
        let (product_id, unit_price) = by_sku
            .get(item.sku.as_str())
            .copied()
            .ok_or_else(|| anyhow!("unknown SKU {:?}", item.sku))?;
        cart.add(product_id, item.quantity);
        unit_prices.insert(product_id, unit_price);
    }

    let address = ShippingAddress {
        name: args.ship_name.clone(),
        street: args.street.clone(),
        city: args.city.clone(),
        state: args.state.clone(),
        postal_code: args.postal_code.clone(),
        phone: args.phone.clone(),
    };
    let payment_method: PaymentMethod = args.payment_method.into();
    let request = cart.build_order_request(
        &unit_prices,
        address,
        payment_method,
        args.shipping_method.into(),
        args.agent_id,
    )?;

    println!(
        "Placing order: subtotal {}, discount {}, tax {}, total {}",
        format_amount(request.subtotal),
        format_amount(request.discount),
        format_amount(request.tax),
        format_amount(request.total)
    );

    let placed = client
        .place_order(&request)
        .await
        .context("order placement failed")?;
    if json {
        print_json(&placed)?;
    } else {
        println!(
            "Order {} placed: {} (status {:?})",
            placed.order_number, placed.order_id, placed.status
        );
    }

    if payment_method.is_offline() {
        cart.clear();
        println!("Cash on delivery: order confirmed, settle on receipt.");
        return Ok(());
    }

    let gateway = client
        .create_gateway_order(placed.order_id)
        .await
        .context("failed to open gateway order")?;
    if json {
        print_json(&gateway)?;
    } else {
        println!(
            "Gateway order {} opened for {} {}",
            gateway.gateway_order_id,
            format_amount(gateway.amount),
            gateway.currency
        );
    }

    if !args.simulate_payment {
        println!(
            "Complete the hosted payment, then run: salon-checkout verify --order-id {} --gateway-order-id {} ...",
            placed.order_id, gateway.gateway_order_id
        );
        return Ok(());
    }

    let secret = args.gateway_secret.clone().context(
        "--simulate-payment needs --gateway-secret / APP__GATEWAY_KEY_SECRET matching the server",
    )?;
    let (payment_id, signature) =
        MockProvider::new(secret).simulate_payment(&gateway.gateway_order_id);

    let outcome = client
        .verify_payment(&VerifyPaymentRequest {
            order_id: placed.order_id,
            gateway_order_id: gateway.gateway_order_id.clone(),
            gateway_payment_id: payment_id,
            signature,
        })
        .await
        .context("payment verification call failed")?;

    if json {
        print_json(&outcome)?;
    }
    if outcome.status == VerificationStatus::Success {
        cart.clear();
        println!("Payment verified; order is {:?}.", outcome.order_status);
    } else {
        println!(
            "Payment verification failed; order is {:?}. The cart is kept for retry.",
            outcome.order_status
        );
    }
    Ok(())
}

async fn handle_orders_command(command: OrdersCommands, json: bool) -> Result<()> {
    match command {
        OrdersCommands::List(args) => {
            let client = build_client(&args.connection)?;
            let response = client
                .list_orders(args.page, args.per_page)
                .await
                .context("failed to list orders")?;
            if json {
                print_json(&response)?;
            } else {
                println!(
                    "{} orders (page {} of {})",
                    response.total,
                    response.page,
                    response.total.div_ceil(response.per_page.max(1))
                );
                for order in &response.orders {
                    println!(
                        "{}  {}  {:?}  {} ({})",
                        order.order_number,
                        order.created_at.format("%Y-%m-%d"),
                        order.status,
                        format_amount(order.total),
                        order.currency
                    );
                }
            }
            Ok(())
        }
        OrdersCommands::Get(args) => {
            let client = build_client(&args.connection)?;
            let order = client
                .get_order(args.id)
                .await
                .with_context(|| format!("failed to fetch order {}", args.id))?;
            if json {
                print_json(&order)?;
            } else {
                println!(
                    "Order {} ({:?}, {} {})",
                    order.order_number,
                    order.status,
                    format_amount(order.total),
                    order.currency
                );
                for item in &order.items {
                    println!(
                        "  {} x{}  {}",
                        item.name,
                        item.quantity,
                        format_amount(item.line_total)
                    );
                }
            }
            Ok(())
        }
    }
}

async fn handle_verify(args: VerifyArgs, json: bool) -> Result<()> {
    let client = build_client(&args.connection)?;
    let outcome = client
        .verify_payment(&VerifyPaymentRequest {
            order_id: args.order_id,
            gateway_order_id: args.gateway_order_id,
            gateway_payment_id: args.gateway_payment_id,
            signature: args.signature,
        })
        .await
        .context("payment verification call failed")?;

    if json {
        print_json(&outcome)?;
    } else {
        println!(
            "Verification {:?}; order is {:?}.",
            outcome.status, outcome.order_status
        );
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Renders a minor-unit amount as a decimal string (9072 -> "90.72").
fn format_amount(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let magnitude = amount.unsigned_abs();
    format!("{}{}.{:02}", sign, magnitude / 100, magnitude % 100)
}
