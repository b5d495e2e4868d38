//! Campus Eats CLI - Browse vendors, fill a cart, check out and track orders.
//!
//! # Usage
//!
//! ```bash
//! # Browse
//! campus-eats vendors
//! campus-eats menu 3 --category Noodles
//!
//! # Cart
//! campus-eats cart add 12 -q 2
//! campus-eats cart update 12 -1
//! campus-eats cart show
//!
//! # Order
//! campus-eats login -e ali@uni.my
//! campus-eats checkout
//! campus-eats track 41
//! campus-eats orders
//!
//! # Vendors
//! campus-eats vendor orders 3
//! campus-eats vendor set-status 41 preparing
//! ```
//!
//! # Environment Variables
//!
//! See `campus_eats_client::config` for the full list. `CAMPUS_EATS_PASSWORD`
//! supplies the login password when `--password` is not given.

#![cfg_attr(not(test), forbid(unsafe_code))]

use campus_eats_client::checkout::CheckoutError;
use campus_eats_client::error::set_sentry_user;
use campus_eats_client::{AppError, AppState, ClientConfig};
use campus_eats_core::{MenuItemId, OrderId, OrderStatus, VendorId};
use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "campus-eats")]
#[command(author, version, about = "Order food from campus vendors")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List vendors
    Vendors,
    /// Show a vendor's menu
    Menu {
        /// Vendor ID
        vendor_id: VendorId,

        /// Only show items in this category
        #[arg(short, long)]
        category: Option<String>,

        /// Only show items whose name contains this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Place one order per vendor for everything in the cart
    Checkout,
    /// List your orders
    Orders,
    /// Follow an order's status until it is completed or cancelled
    Track {
        /// Order ID
        order_id: OrderId,
    },
    /// Sign in with email and password
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "CAMPUS_EATS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Handle incoming orders as a vendor
    Vendor {
        #[command(subcommand)]
        action: VendorAction,
    },
}

#[derive(Subcommand)]
enum VendorAction {
    /// Show incoming orders grouped by status
    Orders {
        /// Vendor ID
        vendor_id: VendorId,
    },
    /// Accept, reject or complete an order
    SetStatus {
        /// Order ID
        order_id: OrderId,

        /// New status: preparing, completed or cancelled
        status: OrderStatus,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart
    Show,
    /// Add a menu item
    Add {
        /// Menu item ID
        item_id: MenuItemId,

        /// Number of units
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Change a line's quantity by a signed amount
    Update {
        /// Menu item ID
        item_id: MenuItemId,

        /// Amount to add (negative to reduce)
        #[arg(allow_hyphen_values = true)]
        delta: i64,
    },
    /// Remove a line
    Remove {
        /// Menu item ID
        item_id: MenuItemId,
    },
    /// Empty the cart
    Clear,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            print_failure(&AppError::Config(e));
            std::process::exit(1);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let sentry_guard = init_sentry(&config);

    // Logs go to stderr so command output stays clean
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "campus_eats_client=info,campus_eats_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let state = AppState::new(&config);
    if let Some(session) = state.session() {
        set_sentry_user(
            &session.user_id(),
            session.user.email.as_ref().map(|email| email.as_str()),
        );
    }

    if let Err(e) = run(cli, &state).await {
        print_failure(&e);
        // Flush pending Sentry events before exiting
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, state: &AppState) -> Result<(), AppError> {
    match cli.command {
        Commands::Vendors => commands::menu::vendors(state).await?,
        Commands::Menu {
            vendor_id,
            category,
            search,
        } => commands::menu::menu(state, vendor_id, category.as_deref(), search.as_deref()).await?,
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(state),
            CartAction::Add { item_id, quantity } => {
                commands::cart::add(state, item_id, quantity).await?;
            }
            CartAction::Update { item_id, delta } => commands::cart::update(state, item_id, delta)?,
            CartAction::Remove { item_id } => commands::cart::remove(state, item_id)?,
            CartAction::Clear => commands::cart::clear(state),
        },
        Commands::Checkout => commands::orders::checkout(state).await?,
        Commands::Orders => commands::orders::list(state).await?,
        Commands::Track { order_id } => commands::orders::track(state, order_id).await?,
        Commands::Login { email, password } => {
            commands::auth::login(state, &email, password.as_deref()).await?;
        }
        Commands::Logout => commands::auth::logout(state),
        Commands::Vendor { action } => match action {
            VendorAction::Orders { vendor_id } => commands::vendor::orders(state, vendor_id).await?,
            VendorAction::SetStatus { order_id, status } => {
                commands::vendor::set_status(state, order_id, status).await?;
            }
        },
    }
    Ok(())
}

/// Report the failure and tell the user what went wrong.
#[allow(clippy::print_stderr)]
fn print_failure(err: &AppError) {
    let message = err.report();
    eprintln!("Error: {message}");
    if matches!(err, AppError::Checkout(CheckoutError::AuthenticationRequired)) {
        eprintln!("Run `campus-eats login -e <email>` to sign in.");
    }
}
