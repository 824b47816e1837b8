//! Simple Valley CLI - headless cart client.
//!
//! Drives the same cart manager the storefront pages use, against a JSON
//! file instead of browser storage, and can submit the cart to a running
//! checkout gateway.
//!
//! # Usage
//!
//! ```bash
//! # Add a product and look at the cart
//! sv-cli cart add price_2box --title "The Simple Valley Bar - 2 Boxes" --price 79.99
//! sv-cli cart show
//!
//! # Check out as a guest, prefilling the payment page email
//! sv-cli checkout --gateway http://localhost:3000 --email shopper@example.com
//!
//! # Check out as a signed-in shopper
//! SV_ACCESS_TOKEN=... sv-cli checkout --gateway http://localhost:3000
//! ```
//!
//! # Commands
//!
//! - `cart show|add|remove|inc|dec|clear` - Edit the stored cart
//! - `promo status|dismiss` - The one-time promotional dialog flag
//! - `checkout` - Create a checkout session and print its URL

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use secrecy::SecretString;
use simple_valley_core::cart::{CartManager, MemoryStore, SiteFlags};

mod commands;

use commands::store::JsonFileStore;

#[derive(Parser)]
#[command(name = "sv-cli")]
#[command(author, version, about = "Simple Valley headless cart client")]
struct Cli {
    /// File holding the persisted cart and flags
    #[arg(long, env = "SV_STORE", default_value = "simple-valley-store.json")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or edit the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// The one-time promotional dialog
    Promo {
        #[command(subcommand)]
        action: PromoAction,
    },
    /// Create a checkout session for the cart and print the payment URL
    Checkout {
        /// Gateway base URL
        #[arg(long, env = "SV_GATEWAY_URL", default_value = "http://localhost:3000")]
        gateway: String,

        /// Email to prefill on the payment page
        #[arg(short, long)]
        email: Option<String>,

        /// Auth0 access token of a signed-in shopper
        #[arg(long, env = "SV_ACCESS_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Print the cart
    Show,
    /// Add a product, or one more of it if already present
    Add {
        /// Price ID
        id: String,

        /// Display title
        #[arg(short, long)]
        title: String,

        /// Unit price in dollars, e.g. 79.99
        #[arg(short, long)]
        price: Decimal,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Image reference
        #[arg(long)]
        image: Option<String>,
    },
    /// Remove a product entirely
    Remove {
        /// Price ID
        id: String,
    },
    /// Add one unit
    Inc {
        /// Price ID
        id: String,
    },
    /// Remove one unit
    Dec {
        /// Price ID
        id: String,

        /// Confirm removing the line when it is the last unit
        #[arg(short, long)]
        yes: bool,
    },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum PromoAction {
    /// Whether the dialog would be shown
    Status,
    /// Mark the dialog as shown
    Dismiss,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(output) => print_output(&output),
        Err(e) => {
            tracing::error!("Command failed: {e}");
            std::process::exit(1);
        }
    }
}

#[allow(clippy::print_stdout)]
fn print_output(output: &str) {
    println!("{output}");
}

async fn run(cli: Cli) -> Result<String, Box<dyn std::error::Error>> {
    let store = JsonFileStore::open(&cli.store)?;

    let output = match cli.command {
        Commands::Cart { action } => {
            let confirm = matches!(action, CartAction::Dec { yes: true, .. });
            let mut manager = CartManager::load(store).with_removal_confirmation(move |_| confirm);

            match action {
                CartAction::Show => commands::cart::show(&manager),
                CartAction::Add {
                    id,
                    title,
                    price,
                    quantity,
                    image,
                } => commands::cart::add(
                    &mut manager,
                    commands::cart::NewLine {
                        id,
                        title,
                        price,
                        quantity,
                        image,
                    },
                )?,
                CartAction::Remove { id } => commands::cart::remove(&mut manager, &id)?,
                CartAction::Inc { id } => commands::cart::change(&mut manager, &id, 1)?,
                CartAction::Dec { id, .. } => commands::cart::change(&mut manager, &id, -1)?,
                CartAction::Clear => commands::cart::clear(&mut manager)?,
            }
        }
        Commands::Promo { action } => {
            // Session-scoped flags do not outlive one invocation
            let mut flags = SiteFlags::new(store, MemoryStore::new());
            match action {
                PromoAction::Status => commands::promo::status(&flags),
                PromoAction::Dismiss => commands::promo::dismiss(&mut flags)?,
            }
        }
        Commands::Checkout {
            gateway,
            email,
            token,
        } => {
            let manager = CartManager::load(store);
            let options = commands::checkout::CheckoutOptions {
                gateway,
                email,
                token: token.map(SecretString::from),
            };
            commands::checkout::run(&manager, options).await?
        }
    };

    Ok(output)
}
