//! Inventory command line
//!
//! Each invocation runs one workflow against the configured database and
//! prints the response as JSON. Commands acting on behalf of a user log in
//! first with `--user` / `--password`.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use inventory_ledger::config::log_filter_from_env;
use inventory_ledger::dispatch::BackgroundService;
use inventory_ledger::permission::EMPLOYEE;
use inventory_ledger::stock::{ProductAttributes, ProductDraft};
use inventory_ledger::types::{ProductId, UserId};
use inventory_ledger::{Command, Config, InventoryService, Payload, Response};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "inventory", about = "Inventory workflows", long_about = None)]
struct Cli {
    /// sled database directory
    #[arg(long, env = "INVENTORY_DB_PATH")]
    db: Option<PathBuf>,

    #[command(flatten)]
    auth: AuthArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct AuthArgs {
    /// Username to act as
    #[arg(long, env = "INVENTORY_USER", global = true)]
    user: Option<String>,

    #[arg(long, env = "INVENTORY_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create the first administrator of an empty database
    Bootstrap {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Request a new account; it stays pending until approved
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = EMPLOYEE)]
        role: String,
    },
    Approve {
        user_id: String,
    },
    Disable {
        user_id: String,
    },
    /// List accounts
    Users {
        /// Only accounts awaiting approval
        #[arg(long)]
        pending: bool,
    },
    /// Add a product with its stock row
    AddProduct(AddProductArgs),
    /// Browse the catalog
    Products,
    /// Restock a product
    Buy {
        product_id: String,
        quantity: u32,
    },
    /// Sell units of a product
    Sell {
        product_id: String,
        quantity: u32,
        /// Unit price in minor currency units
        price: u64,
    },
    /// Stock summary for the given products
    Summary {
        #[arg(required = true)]
        product_ids: Vec<String>,
    },
    /// Full detail view for the given products
    Details {
        #[arg(required = true)]
        product_ids: Vec<String>,
    },
}

#[derive(Debug, Args)]
struct AddProductArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    category: String,
    /// Unit cost in minor currency units
    #[arg(long)]
    cost: u64,
    #[arg(long)]
    colour: Option<String>,
    #[arg(long)]
    description: Option<String>,
    /// Attribute document, e.g. '{"attributes":[],"components":[]}'
    #[arg(long)]
    attributes: Option<String>,
    #[arg(long, default_value_t = 0)]
    quantity: u32,
    #[arg(long, default_value_t = 1)]
    min_stock: u32,
    #[arg(long)]
    max_stock: u32,
    #[arg(long, default_value_t = 0)]
    reorder_point: u32,
}

#[tokio::main]
pub async fn main() {
    let cli = Cli::parse();

    // before reading the config, so malformed variables get reported
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_filter_from_env())),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::from_env();
    if let Some(db) = &cli.db {
        config = config.with_db_path(db);
    }

    match run(cli, &config).await {
        Ok(response) => {
            print_response(&response);
            if !response.is_success() {
                process::exit(1);
            }
        }
        Err(error) => {
            eprintln!("{error:#}");
            process::exit(2);
        }
    }
}

async fn run(cli: Cli, config: &Config) -> anyhow::Result<Response> {
    let service = Arc::new(InventoryService::open(config)?);

    if let Commands::Bootstrap { username, password } = &cli.command {
        let response = match service.bootstrap_administrator(username, password) {
            Ok(user) => Response::success("Administrator created", Payload::User(user)),
            Err(e) => Response::failed(e.to_string()),
        };
        service.store().flush()?;
        return Ok(response);
    }

    let background = BackgroundService::current(Arc::clone(&service))?;
    let command = to_command(cli.command)?;

    let session = match command.required_permission() {
        None => None,
        Some(_) => {
            let (Some(username), Some(password)) = (cli.auth.user, cli.auth.password) else {
                anyhow::bail!("this command needs --user and --password");
            };
            let login = background
                .execute(None, Command::Login { username, password })
                .await;
            match login.payload {
                Payload::Session(session) => Some(session),
                _ => return Ok(login),
            }
        }
    };

    let response = background.execute(session, command).await;
    service.store().flush()?;
    Ok(response)
}

fn to_command(command: Commands) -> anyhow::Result<Command> {
    let ids = |raw: Vec<String>| -> Vec<ProductId> { raw.into_iter().map(ProductId::from).collect() };

    Ok(match command {
        Commands::Bootstrap { .. } => anyhow::bail!("bootstrap is handled before dispatch"),
        Commands::Register {
            username,
            password,
            role,
        } => Command::Register {
            username,
            password,
            role,
        },
        Commands::Approve { user_id } => Command::ApproveUser {
            user_id: UserId::from(user_id),
        },
        Commands::Disable { user_id } => Command::DisableUser {
            user_id: UserId::from(user_id),
        },
        Commands::Users { pending: true } => Command::FetchPendingUsers,
        Commands::Users { pending: false } => Command::FetchUsers,
        Commands::AddProduct(args) => Command::CreateProduct(to_draft(args)?),
        Commands::Products => Command::FetchProducts,
        Commands::Buy {
            product_id,
            quantity,
        } => Command::BuyProduct {
            product_id: ProductId::from(product_id),
            quantity,
        },
        Commands::Sell {
            product_id,
            quantity,
            price,
        } => Command::SellProduct {
            product_id: ProductId::from(product_id),
            quantity,
            unit_price: price,
        },
        Commands::Summary { product_ids } => Command::StockSummary {
            product_ids: ids(product_ids),
        },
        Commands::Details { product_ids } => Command::ProductDetails {
            product_ids: ids(product_ids),
        },
    })
}

fn to_draft(args: AddProductArgs) -> anyhow::Result<ProductDraft> {
    let mut draft = ProductDraft::new()
        .set_name(args.name)
        .set_category(args.category)
        .set_cost(args.cost)
        .set_initial_quantity(args.quantity)
        .set_stock_limits(args.min_stock, args.max_stock, args.reorder_point);

    if let Some(colour) = args.colour {
        draft = draft.set_colour(colour);
    }
    if let Some(description) = args.description {
        draft = draft.set_description(description);
    }
    if let Some(raw) = args.attributes {
        draft = draft.set_attributes(ProductAttributes::from_json(&raw)?);
    }
    Ok(draft)
}

fn print_response(response: &Response) {
    match serde_json::to_string_pretty(response) {
        Ok(json) => println!("{json}"),
        Err(_) => println!("{:?}: {}", response.status, response.message),
    }
}
