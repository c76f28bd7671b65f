use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use eyre::{eyre, Result, WrapErr};

use depot_transfer::configure::{load_config, AppConfig, BackendKind};
use depot_transfer::logger::setup_logger;
use depot_transfer::report;
use depot_transfer::transfer::{
    Catalog, CreateTransfer, HttpBackend, LocalBackend, TransferBackend, TransferCoordinator,
    TransferId,
};

#[derive(Parser)]
#[command(name = "depot-transfer")]
#[command(about = "Create and receive stock transfers between warehouses")]
struct Cli {
    /// Configuration file (YAML)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Override the configured backend
    #[arg(long, global = true, value_enum)]
    backend: Option<BackendKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List transfers
    List {
        /// Only transfers not yet received
        #[arg(long)]
        pending: bool,
    },
    /// Submit a new transfer
    Create {
        #[arg(long)]
        product: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long, allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Confirm receipt of a transfer
    Receive {
        #[arg(long)]
        id: String,
    },
    /// List inventory items
    Inventory,
    /// List warehouses
    Warehouses,
    /// Load products and warehouses into the local store
    Seed {
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).wrap_err("Failed to load configuration")?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    setup_logger(&config).map_err(|e| eyre!("Failed to initialize logger: {:#}", e))?;

    let (backend, store) = open_backend(&config)?;
    let coordinator = TransferCoordinator::new(backend);
    log::debug!("Using {} backend", coordinator.backend_name());

    match cli.command {
        Commands::List { pending } => {
            let mut transfers = coordinator.list_transfers().await?;
            if pending {
                transfers = coordinator.pending_transfers();
            }
            println!("{}", report::transfer_table(&transfers));
        }
        Commands::Create {
            product,
            from,
            to,
            quantity,
        } => {
            let transfer = coordinator
                .create_transfer(CreateTransfer::new(product, from, to, quantity))
                .await?;
            println!("{}", report::transfer_table(&[transfer]));
        }
        Commands::Receive { id } => {
            // Load the board first so an already received transfer is caught locally
            coordinator.list_transfers().await?;
            let transfer = coordinator.receive_transfer(&TransferId::new(id)).await?;
            println!("{}", report::transfer_table(&[transfer]));
        }
        Commands::Inventory => {
            let products = coordinator.list_inventory().await?;
            println!("{}", report::inventory_table(&products));
        }
        Commands::Warehouses => {
            let warehouses = coordinator.list_warehouses().await?;
            println!("{}", report::warehouse_table(&warehouses));
        }
        Commands::Seed { file } => {
            let store = store.ok_or_else(|| {
                eyre!("seed only applies to the local backend (use --backend local)")
            })?;
            seed(&store, &file).await?;
        }
    }

    Ok(())
}

/// The backend, plus the concrete store when it is the local one
fn open_backend(config: &AppConfig) -> Result<(Arc<dyn TransferBackend>, Option<Arc<LocalBackend>>)> {
    match config.backend {
        BackendKind::Http => {
            let backend: Arc<dyn TransferBackend> = Arc::new(HttpBackend::from_config(config)?);
            Ok((backend, None))
        }
        BackendKind::Local => {
            let store = Arc::new(LocalBackend::open(&config.store_path)?);
            let backend: Arc<dyn TransferBackend> = store.clone();
            Ok((backend, Some(store)))
        }
    }
}

async fn seed(store: &LocalBackend, file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .wrap_err_with(|| format!("Failed to read catalog {}", file.display()))?;
    let catalog: Catalog = serde_json::from_str(&raw).wrap_err("Invalid catalog JSON")?;

    let (products, warehouses) = store.import_catalog(&catalog).await?;
    println!("Imported {} products and {} warehouses", products, warehouses);
    Ok(())
}
