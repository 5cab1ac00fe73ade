//! omniconnect - multi-chain wallet controller
//!
//! Inspect wallet configurations and drive wallet sessions from the shell.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use omniconnect::{
    category_of, Account, Category, ChainIdOrName, ConfigFile, Controller, Target,
};

/// omniconnect: one wallet API across chain families
#[derive(Parser)]
#[command(name = "omniconnect")]
#[command(about = "Multi-chain wallet connection controller", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the categories and connectors a config produces
    Inspect {
        /// Path to the JSON config
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },

    /// Show which category a chain identifier belongs to
    Resolve {
        /// Numeric chain id or chain name
        #[arg(value_name = "CHAIN")]
        chain: ChainIdOrName,

        /// Config whose named chains are also considered
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Connect a wallet, sign a message and disconnect
    Session {
        /// Path to the JSON config
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Wallet name as configured
        #[arg(short, long)]
        wallet: String,

        /// Category to use (e.g. evm, solana)
        #[arg(long)]
        category: Option<Category>,

        /// Chain to switch to after connecting
        #[arg(long)]
        chain: Option<ChainIdOrName>,

        /// Message to sign
        #[arg(short, long, default_value = "hello from omniconnect")]
        message: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    let result = match cli.command {
        Commands::Inspect { config } => {
            info!("Inspecting config: {:?}", config);
            inspect(&config)
        }
        Commands::Resolve { chain, config } => resolve(&chain, config.as_deref()),
        Commands::Session {
            config,
            wallet,
            category,
            chain,
            message,
        } => {
            info!("Starting session with {} from {:?}", wallet, config);
            session(&config, &wallet, category, chain, &message).await
        }
    };

    if let Err(err) = result {
        error!("{}", err);
        std::process::exit(1);
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn load_controller(path: &Path) -> Result<Controller, Box<dyn std::error::Error>> {
    let params = ConfigFile::load(path)?.into_parameters()?;
    Ok(Controller::create(params)?)
}

fn inspect(path: &Path) -> CliResult {
    let controller = load_controller(path)?;

    println!("┌─────────────────────────────────────────────────────────────┐");
    println!("│  CONFIGURATION                                              │");
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│  Path: {:?}", path);
    println!("│                                                             │");
    println!("│  Category   │ Connector            │ Id                     │");
    println!("│  ───────────┼──────────────────────┼─────────────────────── │");
    for info in controller.connectors() {
        println!(
            "│  {:<10} │ {:<20} │ {:<22} │",
            info.category.as_str(),
            info.name,
            info.uid
        );
    }
    if controller.categories().is_empty() {
        println!("│  (no wallets configured)                                    │");
    }
    println!("│                                                             │");
    println!("│  Named chains: {}", controller.registry().len());
    println!("└─────────────────────────────────────────────────────────────┘");
    Ok(())
}

fn resolve(chain: &ChainIdOrName, config: Option<&Path>) -> CliResult {
    let category = match config {
        Some(path) => load_controller(path)?.resolve(&Target::chain(chain.clone()))?,
        None => category_of(chain)?,
    };
    println!("{} -> {}", chain, category);
    Ok(())
}

async fn session(
    path: &Path,
    wallet: &str,
    category: Option<Category>,
    chain: Option<ChainIdOrName>,
    message: &str,
) -> CliResult {
    let controller = load_controller(path)?;
    let target = Target {
        category: Some(category.unwrap_or(Category::Evm)),
        chain: None,
    };

    let watch = controller.watch_account(|current: &Account, previous: &Account| {
        println!(
            "│  {} -> {}  {}",
            previous.status,
            current.status,
            current.address().unwrap_or("-")
        );
    });

    println!("┌─────────────────────────────────────────────────────────────┐");
    println!("│  SESSION                                                    │");
    println!("├─────────────────────────────────────────────────────────────┤");

    let connected = controller.connect(target.clone(), wallet).await?;
    println!("│  Accounts: {}", connected.accounts.join(", "));

    if let Some(chain) = chain {
        let switched = controller.switch_chain(chain).await?;
        println!("│  Switched to chain {}", switched);
    }

    let account = controller.get_account(target.clone())?;
    println!(
        "│  Chain: {}",
        account
            .chain_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string())
    );

    let signature = controller.sign_message(target.clone(), message).await?;
    println!("│  Signature: {}", signature);

    controller.disconnect(target).await?;
    watch.unwatch();
    println!("└─────────────────────────────────────────────────────────────┘");
    Ok(())
}
