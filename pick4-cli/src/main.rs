mod commands;
mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use commands::{admin, play, query, Session};
use config::CliConfig;
use pick4_core::{
    Address, Amount, CoreError, RequestId, DEFAULT_ENTRY_PRICE, DEFAULT_PLATFORM_CUT_PERCENT,
};
use pick4_lottery::LotteryError;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pick4")]
#[command(about = "Pick-4 numbers lottery with oracle-drawn rounds")]
#[command(version)]
struct Cli {
    /// Data directory for lottery storage
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Lottery to operate on
    #[arg(short, long, global = true)]
    lottery: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new lottery
    Init {
        /// Administrator address
        #[arg(long)]
        admin: Address,
        /// Entry price of one bet
        #[arg(long, default_value_t = DEFAULT_ENTRY_PRICE)]
        price: Amount,
        /// Platform cut in percent
        #[arg(long, default_value_t = DEFAULT_PLATFORM_CUT_PERCENT)]
        cut: u8,
        /// Use a fee-funded VRF oracle instead of the mock
        #[arg(long)]
        vrf: bool,
    },
    /// Credit funds to an address
    Deposit {
        /// Receiving address
        address: Address,
        /// Amount in base units
        amount: Amount,
    },
    /// Send fee tokens to the oracle
    FundOracle {
        /// Amount in fee-token base units
        amount: Amount,
    },
    /// Open the next round
    Start {
        /// Caller address (defaults to the admin)
        #[arg(long)]
        caller: Option<Address>,
    },
    /// Bet on the open round
    Bet {
        /// Player address
        player: Address,
        /// First digit
        d1: u8,
        /// Second digit
        d2: u8,
        /// Third digit
        d3: u8,
        /// Fourth digit
        d4: u8,
        /// Amount paid (defaults to the entry price)
        #[arg(long)]
        amount: Option<Amount>,
    },
    /// Request randomness for the open round
    Draw {
        /// Seed forwarded to the oracle (random if omitted)
        #[arg(long)]
        seed: Option<u64>,
        /// Caller address (defaults to the admin)
        #[arg(long)]
        caller: Option<Address>,
    },
    /// Deliver randomness for a pending request
    Fulfill {
        /// Request id
        request_id: RequestId,
        /// Random value for the mock oracle (defaults to the request seed)
        #[arg(long)]
        value: Option<u128>,
    },
    /// Withdraw the retained balance
    Withdraw {
        /// Recipient address
        recipient: Address,
        /// Caller address (defaults to the admin)
        #[arg(long)]
        caller: Option<Address>,
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show lottery and current round status
    Status,
    /// Show all rounds
    Rounds {
        /// Print rounds as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a balance (the retained balance without an address)
    Balance {
        /// Address to look up
        address: Option<Address>,
    },
    /// Show pending randomness requests
    Pending,
    /// List stored lotteries
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::from_args(cli.data_dir, cli.lottery, cli.verbose);

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_filter()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.data_dir.display()))?;

    let storage = pick4_lottery::open_storage(&config.data_dir).await?;
    let session = Session::new(&storage, &config.lottery);

    // Execute command
    let result = match cli.command {
        Commands::Init {
            admin,
            price,
            cut,
            vrf,
        } => admin::init(&session, admin, price, cut, vrf).await,
        Commands::Deposit { address, amount } => admin::deposit(&session, address, amount).await,
        Commands::FundOracle { amount } => admin::fund_oracle(&session, amount).await,
        Commands::Start { caller } => admin::start(&session, caller).await,
        Commands::Bet {
            player,
            d1,
            d2,
            d3,
            d4,
            amount,
        } => play::bet(&session, player, [d1, d2, d3, d4], amount).await,
        Commands::Draw { seed, caller } => admin::draw(&session, caller, seed).await,
        Commands::Fulfill { request_id, value } => {
            admin::fulfill(&session, request_id, value).await
        }
        Commands::Withdraw {
            recipient,
            caller,
            yes,
        } => admin::withdraw(&session, caller, recipient, yes).await,
        Commands::Status => query::status(&session).await,
        Commands::Rounds { json } => query::rounds(&session, json).await,
        Commands::Balance { address } => query::balance(&session, address).await,
        Commands::Pending => query::pending(&session).await,
        Commands::List => query::list(&storage).await,
    };

    if let Err(e) = result {
        match &e {
            LotteryError::LotteryNotFound(name) => {
                eprintln!("Error: Lottery '{}' not found", name);
                eprintln!("Create it with: pick4 --lottery {} init --admin <address>", name);
            }
            LotteryError::Core(CoreError::InsufficientFunds { need, available }) => {
                eprintln!("Error: Insufficient funds");
                eprintln!("Need: {}, Available: {}", need, available);
            }
            LotteryError::InsufficientOracleFunds { need, available } => {
                eprintln!("Error: {}", e);
                eprintln!(
                    "Top it up with: pick4 fund-oracle {}",
                    need.saturating_sub(*available)
                );
            }
            LotteryError::Unauthorized => {
                eprintln!("Error: {}", e);
                eprintln!("Omit --caller to act as the administrator");
            }
            _ => {
                eprintln!("Error: {}", e);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
