#![forbid(unsafe_code)]
use clap::Parser;
use colored::Colorize;
use ufchain::ledger::Ledger;
use ufchain::persistence::Database;

#[derive(Parser, Debug)]
#[command(name = "ufchain-balance", about = "Print the balance of a stored wallet")]
struct Cli {
    /// Wallet address (0x + 40 hex characters)
    address: String,

    /// Path to the ledger database
    #[arg(long, default_value = "./data/ufchain.db")]
    db: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let ledger = Ledger::open_existing(Box::new(Database::open_existing(&cli.db)?))?;
    let wallet = ledger.get_wallet(&cli.address)?;
    let chain = ledger.snapshot();

    println!("{} {}", "Address:".bold(), wallet.address);
    println!("{} {}", "Chain height:".bold(), chain.height());
    println!(
        "{} {}",
        "Balance:".bold(),
        wallet.balance(&chain).to_string().green()
    );

    ledger.close()?;
    Ok(())
}
