use clap::{Parser, Subcommand};
use std::io::Write;

use vite_wallet::{ClientConfig, CommandOutput, Commands};

/// Vite wallet command line client
///
/// Every command prints a single JSON object `{error, msg, data}`.
#[derive(Parser, Debug)]
#[command(name = "vite-wallet", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new wallet
    Create,

    /// Show balance and unreceived transfers of an account
    Balance {
        #[arg(short = 'a', long)]
        address: Option<String>,
        #[arg(short = 'm', long)]
        mnemonic: Option<String>,
        #[arg(short = 'i', long, default_value_t = 0)]
        index: u32,
    },

    /// List account blocks of an address
    Transactions {
        #[arg(short = 'a', long)]
        address: String,
        #[arg(short = 'i', long = "page-index", default_value_t = 0)]
        page_index: u32,
        #[arg(short = 's', long = "page-size", default_value_t = 10)]
        page_size: u32,
    },

    /// Receive all pending transfers
    Update {
        #[arg(short = 'm', long)]
        mnemonic: String,
        #[arg(short = 'i', long, default_value_t = 0)]
        index: u32,
    },

    /// Send tokens to an address
    Send {
        #[arg(short = 'm', long)]
        mnemonic: String,
        #[arg(short = 'i', long, default_value_t = 0)]
        index: u32,
        #[arg(short = 'd', long = "destination")]
        to_address: String,
        #[arg(short = 't', long = "token-id")]
        token_id: String,
        /// Amount in the token's smallest unit
        #[arg(short = 'a', long)]
        amount: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    // Logs go to stderr; stdout carries only the JSON result and progress lines
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => {
            // --help / --version
            print!("{}", e);
            return Ok(());
        }
        Err(e) => {
            log::debug!("{}", e);
            return print_output(&CommandOutput::failure("invalid command"));
        }
    };

    let config = ClientConfig::from_env();
    log::debug!("Using Vite node {}", config.node_url);
    let commands = Commands::new(config);

    let output = match cli.command {
        Command::Create => commands.create(),
        Command::Balance {
            address,
            mnemonic,
            index,
        } => {
            commands
                .balance(address.as_deref(), mnemonic.as_deref(), index)
                .await
        }
        Command::Transactions {
            address,
            page_index,
            page_size,
        } => commands.transactions(&address, page_index, page_size).await,
        Command::Update { mnemonic, index } => {
            commands
                .update(&mnemonic, index, |status| {
                    println!(">> {}", status.message);
                })
                .await
        }
        Command::Send {
            mnemonic,
            index,
            to_address,
            token_id,
            amount,
        } => {
            println!(">> sending {} to: {}", amount, to_address);
            commands
                .send(&mnemonic, index, &to_address, &token_id, &amount)
                .await
        }
    };

    print_output(&output)
}

fn print_output(output: &CommandOutput) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", serde_json::to_string_pretty(output)?)?;
    stdout.flush()?;
    Ok(())
}
