use crate::{
    explorer::DEFAULT_EXPLORER_URL,
    wallets,
};
use alloy::primitives::Address;
use clap::Parser;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::{
    path::PathBuf,
    str::FromStr,
    time::Duration,
};
use url::Url;

pub const DEFAULT_RPC_URL: &str = "https://polygon-rpc.com";
pub const DEFAULT_CONTRACT: &str = "0x74e7f9C3056f4921c3f0078dE2B8c662265BB66C";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "coinflip",
    version,
    about = "Terminal client for the Polygon coin-flip contract",
    long_about = None
)]
pub struct Args {
    /// Etherscan-compatible log API endpoint
    #[arg(long, default_value = DEFAULT_EXPLORER_URL)]
    pub explorer_url: Url,

    /// Log API key; without it the bet history panels stay empty
    #[arg(long, env = "POLYGONSCAN_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "POLYGON_RPC_URL", default_value = DEFAULT_RPC_URL)]
    pub rpc_url: Url,

    #[arg(long, default_value = DEFAULT_CONTRACT)]
    pub contract: String,

    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,

    /// Keystore (by file name) holding the key to play with
    #[arg(long, conflicts_with = "watch_address")]
    pub keystore: Option<String>,

    #[arg(long)]
    pub keystore_dir: Option<String>,

    /// Follow an address's bets without being able to flip
    #[arg(long)]
    pub watch_address: Option<String>,

    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletConfig {
    None,
    Keystore { name: String, dir: PathBuf },
    WatchOnly(Address),
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub explorer_url: Url,
    pub api_key: Option<String>,
    pub rpc_url: Url,
    pub contract: Address,
    pub poll_interval: Duration,
    pub wallet: WalletConfig,
    pub log_dir: PathBuf,
}

impl TryFrom<Args> for AppConfig {
    type Error = color_eyre::Report;

    fn try_from(args: Args) -> Result<Self> {
        if args.poll_interval_ms == 0 {
            return Err(eyre!("--poll-interval-ms must be greater than zero"));
        }
        let contract = parse_address(&args.contract).wrap_err("parsing --contract")?;
        let wallet = match (args.keystore, args.watch_address) {
            (Some(name), _) => WalletConfig::Keystore {
                name,
                dir: wallets::resolve_keystore_dir(args.keystore_dir.as_deref()),
            },
            (None, Some(raw)) => WalletConfig::WatchOnly(
                parse_address(&raw).wrap_err("parsing --watch-address")?,
            ),
            (None, None) => WalletConfig::None,
        };
        let api_key = args
            .api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        Ok(AppConfig {
            explorer_url: args.explorer_url,
            api_key,
            rpc_url: args.rpc_url,
            contract,
            poll_interval: Duration::from_millis(args.poll_interval_ms),
            wallet,
            log_dir: args.log_dir,
        })
    }
}

fn parse_address(raw: &str) -> Result<Address> {
    Address::from_str(raw.trim()).map_err(|e| eyre!("Invalid address '{raw}': {e}"))
}
