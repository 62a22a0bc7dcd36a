use crate::{
    events::RollEvent,
    feed::FeedState,
};
use alloy::primitives::{
    U256,
    utils::format_ether,
};
use chrono::{
    DateTime,
    Local,
    TimeZone,
};

/// How many rows the all-players feed shows.
pub const RECENT_FLIPS_LIMIT: usize = 6;

/// Which records of a feed a panel shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerFilter {
    AllPlayers,
    /// Records of the connected wallet; `None` when no wallet is connected.
    Wallet(Option<String>),
}

/// Result of filtering a feed down to one wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletView<'a> {
    ConnectWallet,
    Matches(Vec<&'a RollEvent>),
}

/// Records played by `wallet`, in the order of `events`.
pub fn wallet_view<'a>(events: &'a [RollEvent], wallet: Option<&str>) -> WalletView<'a> {
    match wallet {
        None => WalletView::ConnectWallet,
        Some(wallet) => WalletView::Matches(events.iter().filter(|e| e.is_from(wallet)).collect()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRow {
    pub text: String,
    pub detail: Option<String>,
    pub won: bool,
}

/// What a feed panel should display right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedView {
    Loading,
    Error(String),
    ConnectWallet,
    Empty(String),
    Rows {
        caption: Option<String>,
        rows: Vec<FeedRow>,
    },
}

impl FeedView {
    /// Text for every state that has no rows.
    pub fn message(&self) -> Option<String> {
        match self {
            FeedView::Loading => Some("Loading past bets...".to_string()),
            FeedView::Error(e) => Some(format!("Error: {e}")),
            FeedView::ConnectWallet => {
                Some("Please connect your wallet to see your past bets.".to_string())
            }
            FeedView::Empty(message) => Some(message.clone()),
            FeedView::Rows { .. } => None,
        }
    }
}

impl PlayerFilter {
    pub fn render(&self, state: &FeedState) -> FeedView {
        if state.is_loading() && state.events.is_empty() {
            return FeedView::Loading;
        }
        if let Some(error) = state.error() {
            return FeedView::Error(error.to_string());
        }
        match self {
            PlayerFilter::AllPlayers => all_players(&state.events),
            PlayerFilter::Wallet(wallet) => {
                let wallet = wallet.as_deref();
                match (wallet_view(&state.events, wallet), wallet) {
                    (WalletView::Matches(matches), Some(wallet)) => {
                        own_bets(&matches, &short_address(wallet))
                    }
                    _ => FeedView::ConnectWallet,
                }
            }
        }
    }
}

fn all_players(events: &[RollEvent]) -> FeedView {
    if events.is_empty() {
        return FeedView::Empty("No past bets found for this contract.".to_string());
    }
    let rows = events
        .iter()
        .take(RECENT_FLIPS_LIMIT)
        .map(|e| FeedRow {
            text: format!(
                "Player: {} chose {} and {}",
                short_address(&e.player),
                e.choice,
                won_or_lost(e.won)
            ),
            detail: None,
            won: e.won,
        })
        .collect();
    FeedView::Rows {
        caption: None,
        rows,
    }
}

fn own_bets(matches: &[&RollEvent], short_wallet: &str) -> FeedView {
    if matches.is_empty() {
        return FeedView::Empty(format!(
            "No bets found for your connected address ({short_wallet})."
        ));
    }
    let rows = matches
        .iter()
        .map(|e| FeedRow {
            text: format!("You chose {} and {}", e.choice, won_or_lost(e.won)),
            detail: Some(format!(
                "Block: {} - Time: {}",
                e.block_number,
                e.timestamp.map_or_else(|| "unknown".to_string(), format_timestamp)
            )),
            won: e.won,
        })
        .collect();
    FeedView::Rows {
        caption: Some(format!(
            "Showing past bets for connected address: {short_wallet}"
        )),
        rows,
    }
}

fn won_or_lost(won: bool) -> &'static str {
    if won { "Won" } else { "Lost" }
}

/// `0x1234...abcd`; strings too short to elide come back unchanged.
pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Seconds since epoch in the local timezone.
pub fn format_timestamp(seconds: u64) -> String {
    format_timestamp_in(seconds, &Local)
}

pub fn format_timestamp_in<Tz: TimeZone>(seconds: u64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    i64::try_from(seconds)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .map(|utc| utc.with_timezone(tz).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| seconds.to_string())
}

/// Wei as POL without trailing zeros, e.g. `12.5`.
pub fn format_pol(wei: U256) -> String {
    let full = format_ether(wei);
    match full.split_once('.') {
        Some((whole, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                whole.to_string()
            } else {
                format!("{whole}.{fraction}")
            }
        }
        None => full,
    }
}
