use alloy::primitives::U256;
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

#[derive(PartialEq, Eq, Debug, Copy, Clone, Default, Hash, Serialize, Deserialize)]
pub enum CoinSide {
    #[default]
    Heads,
    Tails,
}

impl CoinSide {
    pub fn from_raw(raw: u64) -> Option<Self> {
        match raw {
            0 => Some(CoinSide::Heads),
            1 => Some(CoinSide::Tails),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u64 {
        match self {
            CoinSide::Heads => 0,
            CoinSide::Tails => 1,
        }
    }

    pub fn as_u256(self) -> U256 {
        U256::from(self.as_raw())
    }

    pub fn flipped(self) -> Self {
        match self {
            CoinSide::Heads => CoinSide::Tails,
            CoinSide::Tails => CoinSide::Heads,
        }
    }
}

impl fmt::Display for CoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CoinSide::Heads => "Heads",
            CoinSide::Tails => "Tails",
        };
        write!(f, "{name}")
    }
}

/// A decoded `Roll` log.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct RollEvent {
    pub block_number: u64,
    pub tx_hash: String,
    pub player: String,
    pub choice: CoinSide,
    pub outcome: CoinSide,
    pub won: bool,
    /// Seconds since epoch, only when the explorer reported it.
    pub timestamp: Option<u64>,
}

impl RollEvent {
    pub fn is_from(&self, player: &str) -> bool {
        self.player.eq_ignore_ascii_case(player)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn coin_side__from_raw__rejects_values_outside_both_sides() {
        assert_eq!(Some(CoinSide::Heads), CoinSide::from_raw(0));
        assert_eq!(Some(CoinSide::Tails), CoinSide::from_raw(1));
        assert_eq!(None, CoinSide::from_raw(2));
    }

    #[test]
    fn roll_event__is_from__ignores_address_case() {
        let event = RollEvent {
            block_number: 1,
            tx_hash: "0xaa".to_string(),
            player: "0xAbCdEf0000000000000000000000000000000001".to_string(),
            choice: CoinSide::Heads,
            outcome: CoinSide::Tails,
            won: false,
            timestamp: None,
        };

        assert!(event.is_from("0xabcdef0000000000000000000000000000000001"));
        assert!(!event.is_from("0xabcdef0000000000000000000000000000000002"));
    }
}
