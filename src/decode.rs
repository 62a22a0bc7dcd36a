use crate::{
    abi::CoinFlip::Roll,
    error::DecodeError,
    events::{
        CoinSide,
        RollEvent,
    },
    explorer::RawLog,
};
use alloy::{
    primitives::{
        B256,
        U256,
    },
    sol_types::SolEvent,
};
use std::str::FromStr;

/// Result of decoding one explorer batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedBatch {
    pub events: Vec<RollEvent>,
    /// Highest parseable block number over every raw entry, decoded or not.
    pub raw_max_block: Option<u64>,
    pub failures: usize,
}

pub fn decode_batch(raw: &[RawLog]) -> DecodedBatch {
    let mut batch = DecodedBatch::default();
    for log in raw {
        if let Ok(height) = parse_hex_u64(&log.block_number) {
            batch.raw_max_block = batch.raw_max_block.max(Some(height));
        }
        match decode_log(log) {
            Ok(event) => batch.events.push(event),
            Err(e) => {
                tracing::warn!(
                    tx = %log.transaction_hash,
                    block = %log.block_number,
                    error = %e,
                    "skipping undecodable roll log"
                );
                batch.failures += 1;
            }
        }
    }
    batch
}

pub fn decode_log(log: &RawLog) -> Result<RollEvent, DecodeError> {
    let block_number = parse_hex_u64(&log.block_number)
        .map_err(|_| DecodeError::BlockNumber(log.block_number.clone()))?;
    let topics = log
        .topics
        .iter()
        .map(|t| B256::from_str(t).map_err(|_| DecodeError::Topic(t.clone())))
        .collect::<Result<Vec<_>, _>>()?;
    let data = hex::decode(strip_hex_prefix(&log.data))
        .map_err(|source| DecodeError::Hex {
            field: "data",
            source,
        })?;

    let roll = Roll::decode_raw_log(topics, &data)?;

    Ok(RollEvent {
        block_number,
        tx_hash: log.transaction_hash.clone(),
        player: roll.player.to_string(),
        choice: side("choice", roll.choice)?,
        outcome: side("outcome", roll.outcome)?,
        won: roll.won,
        timestamp: log
            .time_stamp
            .as_deref()
            .and_then(|ts| parse_hex_u64(ts).ok()),
    })
}

fn side(field: &'static str, value: U256) -> Result<CoinSide, DecodeError> {
    u64::try_from(value)
        .ok()
        .and_then(CoinSide::from_raw)
        .ok_or_else(|| DecodeError::Side {
            field,
            value: value.to_string(),
        })
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

pub fn parse_hex_u64(s: &str) -> Result<u64, std::num::ParseIntError> {
    u64::from_str_radix(strip_hex_prefix(s.trim()), 16)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::test_helpers::roll_log;
    use alloy::primitives::Address;

    fn alice() -> Address {
        Address::repeat_byte(0xa1)
    }

    #[test]
    fn decode_log__valid_roll__converts_every_field() {
        // given
        let log = roll_log("0x1", 100, alice(), 1, 0, false);

        // when
        let event = decode_log(&log).unwrap();

        // then
        assert_eq!(100, event.block_number);
        assert_eq!("0x1", event.tx_hash);
        assert!(event.is_from(&format!("{:#x}", alice())));
        assert_eq!(CoinSide::Tails, event.choice);
        assert_eq!(CoinSide::Heads, event.outcome);
        assert!(!event.won);
        assert_eq!(Some(0x65f0a1b2), event.timestamp);
    }

    #[test]
    fn decode_log__missing_timestamp__leaves_it_unset() {
        let mut log = roll_log("0x1", 100, alice(), 0, 0, true);
        log.time_stamp = None;

        let event = decode_log(&log).unwrap();

        assert_eq!(None, event.timestamp);
    }

    #[test]
    fn decode_log__side_out_of_range__fails() {
        let log = roll_log("0x1", 100, alice(), 7, 0, true);

        let err = decode_log(&log).unwrap_err();

        assert!(matches!(err, DecodeError::Side { field: "choice", .. }));
    }

    #[test]
    fn decode_log__truncated_data__fails() {
        let mut log = roll_log("0x1", 100, alice(), 0, 0, true);
        log.data = "0x0000".to_string();

        assert!(decode_log(&log).is_err());
    }

    #[test]
    fn decode_batch__one_malformed_entry__keeps_its_siblings() {
        // given
        let mut broken = roll_log("0x2", 101, alice(), 0, 1, false);
        broken.data = "0xzz".to_string();
        let raw = vec![
            roll_log("0x1", 100, alice(), 0, 0, true),
            broken,
            roll_log("0x3", 99, alice(), 1, 1, true),
        ];

        // when
        let batch = decode_batch(&raw);

        // then
        let txs: Vec<_> = batch.events.iter().map(|e| e.tx_hash.as_str()).collect();
        assert_eq!(vec!["0x1", "0x3"], txs);
        assert_eq!(1, batch.failures);
        assert_eq!(Some(101), batch.raw_max_block);
    }

    #[test]
    fn decode_batch__empty__has_no_max_block() {
        let batch = decode_batch(&[]);

        assert_eq!(DecodedBatch::default(), batch);
    }

    #[test]
    fn parse_hex_u64__accepts_prefixed_and_bare_hex() {
        assert_eq!(Ok(102), parse_hex_u64("0x66"));
        assert_eq!(Ok(102), parse_hex_u64("66"));
        assert!(parse_hex_u64("").is_err());
    }
}
