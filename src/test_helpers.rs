use crate::{
    abi::CoinFlip::Roll,
    error::FeedError,
    explorer::{
        LogSource,
        RawLog,
    },
};
use alloy::{
    primitives::{
        Address,
        U256,
    },
    sol_types::SolEvent,
};
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        Mutex,
    },
    time::Duration,
};

/// An explorer entry for a well-formed `Roll` log.
pub fn roll_log(
    tx: &str,
    block: u64,
    player: Address,
    choice: u64,
    outcome: u64,
    won: bool,
) -> RawLog {
    let roll = Roll {
        player,
        choice: U256::from(choice),
        outcome: U256::from(outcome),
        won,
    };
    RawLog {
        address: "0x74e7f9c3056f4921c3f0078de2b8c662265bb66c".to_string(),
        topics: vec![Roll::SIGNATURE_HASH.to_string()],
        data: format!("0x{}", hex::encode(roll.encode_data())),
        block_number: format!("0x{block:x}"),
        time_stamp: Some("0x65f0a1b2".to_string()),
        transaction_hash: tx.to_string(),
    }
}

pub struct ScriptedResponse {
    pub delay: Duration,
    pub result: Result<Vec<RawLog>, FeedError>,
}

impl ScriptedResponse {
    pub fn ok(logs: Vec<RawLog>) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(logs),
        }
    }

    pub fn err(error: FeedError) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(error),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Replays queued responses in order and records every `from_block` asked for.
/// Once the script runs dry every further poll answers with an empty batch.
#[derive(Clone, Default)]
pub struct FakeLogSource {
    script: Arc<Mutex<VecDeque<ScriptedResponse>>>,
    requests: Arc<Mutex<Vec<u64>>>,
}

impl FakeLogSource {
    pub fn new(script: Vec<ScriptedResponse>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            requests: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<u64> {
        self.requests.lock().unwrap().clone()
    }
}

impl LogSource for FakeLogSource {
    async fn fetch_logs(&self, from_block: u64) -> Result<Vec<RawLog>, FeedError> {
        self.requests.lock().unwrap().push(from_block);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(response) => {
                if !response.delay.is_zero() {
                    tokio::time::sleep(response.delay).await;
                }
                response.result
            }
            None => Ok(Vec::new()),
        }
    }
}
