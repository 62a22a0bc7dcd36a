use crate::{
    abi::CoinFlip::{
        self,
        CoinFlipInstance,
    },
    events::CoinSide,
};
use alloy::{
    network::EthereumWallet,
    primitives::{
        Address,
        TxHash,
        U256,
    },
    providers::{
        DynProvider,
        Provider,
        ProviderBuilder,
    },
    signers::local::PrivateKeySigner,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use futures::StreamExt;
use std::time::Duration;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
};
use url::Url;

/// Longest wait for a flip to be mined before it counts as dropped.
const FLIP_RECEIPT_TIMEOUT: Duration = Duration::from_secs(180);

/// A `Roll` seen live for the connected player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollOutcome {
    pub won: bool,
    pub outcome: Option<CoinSide>,
    pub tx_hash: Option<TxHash>,
}

/// Live `Roll` subscription for one player. Dropping it stops the watcher.
pub struct RollWatch {
    outcomes: mpsc::UnboundedReceiver<RollOutcome>,
    task: JoinHandle<()>,
}

impl RollWatch {
    pub async fn next(&mut self) -> Option<RollOutcome> {
        self.outcomes.recv().await
    }
}

impl Drop for RollWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Receipt of a sent flip, awaited in the background. Dropping it stops the
/// wait.
pub struct FlipReceipt {
    task: JoinHandle<Result<TxHash>>,
}

impl FlipReceipt {
    /// Resolves once: `Ok` when the flip was mined successfully, `Err` when
    /// it reverted, timed out or the node lost track of it. Must not be
    /// awaited again after it resolved.
    pub async fn wait(&mut self) -> Result<TxHash> {
        match (&mut self.task).await {
            Ok(mined) => mined,
            Err(join) => Err(eyre!("flip receipt watcher stopped: {join}")),
        }
    }
}

impl Drop for FlipReceipt {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A flip the node accepted.
pub struct PlacedBet {
    pub tx_hash: TxHash,
    pub receipt: FlipReceipt,
}

#[derive(Clone)]
pub struct GameClient {
    contract: CoinFlipInstance<DynProvider>,
    player: Option<Address>,
}

impl GameClient {
    /// `signer` is needed for `place_bet` and `withdraw_winnings`; without
    /// one the client can only read.
    pub fn connect(rpc_url: Url, contract: Address, signer: Option<PrivateKeySigner>) -> Self {
        let player = signer.as_ref().map(|s| s.address());
        let provider = match signer {
            Some(signer) => ProviderBuilder::new()
                .wallet(EthereumWallet::from(signer))
                .connect_http(rpc_url)
                .erased(),
            None => ProviderBuilder::new().connect_http(rpc_url).erased(),
        };
        Self {
            contract: CoinFlip::new(contract, provider),
            player,
        }
    }

    pub fn player(&self) -> Option<Address> {
        self.player
    }

    pub fn contract_address(&self) -> Address {
        *self.contract.address()
    }

    fn require_player(&self) -> Result<Address> {
        self.player
            .ok_or_else(|| eyre!("No wallet unlocked; pass --keystore to play"))
    }

    /// Sends `flip(side)` with `stake` wei attached and returns once the
    /// node accepted the transaction; the receipt is awaited in the
    /// background.
    pub async fn place_bet(&self, side: CoinSide, stake: U256) -> Result<PlacedBet> {
        self.require_player()?;
        let pending = self
            .contract
            .flip(side.as_u256())
            .value(stake)
            .send()
            .await
            .wrap_err("flip transaction was rejected")?
            .with_timeout(Some(FLIP_RECEIPT_TIMEOUT));
        let tx_hash = *pending.tx_hash();
        tracing::info!(%tx_hash, %side, %stake, "flip submitted");
        let task = tokio::spawn(async move {
            let receipt = pending
                .get_receipt()
                .await
                .wrap_err_with(|| format!("flip {tx_hash} was not mined"))?;
            if !receipt.status() {
                return Err(eyre!("flip {tx_hash} reverted"));
            }
            tracing::debug!(%tx_hash, block = ?receipt.block_number, "flip mined");
            Ok(tx_hash)
        });
        Ok(PlacedBet {
            tx_hash,
            receipt: FlipReceipt { task },
        })
    }

    pub async fn withdraw_winnings(&self) -> Result<TxHash> {
        self.require_player()?;
        let receipt = self
            .contract
            .withdrawWinnings()
            .send()
            .await
            .wrap_err("withdraw transaction was rejected")?
            .get_receipt()
            .await
            .wrap_err("withdraw receipt not available")?;
        if !receipt.status() {
            return Err(eyre!(
                "withdraw transaction {} reverted",
                receipt.transaction_hash
            ));
        }
        tracing::info!(tx_hash = %receipt.transaction_hash, "winnings withdrawn");
        Ok(receipt.transaction_hash)
    }

    pub async fn player_balance(&self, player: Address) -> Result<U256> {
        self.contract
            .getPlayerBalance(player)
            .call()
            .await
            .wrap_err("getPlayerBalance call failed")
    }

    pub async fn block_number(&self) -> Result<u64> {
        self.contract
            .provider()
            .get_block_number()
            .await
            .wrap_err("eth_blockNumber failed")
    }

    /// Installs a `Roll` filter on the node and forwards the rolls of
    /// `player` until the returned watch is dropped.
    pub async fn watch_rolls(&self, player: Address) -> Result<RollWatch> {
        let poller = self
            .contract
            .Roll_filter()
            .watch()
            .await
            .wrap_err("failed to install Roll filter")?;
        let mut stream = poller.into_stream();
        let (tx, outcomes) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok((roll, log)) => {
                        if roll.player != player {
                            continue;
                        }
                        let outcome = RollOutcome {
                            won: roll.won,
                            outcome: u64::try_from(roll.outcome)
                                .ok()
                                .and_then(CoinSide::from_raw),
                            tx_hash: log.transaction_hash,
                        };
                        tracing::debug!(?outcome, "roll observed for player");
                        if tx.send(outcome).is_err() {
                            break;
                        }
                    }
                    Err(error) => tracing::warn!(%error, "undecodable Roll from filter"),
                }
            }
        });
        Ok(RollWatch { outcomes, task })
    }
}
