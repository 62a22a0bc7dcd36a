use crate::ui;
use alloy::{
    primitives::{
        Address,
        TxHash,
        U256,
    },
    signers::local::PrivateKeySigner,
};
use coinflip_client::{
    config::{
        AppConfig,
        WalletConfig,
    },
    contract::{
        FlipReceipt,
        GameClient,
        PlacedBet,
        RollOutcome,
        RollWatch,
    },
    events::CoinSide,
    explorer::ExplorerClient,
    feed::{
        EventFeed,
        FeedState,
    },
    game::{
        BetSession,
        Phase,
        STAKE_PRESETS,
        Settlement,
        can_withdraw,
    },
    view::{
        FeedView,
        PlayerFilter,
        format_pol,
        short_address,
    },
    wallets,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{
    error,
    info,
};

const EXPLORER_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_ERRORS: usize = 50;

#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub wallet_label: String,
    pub contract: Address,
    pub balance: Option<String>,
    pub can_flip: bool,
    pub phase: Phase,
    pub side: CoinSide,
    pub stake: String,
    pub settle_label: &'static str,
    pub recent: FeedView,
    pub own: FeedView,
    pub status: String,
    pub errors: Vec<String>,
}

pub struct AppController {
    game: GameClient,
    /// Address whose bets the "Your Bets" panel follows.
    watched: Option<Address>,
    session: BetSession,
    balance: Option<U256>,
    pub status: String,
    pub errors: Vec<String>,
    recent_feed: EventFeed,
    own_feed: EventFeed,
    roll_watch: Option<RollWatch>,
    flip_receipt: Option<FlipReceipt>,
}

impl AppController {
    pub fn new(config: &AppConfig, signer: Option<PrivateKeySigner>) -> Self {
        let watched = match (&signer, &config.wallet) {
            (Some(signer), _) => Some(signer.address()),
            (None, WalletConfig::WatchOnly(address)) => Some(*address),
            _ => None,
        };
        let game = GameClient::connect(config.rpc_url.clone(), config.contract, signer);
        let explorer = || {
            ExplorerClient::new(
                config.explorer_url.as_str(),
                config.api_key.clone(),
                config.contract,
                EXPLORER_TIMEOUT,
            )
        };
        let recent_feed = EventFeed::mount(explorer(), config.poll_interval);
        let own_feed = EventFeed::mount(explorer(), config.poll_interval);
        Self::from_parts(game, watched, recent_feed, own_feed)
    }

    fn from_parts(
        game: GameClient,
        watched: Option<Address>,
        recent_feed: EventFeed,
        own_feed: EventFeed,
    ) -> Self {
        let status = match watched {
            Some(address) if game.player().is_some() => {
                format!("Playing as {address}")
            }
            Some(address) => format!("Watching {address}"),
            None => "No wallet connected; showing recent flips only".to_string(),
        };
        Self {
            game,
            watched,
            session: BetSession::default(),
            balance: None,
            status,
            errors: Vec::new(),
            recent_feed,
            own_feed,
            roll_watch: None,
            flip_receipt: None,
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
        info!(status = %self.status);
    }

    fn push_errors(&mut self, mut items: Vec<String>) {
        if items.is_empty() {
            return;
        }
        for item in &items {
            error!("{}", item);
        }
        self.errors.append(&mut items);
        if self.errors.len() > MAX_ERRORS {
            let drain = self.errors.len() - MAX_ERRORS;
            self.errors.drain(0..drain);
        }
    }

    pub fn subscriptions(&self) -> (watch::Receiver<FeedState>, watch::Receiver<FeedState>) {
        (self.recent_feed.subscribe(), self.own_feed.subscribe())
    }

    pub fn snapshot(&self) -> AppSnapshot {
        let wallet_label = match (self.game.player(), self.watched) {
            (Some(address), _) => short_address(&address.to_string()),
            (None, Some(address)) => {
                format!("{} (watch only)", short_address(&address.to_string()))
            }
            (None, None) => "Not connected".to_string(),
        };
        let settle_label = if self.balance.is_some_and(|b| !b.is_zero()) {
            "Claim Winnings"
        } else {
            "Play Again"
        };
        let own_filter = PlayerFilter::Wallet(self.watched.map(|a| a.to_string()));
        AppSnapshot {
            wallet_label,
            contract: self.game.contract_address(),
            balance: self.balance.map(format_pol),
            can_flip: self.game.player().is_some() && self.session.phase() == Phase::Idle,
            phase: self.session.phase(),
            side: self.session.side(),
            stake: self.session.stake().to_string(),
            settle_label,
            recent: PlayerFilter::AllPlayers.render(&self.recent_feed.state()),
            own: own_filter.render(&self.own_feed.state()),
            status: self.status.clone(),
            errors: self.errors.clone(),
        }
    }

    pub fn choose_side(&mut self, side: CoinSide) {
        if self.session.phase() == Phase::Idle {
            self.session.choose(side);
        }
    }

    pub fn toggle_side(&mut self) {
        let side = self.session.side().flipped();
        self.choose_side(side);
    }

    pub fn preset_stake(&mut self, index: usize) {
        if let Some(stake) = STAKE_PRESETS.get(index) {
            self.set_stake(*stake);
        }
    }

    pub fn set_stake(&mut self, stake: impl Into<String>) {
        if self.session.phase() == Phase::Idle {
            self.session.set_stake(stake);
        }
    }

    /// Fail fast on an unreachable RPC node instead of at the first flip.
    pub async fn check_node(&self) -> Result<()> {
        let head = self.game.block_number().await?;
        info!(head, "RPC node reachable");
        Ok(())
    }

    pub async fn refresh_balance(&mut self) -> Result<()> {
        let Some(player) = self.watched else {
            self.balance = None;
            return Ok(());
        };
        self.balance = Some(self.game.player_balance(player).await?);
        Ok(())
    }

    /// Submit the bet on the panel. The roll filter is installed before the
    /// transaction goes out so the outcome cannot be missed.
    pub async fn flip(&mut self) -> Result<()> {
        let ticket = match self.session.submit(self.game.player().is_some()) {
            Ok(ticket) => ticket,
            Err(rejected) => {
                self.set_status(rejected.to_string());
                return Ok(());
            }
        };
        let submitted = async {
            let player = self
                .game
                .player()
                .ok_or_else(|| eyre!("No wallet unlocked"))?;
            let watch = self.game.watch_rolls(player).await?;
            let placed = self.game.place_bet(ticket.side, ticket.stake).await?;
            Ok::<_, color_eyre::Report>((watch, placed))
        }
        .await;
        match submitted {
            Ok((watch, PlacedBet { tx_hash, receipt })) => {
                self.roll_watch = Some(watch);
                self.flip_receipt = Some(receipt);
                self.set_status(format!(
                    "Flip submitted ({}); waiting for the outcome...",
                    hash_preview(&tx_hash)
                ));
                Ok(())
            }
            Err(e) => {
                self.session.submission_failed();
                self.set_status("Flip not sent");
                Err(e)
            }
        }
    }

    pub async fn handle_roll(&mut self, outcome: RollOutcome) -> Result<()> {
        if !self.session.record_outcome(outcome.won) {
            return Ok(());
        }
        self.roll_watch = None;
        self.flip_receipt = None;
        let landed = outcome
            .outcome
            .map(|side| format!("Coin landed on {side}. "))
            .unwrap_or_default();
        let verdict = if outcome.won { "YOU WON!" } else { "YOU LOST." };
        self.set_status(format!("{landed}{verdict}"));
        self.refresh_balance().await
    }

    /// Without the subscription no outcome can arrive, so a pending flip is
    /// released; its result still lands in "Your Bets".
    pub fn roll_watch_closed(&mut self) {
        self.roll_watch = None;
        if self.session.is_awaiting() {
            self.session.submission_failed();
            self.flip_receipt = None;
            self.set_status("Lost the Roll subscription; the outcome will show up in Your Bets");
        }
    }

    /// The receipt of the pending flip came back. A reverted or dropped flip
    /// never emits a `Roll`, so the session goes back to idle.
    pub fn flip_confirmed(&mut self, mined: Result<TxHash>) -> Result<()> {
        self.flip_receipt = None;
        match mined {
            Ok(tx_hash) => {
                info!(%tx_hash, "flip mined, waiting for its Roll");
                Ok(())
            }
            Err(e) => {
                if self.session.is_awaiting() {
                    self.session.submission_failed();
                    self.roll_watch = None;
                    self.set_status("Flip failed; pick a side and try again");
                }
                Err(e)
            }
        }
    }

    /// Whether settling the result screen sends a withdraw.
    pub fn settle_withdraws(&self) -> bool {
        matches!(self.session.phase(), Phase::Resolved { .. })
            && self.balance.is_some_and(|b| !b.is_zero())
    }

    /// "Claim Winnings" / "Play Again" on the result screen.
    pub async fn settle(&mut self) -> Result<()> {
        let withdrawable = self.balance.unwrap_or_default();
        match self.session.settle(withdrawable) {
            None => Ok(()),
            Some(Settlement::PlayAgain) => {
                self.set_status("Pick a side and flip again");
                Ok(())
            }
            Some(Settlement::Withdraw) => {
                let withdrawn = self.game.withdraw_winnings().await;
                self.session.finish_withdraw();
                self.after_withdraw(withdrawn).await
            }
        }
    }

    pub async fn withdraw(&mut self) -> Result<()> {
        let withdrawable = self.balance.unwrap_or_default();
        if !can_withdraw(self.game.player().is_some(), withdrawable) {
            self.set_status("Nothing to withdraw");
            return Ok(());
        }
        let withdrawn = self.game.withdraw_winnings().await;
        self.after_withdraw(withdrawn).await
    }

    async fn after_withdraw(&mut self, withdrawn: Result<TxHash>) -> Result<()> {
        let tx_hash = withdrawn?;
        self.set_status(format!("Winnings withdrawn ({})", hash_preview(&tx_hash)));
        self.refresh_balance().await
    }

    pub fn shutdown(self) {
        self.recent_feed.shutdown();
        self.own_feed.shutdown();
    }
}

fn hash_preview(hash: &TxHash) -> String {
    short_address(&hash.to_string())
}

/// Unlock the configured keystore. Runs before the TUI takes the terminal so
/// the password prompt is readable.
fn unlock_signer(config: &AppConfig) -> Result<Option<PrivateKeySigner>> {
    let WalletConfig::Keystore { name, dir } = &config.wallet else {
        return Ok(None);
    };
    let descriptor = wallets::find_keystore(dir, name)?;
    let signer = wallets::unlock_keystore(&descriptor)?;
    info!(address = %signer.address(), keystore = %descriptor.name, "keystore unlocked");
    Ok(Some(signer))
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let signer = unlock_signer(&config)?;
    let controller = AppController::new(&config, signer);
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(controller, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    res
}

fn show_processing_status(
    controller: &mut AppController,
    ui_state: &mut ui::UiState,
    message: impl Into<String>,
    context: &'static str,
) -> Result<()> {
    controller.set_status(message);
    ui::draw(ui_state, &controller.snapshot()).wrap_err(context)
}

fn sync_error(controller: &mut AppController, what: &str, result: Result<()>) {
    if let Err(e) = result {
        controller.push_errors(vec![format!("{what}: {e:#}")]);
    }
}

async fn next_receipt(receipt: &mut Option<FlipReceipt>) -> Result<TxHash> {
    match receipt {
        Some(receipt) => receipt.wait().await,
        None => std::future::pending().await,
    }
}

async fn next_roll(watch: &mut Option<RollWatch>) -> Option<RollOutcome> {
    match watch {
        Some(watch) => watch.next().await,
        None => std::future::pending().await,
    }
}

async fn run_loop(
    mut controller: AppController,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    info!("Running app loop");
    let (mut recent_rx, mut own_rx) = controller.subscriptions();
    let mut recent_live = true;
    let mut own_live = true;

    ui::draw(ui_state, &controller.snapshot()).wrap_err("initial draw failed")?;
    let node = controller.check_node().await;
    sync_error(&mut controller, "RPC node unreachable", node);
    let balance = controller.refresh_balance().await;
    sync_error(&mut controller, "Balance refresh failed", balance);

    loop {
        ui::draw(ui_state, &controller.snapshot()).wrap_err("draw failed")?;
        tokio::select! {
            changed = recent_rx.changed(), if recent_live => {
                recent_live = changed.is_ok();
            }
            changed = own_rx.changed(), if own_live => {
                own_live = changed.is_ok();
            }
            outcome = next_roll(&mut controller.roll_watch) => {
                match outcome {
                    Some(outcome) => {
                        let res = controller.handle_roll(outcome).await;
                        sync_error(&mut controller, "Balance refresh failed", res);
                    }
                    None => controller.roll_watch_closed(),
                }
            }
            mined = next_receipt(&mut controller.flip_receipt) => {
                let res = controller.flip_confirmed(mined);
                sync_error(&mut controller, "Flip failed", res);
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::ChooseSide(side) => controller.choose_side(side),
                    ui::UserEvent::ToggleSide => controller.toggle_side(),
                    ui::UserEvent::PresetStake(idx) => controller.preset_stake(idx),
                    ui::UserEvent::SetStake(stake) => controller.set_stake(stake),
                    ui::UserEvent::Flip => {
                        if controller.snapshot().can_flip {
                            show_processing_status(
                                &mut controller,
                                ui_state,
                                "Submitting flip...",
                                "draw while submitting flip failed",
                            )?;
                        }
                        let res = controller.flip().await;
                        sync_error(&mut controller, "Flip failed", res);
                    }
                    ui::UserEvent::Settle => {
                        if controller.settle_withdraws() {
                            show_processing_status(
                                &mut controller,
                                ui_state,
                                "Withdrawing...",
                                "draw while withdrawing failed",
                            )?;
                        }
                        let res = controller.settle().await;
                        sync_error(&mut controller, "Withdraw failed", res);
                    }
                    ui::UserEvent::Withdraw => {
                        show_processing_status(
                            &mut controller,
                            ui_state,
                            "Withdrawing...",
                            "draw while withdrawing failed",
                        )?;
                        let res = controller.withdraw().await;
                        sync_error(&mut controller, "Withdraw failed", res);
                    }
                    ui::UserEvent::RefreshBalance => {
                        let res = controller.refresh_balance().await;
                        sync_error(&mut controller, "Balance refresh failed", res);
                    }
                    ui::UserEvent::OpenStakeModal
                    | ui::UserEvent::OpenHowToPlay
                    | ui::UserEvent::Redraw => {}
                }
            }
        }
    }
    controller.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use coinflip_client::test_helpers::{
        FakeLogSource,
        ScriptedResponse,
        roll_log,
    };
    use url::Url;

    fn offline_game(signer: Option<PrivateKeySigner>) -> GameClient {
        let rpc = Url::parse("http://127.0.0.1:1").unwrap();
        GameClient::connect(rpc, Address::repeat_byte(0x74), signer)
    }

    fn feed(script: Vec<ScriptedResponse>) -> EventFeed {
        EventFeed::spawn(FakeLogSource::new(script), Duration::from_secs(5))
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot__without_wallet__shows_recent_flips_and_connect_prompt() {
        // given
        let alice = Address::repeat_byte(0xa1);
        let logs = vec![roll_log("0x1", 100, alice, 0, 0, true)];
        let controller = AppController::from_parts(
            offline_game(None),
            None,
            feed(vec![ScriptedResponse::ok(logs.clone())]),
            feed(vec![ScriptedResponse::ok(logs)]),
        );

        // when
        tokio::time::sleep(Duration::from_millis(10)).await;
        let snap = controller.snapshot();

        // then
        assert!(matches!(snap.recent, FeedView::Rows { ref rows, .. } if rows.len() == 1));
        assert_eq!(FeedView::ConnectWallet, snap.own);
        assert!(!snap.can_flip);
        assert_eq!("Not connected", snap.wallet_label);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot__watch_only__filters_own_bets() {
        // given
        let alice = Address::repeat_byte(0xa1);
        let bob = Address::repeat_byte(0xb0);
        let logs = vec![
            roll_log("0x1", 100, alice, 0, 0, true),
            roll_log("0x2", 101, bob, 1, 0, false),
        ];
        let controller = AppController::from_parts(
            offline_game(None),
            Some(alice),
            feed(vec![ScriptedResponse::ok(logs.clone())]),
            feed(vec![ScriptedResponse::ok(logs)]),
        );

        // when
        tokio::time::sleep(Duration::from_millis(10)).await;
        let snap = controller.snapshot();

        // then
        let FeedView::Rows { rows, .. } = snap.own else {
            panic!("expected own rows");
        };
        assert_eq!(1, rows.len());
        assert_eq!("You chose Heads and Won", rows[0].text);
        assert!(snap.wallet_label.ends_with("(watch only)"));
    }

    #[tokio::test]
    async fn flip__without_signer__is_refused_without_touching_the_chain() {
        // given
        let mut controller = AppController::from_parts(
            offline_game(None),
            None,
            EventFeed::blocked(coinflip_client::error::FeedError::MissingCredential),
            EventFeed::blocked(coinflip_client::error::FeedError::MissingCredential),
        );
        controller.preset_stake(0);

        // when
        controller.flip().await.unwrap();

        // then
        assert_eq!("Connect a wallet to flip", controller.status);
        assert_eq!(Phase::Idle, controller.snapshot().phase);
    }

    #[tokio::test]
    async fn push_errors__keeps_the_last_fifty() {
        let mut controller = AppController::from_parts(
            offline_game(None),
            None,
            EventFeed::blocked(coinflip_client::error::FeedError::MissingCredential),
            EventFeed::blocked(coinflip_client::error::FeedError::MissingCredential),
        );

        controller.push_errors((0..60).map(|i| format!("error {i}")).collect());

        assert_eq!(MAX_ERRORS, controller.errors.len());
        assert_eq!("error 10", controller.errors[0]);
    }

    #[tokio::test]
    async fn preset_stake__picks_from_the_quick_list() {
        let mut controller = AppController::from_parts(
            offline_game(None),
            None,
            EventFeed::blocked(coinflip_client::error::FeedError::MissingCredential),
            EventFeed::blocked(coinflip_client::error::FeedError::MissingCredential),
        );

        controller.preset_stake(2);
        controller.preset_stake(99);

        assert_eq!("20", controller.snapshot().stake);
    }

    #[tokio::test]
    async fn check_node__unreachable_rpc__is_an_error() {
        let controller = AppController::from_parts(
            offline_game(None),
            None,
            EventFeed::blocked(coinflip_client::error::FeedError::MissingCredential),
            EventFeed::blocked(coinflip_client::error::FeedError::MissingCredential),
        );

        let err = controller.check_node().await.unwrap_err();

        assert!(format!("{err:#}").contains("eth_blockNumber failed"));
    }

    fn awaiting_controller() -> AppController {
        let mut controller = AppController::from_parts(
            offline_game(None),
            None,
            EventFeed::blocked(coinflip_client::error::FeedError::MissingCredential),
            EventFeed::blocked(coinflip_client::error::FeedError::MissingCredential),
        );
        controller.session.set_stake("5");
        controller.session.submit(true).unwrap();
        controller
    }

    #[tokio::test]
    async fn roll_watch_closed__while_awaiting__frees_the_session_for_another_flip() {
        // given
        let mut controller = awaiting_controller();

        // when
        controller.roll_watch_closed();

        // then
        assert_eq!(Phase::Idle, controller.snapshot().phase);
        assert!(controller.session.submit(true).is_ok());
    }

    #[tokio::test]
    async fn flip_confirmed__reverted_flip__returns_to_idle_and_reports() {
        // given
        let mut controller = awaiting_controller();

        // when
        let res = controller.flip_confirmed(Err(eyre!("flip 0xabc reverted")));

        // then
        assert!(res.unwrap_err().to_string().contains("reverted"));
        assert_eq!(Phase::Idle, controller.snapshot().phase);
        assert_eq!("Flip failed; pick a side and try again", controller.status);
        assert!(controller.session.submit(true).is_ok());
    }

    #[tokio::test]
    async fn flip_confirmed__mined_flip__keeps_waiting_for_the_roll() {
        let mut controller = awaiting_controller();

        controller.flip_confirmed(Ok(TxHash::repeat_byte(0xab))).unwrap();

        assert_eq!(Phase::AwaitingOutcome, controller.snapshot().phase);
    }

    #[tokio::test]
    async fn flip_confirmed__failure_after_outcome__leaves_result_screen() {
        // given
        let mut controller = awaiting_controller();
        controller.session.record_outcome(true);

        // when
        let res = controller.flip_confirmed(Err(eyre!("flip 0xabc was not mined")));

        // then
        assert!(res.is_err());
        assert_eq!(Phase::Resolved { won: true }, controller.snapshot().phase);
    }

    #[tokio::test]
    async fn settle_withdraws__only_on_a_result_with_balance() {
        // given
        let mut controller = awaiting_controller();
        controller.balance = Some(U256::from(1u64));
        assert!(!controller.settle_withdraws());

        // when
        controller.session.record_outcome(true);

        // then
        assert!(controller.settle_withdraws());
        controller.balance = Some(U256::ZERO);
        assert!(!controller.settle_withdraws());
    }
}
