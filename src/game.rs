use crate::events::CoinSide;
use alloy::primitives::{
    U256,
    utils::parse_ether,
};

/// Quick-pick stakes, in POL.
pub const STAKE_PRESETS: [&str; 6] = ["5", "10", "20", "30", "40", "50"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    AwaitingOutcome,
    Resolved {
        won: bool,
    },
    Withdrawing,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BetRejected {
    #[error("Connect a wallet to flip")]
    NoWallet,
    #[error("Enter a bet amount greater than zero")]
    InvalidStake,
    #[error("Still waiting for the previous flip")]
    Busy,
}

/// A validated bet, ready to be sent to the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BetTicket {
    pub side: CoinSide,
    /// In wei.
    pub stake: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Nothing to claim; the session is back to idle.
    PlayAgain,
    /// Winnings are withdrawable; call `finish_withdraw` once the withdraw returns.
    Withdraw,
}

/// Betting panel state: the selected side, the stake being typed, and where
/// the current flip is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BetSession {
    side: CoinSide,
    stake: String,
    phase: Phase,
}

impl Default for BetSession {
    fn default() -> Self {
        BetSession {
            side: CoinSide::Heads,
            stake: "0".to_string(),
            phase: Phase::Idle,
        }
    }
}

impl BetSession {
    pub fn side(&self) -> CoinSide {
        self.side
    }

    pub fn stake(&self) -> &str {
        &self.stake
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_awaiting(&self) -> bool {
        self.phase == Phase::AwaitingOutcome
    }

    pub fn choose(&mut self, side: CoinSide) {
        self.side = side;
    }

    pub fn set_stake(&mut self, stake: impl Into<String>) {
        self.stake = stake.into();
    }

    pub fn submit(&mut self, has_signer: bool) -> Result<BetTicket, BetRejected> {
        if self.phase != Phase::Idle {
            return Err(BetRejected::Busy);
        }
        if !has_signer {
            return Err(BetRejected::NoWallet);
        }
        let stake = parse_stake(&self.stake)?;
        self.phase = Phase::AwaitingOutcome;
        Ok(BetTicket {
            side: self.side,
            stake,
        })
    }

    /// A `Roll` for the connected player arrived. Returns `true` when it
    /// resolved the pending flip, i.e. the balance should be refreshed.
    pub fn record_outcome(&mut self, won: bool) -> bool {
        if !self.is_awaiting() {
            return false;
        }
        self.phase = Phase::Resolved { won };
        true
    }

    /// The flip transaction was rejected or never sent.
    pub fn submission_failed(&mut self) {
        if self.is_awaiting() {
            self.phase = Phase::Idle;
        }
    }

    /// "Claim Winnings" / "Play Again" on the result screen.
    pub fn settle(&mut self, withdrawable: U256) -> Option<Settlement> {
        if !matches!(self.phase, Phase::Resolved { .. }) {
            return None;
        }
        if withdrawable.is_zero() {
            self.phase = Phase::Idle;
            return Some(Settlement::PlayAgain);
        }
        self.phase = Phase::Withdrawing;
        Some(Settlement::Withdraw)
    }

    /// The withdraw issued by `settle` returned, successfully or not.
    pub fn finish_withdraw(&mut self) {
        if self.phase == Phase::Withdrawing {
            self.phase = Phase::Idle;
        }
    }
}

pub fn parse_stake(raw: &str) -> Result<U256, BetRejected> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('-') {
        return Err(BetRejected::InvalidStake);
    }
    let stake = parse_ether(raw).map_err(|_| BetRejected::InvalidStake)?;
    if stake.is_zero() {
        return Err(BetRejected::InvalidStake);
    }
    Ok(stake)
}

/// The standalone withdraw only goes out with a wallet and something to claim.
pub fn can_withdraw(has_signer: bool, withdrawable: U256) -> bool {
    has_signer && !withdrawable.is_zero()
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    fn one_pol() -> U256 {
        U256::from(10u64).pow(U256::from(18u64))
    }

    fn awaiting() -> BetSession {
        let mut session = BetSession::default();
        session.set_stake("5");
        session.submit(true).unwrap();
        session
    }

    #[test]
    fn submit__valid_stake__awaits_outcome_with_wei_amount() {
        // given
        let mut session = BetSession::default();
        session.choose(CoinSide::Tails);
        session.set_stake("0.5");

        // when
        let ticket = session.submit(true).unwrap();

        // then
        assert_eq!(CoinSide::Tails, ticket.side);
        assert_eq!(one_pol() / U256::from(2u64), ticket.stake);
        assert_eq!(Phase::AwaitingOutcome, session.phase());
    }

    #[test]
    fn submit__zero_or_garbage_stake__is_rejected_and_stays_idle() {
        for stake in ["0", "", "abc", "-1"] {
            let mut session = BetSession::default();
            session.set_stake(stake);

            assert_eq!(Err(BetRejected::InvalidStake), session.submit(true));
            assert_eq!(Phase::Idle, session.phase());
        }
    }

    #[test]
    fn submit__without_wallet__is_rejected() {
        let mut session = BetSession::default();
        session.set_stake("10");

        assert_eq!(Err(BetRejected::NoWallet), session.submit(false));
        assert_eq!(Phase::Idle, session.phase());
    }

    #[test]
    fn submit__while_awaiting__is_busy() {
        let mut session = awaiting();

        assert_eq!(Err(BetRejected::Busy), session.submit(true));
    }

    #[test]
    fn record_outcome__while_awaiting__resolves_and_requests_refresh() {
        let mut session = awaiting();

        let refresh = session.record_outcome(true);

        assert!(refresh);
        assert_eq!(Phase::Resolved { won: true }, session.phase());
    }

    #[test]
    fn record_outcome__when_idle__is_ignored() {
        let mut session = BetSession::default();

        assert!(!session.record_outcome(true));
        assert_eq!(Phase::Idle, session.phase());
    }

    #[test]
    fn submission_failed__while_awaiting__returns_to_idle() {
        let mut session = awaiting();

        session.submission_failed();

        assert_eq!(Phase::Idle, session.phase());
        assert_eq!("5", session.stake());
    }

    #[test]
    fn settle__zero_balance__plays_again() {
        let mut session = awaiting();
        session.record_outcome(false);

        assert_eq!(Some(Settlement::PlayAgain), session.settle(U256::ZERO));
        assert_eq!(Phase::Idle, session.phase());
    }

    #[test]
    fn settle__with_balance__withdraws_then_resets() {
        // given
        let mut session = awaiting();
        session.record_outcome(true);

        // when
        let settlement = session.settle(one_pol());
        let during = session.phase();
        session.finish_withdraw();

        // then
        assert_eq!(Some(Settlement::Withdraw), settlement);
        assert_eq!(Phase::Withdrawing, during);
        assert_eq!(Phase::Idle, session.phase());
    }

    #[test]
    fn settle__before_outcome__does_nothing() {
        let mut session = awaiting();

        assert_eq!(None, session.settle(one_pol()));
        assert_eq!(Phase::AwaitingOutcome, session.phase());
    }

    #[test]
    fn can_withdraw__needs_wallet_and_balance() {
        assert!(can_withdraw(true, one_pol()));
        assert!(!can_withdraw(false, one_pol()));
        assert!(!can_withdraw(true, U256::ZERO));
    }
}
