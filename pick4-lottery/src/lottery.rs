use crate::access::AccessControl;
use crate::ledger::{GameLedger, LedgerCheckpoint};
use crate::oracle::{Delivery, DrawRequest, MockOracle, OracleClient, RandomnessOracle, VrfOracle};
use crate::payout::{PayoutEngine, Settlement};
use crate::round::{Bet, Round, RoundState};
use crate::treasury::Treasury;
use crate::{LotteryError, Result};
use pick4_core::{
    AccountBook, Address, Amount, Digits, LotteryConfig, OracleKind, RequestId, RoundId,
};
use serde::{Deserialize, Serialize};

/// Identity of the lottery itself, the requester on oracle requests.
pub const LOTTERY_ADDRESS: &str = "pick4:lottery";

/// Identity the oracle calls back with.
pub const ORACLE_ADDRESS: &str = "pick4:oracle";

/// Everything a transaction may touch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotteryState {
    pub(crate) ledger: GameLedger,
    pub(crate) oracle: OracleClient,
    pub(crate) treasury: Treasury,
    pub(crate) accounts: AccountBook,
}

/// Undo record for one transaction. The ledger part holds only what an
/// operation can change; the request book and balances are small.
struct Checkpoint {
    ledger: LedgerCheckpoint,
    oracle: OracleClient,
    treasury: Treasury,
    accounts: AccountBook,
}

impl LotteryState {
    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            ledger: self.ledger.checkpoint(),
            oracle: self.oracle.clone(),
            treasury: self.treasury.clone(),
            accounts: self.accounts.clone(),
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        self.ledger.rollback(checkpoint.ledger);
        self.oracle = checkpoint.oracle;
        self.treasury = checkpoint.treasury;
        self.accounts = checkpoint.accounts;
    }
}

/// The wired lottery: ledger, oracle, treasury and host balances.
///
/// Every mutating entry point runs as one transaction. A failure at any step
/// rolls the state back to where it started, so it leaves nothing behind. In
/// particular a fulfillment whose settlement fails leaves the round open and
/// the request pending.
#[derive(Debug, Clone)]
pub struct Lottery {
    config: LotteryConfig,
    engine: PayoutEngine,
    state: LotteryState,
}

impl Lottery {
    /// Wire a lottery with a deterministic mock oracle.
    pub fn with_mock_oracle(admin: Address, config: LotteryConfig) -> Result<Self> {
        let oracle = MockOracle::new(oracle_address()?, lottery_address()?);
        Self::new(admin, config, OracleClient::Mock(oracle))
    }

    /// Wire a lottery with a fee-funded VRF oracle trusting `provider_public_key`.
    pub fn with_vrf_oracle(
        admin: Address,
        config: LotteryConfig,
        provider_public_key: &str,
    ) -> Result<Self> {
        let oracle = VrfOracle::new(
            oracle_address()?,
            lottery_address()?,
            provider_public_key,
            &config.oracle,
        )?;
        Self::new(admin, config, OracleClient::Vrf(oracle))
    }

    pub fn new(admin: Address, config: LotteryConfig, oracle: OracleClient) -> Result<Self> {
        config.validate()?;

        let expected = match config.oracle.kind {
            OracleKind::Mock => "mock",
            OracleKind::Vrf => "vrf",
        };
        if oracle.kind() != expected {
            return Err(LotteryError::internal(format!(
                "configured for a {} oracle but wired to {}",
                expected,
                oracle.kind()
            )));
        }

        let ledger = GameLedger::new(
            lottery_address()?,
            AccessControl::new(admin.clone()),
            oracle.address().clone(),
            config.entry_price,
        );

        tracing::info!(
            "Lottery wired: admin {}, entry price {}, cut {}%, {} oracle",
            admin,
            config.entry_price,
            config.platform_cut_percent,
            oracle.kind()
        );

        Self::from_state(
            config,
            LotteryState {
                ledger,
                oracle,
                treasury: Treasury::new(),
                accounts: AccountBook::new(),
            },
        )
    }

    pub(crate) fn from_state(config: LotteryConfig, state: LotteryState) -> Result<Self> {
        Ok(Self {
            engine: PayoutEngine::from_config(&config)?,
            config,
            state,
        })
    }

    pub(crate) fn state(&self) -> &LotteryState {
        &self.state
    }

    fn transact<T>(
        &mut self,
        operation: &str,
        apply: impl FnOnce(&mut LotteryState, &PayoutEngine) -> Result<T>,
    ) -> Result<T> {
        let checkpoint = self.state.checkpoint();
        match apply(&mut self.state, &self.engine) {
            Ok(value) => Ok(value),
            Err(e) => {
                self.state.rollback(checkpoint);
                tracing::warn!("{} rejected: {}", operation, e);
                Err(e)
            }
        }
    }

    pub fn start_round(&mut self, caller: &Address) -> Result<RoundId> {
        self.transact("startRound", |state, _| state.ledger.start_round(caller))
    }

    /// Bet on the open round, paying `paid` out of the player's balance.
    pub fn place_bet(
        &mut self,
        player: &Address,
        digits: [u8; 4],
        paid: Amount,
    ) -> Result<usize> {
        self.transact("placeBet", |state, _| {
            let round_id = state
                .ledger
                .open_round()
                .ok_or(LotteryError::NoActiveRound)?;
            let index = state.ledger.place_bet(player, round_id, digits, paid)?;
            state.accounts.debit(player, paid)?;
            Ok(index)
        })
    }

    pub fn request_draw(&mut self, caller: &Address, seed: u64) -> Result<RequestId> {
        self.transact("requestDraw", |state, _| {
            state.ledger.request_draw(caller, seed, &mut state.oracle)
        })
    }

    /// Oracle delivery: accept the value, close and settle the round, credit
    /// winners and retain the rest, all in one step.
    pub fn fulfill_randomness(
        &mut self,
        request_id: &RequestId,
        delivery: &Delivery,
    ) -> Result<Settlement> {
        self.transact("fulfillRandomness", |state, engine| {
            let fulfillment = state.oracle.deliver(request_id, delivery)?;
            let settlement = state.ledger.on_randomness_fulfilled(
                state.oracle.address(),
                &fulfillment,
                engine,
            )?;

            for credit in &settlement.credits {
                state.accounts.credit(&credit.player, credit.amount)?;
            }
            state.treasury.retain(settlement.retained)?;

            let retired = state.oracle.retire_round(settlement.round_id);
            tracing::debug!("Retired {} requests of round {}", retired, settlement.round_id);

            tracing::info!(
                "Round {} settled: {} winners x {}, retained {}",
                settlement.round_id,
                settlement.winner_count,
                settlement.individual_prize,
                settlement.retained
            );
            Ok(settlement)
        })
    }

    /// Pay the whole retained balance to `recipient`. Admin only, never
    /// while a round is open.
    pub fn withdraw(&mut self, caller: &Address, recipient: &Address) -> Result<Amount> {
        self.transact("withdraw", |state, _| {
            let round_in_progress = state.ledger.open_round().is_some();
            let amount =
                state
                    .treasury
                    .withdraw(state.ledger.access(), caller, round_in_progress)?;
            state.accounts.credit(recipient, amount)?;

            tracing::info!("Withdrew {} to {}", amount, recipient);
            Ok(amount)
        })
    }

    /// Send fee tokens to the oracle.
    pub fn fund_oracle(&mut self, amount: Amount) -> Result<()> {
        self.transact("fundOracle", |state, _| state.oracle.fund(amount))
    }

    /// Credit native funds to `address` from outside the lottery.
    pub fn deposit(&mut self, address: &Address, amount: Amount) -> Result<()> {
        self.transact("deposit", |state, _| {
            state.accounts.deposit(address, amount)?;
            Ok(())
        })
    }

    pub fn config(&self) -> &LotteryConfig {
        &self.config
    }

    pub fn admin(&self) -> &Address {
        self.state.ledger.access().admin()
    }

    pub fn ledger(&self) -> &GameLedger {
        &self.state.ledger
    }

    pub fn oracle(&self) -> &OracleClient {
        &self.state.oracle
    }

    pub fn accounts(&self) -> &AccountBook {
        &self.state.accounts
    }

    pub fn current_round_id(&self) -> RoundId {
        self.state.ledger.current_round_id()
    }

    pub fn round_state(&self, round_id: RoundId) -> Result<RoundState> {
        self.state.ledger.round_state(round_id)
    }

    pub fn total_stake(&self, round_id: RoundId) -> Result<Amount> {
        self.state.ledger.total_stake(round_id)
    }

    pub fn round(&self, round_id: RoundId) -> Result<&Round> {
        self.state.ledger.round(round_id)
    }

    pub fn bet(&self, index: usize) -> Option<&Bet> {
        self.state.ledger.bet(index)
    }

    pub fn bets_for_round(&self, round_id: RoundId) -> Vec<&Bet> {
        self.state.ledger.bets_for_round(round_id)
    }

    pub fn drawn_digits(&self, round_id: RoundId) -> Result<Option<Digits>> {
        Ok(self.round(round_id)?.drawn)
    }

    pub fn last_settlement(&self, round_id: RoundId) -> Result<Option<&Settlement>> {
        Ok(self.round(round_id)?.settlement.as_ref())
    }

    /// Retained balance available to the administrator.
    pub fn get_balance(&self) -> Amount {
        self.state.treasury.get_balance()
    }

    /// All funds held by the lottery: retained plus the open round's stake.
    pub fn pool_balance(&self) -> Amount {
        self.get_balance() + self.state.ledger.open_stake()
    }

    pub fn balance_of(&self, address: &Address) -> Amount {
        self.state.accounts.balance_of(address)
    }

    pub fn pending_requests(&self) -> Vec<&DrawRequest> {
        self.state.oracle.pending_requests()
    }

    pub fn oracle_fee_balance(&self) -> Amount {
        self.state.oracle.fee_balance()
    }
}

fn lottery_address() -> Result<Address> {
    Ok(Address::new(LOTTERY_ADDRESS)?)
}

fn oracle_address() -> Result<Address> {
    Ok(Address::new(ORACLE_ADDRESS)?)
}
