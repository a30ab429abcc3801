use crate::access::AccessControl;
use crate::oracle::{Fulfillment, RandomnessOracle};
use crate::payout::{PayoutEngine, Settlement};
use crate::round::{Bet, Round, RoundState};
use crate::{LotteryError, Result};
use pick4_core::{Address, Amount, CoreError, Digits, RequestId, RoundId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ledger state needed to undo one operation.
#[derive(Debug, Clone)]
pub(crate) struct LedgerCheckpoint {
    current_round_id: RoundId,
    open_round: Option<Round>,
    bet_count: usize,
}

/// Round table and bet log of the lottery.
///
/// At most one round is open at a time; `open_round` is that slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameLedger {
    pub(crate) address: Address,
    pub(crate) access: AccessControl,
    pub(crate) oracle_address: Address,
    pub(crate) entry_price: Amount,
    pub(crate) rounds: BTreeMap<RoundId, Round>,
    pub(crate) bets: Vec<Bet>,
    pub(crate) current_round_id: RoundId,
    pub(crate) open_round: Option<RoundId>,
}

impl GameLedger {
    pub fn new(
        address: Address,
        access: AccessControl,
        oracle_address: Address,
        entry_price: Amount,
    ) -> Self {
        Self {
            address,
            access,
            oracle_address,
            entry_price,
            rounds: BTreeMap::new(),
            bets: Vec::new(),
            current_round_id: 0,
            open_round: None,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn oracle_address(&self) -> &Address {
        &self.oracle_address
    }

    pub fn entry_price(&self) -> Amount {
        self.entry_price
    }

    /// Open the next round. Admin only.
    pub fn start_round(&mut self, caller: &Address) -> Result<RoundId> {
        self.access.require_admin(caller)?;
        if self.open_round.is_some() {
            return Err(LotteryError::RoundAlreadyOpen);
        }

        let round_id = self.current_round_id + 1;
        self.rounds.insert(round_id, Round::open(round_id));
        self.current_round_id = round_id;
        self.open_round = Some(round_id);

        tracing::info!("Round {} opened", round_id);
        Ok(round_id)
    }

    /// Record a bet on an open round and return its index in the bet log.
    ///
    /// Checks run in order: round open, digits (first bad position wins),
    /// then the exact entry price.
    pub fn place_bet(
        &mut self,
        player: &Address,
        round_id: RoundId,
        digits: [u8; 4],
        paid: Amount,
    ) -> Result<usize> {
        let entry_price = self.entry_price;
        let round = self
            .rounds
            .get_mut(&round_id)
            .filter(|round| round.is_open())
            .ok_or(LotteryError::NoActiveRound)?;

        let digits =
            Digits::try_from(digits).map_err(|position| LotteryError::InvalidDigit { position })?;

        if paid != entry_price {
            return Err(LotteryError::InvalidPayment {
                expected: entry_price,
                paid,
            });
        }

        round.total_stake = round
            .total_stake
            .checked_add(paid)
            .ok_or_else(|| CoreError::overflow(format!("stake of round {}", round_id)))?;

        self.bets.push(Bet {
            player: player.clone(),
            round_id,
            amount: paid,
            digits,
        });

        tracing::debug!("Bet {} by {} on round {}", digits, player, round_id);
        Ok(self.bets.len() - 1)
    }

    /// Ask the oracle for randomness for the open round. Admin only.
    ///
    /// Returns immediately; the round stays open, and keeps accepting bets,
    /// until the matching fulfillment arrives.
    pub fn request_draw<O>(
        &mut self,
        caller: &Address,
        seed: u64,
        oracle: &mut O,
    ) -> Result<RequestId>
    where
        O: RandomnessOracle + ?Sized,
    {
        self.access.require_admin(caller)?;
        let round_id = self.open_round.ok_or(LotteryError::NoActiveRound)?;

        let request_id = oracle.request_random(&self.address, round_id, seed)?;
        if let Some(round) = self.rounds.get_mut(&round_id) {
            if let Some(previous) = round.draw_request.replace(request_id.clone()) {
                tracing::warn!(
                    "Round {} draw request {} superseded by {}",
                    round_id,
                    previous.short(),
                    request_id.short()
                );
            }
        }

        tracing::info!("Draw requested for round {}: {}", round_id, request_id);
        Ok(request_id)
    }

    /// Oracle callback: record the draw, close the round and settle it.
    ///
    /// Only the registered oracle may call this, and only for the round's
    /// outstanding request. Validation happens before any mutation.
    pub fn on_randomness_fulfilled(
        &mut self,
        caller: &Address,
        fulfillment: &Fulfillment,
        engine: &PayoutEngine,
    ) -> Result<Settlement> {
        if caller != &self.oracle_address {
            return Err(LotteryError::Unauthorized);
        }

        let round_id = fulfillment.round_id;
        let outstanding = self
            .rounds
            .get(&round_id)
            .filter(|round| round.is_open())
            .and_then(|round| round.draw_request.as_ref());
        if outstanding != Some(&fulfillment.request_id) {
            return Err(LotteryError::UnknownOrFulfilledRequest(
                fulfillment.request_id.clone(),
            ));
        }

        let drawn = Digits::from_random(fulfillment.random_value);
        let round_bets = self.bets.iter().filter(|bet| bet.round_id == round_id);
        let settlement = engine.settle(round_id, round_bets, drawn)?;

        let round = self
            .rounds
            .get_mut(&round_id)
            .ok_or(LotteryError::RoundNotFound(round_id))?;
        round.random_value = Some(fulfillment.random_value);
        round.drawn = Some(drawn);
        round.draw_request = None;
        round.state = RoundState::Closed;
        round.settlement = Some(settlement.clone());
        self.open_round = None;

        tracing::info!(
            "Round {} closed with {} (stake {}, {} winners)",
            round_id,
            drawn,
            settlement.total_stake,
            settlement.winner_count
        );
        Ok(settlement)
    }

    pub fn current_round_id(&self) -> RoundId {
        self.current_round_id
    }

    pub fn open_round(&self) -> Option<RoundId> {
        self.open_round
    }

    pub fn round(&self, round_id: RoundId) -> Result<&Round> {
        self.rounds
            .get(&round_id)
            .ok_or(LotteryError::RoundNotFound(round_id))
    }

    pub fn round_state(&self, round_id: RoundId) -> Result<RoundState> {
        Ok(self.round(round_id)?.state)
    }

    pub fn total_stake(&self, round_id: RoundId) -> Result<Amount> {
        Ok(self.round(round_id)?.total_stake)
    }

    pub fn rounds(&self) -> impl Iterator<Item = &Round> {
        self.rounds.values()
    }

    /// Rounds with an id of at least `first`.
    pub fn rounds_since(&self, first: RoundId) -> impl Iterator<Item = &Round> {
        self.rounds.range(first..).map(|(_, round)| round)
    }

    pub fn bets(&self) -> &[Bet] {
        &self.bets
    }

    pub fn bet(&self, index: usize) -> Option<&Bet> {
        self.bets.get(index)
    }

    pub fn bets_for_round(&self, round_id: RoundId) -> Vec<&Bet> {
        self.bets
            .iter()
            .filter(|bet| bet.round_id == round_id)
            .collect()
    }

    /// Capture what a single operation can change: the round counters, the
    /// open round and the length of the bet log. Closed rounds and settled
    /// bets are never touched again, so they are not copied.
    pub(crate) fn checkpoint(&self) -> LedgerCheckpoint {
        LedgerCheckpoint {
            current_round_id: self.current_round_id,
            open_round: self
                .open_round
                .and_then(|id| self.rounds.get(&id))
                .cloned(),
            bet_count: self.bets.len(),
        }
    }

    pub(crate) fn rollback(&mut self, checkpoint: LedgerCheckpoint) {
        self.bets.truncate(checkpoint.bet_count);
        let _ = self.rounds.split_off(&(checkpoint.current_round_id + 1));
        self.current_round_id = checkpoint.current_round_id;
        self.open_round = checkpoint.open_round.as_ref().map(|round| round.id);
        if let Some(round) = checkpoint.open_round {
            self.rounds.insert(round.id, round);
        }
    }

    /// Stake of the open round, not yet settled.
    pub fn open_stake(&self) -> Amount {
        self.open_round
            .and_then(|id| self.rounds.get(&id))
            .map(|round| round.total_stake)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{Delivery, MockOracle};

    const PRICE: Amount = 100;

    fn addr(name: &str) -> Address {
        Address::new(name).unwrap()
    }

    fn engine() -> PayoutEngine {
        PayoutEngine::new(10).unwrap()
    }

    fn setup() -> (GameLedger, MockOracle) {
        let ledger = GameLedger::new(
            addr("pick4:lottery"),
            AccessControl::new(addr("admin")),
            addr("pick4:oracle"),
            PRICE,
        );
        let oracle = MockOracle::new(addr("pick4:oracle"), addr("pick4:lottery"));
        (ledger, oracle)
    }

    fn fulfill(
        ledger: &mut GameLedger,
        oracle: &mut MockOracle,
        request_id: &RequestId,
        value: u128,
    ) -> Result<Settlement> {
        let fulfillment = oracle.deliver(request_id, &Delivery::Value(value))?;
        ledger.on_randomness_fulfilled(&addr("pick4:oracle"), &fulfillment, &engine())
    }

    #[test]
    fn test_round_ids_start_at_one() {
        let (mut ledger, _) = setup();
        assert_eq!(ledger.current_round_id(), 0);
        assert_eq!(ledger.start_round(&addr("admin")).unwrap(), 1);
        assert_eq!(ledger.round_state(1).unwrap(), RoundState::Open);
        assert_eq!(ledger.total_stake(1).unwrap(), 0);
        assert!(matches!(ledger.round(2), Err(LotteryError::RoundNotFound(2))));
    }

    #[test]
    fn test_start_round_guards() {
        let (mut ledger, _) = setup();
        assert!(matches!(
            ledger.start_round(&addr("player")),
            Err(LotteryError::Unauthorized)
        ));
        ledger.start_round(&addr("admin")).unwrap();
        assert!(matches!(
            ledger.start_round(&addr("admin")),
            Err(LotteryError::RoundAlreadyOpen)
        ));
        assert_eq!(ledger.current_round_id(), 1);
    }

    #[test]
    fn test_bet_validation_order() {
        let (mut ledger, _) = setup();
        let player = addr("player");

        // nothing open yet
        assert!(matches!(
            ledger.place_bet(&player, 1, [1, 2, 3, 4], PRICE),
            Err(LotteryError::NoActiveRound)
        ));

        ledger.start_round(&addr("admin")).unwrap();
        let err = ledger.place_bet(&player, 1, [1, 12, 13, 4], 99).unwrap_err();
        assert_eq!(err.to_string(), "Second digit must be less than 10");

        for paid in [99, 101] {
            assert!(matches!(
                ledger.place_bet(&player, 1, [1, 2, 3, 4], paid),
                Err(LotteryError::InvalidPayment { expected: PRICE, .. })
            ));
        }

        assert_eq!(ledger.total_stake(1).unwrap(), 0);
        assert!(ledger.bets().is_empty());
    }

    #[test]
    fn test_bets_accumulate_stake() {
        let (mut ledger, _) = setup();
        ledger.start_round(&addr("admin")).unwrap();

        let first = ledger.place_bet(&addr("p1"), 1, [0, 0, 1, 4], PRICE).unwrap();
        ledger.place_bet(&addr("p1"), 1, [0, 0, 1, 4], PRICE).unwrap();

        assert_eq!(first, 0);
        assert_eq!(ledger.total_stake(1).unwrap(), 2 * PRICE);
        let bet = ledger.bet(0).unwrap();
        assert_eq!(bet.player, addr("p1"));
        assert_eq!(bet.round_id, 1);
        assert_eq!(bet.digits.as_array(), [0, 0, 1, 4]);
    }

    #[test]
    fn test_draw_requires_admin_and_open_round() {
        let (mut ledger, mut oracle) = setup();
        assert!(matches!(
            ledger.request_draw(&addr("admin"), 1, &mut oracle),
            Err(LotteryError::NoActiveRound)
        ));
        ledger.start_round(&addr("admin")).unwrap();
        assert!(matches!(
            ledger.request_draw(&addr("player"), 1, &mut oracle),
            Err(LotteryError::Unauthorized)
        ));
        assert!(oracle.pending_requests().is_empty());
    }

    #[test]
    fn test_fulfillment_closes_round_once() {
        let (mut ledger, mut oracle) = setup();
        ledger.start_round(&addr("admin")).unwrap();
        ledger.place_bet(&addr("p1"), 1, [6, 7, 8, 9], PRICE).unwrap();
        let request = ledger
            .request_draw(&addr("admin"), 123_456_789, &mut oracle)
            .unwrap();

        // bets still land between request and fulfillment
        ledger.place_bet(&addr("p2"), 1, [6, 7, 8, 9], PRICE).unwrap();
        assert_eq!(ledger.round_state(1).unwrap(), RoundState::Open);

        let settlement = fulfill(&mut ledger, &mut oracle, &request, 123_456_789).unwrap();
        assert_eq!(settlement.winner_count, 2);

        let round = ledger.round(1).unwrap();
        assert_eq!(round.state, RoundState::Closed);
        assert_eq!(round.random_value, Some(123_456_789));
        assert_eq!(round.drawn.unwrap().as_array(), [6, 7, 8, 9]);
        assert_eq!(ledger.open_round(), None);

        assert!(matches!(
            ledger.on_randomness_fulfilled(
                &addr("pick4:oracle"),
                &Fulfillment {
                    request_id: request.clone(),
                    round_id: 1,
                    random_value: 1,
                },
                &engine()
            ),
            Err(LotteryError::UnknownOrFulfilledRequest(_))
        ));
        assert!(matches!(
            ledger.place_bet(&addr("p3"), 1, [6, 7, 8, 9], PRICE),
            Err(LotteryError::NoActiveRound)
        ));
    }

    #[test]
    fn test_callback_only_from_oracle() {
        let (mut ledger, mut oracle) = setup();
        ledger.start_round(&addr("admin")).unwrap();
        let request = ledger.request_draw(&addr("admin"), 5, &mut oracle).unwrap();

        let forged = Fulfillment {
            request_id: request,
            round_id: 1,
            random_value: 6789,
        };
        assert!(matches!(
            ledger.on_randomness_fulfilled(&addr("admin"), &forged, &engine()),
            Err(LotteryError::Unauthorized)
        ));
        assert_eq!(ledger.round_state(1).unwrap(), RoundState::Open);
    }

    #[test]
    fn test_superseded_request_cannot_close_round() {
        let (mut ledger, mut oracle) = setup();
        ledger.start_round(&addr("admin")).unwrap();
        let stale = ledger.request_draw(&addr("admin"), 1, &mut oracle).unwrap();
        let latest = ledger.request_draw(&addr("admin"), 2, &mut oracle).unwrap();

        assert!(matches!(
            fulfill(&mut ledger, &mut oracle, &stale, 6789),
            Err(LotteryError::UnknownOrFulfilledRequest(_))
        ));
        assert_eq!(ledger.round_state(1).unwrap(), RoundState::Open);

        fulfill(&mut ledger, &mut oracle, &latest, 6789).unwrap();
        assert_eq!(ledger.round_state(1).unwrap(), RoundState::Closed);
    }

    #[test]
    fn test_rollback_restores_checkpoint() {
        let (mut ledger, mut oracle) = setup();
        ledger.start_round(&addr("admin")).unwrap();
        ledger.place_bet(&addr("p1"), 1, [6, 7, 8, 9], PRICE).unwrap();
        let request = ledger.request_draw(&addr("admin"), 1, &mut oracle).unwrap();
        fulfill(&mut ledger, &mut oracle, &request, 6789).unwrap();
        ledger.start_round(&addr("admin")).unwrap();
        ledger.place_bet(&addr("p2"), 2, [1, 1, 1, 1], PRICE).unwrap();
        let before = ledger.clone();

        // close round 2, open round 3 and bet on it, then undo all of it
        let checkpoint = ledger.checkpoint();
        let request = ledger.request_draw(&addr("admin"), 2, &mut oracle).unwrap();
        fulfill(&mut ledger, &mut oracle, &request, 1111).unwrap();
        ledger.start_round(&addr("admin")).unwrap();
        ledger.place_bet(&addr("p3"), 3, [2, 2, 2, 2], PRICE).unwrap();
        ledger.rollback(checkpoint);

        assert_eq!(ledger, before);
        assert_eq!(ledger.open_round(), Some(2));
        assert!(matches!(ledger.round(3), Err(LotteryError::RoundNotFound(3))));
    }

    #[test]
    fn test_rounds_since() {
        let (mut ledger, mut oracle) = setup();
        for value in [1u128, 2] {
            ledger.start_round(&addr("admin")).unwrap();
            let request = ledger.request_draw(&addr("admin"), 0, &mut oracle).unwrap();
            fulfill(&mut ledger, &mut oracle, &request, value).unwrap();
        }
        ledger.start_round(&addr("admin")).unwrap();

        let ids: Vec<RoundId> = ledger.rounds_since(2).map(|round| round.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(ledger.rounds_since(4).count(), 0);
    }
}
