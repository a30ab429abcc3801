use crate::payout::Settlement;
use pick4_core::{Address, Amount, Digits, RandomValue, RequestId, RoundId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Round lifecycle, a round moves from `Open` to `Closed` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundState {
    Open,
    Closed,
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundState::Open => write!(f, "open"),
            RoundState::Closed => write!(f, "closed"),
        }
    }
}

/// One cycle of accepting bets, drawing digits and settling.
///
/// Rounds are never removed; closed rounds keep their draw and settlement
/// for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub state: RoundState,
    pub total_stake: Amount,
    pub random_value: Option<RandomValue>,
    pub drawn: Option<Digits>,
    /// Latest outstanding draw request, only it may close the round
    pub draw_request: Option<RequestId>,
    pub settlement: Option<Settlement>,
}

impl Round {
    pub fn open(id: RoundId) -> Self {
        Self {
            id,
            state: RoundState::Open,
            total_stake: 0,
            random_value: None,
            drawn: None,
            draw_request: None,
            settlement: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == RoundState::Open
    }
}

/// A player's paid guess. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bet {
    pub player: Address,
    pub round_id: RoundId,
    pub amount: Amount,
    pub digits: Digits,
}

impl Bet {
    pub fn matches(&self, drawn: &Digits) -> bool {
        &self.digits == drawn
    }
}
