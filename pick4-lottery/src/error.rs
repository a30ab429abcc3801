use pick4_core::{Amount, CoreError, DigitPosition, RequestId, RoundId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LotteryError>;

#[derive(Error, Debug)]
pub enum LotteryError {
    #[error("Pick4 core error: {0}")]
    Core(#[from] CoreError),

    #[error("Only admin has access to this resource")]
    Unauthorized,

    #[error("There is an active game already")]
    RoundAlreadyOpen,

    #[error("There are no active games accepting bets")]
    NoActiveRound,

    #[error("{position} digit must be less than 10")]
    InvalidDigit { position: DigitPosition },

    #[error("Invalid betting price: expected {expected}, paid {paid}")]
    InvalidPayment { expected: Amount, paid: Amount },

    #[error("Insufficient oracle funds: need {need}, have {available}")]
    InsufficientOracleFunds { need: Amount, available: Amount },

    #[error("Unknown or already fulfilled randomness request: {0}")]
    UnknownOrFulfilledRequest(RequestId),

    #[error("There is an active game running")]
    RoundInProgress,

    #[error("Round not found: {0}")]
    RoundNotFound(RoundId),

    #[error("Invalid randomness proof: {0}")]
    InvalidProof(String),

    #[error("Lottery not found: {0}")]
    LotteryNotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LotteryError {
    pub fn invalid_proof(msg: impl Into<String>) -> Self {
        Self::InvalidProof(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
