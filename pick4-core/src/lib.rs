//! pick4 core - shared primitives for the pick-4 numbers lottery
//!
//! Identities, amounts, guessed/drawn digits, configuration and the host
//! ledger's native balance book. Game rules live in `pick4-lottery`.

pub mod accounts;
pub mod config;
pub mod error;
pub mod types;

pub use accounts::AccountBook;
pub use config::{
    LotteryConfig, OracleConfig, OracleKind, DEFAULT_ENTRY_PRICE, DEFAULT_KEY_HASH,
    DEFAULT_ORACLE_REQUEST_FEE, DEFAULT_PLATFORM_CUT_PERCENT,
};
pub use error::{CoreError, Result};
pub use types::{Address, Amount, DigitPosition, Digits, RandomValue, RequestId, RoundId};
