//! Pick-4 numbers lottery settled on a trust-minimized ledger
//!
//! Players buy fixed-price guesses of four digits for the open round. The
//! administrator asks a randomness oracle for a draw; when the oracle calls
//! back, the round closes, four digits are derived from the delivered value
//! and the stake is split between exact-match winners and the platform.

pub mod access;
pub mod error;
pub mod ledger;
pub mod lottery;
pub mod oracle;
pub mod payout;
pub mod round;
pub mod storage;
pub mod treasury;

pub use access::AccessControl;
pub use error::{LotteryError, Result};
pub use ledger::GameLedger;
pub use lottery::{Lottery, LotteryState, LOTTERY_ADDRESS, ORACLE_ADDRESS};
pub use oracle::{
    Delivery, DrawRequest, Fulfillment, MockOracle, OracleClient, RandomnessOracle, RequestBook,
    verify_response, VrfOracle, VrfProvider, VrfResponse,
};
pub use payout::{Credit, PayoutEngine, Settlement};
pub use round::{Bet, Round, RoundState};
pub use storage::{LotteryRecord, LotteryStore, Storage};
pub use treasury::Treasury;

use pick4_core::{Address, LotteryConfig};
use std::path::Path;

/// Open the lottery database under `data_dir`, creating it if needed.
pub async fn open_storage(data_dir: &Path) -> Result<Storage> {
    Storage::new(&data_dir.join("pick4.db")).await
}

/// Wire a fresh lottery with the oracle strategy named by `config`.
///
/// For a VRF lottery a new provider key is generated and returned alongside;
/// whoever runs the provider must keep it.
pub fn create_lottery(
    admin: Address,
    config: LotteryConfig,
) -> Result<(Lottery, Option<VrfProvider>)> {
    match config.oracle.kind {
        pick4_core::OracleKind::Mock => Ok((Lottery::with_mock_oracle(admin, config)?, None)),
        pick4_core::OracleKind::Vrf => {
            let provider = VrfProvider::new_random();
            let lottery = Lottery::with_vrf_oracle(admin, config, &provider.public_key_hex())?;
            Ok((lottery, Some(provider)))
        }
    }
}
