use crate::access::AccessControl;
use crate::{LotteryError, Result};
use pick4_core::{Address, Amount, CoreError};
use serde::{Deserialize, Serialize};

/// Funds retained by the lottery: platform cuts and rounding remainders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treasury {
    retained: Amount,
}

impl Treasury {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_balance(retained: Amount) -> Self {
        Self { retained }
    }

    pub fn get_balance(&self) -> Amount {
        self.retained
    }

    pub fn retain(&mut self, amount: Amount) -> Result<()> {
        self.retained = self
            .retained
            .checked_add(amount)
            .ok_or_else(|| CoreError::overflow("treasury balance"))?;
        Ok(())
    }

    /// Empty the treasury for the administrator.
    ///
    /// Refused while a round is open, so nothing earmarked for an in-flight
    /// round can leave. Returns the amount to hand to the recipient.
    pub fn withdraw(
        &mut self,
        access: &AccessControl,
        caller: &Address,
        round_in_progress: bool,
    ) -> Result<Amount> {
        access.require_admin(caller)?;
        if round_in_progress {
            return Err(LotteryError::RoundInProgress);
        }

        let amount = self.retained;
        self.retained = 0;
        Ok(amount)
    }
}
