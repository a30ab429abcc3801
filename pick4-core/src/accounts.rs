use crate::error::{CoreError, Result};
use crate::types::{Address, Amount};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Native balances held by principals on the host ledger.
///
/// Players pay entry fees out of this book and winners and withdrawal
/// recipients are credited back into it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBook {
    balances: BTreeMap<Address, Amount>,
}

impl AccountBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, address: &Address) -> Amount {
        self.balances.get(address).copied().unwrap_or(0)
    }

    pub fn credit(&mut self, address: &Address, amount: Amount) -> Result<()> {
        let balance = self.balance_of(address);
        let updated = balance
            .checked_add(amount)
            .ok_or_else(|| CoreError::overflow(format!("balance of {}", address)))?;
        self.balances.insert(address.clone(), updated);
        Ok(())
    }

    pub fn debit(&mut self, address: &Address, amount: Amount) -> Result<()> {
        let balance = self.balance_of(address);
        if balance < amount {
            return Err(CoreError::InsufficientFunds {
                need: amount,
                available: balance,
            });
        }
        self.balances.insert(address.clone(), balance - amount);
        Ok(())
    }

    /// Faucet-style deposit from outside the lottery.
    pub fn deposit(&mut self, address: &Address, amount: Amount) -> Result<()> {
        self.credit(address, amount)?;
        tracing::debug!("Deposited {} to {}", amount, address);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.balances.iter()
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_and_debit() {
        let alice = Address::new("alice").unwrap();
        let mut book = AccountBook::new();

        assert_eq!(book.balance_of(&alice), 0);
        book.deposit(&alice, 250).unwrap();
        book.debit(&alice, 100).unwrap();
        assert_eq!(book.balance_of(&alice), 150);

        let err = book.debit(&alice, 151).unwrap_err();
        assert_eq!(
            err,
            CoreError::InsufficientFunds {
                need: 151,
                available: 150
            }
        );
        assert_eq!(book.balance_of(&alice), 150);
    }

    #[test]
    fn test_credit_overflow() {
        let bob = Address::new("bob").unwrap();
        let mut book = AccountBook::new();
        book.credit(&bob, u64::MAX).unwrap();
        assert!(matches!(
            book.credit(&bob, 1),
            Err(CoreError::ArithmeticOverflow(_))
        ));
        assert_eq!(book.balance_of(&bob), u64::MAX);
    }
}
