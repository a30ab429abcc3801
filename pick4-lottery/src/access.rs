use crate::{LotteryError, Result};
use pick4_core::Address;
use serde::{Deserialize, Serialize};

/// Single-administrator guard for privileged operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    admin: Address,
}

impl AccessControl {
    pub fn new(admin: Address) -> Self {
        Self { admin }
    }

    pub fn admin(&self) -> &Address {
        &self.admin
    }

    pub fn is_admin(&self, caller: &Address) -> bool {
        &self.admin == caller
    }

    pub fn require_admin(&self, caller: &Address) -> Result<()> {
        if !self.is_admin(caller) {
            tracing::debug!("Rejected privileged call from {}", caller);
            return Err(LotteryError::Unauthorized);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_admin() {
        let admin = Address::new("admin").unwrap();
        let access = AccessControl::new(admin.clone());

        assert!(access.require_admin(&admin).is_ok());
        let err = access
            .require_admin(&Address::new("mallory").unwrap())
            .unwrap_err();
        assert!(matches!(err, LotteryError::Unauthorized));
        assert_eq!(err.to_string(), "Only admin has access to this resource");
    }
}
