use crate::error::{CoreError, Result};
use crate::types::Amount;
use serde::{Deserialize, Serialize};

/// Entry price of a single bet in base units.
pub const DEFAULT_ENTRY_PRICE: Amount = 100;

/// Share of every round's stake kept by the platform.
pub const DEFAULT_PLATFORM_CUT_PERCENT: u8 = 10;

/// 0.1 fee token (18 decimals) per randomness request.
pub const DEFAULT_ORACLE_REQUEST_FEE: Amount = 100_000_000_000_000_000;

pub const DEFAULT_KEY_HASH: &str =
    "2ed0feb3e7fd2022120aa84fab1945545a9f2ffc9076fd6156fa96eaff4c1311";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotteryConfig {
    pub entry_price: Amount,
    pub platform_cut_percent: u8,
    pub oracle: OracleConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleConfig {
    pub kind: OracleKind,
    pub request_fee: Amount,
    /// Identifies the provider key the requests are addressed to.
    pub key_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleKind {
    /// Deterministic double, the delivered value is echoed as-is.
    Mock,
    /// Funded requests answered by a verifiable-randomness provider.
    Vrf,
}

impl Default for LotteryConfig {
    fn default() -> Self {
        Self {
            entry_price: DEFAULT_ENTRY_PRICE,
            platform_cut_percent: DEFAULT_PLATFORM_CUT_PERCENT,
            oracle: OracleConfig::default(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            kind: OracleKind::Mock,
            request_fee: DEFAULT_ORACLE_REQUEST_FEE,
            key_hash: DEFAULT_KEY_HASH.to_string(),
        }
    }
}

impl LotteryConfig {
    pub fn new(entry_price: Amount, platform_cut_percent: u8) -> Self {
        Self {
            entry_price,
            platform_cut_percent,
            ..Self::default()
        }
    }

    pub fn with_oracle(mut self, oracle: OracleConfig) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.entry_price == 0 {
            return Err(CoreError::config("Entry price must be greater than 0"));
        }

        if self.platform_cut_percent > 100 {
            return Err(CoreError::config(format!(
                "Platform cut must be at most 100%, got {}%",
                self.platform_cut_percent
            )));
        }

        self.oracle.validate()
    }
}

impl OracleConfig {
    pub fn vrf() -> Self {
        Self {
            kind: OracleKind::Vrf,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let key_hash = hex::decode(&self.key_hash)
            .map_err(|e| CoreError::config(format!("Key hash is not hex: {}", e)))?;
        if key_hash.len() != 32 {
            return Err(CoreError::config("Key hash must be 32 bytes"));
        }

        if self.kind == OracleKind::Vrf && self.request_fee == 0 {
            return Err(CoreError::config("VRF request fee must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = LotteryConfig::default();
        assert_eq!(config.entry_price, 100);
        assert_eq!(config.platform_cut_percent, 10);
        assert!(config.validate().is_ok());
        assert!(LotteryConfig::default()
            .with_oracle(OracleConfig::vrf())
            .validate()
            .is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(LotteryConfig::new(0, 10).validate().is_err());
        assert!(LotteryConfig::new(100, 101).validate().is_err());
        assert!(LotteryConfig::new(100, 100).validate().is_ok());

        let mut oracle = OracleConfig::vrf();
        oracle.key_hash = "abcd".to_string();
        assert!(LotteryConfig::default().with_oracle(oracle).validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = LotteryConfig::default().with_oracle(OracleConfig::vrf());
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"vrf\""));
        let decoded: LotteryConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, config);
    }
}
