use crate::round::Bet;
use crate::Result;
use pick4_core::{Address, Amount, CoreError, Digits, LotteryConfig, RoundId};
use serde::{Deserialize, Serialize};

/// Prize owed to one winning bet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    pub player: Address,
    pub amount: Amount,
}

/// Outcome of settling one round.
///
/// `credits` sum plus `retained` always equals `total_stake`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub round_id: RoundId,
    pub drawn: Digits,
    pub total_stake: Amount,
    pub platform_cut: Amount,
    pub payable_prize: Amount,
    pub winner_count: u64,
    pub individual_prize: Amount,
    pub remainder: Amount,
    pub retained: Amount,
    pub credits: Vec<Credit>,
}

impl Settlement {
    pub fn total_credited(&self) -> Amount {
        self.credits.iter().map(|c| c.amount).sum()
    }
}

/// Splits a closed round's stake between the platform and exact-match winners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayoutEngine {
    platform_cut_percent: u8,
}

impl PayoutEngine {
    pub fn new(platform_cut_percent: u8) -> Result<Self> {
        if platform_cut_percent > 100 {
            return Err(CoreError::config(format!(
                "Platform cut must be at most 100%, got {}%",
                platform_cut_percent
            ))
            .into());
        }
        Ok(Self {
            platform_cut_percent,
        })
    }

    pub fn from_config(config: &LotteryConfig) -> Result<Self> {
        Self::new(config.platform_cut_percent)
    }

    pub fn platform_cut_percent(&self) -> u8 {
        self.platform_cut_percent
    }

    /// Pure function of the round's bets and drawn digits.
    ///
    /// The cut is `floor(stake * cut% / 100)`. Winners share the rest equally
    /// with floor division; the division remainder is retained alongside the
    /// cut. Without winners the whole stake is retained.
    pub fn settle<'a, I>(
        &self,
        round_id: RoundId,
        bets: I,
        drawn: Digits,
    ) -> Result<Settlement>
    where
        I: IntoIterator<Item = &'a Bet>,
    {
        let mut total_stake: Amount = 0;
        let mut winners = Vec::new();
        for bet in bets {
            total_stake = total_stake
                .checked_add(bet.amount)
                .ok_or_else(|| CoreError::overflow(format!("stake of round {}", round_id)))?;
            if bet.matches(&drawn) {
                winners.push(bet);
            }
        }

        let platform_cut =
            (total_stake as u128 * self.platform_cut_percent as u128 / 100) as Amount;
        let payable_prize = total_stake
            .checked_sub(platform_cut)
            .ok_or_else(|| CoreError::overflow(format!("prize of round {}", round_id)))?;
        let winner_count = winners.len() as u64;

        let (individual_prize, remainder, retained) = if winner_count == 0 {
            (0, 0, platform_cut + payable_prize)
        } else {
            let individual = payable_prize / winner_count;
            let remainder = payable_prize % winner_count;
            (individual, remainder, platform_cut + remainder)
        };

        let credits = winners
            .into_iter()
            .map(|bet| Credit {
                player: bet.player.clone(),
                amount: individual_prize,
            })
            .collect();

        Ok(Settlement {
            round_id,
            drawn,
            total_stake,
            platform_cut,
            payable_prize,
            winner_count,
            individual_prize,
            remainder,
            retained,
            credits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRICE: Amount = 100;

    fn drawn() -> Digits {
        Digits::try_from([6, 7, 8, 9]).unwrap()
    }

    fn bets(total: usize, winners: usize, amount: Amount) -> Vec<Bet> {
        (0..total)
            .map(|i| Bet {
                player: Address::new(format!("player-{}", i)).unwrap(),
                round_id: 1,
                amount,
                digits: if i < winners {
                    drawn()
                } else {
                    Digits::try_from([9, 8, 7, 6]).unwrap()
                },
            })
            .collect()
    }

    #[test]
    fn test_conservation_across_edge_cases() {
        let engine = PayoutEngine::new(10).unwrap();
        for total in [0usize, 1, 5, 10] {
            for winners in [0, 1, total] {
                let winners = winners.min(total);
                let settlement = engine
                    .settle(1, &bets(total, winners, PRICE), drawn())
                    .unwrap();
                assert_eq!(
                    settlement.total_credited() + settlement.retained,
                    total as Amount * PRICE,
                    "total={} winners={}",
                    total,
                    winners
                );
                assert_eq!(settlement.winner_count, winners as u64);
            }
        }
    }

    #[test]
    fn test_seven_of_ten_winners() {
        let settlement = PayoutEngine::new(10)
            .unwrap()
            .settle(1, &bets(10, 7, PRICE), drawn())
            .unwrap();

        assert_eq!(settlement.total_stake, 1000);
        assert_eq!(settlement.platform_cut, 100);
        assert_eq!(settlement.payable_prize, 900);
        assert_eq!(settlement.individual_prize, 128);
        assert_eq!(settlement.remainder, 4);
        assert_eq!(settlement.retained, 104);
        assert_eq!(settlement.credits.len(), 7);
    }

    #[test]
    fn test_no_winners_retains_everything() {
        let settlement = PayoutEngine::new(10)
            .unwrap()
            .settle(1, &bets(5, 0, PRICE), drawn())
            .unwrap();
        assert!(settlement.credits.is_empty());
        assert_eq!(settlement.retained, 500);
        assert_eq!(settlement.individual_prize, 0);
    }

    #[test]
    fn test_cut_uses_floor_division() {
        // 3 * 33 = 99, 10% of 99 floors to 9
        let settlement = PayoutEngine::new(10)
            .unwrap()
            .settle(1, &bets(3, 2, 33), drawn())
            .unwrap();
        assert_eq!(settlement.platform_cut, 9);
        assert_eq!(settlement.payable_prize, 90);
        assert_eq!(settlement.individual_prize, 45);
        assert_eq!(settlement.retained, 9);
    }

    #[test]
    fn test_settlement_is_deterministic() {
        let engine = PayoutEngine::new(10).unwrap();
        let round = bets(7, 1, PRICE);
        assert_eq!(
            engine.settle(2, &round, drawn()).unwrap(),
            engine.settle(2, &round, drawn()).unwrap()
        );
    }

    #[test]
    fn test_cut_above_hundred_rejected() {
        assert!(matches!(
            PayoutEngine::new(101),
            Err(crate::LotteryError::Core(CoreError::Config(_)))
        ));

        // the whole stake goes to the platform at 100%
        let settlement = PayoutEngine::new(100)
            .unwrap()
            .settle(1, &bets(4, 2, PRICE), drawn())
            .unwrap();
        assert_eq!(settlement.payable_prize, 0);
        assert_eq!(settlement.retained, 400);
        assert_eq!(settlement.total_credited(), 0);
    }

    #[test]
    fn test_empty_round() {
        let settlement = PayoutEngine::new(10)
            .unwrap()
            .settle(1, &bets(0, 0, PRICE), drawn())
            .unwrap();
        assert_eq!(settlement.total_stake, 0);
        assert_eq!(settlement.retained, 0);
        assert!(settlement.credits.is_empty());
    }
}
