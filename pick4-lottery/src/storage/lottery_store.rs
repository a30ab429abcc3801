use super::{from_sql_int, to_sql_int, Storage};
use crate::access::AccessControl;
use crate::error::{LotteryError, Result};
use crate::ledger::GameLedger;
use crate::lottery::{Lottery, LotteryState, LOTTERY_ADDRESS};
use crate::oracle::{OracleClient, RandomnessOracle, VrfProvider};
use crate::payout::Settlement;
use crate::round::{Bet, Round, RoundState};
use crate::treasury::Treasury;
use chrono::{DateTime, Utc};
use pick4_core::{AccountBook, Address, Amount, Digits, LotteryConfig, RequestId, RoundId};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Summary row of a stored lottery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotteryRecord {
    pub name: String,
    pub admin: Address,
    pub config: LotteryConfig,
    pub retained: Amount,
    pub current_round_id: RoundId,
    pub open_round: Option<RoundId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

type RoundRow = (
    i64,
    String,
    i64,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

pub struct LotteryStore<'a> {
    storage: &'a Storage,
}

impl<'a> LotteryStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Write the lottery under `name` in one transaction.
    ///
    /// Closed rounds and their bets never change, so only rounds from the
    /// previously stored open round onwards and bets past the stored log
    /// length are written. Everything else is upserted.
    pub async fn save(&self, name: &str, lottery: &Lottery) -> Result<()> {
        let state = lottery.state();
        let ledger = &state.ledger;
        let config_json = serde_json::to_string(lottery.config())?;
        let oracle_json = serde_json::to_string(&state.oracle)?;
        let open_round = match ledger.open_round() {
            Some(id) => Some(to_sql_int(id, "round id")?),
            None => None,
        };

        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        let stored: Option<(i64, Option<i64>)> = tx
            .query_row(
                "SELECT current_round_id, open_round FROM lotteries WHERE name = ?1",
                params![name],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<i64>>(1)?)),
            )
            .optional()?;
        let first_dirty_round = match stored {
            Some((_, Some(open))) => from_sql_int(open, "round id")?,
            Some((current, None)) => from_sql_int(current, "round id")? + 1,
            None => 1,
        };
        let stored_bets: i64 = tx.query_row(
            "SELECT COALESCE(MAX(bet_index) + 1, 0) FROM bets WHERE lottery = ?1",
            params![name],
            |row| row.get(0),
        )?;
        let stored_bets = from_sql_int(stored_bets, "bet count")? as usize;

        tx.execute(
            "INSERT INTO lotteries
             (name, admin, config, oracle, retained, current_round_id, open_round,
              created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
             ON CONFLICT(name) DO UPDATE SET
                admin = excluded.admin,
                config = excluded.config,
                oracle = excluded.oracle,
                retained = excluded.retained,
                current_round_id = excluded.current_round_id,
                open_round = excluded.open_round,
                updated_at = excluded.updated_at",
            params![
                name,
                ledger.access().admin().as_str(),
                config_json,
                oracle_json,
                to_sql_int(state.treasury.get_balance(), "retained balance")?,
                to_sql_int(ledger.current_round_id(), "round id")?,
                open_round,
                Utc::now().timestamp(),
            ],
        )?;

        let mut rounds_written = 0;
        for round in ledger.rounds_since(first_dirty_round) {
            let settlement = match &round.settlement {
                Some(settlement) => Some(serde_json::to_string(settlement)?),
                None => None,
            };
            tx.execute(
                "INSERT INTO rounds
                 (lottery, round_id, state, total_stake, random_value, drawn,
                  draw_request, settlement)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(lottery, round_id) DO UPDATE SET
                    state = excluded.state,
                    total_stake = excluded.total_stake,
                    random_value = excluded.random_value,
                    drawn = excluded.drawn,
                    draw_request = excluded.draw_request,
                    settlement = excluded.settlement",
                params![
                    name,
                    to_sql_int(round.id, "round id")?,
                    round.state.to_string(),
                    to_sql_int(round.total_stake, "round stake")?,
                    round.random_value.map(|v| v.to_string()),
                    round.drawn.map(|d| d.to_string()),
                    round.draw_request.as_ref().map(|r| r.as_str()),
                    settlement,
                ],
            )?;
            rounds_written += 1;
        }

        let new_bets = ledger.bets().iter().enumerate().skip(stored_bets);
        let mut bets_written = 0;
        for (index, bet) in new_bets {
            tx.execute(
                "INSERT INTO bets (lottery, bet_index, round_id, player, amount, digits)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    name,
                    to_sql_int(index as u64, "bet index")?,
                    to_sql_int(bet.round_id, "round id")?,
                    bet.player.as_str(),
                    to_sql_int(bet.amount, "bet amount")?,
                    bet.digits.to_string(),
                ],
            )?;
            bets_written += 1;
        }

        for (address, balance) in state.accounts.iter() {
            tx.execute(
                "INSERT INTO accounts (lottery, address, balance) VALUES (?1, ?2, ?3)
                 ON CONFLICT(lottery, address) DO UPDATE SET balance = excluded.balance",
                params![name, address.as_str(), to_sql_int(*balance, "balance")?],
            )?;
        }

        tx.commit()?;

        tracing::debug!(
            "Saved lottery '{}': {} rounds and {} bets written",
            name,
            rounds_written,
            bets_written
        );
        Ok(())
    }

    pub async fn load(&self, name: &str) -> Result<Lottery> {
        let conn = self.storage.get_connection().await;

        let (admin, config_json, oracle_json, retained, current_round_id, open_round) = conn
            .query_row(
                "SELECT admin, config, oracle, retained, current_round_id, open_round
                 FROM lotteries WHERE name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, Option<i64>>(5)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| LotteryError::LotteryNotFound(name.to_string()))?;

        let config: LotteryConfig = serde_json::from_str(&config_json)?;
        config.validate()?;
        let oracle: OracleClient = serde_json::from_str(&oracle_json)?;

        let mut stmt = conn.prepare(
            "SELECT round_id, state, total_stake, random_value, drawn, draw_request, settlement
             FROM rounds WHERE lottery = ?1 ORDER BY round_id",
        )?;
        let round_rows = stmt
            .query_map(params![name], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<RoundRow>>>()?;

        let mut rounds = BTreeMap::new();
        for row in round_rows {
            let round = round_from_row(row)?;
            rounds.insert(round.id, round);
        }

        let mut stmt = conn.prepare(
            "SELECT round_id, player, amount, digits
             FROM bets WHERE lottery = ?1 ORDER BY bet_index",
        )?;
        let bet_rows = stmt
            .query_map(params![name], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut bets = Vec::with_capacity(bet_rows.len());
        for (round_id, player, amount, digits) in bet_rows {
            bets.push(Bet {
                player: Address::new(player)?,
                round_id: from_sql_int(round_id, "round id")?,
                amount: from_sql_int(amount, "bet amount")?,
                digits: digits.parse::<Digits>()?,
            });
        }

        let mut stmt =
            conn.prepare("SELECT address, balance FROM accounts WHERE lottery = ?1")?;
        let account_rows = stmt
            .query_map(params![name], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut accounts = AccountBook::new();
        for (address, balance) in account_rows {
            accounts.credit(&Address::new(address)?, from_sql_int(balance, "balance")?)?;
        }

        let ledger = GameLedger {
            address: Address::new(LOTTERY_ADDRESS)?,
            access: AccessControl::new(Address::new(admin)?),
            oracle_address: oracle.address().clone(),
            entry_price: config.entry_price,
            rounds,
            bets,
            current_round_id: from_sql_int(current_round_id, "round id")?,
            open_round: open_round
                .map(|id| from_sql_int(id, "round id"))
                .transpose()?,
        };

        Lottery::from_state(
            config,
            LotteryState {
                ledger,
                oracle,
                treasury: Treasury::with_balance(from_sql_int(retained, "retained balance")?),
                accounts,
            },
        )
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        let conn = self.storage.get_connection().await;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM lotteries WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    pub async fn list(&self) -> Result<Vec<LotteryRecord>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT name, admin, config, retained, current_round_id, open_round,
                    created_at, updated_at
             FROM lotteries ORDER BY created_at DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, Option<i64>>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, i64>(7)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for (name, admin, config, retained, current, open, created_at, updated_at) in rows {
            records.push(LotteryRecord {
                name,
                admin: Address::new(admin)?,
                config: serde_json::from_str(&config)?,
                retained: from_sql_int(retained, "retained balance")?,
                current_round_id: from_sql_int(current, "round id")?,
                open_round: open.map(|id| from_sql_int(id, "round id")).transpose()?,
                created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_else(Utc::now),
                updated_at: DateTime::from_timestamp(updated_at, 0).unwrap_or_else(Utc::now),
            });
        }

        Ok(records)
    }

    /// Keep the provider signing key next to the lottery it serves.
    pub async fn save_provider_key(&self, name: &str, provider: &VrfProvider) -> Result<()> {
        let conn = self.storage.get_connection().await;

        let updated = conn.execute(
            "UPDATE lotteries SET provider_key = ?2 WHERE name = ?1",
            params![name, provider.secret_hex()],
        )?;
        if updated == 0 {
            return Err(LotteryError::LotteryNotFound(name.to_string()));
        }

        tracing::info!("Stored provider key for '{}'", name);
        Ok(())
    }

    pub async fn load_provider(&self, name: &str) -> Result<Option<VrfProvider>> {
        let conn = self.storage.get_connection().await;

        let key: Option<Option<String>> = conn
            .query_row(
                "SELECT provider_key FROM lotteries WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        match key {
            None => Err(LotteryError::LotteryNotFound(name.to_string())),
            Some(None) => Ok(None),
            Some(Some(secret)) => Ok(Some(VrfProvider::from_secret_hex(&secret)?)),
        }
    }
}

fn round_from_row(row: RoundRow) -> Result<Round> {
    let (round_id, state, total_stake, random_value, drawn, draw_request, settlement) = row;

    let state = match state.as_str() {
        "open" => RoundState::Open,
        "closed" => RoundState::Closed,
        other => {
            return Err(LotteryError::internal(format!(
                "Unknown round state in storage: {}",
                other
            )))
        }
    };

    let random_value = match random_value {
        Some(value) => Some(value.parse::<u128>().map_err(|e| {
            LotteryError::internal(format!("Invalid random value in storage: {}", e))
        })?),
        None => None,
    };

    let settlement = match settlement {
        Some(json) => Some(serde_json::from_str::<Settlement>(&json)?),
        None => None,
    };

    Ok(Round {
        id: from_sql_int(round_id, "round id")?,
        state,
        total_stake: from_sql_int(total_stake, "round stake")?,
        random_value,
        drawn: drawn.map(|d| d.parse::<Digits>()).transpose()?,
        draw_request: draw_request.map(|r| r.parse::<RequestId>()).transpose()?,
        settlement,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::Delivery;
    use pick4_core::OracleConfig;
    use tempfile::tempdir;

    fn addr(name: &str) -> Address {
        Address::new(name).unwrap()
    }

    fn played_lottery() -> Lottery {
        let admin = addr("admin");
        let mut lottery =
            Lottery::with_mock_oracle(admin.clone(), LotteryConfig::default()).unwrap();
        lottery.deposit(&addr("alice"), 500).unwrap();
        lottery.deposit(&addr("bob"), 500).unwrap();

        lottery.start_round(&admin).unwrap();
        lottery.place_bet(&addr("alice"), [6, 7, 8, 9], 100).unwrap();
        lottery.place_bet(&addr("bob"), [1, 2, 3, 4], 100).unwrap();
        let request = lottery.request_draw(&admin, 123_456_789).unwrap();
        lottery
            .fulfill_randomness(&request, &Delivery::Value(123_456_789))
            .unwrap();

        lottery.start_round(&admin).unwrap();
        lottery.place_bet(&addr("bob"), [0, 0, 0, 1], 100).unwrap();
        lottery.request_draw(&admin, 7).unwrap();
        lottery
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(&temp_dir.path().join("pick4.db")).await.unwrap();
        let store = LotteryStore::new(&storage);

        let lottery = played_lottery();
        store.save("main", &lottery).await.unwrap();
        let loaded = store.load("main").await.unwrap();

        assert_eq!(loaded.ledger(), lottery.ledger());
        assert_eq!(loaded.accounts(), lottery.accounts());
        assert_eq!(loaded.config(), lottery.config());
        assert_eq!(loaded.get_balance(), lottery.get_balance());
        assert_eq!(loaded.pending_requests().len(), 1);
        assert_eq!(loaded.oracle().kind(), "mock");
        assert_eq!(
            loaded.drawn_digits(1).unwrap().map(|d| d.to_string()),
            Some("6789".to_string())
        );
    }

    #[tokio::test]
    async fn test_loaded_lottery_keeps_playing() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(&temp_dir.path().join("pick4.db")).await.unwrap();
        let store = LotteryStore::new(&storage);

        store.save("main", &played_lottery()).await.unwrap();
        let mut lottery = store.load("main").await.unwrap();

        let request = lottery.pending_requests()[0].request_id.clone();
        let settlement = lottery
            .fulfill_randomness(&request, &Delivery::Value(1))
            .unwrap();
        assert_eq!(settlement.round_id, 2);
        assert_eq!(settlement.winner_count, 1);

        store.save("main", &lottery).await.unwrap();
        let reloaded = store.load("main").await.unwrap();
        assert_eq!(reloaded.round_state(2).unwrap(), RoundState::Closed);
        assert_eq!(reloaded.balance_of(&addr("bob")), lottery.balance_of(&addr("bob")));
    }

    #[tokio::test]
    async fn test_save_leaves_closed_history_alone() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(&temp_dir.path().join("pick4.db")).await.unwrap();
        let store = LotteryStore::new(&storage);

        let mut lottery = played_lottery();
        store.save("main", &lottery).await.unwrap();

        // settled history is frozen from here on
        {
            let conn = storage.get_connection().await;
            conn.execute_batch(
                "CREATE TRIGGER frozen_rounds BEFORE UPDATE ON rounds
                 WHEN OLD.state = 'closed'
                 BEGIN SELECT RAISE(ABORT, 'closed round rewritten'); END;
                 CREATE TRIGGER kept_rounds BEFORE DELETE ON rounds
                 BEGIN SELECT RAISE(ABORT, 'round deleted'); END;
                 CREATE TRIGGER kept_bets BEFORE DELETE ON bets
                 BEGIN SELECT RAISE(ABORT, 'bet deleted'); END;
                 CREATE TRIGGER frozen_bets BEFORE UPDATE ON bets
                 BEGIN SELECT RAISE(ABORT, 'bet rewritten'); END;",
            )
            .unwrap();
        }

        let admin = addr("admin");
        let request = lottery.pending_requests()[0].request_id.clone();
        lottery
            .fulfill_randomness(&request, &Delivery::Value(1))
            .unwrap();
        lottery.start_round(&admin).unwrap();
        lottery.place_bet(&addr("alice"), [4, 4, 4, 4], 100).unwrap();
        store.save("main", &lottery).await.unwrap();
        store.save("main", &lottery).await.unwrap();

        let loaded = store.load("main").await.unwrap();
        assert_eq!(loaded.ledger(), lottery.ledger());
        assert_eq!(loaded.accounts(), lottery.accounts());
        assert_eq!(loaded.bets_for_round(3).len(), 1);
        assert_eq!(loaded.round_state(2).unwrap(), RoundState::Closed);
    }

    #[tokio::test]
    async fn test_missing_lottery() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(&temp_dir.path().join("pick4.db")).await.unwrap();
        let store = LotteryStore::new(&storage);

        assert!(!store.exists("nope").await.unwrap());
        assert!(matches!(
            store.load("nope").await,
            Err(LotteryError::LotteryNotFound(_))
        ));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_provider_key_round_trip() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(&temp_dir.path().join("pick4.db")).await.unwrap();
        let store = LotteryStore::new(&storage);

        let provider = VrfProvider::new_random();
        let config = LotteryConfig::default().with_oracle(OracleConfig::vrf());
        let lottery =
            Lottery::with_vrf_oracle(addr("admin"), config, &provider.public_key_hex()).unwrap();

        store.save("vrf", &lottery).await.unwrap();
        assert!(store.load_provider("vrf").await.unwrap().is_none());

        store.save_provider_key("vrf", &provider).await.unwrap();
        let restored = store.load_provider("vrf").await.unwrap().unwrap();
        assert_eq!(restored.public_key_hex(), provider.public_key_hex());

        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "vrf");
        assert_eq!(records[0].current_round_id, 0);
    }
}
