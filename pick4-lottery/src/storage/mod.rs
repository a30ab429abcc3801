pub mod lottery_store;

pub use lottery_store::{LotteryRecord, LotteryStore};

use crate::error::{LotteryError, Result};
use pick4_core::{Amount, CoreError};
use rusqlite::Connection;
use std::path::Path;
use tokio::sync::Mutex;

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LotteryError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        // Lotteries table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS lotteries (
                name TEXT PRIMARY KEY,
                admin TEXT NOT NULL,
                config TEXT NOT NULL,
                oracle TEXT NOT NULL,
                retained INTEGER NOT NULL,
                current_round_id INTEGER NOT NULL,
                open_round INTEGER,
                provider_key TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Rounds table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS rounds (
                lottery TEXT NOT NULL,
                round_id INTEGER NOT NULL,
                state TEXT NOT NULL,
                total_stake INTEGER NOT NULL,
                random_value TEXT,
                drawn TEXT,
                draw_request TEXT,
                settlement TEXT,
                FOREIGN KEY (lottery) REFERENCES lotteries(name),
                PRIMARY KEY (lottery, round_id)
            )",
            [],
        )?;

        // Bets table, bet_index is the position in the bet log
        conn.execute(
            "CREATE TABLE IF NOT EXISTS bets (
                lottery TEXT NOT NULL,
                bet_index INTEGER NOT NULL,
                round_id INTEGER NOT NULL,
                player TEXT NOT NULL,
                amount INTEGER NOT NULL,
                digits TEXT NOT NULL,
                FOREIGN KEY (lottery) REFERENCES lotteries(name),
                PRIMARY KEY (lottery, bet_index)
            )",
            [],
        )?;

        // Host balances
        conn.execute(
            "CREATE TABLE IF NOT EXISTS accounts (
                lottery TEXT NOT NULL,
                address TEXT NOT NULL,
                balance INTEGER NOT NULL,
                FOREIGN KEY (lottery) REFERENCES lotteries(name),
                PRIMARY KEY (lottery, address)
            )",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}

/// SQLite integers are signed; amounts above `i64::MAX` are refused.
pub(crate) fn to_sql_int(value: u64, what: &str) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| CoreError::overflow(format!("{} does not fit in storage", what)).into())
}

pub(crate) fn from_sql_int(value: i64, what: &str) -> Result<Amount> {
    u64::try_from(value)
        .map_err(|_| LotteryError::internal(format!("Negative {} in storage: {}", what, value)))
}
