pub mod admin;
pub mod play;
pub mod query;

use pick4_core::Address;
use pick4_lottery::{Lottery, LotteryStore, Result, Storage};

/// The named lottery a command operates on.
pub struct Session<'a> {
    store: LotteryStore<'a>,
    name: String,
}

impl<'a> Session<'a> {
    pub fn new(storage: &'a Storage, name: &str) -> Self {
        Self {
            store: LotteryStore::new(storage),
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &LotteryStore<'a> {
        &self.store
    }

    pub async fn load(&self) -> Result<Lottery> {
        self.store.load(&self.name).await
    }

    pub async fn save(&self, lottery: &Lottery) -> Result<()> {
        self.store.save(&self.name, lottery).await
    }
}

/// Privileged commands act as the administrator unless told otherwise.
fn caller_or_admin(caller: Option<Address>, lottery: &Lottery) -> Address {
    caller.unwrap_or_else(|| lottery.admin().clone())
}
