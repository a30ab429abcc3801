use super::{Delivery, DrawRequest, Fulfillment, RandomnessOracle, RequestBook};
use crate::{LotteryError, Result};
use pick4_core::{Address, Amount, CoreError, RandomValue, RequestId, RoundId};
use serde::{Deserialize, Serialize};

const MOCK_KEY_HASH: &str = "mock";

/// Deterministic oracle: whatever value the harness delivers is the draw.
///
/// Requests are free; fee tokens sent to it are only recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockOracle {
    address: Address,
    consumer: Address,
    fee_balance: Amount,
    book: RequestBook,
}

impl MockOracle {
    pub fn new(address: Address, consumer: Address) -> Self {
        Self {
            address,
            consumer,
            fee_balance: 0,
            book: RequestBook::new(),
        }
    }

    /// Echo `value` as the random result of `request_id`.
    pub fn deliver_value(
        &mut self,
        request_id: &RequestId,
        value: RandomValue,
    ) -> Result<Fulfillment> {
        let fulfillment = self.book.fulfill(request_id, value)?;
        tracing::debug!(
            "Mock oracle delivered {} for request {}",
            value,
            request_id.short()
        );
        Ok(fulfillment)
    }
}

impl RandomnessOracle for MockOracle {
    fn address(&self) -> &Address {
        &self.address
    }

    fn request_random(
        &mut self,
        requester: &Address,
        round_id: RoundId,
        seed: u64,
    ) -> Result<RequestId> {
        if requester != &self.consumer {
            return Err(LotteryError::Unauthorized);
        }

        let request_id = self.book.open(MOCK_KEY_HASH, requester, round_id, seed);
        tracing::debug!(
            "Mock oracle accepted request {} for round {}",
            request_id.short(),
            round_id
        );
        Ok(request_id)
    }

    fn deliver(&mut self, request_id: &RequestId, delivery: &Delivery) -> Result<Fulfillment> {
        match delivery {
            Delivery::Value(value) => self.deliver_value(request_id, *value),
            Delivery::Proof(_) => Err(LotteryError::invalid_proof(
                "mock oracle expects a plain value",
            )),
        }
    }

    fn request(&self, request_id: &RequestId) -> Option<&DrawRequest> {
        self.book.get(request_id)
    }

    fn pending_requests(&self) -> Vec<&DrawRequest> {
        self.book.pending_requests()
    }

    fn retire_round(&mut self, round_id: RoundId) -> usize {
        self.book.retire_round(round_id)
    }

    fn fund(&mut self, amount: Amount) -> Result<()> {
        self.fee_balance = self
            .fee_balance
            .checked_add(amount)
            .ok_or_else(|| CoreError::overflow("oracle fee balance"))?;
        Ok(())
    }

    fn fee_balance(&self) -> Amount {
        self.fee_balance
    }
}
