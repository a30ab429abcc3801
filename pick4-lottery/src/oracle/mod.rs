//! Randomness oracle clients.
//!
//! A draw is a two-phase protocol: `request_random` registers a request and
//! returns its id immediately, and a later, independent `deliver` carries the
//! random value for that id. Every request records the round it was made for,
//! so a delivery locates its round without scanning. A request id is accepted
//! at most once.

pub mod mock;
pub mod vrf;

pub use mock::MockOracle;
pub use vrf::{verify_response, VrfOracle, VrfProvider, VrfResponse};

use crate::{LotteryError, Result};
use pick4_core::{Address, Amount, RandomValue, RequestId, RoundId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// A randomness request as seen on the oracle wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRequest {
    pub request_id: RequestId,
    pub round_id: RoundId,
    pub seed: u64,
    pub requester: Address,
    pub random_value: Option<RandomValue>,
}

impl DrawRequest {
    pub fn is_fulfilled(&self) -> bool {
        self.random_value.is_some()
    }
}

/// Accepted delivery, attributable back to the requesting round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fulfillment {
    pub request_id: RequestId,
    pub round_id: RoundId,
    pub random_value: RandomValue,
}

/// Payload carried by a delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Delivery {
    /// Plain value, only the mock oracle accepts it.
    Value(RandomValue),
    /// Provider output with its proof, checked by the VRF oracle.
    Proof(VrfResponse),
}

/// Capability shared by every randomness strategy.
pub trait RandomnessOracle {
    /// Identity the oracle uses when calling back into the ledger.
    fn address(&self) -> &Address;

    fn request_random(
        &mut self,
        requester: &Address,
        round_id: RoundId,
        seed: u64,
    ) -> Result<RequestId>;

    fn deliver(&mut self, request_id: &RequestId, delivery: &Delivery) -> Result<Fulfillment>;

    fn request(&self, request_id: &RequestId) -> Option<&DrawRequest>;

    fn pending_requests(&self) -> Vec<&DrawRequest>;

    /// Forget every request made for a closed round, superseded ones
    /// included. Returns how many were dropped.
    fn retire_round(&mut self, round_id: RoundId) -> usize;

    /// Credit fee tokens to the oracle's balance.
    fn fund(&mut self, amount: Amount) -> Result<()>;

    fn fee_balance(&self) -> Amount;
}

/// Outstanding and fulfilled requests of one oracle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestBook {
    requests: BTreeMap<RequestId, DrawRequest>,
    nonce: u64,
}

impl RequestBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request; its id commits to the key hash, the wire fields
    /// and a per-book nonce so repeated seeds still get distinct ids.
    pub fn open(
        &mut self,
        key_hash: &str,
        requester: &Address,
        round_id: RoundId,
        seed: u64,
    ) -> RequestId {
        let mut hasher = Sha256::new();
        hasher.update(key_hash.as_bytes());
        hasher.update(requester.as_str().as_bytes());
        hasher.update(round_id.to_be_bytes());
        hasher.update(seed.to_be_bytes());
        hasher.update(self.nonce.to_be_bytes());
        let request_id = RequestId::from_digest(hasher.finalize().into());

        self.nonce += 1;
        self.requests.insert(
            request_id.clone(),
            DrawRequest {
                request_id: request_id.clone(),
                round_id,
                seed,
                requester: requester.clone(),
                random_value: None,
            },
        );
        request_id
    }

    /// Look up a request that may still be fulfilled.
    pub fn pending(&self, request_id: &RequestId) -> Result<&DrawRequest> {
        match self.requests.get(request_id) {
            Some(request) if !request.is_fulfilled() => Ok(request),
            _ => Err(LotteryError::UnknownOrFulfilledRequest(request_id.clone())),
        }
    }

    pub fn fulfill(&mut self, request_id: &RequestId, value: RandomValue) -> Result<Fulfillment> {
        let round_id = self.pending(request_id)?.round_id;
        if let Some(request) = self.requests.get_mut(request_id) {
            request.random_value = Some(value);
        }
        Ok(Fulfillment {
            request_id: request_id.clone(),
            round_id,
            random_value: value,
        })
    }

    pub fn get(&self, request_id: &RequestId) -> Option<&DrawRequest> {
        self.requests.get(request_id)
    }

    pub fn pending_requests(&self) -> Vec<&DrawRequest> {
        self.requests
            .values()
            .filter(|request| !request.is_fulfilled())
            .collect()
    }

    pub fn retire_round(&mut self, round_id: RoundId) -> usize {
        let before = self.requests.len();
        self.requests.retain(|_, request| request.round_id != round_id);
        before - self.requests.len()
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }
}

/// The oracle strategy a lottery is wired to.
///
/// Externally tagged; an internally tagged enum cannot carry the `u128`
/// values of its request book.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleClient {
    Mock(MockOracle),
    Vrf(VrfOracle),
}

impl OracleClient {
    fn inner(&self) -> &dyn RandomnessOracle {
        match self {
            OracleClient::Mock(oracle) => oracle,
            OracleClient::Vrf(oracle) => oracle,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn RandomnessOracle {
        match self {
            OracleClient::Mock(oracle) => oracle,
            OracleClient::Vrf(oracle) => oracle,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OracleClient::Mock(_) => "mock",
            OracleClient::Vrf(_) => "vrf",
        }
    }
}

impl RandomnessOracle for OracleClient {
    fn address(&self) -> &Address {
        self.inner().address()
    }

    fn request_random(
        &mut self,
        requester: &Address,
        round_id: RoundId,
        seed: u64,
    ) -> Result<RequestId> {
        self.inner_mut().request_random(requester, round_id, seed)
    }

    fn deliver(&mut self, request_id: &RequestId, delivery: &Delivery) -> Result<Fulfillment> {
        self.inner_mut().deliver(request_id, delivery)
    }

    fn request(&self, request_id: &RequestId) -> Option<&DrawRequest> {
        self.inner().request(request_id)
    }

    fn pending_requests(&self) -> Vec<&DrawRequest> {
        self.inner().pending_requests()
    }

    fn retire_round(&mut self, round_id: RoundId) -> usize {
        self.inner_mut().retire_round(round_id)
    }

    fn fund(&mut self, amount: Amount) -> Result<()> {
        self.inner_mut().fund(amount)
    }

    fn fee_balance(&self) -> Amount {
        self.inner().fee_balance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lottery() -> Address {
        Address::new("pick4:lottery").unwrap()
    }

    #[test]
    fn test_request_ids_are_unique_per_nonce() {
        let mut book = RequestBook::new();
        let first = book.open("key", &lottery(), 1, 42);
        let second = book.open("key", &lottery(), 1, 42);

        assert_ne!(first, second);
        assert_eq!(book.nonce(), 2);
        assert_eq!(book.pending_requests().len(), 2);
    }

    #[test]
    fn test_fulfill_once() {
        let mut book = RequestBook::new();
        let id = book.open("key", &lottery(), 3, 7);

        let fulfillment = book.fulfill(&id, 123_456_789).unwrap();
        assert_eq!(fulfillment.round_id, 3);
        assert_eq!(fulfillment.random_value, 123_456_789);
        assert!(book.get(&id).unwrap().is_fulfilled());

        let err = book.fulfill(&id, 1).unwrap_err();
        assert!(matches!(err, LotteryError::UnknownOrFulfilledRequest(_)));
        assert_eq!(book.get(&id).unwrap().random_value, Some(123_456_789));
    }

    #[test]
    fn test_unknown_request_rejected() {
        let mut book = RequestBook::new();
        let unknown = RequestId::from_digest([7; 32]);
        assert!(matches!(
            book.fulfill(&unknown, 1),
            Err(LotteryError::UnknownOrFulfilledRequest(id)) if id == unknown
        ));
        assert!(book.pending_requests().is_empty());
    }

    #[test]
    fn test_retired_round_requests_are_dropped() {
        let mut book = RequestBook::new();
        let superseded = book.open("key", &lottery(), 1, 1);
        let closing = book.open("key", &lottery(), 1, 2);
        let next = book.open("key", &lottery(), 2, 3);
        book.fulfill(&closing, 6789).unwrap();

        assert_eq!(book.retire_round(1), 2);
        assert!(book.get(&superseded).is_none());
        assert!(matches!(
            book.fulfill(&closing, 1),
            Err(LotteryError::UnknownOrFulfilledRequest(_))
        ));
        assert_eq!(book.pending_requests().len(), 1);
        assert_eq!(book.pending_requests()[0].request_id, next);

        // ids never repeat after pruning
        assert_eq!(book.nonce(), 3);
        assert_ne!(book.open("key", &lottery(), 1, 1), superseded);
    }

    #[test]
    fn test_fulfilled_client_survives_json() {
        let mut client = OracleClient::Mock(MockOracle::new(
            Address::new("pick4:oracle").unwrap(),
            lottery(),
        ));
        let id = client.request_random(&lottery(), 1, 9).unwrap();
        client.request_random(&lottery(), 1, 10).unwrap();
        client.deliver(&id, &Delivery::Value(u128::MAX)).unwrap();

        let json = serde_json::to_string(&client).unwrap();
        let restored: OracleClient = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.kind(), "mock");
        assert_eq!(restored.request(&id).unwrap().random_value, Some(u128::MAX));
        assert_eq!(restored.pending_requests().len(), 1);
    }
}
