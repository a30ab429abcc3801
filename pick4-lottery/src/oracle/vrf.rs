use super::{Delivery, DrawRequest, Fulfillment, RandomnessOracle, RequestBook};
use crate::{LotteryError, Result};
use pick4_core::{Address, Amount, CoreError, OracleConfig, RandomValue, RequestId, RoundId};
use schnorrkel::context::SigningContext;
use schnorrkel::vrf::{VRFInOut, VRFPreOut, VRFProof};
use schnorrkel::{Keypair, PublicKey};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const VRF_SIGNING_CONTEXT: &[u8] = b"pick4-draw";

/// Domain separator for turning a VRF output into the draw value.
const VRF_VALUE_CONTEXT: &[u8] = b"pick4-draw-value";

/// Provider answer for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VrfResponse {
    /// Hex-encoded 32-byte VRF pre-output, unique per key and request
    pub output: String,
    /// Hex-encoded 64-byte DLEQ proof that `output` belongs to the request
    pub proof: String,
}

/// Message the provider evaluates for a request. Commits to every wire field.
pub fn vrf_input(request: &DrawRequest) -> String {
    format!(
        "{}:{}:{}:{}",
        request.request_id, request.round_id, request.seed, request.requester
    )
}

fn draw_value(inout: &VRFInOut) -> RandomValue {
    RandomValue::from_be_bytes(inout.make_bytes::<[u8; 16]>(VRF_VALUE_CONTEXT))
}

/// Off-ledger randomness provider holding the signing key.
pub struct VrfProvider {
    keypair: Arc<Keypair>,
}

impl VrfProvider {
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    pub fn new_random() -> Self {
        use rand_core::OsRng;
        Self::new(Keypair::generate_with(OsRng))
    }

    pub fn from_secret_hex(secret: &str) -> Result<Self> {
        let bytes = hex::decode(secret)
            .map_err(|e| LotteryError::internal(format!("Invalid provider key hex: {}", e)))?;
        let keypair = Keypair::from_bytes(&bytes)
            .map_err(|e| LotteryError::internal(format!("Invalid provider key: {:?}", e)))?;
        Ok(Self::new(keypair))
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.keypair.to_bytes())
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.keypair.public.to_bytes())
    }

    /// Evaluate the VRF on a pending request.
    ///
    /// The output is fixed by the key and the request; only the proof
    /// carries fresh randomness, so re-signing cannot change the draw.
    pub fn respond(&self, request: &DrawRequest) -> VrfResponse {
        let ctx = SigningContext::new(VRF_SIGNING_CONTEXT);
        let (inout, proof, _) = self.keypair.vrf_sign(ctx.bytes(vrf_input(request).as_bytes()));

        VrfResponse {
            output: hex::encode(inout.to_preout().to_bytes()),
            proof: hex::encode(proof.to_bytes()),
        }
    }
}

/// Check `response` against the provider key and return the random value.
pub fn verify_response(
    provider_public_key: &str,
    request: &DrawRequest,
    response: &VrfResponse,
) -> Result<RandomValue> {
    let public_key_bytes = hex::decode(provider_public_key)
        .map_err(|e| LotteryError::invalid_proof(format!("public key hex: {}", e)))?;
    let public_key = PublicKey::from_bytes(&public_key_bytes)
        .map_err(|e| LotteryError::invalid_proof(format!("public key: {:?}", e)))?;

    let output_bytes = hex::decode(&response.output)
        .map_err(|e| LotteryError::invalid_proof(format!("output hex: {}", e)))?;
    let preout = VRFPreOut::from_bytes(&output_bytes)
        .map_err(|e| LotteryError::invalid_proof(format!("output: {:?}", e)))?;

    let proof_bytes = hex::decode(&response.proof)
        .map_err(|e| LotteryError::invalid_proof(format!("proof hex: {}", e)))?;
    let proof = VRFProof::from_bytes(&proof_bytes)
        .map_err(|e| LotteryError::invalid_proof(format!("proof: {:?}", e)))?;

    let ctx = SigningContext::new(VRF_SIGNING_CONTEXT);
    let (inout, _) = public_key
        .vrf_verify(ctx.bytes(vrf_input(request).as_bytes()), &preout, &proof)
        .map_err(|_| LotteryError::invalid_proof("output does not match request"))?;

    Ok(draw_value(&inout))
}

/// Oracle backed by a verifiable-randomness provider.
///
/// Each request costs `request_fee` fee tokens out of the oracle's own
/// balance; a delivery is accepted only with a valid provider proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VrfOracle {
    address: Address,
    consumer: Address,
    provider_public_key: String,
    key_hash: String,
    request_fee: Amount,
    fee_balance: Amount,
    book: RequestBook,
}

impl VrfOracle {
    pub fn new(
        address: Address,
        consumer: Address,
        provider_public_key: &str,
        config: &OracleConfig,
    ) -> Result<Self> {
        let key = hex::decode(provider_public_key)
            .map_err(|e| CoreError::config(format!("Provider public key is not hex: {}", e)))?;
        if key.len() != 32 {
            return Err(CoreError::config("Provider public key must be 32 bytes").into());
        }

        Ok(Self {
            address,
            consumer,
            provider_public_key: provider_public_key.to_lowercase(),
            key_hash: config.key_hash.clone(),
            request_fee: config.request_fee,
            fee_balance: 0,
            book: RequestBook::new(),
        })
    }

    pub fn provider_public_key(&self) -> &str {
        &self.provider_public_key
    }

    pub fn request_fee(&self) -> Amount {
        self.request_fee
    }
}

impl RandomnessOracle for VrfOracle {
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

        if self.fee_balance < self.request_fee {
            return Err(LotteryError::InsufficientOracleFunds {
                need: self.request_fee,
                available: self.fee_balance,
            });
        }

        self.fee_balance -= self.request_fee;
        let request_id = self.book.open(&self.key_hash, requester, round_id, seed);

        tracing::info!(
            "VRF request {} for round {} (fee {}, remaining {})",
            request_id.short(),
            round_id,
            self.request_fee,
            self.fee_balance
        );
        Ok(request_id)
    }

    fn deliver(&mut self, request_id: &RequestId, delivery: &Delivery) -> Result<Fulfillment> {
        let request = self.book.pending(request_id)?;

        let response = match delivery {
            Delivery::Proof(response) => response,
            Delivery::Value(_) => {
                return Err(LotteryError::invalid_proof(
                    "VRF oracle requires a provider proof",
                ))
            }
        };

        let value = verify_response(&self.provider_public_key, request, response)?;
        self.book.fulfill(request_id, value)
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
        tracing::info!("VRF oracle funded with {}, balance {}", amount, self.fee_balance);
        Ok(())
    }

    fn fee_balance(&self) -> Amount {
        self.fee_balance
    }
}
