// VRF coordinator integration for the interval raffle
use arrayref::array_ref;
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    hash::hashv, log::sol_log_data, msg, program_error::ProgramError, pubkey::Pubkey,
};

/// One random word delivered by the coordinator, read as a big-endian 256-bit integer
pub type RandomWord = [u8; 32];

/// Parameters forwarded to the coordinator with every request.
///
/// The raffle never interprets these; they select the coordinator's key,
/// billing subscription and delivery settings.
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RandomnessRequestParams {
    /// Key hash ("gas lane") identifying the coordinator's proving key
    pub key_hash: [u8; 32],
    /// Subscription billed for the request
    pub subscription_id: u64,
    /// Confirmations the coordinator waits before answering
    pub request_confirmations: u16,
    /// Compute limit the coordinator should budget for the callback
    pub callback_gas_limit: u32,
    /// Number of random words requested
    pub num_words: u32,
}

impl RandomnessRequestParams {
    pub const LEN: usize = 32 + 8 + 2 + 4 + 4;
}

impl Default for RandomnessRequestParams {
    fn default() -> Self {
        Self {
            key_hash: [0u8; 32],
            subscription_id: 0,
            request_confirmations: 3,
            callback_gas_limit: 500_000,
            num_words: 1,
        }
    }
}

/// Request record published to the coordinator
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct RandomnessRequest {
    /// Raffle account that will receive the fulfillment
    pub consumer: Pubkey,
    /// Per-raffle request counter
    pub nonce: u64,
    pub params: RandomnessRequestParams,
}

/// Where a raffle gets its randomness, fixed at initialization
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RandomnessSource {
    /// A coordinator key that signs `FulfillRandomWords`; requests are published as log records
    Coordinator,
    /// A Switchboard V2 VRF account whose authority is the raffle; results are read on-chain
    Switchboard,
}

impl RandomnessSource {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Coordinator),
            1 => Some(Self::Switchboard),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Coordinator => 0,
            Self::Switchboard => 1,
        }
    }
}

/// Something that accepts randomness requests and hands back a request id.
/// The random words arrive later through a separate fulfillment call.
pub trait RandomnessProvider {
    fn request_random_words(&mut self, request: &RandomnessRequest) -> Result<u64, ProgramError>;
}

/// Derive the request id the coordinator will answer to
pub fn derive_request_id(request: &RandomnessRequest) -> u64 {
    let hash = hashv(&[
        &request.params.key_hash,
        request.consumer.as_ref(),
        &request.params.subscription_id.to_le_bytes(),
        &request.nonce.to_le_bytes(),
    ]);
    u64::from_le_bytes(*array_ref![hash.as_ref(), 0, 8])
}

/// On-chain provider: publishes the request as a log record for the off-chain
/// coordinator and returns the derived id.
pub struct LogCoordinator;

impl RandomnessProvider for LogCoordinator {
    fn request_random_words(&mut self, request: &RandomnessRequest) -> Result<u64, ProgramError> {
        let request_id = derive_request_id(request);
        let record = request
            .try_to_vec()
            .map_err(|e| ProgramError::BorshIoError(e.to_string()))?;
        sol_log_data(&[b"RandomnessRequested", &request_id.to_le_bytes(), &record]);
        msg!(
            "Randomness requested: id={}, words={}, confirmations={}",
            request_id,
            request.params.num_words,
            request.params.request_confirmations
        );
        Ok(request_id)
    }
}

/// Reduce a random word modulo the entrant count; `None` when there is nobody to pick
pub fn winner_index(word: &RandomWord, entrant_count: usize) -> Option<usize> {
    if entrant_count == 0 {
        return None;
    }

    let modulus = entrant_count as u128;
    let remainder = word
        .iter()
        .fold(0u128, |acc, byte| ((acc << 8) | *byte as u128) % modulus);
    Some(remainder as usize)
}
