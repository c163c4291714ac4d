// Interval Raffle Program - State
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::AccountInfo,
    clock::UnixTimestamp,
    entrypoint::ProgramResult,
    msg,
    program_error::ProgramError,
    program_pack::{IsInitialized, Sealed},
    pubkey::{Pubkey, PUBKEY_BYTES},
};

use crate::{
    error::RaffleError,
    events::RaffleEvent,
    ledger::Ledger,
    vrf::{
        self, RandomWord, RandomnessProvider, RandomnessRequest, RandomnessRequestParams,
        RandomnessSource,
    },
};

/// Status of the current round
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaffleState {
    /// Accepting entries
    Open,
    /// A randomness request is outstanding
    Drawing,
}

/// Raffle settings fixed at initialization
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RaffleConfig {
    /// Minimum payment per entry in lamports
    pub entry_fee: u64,
    /// Seconds that must pass between draws
    pub draw_interval: i64,
    /// Capacity of the entrant list, fixes the account size
    pub max_entrants: u32,
    /// Key allowed to fulfill draws: the coordinator signer, or the Switchboard VRF account
    pub coordinator: Pubkey,
    pub randomness_source: RandomnessSource,
    /// Forwarded verbatim to the coordinator
    pub request_params: RandomnessRequestParams,
}

impl RaffleConfig {
    pub const LEN: usize = 8 + 8 + 4 + PUBKEY_BYTES + 1 + RandomnessRequestParams::LEN;

    pub fn validate(&self) -> Result<(), RaffleError> {
        if self.entry_fee == 0 {
            msg!("Entry fee must be greater than zero");
            return Err(RaffleError::InvalidConfig);
        }
        if self.draw_interval < 0 {
            msg!("Draw interval cannot be negative");
            return Err(RaffleError::InvalidConfig);
        }
        if self.max_entrants == 0 {
            msg!("Raffle must allow at least one entrant");
            return Err(RaffleError::InvalidConfig);
        }
        if self.request_params.num_words == 0 {
            msg!("At least one random word must be requested");
            return Err(RaffleError::InvalidConfig);
        }
        Ok(())
    }
}

/// Result of the upkeep check, returned to automation callers
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct UpkeepStatus {
    pub upkeep_needed: bool,
    /// Handed back to `PerformUpkeep`; currently always empty
    pub perform_data: Vec<u8>,
}

/// Raffle account data
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct Raffle {
    /// Is the account initialized
    pub is_initialized: bool,
    /// Creator of the raffle; has no privileges after initialization
    pub authority: Pubkey,
    /// Bump of the raffle PDA
    pub bump: u8,
    pub config: RaffleConfig,
    pub state: RaffleState,
    /// One slot per entry, in entry order
    pub entrants: Vec<Pubkey>,
    /// Lamports collected since the last payout
    pub pot: u64,
    /// Time of the last payout, or of creation
    pub last_draw_timestamp: UnixTimestamp,
    /// Set exactly while `state == Drawing`
    pub pending_request_id: Option<u64>,
    pub recent_winner: Option<Pubkey>,
    /// Nonce used for the next randomness request
    pub request_nonce: u64,
    pub rounds_completed: u64,
}

impl Sealed for Raffle {}

impl IsInitialized for Raffle {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Raffle {
    const FIXED_LEN: usize = 1 // is_initialized
        + PUBKEY_BYTES // authority
        + 1 // bump
        + RaffleConfig::LEN
        + 1 // state
        + 4 // entrants length prefix
        + 8 // pot
        + 8 // last_draw_timestamp
        + 1 + 8 // pending_request_id
        + 1 + PUBKEY_BYTES // recent_winner
        + 8 // request_nonce
        + 8; // rounds_completed

    /// Account size needed to hold `max_entrants` entries
    pub fn space(max_entrants: u32) -> usize {
        Self::FIXED_LEN + max_entrants as usize * PUBKEY_BYTES
    }

    /// Create a fresh, open raffle
    pub fn new(
        authority: Pubkey,
        bump: u8,
        config: RaffleConfig,
        now: UnixTimestamp,
    ) -> Result<Self, ProgramError> {
        config.validate()?;

        Ok(Self {
            is_initialized: true,
            authority,
            bump,
            config,
            state: RaffleState::Open,
            entrants: Vec::new(),
            pot: 0,
            last_draw_timestamp: now,
            pending_request_id: None,
            recent_winner: None,
            request_nonce: 1,
            rounds_completed: 0,
        })
    }

    pub fn unpack_from_slice(data: &[u8]) -> Result<Self, ProgramError> {
        let mut buf = data;
        Self::deserialize(&mut buf).map_err(|_| ProgramError::InvalidAccountData)
    }

    /// Read an initialized raffle from an account owned by this program
    pub fn load(raffle_info: &AccountInfo, program_id: &Pubkey) -> Result<Self, ProgramError> {
        if raffle_info.owner != program_id {
            msg!("Raffle account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }

        let raffle = Self::unpack_from_slice(&raffle_info.data.borrow())?;
        if !raffle.is_initialized {
            msg!("Raffle account is not initialized");
            return Err(ProgramError::UninitializedAccount);
        }
        Ok(raffle)
    }

    pub fn save(&self, raffle_info: &AccountInfo) -> ProgramResult {
        let mut data = raffle_info.try_borrow_mut_data()?;
        let mut dst: &mut [u8] = &mut data[..];
        self.serialize(&mut dst)
            .map_err(|_| ProgramError::AccountDataTooSmall)
    }

    /// Record one entry for `participant`
    pub fn enter(&mut self, participant: Pubkey, amount: u64) -> Result<RaffleEvent, ProgramError> {
        if self.state != RaffleState::Open {
            msg!("Entries are closed while a draw is in progress");
            return Err(RaffleError::RoundNotOpen.into());
        }
        if amount < self.config.entry_fee {
            msg!(
                "Payment of {} lamports is below the entry fee of {}",
                amount,
                self.config.entry_fee
            );
            return Err(RaffleError::InsufficientPayment.into());
        }
        if self.entrants.len() >= self.config.max_entrants as usize {
            msg!("Raffle is full ({} entrants)", self.entrants.len());
            return Err(RaffleError::RaffleFull.into());
        }

        self.pot = self
            .pot
            .checked_add(amount)
            .ok_or(RaffleError::ArithmeticOverflow)?;
        self.entrants.push(participant);

        Ok(RaffleEvent::Entered {
            participant,
            amount,
        })
    }

    /// Whether a draw may start at `now`
    pub fn is_eligible(&self, now: UnixTimestamp) -> bool {
        let is_open = self.state == RaffleState::Open;
        let has_players = !self.entrants.is_empty();
        let has_balance = self.pot > 0;
        let time_passed = now.saturating_sub(self.last_draw_timestamp) >= self.config.draw_interval;

        is_open && has_players && has_balance && time_passed
    }

    pub fn check_upkeep(&self, now: UnixTimestamp) -> UpkeepStatus {
        UpkeepStatus {
            upkeep_needed: self.is_eligible(now),
            perform_data: Vec::new(),
        }
    }

    /// Start a draw: re-check eligibility, request randomness and close entries
    pub fn initiate_draw<P: RandomnessProvider>(
        &mut self,
        consumer: &Pubkey,
        now: UnixTimestamp,
        provider: &mut P,
    ) -> Result<RaffleEvent, ProgramError> {
        if !self.is_eligible(now) {
            msg!(
                "Upkeep not needed: state={:?}, players={}, pot={}",
                self.state,
                self.entrants.len(),
                self.pot
            );
            return Err(RaffleError::NotEligible.into());
        }

        let next_nonce = self
            .request_nonce
            .checked_add(1)
            .ok_or(RaffleError::ArithmeticOverflow)?;
        let request = RandomnessRequest {
            consumer: *consumer,
            nonce: self.request_nonce,
            params: self.config.request_params,
        };
        let request_id = provider.request_random_words(&request)?;

        self.request_nonce = next_nonce;
        self.state = RaffleState::Drawing;
        self.pending_request_id = Some(request_id);

        Ok(RaffleEvent::DrawRequested { request_id })
    }

    /// Settle the pending draw with the coordinator's random words.
    ///
    /// Nothing is written unless the payout succeeds, so a failed transfer
    /// leaves the round in `Drawing` with the same request id.
    pub fn fulfill<L: Ledger>(
        &mut self,
        caller: &Pubkey,
        request_id: u64,
        random_words: &[RandomWord],
        now: UnixTimestamp,
        ledger: &mut L,
    ) -> Result<RaffleEvent, ProgramError> {
        if *caller != self.config.coordinator {
            msg!("SECURITY: fulfillment attempted by {}", caller);
            return Err(RaffleError::Unauthorized.into());
        }
        match (self.state, self.pending_request_id) {
            (RaffleState::Drawing, Some(pending)) if pending == request_id => {}
            _ => {
                msg!("INTEGRITY: rejected fulfillment for request {}", request_id);
                return Err(RaffleError::UnknownRequest.into());
            }
        }
        let word = random_words
            .first()
            .ok_or(RaffleError::MissingRandomWords)?;

        let winner = match vrf::winner_index(word, self.entrants.len())
            .and_then(|index| self.entrants.get(index))
        {
            Some(winner) => *winner,
            None => {
                msg!("INTEGRITY: round {} is drawing without entrants", request_id);
                return Err(ProgramError::InvalidAccountData);
            }
        };
        let amount = self.pot;
        let rounds_completed = self
            .rounds_completed
            .checked_add(1)
            .ok_or(RaffleError::ArithmeticOverflow)?;

        ledger.transfer(&winner, amount).map_err(|e| {
            msg!(
                "Payout of {} lamports to {} failed ({}); round {} needs operator action",
                amount,
                winner,
                e,
                request_id
            );
            RaffleError::PayoutFailed
        })?;

        self.recent_winner = Some(winner);
        self.entrants.clear();
        self.pot = 0;
        self.last_draw_timestamp = now;
        self.pending_request_id = None;
        self.state = RaffleState::Open;
        self.rounds_completed = rounds_completed;

        Ok(RaffleEvent::WinnerPaid { winner, amount })
    }

    pub fn entrance_fee(&self) -> u64 {
        self.config.entry_fee
    }

    pub fn interval(&self) -> i64 {
        self.config.draw_interval
    }

    pub fn raffle_state(&self) -> RaffleState {
        self.state
    }

    pub fn player(&self, index: usize) -> Option<&Pubkey> {
        self.entrants.get(index)
    }

    pub fn number_of_players(&self) -> usize {
        self.entrants.len()
    }

    pub fn latest_timestamp(&self) -> UnixTimestamp {
        self.last_draw_timestamp
    }

    pub fn recent_winner(&self) -> Option<Pubkey> {
        self.recent_winner
    }

    pub fn num_words(&self) -> u32 {
        self.config.request_params.num_words
    }

    pub fn request_confirmations(&self) -> u16 {
        self.config.request_params.request_confirmations
    }

    pub fn pending_request_id(&self) -> Option<u64> {
        self.pending_request_id
    }

    pub fn pot(&self) -> u64 {
        self.pot
    }
}
