// Interval Raffle Program - Instructions
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::{Pubkey, PUBKEY_BYTES},
    system_program,
};
use std::convert::TryInto;

use crate::{
    error::RaffleError,
    state::RaffleConfig,
    switchboard::SwitchboardRequestKeys,
    vrf::{RandomWord, RandomnessRequestParams, RandomnessSource},
};

#[derive(Clone, Debug, PartialEq)]
pub enum RaffleInstruction {
    /// Create the raffle account and open the first round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The authority, pays for the raffle account
    /// 1. `[writable]` The raffle account (PDA of `["raffle", authority]`)
    /// 2. `[]` The system program
    InitializeRaffle { config: RaffleConfig },

    /// Enter the current round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The participant paying the entry fee
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The system program
    EnterRaffle {
        /// Payment in lamports, at least the entry fee
        amount: u64,
    },

    /// Report whether a draw can start; the `UpkeepStatus` is set as return data
    ///
    /// Accounts expected:
    /// 0. `[]` The raffle account
    CheckUpkeep,

    /// Start a draw by requesting randomness (anyone may call)
    ///
    /// Accounts expected:
    /// 0. `[signer]` The automation caller
    /// 1. `[writable]` The raffle account
    ///
    /// Switchboard raffles additionally take, in order:
    /// 2. `[writable]` The VRF account
    /// 3. `[writable]` The oracle queue
    /// 4. `[]` The queue authority
    /// 5. `[]` The queue data buffer
    /// 6. `[writable]` The VRF permission account
    /// 7. `[writable]` The VRF escrow token account
    /// 8. `[writable]` The caller's token account paying for the request
    /// 9. `[]` The recent blockhashes sysvar
    /// 10. `[]` The Switchboard program state
    /// 11. `[]` The token program
    /// 12. `[]` The Switchboard program
    PerformUpkeep {
        /// Opaque data from `CheckUpkeep`
        perform_data: Vec<u8>,
    },

    /// Deliver random words for the pending request and pay the winner
    ///
    /// Accounts expected:
    /// 0. `[signer]` The randomness coordinator
    /// 1. `[writable]` The raffle account
    /// 2.. `[writable]` Candidate winner accounts; the selected entrant must be among them
    FulfillRandomWords {
        request_id: u64,
        random_words: Vec<RandomWord>,
    },

    /// Settle the pending draw from a Switchboard VRF result (anyone may call)
    ///
    /// Accounts expected:
    /// 0. `[]` The VRF account configured as the raffle's coordinator
    /// 1. `[writable]` The raffle account
    /// 2.. `[writable]` Candidate winner accounts; the selected entrant must be among them
    ConsumeRandomness,
}

impl RaffleInstruction {
    /// Unpacks a byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (&tag, rest) = input.split_first().ok_or(RaffleError::InvalidInstruction)?;

        Ok(match tag {
            0 => {
                let (entry_fee, rest) = Self::unpack_u64(rest)?;
                let (draw_interval, rest) = Self::unpack_i64(rest)?;
                let (max_entrants, rest) = Self::unpack_u32(rest)?;
                let (coordinator, rest) = Self::unpack_fixed_bytes::<PUBKEY_BYTES>(rest)?;
                let (&source, rest) = rest.split_first().ok_or(RaffleError::InvalidInstruction)?;
                let randomness_source =
                    RandomnessSource::from_u8(source).ok_or(RaffleError::InvalidInstruction)?;
                let (key_hash, rest) = Self::unpack_fixed_bytes::<32>(rest)?;
                let (subscription_id, rest) = Self::unpack_u64(rest)?;
                let (request_confirmations, rest) = Self::unpack_u16(rest)?;
                let (callback_gas_limit, rest) = Self::unpack_u32(rest)?;
                let (num_words, _) = Self::unpack_u32(rest)?;
                Self::InitializeRaffle {
                    config: RaffleConfig {
                        entry_fee,
                        draw_interval,
                        max_entrants,
                        coordinator: Pubkey::new_from_array(coordinator),
                        randomness_source,
                        request_params: RandomnessRequestParams {
                            key_hash,
                            subscription_id,
                            request_confirmations,
                            callback_gas_limit,
                            num_words,
                        },
                    },
                }
            }
            1 => {
                let (amount, _) = Self::unpack_u64(rest)?;
                Self::EnterRaffle { amount }
            }
            2 => Self::CheckUpkeep,
            3 => Self::PerformUpkeep {
                perform_data: rest.to_vec(),
            },
            4 => {
                let (request_id, rest) = Self::unpack_u64(rest)?;
                let (count, mut rest) = Self::unpack_u32(rest)?;
                let mut random_words = Vec::with_capacity((count as usize).min(rest.len() / 32));
                for _ in 0..count {
                    let (word, next) = Self::unpack_fixed_bytes::<32>(rest)?;
                    random_words.push(word);
                    rest = next;
                }
                Self::FulfillRandomWords {
                    request_id,
                    random_words,
                }
            }
            5 => Self::ConsumeRandomness,
            _ => return Err(RaffleError::InvalidInstruction.into()),
        })
    }

    /// Packs a RaffleInstruction into a byte buffer
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Self::InitializeRaffle { config } => {
                buf.push(0);
                buf.extend_from_slice(&config.entry_fee.to_le_bytes());
                buf.extend_from_slice(&config.draw_interval.to_le_bytes());
                buf.extend_from_slice(&config.max_entrants.to_le_bytes());
                buf.extend_from_slice(config.coordinator.as_ref());
                buf.push(config.randomness_source.to_u8());
                let params = &config.request_params;
                buf.extend_from_slice(&params.key_hash);
                buf.extend_from_slice(&params.subscription_id.to_le_bytes());
                buf.extend_from_slice(&params.request_confirmations.to_le_bytes());
                buf.extend_from_slice(&params.callback_gas_limit.to_le_bytes());
                buf.extend_from_slice(&params.num_words.to_le_bytes());
            }
            Self::EnterRaffle { amount } => {
                buf.push(1);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::CheckUpkeep => buf.push(2),
            Self::PerformUpkeep { perform_data } => {
                buf.push(3);
                buf.extend_from_slice(perform_data);
            }
            Self::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                buf.push(4);
                buf.extend_from_slice(&request_id.to_le_bytes());
                buf.extend_from_slice(&(random_words.len() as u32).to_le_bytes());
                for word in random_words {
                    buf.extend_from_slice(word);
                }
            }
            Self::ConsumeRandomness => buf.push(5),
        }
        buf
    }

    fn unpack_fixed_bytes<const N: usize>(input: &[u8]) -> Result<([u8; N], &[u8]), ProgramError> {
        if input.len() < N {
            return Err(RaffleError::InvalidInstruction.into());
        }
        let (bytes, rest) = input.split_at(N);
        let bytes = bytes
            .try_into()
            .map_err(|_| ProgramError::from(RaffleError::InvalidInstruction))?;
        Ok((bytes, rest))
    }

    fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), ProgramError> {
        let (bytes, rest) = Self::unpack_fixed_bytes::<8>(input)?;
        Ok((u64::from_le_bytes(bytes), rest))
    }

    fn unpack_i64(input: &[u8]) -> Result<(i64, &[u8]), ProgramError> {
        let (bytes, rest) = Self::unpack_fixed_bytes::<8>(input)?;
        Ok((i64::from_le_bytes(bytes), rest))
    }

    fn unpack_u32(input: &[u8]) -> Result<(u32, &[u8]), ProgramError> {
        let (bytes, rest) = Self::unpack_fixed_bytes::<4>(input)?;
        Ok((u32::from_le_bytes(bytes), rest))
    }

    fn unpack_u16(input: &[u8]) -> Result<(u16, &[u8]), ProgramError> {
        let (bytes, rest) = Self::unpack_fixed_bytes::<2>(input)?;
        Ok((u16::from_le_bytes(bytes), rest))
    }
}

/// Create initialize_raffle instruction
pub fn initialize_raffle(
    program_id: &Pubkey,
    authority: &Pubkey,
    raffle_account: &Pubkey,
    config: RaffleConfig,
) -> Instruction {
    let data = RaffleInstruction::InitializeRaffle { config }.pack();

    let accounts = vec![
        AccountMeta::new(*authority, true),
        AccountMeta::new(*raffle_account, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data,
    }
}

/// Create enter_raffle instruction
pub fn enter_raffle(
    program_id: &Pubkey,
    participant: &Pubkey,
    raffle_account: &Pubkey,
    amount: u64,
) -> Instruction {
    let data = RaffleInstruction::EnterRaffle { amount }.pack();

    let accounts = vec![
        AccountMeta::new(*participant, true),
        AccountMeta::new(*raffle_account, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data,
    }
}

/// Create check_upkeep instruction
pub fn check_upkeep(program_id: &Pubkey, raffle_account: &Pubkey) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new_readonly(*raffle_account, false)],
        data: RaffleInstruction::CheckUpkeep.pack(),
    }
}

/// Create perform_upkeep instruction
pub fn perform_upkeep(
    program_id: &Pubkey,
    caller: &Pubkey,
    raffle_account: &Pubkey,
    perform_data: Vec<u8>,
) -> Instruction {
    let data = RaffleInstruction::PerformUpkeep { perform_data }.pack();

    let accounts = vec![
        AccountMeta::new_readonly(*caller, true),
        AccountMeta::new(*raffle_account, false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data,
    }
}

/// Create perform_upkeep instruction for a raffle drawing through Switchboard
pub fn perform_upkeep_with_switchboard(
    program_id: &Pubkey,
    caller: &Pubkey,
    raffle_account: &Pubkey,
    switchboard: &SwitchboardRequestKeys,
) -> Instruction {
    let mut ix = perform_upkeep(program_id, caller, raffle_account, vec![]);
    ix.accounts.extend(switchboard.to_account_metas());
    ix
}

/// Create fulfill_random_words instruction
pub fn fulfill_random_words(
    program_id: &Pubkey,
    coordinator: &Pubkey,
    raffle_account: &Pubkey,
    request_id: u64,
    random_words: Vec<RandomWord>,
    candidates: &[Pubkey],
) -> Instruction {
    let data = RaffleInstruction::FulfillRandomWords {
        request_id,
        random_words,
    }
    .pack();

    let mut accounts = vec![
        AccountMeta::new_readonly(*coordinator, true),
        AccountMeta::new(*raffle_account, false),
    ];
    accounts.extend(candidates.iter().map(|key| AccountMeta::new(*key, false)));

    Instruction {
        program_id: *program_id,
        accounts,
        data,
    }
}

/// Create consume_randomness instruction
pub fn consume_randomness(
    program_id: &Pubkey,
    vrf: &Pubkey,
    raffle_account: &Pubkey,
    candidates: &[Pubkey],
) -> Instruction {
    let mut accounts = vec![
        AccountMeta::new_readonly(*vrf, false),
        AccountMeta::new(*raffle_account, false),
    ];
    accounts.extend(candidates.iter().map(|key| AccountMeta::new(*key, false)));

    Instruction {
        program_id: *program_id,
        accounts,
        data: RaffleInstruction::ConsumeRandomness.pack(),
    }
}
