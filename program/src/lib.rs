// Interval Raffle
// A self-running raffle on Solana: players enter for a fixed fee, an
// automation caller starts the draw once the interval has passed, and a VRF
// coordinator delivers the randomness that picks and pays the winner.

pub mod error;
pub mod events;
pub mod instruction;
pub mod ledger;
pub mod processor;
pub mod state;
pub mod switchboard;
pub mod utils;

// VRF module for randomness
pub mod vrf;

#[cfg(not(feature = "no-entrypoint"))]
pub mod entrypoint;

use solana_program::{account_info::AccountInfo, entrypoint::ProgramResult, pubkey::Pubkey};

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    processor::Processor::process_instruction(program_id, accounts, instruction_data)
}
