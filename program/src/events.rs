// Raffle event records
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    entrypoint::ProgramResult, log::sol_log_data, msg, program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::utils::lamports_to_sol;

/// Append-only notifications for off-chain monitors.
///
/// Each event is logged twice: a readable `msg!` line and a borsh record
/// through `sol_log_data` so indexers can decode it.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum RaffleEvent {
    Entered { participant: Pubkey, amount: u64 },
    DrawRequested { request_id: u64 },
    WinnerPaid { winner: Pubkey, amount: u64 },
}

impl RaffleEvent {
    pub fn emit(&self) -> ProgramResult {
        match self {
            Self::Entered { participant, amount } => {
                msg!("Raffle entered by {} with {} lamports", participant, amount)
            }
            Self::DrawRequested { request_id } => msg!("Raffle draw requested: {}", request_id),
            Self::WinnerPaid { winner, amount } => msg!(
                "Raffle winner {} paid {} SOL",
                winner,
                lamports_to_sol(*amount)
            ),
        }

        let record = self
            .try_to_vec()
            .map_err(|e| ProgramError::BorshIoError(e.to_string()))?;
        sol_log_data(&[&record]);
        Ok(())
    }
}
