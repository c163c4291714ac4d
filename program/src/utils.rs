// Interval Raffle Program - Utility Functions
use solana_program::pubkey::Pubkey;

/// Seed prefix of the raffle account
pub const RAFFLE_SEED: &[u8] = b"raffle";

/// Find the program derived address of the raffle created by `authority`
pub fn find_raffle_address(program_id: &Pubkey, authority: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[RAFFLE_SEED, authority.as_ref()], program_id)
}

/// Convert lamports to SOL (for display purposes)
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / 1_000_000_000.0
}
