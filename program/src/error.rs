// Interval Raffle Program - Errors
use solana_program::{
    decode_error::DecodeError, msg, program_error::PrintProgramError, program_error::ProgramError,
};
use thiserror::Error;

/// Errors that may be returned by the raffle program
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RaffleError {
    /// Payment is below the entry fee
    #[error("Payment is below the entry fee")]
    InsufficientPayment,

    /// A draw is in progress, entries are closed
    #[error("Raffle round is not open")]
    RoundNotOpen,

    /// Upkeep conditions are not met
    #[error("Raffle is not eligible for a draw")]
    NotEligible,

    /// Fulfillment for a request that is not the pending one
    #[error("Unknown or stale randomness request")]
    UnknownRequest,

    /// Fulfillment from someone other than the configured coordinator
    #[error("Caller is not the randomness coordinator")]
    Unauthorized,

    /// Moving the pot to the winner failed
    #[error("Payout to winner failed")]
    PayoutFailed,

    /// Entrant registry is at capacity
    #[error("Raffle is full")]
    RaffleFull,

    /// Fulfillment carried no random words
    #[error("No random words supplied")]
    MissingRandomWords,

    /// Configuration rejected at initialization
    #[error("Invalid raffle configuration")]
    InvalidConfig,

    /// Raffle account already holds a raffle
    #[error("Raffle already initialized")]
    AlreadyInitialized,

    /// Invalid instruction data passed
    #[error("Invalid instruction")]
    InvalidInstruction,

    #[error("Arithmetic overflow")]
    ArithmeticOverflow,
}

impl From<RaffleError> for ProgramError {
    fn from(e: RaffleError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for RaffleError {
    fn type_of() -> &'static str {
        "Raffle Error"
    }
}

impl PrintProgramError for RaffleError {
    fn print<E>(&self) {
        msg!(&self.to_string());
    }
}
