// Value transfer out of the raffle account
use solana_program::{
    account_info::AccountInfo, entrypoint::ProgramResult, msg, program_error::ProgramError,
    pubkey::Pubkey, rent::Rent,
};

/// Moves value held by the raffle to a recipient.
///
/// Implementations either move the full amount or return an error without
/// having moved anything.
pub trait Ledger {
    fn transfer(&mut self, recipient: &Pubkey, amount: u64) -> ProgramResult;
}

/// Pays out of a program-owned vault by adjusting lamports directly.
///
/// Only recipients present in `recipients` can be paid. Neither the vault nor
/// the recipient may end up below its rent-exempt minimum.
pub struct LamportLedger<'a, 'b> {
    vault: &'b AccountInfo<'a>,
    recipients: &'b [AccountInfo<'a>],
    rent: Rent,
}

impl<'a, 'b> LamportLedger<'a, 'b> {
    pub fn new(vault: &'b AccountInfo<'a>, recipients: &'b [AccountInfo<'a>], rent: Rent) -> Self {
        Self {
            vault,
            recipients,
            rent,
        }
    }
}

impl<'a, 'b> Ledger for LamportLedger<'a, 'b> {
    fn transfer(&mut self, recipient: &Pubkey, amount: u64) -> ProgramResult {
        let recipient_info = self
            .recipients
            .iter()
            .find(|info| info.key == recipient)
            .ok_or_else(|| {
                msg!("Recipient {} was not supplied", recipient);
                ProgramError::NotEnoughAccountKeys
            })?;

        if !recipient_info.is_writable || recipient_info.executable {
            msg!("Recipient {} cannot receive lamports", recipient);
            return Err(ProgramError::InvalidAccountData);
        }
        if recipient_info.key == self.vault.key {
            msg!("Vault cannot pay itself");
            return Err(ProgramError::InvalidArgument);
        }

        let vault_balance = self.vault.lamports();
        let remaining = vault_balance
            .checked_sub(amount)
            .ok_or(ProgramError::InsufficientFunds)?;
        if remaining < self.rent.minimum_balance(self.vault.data_len()) {
            msg!("Payout of {} would leave the vault below rent exemption", amount);
            return Err(ProgramError::InsufficientFunds);
        }
        let credited = recipient_info
            .lamports()
            .checked_add(amount)
            .ok_or(ProgramError::InvalidArgument)?;
        if credited < self.rent.minimum_balance(recipient_info.data_len()) {
            msg!(
                "Recipient {} would hold {} lamports, below rent exemption",
                recipient,
                credited
            );
            return Err(ProgramError::InsufficientFunds);
        }

        **self.vault.try_borrow_mut_lamports()? = remaining;
        **recipient_info.try_borrow_mut_lamports()? = credited;
        Ok(())
    }
}
