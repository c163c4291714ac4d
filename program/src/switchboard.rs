// Switchboard V2 VRF integration for the interval raffle
use borsh::BorshSerialize;
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    instruction::{AccountMeta, Instruction},
    msg,
    program::invoke_signed,
    program_error::ProgramError,
    pubkey::Pubkey,
    sysvar::recent_blockhashes,
};
use std::convert::TryFrom;
use switchboard_v2::{OracleQueueAccountData, VrfAccountData, SWITCHBOARD_PROGRAM_ID};

use crate::{
    error::RaffleError,
    vrf::{RandomWord, RandomnessProvider, RandomnessRequest},
};

/// Anchor sighash of Switchboard's `vrf_request_randomness` instruction
pub const VRF_REQUEST_RANDOMNESS_DISCRIMINATOR: [u8; 8] = [230, 121, 14, 164, 28, 222, 117, 118];

const STATE_SEED: &[u8] = b"STATE";
const PERMISSION_SEED: &[u8] = b"PermissionAccountData";

#[derive(BorshSerialize)]
struct VrfRequestRandomnessParams {
    permission_bump: u8,
    state_bump: u8,
}

/// Switchboard program state PDA
pub fn find_program_state_address() -> (Pubkey, u8) {
    Pubkey::find_program_address(&[STATE_SEED], &SWITCHBOARD_PROGRAM_ID)
}

/// Permission PDA granting `vrf` access to `oracle_queue`
pub fn find_permission_address(
    queue_authority: &Pubkey,
    oracle_queue: &Pubkey,
    vrf: &Pubkey,
) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[
            PERMISSION_SEED,
            queue_authority.as_ref(),
            oracle_queue.as_ref(),
            vrf.as_ref(),
        ],
        &SWITCHBOARD_PROGRAM_ID,
    )
}

/// Client-side addresses for a Switchboard-backed `PerformUpkeep`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwitchboardRequestKeys {
    pub vrf: Pubkey,
    pub oracle_queue: Pubkey,
    pub queue_authority: Pubkey,
    pub data_buffer: Pubkey,
    /// Switchboard escrow token account of the VRF
    pub escrow: Pubkey,
    /// Token account the caller funds the request from
    pub payer_wallet: Pubkey,
}

impl SwitchboardRequestKeys {
    /// Account metas following the caller and raffle in `PerformUpkeep`
    pub fn to_account_metas(&self) -> Vec<AccountMeta> {
        let (permission, _) =
            find_permission_address(&self.queue_authority, &self.oracle_queue, &self.vrf);
        let (program_state, _) = find_program_state_address();
        vec![
            AccountMeta::new(self.vrf, false),
            AccountMeta::new(self.oracle_queue, false),
            AccountMeta::new_readonly(self.queue_authority, false),
            AccountMeta::new_readonly(self.data_buffer, false),
            AccountMeta::new(permission, false),
            AccountMeta::new(self.escrow, false),
            AccountMeta::new(self.payer_wallet, false),
            AccountMeta::new_readonly(recent_blockhashes::id(), false),
            AccountMeta::new_readonly(program_state, false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(SWITCHBOARD_PROGRAM_ID, false),
        ]
    }
}

/// Accounts Switchboard needs to queue a VRF request
pub struct SwitchboardRequestAccounts<'a, 'b> {
    pub vrf: &'b AccountInfo<'a>,
    pub oracle_queue: &'b AccountInfo<'a>,
    pub queue_authority: &'b AccountInfo<'a>,
    pub data_buffer: &'b AccountInfo<'a>,
    pub permission: &'b AccountInfo<'a>,
    pub escrow: &'b AccountInfo<'a>,
    pub payer_wallet: &'b AccountInfo<'a>,
    pub payer_authority: &'b AccountInfo<'a>,
    pub recent_blockhashes: &'b AccountInfo<'a>,
    pub program_state: &'b AccountInfo<'a>,
    pub token_program: &'b AccountInfo<'a>,
    pub switchboard_program: &'b AccountInfo<'a>,
}

impl<'a, 'b> SwitchboardRequestAccounts<'a, 'b> {
    /// Take the request accounts in `SwitchboardRequestKeys::to_account_metas` order
    pub fn next<I>(
        iter: &mut I,
        payer_authority: &'b AccountInfo<'a>,
    ) -> Result<Self, ProgramError>
    where
        I: Iterator<Item = &'b AccountInfo<'a>>,
    {
        Ok(Self {
            vrf: next_account_info(iter)?,
            oracle_queue: next_account_info(iter)?,
            queue_authority: next_account_info(iter)?,
            data_buffer: next_account_info(iter)?,
            permission: next_account_info(iter)?,
            escrow: next_account_info(iter)?,
            payer_wallet: next_account_info(iter)?,
            payer_authority,
            recent_blockhashes: next_account_info(iter)?,
            program_state: next_account_info(iter)?,
            token_program: next_account_info(iter)?,
            switchboard_program: next_account_info(iter)?,
        })
    }
}

/// Check that `vrf_info` is a Switchboard VRF account controlled by the raffle
pub fn check_vrf_account(vrf_info: &AccountInfo, raffle: &Pubkey) -> ProgramResult {
    if vrf_info.owner != &SWITCHBOARD_PROGRAM_ID {
        msg!("VRF account not owned by Switchboard program");
        return Err(ProgramError::InvalidAccountOwner);
    }

    let vrf = VrfAccountData::new(vrf_info)?;
    if vrf.authority != *raffle {
        msg!("SECURITY: VRF account {} is not controlled by the raffle", vrf_info.key);
        return Err(RaffleError::Unauthorized.into());
    }
    Ok(())
}

/// Read the settled VRF round: the request id it answers and its result
pub fn read_vrf_result(
    vrf_info: &AccountInfo,
    raffle: &Pubkey,
) -> Result<(u64, RandomWord), ProgramError> {
    check_vrf_account(vrf_info, raffle)?;

    let vrf = VrfAccountData::new(vrf_info)?;
    let counter = vrf.counter;
    let request_id = u64::try_from(counter).map_err(|_| RaffleError::ArithmeticOverflow)?;
    let result = vrf.get_result().map_err(|_| {
        msg!("VRF round {} has no result yet", request_id);
        RaffleError::MissingRandomWords
    })?;
    Ok((request_id, result))
}

/// Requests randomness from a Switchboard VRF account, signing as its authority
pub struct SwitchboardCoordinator<'a, 'b, 'c> {
    accounts: SwitchboardRequestAccounts<'a, 'b>,
    raffle: &'b AccountInfo<'a>,
    vrf_key: Pubkey,
    signer_seeds: &'c [&'c [u8]],
}

impl<'a, 'b, 'c> SwitchboardCoordinator<'a, 'b, 'c> {
    pub fn new(
        accounts: SwitchboardRequestAccounts<'a, 'b>,
        raffle: &'b AccountInfo<'a>,
        vrf_key: Pubkey,
        signer_seeds: &'c [&'c [u8]],
    ) -> Self {
        Self {
            accounts,
            raffle,
            vrf_key,
            signer_seeds,
        }
    }

    /// Validate the Switchboard accounts and return `(permission_bump, state_bump)`
    fn check_accounts(&self) -> Result<(u8, u8), ProgramError> {
        let accounts = &self.accounts;
        if *accounts.switchboard_program.key != SWITCHBOARD_PROGRAM_ID {
            msg!("Invalid Switchboard program");
            return Err(ProgramError::IncorrectProgramId);
        }
        if *accounts.token_program.key != spl_token::id() {
            return Err(ProgramError::IncorrectProgramId);
        }
        if *accounts.recent_blockhashes.key != recent_blockhashes::id() {
            msg!("Invalid recent blockhashes sysvar");
            return Err(ProgramError::InvalidArgument);
        }
        if *accounts.vrf.key != self.vrf_key {
            msg!("VRF account {} is not configured for this raffle", accounts.vrf.key);
            return Err(ProgramError::InvalidArgument);
        }
        check_vrf_account(accounts.vrf, self.raffle.key)?;

        let vrf_queue = VrfAccountData::new(accounts.vrf)?.oracle_queue;
        if vrf_queue != *accounts.oracle_queue.key {
            msg!("VRF account belongs to oracle queue {}", vrf_queue);
            return Err(ProgramError::InvalidArgument);
        }

        let queue = OracleQueueAccountData::new(accounts.oracle_queue)?;
        if queue.authority != *accounts.queue_authority.key {
            msg!("Oracle queue authority does not match authority provided");
            return Err(ProgramError::InvalidArgument);
        }
        if queue.data_buffer != *accounts.data_buffer.key {
            msg!("Oracle queue data buffer does not match account provided");
            return Err(ProgramError::InvalidArgument);
        }

        let (permission, permission_bump) = find_permission_address(
            accounts.queue_authority.key,
            accounts.oracle_queue.key,
            accounts.vrf.key,
        );
        if permission != *accounts.permission.key {
            msg!("Invalid VRF permission account");
            return Err(ProgramError::InvalidArgument);
        }
        let (program_state, state_bump) = find_program_state_address();
        if program_state != *accounts.program_state.key {
            msg!("Invalid Switchboard program state account");
            return Err(ProgramError::InvalidArgument);
        }

        Ok((permission_bump, state_bump))
    }

    fn request_instruction(
        &self,
        permission_bump: u8,
        state_bump: u8,
    ) -> Result<Instruction, ProgramError> {
        let accounts = &self.accounts;
        let mut data = VRF_REQUEST_RANDOMNESS_DISCRIMINATOR.to_vec();
        VrfRequestRandomnessParams {
            permission_bump,
            state_bump,
        }
        .serialize(&mut data)
        .map_err(|e| ProgramError::BorshIoError(e.to_string()))?;

        Ok(Instruction {
            program_id: SWITCHBOARD_PROGRAM_ID,
            accounts: vec![
                AccountMeta::new_readonly(*self.raffle.key, true),
                AccountMeta::new(*accounts.vrf.key, false),
                AccountMeta::new(*accounts.oracle_queue.key, false),
                AccountMeta::new_readonly(*accounts.queue_authority.key, false),
                AccountMeta::new_readonly(*accounts.data_buffer.key, false),
                AccountMeta::new(*accounts.permission.key, false),
                AccountMeta::new(*accounts.escrow.key, false),
                AccountMeta::new(*accounts.payer_wallet.key, false),
                AccountMeta::new_readonly(*accounts.payer_authority.key, true),
                AccountMeta::new_readonly(*accounts.recent_blockhashes.key, false),
                AccountMeta::new_readonly(*accounts.program_state.key, false),
                AccountMeta::new_readonly(*accounts.token_program.key, false),
            ],
            data,
        })
    }
}

impl<'a, 'b, 'c> RandomnessProvider for SwitchboardCoordinator<'a, 'b, 'c> {
    fn request_random_words(&mut self, request: &RandomnessRequest) -> Result<u64, ProgramError> {
        let (permission_bump, state_bump) = self.check_accounts()?;
        let instruction = self.request_instruction(permission_bump, state_bump)?;

        let accounts = &self.accounts;
        invoke_signed(
            &instruction,
            &[
                self.raffle.clone(),
                accounts.vrf.clone(),
                accounts.oracle_queue.clone(),
                accounts.queue_authority.clone(),
                accounts.data_buffer.clone(),
                accounts.permission.clone(),
                accounts.escrow.clone(),
                accounts.payer_wallet.clone(),
                accounts.payer_authority.clone(),
                accounts.recent_blockhashes.clone(),
                accounts.program_state.clone(),
                accounts.token_program.clone(),
                accounts.switchboard_program.clone(),
            ],
            &[self.signer_seeds],
        )?;

        // Switchboard bumps the VRF counter for every accepted request
        let counter = VrfAccountData::new(accounts.vrf)?.counter;
        let request_id = u64::try_from(counter).map_err(|_| RaffleError::ArithmeticOverflow)?;
        msg!(
            "Switchboard VRF request {} queued on {} (nonce {})",
            request_id,
            accounts.vrf.key,
            request.nonce
        );
        Ok(request_id)
    }
}
