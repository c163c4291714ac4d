// Interval Raffle Program - Instruction Processor
use borsh::BorshSerialize;
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_instruction, system_program,
    sysvar::{clock::Clock, rent::Rent, Sysvar},
};

use crate::{
    error::RaffleError,
    instruction::RaffleInstruction,
    ledger::LamportLedger,
    state::{Raffle, RaffleConfig},
    switchboard::{self, SwitchboardCoordinator, SwitchboardRequestAccounts},
    utils::{self, RAFFLE_SEED},
    vrf::{LogCoordinator, RandomWord, RandomnessSource},
};

/// Program state handler.
pub struct Processor;

impl Processor {
    pub fn process_instruction(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::InitializeRaffle { config } => {
                msg!("Instruction: Initialize Raffle");
                Self::process_initialize_raffle(program_id, accounts, config)
            }
            RaffleInstruction::EnterRaffle { amount } => {
                msg!("Instruction: Enter Raffle");
                Self::process_enter_raffle(program_id, accounts, amount)
            }
            RaffleInstruction::CheckUpkeep => {
                msg!("Instruction: Check Upkeep");
                Self::process_check_upkeep(program_id, accounts)
            }
            RaffleInstruction::PerformUpkeep { perform_data } => {
                msg!("Instruction: Perform Upkeep");
                Self::process_perform_upkeep(program_id, accounts, &perform_data)
            }
            RaffleInstruction::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                msg!("Instruction: Fulfill Random Words");
                Self::process_fulfill_random_words(program_id, accounts, request_id, &random_words)
            }
            RaffleInstruction::ConsumeRandomness => {
                msg!("Instruction: Consume Randomness");
                Self::process_consume_randomness(program_id, accounts)
            }
        }
    }

    fn process_initialize_raffle(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        config: RaffleConfig,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !authority_info.is_signer {
            msg!("Authority must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        if *system_program_info.key != system_program::id() {
            return Err(ProgramError::IncorrectProgramId);
        }

        let (expected_raffle, bump_seed) =
            utils::find_raffle_address(program_id, authority_info.key);
        if *raffle_info.key != expected_raffle {
            msg!("Invalid raffle account address");
            return Err(ProgramError::InvalidArgument);
        }
        if raffle_info.owner == program_id {
            msg!("Raffle account already exists");
            return Err(RaffleError::AlreadyInitialized.into());
        }

        let clock = Clock::get()?;
        let raffle = Raffle::new(*authority_info.key, bump_seed, config, clock.unix_timestamp)?;

        let space = Raffle::space(config.max_entrants);
        let rent_lamports = Rent::get()?.minimum_balance(space);
        invoke_signed(
            &system_instruction::create_account(
                authority_info.key,
                raffle_info.key,
                rent_lamports,
                space as u64,
                program_id,
            ),
            &[
                authority_info.clone(),
                raffle_info.clone(),
                system_program_info.clone(),
            ],
            &[&[RAFFLE_SEED, authority_info.key.as_ref(), &[bump_seed]]],
        )?;

        raffle.save(raffle_info)?;

        msg!(
            "Raffle initialized: EntryFee={}, Interval={}s, MaxEntrants={}, Coordinator={}",
            config.entry_fee,
            config.draw_interval,
            config.max_entrants,
            config.coordinator
        );
        Ok(())
    }

    fn process_enter_raffle(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        amount: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let participant_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !participant_info.is_signer {
            msg!("Participant must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut raffle = Raffle::load(raffle_info, program_id)?;
        let event = raffle.enter(*participant_info.key, amount)?;

        invoke(
            &system_instruction::transfer(participant_info.key, raffle_info.key, amount),
            &[
                participant_info.clone(),
                raffle_info.clone(),
                system_program_info.clone(),
            ],
        )?;

        raffle.save(raffle_info)?;
        event.emit()
    }

    fn process_check_upkeep(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let raffle_info = next_account_info(account_info_iter)?;

        let raffle = Raffle::load(raffle_info, program_id)?;
        let status = raffle.check_upkeep(Clock::get()?.unix_timestamp);

        let data = status
            .try_to_vec()
            .map_err(|e| ProgramError::BorshIoError(e.to_string()))?;
        set_return_data(&data);

        msg!("Upkeep needed: {}", status.upkeep_needed);
        Ok(())
    }

    fn process_perform_upkeep(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        perform_data: &[u8],
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let caller_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;

        if !caller_info.is_signer {
            msg!("Caller must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        if !perform_data.is_empty() {
            msg!("Ignoring {} bytes of perform data", perform_data.len());
        }

        let mut raffle = Raffle::load(raffle_info, program_id)?;
        let now = Clock::get()?.unix_timestamp;
        let event = match raffle.config.randomness_source {
            RandomnessSource::Coordinator => {
                raffle.initiate_draw(raffle_info.key, now, &mut LogCoordinator)?
            }
            RandomnessSource::Switchboard => {
                let request_accounts =
                    SwitchboardRequestAccounts::next(account_info_iter, caller_info)?;
                let authority = raffle.authority;
                let bump = [raffle.bump];
                let signer_seeds: &[&[u8]] = &[RAFFLE_SEED, authority.as_ref(), &bump];
                let mut provider = SwitchboardCoordinator::new(
                    request_accounts,
                    raffle_info,
                    raffle.config.coordinator,
                    signer_seeds,
                );
                raffle.initiate_draw(raffle_info.key, now, &mut provider)?
            }
        };

        raffle.save(raffle_info)?;
        event.emit()
    }

    fn process_fulfill_random_words(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        request_id: u64,
        random_words: &[RandomWord],
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let coordinator_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let candidates = account_info_iter.as_slice();

        if !coordinator_info.is_signer {
            msg!("SECURITY: unsigned fulfillment from {}", coordinator_info.key);
            return Err(RaffleError::Unauthorized.into());
        }

        let mut raffle = Raffle::load(raffle_info, program_id)?;
        if raffle.config.randomness_source != RandomnessSource::Coordinator {
            msg!("SECURITY: raffle only accepts Switchboard VRF results");
            return Err(RaffleError::Unauthorized.into());
        }

        let now = Clock::get()?.unix_timestamp;
        let mut ledger = LamportLedger::new(raffle_info, candidates, Rent::get()?);
        let event = raffle.fulfill(
            coordinator_info.key,
            request_id,
            random_words,
            now,
            &mut ledger,
        )?;

        raffle.save(raffle_info)?;
        event.emit()
    }

    fn process_consume_randomness(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let vrf_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let candidates = account_info_iter.as_slice();

        let mut raffle = Raffle::load(raffle_info, program_id)?;
        if raffle.config.randomness_source != RandomnessSource::Switchboard {
            msg!("SECURITY: raffle does not draw through Switchboard");
            return Err(RaffleError::Unauthorized.into());
        }

        let (request_id, word) = switchboard::read_vrf_result(vrf_info, raffle_info.key)?;
        let now = Clock::get()?.unix_timestamp;
        let mut ledger = LamportLedger::new(raffle_info, candidates, Rent::get()?);
        let event = raffle.fulfill(vrf_info.key, request_id, &[word], now, &mut ledger)?;

        raffle.save(raffle_info)?;
        event.emit()
    }
}
