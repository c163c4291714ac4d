use borsh::BorshDeserialize;
use solana_program_test::*;
use solana_sdk::{
    instruction::{Instruction, InstructionError},
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    system_instruction,
    sysvar::clock::Clock,
    transaction::{Transaction, TransactionError},
};

// Import the program's entrypoint and state
use interval_raffle::{
    error::RaffleError,
    instruction,
    process_instruction,
    state::{Raffle, RaffleConfig, RaffleState, UpkeepStatus},
    utils::find_raffle_address,
    vrf::{RandomWord, RandomnessRequestParams, RandomnessSource},
};

const ENTRY_FEE: u64 = 10_000_000; // 0.01 SOL
const INTERVAL: i64 = 30;
const MAX_ENTRANTS: u32 = 16;

struct TestRaffle {
    context: ProgramTestContext,
    program_id: Pubkey,
    raffle: Pubkey,
    coordinator: Keypair,
}

fn raffle_config(coordinator: &Pubkey) -> RaffleConfig {
    RaffleConfig {
        entry_fee: ENTRY_FEE,
        draw_interval: INTERVAL,
        max_entrants: MAX_ENTRANTS,
        coordinator: *coordinator,
        randomness_source: RandomnessSource::Coordinator,
        request_params: RandomnessRequestParams {
            key_hash: [3u8; 32],
            subscription_id: 1,
            ..RandomnessRequestParams::default()
        },
    }
}

fn word(value: u64) -> RandomWord {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

// Setup program test with an initialized raffle owned by the payer
async fn setup() -> TestRaffle {
    setup_with(|config| config).await
}

async fn setup_with(configure: impl FnOnce(RaffleConfig) -> RaffleConfig) -> TestRaffle {
    let program_id = Pubkey::new_unique();
    let program_test = ProgramTest::new(
        "interval_raffle",
        program_id,
        processor!(process_instruction),
    );
    let mut context = program_test.start_with_context().await;

    let coordinator = Keypair::new();
    let authority = context.payer.pubkey();
    let (raffle, _) = find_raffle_address(&program_id, &authority);

    let initialize_ix = instruction::initialize_raffle(
        &program_id,
        &authority,
        &raffle,
        configure(raffle_config(&coordinator.pubkey())),
    );
    process(&mut context, &[initialize_ix], &[]).await.unwrap();

    TestRaffle {
        context,
        program_id,
        raffle,
        coordinator,
    }
}

async fn process(
    context: &mut ProgramTestContext,
    instructions: &[Instruction],
    signers: &[&Keypair],
) -> Result<(), BanksClientError> {
    let blockhash = context.banks_client.get_latest_blockhash().await.unwrap();
    let mut all_signers = vec![&context.payer];
    all_signers.extend_from_slice(signers);
    let transaction = Transaction::new_signed_with_payer(
        instructions,
        Some(&context.payer.pubkey()),
        &all_signers,
        blockhash,
    );
    context.banks_client.process_transaction(transaction).await
}

fn assert_raffle_error(result: Result<(), BanksClientError>, expected: RaffleError) {
    assert_eq!(
        result.unwrap_err().unwrap(),
        TransactionError::InstructionError(0, InstructionError::Custom(expected as u32))
    );
}

async fn new_player(context: &mut ProgramTestContext) -> Keypair {
    let player = Keypair::new();
    let fund_ix = system_instruction::transfer(
        &context.payer.pubkey(),
        &player.pubkey(),
        1_000_000_000, // 1 SOL
    );
    process(context, &[fund_ix], &[]).await.unwrap();
    player
}

async fn get_raffle(context: &mut ProgramTestContext, raffle: &Pubkey) -> Raffle {
    let account = context
        .banks_client
        .get_account(*raffle)
        .await
        .unwrap()
        .unwrap();
    Raffle::unpack_from_slice(&account.data).unwrap()
}

async fn balance(context: &mut ProgramTestContext, key: &Pubkey) -> u64 {
    context.banks_client.get_balance(*key).await.unwrap()
}

async fn advance_clock(context: &mut ProgramTestContext, seconds: i64) {
    let mut clock: Clock = context.banks_client.get_sysvar().await.unwrap();
    clock.unix_timestamp += seconds;
    context.set_sysvar(&clock);
}

impl TestRaffle {
    async fn enter(&mut self, player: &Keypair, amount: u64) -> Result<(), BanksClientError> {
        let ix = instruction::enter_raffle(
            &self.program_id,
            &player.pubkey(),
            &self.raffle,
            amount,
        );
        process(&mut self.context, &[ix], &[player]).await
    }

    async fn perform_upkeep(&mut self, keeper: &Keypair) -> Result<(), BanksClientError> {
        let ix = instruction::perform_upkeep(
            &self.program_id,
            &keeper.pubkey(),
            &self.raffle,
            vec![],
        );
        process(&mut self.context, &[ix], &[keeper]).await
    }

    /// Simulate `CheckUpkeep` and decode the status it returns
    async fn check_upkeep(&mut self) -> UpkeepStatus {
        let ix = instruction::check_upkeep(&self.program_id, &self.raffle);
        let blockhash = self
            .context
            .banks_client
            .get_latest_blockhash()
            .await
            .unwrap();
        let transaction = Transaction::new_signed_with_payer(
            &[ix],
            Some(&self.context.payer.pubkey()),
            &[&self.context.payer],
            blockhash,
        );
        let simulation = self
            .context
            .banks_client
            .simulate_transaction(transaction)
            .await
            .unwrap();
        assert_eq!(simulation.result, Some(Ok(())));

        // The runtime strips trailing zero bytes from return data
        let mut data = simulation
            .simulation_details
            .and_then(|details| details.return_data)
            .map(|return_data| {
                assert_eq!(return_data.program_id, self.program_id);
                return_data.data
            })
            .unwrap_or_default();
        let empty_status_len = 1 + 4;
        if data.len() < empty_status_len {
            data.resize(empty_status_len, 0);
        }
        UpkeepStatus::try_from_slice(&data).unwrap()
    }

    async fn fulfill(
        &mut self,
        signer: &Keypair,
        request_id: u64,
        random_words: Vec<RandomWord>,
        candidates: &[Pubkey],
    ) -> Result<(), BanksClientError> {
        let ix = instruction::fulfill_random_words(
            &self.program_id,
            &signer.pubkey(),
            &self.raffle,
            request_id,
            random_words,
            candidates,
        );
        process(&mut self.context, &[ix], &[signer]).await
    }

    async fn state(&mut self) -> Raffle {
        let raffle = self.raffle;
        get_raffle(&mut self.context, &raffle).await
    }

    /// Enter the given players, pass the interval and start the draw
    async fn start_draw(&mut self, players: &[&Keypair]) -> u64 {
        for player in players {
            self.enter(player, ENTRY_FEE).await.unwrap();
        }
        advance_clock(&mut self.context, INTERVAL + 1).await;
        let keeper = Keypair::new();
        self.perform_upkeep(&keeper).await.unwrap();
        self.state().await.pending_request_id().unwrap()
    }
}

// Test initializing the raffle
#[tokio::test]
async fn test_initialize_raffle() {
    let mut test = setup().await;

    let raffle = test.state().await;
    let clock: Clock = test.context.banks_client.get_sysvar().await.unwrap();

    assert!(raffle.is_initialized);
    assert_eq!(raffle.authority, test.context.payer.pubkey());
    assert_eq!(raffle.config, raffle_config(&test.coordinator.pubkey()));
    assert_eq!(raffle.raffle_state(), RaffleState::Open);
    assert_eq!(raffle.number_of_players(), 0);
    assert_eq!(raffle.pot(), 0);
    assert_eq!(raffle.latest_timestamp(), clock.unix_timestamp);

    // A second raffle for the same authority is rejected
    let mut config = raffle_config(&test.coordinator.pubkey());
    config.entry_fee += 1;
    let ix = instruction::initialize_raffle(
        &test.program_id,
        &test.context.payer.pubkey(),
        &test.raffle,
        config,
    );
    assert_raffle_error(
        process(&mut test.context, &[ix], &[]).await,
        RaffleError::AlreadyInitialized,
    );
}

#[tokio::test]
async fn test_initialize_rejects_zero_entry_fee() {
    let program_id = Pubkey::new_unique();
    let program_test = ProgramTest::new(
        "interval_raffle",
        program_id,
        processor!(process_instruction),
    );
    let mut context = program_test.start_with_context().await;
    let authority = context.payer.pubkey();
    let (raffle, _) = find_raffle_address(&program_id, &authority);

    let mut config = raffle_config(&Pubkey::new_unique());
    config.entry_fee = 0;
    let ix = instruction::initialize_raffle(&program_id, &authority, &raffle, config);

    assert_raffle_error(
        process(&mut context, &[ix], &[]).await,
        RaffleError::InvalidConfig,
    );
}

// Test entering the raffle
#[tokio::test]
async fn test_enter_raffle() {
    let mut test = setup().await;
    let player = new_player(&mut test.context).await;
    let raffle_key = test.raffle;

    let player_before = balance(&mut test.context, &player.pubkey()).await;
    let raffle_before = balance(&mut test.context, &raffle_key).await;

    test.enter(&player, ENTRY_FEE).await.unwrap();

    let raffle = test.state().await;
    assert_eq!(raffle.number_of_players(), 1);
    assert_eq!(raffle.player(0), Some(&player.pubkey()));
    assert_eq!(raffle.pot(), ENTRY_FEE);
    assert_eq!(
        balance(&mut test.context, &player.pubkey()).await,
        player_before - ENTRY_FEE
    );
    assert_eq!(
        balance(&mut test.context, &raffle_key).await,
        raffle_before + ENTRY_FEE
    );

    // Underpaying is rejected and nothing changes
    assert_raffle_error(
        test.enter(&player, ENTRY_FEE / 2).await,
        RaffleError::InsufficientPayment,
    );
    assert_eq!(test.state().await, raffle);
}

// Test the upkeep status handed back to automation callers
#[tokio::test]
async fn test_check_upkeep_returns_status() {
    let mut test = setup().await;

    // No players yet
    let status = test.check_upkeep().await;
    assert!(!status.upkeep_needed);
    assert!(status.perform_data.is_empty());

    // A player, but the interval has not passed
    let player = new_player(&mut test.context).await;
    test.enter(&player, ENTRY_FEE).await.unwrap();
    assert!(!test.check_upkeep().await.upkeep_needed);

    advance_clock(&mut test.context, INTERVAL + 1).await;
    let status = test.check_upkeep().await;
    assert!(status.upkeep_needed);
    assert!(status.perform_data.is_empty());

    // Checking never changes the raffle
    let raffle = test.state().await;
    assert_eq!(raffle.raffle_state(), RaffleState::Open);
    assert_eq!(raffle.pending_request_id(), None);

    let keeper = Keypair::new();
    test.perform_upkeep(&keeper).await.unwrap();
    assert!(!test.check_upkeep().await.upkeep_needed);
}

// Test starting a draw
#[tokio::test]
async fn test_perform_upkeep_opens_single_draw() {
    let mut test = setup().await;
    let player = new_player(&mut test.context).await;
    test.enter(&player, ENTRY_FEE).await.unwrap();

    // Interval has not passed yet
    let early_keeper = Keypair::new();
    assert_raffle_error(
        test.perform_upkeep(&early_keeper).await,
        RaffleError::NotEligible,
    );
    assert_eq!(test.state().await.raffle_state(), RaffleState::Open);

    advance_clock(&mut test.context, INTERVAL + 1).await;

    let first_keeper = Keypair::new();
    let second_keeper = Keypair::new();
    test.perform_upkeep(&first_keeper).await.unwrap();
    assert_raffle_error(
        test.perform_upkeep(&second_keeper).await,
        RaffleError::NotEligible,
    );

    let raffle = test.state().await;
    assert_eq!(raffle.raffle_state(), RaffleState::Drawing);
    assert!(raffle.pending_request_id().is_some());

    // Entries are closed during the draw
    let late_player = new_player(&mut test.context).await;
    assert_raffle_error(
        test.enter(&late_player, ENTRY_FEE).await,
        RaffleError::RoundNotOpen,
    );
}

// Test a complete round: three players, word 7 selects the second
#[tokio::test]
async fn test_fulfill_pays_winner_and_resets() {
    let mut test = setup().await;
    let a = new_player(&mut test.context).await;
    let b = new_player(&mut test.context).await;
    let c = new_player(&mut test.context).await;
    let raffle_key = test.raffle;

    let request_id = test.start_draw(&[&a, &b, &c]).await;
    let winner_before = balance(&mut test.context, &b.pubkey()).await;
    let pot = test.state().await.pot();
    assert_eq!(pot, ENTRY_FEE * 3);

    let coordinator = Keypair::from_bytes(&test.coordinator.to_bytes()).unwrap();
    let candidates = [a.pubkey(), b.pubkey(), c.pubkey()];
    test.fulfill(&coordinator, request_id, vec![word(7)], &candidates)
        .await
        .unwrap();

    let raffle = test.state().await;
    assert_eq!(raffle.recent_winner(), Some(b.pubkey()));
    assert_eq!(raffle.raffle_state(), RaffleState::Open);
    assert_eq!(raffle.number_of_players(), 0);
    assert_eq!(raffle.pot(), 0);
    assert_eq!(raffle.pending_request_id(), None);
    assert_eq!(
        balance(&mut test.context, &b.pubkey()).await,
        winner_before + pot
    );

    // Only rent remains in the raffle account
    let rent = test.context.banks_client.get_rent().await.unwrap();
    assert_eq!(
        balance(&mut test.context, &raffle_key).await,
        rent.minimum_balance(Raffle::space(MAX_ENTRANTS))
    );

    // The request cannot be fulfilled twice
    assert_raffle_error(
        test.fulfill(&coordinator, request_id, vec![word(8)], &candidates)
            .await,
        RaffleError::UnknownRequest,
    );
}

#[tokio::test]
async fn test_fulfill_rejects_stranger() {
    let mut test = setup().await;
    let player = new_player(&mut test.context).await;
    let request_id = test.start_draw(&[&player]).await;
    let before = test.state().await;

    let stranger = Keypair::new();
    assert_raffle_error(
        test.fulfill(&stranger, request_id, vec![word(1)], &[player.pubkey()])
            .await,
        RaffleError::Unauthorized,
    );
    assert_eq!(test.state().await, before);
}

#[tokio::test]
async fn test_fulfill_rejects_unknown_request() {
    let mut test = setup().await;
    let player = new_player(&mut test.context).await;
    let request_id = test.start_draw(&[&player]).await;
    let before = test.state().await;

    let coordinator = Keypair::from_bytes(&test.coordinator.to_bytes()).unwrap();
    assert_raffle_error(
        test.fulfill(
            &coordinator,
            request_id.wrapping_add(1),
            vec![word(1)],
            &[player.pubkey()],
        )
        .await,
        RaffleError::UnknownRequest,
    );
    assert_eq!(test.state().await, before);
}

// A payout that cannot reach the winner leaves the draw pending
#[tokio::test]
async fn test_failed_payout_keeps_round_drawing() {
    let mut test = setup().await;
    let player = new_player(&mut test.context).await;
    let request_id = test.start_draw(&[&player]).await;
    let before = test.state().await;

    let coordinator = Keypair::from_bytes(&test.coordinator.to_bytes()).unwrap();
    assert_raffle_error(
        test.fulfill(&coordinator, request_id, vec![word(4)], &[])
            .await,
        RaffleError::PayoutFailed,
    );

    let raffle = test.state().await;
    assert_eq!(raffle, before);
    assert_eq!(raffle.raffle_state(), RaffleState::Drawing);
    assert_eq!(raffle.pending_request_id(), Some(request_id));

    // Delivering again with the winner's account settles the round
    test.fulfill(&coordinator, request_id, vec![word(4)], &[player.pubkey()])
        .await
        .unwrap();
    assert_eq!(test.state().await.raffle_state(), RaffleState::Open);
}

// A winner whose emptied wallet cannot hold a small pot rent-free
#[tokio::test]
async fn test_payout_to_drained_winner_fails_cleanly() {
    let small_fee = 1_000;
    let mut test = setup_with(|config| RaffleConfig {
        entry_fee: small_fee,
        ..config
    })
    .await;
    let player = new_player(&mut test.context).await;
    test.enter(&player, small_fee).await.unwrap();

    // The player moves everything out after entering
    let remaining = balance(&mut test.context, &player.pubkey()).await;
    let drain_ix = system_instruction::transfer(
        &player.pubkey(),
        &test.context.payer.pubkey(),
        remaining,
    );
    process(&mut test.context, &[drain_ix], &[&player])
        .await
        .unwrap();
    assert_eq!(balance(&mut test.context, &player.pubkey()).await, 0);

    advance_clock(&mut test.context, INTERVAL + 1).await;
    let keeper = Keypair::new();
    test.perform_upkeep(&keeper).await.unwrap();
    let before = test.state().await;
    let request_id = before.pending_request_id().unwrap();

    let coordinator = Keypair::from_bytes(&test.coordinator.to_bytes()).unwrap();
    assert_raffle_error(
        test.fulfill(&coordinator, request_id, vec![word(0)], &[player.pubkey()])
            .await,
        RaffleError::PayoutFailed,
    );
    assert_eq!(test.state().await, before);
    assert_eq!(balance(&mut test.context, &player.pubkey()).await, 0);
}

// A Switchboard raffle ignores signed deliveries from the VRF key holder
#[tokio::test]
async fn test_switchboard_raffle_rejects_signed_words() {
    let mut test = setup_with(|config| RaffleConfig {
        randomness_source: RandomnessSource::Switchboard,
        ..config
    })
    .await;
    let player = new_player(&mut test.context).await;
    test.enter(&player, ENTRY_FEE).await.unwrap();
    let before = test.state().await;

    let coordinator = Keypair::from_bytes(&test.coordinator.to_bytes()).unwrap();
    assert_raffle_error(
        test.fulfill(&coordinator, 1, vec![word(0)], &[player.pubkey()])
            .await,
        RaffleError::Unauthorized,
    );
    assert_eq!(test.state().await, before);
}

#[tokio::test]
async fn test_switchboard_raffle_requires_switchboard_vrf_account() {
    let mut test = setup_with(|config| RaffleConfig {
        randomness_source: RandomnessSource::Switchboard,
        ..config
    })
    .await;
    let player = new_player(&mut test.context).await;
    test.enter(&player, ENTRY_FEE).await.unwrap();

    // The configured VRF key holds a plain system account here
    let vrf = test.coordinator.pubkey();
    let fund_ix = system_instruction::transfer(
        &test.context.payer.pubkey(),
        &vrf,
        1_000_000_000, // 1 SOL
    );
    process(&mut test.context, &[fund_ix], &[]).await.unwrap();

    let ix = instruction::consume_randomness(
        &test.program_id,
        &vrf,
        &test.raffle,
        &[player.pubkey()],
    );
    assert_eq!(
        process(&mut test.context, &[ix], &[])
            .await
            .unwrap_err()
            .unwrap(),
        TransactionError::InstructionError(0, InstructionError::InvalidAccountOwner)
    );
    assert_eq!(test.state().await.raffle_state(), RaffleState::Open);
}

#[tokio::test]
async fn test_coordinator_raffle_rejects_vrf_consumption() {
    let mut test = setup().await;
    let player = new_player(&mut test.context).await;
    test.start_draw(&[&player]).await;
    let before = test.state().await;

    let ix = instruction::consume_randomness(
        &test.program_id,
        &test.coordinator.pubkey(),
        &test.raffle,
        &[player.pubkey()],
    );
    assert_raffle_error(
        process(&mut test.context, &[ix], &[]).await,
        RaffleError::Unauthorized,
    );
    assert_eq!(test.state().await, before);
}
