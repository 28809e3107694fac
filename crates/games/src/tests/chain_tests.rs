use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use boxcore::{BoxOptions, Game, GameBox, LoopbackDriver, PinDriver, Stopped};
use shared::domain::ButtonId;
use tokio_util::sync::CancellationToken;

use super::*;

#[test]
fn step_duration_starts_at_base_speed() {
    let base = Duration::from_millis(400);
    assert_eq!(step_duration(base, 1, 1, 21, 2.0), base);
}

#[test]
fn step_duration_reaches_full_speed_at_max_length() {
    let base = Duration::from_millis(400);
    assert_eq!(
        step_duration(base, 21, 1, 21, 2.0),
        Duration::from_millis(200)
    );
}

#[test]
fn step_duration_interpolates_between_the_ends() {
    let base = Duration::from_millis(400);
    // Halfway along the ramp: base / 1.5.
    assert_eq!(step_duration(base, 11, 1, 21, 2.0).as_millis(), 266);
}

#[test]
fn step_duration_clamps_outside_the_ramp() {
    let base = Duration::from_millis(400);
    assert_eq!(step_duration(base, 0, 1, 21, 2.0), base);
    assert_eq!(
        step_duration(base, 50, 1, 21, 2.0),
        Duration::from_millis(200)
    );
}

#[test]
fn step_duration_survives_a_degenerate_ramp() {
    let base = Duration::from_millis(300);
    assert_eq!(step_duration(base, 5, 5, 5, 3.0), base);
}

#[test]
fn apply_press_walks_the_chain() {
    let mut status = ChainStatus::new();
    status.push(ButtonId::GREEN_ONE);
    status.push(ButtonId::RED_TWO);

    assert_eq!(
        status.apply_press(ButtonId::GREEN_ONE),
        PressOutcome::Advance
    );
    assert_eq!(
        status.apply_press(ButtonId::RED_TWO),
        PressOutcome::ChainComplete
    );
}

#[test]
fn apply_press_mismatch_keeps_the_cursor() {
    let mut status = ChainStatus::new();
    status.push(ButtonId::GREEN_ONE);
    status.push(ButtonId::RED_TWO);

    assert_eq!(
        status.apply_press(ButtonId::GREEN_ONE),
        PressOutcome::Advance
    );
    assert_eq!(
        status.apply_press(ButtonId::BLUE_ONE),
        PressOutcome::Mismatch
    );

    // The cursor did not move: the next correct press still completes.
    status.reset_input();
    assert_eq!(
        status.apply_press(ButtonId::GREEN_ONE),
        PressOutcome::Advance
    );
    assert_eq!(
        status.apply_press(ButtonId::RED_TWO),
        PressOutcome::ChainComplete
    );
}

#[test]
fn clear_resets_everything() {
    let mut status = ChainStatus::new();
    status.push(ButtonId::GREEN_ONE);
    status.record_fault();
    status.clear();

    assert!(status.is_empty());
    assert_eq!(status.faults(), 0);
}

fn test_box() -> (Arc<LoopbackDriver>, Arc<GameBox>) {
    let driver = Arc::new(LoopbackDriver::new());
    let gamebox = GameBox::new(
        Arc::clone(&driver) as Arc<dyn PinDriver>,
        BoxOptions::default(),
    )
    .expect("game box");
    (driver, gamebox)
}

fn fast_options(max_chain_length: usize, retries: u32) -> ChainGameOptions {
    ChainGameOptions {
        pause: Duration::from_millis(20),
        light_up: Duration::from_millis(20),
        retries,
        start_length: 1,
        max_chain_length,
        max_speed_factor: 2.0,
    }
}

fn scripted_picker(script: Vec<ButtonId>) -> impl FnMut() -> ButtonId + Send + 'static {
    let mut script = VecDeque::from(script);
    move || script.pop_front().unwrap_or(ButtonId::WHITE_ONE)
}

fn button_pin(gamebox: &GameBox, id: ButtonId) -> u8 {
    gamebox
        .options()
        .pin_map
        .iter()
        .find(|map| map.id == id)
        .expect("mapped button")
        .button_pin
}

async fn press(driver: &LoopbackDriver, pin: u8) {
    driver.edge(pin, true);
    tokio::time::sleep(Duration::from_millis(15)).await;
    driver.edge(pin, false);
    tokio::time::sleep(Duration::from_millis(15)).await;
}

async fn replay(driver: &LoopbackDriver, gamebox: &GameBox, chain: &[ButtonId]) {
    // Let the display pass finish before feeding input back.
    tokio::time::sleep(Duration::from_millis(300)).await;
    for id in chain {
        press(driver, button_pin(gamebox, *id)).await;
    }
}

#[tokio::test]
async fn replaying_every_round_wins_the_game() {
    let (driver, gamebox) = test_box();

    let chain = [ButtonId::GREEN_ONE, ButtonId::YELLOW_ONE, ButtonId::RED_TWO];
    let mut game = ChainGame::new(Arc::clone(&gamebox), fast_options(3, 1))
        .with_button_picker(scripted_picker(chain.to_vec()));

    let run = tokio::spawn(async move { game.run(CancellationToken::new()).await });

    for round in 1..=chain.len() {
        replay(&driver, &gamebox, &chain[..round]).await;
    }

    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("game should win and finish")
        .expect("join")
        .expect("clean finish");
}

#[tokio::test]
async fn wrong_presses_exhaust_the_retries() {
    let (driver, gamebox) = test_box();

    let mut game = ChainGame::new(Arc::clone(&gamebox), fast_options(20, 0))
        .with_button_picker(scripted_picker(vec![ButtonId::GREEN_ONE]));

    let run = tokio::spawn(async move { game.run(CancellationToken::new()).await });

    // One wrong press with zero retries ends the round loop.
    replay(&driver, &gamebox, &[ButtonId::BLUE_TWO]).await;

    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("game should end after the fault")
        .expect("join")
        .expect("clean finish");
}

#[tokio::test]
async fn cancellation_interrupts_the_input_wait() {
    let (_driver, gamebox) = test_box();

    let mut game = ChainGame::new(Arc::clone(&gamebox), fast_options(20, 3))
        .with_button_picker(scripted_picker(vec![ButtonId::GREEN_ONE]));

    let stop = CancellationToken::new();
    let run = {
        let stop = stop.clone();
        tokio::spawn(async move { game.run(stop).await })
    };

    tokio::time::sleep(Duration::from_millis(300)).await;
    stop.cancel();

    let err = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("game should stop promptly")
        .expect("join")
        .expect_err("stopped");
    assert!(err.is::<Stopped>());
}
