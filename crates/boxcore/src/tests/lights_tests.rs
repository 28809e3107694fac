use std::sync::Arc;
use std::time::{Duration, Instant};

use shared::domain::ButtonId;

use super::*;
use crate::hal::{LoopbackDriver, PinDriver};
use crate::{BoxOptions, GameBox};

fn test_box() -> (Arc<LoopbackDriver>, Arc<GameBox>) {
    let driver = Arc::new(LoopbackDriver::new());
    let gamebox = GameBox::new(
        Arc::clone(&driver) as Arc<dyn PinDriver>,
        BoxOptions::default(),
    )
    .expect("game box");
    (driver, gamebox)
}

fn led_pin(gamebox: &GameBox, id: ButtonId) -> u8 {
    gamebox
        .options()
        .pin_map
        .iter()
        .find(|map| map.id == id)
        .expect("mapped button")
        .led_pin
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

#[tokio::test]
async fn set_all_reaches_every_led() {
    let (driver, gamebox) = test_box();

    gamebox.lights().set_all(true, None).await.expect("all on");
    for map in &gamebox.options().pin_map {
        assert_eq!(driver.level(map.led_pin), Some(true), "led for {}", map.id);
    }

    gamebox.lights().set_all(false, None).await.expect("all off");
    for map in &gamebox.options().pin_map {
        assert_eq!(driver.level(map.led_pin), Some(false));
    }
}

#[tokio::test]
async fn set_all_returns_before_hold_reverts() {
    let (_driver, gamebox) = test_box();

    let before = Instant::now();
    gamebox
        .lights()
        .set_all(true, Some(Duration::from_millis(200)))
        .await
        .expect("all on held");
    assert!(
        before.elapsed() < Duration::from_millis(100),
        "set_all must complete once writes are issued"
    );
}

#[tokio::test]
async fn blink_zero_times_is_a_no_op() {
    let (driver, gamebox) = test_box();
    let led = led_pin(&gamebox, ButtonId::RED_ONE);

    let before = Instant::now();
    gamebox
        .lights()
        .blink(&[ButtonId::RED_ONE], 0, Duration::from_millis(500))
        .await
        .expect("blink");

    assert!(before.elapsed() < Duration::from_millis(50), "no delay");
    assert_eq!(driver.level(led), Some(false), "no light change");
}

#[tokio::test]
async fn blink_lights_then_reverts() {
    let (driver, gamebox) = test_box();
    let led = led_pin(&gamebox, ButtonId::YELLOW_TWO);

    let blink = {
        let gamebox = Arc::clone(&gamebox);
        tokio::spawn(async move {
            gamebox
                .lights()
                .blink(&[ButtonId::YELLOW_TWO], 1, Duration::from_millis(80))
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(driver.level(led), Some(true), "lit during the blink");

    blink.await.expect("join").expect("blink");
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(driver.level(led), Some(false), "reverted after the blink");
}

#[tokio::test]
async fn light_on_press_mirrors_the_button() {
    let (driver, gamebox) = test_box();
    let handle = gamebox.lights().light_on_press();

    let led = led_pin(&gamebox, ButtonId::BLUE_TWO);
    let pin = button_pin(&gamebox, ButtonId::BLUE_TWO);

    driver.edge(pin, true);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(driver.level(led), Some(true));

    driver.edge(pin, false);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(driver.level(led), Some(false));

    handle.release().await;
}

#[tokio::test]
async fn releasing_light_on_press_turns_everything_off() {
    let (driver, gamebox) = test_box();
    let handle = gamebox.lights().light_on_press();

    let led = led_pin(&gamebox, ButtonId::GREEN_ONE);
    let pin = button_pin(&gamebox, ButtonId::GREEN_ONE);

    driver.edge(pin, true);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(driver.level(led), Some(true));

    handle.release().await;
    assert_eq!(driver.level(led), Some(false));

    // The mirror is gone: new presses no longer reach the LED.
    driver.edge(pin, false);
    tokio::time::sleep(Duration::from_millis(20)).await;
    driver.edge(pin, true);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(driver.level(led), Some(false));
}
