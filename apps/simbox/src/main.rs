use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use boxcore::{GameBox, GameRegistry, LoopbackDriver, Orchestrator, PinDriver};
use clap::Parser;
use games::{ChainGame, LedDemoGame, LedDemoOptions, LightOnPressGame};
use shared::domain::ButtonId;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

mod config;

use config::load_settings;

#[derive(Parser, Debug)]
struct Args {
    /// Seconds of silence before the box goes back to sleep.
    #[arg(long)]
    idle_timeout_secs: Option<u64>,
    /// Hard deadline for a single game run, in seconds.
    #[arg(long)]
    max_game_time_secs: Option<u64>,
}

fn key_to_button(key: char) -> Option<ButtonId> {
    Some(match key.to_ascii_lowercase() {
        'q' => ButtonId::GREEN_ONE,
        'w' => ButtonId::YELLOW_ONE,
        'e' => ButtonId::RED_ONE,
        'r' => ButtonId::BLUE_ONE,
        't' => ButtonId::WHITE_ONE,
        'a' => ButtonId::GREEN_TWO,
        's' => ButtonId::YELLOW_TWO,
        'd' => ButtonId::RED_TWO,
        'f' => ButtonId::BLUE_TWO,
        'g' => ButtonId::WHITE_TWO,
        _ => return None,
    })
}

fn button_pin(gamebox: &GameBox, id: ButtonId) -> Option<u8> {
    gamebox
        .options()
        .pin_map
        .iter()
        .find(|map| map.id == id)
        .map(|map| map.button_pin)
}

fn print_help() {
    println!("Keyboard-driven stand-in for the physical box.");
    println!("  player one: q=green w=yellow e=red r=blue t=white");
    println!("  player two: a=green s=yellow d=red f=blue g=white");
    println!("  lowercase taps a button, UPPERCASE toggles a hold (for chords)");
    println!("  games: q=chain w=light-on-press e=led-demo, hold Q+A to reset");
    println!("  x or Ctrl-C quits");
}

async fn run_keyboard(driver: Arc<LoopbackDriver>, gamebox: Arc<GameBox>) -> Result<()> {
    let mut held: HashMap<ButtonId, bool> = HashMap::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(());
                };
                for key in line.chars() {
                    if key == 'x' {
                        info!("shutting down");
                        return Ok(());
                    }
                    let Some(id) = key_to_button(key) else {
                        continue;
                    };
                    let Some(pin) = button_pin(&gamebox, id) else {
                        continue;
                    };
                    if key.is_ascii_uppercase() {
                        let down = held.entry(id).or_insert(false);
                        *down = !*down;
                        driver.edge(pin, *down);
                        info!("{id} {}", if *down { "held" } else { "released" });
                    } else {
                        driver.edge(pin, true);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        driver.edge(pin, false);
                        info!("{id} pressed");
                    }
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    let mut settings = load_settings();
    if let Some(v) = args.idle_timeout_secs {
        settings.idle_timeout_secs = v;
    }
    if let Some(v) = args.max_game_time_secs {
        settings.max_game_time_secs = v;
    }

    let driver = Arc::new(LoopbackDriver::new());
    let gamebox = GameBox::new(
        Arc::clone(&driver) as Arc<dyn PinDriver>,
        settings.box_options(),
    )?;

    let chain_options = settings.chain_options();
    let registry = GameRegistry::new()
        .register(ButtonId::GREEN_ONE, move |gamebox| {
            Box::new(ChainGame::new(gamebox, chain_options.clone()))
        })
        .register(ButtonId::YELLOW_ONE, |gamebox| {
            Box::new(LightOnPressGame::new(gamebox))
        })
        .register(ButtonId::RED_ONE, |gamebox| {
            Box::new(LedDemoGame::new(gamebox, LedDemoOptions::default()))
        });

    let mut orchestrator =
        Orchestrator::new(Arc::clone(&gamebox), registry, settings.max_game_time())
            .with_wake_animation(|gamebox| {
                Box::new(LedDemoGame::new(gamebox, LedDemoOptions::default()))
            });
    let mut state = orchestrator.state();

    tokio::spawn(async move {
        if let Err(err) = orchestrator.run().await {
            warn!("orchestrator stopped: {err:#}");
        }
    });
    tokio::spawn(async move {
        while state.changed().await.is_ok() {
            info!("box is now {:?}", *state.borrow_and_update());
        }
    });

    print_help();
    run_keyboard(driver, gamebox).await
}
