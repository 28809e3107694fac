use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use boxcore::{pause, Game, GameBox};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const DEFAULT_ROUNDS: u32 = 6;
const DEFAULT_BEAT: Duration = Duration::from_secs(10);

/// Free play for the youngest players: every button simply lights up
/// while it is held. Runs for a fixed number of beats, then ends.
pub struct LightOnPressGame {
    gamebox: Arc<GameBox>,
    rounds: u32,
    beat: Duration,
}

impl LightOnPressGame {
    pub fn new(gamebox: Arc<GameBox>) -> Self {
        Self {
            gamebox,
            rounds: DEFAULT_ROUNDS,
            beat: DEFAULT_BEAT,
        }
    }

    pub fn with_timing(mut self, rounds: u32, beat: Duration) -> Self {
        self.rounds = rounds;
        self.beat = beat;
        self
    }
}

#[async_trait]
impl Game for LightOnPressGame {
    async fn run(&mut self, stop: CancellationToken) -> Result<()> {
        debug!("light-on-press for {} beats of {:?}", self.rounds, self.beat);
        let mirror = self.gamebox.lights().light_on_press();

        let mut result = Ok(());
        for _ in 0..self.rounds {
            if let Err(err) = pause(&stop, self.beat).await {
                result = Err(err);
                break;
            }
        }

        mirror.release().await;
        result
    }
}
