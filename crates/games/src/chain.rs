use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use boxcore::{pause, with_stop, Game, GameBox, Stopped};
use rand::Rng;
use shared::domain::ButtonId;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const ERROR_BLINK: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct ChainGameOptions {
    /// Pacing delay between lights and between rounds, at base speed.
    pub pause: Duration,
    /// How long each chain element stays lit, at base speed.
    pub light_up: Duration,
    /// Wrong attempts allowed before the round loop ends.
    pub retries: u32,
    /// Chain length of the first round; the origin of the speed ramp.
    pub start_length: usize,
    /// Winning chain length, and the end of the speed ramp.
    pub max_chain_length: usize,
    /// Display speed multiplier once the chain reaches its maximum length.
    pub max_speed_factor: f64,
}

impl Default for ChainGameOptions {
    fn default() -> Self {
        Self {
            pause: Duration::from_millis(300),
            light_up: Duration::from_millis(400),
            retries: 3,
            start_length: 1,
            max_chain_length: 20,
            max_speed_factor: 2.0,
        }
    }
}

/// Display duration for one chain element, interpolated linearly between
/// base speed at `start` and `base / factor` at `max`. Recomputed for every
/// display pass, never cached.
pub fn step_duration(
    base: Duration,
    length: usize,
    start: usize,
    max: usize,
    factor: f64,
) -> Duration {
    let steps = max.saturating_sub(start).max(1);
    let progress = (length.saturating_sub(start) as f64 / steps as f64).clamp(0.0, 1.0);
    base.div_f64(1.0 + progress * (factor - 1.0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    /// Correct button, more to go.
    Advance,
    /// Correct button and the chain is fully replayed.
    ChainComplete,
    /// Wrong button; the input index stays where it was.
    Mismatch,
}

/// Per-round bookkeeping: the chain itself, the replay cursor and the
/// fault counter.
#[derive(Debug, Default)]
pub struct ChainStatus {
    chain: Vec<ButtonId>,
    input_index: usize,
    fault_counter: u32,
}

impl ChainStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chain(&self) -> &[ButtonId] {
        &self.chain
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn faults(&self) -> u32 {
        self.fault_counter
    }

    pub fn push(&mut self, id: ButtonId) {
        self.chain.push(id);
    }

    pub fn clear(&mut self) {
        self.chain.clear();
        self.input_index = 0;
        self.fault_counter = 0;
    }

    pub fn reset_input(&mut self) {
        self.input_index = 0;
    }

    pub fn reset_faults(&mut self) {
        self.fault_counter = 0;
    }

    pub fn record_fault(&mut self) {
        self.fault_counter += 1;
    }

    /// Compares one press against the expected chain element. A mismatch
    /// ends the attempt immediately; remaining input is not buffered.
    pub fn apply_press(&mut self, id: ButtonId) -> PressOutcome {
        if self.chain.get(self.input_index) != Some(&id) {
            return PressOutcome::Mismatch;
        }
        self.input_index += 1;
        if self.input_index == self.chain.len() {
            PressOutcome::ChainComplete
        } else {
            PressOutcome::Advance
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainState {
    Init,
    DisplayChain,
    AwaitInput,
    Success,
    Fault,
    Won,
    Finished,
}

/// The memory game: the box shows a growing chain of lights which the
/// players replay. Correct rounds extend the chain and speed up the
/// display; too many wrong attempts end the round loop.
pub struct ChainGame {
    gamebox: Arc<GameBox>,
    options: ChainGameOptions,
    next_button: Box<dyn FnMut() -> ButtonId + Send + Sync>,
}

impl ChainGame {
    pub fn new(gamebox: Arc<GameBox>, options: ChainGameOptions) -> Self {
        Self {
            gamebox,
            options,
            next_button: Box::new(|| {
                let index = rand::thread_rng().gen_range(0..ButtonId::ALL.len());
                ButtonId::ALL[index]
            }),
        }
    }

    /// Replaces the uniform picker, for deterministic sequences.
    pub fn with_button_picker<F>(mut self, picker: F) -> Self
    where
        F: FnMut() -> ButtonId + Send + Sync + 'static,
    {
        self.next_button = Box::new(picker);
        self
    }

    fn current_step(&self, base: Duration, length: usize) -> Duration {
        step_duration(
            base,
            length,
            self.options.start_length,
            self.options.max_chain_length,
            self.options.max_speed_factor,
        )
    }

    async fn display_chain(
        &self,
        status: &mut ChainStatus,
        stop: &CancellationToken,
    ) -> Result<()> {
        status.reset_input();
        let light = self.current_step(self.options.light_up, status.len());
        let gap = self.current_step(self.options.pause, status.len());
        debug!(
            "displaying chain of {} (light {light:?}, gap {gap:?})",
            status.len()
        );

        pause(stop, gap).await?;
        for id in status.chain().to_vec() {
            with_stop(stop, self.gamebox.lights().set(id, true, Some(light))).await?;
            pause(stop, light).await?;
            pause(stop, gap).await?;
        }
        Ok(())
    }

    async fn await_input(
        &self,
        status: &mut ChainStatus,
        stop: &CancellationToken,
    ) -> Result<ChainState> {
        let mirror = self.gamebox.lights().light_on_press();
        let mut down = self.gamebox.bus().subscribe_down();

        let next = loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    mirror.release().await;
                    return Err(Stopped.into());
                }
                event = down.recv() => match event {
                    Ok(transition) => match status.apply_press(transition.id) {
                        PressOutcome::Advance => continue,
                        PressOutcome::ChainComplete => break ChainState::Success,
                        PressOutcome::Mismatch => {
                            info!("wrong button {}", transition.id);
                            break ChainState::Fault;
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        mirror.release().await;
                        bail!("event bus closed");
                    }
                },
            }
        };

        mirror.release().await;
        Ok(next)
    }

    async fn on_success(
        &mut self,
        status: &mut ChainStatus,
        stop: &CancellationToken,
    ) -> Result<ChainState> {
        status.reset_faults();
        pause(stop, self.options.pause).await?;
        with_stop(stop, self.gamebox.lights().blink_all(1, self.options.light_up)).await?;

        if status.len() >= self.options.max_chain_length {
            info!("chain reached {} elements, game won", status.len());
            return Ok(ChainState::Won);
        }

        let next = (self.next_button)();
        debug!("extending chain with {next}");
        status.push(next);

        pause(stop, self.options.pause).await?;
        pause(stop, self.options.pause).await?;
        Ok(ChainState::DisplayChain)
    }

    async fn on_fault(
        &self,
        status: &mut ChainStatus,
        stop: &CancellationToken,
    ) -> Result<ChainState> {
        pause(stop, self.options.pause).await?;
        with_stop(stop, self.gamebox.lights().blink_all(2, ERROR_BLINK)).await?;

        status.record_fault();
        if status.faults() <= self.options.retries {
            debug!("retry {} of {}", status.faults(), self.options.retries);
            pause(stop, self.options.pause).await?;
            pause(stop, self.options.pause).await?;
            Ok(ChainState::DisplayChain)
        } else {
            info!("out of retries after {} faults", status.faults());
            Ok(ChainState::Finished)
        }
    }

    async fn win_animation(&self, stop: &CancellationToken) -> Result<()> {
        let light = self.options.light_up;
        with_stop(stop, self.gamebox.lights().blink_all(3, light)).await?;
        for id in ButtonId::ALL {
            with_stop(stop, self.gamebox.lights().set(id, true, Some(light))).await?;
            pause(stop, self.options.pause).await?;
        }
        with_stop(stop, self.gamebox.lights().set_all(true, Some(light * 2))).await?;
        pause(stop, light * 2).await?;
        Ok(())
    }
}

#[async_trait]
impl Game for ChainGame {
    async fn run(&mut self, stop: CancellationToken) -> Result<()> {
        info!("starting chain game");
        let mut status = ChainStatus::new();
        let mut state = ChainState::Init;

        loop {
            state = match state {
                ChainState::Init => {
                    status.clear();
                    for _ in 0..self.options.start_length.max(1) {
                        let id = (self.next_button)();
                        status.push(id);
                    }
                    ChainState::DisplayChain
                }
                ChainState::DisplayChain => {
                    self.display_chain(&mut status, &stop).await?;
                    ChainState::AwaitInput
                }
                ChainState::AwaitInput => self.await_input(&mut status, &stop).await?,
                ChainState::Success => self.on_success(&mut status, &stop).await?,
                ChainState::Fault => self.on_fault(&mut status, &stop).await?,
                ChainState::Won => {
                    self.win_animation(&stop).await?;
                    ChainState::Finished
                }
                ChainState::Finished => {
                    info!("chain game over at length {}", status.len());
                    return Ok(());
                }
            };
        }
    }
}

#[cfg(test)]
#[path = "tests/chain_tests.rs"]
mod tests;
