use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use shared::domain::ButtonId;
use shared::error::WaitError;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::game::GameOutcome;
use crate::registry::{GameFactory, GameRegistry};
use crate::{Game, GameBox};

/// Top-level state of the box, published for observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxState {
    StandBy,
    Awake,
    Game,
}

enum Step {
    StandBy,
    Awake,
    Game(ButtonId),
}

/// Two-level FSM driving the box: StandBy → Awake → Game and back. Sole
/// error boundary for game faults; owns the single optional game slot and
/// disposes the previous game before creating the next one.
pub struct Orchestrator {
    gamebox: Arc<GameBox>,
    registry: GameRegistry,
    max_game_time: Duration,
    wake_animation: Option<GameFactory>,
    state_tx: watch::Sender<BoxState>,
    current: Option<Box<dyn Game>>,
}

impl Orchestrator {
    pub fn new(gamebox: Arc<GameBox>, registry: GameRegistry, max_game_time: Duration) -> Self {
        let (state_tx, _) = watch::channel(BoxState::StandBy);
        Self {
            gamebox,
            registry,
            max_game_time,
            wake_animation: None,
            state_tx,
            current: None,
        }
    }

    /// Plays the given game as an attract animation on every Awake entry.
    pub fn with_wake_animation<F>(mut self, factory: F) -> Self
    where
        F: Fn(Arc<GameBox>) -> Box<dyn Game> + Send + Sync + 'static,
    {
        self.wake_animation = Some(Box::new(factory));
        self
    }

    pub fn state(&self) -> watch::Receiver<BoxState> {
        self.state_tx.subscribe()
    }

    /// Drives the FSM forever: executes the entry action of the current
    /// state, awaits the next event and transitions. Every transition
    /// re-asserts a known light configuration (all off) first.
    pub async fn run(&mut self) -> Result<()> {
        let mut step = Step::StandBy;
        loop {
            self.state_tx.send_replace(match step {
                Step::StandBy => BoxState::StandBy,
                Step::Awake => BoxState::Awake,
                Step::Game(_) => BoxState::Game,
            });
            self.gamebox.lights().set_all(false, None).await?;

            step = match step {
                Step::StandBy => self.stand_by().await?,
                Step::Awake => self.awake().await?,
                Step::Game(id) => self.play(id).await?,
            };
        }
    }

    /// Lights off, everything quiet; the first press wakes the box.
    async fn stand_by(&mut self) -> Result<Step> {
        self.dispose_game();
        info!("standing by");

        let mut down = self.gamebox.bus().subscribe_down();
        loop {
            match down.recv().await {
                Ok(transition) => {
                    info!("woken up by {}", transition.id);
                    return Ok(Step::Awake);
                }
                Err(broadcast::error::RecvError::Lagged(_)) => return Ok(Step::Awake),
                Err(broadcast::error::RecvError::Closed) => bail!("event bus closed"),
            }
        }
    }

    /// Menu state: attract animation, selector buttons lit, then wait for
    /// a selection until the idle window runs out.
    async fn awake(&mut self) -> Result<Step> {
        self.dispose_game();
        let mut idle = self.gamebox.bus().subscribe_idle();
        let mut reset = self.gamebox.bus().subscribe_reset();

        if let Some(factory) = &self.wake_animation {
            let mut animation = factory(Arc::clone(&self.gamebox));
            let stop = CancellationToken::new();
            let played = tokio::select! {
                result = tokio::time::timeout(self.max_game_time, animation.run(stop.clone())) => result,
                _ = idle.recv() => {
                    stop.cancel();
                    return Ok(Step::StandBy);
                }
                _ = reset.recv() => {
                    stop.cancel();
                    return Ok(Step::Awake);
                }
            };
            match played {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!("wake animation failed: {err:#}"),
                Err(_) => warn!("wake animation ran past the game deadline"),
            }
        }

        let selectors = self.registry.buttons();
        self.gamebox.lights().set_many(&selectors, true, None).await?;

        let idle_timeout = self.gamebox.options().idle_timeout;
        debug!("awaiting game selection for up to {idle_timeout:?}");
        tokio::select! {
            selection = self.gamebox.bus().wait_for_next_button(idle_timeout) => {
                match selection {
                    Ok(id) if self.registry.contains(id) => {
                        info!("game chosen: {id}");
                        Ok(Step::Game(id))
                    }
                    Ok(id) => {
                        // Not a selector; treated as "no game selected".
                        info!("no game registered for {id}");
                        Ok(Step::Awake)
                    }
                    Err(WaitError::Timeout) => {
                        info!("no selection made, going back to sleep");
                        Ok(Step::StandBy)
                    }
                    Err(WaitError::Closed) => bail!("event bus closed"),
                }
            }
            _ = idle.recv() => Ok(Step::StandBy),
            _ = reset.recv() => Ok(Step::Awake),
        }
    }

    /// Runs the selected game under the configured deadline. Faults are
    /// caught here and treated as ordinary completion; a reset chord or
    /// idle notice pre-empts the game at whichever point it is suspended.
    async fn play(&mut self, id: ButtonId) -> Result<Step> {
        self.dispose_game();
        let Some(game) = self.registry.create(id, Arc::clone(&self.gamebox)) else {
            info!("selected button {id} resolves to no game");
            return Ok(Step::Awake);
        };
        self.current = Some(game);

        let mut idle = self.gamebox.bus().subscribe_idle();
        let mut reset = self.gamebox.bus().subscribe_reset();
        let stop = CancellationToken::new();
        let max_game_time = self.max_game_time;

        let (outcome, next) = {
            let Some(game) = self.current.as_mut() else {
                return Ok(Step::Awake);
            };
            let run = tokio::time::timeout(max_game_time, game.run(stop.clone()));
            tokio::pin!(run);

            tokio::select! {
                finished = &mut run => match finished {
                    Ok(Ok(())) => (GameOutcome::Completed, Step::Awake),
                    Ok(Err(err)) => {
                        warn!("game {id} faulted: {err:#}");
                        (GameOutcome::Faulted, Step::Awake)
                    }
                    Err(_) => (GameOutcome::TimedOut, Step::Awake),
                },
                _ = reset.recv() => {
                    stop.cancel();
                    (GameOutcome::Cancelled, Step::Awake)
                }
                _ = idle.recv() => {
                    stop.cancel();
                    (GameOutcome::Cancelled, Step::StandBy)
                }
            }
        };

        info!("game {id} finished: {outcome:?}");
        self.dispose_game();
        Ok(next)
    }

    fn dispose_game(&mut self) {
        if self.current.take().is_some() {
            debug!("disposed previous game");
        }
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
