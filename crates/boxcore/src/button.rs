use std::sync::Arc;
use std::time::{Duration, Instant};

use shared::domain::{ButtonId, ButtonTransition};
use shared::error::PinError;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::hal::{PinDriver, PinMode, PinNumber};

const TRANSITION_CHANNEL_CAPACITY: usize = 64;

/// Suppresses contact bounce: an edge closer than `window` to the last
/// accepted edge is discarded outright, never merged into it.
#[derive(Debug)]
pub(crate) struct Debouncer {
    window: Duration,
    last_accepted: Option<Instant>,
}

impl Debouncer {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: None,
        }
    }

    pub(crate) fn accept(&mut self, at: Instant) -> bool {
        match self.last_accepted {
            Some(prev) if at.duration_since(prev) < self.window => false,
            _ => {
                self.last_accepted = Some(at);
                true
            }
        }
    }
}

/// One physical button with its backlight LED. Exclusive owner of the pin
/// pair; emits debounced [`ButtonTransition`]s on a multicast channel.
pub struct ButtonSource {
    id: ButtonId,
    led_pin: PinNumber,
    driver: Arc<dyn PinDriver>,
    steady: Arc<Mutex<bool>>,
    transitions: broadcast::Sender<ButtonTransition>,
    edge_task: JoinHandle<()>,
}

impl ButtonSource {
    pub fn new(
        driver: Arc<dyn PinDriver>,
        id: ButtonId,
        led_pin: PinNumber,
        button_pin: PinNumber,
        debounce_window: Duration,
    ) -> Result<Arc<Self>, PinError> {
        debug!("creating button source for {id}");
        driver.open(led_pin, PinMode::Output)?;
        driver.write(led_pin, false)?;
        driver.open(button_pin, PinMode::Input)?;

        let (transitions, _) = broadcast::channel(TRANSITION_CHANNEL_CAPACITY);
        let mut edges = driver.subscribe(button_pin);
        let edge_task = {
            let transitions = transitions.clone();
            tokio::spawn(async move {
                let mut debouncer = Debouncer::new(debounce_window);
                loop {
                    match edges.recv().await {
                        Ok(edge) => {
                            if !debouncer.accept(edge.at) {
                                continue;
                            }
                            let _ = transitions.send(ButtonTransition {
                                id,
                                pressed: edge.rising,
                                at: edge.at,
                            });
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("button {id} lagged behind {skipped} raw edges");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        };

        Ok(Arc::new(Self {
            id,
            led_pin,
            driver,
            steady: Arc::new(Mutex::new(false)),
            transitions,
            edge_task,
        }))
    }

    pub fn id(&self) -> ButtonId {
        self.id
    }

    /// Multicast stream of debounced transitions; subscribers only see
    /// events emitted after they subscribe.
    pub fn subscribe(&self) -> broadcast::Receiver<ButtonTransition> {
        self.transitions.subscribe()
    }

    /// Sets the LED. Without a hold the value becomes the persisted steady
    /// state; with one, a background timer restores the prior steady state
    /// after the hold elapses, leaving the steady state untouched.
    /// Concurrent calls are last-write-wins through the driver.
    pub async fn set_light(&self, on: bool, hold: Option<Duration>) -> Result<(), PinError> {
        self.driver.write(self.led_pin, on)?;

        match hold {
            None => {
                *self.steady.lock().await = on;
            }
            Some(hold) => {
                let driver = Arc::clone(&self.driver);
                let steady = Arc::clone(&self.steady);
                let led_pin = self.led_pin;
                let id = self.id;
                tokio::spawn(async move {
                    tokio::time::sleep(hold).await;
                    let prior = *steady.lock().await;
                    if let Err(err) = driver.write(led_pin, prior) {
                        warn!("hold revert failed for {id}: {err}");
                    }
                });
            }
        }

        Ok(())
    }
}

impl Drop for ButtonSource {
    fn drop(&mut self) {
        debug!("dropping button source for {}", self.id);
        self.edge_task.abort();
    }
}

#[cfg(test)]
#[path = "tests/button_tests.rs"]
mod tests;
