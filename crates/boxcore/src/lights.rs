use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use shared::domain::ButtonId;
use shared::error::PinError;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::button::ButtonSource;

/// Coordinated lighting over every button source. Cheap to clone; all
/// fan-out operations complete once the writes are issued, not once any
/// hold-timer revert fires.
#[derive(Clone)]
pub struct LightController {
    sources: Arc<Vec<Arc<ButtonSource>>>,
    by_id: Arc<HashMap<ButtonId, Arc<ButtonSource>>>,
}

impl LightController {
    pub fn new(sources: &[Arc<ButtonSource>]) -> Self {
        let by_id = sources
            .iter()
            .map(|source| (source.id(), Arc::clone(source)))
            .collect();
        Self {
            sources: Arc::new(sources.to_vec()),
            by_id: Arc::new(by_id),
        }
    }

    pub async fn set(
        &self,
        id: ButtonId,
        on: bool,
        hold: Option<Duration>,
    ) -> Result<(), PinError> {
        match self.by_id.get(&id) {
            Some(source) => source.set_light(on, hold).await,
            None => {
                debug!("ignoring light request for unknown button {id}");
                Ok(())
            }
        }
    }

    pub async fn set_many(
        &self,
        ids: &[ButtonId],
        on: bool,
        hold: Option<Duration>,
    ) -> Result<(), PinError> {
        try_join_all(ids.iter().map(|id| self.set(*id, on, hold))).await?;
        Ok(())
    }

    pub async fn set_all(&self, on: bool, hold: Option<Duration>) -> Result<(), PinError> {
        try_join_all(
            self.sources
                .iter()
                .map(|source| source.set_light(on, hold)),
        )
        .await?;
        Ok(())
    }

    /// Blinks the given buttons `times` times: lit for `duration`, with a
    /// dark gap of `duration` between repetitions but not after the last.
    /// `times == 0` does nothing at all.
    pub async fn blink(
        &self,
        ids: &[ButtonId],
        times: u32,
        duration: Duration,
    ) -> Result<(), PinError> {
        if times == 0 {
            return Ok(());
        }

        for i in 0..times {
            self.set_many(ids, true, Some(duration)).await?;
            tokio::time::sleep(duration).await;
            if i + 1 != times {
                tokio::time::sleep(duration).await;
            }
        }
        Ok(())
    }

    pub async fn blink_all(&self, times: u32, duration: Duration) -> Result<(), PinError> {
        let all: Vec<ButtonId> = self.sources.iter().map(|source| source.id()).collect();
        self.blink(&all, times, duration).await
    }

    /// Scoped activation: mirrors every button's own transitions onto its
    /// LED until the returned handle is released.
    pub fn light_on_press(&self) -> LightOnPressHandle {
        let tasks = self
            .sources
            .iter()
            .map(|source| {
                let source = Arc::clone(source);
                let mut rx = source.subscribe();
                tokio::spawn(async move {
                    loop {
                        match rx.recv().await {
                            Ok(transition) => {
                                if let Err(err) =
                                    source.set_light(transition.pressed, None).await
                                {
                                    warn!("light-on-press write failed: {err}");
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(_)) => continue,
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                })
            })
            .collect();

        LightOnPressHandle {
            tasks,
            lights: self.clone(),
            released: false,
        }
    }
}

/// Handle for an active light-on-press mirror. Releasing it (explicitly or
/// by dropping) stops the mirror tasks and turns all lights off.
pub struct LightOnPressHandle {
    tasks: Vec<JoinHandle<()>>,
    lights: LightController,
    released: bool,
}

impl LightOnPressHandle {
    pub async fn release(mut self) {
        self.shutdown();
        if let Err(err) = self.lights.set_all(false, None).await {
            warn!("failed to clear lights on release: {err}");
        }
    }

    fn shutdown(&mut self) {
        self.released = true;
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl Drop for LightOnPressHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.shutdown();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let lights = self.lights.clone();
            handle.spawn(async move {
                if let Err(err) = lights.set_all(false, None).await {
                    warn!("failed to clear lights on drop: {err}");
                }
            });
        }
    }
}

#[cfg(test)]
#[path = "tests/lights_tests.rs"]
mod tests;
