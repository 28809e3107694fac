use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use shared::domain::{ButtonId, ButtonTransition};
use shared::error::WaitError;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use crate::button::ButtonSource;

const BUS_CHANNEL_CAPACITY: usize = 128;
const SIGNAL_CHANNEL_CAPACITY: usize = 16;

/// The box went quiet: no debounced activity for a full idle window.
#[derive(Debug, Clone, Copy)]
pub struct IdleNotice {
    pub at: Instant,
}

/// The reset chord was held long enough.
#[derive(Debug, Clone, Copy)]
pub struct ResetNotice {
    pub at: Instant,
}

/// Read-only fan-in over every button source. Derives the box-wide press,
/// release and combined streams plus the idle and reset-chord signals; all
/// of them are pure derivations of the debounced per-button streams.
pub struct EventBus {
    combined: broadcast::Sender<ButtonTransition>,
    down: broadcast::Sender<ButtonTransition>,
    up: broadcast::Sender<ButtonTransition>,
    idle: broadcast::Sender<IdleNotice>,
    reset: broadcast::Sender<ResetNotice>,
    tasks: Vec<JoinHandle<()>>,
}

impl EventBus {
    pub fn new(
        sources: &[Arc<ButtonSource>],
        idle_timeout: Duration,
        chord: (ButtonId, ButtonId),
        chord_hold: Duration,
    ) -> Self {
        let (combined, _) = broadcast::channel(BUS_CHANNEL_CAPACITY);
        let (down, _) = broadcast::channel(BUS_CHANNEL_CAPACITY);
        let (up, _) = broadcast::channel(BUS_CHANNEL_CAPACITY);
        let (idle, _) = broadcast::channel(SIGNAL_CHANNEL_CAPACITY);
        let (reset, _) = broadcast::channel(SIGNAL_CHANNEL_CAPACITY);

        let mut tasks = Vec::new();

        // Merge every per-button stream in arrival order; no global lock.
        let mut merged = futures::stream::select_all(
            sources
                .iter()
                .map(|source| BroadcastStream::new(source.subscribe())),
        );
        tasks.push(tokio::spawn({
            let combined = combined.clone();
            let down = down.clone();
            let up = up.clone();
            async move {
                while let Some(item) = merged.next().await {
                    match item {
                        Ok(transition) => {
                            let _ = combined.send(transition);
                            if transition.pressed {
                                let _ = down.send(transition);
                            } else {
                                let _ = up.send(transition);
                            }
                        }
                        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                            warn!("event bus lagged behind {skipped} transitions");
                        }
                    }
                }
                debug!("event bus merge task finished");
            }
        }));

        tasks.push(tokio::spawn(idle_task(
            combined.subscribe(),
            idle.clone(),
            idle_timeout,
        )));
        tasks.push(tokio::spawn(chord_task(
            combined.subscribe(),
            reset.clone(),
            chord,
            chord_hold,
        )));

        Self {
            combined,
            down,
            up,
            idle,
            reset,
            tasks,
        }
    }

    pub fn subscribe_combined(&self) -> broadcast::Receiver<ButtonTransition> {
        self.combined.subscribe()
    }

    pub fn subscribe_down(&self) -> broadcast::Receiver<ButtonTransition> {
        self.down.subscribe()
    }

    pub fn subscribe_up(&self) -> broadcast::Receiver<ButtonTransition> {
        self.up.subscribe()
    }

    pub fn subscribe_idle(&self) -> broadcast::Receiver<IdleNotice> {
        self.idle.subscribe()
    }

    pub fn subscribe_reset(&self) -> broadcast::Receiver<ResetNotice> {
        self.reset.subscribe()
    }

    /// Next down event, or [`WaitError::Timeout`]. Each call takes a fresh
    /// subscription, so dropping an earlier wait supersedes it.
    pub async fn wait_for_next_button(&self, timeout: Duration) -> Result<ButtonId, WaitError> {
        let mut rx = self.down.subscribe();
        let next = async {
            loop {
                match rx.recv().await {
                    Ok(transition) => return Ok(transition.id),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return Err(WaitError::Closed),
                }
            }
        };

        match tokio::time::timeout(timeout, next).await {
            Ok(result) => result,
            Err(_) => Err(WaitError::Timeout),
        }
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Debounce-to-silence: emit one notice after a full quiet window, then wait
/// for fresh activity before arming the next window. No polling involved.
async fn idle_task(
    mut activity: broadcast::Receiver<ButtonTransition>,
    idle: broadcast::Sender<IdleNotice>,
    window: Duration,
) {
    loop {
        match tokio::time::timeout(window, activity.recv()).await {
            // Any activity restarts the window.
            Ok(Ok(_)) | Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
            Ok(Err(broadcast::error::RecvError::Closed)) => break,
            Err(_elapsed) => {
                info!("box became idle after {window:?} of silence");
                let _ = idle.send(IdleNotice { at: Instant::now() });
                match activity.recv().await {
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

/// Fires once when both chord buttons stay pressed for the full hold; any
/// earlier release cancels the attempt, and detection re-arms only after a
/// release and re-press.
async fn chord_task(
    mut activity: broadcast::Receiver<ButtonTransition>,
    reset: broadcast::Sender<ResetNotice>,
    (first, second): (ButtonId, ButtonId),
    hold: Duration,
) {
    let mut first_down = false;
    let mut second_down = false;
    let mut fired = false;

    let apply = |first_down: &mut bool, second_down: &mut bool, t: ButtonTransition| {
        if t.id == first {
            *first_down = t.pressed;
        }
        if t.id == second {
            *second_down = t.pressed;
        }
    };

    loop {
        if first_down && second_down && !fired {
            let deadline = tokio::time::sleep(hold);
            tokio::pin!(deadline);
            loop {
                tokio::select! {
                    _ = &mut deadline => {
                        info!("reset chord held for {hold:?}");
                        let _ = reset.send(ResetNotice { at: Instant::now() });
                        fired = true;
                        break;
                    }
                    event = activity.recv() => match event {
                        Ok(t) => {
                            apply(&mut first_down, &mut second_down, t);
                            if !(first_down && second_down) {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => return,
                    },
                }
            }
        } else {
            match activity.recv().await {
                Ok(t) => {
                    apply(&mut first_down, &mut second_down, t);
                    if !(first_down && second_down) {
                        fired = false;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/bus_tests.rs"]
mod tests;
