use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use boxcore::{pause, with_stop, Game, GameBox};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LedDemoOptions {
    pub light: Duration,
    pub dark: Duration,
}

impl Default for LedDemoOptions {
    fn default() -> Self {
        Self {
            light: Duration::from_millis(200),
            dark: Duration::from_millis(100),
        }
    }
}

/// Short attract animation: every LED once in wiring order, then two
/// blinks of the whole panel. Doubles as the wake-up sequence.
pub struct LedDemoGame {
    gamebox: Arc<GameBox>,
    options: LedDemoOptions,
}

impl LedDemoGame {
    pub fn new(gamebox: Arc<GameBox>, options: LedDemoOptions) -> Self {
        Self { gamebox, options }
    }
}

#[async_trait]
impl Game for LedDemoGame {
    async fn run(&mut self, stop: CancellationToken) -> Result<()> {
        debug!("running led demo");
        let lights = self.gamebox.lights();
        with_stop(&stop, lights.set_all(false, None)).await?;

        for source in self.gamebox.sources() {
            with_stop(&stop, source.set_light(true, Some(self.options.light))).await?;
            pause(&stop, self.options.light).await?;
            pause(&stop, self.options.dark).await?;
        }

        pause(&stop, self.options.dark).await?;
        with_stop(&stop, lights.blink_all(2, self.options.light)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use boxcore::{BoxOptions, Game, GameBox, LoopbackDriver, PinDriver, Stopped};
    use tokio_util::sync::CancellationToken;

    use super::*;

    fn test_box() -> (Arc<LoopbackDriver>, Arc<GameBox>) {
        let driver = Arc::new(LoopbackDriver::new());
        let gamebox = GameBox::new(
            Arc::clone(&driver) as Arc<dyn PinDriver>,
            BoxOptions::default(),
        )
        .expect("game box");
        (driver, gamebox)
    }

    fn fast_options() -> LedDemoOptions {
        LedDemoOptions {
            light: Duration::from_millis(10),
            dark: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn the_demo_runs_to_completion() {
        let (driver, gamebox) = test_box();
        let mut demo = LedDemoGame::new(Arc::clone(&gamebox), fast_options());

        demo.run(CancellationToken::new()).await.expect("demo");

        // The trailing blink reverts to the steady state: everything dark.
        tokio::time::sleep(Duration::from_millis(30)).await;
        for map in &gamebox.options().pin_map {
            assert_eq!(driver.level(map.led_pin), Some(false), "led for {}", map.id);
        }
    }

    #[tokio::test]
    async fn cancellation_cuts_the_demo_short() {
        let (_driver, gamebox) = test_box();
        let mut demo = LedDemoGame::new(
            gamebox,
            LedDemoOptions {
                light: Duration::from_secs(10),
                dark: Duration::from_secs(10),
            },
        );

        let stop = CancellationToken::new();
        stop.cancel();

        let err = demo.run(stop).await.expect_err("stopped");
        assert!(err.is::<Stopped>());
    }
}
