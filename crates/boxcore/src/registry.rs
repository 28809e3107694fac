use std::collections::HashMap;
use std::sync::Arc;

use shared::domain::ButtonId;

use crate::game::Game;
use crate::GameBox;

/// Builds a fresh game instance against the shared box.
pub type GameFactory = Box<dyn Fn(Arc<GameBox>) -> Box<dyn Game> + Send + Sync>;

/// Immutable mapping from a selector button to a game factory, built once
/// at startup. No runtime type scanning involved.
#[derive(Default)]
pub struct GameRegistry {
    entries: HashMap<ButtonId, GameFactory>,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(mut self, id: ButtonId, factory: F) -> Self
    where
        F: Fn(Arc<GameBox>) -> Box<dyn Game> + Send + Sync + 'static,
    {
        self.entries.insert(id, Box::new(factory));
        self
    }

    pub fn contains(&self, id: ButtonId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Selector buttons, in the fixed identifier order.
    pub fn buttons(&self) -> Vec<ButtonId> {
        ButtonId::ALL
            .into_iter()
            .filter(|id| self.entries.contains_key(id))
            .collect()
    }

    pub fn create(&self, id: ButtonId, gamebox: Arc<GameBox>) -> Option<Box<dyn Game>> {
        self.entries.get(&id).map(|factory| factory(gamebox))
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use super::*;

    struct NoopGame;

    #[async_trait]
    impl Game for NoopGame {
        async fn run(&mut self, _stop: CancellationToken) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn buttons_follow_identifier_order() {
        let registry = GameRegistry::new()
            .register(ButtonId::RED_ONE, |_| Box::new(NoopGame))
            .register(ButtonId::GREEN_ONE, |_| Box::new(NoopGame));

        assert_eq!(
            registry.buttons(),
            vec![ButtonId::GREEN_ONE, ButtonId::RED_ONE]
        );
        assert!(registry.contains(ButtonId::RED_ONE));
        assert!(!registry.contains(ButtonId::BLUE_TWO));
    }
}
