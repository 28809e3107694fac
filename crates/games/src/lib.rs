pub mod chain;
pub mod demo;
pub mod lightify;

pub use chain::{ChainGame, ChainGameOptions};
pub use demo::{LedDemoGame, LedDemoOptions};
pub use lightify::LightOnPressGame;
