use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Player {
    One,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonColor {
    Green,
    Yellow,
    Red,
    Blue,
    White,
}

/// Names one of the ten physical buttons: a (player, color) pair.
///
/// Used as the universal key for button sources, LEDs, chain elements and
/// game registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ButtonId {
    pub player: Player,
    pub color: ButtonColor,
}

impl ButtonId {
    pub const fn new(player: Player, color: ButtonColor) -> Self {
        Self { player, color }
    }

    pub const GREEN_ONE: ButtonId = ButtonId::new(Player::One, ButtonColor::Green);
    pub const YELLOW_ONE: ButtonId = ButtonId::new(Player::One, ButtonColor::Yellow);
    pub const RED_ONE: ButtonId = ButtonId::new(Player::One, ButtonColor::Red);
    pub const BLUE_ONE: ButtonId = ButtonId::new(Player::One, ButtonColor::Blue);
    pub const WHITE_ONE: ButtonId = ButtonId::new(Player::One, ButtonColor::White);
    pub const GREEN_TWO: ButtonId = ButtonId::new(Player::Two, ButtonColor::Green);
    pub const YELLOW_TWO: ButtonId = ButtonId::new(Player::Two, ButtonColor::Yellow);
    pub const RED_TWO: ButtonId = ButtonId::new(Player::Two, ButtonColor::Red);
    pub const BLUE_TWO: ButtonId = ButtonId::new(Player::Two, ButtonColor::Blue);
    pub const WHITE_TWO: ButtonId = ButtonId::new(Player::Two, ButtonColor::White);

    /// All ten valid identifiers, player one first.
    pub const ALL: [ButtonId; 10] = [
        ButtonId::GREEN_ONE,
        ButtonId::YELLOW_ONE,
        ButtonId::RED_ONE,
        ButtonId::BLUE_ONE,
        ButtonId::WHITE_ONE,
        ButtonId::GREEN_TWO,
        ButtonId::YELLOW_TWO,
        ButtonId::RED_TWO,
        ButtonId::BLUE_TWO,
        ButtonId::WHITE_TWO,
    ];
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}", self.player, self.color)
    }
}

/// A single debounce-accepted edge on one button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonTransition {
    pub id: ButtonId,
    pub pressed: bool,
    pub at: Instant,
}

impl ButtonTransition {
    pub fn new(id: ButtonId, pressed: bool) -> Self {
        Self {
            id,
            pressed,
            at: Instant::now(),
        }
    }
}
