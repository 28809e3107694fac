use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use shared::domain::ButtonId;
use shared::error::PinError;
use tracing::debug;

pub mod bus;
pub mod button;
pub mod game;
pub mod hal;
pub mod lights;
pub mod orchestrator;
pub mod registry;

pub use bus::{EventBus, IdleNotice, ResetNotice};
pub use button::ButtonSource;
pub use game::{pause, with_stop, Game, GameOutcome, Stopped};
pub use hal::{LoopbackDriver, PinDriver, PinEdge, PinMode, PinNumber};
pub use lights::{LightController, LightOnPressHandle};
pub use orchestrator::{BoxState, Orchestrator};
pub use registry::{GameFactory, GameRegistry};

/// Wiring of one button: which pins carry its LED and its switch.
#[derive(Debug, Clone, Copy)]
pub struct ButtonPinMap {
    pub id: ButtonId,
    pub led_pin: PinNumber,
    pub button_pin: PinNumber,
}

/// The wiring of the physical box (BCM numbering).
pub fn default_pin_map() -> Vec<ButtonPinMap> {
    let entry = |id, led_pin, button_pin| ButtonPinMap {
        id,
        led_pin,
        button_pin,
    };
    vec![
        entry(ButtonId::GREEN_ONE, 18, 27),
        entry(ButtonId::YELLOW_ONE, 23, 22),
        entry(ButtonId::RED_ONE, 24, 10),
        entry(ButtonId::BLUE_ONE, 25, 9),
        entry(ButtonId::WHITE_ONE, 8, 11),
        entry(ButtonId::WHITE_TWO, 7, 5),
        entry(ButtonId::BLUE_TWO, 12, 6),
        entry(ButtonId::RED_TWO, 16, 13),
        entry(ButtonId::YELLOW_TWO, 20, 19),
        entry(ButtonId::GREEN_TWO, 21, 26),
    ]
}

#[derive(Debug, Clone)]
pub struct BoxOptions {
    pub idle_timeout: Duration,
    pub debounce_window: Duration,
    pub chord_hold: Duration,
    pub reset_chord: (ButtonId, ButtonId),
    pub pin_map: Vec<ButtonPinMap>,
}

impl Default for BoxOptions {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(60),
            debounce_window: Duration::from_millis(10),
            chord_hold: Duration::from_secs(1),
            reset_chord: (ButtonId::GREEN_ONE, ButtonId::GREEN_TWO),
            pin_map: default_pin_map(),
        }
    }
}

/// The assembled box: ten button sources, the event bus over them and the
/// light controller. Games and the orchestrator share it behind an [`Arc`].
pub struct GameBox {
    sources: Vec<Arc<ButtonSource>>,
    by_id: HashMap<ButtonId, Arc<ButtonSource>>,
    bus: EventBus,
    lights: LightController,
    options: BoxOptions,
}

impl GameBox {
    pub fn new(driver: Arc<dyn PinDriver>, options: BoxOptions) -> Result<Arc<Self>, PinError> {
        debug!("assembling game box with {} buttons", options.pin_map.len());
        let mut sources = Vec::with_capacity(options.pin_map.len());
        for map in &options.pin_map {
            sources.push(ButtonSource::new(
                Arc::clone(&driver),
                map.id,
                map.led_pin,
                map.button_pin,
                options.debounce_window,
            )?);
        }

        let by_id = sources
            .iter()
            .map(|source| (source.id(), Arc::clone(source)))
            .collect();
        let bus = EventBus::new(
            &sources,
            options.idle_timeout,
            options.reset_chord,
            options.chord_hold,
        );
        let lights = LightController::new(&sources);

        Ok(Arc::new(Self {
            sources,
            by_id,
            bus,
            lights,
            options,
        }))
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn lights(&self) -> &LightController {
        &self.lights
    }

    pub fn options(&self) -> &BoxOptions {
        &self.options
    }

    pub fn sources(&self) -> &[Arc<ButtonSource>] {
        &self.sources
    }

    pub fn source(&self, id: ButtonId) -> Option<&Arc<ButtonSource>> {
        self.by_id.get(&id)
    }
}
