use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use shared::error::PinError;
use tokio::sync::broadcast;
use tracing::debug;

pub type PinNumber = u8;

const EDGE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input,
    Output,
}

impl PinMode {
    fn name(self) -> &'static str {
        match self {
            PinMode::Input => "input",
            PinMode::Output => "output",
        }
    }
}

/// A raw level change on an input pin, before any debouncing.
#[derive(Debug, Clone, Copy)]
pub struct PinEdge {
    pub pin: PinNumber,
    pub rising: bool,
    pub at: Instant,
}

/// Boundary to the physical pin hardware. Synchronous and side-effecting;
/// implementations are assumed reliable and surface faults as [`PinError`].
pub trait PinDriver: Send + Sync {
    fn open(&self, pin: PinNumber, mode: PinMode) -> Result<(), PinError>;
    fn write(&self, pin: PinNumber, high: bool) -> Result<(), PinError>;
    fn subscribe(&self, pin: PinNumber) -> broadcast::Receiver<PinEdge>;
}

struct PinState {
    mode: PinMode,
    level: bool,
    edges: broadcast::Sender<PinEdge>,
}

impl PinState {
    fn new(mode: PinMode) -> Self {
        let (edges, _) = broadcast::channel(EDGE_CHANNEL_CAPACITY);
        Self {
            mode,
            level: false,
            edges,
        }
    }
}

/// In-process driver standing in for the real hardware. Backs the simulator
/// and the test suites: tests raise edges on input pins and observe the
/// levels written to output pins.
#[derive(Default)]
pub struct LoopbackDriver {
    pins: Mutex<HashMap<PinNumber, PinState>>,
}

impl LoopbackDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a level change on an input pin and notifies subscribers.
    pub fn edge(&self, pin: PinNumber, rising: bool) {
        let mut pins = self.pins.lock().expect("pin table lock");
        let state = pins.entry(pin).or_insert_with(|| PinState::new(PinMode::Input));
        state.level = rising;
        let _ = state.edges.send(PinEdge {
            pin,
            rising,
            at: Instant::now(),
        });
    }

    /// Last level written to an output pin, if it was ever opened.
    pub fn level(&self, pin: PinNumber) -> Option<bool> {
        let pins = self.pins.lock().expect("pin table lock");
        pins.get(&pin).map(|state| state.level)
    }
}

impl PinDriver for LoopbackDriver {
    fn open(&self, pin: PinNumber, mode: PinMode) -> Result<(), PinError> {
        let mut pins = self.pins.lock().expect("pin table lock");
        if pins.contains_key(&pin) {
            return Err(PinError::AlreadyOpen { pin });
        }
        debug!("opening pin {pin} as {}", mode.name());
        pins.insert(pin, PinState::new(mode));
        Ok(())
    }

    fn write(&self, pin: PinNumber, high: bool) -> Result<(), PinError> {
        let mut pins = self.pins.lock().expect("pin table lock");
        let state = pins.get_mut(&pin).ok_or(PinError::NotOpen { pin })?;
        if state.mode != PinMode::Output {
            return Err(PinError::WrongMode {
                pin,
                expected: PinMode::Output.name(),
                actual: state.mode.name(),
            });
        }
        state.level = high;
        Ok(())
    }

    fn subscribe(&self, pin: PinNumber) -> broadcast::Receiver<PinEdge> {
        let mut pins = self.pins.lock().expect("pin table lock");
        let state = pins.entry(pin).or_insert_with(|| PinState::new(PinMode::Input));
        state.edges.subscribe()
    }
}
