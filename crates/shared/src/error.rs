use thiserror::Error;

/// Faults surfaced by the pin driver. These are hardware I/O problems and
/// are propagated upward rather than recovered locally.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PinError {
    #[error("pin {pin} is not open")]
    NotOpen { pin: u8 },
    #[error("pin {pin} is already open")]
    AlreadyOpen { pin: u8 },
    #[error("pin {pin} opened as {actual}, expected {expected}")]
    WrongMode {
        pin: u8,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("pin driver fault on pin {pin}: {message}")]
    Io { pin: u8, message: String },
}

/// Expected outcomes of a bounded wait on the event bus. Callers convert
/// these into state transitions instead of treating them as failures.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum WaitError {
    #[error("no button pressed within the allotted time")]
    Timeout,
    #[error("the event bus has shut down")]
    Closed,
}
