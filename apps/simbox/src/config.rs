use std::fs;
use std::time::Duration;

use boxcore::BoxOptions;
use games::ChainGameOptions;
use serde::Deserialize;

#[derive(Debug)]
pub struct Settings {
    pub idle_timeout_secs: u64,
    pub debounce_ms: u64,
    pub chord_hold_ms: u64,
    pub max_game_time_secs: u64,
    pub chain_retries: u32,
    pub chain_max_length: usize,
    pub chain_speed_factor: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 60,
            debounce_ms: 10,
            chord_hold_ms: 1000,
            max_game_time_secs: 300,
            chain_retries: 3,
            chain_max_length: 20,
            chain_speed_factor: 2.0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    idle_timeout_secs: Option<u64>,
    debounce_ms: Option<u64>,
    chord_hold_ms: Option<u64>,
    max_game_time_secs: Option<u64>,
    chain_retries: Option<u32>,
    chain_max_length: Option<usize>,
    chain_speed_factor: Option<f64>,
}

impl Settings {
    pub fn box_options(&self) -> BoxOptions {
        BoxOptions {
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            debounce_window: Duration::from_millis(self.debounce_ms),
            chord_hold: Duration::from_millis(self.chord_hold_ms),
            ..BoxOptions::default()
        }
    }

    pub fn chain_options(&self) -> ChainGameOptions {
        ChainGameOptions {
            retries: self.chain_retries,
            max_chain_length: self.chain_max_length,
            max_speed_factor: self.chain_speed_factor,
            ..ChainGameOptions::default()
        }
    }

    pub fn max_game_time(&self) -> Duration {
        Duration::from_secs(self.max_game_time_secs)
    }

    fn apply_file(&mut self, raw: &str) {
        let Ok(file_cfg) = toml::from_str::<FileSettings>(raw) else {
            return;
        };
        if let Some(v) = file_cfg.idle_timeout_secs {
            self.idle_timeout_secs = v;
        }
        if let Some(v) = file_cfg.debounce_ms {
            self.debounce_ms = v;
        }
        if let Some(v) = file_cfg.chord_hold_ms {
            self.chord_hold_ms = v;
        }
        if let Some(v) = file_cfg.max_game_time_secs {
            self.max_game_time_secs = v;
        }
        if let Some(v) = file_cfg.chain_retries {
            self.chain_retries = v;
        }
        if let Some(v) = file_cfg.chain_max_length {
            self.chain_max_length = v;
        }
        if let Some(v) = file_cfg.chain_speed_factor {
            self.chain_speed_factor = v;
        }
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("SIMBOX__IDLE_TIMEOUT_SECS") {
            if let Ok(parsed) = v.parse() {
                self.idle_timeout_secs = parsed;
            }
        }
        if let Ok(v) = std::env::var("SIMBOX__DEBOUNCE_MS") {
            if let Ok(parsed) = v.parse() {
                self.debounce_ms = parsed;
            }
        }
        if let Ok(v) = std::env::var("SIMBOX__CHORD_HOLD_MS") {
            if let Ok(parsed) = v.parse() {
                self.chord_hold_ms = parsed;
            }
        }
        if let Ok(v) = std::env::var("SIMBOX__MAX_GAME_TIME_SECS") {
            if let Ok(parsed) = v.parse() {
                self.max_game_time_secs = parsed;
            }
        }
        if let Ok(v) = std::env::var("SIMBOX__CHAIN_RETRIES") {
            if let Ok(parsed) = v.parse() {
                self.chain_retries = parsed;
            }
        }
        if let Ok(v) = std::env::var("SIMBOX__CHAIN_MAX_LENGTH") {
            if let Ok(parsed) = v.parse() {
                self.chain_max_length = parsed;
            }
        }
        if let Ok(v) = std::env::var("SIMBOX__CHAIN_SPEED_FACTOR") {
            if let Ok(parsed) = v.parse() {
                self.chain_speed_factor = parsed;
            }
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();
    if let Ok(raw) = fs::read_to_string("simbox.toml") {
        settings.apply_file(&raw);
    }
    settings.apply_env();
    settings
}
