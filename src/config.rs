//! Application configuration.
//!
//! Settings are layered: built-in defaults, then an optional TOML file,
//! then `CRYOSWEEP_`-prefixed environment variables (`__` as the section
//! separator, e.g. `CRYOSWEEP_INSTRUMENTS__CRYO__PORT=29271`).

use crate::error::AppResult;
use crate::setpoint::SetpointPoller;
use crate::sweep::SweepPlan;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub instruments: Instruments,
    pub poller: PollerSettings,
    pub sweep: SweepSettings,
    pub logging: LoggingSettings,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Instruments {
    pub cryo: Endpoint,
    pub lockin: Endpoint,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PollerSettings {
    /// Sleep between convergence polls.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Optional poll cap; unset preserves the wait-forever behavior.
    pub max_polls: Option<u64>,
}

/// Evenly spaced sweep points, endpoints inclusive.
#[derive(Clone, Debug, Deserialize)]
pub struct Ramp {
    pub start: f64,
    pub stop: f64,
    pub steps: usize,
}

impl Ramp {
    pub fn points(&self) -> Vec<f64> {
        if self.steps <= 1 {
            return vec![self.start];
        }
        let span = self.stop - self.start;
        let divisions = (self.steps - 1) as f64;
        (0..self.steps)
            .map(|i| self.start + span * (i as f64) / divisions)
            .collect()
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    pub field: Ramp,
    pub field_rate: f64,
    pub temperature: Ramp,
    pub temperature_rate: f64,
    pub gate: Ramp,
    pub gate_channel: u32,
    pub drain_channel: u32,
    pub reference: u32,
    #[serde(with = "humantime_serde")]
    pub settle: Duration,
    #[serde(with = "humantime_serde")]
    pub dwell: Duration,
    pub output_dir: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for Instruments {
    fn default() -> Self {
        Self {
            cryo: Endpoint {
                host: "localhost".to_string(),
                port: 29270,
            },
            lockin: Endpoint {
                host: "localhost".to_string(),
                port: 29170,
            },
        }
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_polls: None,
        }
    }
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            field: Ramp {
                start: -1.0,
                stop: 1.0,
                steps: 2,
            },
            field_rate: 10.0,
            temperature: Ramp {
                start: 300.0,
                stop: 320.0,
                steps: 2,
            },
            temperature_rate: 50.0,
            gate: Ramp {
                start: 0.0,
                stop: 0.1,
                steps: 500,
            },
            gate_channel: 2,
            drain_channel: 1,
            reference: 1,
            settle: Duration::from_secs(1),
            dwell: Duration::from_millis(10),
            output_dir: PathBuf::from("curves"),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            instruments: Instruments::default(),
            poller: PollerSettings::default(),
            sweep: SweepSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Settings {
    /// Loads settings from the given file (or `config/default.toml` when
    /// none is given), with environment variables layered on top.
    pub fn new(path: Option<&Path>) -> AppResult<Self> {
        let mut builder = Config::builder();
        builder = match path {
            Some(path) => builder.add_source(File::from(path.to_path_buf())),
            None => builder.add_source(File::with_name("config/default").required(false)),
        };
        builder = builder.add_source(Environment::with_prefix("CRYOSWEEP")
                .prefix_separator("_")
                .separator("__"));
        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn poller(&self) -> SetpointPoller {
        SetpointPoller::new(self.poller.interval, self.poller.max_polls)
    }

    pub fn sweep_plan(&self) -> SweepPlan {
        SweepPlan {
            field_points: self.sweep.field.points(),
            field_rate: self.sweep.field_rate,
            temp_points: self.sweep.temperature.points(),
            temp_rate: self.sweep.temperature_rate,
            gate_points: self.sweep.gate.points(),
            gate_channel: self.sweep.gate_channel,
            drain_channel: self.sweep.drain_channel,
            reference: self.sweep.reference,
            settle: self.sweep.settle,
            dwell: self.sweep.dwell,
        }
    }
}
