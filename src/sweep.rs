//! Experiment sequencer: field outer loop, temperature loop, gate-voltage
//! inner sweep.
//!
//! Each (field, temperature) pair produces one `IvCurve` of lock-in X
//! readings versus gate voltage, delivered to a [`CurveSink`]. Cooperative
//! pause/stop flags are checked at every iteration boundary; a request is
//! never interrupted mid-flight and the setpoint poller itself is not
//! interruptible.

use crate::error::AppResult;
use crate::instrument::{Cryo, Daq, Measurement};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

/// A full nested-sweep description.
#[derive(Clone, Debug)]
pub struct SweepPlan {
    pub field_points: Vec<f64>,
    pub field_rate: f64,
    pub temp_points: Vec<f64>,
    pub temp_rate: f64,
    pub gate_points: Vec<f64>,
    pub gate_channel: u32,
    pub drain_channel: u32,
    pub reference: u32,
    /// Wait after priming the first gate point, before the inner sweep.
    pub settle: Duration,
    /// Wait after each gate step, before reading the lock-in.
    pub dwell: Duration,
}

/// One gate sweep at a fixed (field, temperature) point.
#[derive(Clone, Debug, Serialize)]
pub struct IvCurve {
    pub field: f64,
    pub temperature: f64,
    pub started: DateTime<Utc>,
    pub gate: Vec<f64>,
    pub signal: Vec<f64>,
}

impl IvCurve {
    fn new(field: f64, temperature: f64) -> Self {
        Self {
            field,
            temperature,
            started: Utc::now(),
            gate: Vec::new(),
            signal: Vec::new(),
        }
    }

    fn push(&mut self, gate: f64, signal: f64) {
        self.gate.push(gate);
        self.signal.push(signal);
    }
}

/// Receives finished curves. CSV writer in production, an in-memory
/// collector in tests; plotting is an external collaborator.
pub trait CurveSink: Send {
    fn record(&mut self, curve: &IvCurve) -> AppResult<()>;
}

/// Writes one CSV file per curve into a directory.
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    pub fn new(dir: impl AsRef<Path>) -> AppResult<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }
}

impl CurveSink for CsvSink {
    fn record(&mut self, curve: &IvCurve) -> AppResult<()> {
        let name = format!("iv_B{}T_T{}K.csv", curve.field, curve.temperature);
        let path = self.dir.join(name);
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(["gate_v", "lockin_x_v"])?;
        for (gate, signal) in curve.gate.iter().zip(&curve.signal) {
            writer.write_record([gate.to_string(), signal.to_string()])?;
        }
        writer.flush()?;
        info!("Wrote {}", path.display());
        Ok(())
    }
}

/// Collects curves behind a shared handle for inspection after a run.
#[derive(Default)]
pub struct MemorySink {
    curves: Arc<Mutex<Vec<IvCurve>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn curves(&self) -> Arc<Mutex<Vec<IvCurve>>> {
        Arc::clone(&self.curves)
    }
}

impl CurveSink for MemorySink {
    fn record(&mut self, curve: &IvCurve) -> AppResult<()> {
        if let Ok(mut curves) = self.curves.lock() {
            curves.push(curve.clone());
        }
        Ok(())
    }
}

/// Cooperative pause/stop flags shared with the task running the sweep.
///
/// Both flags are checked at each sweep step; cancellation is best-effort
/// only, never mid-request.
#[derive(Default)]
pub struct SweepControl {
    paused: AtomicBool,
    stopped: AtomicBool,
}

impl SweepControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Blocks while paused; returns `false` once a stop is requested.
    async fn checkpoint(&self) -> bool {
        loop {
            if self.is_stopped() {
                return false;
            }
            if !self.is_paused() {
                return true;
            }
            sleep(Duration::from_millis(50)).await;
        }
    }
}

/// What a finished (or stopped) run looked like.
#[derive(Debug)]
pub struct SweepOutcome {
    pub curves_recorded: usize,
    pub stopped_early: bool,
}

/// Runs the nested sweep to completion or until stopped.
///
/// A failed lock-in read is logged and recorded as a gap (NaN) rather than
/// aborting the sweep; gate writes are fire-and-forget and likewise never
/// abort. A stop request discards the partial curve.
pub async fn run(
    cryo: &mut Cryo,
    daq: &mut Daq,
    plan: &SweepPlan,
    control: &SweepControl,
    sink: &mut dyn CurveSink,
) -> AppResult<SweepOutcome> {
    let mut curves_recorded = 0;

    for &field in &plan.field_points {
        if !control.checkpoint().await {
            return stopped(curves_recorded);
        }
        cryo.set_field(field, plan.field_rate).await?;

        for &temp in &plan.temp_points {
            if !control.checkpoint().await {
                return stopped(curves_recorded);
            }
            cryo.set_temp(temp, plan.temp_rate).await?;

            if let Some(&first) = plan.gate_points.first() {
                daq.set_ao_dc(plan.gate_channel, first).await;
                sleep(plan.settle).await;
            }

            let mut curve = IvCurve::new(field, temp);
            for &gate in &plan.gate_points {
                if !control.checkpoint().await {
                    return stopped(curves_recorded);
                }
                daq.set_ao_dc(plan.gate_channel, gate).await;
                sleep(plan.dwell).await;
                let signal = match daq
                    .get_result(plan.drain_channel, Measurement::X, plan.reference)
                    .await
                {
                    Ok(value) => value,
                    Err(err) => {
                        warn!("Lock-in read failed at gate {gate} V: {err}");
                        f64::NAN
                    }
                };
                curve.push(gate, signal);
            }

            sink.record(&curve)?;
            curves_recorded += 1;
            info!("Recorded curve at B={field} T, T={temp} K");
        }
    }

    Ok(SweepOutcome {
        curves_recorded,
        stopped_early: false,
    })
}

fn stopped(curves_recorded: usize) -> AppResult<SweepOutcome> {
    info!("Sweep stopped after {curves_recorded} curves");
    Ok(SweepOutcome {
        curves_recorded,
        stopped_early: true,
    })
}
