//! Lock-in/DAQ unit handle.
//!
//! Analog-output setpoints are fire-and-forget; result extraction reshapes
//! the `"Results (Dictionary)"` list of key/value pairs into a lookup and
//! fails fast when the expected key is absent.

use crate::error::{AppResult, CommError};
use crate::instrument::InstrumentClient;
use crate::protocol::Request;
use log::info;
use serde_json::Value;
use std::fmt;

const SET_AO_ID: &str = "600";
const GET_AO_ID: &str = "601";
const GET_RESULTS_ID: &str = "602";

const RESULTS_KEY: &str = "Results (Dictionary)";

/// Methods this handle requires the instrument to advertise.
pub const REQUIRED_METHODS: &[&str] = &["setAO_DC", "getAO", "getResults"];

/// Lock-in measurement kinds, rendered exactly as the result keys expect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Measurement {
    X,
    Y,
    R,
    Theta,
    Mean,
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Measurement::X => "X",
            Measurement::Y => "Y",
            Measurement::R => "R",
            Measurement::Theta => "Theta",
            Measurement::Mean => "Mean",
        };
        write!(f, "{label}")
    }
}

pub struct Daq {
    client: InstrumentClient,
}

impl Daq {
    pub fn new(client: InstrumentClient) -> Self {
        Self { client }
    }

    /// Sets a DC level on one analog-output channel.
    ///
    /// The reply carries no payload and is ignored beyond error logging; a
    /// transient write fault must not abort a long-running sweep.
    pub async fn set_ao_dc(&mut self, channel: u32, volts: f64) {
        let request = Request::new("setAO_DC", SET_AO_ID)
            .with_param("AO Channel", channel)
            .with_param("DC (V)", volts);
        let _ = self.client.try_call(&request).await;
    }

    /// Reads the current analog-output state and logs it.
    pub async fn get_ao(&mut self) -> AppResult<Value> {
        let result = self.client.call(&Request::new("getAO", GET_AO_ID)).await?;
        info!("[{}] AO state: {result}", self.client.name());
        Ok(result)
    }

    /// Extracts one scalar from the lock-in's results dictionary.
    ///
    /// Builds the lookup key from channel, measurement kind, and reference
    /// index; fails with `FieldMissing` when the dictionary or the key is
    /// absent.
    pub async fn get_result(
        &mut self,
        channel: u32,
        kind: Measurement,
        reference: u32,
    ) -> AppResult<f64> {
        let key = result_key(channel, kind, reference);
        let result = self
            .client
            .call(&Request::new("getResults", GET_RESULTS_ID))
            .await?;
        let entries = result
            .get(RESULTS_KEY)
            .and_then(Value::as_array)
            .ok_or_else(|| CommError::FieldMissing(RESULTS_KEY.to_string()))?;

        entries
            .iter()
            .find(|entry| entry.get("key").and_then(Value::as_str) == Some(key.as_str()))
            .and_then(|entry| entry.get("value").and_then(Value::as_f64))
            .ok_or(CommError::FieldMissing(key))
    }
}

fn result_key(channel: u32, kind: Measurement, reference: u32) -> String {
    match kind {
        Measurement::Mean => format!("AI{channel}.Mean"),
        _ => format!("AI{channel}.Ref{reference}.{kind}"),
    }
}
