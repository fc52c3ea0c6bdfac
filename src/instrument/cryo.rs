//! Cryostat/magnet controller handle.
//!
//! `set_temp` and `set_field` issue the set command, then block in the
//! setpoint poller until the read-back equals the target. Request ids are
//! the fixed literals the control server expects.

use crate::error::AppResult;
use crate::instrument::InstrumentClient;
use crate::protocol::Request;
use crate::setpoint::{ReadbackFuture, SetpointPoller};
use log::info;
use serde_json::Value;

const SET_TEMP_ID: &str = "560";
const GET_TEMP_ID: &str = "561";
const SET_FIELD_ID: &str = "580";
const GET_FIELD_ID: &str = "581";

const TEMP_KEY: &str = "Temperature (K)";
const FIELD_KEY: &str = "Field (T)";

/// Methods this handle requires the instrument to advertise.
pub const REQUIRED_METHODS: &[&str] = &[
    "Set Temperature",
    "Get Temperature",
    "Set Magnet",
    "Get Magnet",
];

pub struct Cryo {
    client: InstrumentClient,
    poller: SetpointPoller,
}

impl Cryo {
    pub fn new(client: InstrumentClient) -> Self {
        Self {
            client,
            poller: SetpointPoller::default(),
        }
    }

    pub fn with_poller(client: InstrumentClient, poller: SetpointPoller) -> Self {
        Self { client, poller }
    }

    /// Drives the temperature to `kelvin` and blocks until confirmed.
    pub async fn set_temp(&mut self, kelvin: f64, rate: f64) -> AppResult<()> {
        let request = Request::new("Set Temperature", SET_TEMP_ID)
            .with_param(TEMP_KEY, kelvin)
            .with_param("Rate (K/min)", rate);
        self.client.roundtrip(&request).await?;
        info!("Setting temperature to {kelvin} K at {rate} K/min");

        let poller = self.poller;
        let poll_request = Request::new("Get Temperature", GET_TEMP_ID);
        poller
            .wait_until(kelvin, &mut self.client, |client: &mut InstrumentClient| {
                read_back(client, poll_request.clone(), TEMP_KEY)
            })
            .await?;
        info!("Temperature set to {kelvin} K");
        Ok(())
    }

    /// Drives the magnetic field to `tesla` and blocks until confirmed.
    pub async fn set_field(&mut self, tesla: f64, rate: f64) -> AppResult<()> {
        let request = Request::new("Set Magnet", SET_FIELD_ID)
            .with_param(FIELD_KEY, tesla)
            .with_param("Rate (T/min)", rate);
        self.client.roundtrip(&request).await?;
        info!("Setting field to {tesla} T at {rate} T/min");

        let poller = self.poller;
        let poll_request = Request::new("Get Magnet", GET_FIELD_ID);
        poller
            .wait_until(tesla, &mut self.client, |client: &mut InstrumentClient| {
                read_back(client, poll_request.clone(), FIELD_KEY)
            })
            .await?;
        info!("Field set to {tesla} T");
        Ok(())
    }

    /// Reads the current temperature; `None` means unknown.
    pub async fn get_temp(&mut self) -> Option<f64> {
        let request = Request::new("Get Temperature", GET_TEMP_ID);
        read_back(&mut self.client, request, TEMP_KEY).await
    }

    /// Reads the current field; `None` means unknown.
    pub async fn get_field(&mut self) -> Option<f64> {
        let request = Request::new("Get Magnet", GET_FIELD_ID);
        read_back(&mut self.client, request, FIELD_KEY).await
    }
}

// The returned future owns its request frame so it only borrows the client;
// poll closures clone the frame once per poll.
fn read_back<'a>(
    client: &'a mut InstrumentClient,
    request: Request,
    key: &'static str,
) -> ReadbackFuture<'a> {
    Box::pin(async move {
        let result = client.try_call(&request).await?;
        result.get(key).and_then(Value::as_f64)
    })
}
