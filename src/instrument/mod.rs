//! Instrument handles layered over a command transport.
//!
//! An [`InstrumentClient`] owns exactly one transport connection to one
//! network endpoint and is otherwise stateless: no instrument state is
//! cached, every read is a fresh round trip. Handles are created at session
//! start with fixed host/port and live until process exit.

use crate::error::{AppResult, CommError};
use crate::protocol::Request;
use crate::transport::{TcpTransport, Transport};
use log::error;
use serde_json::Value;

pub mod capabilities;
pub mod cryo;
pub mod daq;

pub use capabilities::CapabilityTable;
pub use cryo::Cryo;
pub use daq::{Daq, Measurement};

const HELP_ID: &str = "9998";
const HELP_FOR_ID: &str = "9999";

/// One transport connection to one instrument.
pub struct InstrumentClient {
    name: String,
    transport: Box<dyn Transport>,
}

impl InstrumentClient {
    pub fn new(name: &str, transport: Box<dyn Transport>) -> Self {
        Self {
            name: name.to_string(),
            transport,
        }
    }

    /// Connects a TCP-backed client to `host:port`.
    pub async fn connect_tcp(name: &str, host: &str, port: u16) -> AppResult<Self> {
        let transport = TcpTransport::connect(host, port).await?;
        Ok(Self::new(name, Box::new(transport)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Issues the request and returns the raw reply envelope.
    pub async fn roundtrip(&mut self, request: &Request) -> AppResult<crate::protocol::Response> {
        self.transport.roundtrip(request).await
    }

    /// Issues the request and returns its `result` payload.
    ///
    /// A reply carrying an error object becomes `Rejected`; a reply with
    /// neither result nor error becomes `FieldMissing("result")`.
    pub async fn call(&mut self, request: &Request) -> AppResult<Value> {
        let response = self.transport.roundtrip(request).await?;
        if let Some(fault) = response.error {
            return Err(CommError::Rejected {
                method: request.method.clone(),
                message: fault.message,
            });
        }
        response
            .result
            .ok_or_else(|| CommError::FieldMissing("result".to_string()))
    }

    /// Like [`call`](Self::call), but logs the failure and returns `None`.
    ///
    /// Callers must treat `None` as "unknown", not as a distinguishable
    /// failure reason.
    pub async fn try_call(&mut self, request: &Request) -> Option<Value> {
        match self.call(request).await {
            Ok(result) => Some(result),
            Err(err) => {
                error!("[{}] {} failed: {err}", self.name, request.method);
                None
            }
        }
    }

    /// Fetches the instrument's command listing via `HELP`.
    pub async fn help(&mut self) -> AppResult<Value> {
        self.call(&Request::new("HELP", HELP_ID)).await
    }

    /// Fetches the parameter description of one command via `HELP`.
    pub async fn help_for(&mut self, method: &str) -> AppResult<Value> {
        let request = Request::new("HELP", HELP_FOR_ID).with_param("Command", method);
        self.call(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::sent_count;
    use crate::transport::ScriptedTransport;
    use serde_json::json;

    #[tokio::test]
    async fn call_returns_the_result_payload() {
        let transport =
            ScriptedTransport::new().reply_result("Get Temperature", json!({"Temperature (K)": 300.0}));
        let mut client = InstrumentClient::new("cryo", Box::new(transport));

        let result = client
            .call(&Request::new("Get Temperature", "561"))
            .await
            .unwrap();
        assert_eq!(result["Temperature (K)"], json!(300.0));
    }

    #[tokio::test]
    async fn error_reply_is_rejected() {
        let transport = ScriptedTransport::new().reply(
            "Set Magnet",
            r#"{"jsonrpc":"2.0","error":{"code":1,"message":"magnet quenched"}}"#,
        );
        let mut client = InstrumentClient::new("cryo", Box::new(transport));

        let err = client
            .call(&Request::new("Set Magnet", "580"))
            .await
            .unwrap_err();
        match err {
            CommError::Rejected { method, message } => {
                assert_eq!(method, "Set Magnet");
                assert_eq!(message, "magnet quenched");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn malformed_reply_yields_empty_result_not_a_crash() {
        let transport = ScriptedTransport::new().reply("Get Temperature", "not json {");
        let journal = transport.journal();
        let mut client = InstrumentClient::new("cryo", Box::new(transport));

        let result = client.try_call(&Request::new("Get Temperature", "561")).await;
        assert!(result.is_none());
        assert_eq!(sent_count(&journal, "Get Temperature"), 1);
    }

    #[tokio::test]
    async fn reply_without_result_is_field_missing() {
        let transport = ScriptedTransport::new().reply("getAO", r#"{"jsonrpc":"2.0"}"#);
        let mut client = InstrumentClient::new("lockin", Box::new(transport));

        let err = client.call(&Request::new("getAO", "601")).await.unwrap_err();
        assert!(matches!(err, CommError::FieldMissing(field) if field == "result"));
    }

    #[tokio::test]
    async fn help_uses_its_reserved_ids() {
        let transport = ScriptedTransport::new()
            .reply_result("HELP", json!(["Get Temperature", "Set Temperature"]));
        let journal = transport.journal();
        let mut client = InstrumentClient::new("cryo", Box::new(transport));

        client.help().await.unwrap();
        client.help_for("Set Temperature").await.unwrap();

        let requests = journal.lock().unwrap();
        assert_eq!(requests[0].id, "9998");
        assert!(requests[0].params.is_none());
        assert_eq!(requests[1].id, "9999");
        assert_eq!(
            requests[1].params.as_ref().unwrap()["Command"],
            json!("Set Temperature")
        );
    }
}
