//! Static capability table built from the instrument's `HELP` listing.
//!
//! The table is fetched once at session start and validated against the
//! methods a handle requires, instead of synthesizing callable methods at
//! runtime from the listing.

use crate::error::{AppResult, CommError};
use crate::instrument::InstrumentClient;
use log::info;
use serde_json::Value;
use std::collections::BTreeSet;

/// The enumerated set of methods one instrument advertises.
#[derive(Clone, Debug)]
pub struct CapabilityTable {
    instrument: String,
    methods: BTreeSet<String>,
}

impl CapabilityTable {
    /// Fetches the `HELP` listing and builds the table.
    pub async fn fetch(client: &mut InstrumentClient) -> AppResult<Self> {
        let listing = client.help().await?;
        let table = Self::from_listing(client.name(), &listing)?;
        info!(
            "[{}] advertises {} methods",
            table.instrument,
            table.methods.len()
        );
        Ok(table)
    }

    /// Builds the table from a listing value.
    ///
    /// Accepts either an array of method-name strings or a mapping whose
    /// keys are method names.
    pub fn from_listing(instrument: &str, listing: &Value) -> AppResult<Self> {
        let methods: BTreeSet<String> = match listing {
            Value::Array(entries) => entries
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Value::Object(map) => map.keys().cloned().collect(),
            _ => {
                return Err(CommError::MalformedReply(format!(
                    "HELP listing for '{instrument}' is neither a list nor a mapping"
                )))
            }
        };
        Ok(Self {
            instrument: instrument.to_string(),
            methods,
        })
    }

    pub fn supports(&self, method: &str) -> bool {
        self.methods.contains(method)
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(String::as_str)
    }

    /// Fails fast, listing every required method the instrument lacks.
    pub fn ensure_supports(&self, required: &[&str]) -> AppResult<()> {
        let missing: Vec<String> = required
            .iter()
            .filter(|method| !self.supports(method))
            .map(|method| method.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CommError::Unsupported {
                instrument: self.instrument.clone(),
                methods: missing,
            })
        }
    }
}
