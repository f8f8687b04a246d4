use crate::error::{EngineError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ScriptOp {
    Contractor,
    Budget,
    Propose,
    Revise,
    Accept,
    Decline,
    Submit,
    Approve,
    Reject,
    Settle,
    Fail,
    Retry,
    Reconcile,
}

/// One row of a command script.
///
/// `reference` is a script-local name for a work item; the runner maps it to the
/// generated id. Columns an operation does not use may be left empty.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ScriptCommand {
    pub op: ScriptOp,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub business: Option<String>,
    #[serde(default)]
    pub contractor: Option<String>,
    /// Parsed from the column text so `500.00` keeps its two decimal places.
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Reads script commands from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths, and
/// yields one `Result` per row so a bad row never stops the stream.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn commands(self) -> impl Iterator<Item = Result<ScriptCommand>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(EngineError::from))
    }
}
