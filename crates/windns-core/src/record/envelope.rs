//! Response envelope decoding
//!
//! Every remote script writes one JSON envelope to standard output:
//!
//! ```json
//! {"code":200,"detail":"record found","records":[{"type":"A","name":"www","zone":"example.com.","data":"10.0.0.5","ttl":300}]}
//! ```
//!
//! Standard output carries the outcome. A non-zero exit status overrides a
//! success envelope, since the script may have failed after writing it.

use crate::error::{Error, Result};
use crate::traits::CommandOutput;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Envelope code for success
pub const CODE_OK: i64 = 200;

/// One record returned by the remote script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Record type (always "A" here)
    #[serde(rename = "type", default)]
    pub record_type: String,
    /// Host name relative to the zone
    #[serde(default)]
    pub name: String,
    /// Zone name
    #[serde(default)]
    pub zone: String,
    /// Record data (the address)
    pub data: String,
    /// Time-to-live in seconds
    #[serde(deserialize_with = "seconds")]
    pub ttl: u32,
}

/// Decoded response envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Status code (200 = success)
    pub code: i64,
    /// Human-readable detail
    pub detail: String,
    /// Returned records (absent or null means none)
    #[serde(default, deserialize_with = "record_list")]
    pub records: Vec<Record>,
}

impl Response {
    /// Whether the envelope signals success
    pub fn is_success(&self) -> bool {
        self.code == CODE_OK
    }

    /// Turn a non-200 envelope into its domain error
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::from_envelope(self.code, self.detail))
        }
    }

    /// Minimum TTL across the returned records
    pub fn min_ttl(&self) -> Option<u32> {
        self.records.iter().map(|r| r.ttl).min()
    }

    /// Addresses of the returned records, in envelope order
    pub fn addresses(&self) -> Vec<String> {
        self.records.iter().map(|r| r.data.clone()).collect()
    }
}

/// Decode captured standard output as an envelope
///
/// A leading UTF-8 byte-order mark and surrounding whitespace are ignored.
pub fn decode(stdout: &[u8]) -> Result<Response> {
    let text = std::str::from_utf8(stdout)
        .map_err(|e| Error::decode(format!("output is not UTF-8: {}", e)))?;
    let text = text.trim_start_matches('\u{feff}').trim();

    if text.is_empty() {
        return Err(Error::decode("empty output"));
    }

    serde_json::from_str(text).map_err(|e| Error::decode(format!("invalid envelope: {}", e)))
}

/// Interpret a finished remote execution
///
/// - zero exit + decodable stdout → the envelope
/// - non-zero exit + non-200 envelope → the envelope (a domain error)
/// - non-zero exit + 200 envelope → [`Error::Exit`] with stderr
/// - undecodable stdout and non-zero exit → [`Error::Exit`] with stderr
/// - undecodable stdout and zero exit → [`Error::Decode`]
pub fn interpret(output: &CommandOutput) -> Result<Response> {
    match decode(&output.stdout) {
        Ok(response) if output.success() => Ok(response),
        Ok(response) if response.code != CODE_OK => {
            warn!(
                "Remote process exited {} with envelope code {}",
                output.exit_status, response.code
            );
            Ok(response)
        }
        Ok(_) => {
            warn!(
                "Remote process exited {} after reporting success; treating as failed",
                output.exit_status
            );
            Err(exit_error(output))
        }
        Err(_) if !output.success() => Err(exit_error(output)),
        Err(e) => Err(e),
    }
}

fn exit_error(output: &CommandOutput) -> Error {
    Error::Exit {
        status: output.exit_status,
        stderr: output.stderr_lossy().trim().to_string(),
    }
}

/// TTLs arrive as `TimeSpan.TotalSeconds`, which may be a float
fn seconds<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() || value < 0.0 || value > u32::MAX as f64 {
        return Err(serde::de::Error::custom(format!("invalid ttl: {}", value)));
    }
    Ok(value.round() as u32)
}

/// Windows PowerShell may serialize a one-element array as a bare object, or
/// a wrapped array as `{"value": [...], "Count": n}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordList {
    Many(Vec<Record>),
    Wrapped { value: Vec<Record> },
    One(Record),
}

fn record_list<'de, D>(deserializer: D) -> std::result::Result<Vec<Record>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RecordList>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(RecordList::Many(records)) => records,
        Some(RecordList::Wrapped { value }) => value,
        Some(RecordList::One(record)) => vec![record],
    })
}
