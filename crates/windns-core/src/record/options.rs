//! Typed options for the four A-record operations
//!
//! Each operation has its own options struct. [`RecordOperation`] is the
//! closed union over them; [`RecordOperation::prepare`] validates required
//! fields and applies the default-value policy, yielding a [`RecordCommand`]
//! that the builder renders.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// TTL applied to new records when none (or ≤ 0) is requested
pub const DEFAULT_TTL_SECS: u32 = 300;

/// Options to read A records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadARecordOptions {
    /// Record name relative to the zone
    pub name: String,
    /// Zone name
    pub zone_name: String,
    /// Only return records with this address (empty or unset matches any)
    #[serde(default)]
    pub address: Option<String>,
}

/// Options to add an A record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddARecordOptions {
    /// Record name relative to the zone
    pub name: String,
    /// IPv4 address
    pub address: String,
    /// Zone name
    pub zone_name: String,
    /// Allow any authenticated user to update the record
    #[serde(default)]
    pub allow_update_any: bool,
    /// Create the matching PTR record
    #[serde(default)]
    pub create_ptr: bool,
    /// TTL in seconds (≤ 0 means the default of 300)
    #[serde(default)]
    pub ttl: i64,
}

/// Options to update an existing A record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateARecordOptions {
    /// Record name relative to the zone
    pub name: String,
    /// Address of the record to update
    pub address: String,
    /// Replacement address (empty or unset keeps the current one)
    #[serde(default)]
    pub new_address: Option<String>,
    /// Zone name
    pub zone_name: String,
    /// New TTL in seconds (≤ 0 leaves the TTL unchanged)
    #[serde(default)]
    pub ttl: i64,
}

/// Options to delete an A record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteARecordOptions {
    /// Record name relative to the zone
    pub name: String,
    /// Address of the record to delete
    pub address: String,
    /// Zone name
    pub zone_name: String,
}

/// Operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Read records
    Read,
    /// Add a record
    Add,
    /// Update a record
    Update,
    /// Delete a record
    Delete,
}

impl OperationKind {
    /// Lowercase name for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Read => "read",
            OperationKind::Add => "add",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One A-record operation with its options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOperation {
    /// Read records
    Read(ReadARecordOptions),
    /// Add a record
    Add(AddARecordOptions),
    /// Update a record
    Update(UpdateARecordOptions),
    /// Delete a record
    Delete(DeleteARecordOptions),
}

impl RecordOperation {
    /// The operation kind
    pub fn kind(&self) -> OperationKind {
        match self {
            RecordOperation::Read(_) => OperationKind::Read,
            RecordOperation::Add(_) => OperationKind::Add,
            RecordOperation::Update(_) => OperationKind::Update,
            RecordOperation::Delete(_) => OperationKind::Delete,
        }
    }

    /// Validate required fields and apply defaults
    ///
    /// - name and zone_name are always required; address is required for
    ///   add, update and delete
    /// - add: ttl ≤ 0 becomes [`DEFAULT_TTL_SECS`]
    /// - update: ttl ≤ 0 means "leave unchanged"
    /// - read: an empty address matches every address
    pub fn prepare(self) -> Result<RecordCommand> {
        match self {
            RecordOperation::Read(opts) => Ok(RecordCommand::Read {
                name: required("name", opts.name)?,
                zone: required("zone_name", opts.zone_name)?,
                address: optional("address", opts.address)?,
            }),
            RecordOperation::Add(opts) => {
                let name = required("name", opts.name)?;
                let address = required("address", opts.address)?;
                let zone = required("zone_name", opts.zone_name)?;
                let ttl = if opts.ttl < 1 {
                    DEFAULT_TTL_SECS
                } else {
                    ttl_secs(opts.ttl)?
                };
                Ok(RecordCommand::Add {
                    name,
                    zone,
                    address,
                    allow_update_any: opts.allow_update_any,
                    create_ptr: opts.create_ptr,
                    ttl,
                })
            }
            RecordOperation::Update(opts) => {
                let name = required("name", opts.name)?;
                let zone = required("zone_name", opts.zone_name)?;
                let address = required("address", opts.address)?;
                let ttl = if opts.ttl < 1 { None } else { Some(ttl_secs(opts.ttl)?) };
                Ok(RecordCommand::Update {
                    name,
                    zone,
                    address,
                    new_address: optional("new_address", opts.new_address)?,
                    ttl,
                })
            }
            RecordOperation::Delete(opts) => Ok(RecordCommand::Delete {
                name: required("name", opts.name)?,
                zone: required("zone_name", opts.zone_name)?,
                address: required("address", opts.address)?,
            }),
        }
    }
}

impl From<ReadARecordOptions> for RecordOperation {
    fn from(opts: ReadARecordOptions) -> Self {
        RecordOperation::Read(opts)
    }
}

impl From<AddARecordOptions> for RecordOperation {
    fn from(opts: AddARecordOptions) -> Self {
        RecordOperation::Add(opts)
    }
}

impl From<UpdateARecordOptions> for RecordOperation {
    fn from(opts: UpdateARecordOptions) -> Self {
        RecordOperation::Update(opts)
    }
}

impl From<DeleteARecordOptions> for RecordOperation {
    fn from(opts: DeleteARecordOptions) -> Self {
        RecordOperation::Delete(opts)
    }
}

/// A validated, defaulted operation ready to render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordCommand {
    /// Read records, optionally filtered by address
    Read {
        name: String,
        zone: String,
        address: Option<String>,
    },
    /// Add one record
    Add {
        name: String,
        zone: String,
        address: String,
        allow_update_any: bool,
        create_ptr: bool,
        ttl: u32,
    },
    /// Update the record matching `address`
    Update {
        name: String,
        zone: String,
        address: String,
        new_address: Option<String>,
        ttl: Option<u32>,
    },
    /// Delete the records matching `address`
    Delete {
        name: String,
        zone: String,
        address: String,
    },
}

impl RecordCommand {
    /// The operation kind
    pub fn kind(&self) -> OperationKind {
        match self {
            RecordCommand::Read { .. } => OperationKind::Read,
            RecordCommand::Add { .. } => OperationKind::Add,
            RecordCommand::Update { .. } => OperationKind::Update,
            RecordCommand::Delete { .. } => OperationKind::Delete,
        }
    }
}

fn required(field: &str, value: String) -> Result<String> {
    if value.is_empty() {
        return Err(Error::validation(format!(
            "required value \"{}\" not specified",
            field
        )));
    }
    check_text(field, &value)?;
    Ok(value)
}

fn optional(field: &str, value: Option<String>) -> Result<Option<String>> {
    match value {
        Some(v) if !v.is_empty() => {
            check_text(field, &v)?;
            Ok(Some(v))
        }
        _ => Ok(None),
    }
}

/// Option values end up inside a remote script; control characters have no
/// business in a DNS name, zone or address.
fn check_text(field: &str, value: &str) -> Result<()> {
    if value.chars().any(char::is_control) {
        return Err(Error::validation(format!(
            "value \"{}\" contains control characters",
            field
        )));
    }
    Ok(())
}

fn ttl_secs(ttl: i64) -> Result<u32> {
    u32::try_from(ttl).map_err(|_| Error::validation(format!("ttl out of range: {}", ttl)))
}
