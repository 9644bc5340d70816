//! A-record protocol
//!
//! - [`options`]: typed operation options and their validation
//! - [`script`]: renders validated commands into PowerShell payloads
//! - [`envelope`]: decodes the `{code, detail, records}` response envelope

pub mod envelope;
pub mod options;
pub mod script;

pub use envelope::{Record, Response, decode, interpret};
pub use options::{
    AddARecordOptions, DEFAULT_TTL_SECS, DeleteARecordOptions, OperationKind, ReadARecordOptions,
    RecordCommand, RecordOperation, UpdateARecordOptions,
};
pub use script::CommandBuilder;
