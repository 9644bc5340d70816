// # windns-core
//
// Core library for managing Windows DNS Server A records remotely.
//
// ## Architecture Overview
//
// Every record operation is a PowerShell payload run on a remote Windows
// host. The payload answers with a single JSON envelope on stdout.
//
// - **SessionConfig**: Validated connection settings (server, proxy, credentials, TLS)
// - **RemoteTransport**: Trait for running one command on the remote host
// - **CommandBuilder**: Renders typed record operations into PowerShell payloads
// - **Response**: The decoded `{code, detail, records}` envelope
// - **RecordClient**: Facade running validate → build → execute → decode
// - **RecordSetManager**: Set-level create/read/update/delete over the facade
// - **reconcile**: Address-set differences for updates
//
// ## Design Principles
//
// 1. **Transport-agnostic**: The protocol layer never knows how bytes reach the host
// 2. **Typed errors**: Transport, decode and domain failures stay distinguishable
// 3. **No injection**: Every user value is quoted as a PowerShell literal

pub mod client;
pub mod config;
pub mod error;
pub mod fqdn;
pub mod reconcile;
pub mod record;
pub mod record_set;
pub mod traits;

// Re-export core types for convenience
pub use client::RecordClient;
pub use config::{KerberosSettings, ProviderSettings, Secret, SessionConfig};
pub use error::{AddressChange, Error, Result};
pub use reconcile::{ReconcilePlan, reconcile};
pub use record::{
    AddARecordOptions, CommandBuilder, DeleteARecordOptions, ReadARecordOptions, Record,
    RecordOperation, Response, UpdateARecordOptions,
};
pub use record_set::{RecordSetManager, RecordSetSpec, RecordSetState};
pub use traits::{CommandOutput, RemoteTransport, TransportFactory};
