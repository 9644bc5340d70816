//! Core traits for the windns system
//!
//! - [`RemoteTransport`]: Execute command payloads on the DNS server
//! - [`TransportFactory`]: Build a transport from a session configuration

pub mod remote_transport;

pub use remote_transport::{CommandOutput, RemoteTransport, TransportFactory};
