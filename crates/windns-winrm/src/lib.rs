// # WinRM Remote Transport
//
// This crate runs windns command payloads on a Windows host over
// WS-Management (WinRM), authenticated with Kerberos.
//
// ## Protocol
//
// - Endpoint: `http://host:5985/wsman` or `https://host:5986/wsman`
// - Payloads run as `powershell.exe -EncodedCommand <base64 UTF-16LE>`
// - One shell per execution; the shell is deleted afterwards
//
// ## Security Requirements
//
// - Passwords and tokens NEVER appear in logs or Debug output
// - Plain HTTP carries Kerberos-authenticated but unencrypted SOAP bodies;
//   the server must allow unencrypted traffic (`AllowUnencrypted`) for it
// - Certificate checks are only skipped when explicitly configured
//
// ## Kerberos
//
// `WinRmTransportFactory::kerberos()` requests tickets with the pure-Rust
// `sspi` client, enabled by the `kerberos` feature. Callers with their own
// GSS-API integration pass a `TokenSource` to
// `WinRmTransportFactory::negotiate` instead.
//
// ## Usage
//
// ```rust,ignore
// use windns_core::{ProviderSettings, RecordClient, SessionConfig};
// use windns_winrm::WinRmTransportFactory;
//
// let config = SessionConfig::from_settings(ProviderSettings::from_env()?)?;
// let factory = WinRmTransportFactory::kerberos();
// let client = RecordClient::connect(&config, &factory)?;
// ```

pub mod auth;
pub mod kerberos;
pub mod soap;
pub mod transport;

pub use auth::{Authenticator, NegotiateAuthenticator, TokenSource};
pub use kerberos::{KerberosTokenSource, TicketRequest};
pub use transport::{WinRmTransport, WinRmTransportFactory};
