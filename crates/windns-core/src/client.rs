//! Record operations facade
//!
//! [`RecordClient`] runs one A-record operation end to end:
//!
//! ```text
//! Validating ──► Building ──► Executing ──► Decoding ──► Done
//!     │             │             │             │
//!     └─────────────┴─────────────┴─────────────┴──► Failed
//! ```
//!
//! - **Validating**: required fields and default policy ([`RecordOperation::prepare`]).
//!   Failures never touch the transport.
//! - **Building**: [`CommandBuilder::render`].
//! - **Executing**: [`RemoteTransport::execute`], one round trip, no retry.
//! - **Decoding**: [`interpret`], then non-200 envelopes become domain errors.

use crate::config::SessionConfig;
use crate::error::Result;
use crate::record::{
    AddARecordOptions, CommandBuilder, DeleteARecordOptions, ReadARecordOptions, RecordOperation,
    Response, UpdateARecordOptions, interpret,
};
use crate::traits::{RemoteTransport, TransportFactory};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Client for A-record operations on one DNS server
///
/// The client owns its transport; calls are serialized so that one client is
/// one logical remote session. Clients bound to different sessions share no
/// state and may run concurrently.
pub struct RecordClient {
    transport: Mutex<Box<dyn RemoteTransport>>,
    builder: CommandBuilder,
}

impl std::fmt::Debug for RecordClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordClient")
            .field("dns_server", &self.builder.dns_server())
            .finish_non_exhaustive()
    }
}

impl RecordClient {
    /// Create a client over an existing transport
    ///
    /// # Parameters
    ///
    /// - `dns_server`: The DNS server every command targets
    /// - `transport`: Transport connected to the DNS server or its proxy
    pub fn new(dns_server: impl Into<String>, transport: Box<dyn RemoteTransport>) -> Self {
        Self {
            transport: Mutex::new(transport),
            builder: CommandBuilder::new(dns_server),
        }
    }

    /// Create a client for `config`, building its transport with `factory`
    pub fn connect(config: &SessionConfig, factory: &dyn TransportFactory) -> Result<Self> {
        let transport = factory.create(config)?;
        debug!(
            "Created {} transport to {} for DNS server {}",
            transport.transport_name(),
            config.endpoint_host(),
            config.dns_server()
        );
        Ok(Self::new(config.dns_server(), transport))
    }

    /// The DNS server commands target
    pub fn dns_server(&self) -> &str {
        self.builder.dns_server()
    }

    /// Read A records for a name/zone, optionally filtered by address
    pub async fn read_a_record(&self, opts: ReadARecordOptions) -> Result<Response> {
        self.execute(RecordOperation::Read(opts)).await
    }

    /// Add an A record (TTL ≤ 0 becomes 300 seconds)
    pub async fn add_a_record(&self, opts: AddARecordOptions) -> Result<Response> {
        self.execute(RecordOperation::Add(opts)).await
    }

    /// Update the A record matching `opts.address` (TTL ≤ 0 leaves it unchanged)
    pub async fn update_a_record(&self, opts: UpdateARecordOptions) -> Result<Response> {
        self.execute(RecordOperation::Update(opts)).await
    }

    /// Delete the A records matching `opts.address`
    pub async fn delete_a_record(&self, opts: DeleteARecordOptions) -> Result<Response> {
        self.execute(RecordOperation::Delete(opts)).await
    }

    /// Run one operation through validate → build → execute → decode
    ///
    /// # Returns
    ///
    /// - `Ok(Response)`: The envelope carried code 200
    /// - `Err(Error::Validation)`: A required option was missing; nothing was sent
    /// - `Err(e)` with `e.is_transport()`: The command could not be reached or run
    /// - `Err(Error::Decode)`: The command ran but its output was not an envelope
    /// - `Err(e)` with `e.is_domain()`: The command ran and answered non-200
    pub async fn execute(&self, operation: RecordOperation) -> Result<Response> {
        let kind = operation.kind();
        let command = operation.prepare()?;
        let script = self.builder.render(&command);
        debug!("Rendered {} payload ({} bytes)", kind, script.len());

        let output = {
            let transport = self.transport.lock().await;
            transport.execute(&script).await?
        };
        debug!(
            "Remote {} finished with exit status {} ({} bytes stdout, {} bytes stderr)",
            kind,
            output.exit_status,
            output.stdout.len(),
            output.stderr.len()
        );

        let response = interpret(&output)?.into_result()?;
        info!(
            "A record {} succeeded: {} ({} record(s))",
            kind,
            response.detail,
            response.records.len()
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::traits::CommandOutput;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex as StdMutex};

    struct CannedTransport {
        output: CommandOutput,
        scripts: Arc<StdMutex<Vec<String>>>,
    }

    #[async_trait]
    impl RemoteTransport for CannedTransport {
        async fn execute(&self, command: &str) -> Result<CommandOutput> {
            self.scripts.lock().unwrap().push(command.to_string());
            Ok(self.output.clone())
        }

        fn transport_name(&self) -> &'static str {
            "canned"
        }
    }

    fn client(stdout: &str) -> (RecordClient, Arc<StdMutex<Vec<String>>>) {
        let scripts = Arc::new(StdMutex::new(Vec::new()));
        let transport = CannedTransport {
            output: CommandOutput::new(0, stdout.as_bytes().to_vec(), Vec::new()),
            scripts: Arc::clone(&scripts),
        };
        (RecordClient::new("dc1.example.com", Box::new(transport)), scripts)
    }

    #[tokio::test]
    async fn test_add_renders_default_ttl() {
        let (client, scripts) = client(
            r#"{"code":200,"detail":"record created","records":[{"type":"A","name":"www","zone":"example.com.","data":"10.0.0.5","ttl":300}]}"#,
        );

        let rsp = client
            .add_a_record(AddARecordOptions {
                name: "www".to_string(),
                address: "10.0.0.5".to_string(),
                zone_name: "example.com.".to_string(),
                ttl: 0,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(rsp.records.len(), 1);
        let scripts = scripts.lock().unwrap();
        assert_eq!(scripts.len(), 1);
        assert!(scripts[0].contains("[System.TimeSpan]::FromSeconds(300)"));
        assert!(scripts[0].contains("$dnsServer = 'dc1.example.com'"));
    }

    #[tokio::test]
    async fn test_conflict_is_domain_error() {
        let (client, _) = client(r#"{"code":400,"detail":"record already exists"}"#);

        let err = client
            .add_a_record(AddARecordOptions {
                name: "www".to_string(),
                address: "10.0.0.5".to_string(),
                zone_name: "example.com.".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Conflict(ref d) if d == "record already exists"));
    }

    #[tokio::test]
    async fn test_validation_skips_transport() {
        let (client, scripts) = client(r#"{"code":200,"detail":"record found"}"#);

        let err = client
            .read_a_record(ReadARecordOptions {
                name: String::new(),
                zone_name: "example.com.".to_string(),
                address: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert!(scripts.lock().unwrap().is_empty());
    }

    #[test]
    fn test_debug_output() {
        let (client, _) = client("{}");
        let debug_str = format!("{:?}", client);
        assert!(debug_str.contains("dc1.example.com"));
    }
}
