//! WinRM remote transport
//!
//! One [`RemoteTransport::execute`] call is one remote-shell run:
//!
//! ```text
//! Create shell → Command → Receive (until Done) → Signal terminate → Delete shell
//! ```
//!
//! Signal and Delete are cleanup and never fail the call. The session
//! timeout bounds the whole run.

use crate::auth::{Authenticator, NegotiateAuthenticator, TokenSource};
use crate::kerberos::KerberosTokenSource;
use crate::soap::{self, Messages, Reply};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use windns_core::traits::{CommandOutput, RemoteTransport, TransportFactory};
use windns_core::{Error, Result, SessionConfig};

/// Server-side long-poll bound for a single Receive
const RECEIVE_TIMEOUT_SECS: u64 = 20;

const SOAP_CONTENT_TYPE: &str = "application/soap+xml;charset=UTF-8";

/// Transport running PowerShell through WS-Management
pub struct WinRmTransport {
    client: reqwest::Client,
    host: String,
    endpoint: String,
    messages: Messages,
    authenticator: Arc<dyn Authenticator>,
    timeout: Duration,
}

// Custom Debug implementation that hides credentials
impl std::fmt::Debug for WinRmTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WinRmTransport")
            .field("endpoint", &self.endpoint)
            .field("auth", &self.authenticator.scheme())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl WinRmTransport {
    /// Create a transport for `config`
    ///
    /// Targets the proxy host when one is configured, else the DNS server.
    pub fn new(config: &SessionConfig, authenticator: Arc<dyn Authenticator>) -> Result<Self> {
        let scheme = if config.secure_transport() { "https" } else { "http" };
        let host = config.endpoint_host().to_string();
        let endpoint = format!("{}://{}:{}/wsman", scheme, host, config.port());

        if config.skip_certificate_validation() {
            if config.secure_transport() {
                warn!("Certificate validation is disabled for {}", endpoint);
            } else {
                debug!("Certificate validation flag has no effect over HTTP");
            }
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(config.skip_certificate_validation())
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;

        let receive_timeout = RECEIVE_TIMEOUT_SECS.min(config.timeout().as_secs().max(1));

        Ok(Self {
            client,
            messages: Messages::new(endpoint.clone(), receive_timeout),
            host,
            endpoint,
            authenticator,
            timeout: config.timeout(),
        })
    }

    /// The WS-Management endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn run(&self, command: &str) -> Result<CommandOutput> {
        let encoded = soap::encode_powershell(command);
        if encoded.len() > soap::MAX_COMMAND_LINE {
            return Err(Error::protocol(format!(
                "encoded command is {} characters, limit is {}",
                encoded.len(),
                soap::MAX_COMMAND_LINE
            )));
        }

        let reply = self.post(self.messages.create_shell()).await?;
        let shell_id = reply
            .shell_id
            .ok_or_else(|| Error::protocol("create response carried no ShellId"))?;
        debug!("Opened shell {} on {}", shell_id, self.host);

        let result = self.run_in_shell(&shell_id, &encoded).await;

        if let Err(e) = self.post(self.messages.delete_shell(&shell_id)).await {
            warn!("Failed to delete shell {}: {}", shell_id, e);
        }

        result
    }

    async fn run_in_shell(&self, shell_id: &str, encoded: &str) -> Result<CommandOutput> {
        let reply = self.post(self.messages.command(shell_id, encoded)).await?;
        let command_id = reply
            .command_id
            .ok_or_else(|| Error::protocol("command response carried no CommandId"))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let exit_status = loop {
            let reply = match self.post(self.messages.receive(shell_id, &command_id)).await {
                Ok(reply) => reply,
                Err(PostError::Fault(fault)) if fault.is_operation_timeout() => {
                    debug!("Receive long-poll expired, polling again");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            stdout.extend_from_slice(&reply.stdout);
            stderr.extend_from_slice(&reply.stderr);

            if reply.done {
                break reply
                    .exit_code
                    .ok_or_else(|| Error::protocol("finished command carried no ExitCode"))?;
            }
        };

        if let Err(e) = self.post(self.messages.terminate(shell_id, &command_id)).await {
            warn!("Failed to signal command {}: {}", command_id, e);
        }

        Ok(CommandOutput::new(exit_status, stdout, stderr))
    }

    async fn post(&self, body: String) -> std::result::Result<Reply, PostError> {
        let authorization = self.authenticator.authorization(&self.host).await?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .header(AUTHORIZATION, authorization)
            .body(body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::auth(format!(
                "{} rejected {} credentials",
                self.endpoint,
                self.authenticator.scheme()
            ))
            .into());
        }

        let text = response.text().await.map_err(|e| self.request_error(e))?;

        // Faults arrive as HTTP 500 with a SOAP body
        let mut reply = match soap::parse_reply(&text) {
            Ok(reply) => reply,
            Err(_) if !status.is_success() => {
                return Err(Error::protocol(format!("HTTP {} from {}", status, self.endpoint)).into());
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(fault) = reply.fault.take() {
            return Err(PostError::Fault(fault));
        }
        if !status.is_success() {
            return Err(Error::protocol(format!("HTTP {} from {}", status, self.endpoint)).into());
        }

        Ok(reply)
    }

    fn request_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout {
                seconds: self.timeout.as_secs(),
            }
        } else {
            Error::connection(format!("{}: {}", self.endpoint, e))
        }
    }
}

/// A request failure: either a SOAP fault or any other error
enum PostError {
    Fault(soap::Fault),
    Other(Error),
}

impl std::fmt::Display for PostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostError::Fault(fault) => write!(f, "WS-Management fault: {}", fault),
            PostError::Other(e) => write!(f, "{}", e),
        }
    }
}

impl From<Error> for PostError {
    fn from(e: Error) -> Self {
        PostError::Other(e)
    }
}

impl From<PostError> for Error {
    fn from(e: PostError) -> Self {
        match e {
            PostError::Other(e) => e,
            fault => Error::protocol(fault.to_string()),
        }
    }
}

#[async_trait]
impl RemoteTransport for WinRmTransport {
    async fn execute(&self, command: &str) -> Result<CommandOutput> {
        let seconds = self.timeout.as_secs();
        tokio::time::timeout(self.timeout, self.run(command))
            .await
            .map_err(|_| Error::Timeout { seconds })?
    }

    fn transport_name(&self) -> &'static str {
        "winrm"
    }
}

/// Factory creating [`WinRmTransport`]s
pub struct WinRmTransportFactory {
    credentials: Credentials,
}

enum Credentials {
    /// Kerberos tokens from a token source, per session
    Negotiate(Arc<dyn TokenSource>),
    /// One authenticator shared by every session
    Fixed(Arc<dyn Authenticator>),
}

impl WinRmTransportFactory {
    /// Authenticate each session with the built-in Kerberos client
    pub fn kerberos() -> Self {
        Self::negotiate(Arc::new(KerberosTokenSource::new()))
    }

    /// Authenticate each session with Kerberos tokens from `source`
    pub fn negotiate(source: Arc<dyn TokenSource>) -> Self {
        Self {
            credentials: Credentials::Negotiate(source),
        }
    }

    /// Authenticate every session with `authenticator`
    pub fn with_authenticator(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            credentials: Credentials::Fixed(authenticator),
        }
    }
}

impl TransportFactory for WinRmTransportFactory {
    fn create(&self, config: &SessionConfig) -> Result<Box<dyn RemoteTransport>> {
        let authenticator: Arc<dyn Authenticator> = match &self.credentials {
            Credentials::Negotiate(source) => Arc::new(NegotiateAuthenticator::new(
                Arc::clone(source),
                config.kerberos(),
            )),
            Credentials::Fixed(authenticator) => Arc::clone(authenticator),
        };

        Ok(Box::new(WinRmTransport::new(config, authenticator)?))
    }
}
