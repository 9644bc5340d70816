// # Remote Transport Trait
//
// Defines the interface for executing command payloads on the DNS server.
//
// ## Implementations
//
// - WinRM (WS-Management): `windns-winrm` crate
//
// ## Usage
//
// ```rust,ignore
// use windns_core::RemoteTransport;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let transport = /* RemoteTransport implementation */;
//
//     let output = transport.execute("Get-DnsServerZone | ConvertTo-Json").await?;
//     println!("exit {}: {}", output.exit_status, output.stdout_lossy());
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Captured result of one remote execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Process exit status
    pub exit_status: i32,
    /// Captured standard output
    pub stdout: Vec<u8>,
    /// Captured standard error
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Create a command output
    pub fn new(exit_status: i32, stdout: impl Into<Vec<u8>>, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            exit_status,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Whether the process exited zero
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }

    /// Standard output as text (lossy)
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Standard error as text (lossy)
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Trait for remote command transports
///
/// A transport is bound to one [`SessionConfig`](crate::SessionConfig) and
/// authenticates against its effective endpoint (proxy host if set, else the
/// DNS server).
///
/// # Contract
///
/// - One call runs one command payload and returns its exit status and
///   captured output streams.
/// - The session timeout covers the whole call (connect, authenticate,
///   execute); expiry returns [`Error::Timeout`](crate::Error::Timeout).
/// - Connection and authentication failures return
///   [`Error::Connection`](crate::Error::Connection) /
///   [`Error::Authentication`](crate::Error::Authentication).
/// - A non-zero exit status is NOT an error at this layer; it is returned in
///   [`CommandOutput`] and interpreted by the caller.
/// - No retries. Remote DNS mutations are not blindly retryable.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Execute a command payload on the remote host
    ///
    /// # Parameters
    ///
    /// - `command`: PowerShell script text to run
    ///
    /// # Returns
    ///
    /// - `Ok(CommandOutput)`: The process ran to completion
    /// - `Err(Error)`: The process could not be reached or run
    async fn execute(&self, command: &str) -> Result<CommandOutput, crate::Error>;

    /// Get the transport name (for logging/debugging)
    fn transport_name(&self) -> &'static str;
}

/// Helper trait for constructing transports from a session configuration
pub trait TransportFactory: Send + Sync {
    /// Create a RemoteTransport bound to `config`
    fn create(
        &self,
        config: &crate::config::SessionConfig,
    ) -> Result<Box<dyn RemoteTransport>, crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_output_accessors() {
        let output = CommandOutput::new(0, b"{\"code\":200}".to_vec(), Vec::new());
        assert!(output.success());
        assert_eq!(output.stdout_lossy(), "{\"code\":200}");
        assert_eq!(output.stderr_lossy(), "");

        let failed = CommandOutput::new(1, Vec::new(), b"Access is denied.".to_vec());
        assert!(!failed.success());
        assert_eq!(failed.stderr_lossy(), "Access is denied.");
    }
}
