// # Authentication
//
// Every WS-Management request carries an `Authorization` header produced by
// an [`Authenticator`]. The Kerberos flow is split in two:
//
// - [`NegotiateAuthenticator`] owns the HTTP side (service principal, header
//   format, credential checks).
// - A [`TokenSource`] owns the Kerberos side: it turns the configured
//   principal, password and realm into a GSS-API token for the service
//   principal. It receives the effective krb5.conf through
//   [`KerberosSettings::effective_krb5_conf`].

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;
use windns_core::{Error, KerberosSettings, Result};

/// Produces `Authorization` header values for an endpoint host
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Header value for a request to `host`
    async fn authorization(&self, host: &str) -> Result<String>;

    /// Scheme name (for logging)
    fn scheme(&self) -> &'static str;
}

/// Source of Kerberos initial-context tokens
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Acquire a token for `service_principal` (e.g. `HTTP/dc1.corp.example.com`)
    ///
    /// Failures to reach a KDC should return
    /// [`Error::Connection`](windns_core::Error::Connection); rejected
    /// credentials [`Error::Authentication`](windns_core::Error::Authentication).
    async fn initial_token(
        &self,
        settings: &KerberosSettings,
        service_principal: &str,
    ) -> Result<Vec<u8>>;
}

/// `Negotiate` (SPNEGO/Kerberos) authentication
pub struct NegotiateAuthenticator {
    source: Arc<dyn TokenSource>,
    settings: KerberosSettings,
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for NegotiateAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NegotiateAuthenticator")
            .field("principal", &self.settings.principal())
            .field("kdc_servers", &self.settings.kdc_servers)
            .finish_non_exhaustive()
    }
}

impl NegotiateAuthenticator {
    pub fn new(source: Arc<dyn TokenSource>, settings: KerberosSettings) -> Self {
        Self { source, settings }
    }

    /// Service principal for an endpoint host
    pub fn service_principal(host: &str) -> String {
        format!("HTTP/{}", host)
    }
}

#[async_trait]
impl Authenticator for NegotiateAuthenticator {
    async fn authorization(&self, host: &str) -> Result<String> {
        if self.settings.username.is_empty() {
            return Err(Error::auth("username is required for Kerberos"));
        }
        if self.settings.password.is_empty() {
            return Err(Error::auth("password is required for Kerberos"));
        }
        if self.settings.realm.is_empty() {
            return Err(Error::auth("domain is required for Kerberos"));
        }

        let spn = Self::service_principal(host);
        tracing::debug!(
            "Requesting Kerberos token for {} as {}",
            spn,
            self.settings.principal()
        );

        let token = self.source.initial_token(&self.settings, &spn).await?;
        if token.is_empty() {
            return Err(Error::auth(format!("empty Kerberos token for {}", spn)));
        }

        Ok(format!("Negotiate {}", STANDARD.encode(token)))
    }

    fn scheme(&self) -> &'static str {
        "negotiate"
    }
}
