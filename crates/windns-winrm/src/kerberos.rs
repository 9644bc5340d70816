//! Built-in Kerberos token source
//!
//! [`KerberosTokenSource`] turns [`KerberosSettings`] into a [`TicketRequest`]
//! and obtains the first-leg Kerberos token for the service principal.
//!
//! KDCs come from the realm's `[realms]` entry in
//! [`KerberosSettings::effective_krb5_conf`], so an inline krb5.conf replaces
//! the configured KDC list when it names the realm. With no KDC at all the
//! realm's DNS name is used, which resolves to the domain controllers in
//! Active Directory.
//!
//! Ticket acquisition uses the pure-Rust `sspi` crate and needs the
//! `kerberos` cargo feature. Without it every request fails with
//! [`Error::Authentication`].

use crate::auth::TokenSource;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use windns_core::{Error, KerberosSettings, Result, Secret};

/// Default KDC port
pub const KDC_PORT: u16 = 88;

/// Everything needed to ask a KDC for a service ticket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketRequest {
    /// Client principal, `user@REALM`
    pub principal: String,
    pub password: Secret,
    /// Target, e.g. `HTTP/dc1.corp.example.com`
    pub service_principal: String,
    /// KDC URLs in the order they are tried, e.g. `tcp://dc1:88`
    pub kdc_urls: Vec<String>,
    /// Name this host presents to the KDC
    pub client_name: String,
    pub timeout: Duration,
}

impl TicketRequest {
    pub fn from_settings(
        settings: &KerberosSettings,
        service_principal: &str,
        client_name: &str,
    ) -> Self {
        let mut kdcs = realm_kdcs(&settings.effective_krb5_conf(), &settings.realm);
        if kdcs.is_empty() {
            kdcs = settings.kdc_servers.clone();
        }
        if kdcs.is_empty() {
            kdcs.push(settings.realm.to_lowercase());
        }

        Self {
            principal: settings.principal(),
            password: settings.password.clone(),
            service_principal: service_principal.to_string(),
            kdc_urls: kdcs.iter().map(|kdc| kdc_url(kdc)).collect(),
            client_name: client_name.to_string(),
            timeout: settings.timeout,
        }
    }
}

/// [`TokenSource`] backed by a Kerberos client
#[derive(Debug, Clone)]
pub struct KerberosTokenSource {
    client_name: String,
}

impl Default for KerberosTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

impl KerberosTokenSource {
    /// Token source presenting this machine's host name
    pub fn new() -> Self {
        let client_name = std::env::var("COMPUTERNAME")
            .or_else(|_| std::env::var("HOSTNAME"))
            .unwrap_or_else(|_| "localhost".to_string());
        Self { client_name }
    }

    /// Present `name` to the KDC instead of the host name
    pub fn with_client_name(name: impl Into<String>) -> Self {
        Self {
            client_name: name.into(),
        }
    }

    /// The request sent for `settings` and `service_principal`
    pub fn request(&self, settings: &KerberosSettings, service_principal: &str) -> TicketRequest {
        TicketRequest::from_settings(settings, service_principal, &self.client_name)
    }
}

#[async_trait]
impl TokenSource for KerberosTokenSource {
    async fn initial_token(
        &self,
        settings: &KerberosSettings,
        service_principal: &str,
    ) -> Result<Vec<u8>> {
        let request = self.request(settings, service_principal);
        debug!(
            "Requesting ticket for {} as {} from {:?}",
            request.service_principal, request.principal, request.kdc_urls
        );

        let seconds = request.timeout.as_secs();
        tokio::time::timeout(request.timeout, acquire(request))
            .await
            .map_err(|_| Error::Timeout { seconds })?
    }
}

#[cfg(feature = "kerberos")]
async fn acquire(request: TicketRequest) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || {
        let mut last = None;
        for kdc_url in &request.kdc_urls {
            match sspi_client::initial_token(&request, kdc_url) {
                Ok(token) => return Ok(token),
                Err(e) => {
                    tracing::warn!("KDC {} refused ticket request: {}", kdc_url, e);
                    last = Some(e);
                }
            }
        }
        Err(last.unwrap_or_else(|| Error::auth("no KDC to ask")))
    })
    .await
    .map_err(|e| Error::auth(format!("ticket request task failed: {}", e)))?
}

#[cfg(not(feature = "kerberos"))]
async fn acquire(request: TicketRequest) -> Result<Vec<u8>> {
    Err(Error::auth(format!(
        "cannot request a ticket for {}: windns-winrm was built without the `kerberos` feature",
        request.service_principal
    )))
}

#[cfg(feature = "kerberos")]
mod sspi_client {
    use super::TicketRequest;
    use sspi::{
        AuthIdentity, ClientRequestFlags, CredentialUse, DataRepresentation, Kerberos,
        KerberosConfig, SecurityBuffer, SecurityBufferType, Sspi, SspiImpl, Username,
    };
    use windns_core::{Error, Result};

    fn auth_error(e: impl std::fmt::Display) -> Error {
        Error::auth(format!("Kerberos: {}", e))
    }

    pub(super) fn initial_token(request: &TicketRequest, kdc_url: &str) -> Result<Vec<u8>> {
        let config = KerberosConfig::new(kdc_url, request.client_name.clone());
        let mut kerberos = Kerberos::new_client_from_config(config).map_err(auth_error)?;

        let identity = AuthIdentity {
            username: Username::parse(&request.principal)
                .map_err(|e| Error::auth(format!("invalid principal {}: {:?}", request.principal, e)))?,
            password: request.password.expose().to_string().into(),
        };

        let mut acquired = kerberos
            .acquire_credentials_handle()
            .with_credential_use(CredentialUse::Outbound)
            .with_auth_data(&identity.into())
            .execute(&mut kerberos)
            .map_err(auth_error)?;

        let mut output = vec![SecurityBuffer::new(Vec::new(), SecurityBufferType::Token)];
        let mut builder = kerberos
            .initialize_security_context()
            .with_credentials_handle(&mut acquired.credentials_handle)
            .with_context_requirements(ClientRequestFlags::MUTUAL_AUTH)
            .with_target_data_representation(DataRepresentation::Native)
            .with_target_name(&request.service_principal)
            .with_output(&mut output);

        kerberos
            .initialize_security_context_impl(&mut builder)
            .map_err(auth_error)?
            .resolve_with_default_network_client()
            .map_err(auth_error)?;

        Ok(std::mem::take(&mut output[0].buffer))
    }
}

/// `kdc` entries of `realm` in the `[realms]` section of a krb5.conf
fn realm_kdcs(conf: &str, realm: &str) -> Vec<String> {
    let mut in_realms = false;
    let mut in_realm = false;
    let mut kdcs = Vec::new();

    for line in conf.lines() {
        let line = line.split(['#', ';']).next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('[') {
            in_realms = line == "[realms]";
            in_realm = false;
            continue;
        }
        if !in_realms {
            continue;
        }

        if in_realm {
            if line.starts_with('}') {
                in_realm = false;
            } else if let Some((key, value)) = line.split_once('=') {
                if key.trim() == "kdc" {
                    kdcs.push(value.trim().to_string());
                }
            }
        } else if let Some((key, value)) = line.split_once('=') {
            in_realm = key.trim().eq_ignore_ascii_case(realm) && value.trim().starts_with('{');
        }
    }

    kdcs
}

fn kdc_url(kdc: &str) -> String {
    if kdc.contains("://") {
        kdc.to_string()
    } else if has_port(kdc) {
        format!("tcp://{}", kdc)
    } else {
        format!("tcp://{}:{}", kdc, KDC_PORT)
    }
}

fn has_port(kdc: &str) -> bool {
    match kdc.rsplit_once(':') {
        Some((host, port)) => {
            (!host.contains(':') || host.ends_with(']')) && port.parse::<u16>().is_ok()
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> KerberosSettings {
        KerberosSettings {
            username: "svc-dns".to_string(),
            password: Secret::new("hunter2"),
            realm: "CORP.EXAMPLE.COM".to_string(),
            kdc_servers: vec!["dc1.corp.example.com".to_string(), "10.0.0.2:750".to_string()],
            krb5_conf: None,
            timeout: Duration::from_secs(45),
        }
    }

    #[test]
    fn test_request_carries_settings() {
        let source = KerberosTokenSource::with_client_name("build01");
        let request = source.request(&settings(), "HTTP/dc1.corp.example.com");

        assert_eq!(request.principal, "svc-dns@CORP.EXAMPLE.COM");
        assert_eq!(request.password.expose(), "hunter2");
        assert_eq!(request.service_principal, "HTTP/dc1.corp.example.com");
        assert_eq!(
            request.kdc_urls,
            vec!["tcp://dc1.corp.example.com:88", "tcp://10.0.0.2:750"]
        );
        assert_eq!(request.client_name, "build01");
        assert_eq!(request.timeout, Duration::from_secs(45));
    }

    #[test]
    fn test_inline_krb5_conf_replaces_kdc_list() {
        let mut s = settings();
        s.kdc_servers = vec!["ignored.corp.example.com".to_string()];
        s.krb5_conf = Some(
            r#"
[libdefaults]
    default_realm = CORP.EXAMPLE.COM

[realms]
    OTHER.EXAMPLE.COM = {
        kdc = other.example.com
    }
    CORP.EXAMPLE.COM = {
        kdc = kdc-a.corp.example.com   # primary
        kdc = udp://kdc-b.corp.example.com:88
        admin_server = kdc-a.corp.example.com
    }

[domain_realm]
    .corp.example.com = CORP.EXAMPLE.COM
"#
            .to_string(),
        );

        let request = KerberosTokenSource::with_client_name("build01").request(&s, "HTTP/dc1");

        assert_eq!(
            request.kdc_urls,
            vec!["tcp://kdc-a.corp.example.com:88", "udp://kdc-b.corp.example.com:88"]
        );
    }

    #[test]
    fn test_inline_krb5_conf_without_realm_keeps_kdc_list() {
        let mut s = settings();
        s.krb5_conf = Some("[libdefaults]\n    default_realm = CORP.EXAMPLE.COM\n".to_string());

        let request = KerberosTokenSource::with_client_name("build01").request(&s, "HTTP/dc1");

        assert_eq!(
            request.kdc_urls,
            vec!["tcp://dc1.corp.example.com:88", "tcp://10.0.0.2:750"]
        );
    }

    #[test]
    fn test_no_kdc_falls_back_to_realm_name() {
        let mut s = settings();
        s.kdc_servers.clear();

        let request = KerberosTokenSource::with_client_name("build01").request(&s, "HTTP/dc1");

        assert_eq!(request.kdc_urls, vec!["tcp://corp.example.com:88"]);
    }

    #[test]
    fn test_kdc_url_forms() {
        assert_eq!(kdc_url("dc1"), "tcp://dc1:88");
        assert_eq!(kdc_url("dc1:8088"), "tcp://dc1:8088");
        assert_eq!(kdc_url("[fd00::1]:88"), "tcp://[fd00::1]:88");
        assert_eq!(kdc_url("udp://dc1:88"), "udp://dc1:88");
    }

    #[test]
    fn test_request_debug_hides_password() {
        let request = KerberosTokenSource::with_client_name("build01").request(&settings(), "HTTP/dc1");

        let debug_str = format!("{:?}", request);
        assert!(!debug_str.contains("hunter2"));
        assert!(debug_str.contains("svc-dns@CORP.EXAMPLE.COM"));
    }

    #[cfg(not(feature = "kerberos"))]
    #[tokio::test]
    async fn test_without_feature_fails_authentication() {
        let source = KerberosTokenSource::with_client_name("build01");

        let err = source.initial_token(&settings(), "HTTP/dc1").await.unwrap_err();

        assert!(matches!(err, Error::Authentication(ref m) if m.contains("`kerberos` feature")));
    }
}
