//! Configuration types for the windns system
//!
//! [`ProviderSettings`] is the raw, caller-facing configuration surface (every
//! field optional, loadable from `WINDNS_*` environment variables).
//! [`SessionConfig`] is the validated, defaulted and immutable form that a
//! transport owns for its lifetime.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default WinRM port over plain HTTP
pub const DEFAULT_HTTP_PORT: u16 = 5985;

/// Default WinRM port over HTTPS
pub const DEFAULT_HTTPS_PORT: u16 = 5986;

/// Default timeout for one remote execution (connect + authenticate + execute)
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Prefix for environment-variable configuration
pub const ENV_PREFIX: &str = "WINDNS_";

/// A secret string that never shows up in `Debug` output
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the secret value
    ///
    /// ⚠️ Never log the returned value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<REDACTED>")
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Raw provider configuration
///
/// Field names follow the provider configuration surface: `dns_server` is the
/// target host, `domain` is the Kerberos realm, `ignore_ssl_checks` disables
/// certificate validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Windows DNS server to issue commands against
    #[serde(default)]
    pub dns_server: String,

    /// Host that runs the commands on behalf of `dns_server`
    #[serde(default)]
    pub proxy_host: Option<String>,

    /// Username to authenticate with
    #[serde(default)]
    pub username: String,

    /// Password for `username`
    #[serde(default)]
    pub password: Secret,

    /// Realm (domain) for `username`
    #[serde(default)]
    pub domain: String,

    /// Issue commands over HTTPS
    #[serde(default)]
    pub secure_transport: bool,

    /// Accept invalid or self-signed certificates
    #[serde(default)]
    pub ignore_ssl_checks: bool,

    /// Port override (0 or unset picks the transport default)
    #[serde(default)]
    pub port: Option<i64>,

    /// Key distribution centers (defaults to `dns_server`)
    #[serde(default)]
    pub kdc_servers: Vec<String>,

    /// Inline krb5.conf document
    #[serde(default)]
    pub krb5_conf: Option<String>,

    /// Timeout in seconds (≤ 0 or unset picks the default)
    #[serde(default)]
    pub timeout: Option<i64>,
}

impl ProviderSettings {
    /// Load settings from `WINDNS_*` environment variables
    ///
    /// - `WINDNS_DNS_SERVER`, `WINDNS_PROXY_HOST`
    /// - `WINDNS_USERNAME`, `WINDNS_PASSWORD`, `WINDNS_DOMAIN`
    /// - `WINDNS_SECURE_TRANSPORT`, `WINDNS_IGNORE_SSL_CHECKS` (true/false)
    /// - `WINDNS_PORT`, `WINDNS_TIMEOUT` (integers)
    /// - `WINDNS_KDC_SERVERS` (comma-separated)
    /// - `WINDNS_KRB5_CONF`
    pub fn from_env() -> Result<Self, crate::Error> {
        Self::from_lookup(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok())
    }

    /// Load settings from any key/value source
    ///
    /// Keys are passed without the `WINDNS_` prefix (`DNS_SERVER`, `PORT`, ...).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, crate::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Self {
            dns_server: text("DNS_SERVER").unwrap_or_default(),
            proxy_host: text("PROXY_HOST"),
            username: text("USERNAME").unwrap_or_default(),
            password: lookup("PASSWORD").map(Secret::new).unwrap_or_default(),
            domain: text("DOMAIN").unwrap_or_default(),
            secure_transport: parse_flag("SECURE_TRANSPORT", text("SECURE_TRANSPORT"))?,
            ignore_ssl_checks: parse_flag("IGNORE_SSL_CHECKS", text("IGNORE_SSL_CHECKS"))?,
            port: parse_int("PORT", text("PORT"))?,
            kdc_servers: text("KDC_SERVERS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            krb5_conf: lookup("KRB5_CONF").filter(|v| !v.trim().is_empty()),
            timeout: parse_int("TIMEOUT", text("TIMEOUT"))?,
        })
    }
}

fn parse_flag(key: &str, value: Option<String>) -> Result<bool, crate::Error> {
    match value.as_deref().map(str::to_lowercase).as_deref() {
        None => Ok(false),
        Some("true" | "1" | "yes" | "on") => Ok(true),
        Some("false" | "0" | "no" | "off") => Ok(false),
        Some(other) => Err(crate::Error::config(format!(
            "{}{} must be a boolean, got '{}'",
            ENV_PREFIX, key, other
        ))),
    }
}

fn parse_int(key: &str, value: Option<String>) -> Result<Option<i64>, crate::Error> {
    value
        .map(|v| {
            v.parse::<i64>().map_err(|_| {
                crate::Error::config(format!("{}{} must be an integer, got '{}'", ENV_PREFIX, key, v))
            })
        })
        .transpose()
}

/// Immutable, defaulted connection parameters for one remote session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    dns_server: String,
    proxy_host: Option<String>,
    username: String,
    password: Secret,
    realm: String,
    secure_transport: bool,
    skip_certificate_validation: bool,
    port: u16,
    kdc_servers: Vec<String>,
    krb5_conf: Option<String>,
    timeout: Duration,
}

impl SessionConfig {
    /// Validate raw settings and apply defaults
    ///
    /// Only an unusable target host or an out-of-range port fail here;
    /// everything else is deferred to the transport.
    pub fn from_settings(settings: ProviderSettings) -> Result<Self, crate::Error> {
        let dns_server = settings.dns_server.trim().to_string();
        if dns_server.is_empty() {
            return Err(crate::Error::config("dns_server cannot be empty"));
        }
        if dns_server.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(crate::Error::config(format!(
                "dns_server is not a valid host: '{}'",
                dns_server
            )));
        }

        let port = match settings.port {
            None | Some(0) => {
                if settings.secure_transport {
                    DEFAULT_HTTPS_PORT
                } else {
                    DEFAULT_HTTP_PORT
                }
            }
            Some(p) => u16::try_from(p)
                .map_err(|_| crate::Error::config(format!("port out of range: {}", p)))?,
        };

        let timeout = match settings.timeout {
            Some(secs) if secs > 0 => Duration::from_secs(secs as u64),
            _ => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let kdc_servers = if settings.kdc_servers.is_empty() {
            vec![dns_server.clone()]
        } else {
            settings.kdc_servers
        };

        let proxy_host = settings
            .proxy_host
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty());

        Ok(Self {
            dns_server,
            proxy_host,
            username: settings.username,
            password: settings.password,
            realm: settings.domain,
            secure_transport: settings.secure_transport,
            skip_certificate_validation: settings.ignore_ssl_checks,
            port,
            kdc_servers,
            krb5_conf: settings.krb5_conf,
            timeout,
        })
    }

    /// The DNS server every command targets
    pub fn dns_server(&self) -> &str {
        &self.dns_server
    }

    /// Optional proxy host
    pub fn proxy_host(&self) -> Option<&str> {
        self.proxy_host.as_deref()
    }

    /// Host the session connects to: the proxy if set, else the DNS server
    pub fn endpoint_host(&self) -> &str {
        self.proxy_host.as_deref().unwrap_or(&self.dns_server)
    }

    /// Username to authenticate with
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password for the username
    pub fn password(&self) -> &Secret {
        &self.password
    }

    /// Kerberos realm (the configured domain)
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Whether the session uses an encrypted channel
    pub fn secure_transport(&self) -> bool {
        self.secure_transport
    }

    /// Whether invalid certificates are accepted
    pub fn skip_certificate_validation(&self) -> bool {
        self.skip_certificate_validation
    }

    /// Effective port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Effective KDC list (never empty)
    pub fn kdc_servers(&self) -> &[String] {
        &self.kdc_servers
    }

    /// Inline realm-configuration override
    pub fn krb5_conf(&self) -> Option<&str> {
        self.krb5_conf.as_deref()
    }

    /// Timeout for one remote execution
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Kerberos parameters derived from this session
    pub fn kerberos(&self) -> KerberosSettings {
        KerberosSettings {
            username: self.username.clone(),
            password: self.password.clone(),
            realm: self.realm.to_uppercase(),
            kdc_servers: self.kdc_servers.clone(),
            krb5_conf: self.krb5_conf.clone(),
            timeout: self.timeout,
        }
    }
}

/// Parameters a Kerberos ticket source must accept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KerberosSettings {
    /// Username without realm
    pub username: String,
    /// Password for the principal
    pub password: Secret,
    /// Realm, uppercased
    pub realm: String,
    /// KDCs for the realm
    pub kdc_servers: Vec<String>,
    /// Inline krb5.conf override
    pub krb5_conf: Option<String>,
    /// Upper bound for ticket acquisition
    pub timeout: Duration,
}

impl KerberosSettings {
    /// Client principal, `user@REALM`
    pub fn principal(&self) -> String {
        if self.realm.is_empty() || self.username.contains('@') {
            self.username.clone()
        } else {
            format!("{}@{}", self.username, self.realm)
        }
    }

    /// Realm configuration: the inline override, or a generated krb5.conf
    /// naming this realm and its KDCs
    pub fn effective_krb5_conf(&self) -> String {
        if let Some(conf) = self.krb5_conf.as_deref() {
            return conf.to_string();
        }

        let mut conf = String::new();
        conf.push_str("[libdefaults]\n");
        conf.push_str(&format!("    default_realm = {}\n", self.realm));
        conf.push_str("    dns_lookup_realm = false\n");
        conf.push_str("    dns_lookup_kdc = false\n");
        conf.push_str("    rdns = false\n\n");

        conf.push_str("[realms]\n");
        conf.push_str(&format!("    {} = {{\n", self.realm));
        for kdc in &self.kdc_servers {
            conf.push_str(&format!("        kdc = {}\n", kdc));
        }
        conf.push_str("    }\n\n");

        let domain = self.realm.to_lowercase();
        conf.push_str("[domain_realm]\n");
        conf.push_str(&format!("    .{} = {}\n", domain, self.realm));
        conf.push_str(&format!("    {} = {}\n", domain, self.realm));
        conf
    }
}
