//! Immutable description of the orderer endpoint a client talks to.
//!
//! An [`EndpointConfig`] carries every connection option as a plain field with
//! a documented default.  [`EndpointDescriptor::new`] validates it once and
//! derives the dial address, the initial security mode and whether the
//! insecure downgrade is permitted.  Nothing changes afterwards.

use {
    crate::{config::OrdererConfig, error::ConfigError},
    std::{fmt, time::Duration},
    tonic::codegen::http::uri::Authority,
};

/// Dial timeout used when none is configured.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(3);

/// HTTP/2 keep-alive policy.  Disabled while `time` is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeepAlive {
    /// Interval between keep-alive pings.
    pub time: Duration,
    /// How long to wait for a ping acknowledgement before closing the
    /// connection.  Zero keeps the transport default.
    pub timeout: Duration,
    /// Whether to ping while no stream is open.
    pub permit_without_stream: bool,
}

impl KeepAlive {
    pub fn is_enabled(&self) -> bool {
        !self.time.is_zero()
    }
}

/// PEM-encoded client certificate and private key for mutual TLS.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub cert_pem: Vec<u8>,
    pub key_pem: Vec<u8>,
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("cert_pem", &format_args!("{} bytes", self.cert_pem.len()))
            .field("key_pem", &"<redacted>")
            .finish()
    }
}

/// Construction-time options for an [`EndpointDescriptor`].
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Orderer URL.  `grpcs://host:port` and a bare `host:port` dial with
    /// TLS; `grpc://host:port` dials in the clear.
    pub url: String,

    /// PEM-encoded CA certificate trusted for the orderer's TLS certificate.
    /// Default: none (system roots only).
    pub tls_ca_cert: Option<Vec<u8>>,

    /// Client certificate presented during the TLS handshake.
    /// Default: none.
    pub client_identity: Option<ClientIdentity>,

    /// Host name checked against the orderer's certificate instead of the
    /// one in `url`.  Default: none.
    pub server_name_override: Option<String>,

    /// Upper bound on a single dial.
    /// Default: [`DEFAULT_DIAL_TIMEOUT`].
    pub dial_timeout: Duration,

    /// Default: disabled.
    pub keep_alive: KeepAlive,

    /// Per-call fail-fast flag.  False asks for wait-for-ready calls, which
    /// the tonic transport does not offer: calls always fail fast.  The dial
    /// blocks either way.  Default: true.
    pub fail_fast: bool,

    /// Allow one retry without TLS after a failed TLS dial.  Only honoured
    /// when `url` carries no scheme.  Default: false.
    pub allow_insecure: bool,
}

impl EndpointConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tls_ca_cert: None,
            client_identity: None,
            server_name_override: None,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            keep_alive: KeepAlive::default(),
            fail_fast: true,
            allow_insecure: false,
        }
    }
}

/// Validated, read-only view of an orderer endpoint.
#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
    address: String,
    secured: bool,
    insecure_fallback_allowed: bool,
    tls_ca_cert: Option<Vec<u8>>,
    client_identity: Option<ClientIdentity>,
    server_name_override: Option<String>,
    dial_timeout: Duration,
    keep_alive: KeepAlive,
    fail_fast: bool,
}

impl EndpointDescriptor {
    pub fn new(config: EndpointConfig) -> Result<Self, ConfigError> {
        let url = config.url.trim();
        if url.is_empty() {
            return Err(invalid_url(url, "empty url"));
        }
        let address = to_address(url);
        if let Err(err) = address.parse::<Authority>() {
            return Err(invalid_url(url, &err.to_string()));
        }
        if config.dial_timeout.is_zero() {
            return Err(ConfigError::ZeroDialTimeout);
        }

        Ok(Self {
            address: address.to_string(),
            secured: attempt_secured(url),
            // Both conditions are required: an explicit scheme pins the
            // security mode even when the flag is set.
            insecure_fallback_allowed: !has_protocol(url) && config.allow_insecure,
            tls_ca_cert: config.tls_ca_cert.filter(|pem| !pem.is_empty()),
            client_identity: config.client_identity,
            server_name_override: config
                .server_name_override
                .filter(|name| !name.is_empty()),
            dial_timeout: config.dial_timeout,
            keep_alive: config.keep_alive,
            fail_fast: config.fail_fast,
        })
    }

    /// Build a descriptor from a configuration-provider record.
    pub fn from_orderer_config(
        config: &OrdererConfig,
        dial_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        Self::new(config.endpoint_config(dial_timeout)?)
    }

    /// `host:port` the client dials.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether calls start in TLS mode.
    pub fn secured(&self) -> bool {
        self.secured
    }

    pub fn insecure_fallback_allowed(&self) -> bool {
        self.insecure_fallback_allowed
    }

    pub fn tls_ca_cert(&self) -> Option<&[u8]> {
        self.tls_ca_cert.as_deref()
    }

    pub fn client_identity(&self) -> Option<&ClientIdentity> {
        self.client_identity.as_ref()
    }

    pub fn server_name_override(&self) -> Option<&str> {
        self.server_name_override.as_deref()
    }

    pub fn dial_timeout(&self) -> Duration {
        self.dial_timeout
    }

    pub fn keep_alive(&self) -> KeepAlive {
        self.keep_alive
    }

    pub fn fail_fast(&self) -> bool {
        self.fail_fast
    }
}

/// Whether `url` names a scheme (`scheme://...`).
pub fn has_protocol(url: &str) -> bool {
    url.contains("://")
}

/// TLS is attempted for any `...s://` scheme and for URLs without a scheme.
pub fn attempt_secured(url: &str) -> bool {
    url.to_ascii_lowercase().contains("s://") || !has_protocol(url)
}

/// Strip the scheme, leaving `host:port`.
pub fn to_address(url: &str) -> &str {
    url.split_once("://").map_or(url, |(_, rest)| rest)
}

fn invalid_url(url: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use {super::*, assert_matches::assert_matches, test_case::test_case};

    #[test_case("grpcs://orderer.example.com:7050", true, "orderer.example.com:7050" ; "tls scheme")]
    #[test_case("GRPCS://orderer.example.com:7050", true, "orderer.example.com:7050" ; "tls scheme upper case")]
    #[test_case("https://orderer.example.com:7050", true, "orderer.example.com:7050" ; "https scheme")]
    #[test_case("grpc://orderer.example.com:7050", false, "orderer.example.com:7050" ; "plain scheme")]
    #[test_case("orderer.example.com:7050", true, "orderer.example.com:7050" ; "no scheme")]
    fn test_url_rules(url: &str, secured: bool, address: &str) {
        let descriptor = EndpointDescriptor::new(EndpointConfig::new(url)).unwrap();
        assert_eq!(descriptor.secured(), secured);
        assert_eq!(descriptor.address(), address);
    }

    #[test_case("orderer:7050", true, true ; "no scheme with flag")]
    #[test_case("orderer:7050", false, false ; "no scheme without flag")]
    #[test_case("grpcs://orderer:7050", true, false ; "tls scheme ignores flag")]
    #[test_case("grpc://orderer:7050", true, false ; "plain scheme ignores flag")]
    fn test_insecure_fallback_needs_bare_address_and_flag(
        url: &str,
        allow_insecure: bool,
        expected: bool,
    ) {
        let config = EndpointConfig {
            allow_insecure,
            ..EndpointConfig::new(url)
        };
        let descriptor = EndpointDescriptor::new(config).unwrap();
        assert_eq!(descriptor.insecure_fallback_allowed(), expected);
    }

    #[test]
    fn test_defaults() {
        let descriptor = EndpointDescriptor::new(EndpointConfig::new("orderer:7050")).unwrap();
        assert_eq!(descriptor.dial_timeout(), DEFAULT_DIAL_TIMEOUT);
        assert!(descriptor.fail_fast());
        assert!(!descriptor.keep_alive().is_enabled());
        assert_eq!(descriptor.tls_ca_cert(), None);
        assert_eq!(descriptor.server_name_override(), None);
        assert!(descriptor.client_identity().is_none());
    }

    #[test]
    fn test_empty_overrides_are_dropped() {
        let config = EndpointConfig {
            tls_ca_cert: Some(Vec::new()),
            server_name_override: Some(String::new()),
            ..EndpointConfig::new("orderer:7050")
        };
        let descriptor = EndpointDescriptor::new(config).unwrap();
        assert_eq!(descriptor.tls_ca_cert(), None);
        assert_eq!(descriptor.server_name_override(), None);
    }

    #[test_case("" ; "empty")]
    #[test_case("   " ; "blank")]
    #[test_case("grpcs://" ; "scheme only")]
    #[test_case("grpc://orderer host:7050" ; "space in host")]
    #[test_case("grpc://orderer:7050/ab" ; "trailing path")]
    fn test_invalid_urls_rejected(url: &str) {
        assert_matches!(
            EndpointDescriptor::new(EndpointConfig::new(url)),
            Err(ConfigError::InvalidUrl { .. })
        );
    }

    #[test]
    fn test_zero_dial_timeout_rejected() {
        let config = EndpointConfig {
            dial_timeout: Duration::ZERO,
            ..EndpointConfig::new("orderer:7050")
        };
        assert_matches!(
            EndpointDescriptor::new(config),
            Err(ConfigError::ZeroDialTimeout)
        );
    }

    #[test]
    fn test_identity_debug_redacts_key() {
        let identity = ClientIdentity {
            cert_pem: b"cert".to_vec(),
            key_pem: b"secret-key".to_vec(),
        };
        let rendered = format!("{identity:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("secret-key"));
    }
}
