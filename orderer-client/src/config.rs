//! Network configuration records the client can be built from.
//!
//! The layout follows the SDK network-config YAML: an `orderers` map keyed by
//! name, per-orderer `grpcOptions`, and TLS material given either inline
//! (`pem`) or by file (`path`).
//!
//! ```yaml
//! timeouts:
//!   orderer-connection: 5s
//! orderers:
//!   orderer.example.com:
//!     url: grpcs://orderer.example.com:7050
//!     grpcOptions:
//!       ssl-target-name-override: orderer.example.com
//!       keep-alive-time: 30s
//!       fail-fast: true
//!     tlsCACerts:
//!       path: /etc/orderer/ca.pem
//! ```

use {
    crate::{
        descriptor::{
            ClientIdentity, EndpointConfig, EndpointDescriptor, KeepAlive, DEFAULT_DIAL_TIMEOUT,
        },
        error::ConfigError,
    },
    serde::{Deserialize, Deserializer},
    std::{
        collections::HashMap,
        fs,
        path::{Path, PathBuf},
        time::Duration,
    },
};

/// Default timeout for dialing an orderer.
pub const DEFAULT_ORDERER_CONNECTION_TIMEOUT: Duration = DEFAULT_DIAL_TIMEOUT;

/// Top-level network configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    /// Orderers by name.
    #[serde(default)]
    pub orderers: HashMap<String, OrdererConfig>,

    #[serde(default)]
    pub timeouts: Timeouts,
}

/// Client-wide timeouts.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct Timeouts {
    /// Upper bound on dialing an orderer.
    /// Default: [`DEFAULT_ORDERER_CONNECTION_TIMEOUT`].
    #[serde(deserialize_with = "deserialize_duration")]
    pub orderer_connection: Option<Duration>,
}

impl Timeouts {
    pub fn orderer_connection_or_default(&self) -> Duration {
        self.orderer_connection
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or(DEFAULT_ORDERER_CONNECTION_TIMEOUT)
    }
}

/// Configuration of a single orderer.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrdererConfig {
    pub url: String,

    #[serde(default)]
    pub grpc_options: GrpcOptions,

    /// CA certificate for the orderer's TLS certificate.
    #[serde(default, rename = "tlsCACerts")]
    pub tls_ca_certs: PemSource,

    /// Client certificate and key for mutual TLS.
    #[serde(default)]
    pub client: Option<ClientTlsCerts>,
}

/// Transport options for an orderer connection.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct GrpcOptions {
    /// Host name expected in the orderer's certificate.
    pub ssl_target_name_override: Option<String>,

    /// Interval between keep-alive pings; unset or zero disables keep-alive.
    #[serde(deserialize_with = "deserialize_duration")]
    pub keep_alive_time: Option<Duration>,

    #[serde(deserialize_with = "deserialize_duration")]
    pub keep_alive_timeout: Option<Duration>,

    /// Ping even when no stream is open.
    pub keep_alive_permit: bool,

    /// See [`EndpointConfig::fail_fast`].  Default: true.
    pub fail_fast: bool,

    /// Allow an insecure retry after a failed TLS dial.  Only takes effect
    /// for URLs without a scheme.  Default: false.
    pub allow_insecure: bool,
}

impl Default for GrpcOptions {
    fn default() -> Self {
        Self {
            ssl_target_name_override: None,
            keep_alive_time: None,
            keep_alive_timeout: None,
            keep_alive_permit: false,
            fail_fast: true,
            allow_insecure: false,
        }
    }
}

/// PEM material given inline or by path.  Inline wins when both are set.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PemSource {
    pub path: Option<PathBuf>,
    pub pem: Option<String>,
}

impl PemSource {
    /// Load the PEM bytes.  An empty source (or empty file) is not an error.
    pub fn load(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        if let Some(pem) = self.pem.as_deref().map(str::trim).filter(|pem| !pem.is_empty()) {
            return Ok(Some(pem.as_bytes().to_vec()));
        }
        let Some(path) = self.path.as_ref() else {
            return Ok(None);
        };
        let bytes = fs::read(path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Ok((!bytes.is_empty()).then_some(bytes))
    }
}

/// Client certificate/key pair.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientTlsCerts {
    pub cert: PemSource,
    pub key: PemSource,
}

impl ClientTlsCerts {
    fn load(&self) -> Result<Option<ClientIdentity>, ConfigError> {
        match (self.cert.load()?, self.key.load()?) {
            (Some(cert_pem), Some(key_pem)) => Ok(Some(ClientIdentity { cert_pem, key_pem })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::IncompleteIdentity),
        }
    }
}

impl OrdererConfig {
    /// Resolve this record into construction options, reading any PEM files.
    pub fn endpoint_config(&self, dial_timeout: Duration) -> Result<EndpointConfig, ConfigError> {
        let options = &self.grpc_options;
        let client_identity = match &self.client {
            Some(client) => client.load()?,
            None => None,
        };
        Ok(EndpointConfig {
            url: self.url.clone(),
            tls_ca_cert: self.tls_ca_certs.load()?,
            client_identity,
            server_name_override: options.ssl_target_name_override.clone(),
            dial_timeout,
            keep_alive: KeepAlive {
                time: options.keep_alive_time.unwrap_or_default(),
                timeout: options.keep_alive_timeout.unwrap_or_default(),
                permit_without_stream: options.keep_alive_permit,
            },
            fail_fast: options.fail_fast,
            allow_insecure: options.allow_insecure,
        })
    }
}

impl NetworkConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn orderer(&self, name: &str) -> Result<&OrdererConfig, ConfigError> {
        self.orderers
            .get(name)
            .ok_or_else(|| ConfigError::UnknownOrderer(name.to_string()))
    }

    /// Descriptor for the orderer called `name`, dialed with the configured
    /// orderer connection timeout.
    pub fn endpoint(&self, name: &str) -> Result<EndpointDescriptor, ConfigError> {
        EndpointDescriptor::from_orderer_config(
            self.orderer(name)?,
            self.timeouts.orderer_connection_or_default(),
        )
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|value| humantime::parse_duration(value.trim()).map_err(serde::de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use {super::*, assert_matches::assert_matches, std::io::Write, tempfile::NamedTempFile};

    const NETWORK_YAML: &str = r#"
timeouts:
  orderer-connection: 5s
orderers:
  orderer.example.com:
    url: orderer.example.com:7050
    grpcOptions:
      ssl-target-name-override: orderer.example.com
      keep-alive-time: 30s
      keep-alive-timeout: 20s
      keep-alive-permit: true
      fail-fast: false
      allow-insecure: true
    tlsCACerts:
      pem: |
        -----BEGIN CERTIFICATE-----
        MIIB
        -----END CERTIFICATE-----
  orderer2.example.com:
    url: grpcs://orderer2.example.com:8050
"#;

    #[test]
    fn test_parse_network_config() {
        let network = NetworkConfig::from_yaml_str(NETWORK_YAML).unwrap();
        assert_eq!(network.orderers.len(), 2);
        assert_eq!(
            network.timeouts.orderer_connection_or_default(),
            Duration::from_secs(5)
        );

        let orderer = network.orderer("orderer.example.com").unwrap();
        let options = &orderer.grpc_options;
        assert_eq!(
            options.ssl_target_name_override.as_deref(),
            Some("orderer.example.com")
        );
        assert_eq!(options.keep_alive_time, Some(Duration::from_secs(30)));
        assert_eq!(options.keep_alive_timeout, Some(Duration::from_secs(20)));
        assert!(options.keep_alive_permit);
        assert!(!options.fail_fast);
        assert!(options.allow_insecure);
    }

    #[test]
    fn test_endpoint_from_named_orderer() {
        let network = NetworkConfig::from_yaml_str(NETWORK_YAML).unwrap();
        let descriptor = network.endpoint("orderer.example.com").unwrap();
        assert_eq!(descriptor.address(), "orderer.example.com:7050");
        assert!(descriptor.secured());
        assert!(descriptor.insecure_fallback_allowed());
        assert_eq!(descriptor.dial_timeout(), Duration::from_secs(5));
        assert_eq!(descriptor.keep_alive().time, Duration::from_secs(30));
        assert!(descriptor.keep_alive().permit_without_stream);
        assert!(!descriptor.fail_fast());
        assert!(descriptor
            .tls_ca_cert()
            .unwrap()
            .starts_with(b"-----BEGIN CERTIFICATE-----"));
    }

    #[test]
    fn test_grpc_option_defaults() {
        let network = NetworkConfig::from_yaml_str(NETWORK_YAML).unwrap();
        let descriptor = network.endpoint("orderer2.example.com").unwrap();
        assert!(descriptor.fail_fast());
        assert!(!descriptor.insecure_fallback_allowed());
        assert!(!descriptor.keep_alive().is_enabled());
        assert_eq!(descriptor.tls_ca_cert(), None);
    }

    #[test]
    fn test_default_connection_timeout() {
        let network = NetworkConfig::from_yaml_str("orderers: {}").unwrap();
        assert_eq!(
            network.timeouts.orderer_connection_or_default(),
            DEFAULT_ORDERER_CONNECTION_TIMEOUT
        );
    }

    #[test]
    fn test_unknown_orderer() {
        let network = NetworkConfig::from_yaml_str(NETWORK_YAML).unwrap();
        assert_matches!(
            network.endpoint("missing.example.com"),
            Err(ConfigError::UnknownOrderer(name)) if name == "missing.example.com"
        );
    }

    #[test]
    fn test_bad_duration_rejected() {
        let yaml = "timeouts:\n  orderer-connection: soon\n";
        assert_matches!(NetworkConfig::from_yaml_str(yaml), Err(ConfigError::Yaml(_)));
    }

    #[test]
    fn test_pem_loaded_from_path() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"-----BEGIN CERTIFICATE-----\n").unwrap();
        let source = PemSource {
            path: Some(file.path().to_path_buf()),
            pem: None,
        };
        assert_eq!(
            source.load().unwrap().as_deref(),
            Some(&b"-----BEGIN CERTIFICATE-----\n"[..])
        );
    }

    #[test]
    fn test_empty_pem_sources_ignored() {
        let file = NamedTempFile::new().unwrap();
        let empty_file = PemSource {
            path: Some(file.path().to_path_buf()),
            pem: None,
        };
        assert_eq!(empty_file.load().unwrap(), None);
        assert_eq!(PemSource::default().load().unwrap(), None);
        let blank = PemSource {
            path: None,
            pem: Some("  \n".to_string()),
        };
        assert_eq!(blank.load().unwrap(), None);
    }

    #[test]
    fn test_missing_pem_file_is_an_error() {
        let source = PemSource {
            path: Some(PathBuf::from("/nonexistent/orderer-ca.pem")),
            pem: None,
        };
        assert_matches!(source.load(), Err(ConfigError::Io { .. }));
    }

    #[test]
    fn test_half_client_identity_rejected() {
        let config = OrdererConfig {
            url: "orderer:7050".to_string(),
            client: Some(ClientTlsCerts {
                cert: PemSource {
                    path: None,
                    pem: Some("cert".to_string()),
                },
                key: PemSource::default(),
            }),
            ..OrdererConfig::default()
        };
        assert_matches!(
            config.endpoint_config(DEFAULT_ORDERER_CONNECTION_TIMEOUT),
            Err(ConfigError::IncompleteIdentity)
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(NETWORK_YAML.as_bytes()).unwrap();
        let network = NetworkConfig::load(file.path()).unwrap();
        assert!(network.orderer("orderer2.example.com").is_ok());
    }
}
