use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind to. Ignored when `localhost_only` is set.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on. Required.
    pub port: u16,

    /// Bind to 127.0.0.1 regardless of `host`.
    #[serde(default)]
    pub localhost_only: bool,

    /// Request body size limit in bytes.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// How long in-flight requests and adapter calls may run after a shutdown
    /// signal before the process exits anyway.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,

    /// TLS configuration. If omitted, serves plain HTTP.
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

impl ServerConfig {
    /// Address the listener binds to.
    pub fn bind_addr(&self) -> SocketAddr {
        let host = if self.localhost_only {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            self.host
        };
        SocketAddr::new(host, self.port)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Validation(
                "server.port must be a non-zero port number".into(),
            ));
        }
        if self.body_limit_bytes == 0 {
            return Err(ConfigError::Validation(
                "server.body_limit_bytes must be greater than zero".into(),
            ));
        }
        if let Some(tls) = &self.tls {
            tls.validate()?;
        }
        Ok(())
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_body_limit() -> usize {
    1024 * 1024 // 1 MB
}

fn default_shutdown_grace() -> u64 {
    5
}

/// TLS configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsConfig {
    /// Path to the certificate file (PEM format).
    pub cert_path: PathBuf,

    /// Path to the private key file (PEM format).
    pub key_path: PathBuf,

    /// Optional CA/intermediate chain (PEM format), appended to the certificate.
    #[serde(default)]
    pub ca_path: Option<PathBuf>,
}

impl TlsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let paths = [Some(&self.cert_path), Some(&self.key_path), self.ca_path.as_ref()];
        for path in paths.into_iter().flatten() {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Validation(
                    "server.tls paths must not be empty".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> ServerConfig {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse("port = 8880");

        assert_eq!(config.host, default_host());
        assert!(!config.localhost_only);
        assert_eq!(config.body_limit_bytes, 1024 * 1024);
        assert_eq!(config.shutdown_grace(), Duration::from_secs(5));
        assert!(config.tls.is_none());
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:8880");
    }

    #[test]
    fn test_localhost_only_overrides_host() {
        let config = parse("host = \"10.0.0.5\"\nport = 8880\nlocalhost_only = true");
        assert_eq!(config.bind_addr().to_string(), "127.0.0.1:8880");
    }

    #[test]
    fn test_port_required() {
        assert!(toml::from_str::<ServerConfig>("host = \"0.0.0.0\"").is_err());
    }

    #[test]
    fn test_zero_port_rejected() {
        let err = parse("port = 0").validate().unwrap_err();
        assert!(err.to_string().contains("server.port"));
    }

    #[test]
    fn test_tls_paths() {
        let config = parse(
            r#"
            port = 8443
            [tls]
            cert_path = "certs/gateway.crt"
            key_path = "certs/gateway.key"
            ca_path = "certs/ca.crt"
        "#,
        );
        let tls = config.tls.as_ref().unwrap();
        assert_eq!(tls.cert_path, PathBuf::from("certs/gateway.crt"));
        assert_eq!(tls.ca_path, Some(PathBuf::from("certs/ca.crt")));
        assert!(config.validate().is_ok());

        let empty = parse("port = 8443\n[tls]\ncert_path = \"\"\nkey_path = \"k\"");
        assert!(empty.validate().is_err());
    }
}
