//! Registry addresses derived from one base URL.
//!
//! The base is the HTTP address of the registry service
//! (e.g. `http://localhost:8080/`). Channel addresses use the matching
//! WebSocket scheme (`ws`/`wss`); lookup addresses use `http`/`https`.

use crate::config::RegistryConfig;
use crate::{Result, SnoopError};
use url::Url;

/// Addresses of one registry service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEndpoints {
    base: Url,
}

impl RegistryEndpoints {
    /// Parse a registry base URL. Accepts `http`, `https`, `ws` and `wss`.
    pub fn parse(base: &str) -> Result<Self> {
        let with_slash = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{}/", base)
        };

        let base = Url::parse(&with_slash).map_err(|e| SnoopError::Url {
            url: with_slash.clone(),
            message: e.to_string(),
        })?;

        match base.scheme() {
            "http" | "https" | "ws" | "wss" => {}
            other => {
                return Err(SnoopError::Url {
                    url: with_slash,
                    message: format!("unsupported scheme '{}'", other),
                })
            }
        }
        if base.host_str().is_none() {
            return Err(SnoopError::Url {
                url: with_slash,
                message: "missing host".to_string(),
            });
        }

        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// WebSocket address accepting the first registration.
    pub fn registration(&self) -> Result<Url> {
        self.channel(RegistryConfig::REGISTER_PATH)
    }

    /// WebSocket address receiving heartbeats for `identity`.
    pub fn heartbeat(&self, identity: &str) -> Result<Url> {
        self.channel(&format!(
            "{}/{}",
            RegistryConfig::STATUS_PATH,
            urlencoding::encode(identity)
        ))
    }

    /// HTTP address listing every stored descriptor.
    pub fn services(&self) -> Result<Url> {
        self.http(RegistryConfig::SERVICES_PATH)
    }

    /// HTTP address looking up one live descriptor.
    pub fn service(&self, identity: &str) -> Result<Url> {
        self.http(&format!(
            "{}/{}",
            RegistryConfig::SERVICES_PATH,
            urlencoding::encode(identity)
        ))
    }

    fn channel(&self, path: &str) -> Result<Url> {
        let scheme = match self.base.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        self.resolve(path, scheme)
    }

    fn http(&self, path: &str) -> Result<Url> {
        let scheme = match self.base.scheme() {
            "https" | "wss" => "https",
            _ => "http",
        };
        self.resolve(path, scheme)
    }

    fn resolve(&self, path: &str, scheme: &str) -> Result<Url> {
        let mut url = self.base.join(path).map_err(|e| SnoopError::Url {
            url: format!("{}{}", self.base, path),
            message: e.to_string(),
        })?;
        url.set_scheme(scheme).map_err(|_| SnoopError::Url {
            url: url.to_string(),
            message: format!("cannot switch to scheme '{}'", scheme),
        })?;
        Ok(url)
    }
}

impl std::fmt::Display for RegistryEndpoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.base)
    }
}
