//! Service descriptor: where and how to reach a registered service.

use crate::{Result, SnoopError};
use serde::{Deserialize, Serialize};
use url::Url;

/// Describes one registered service instance.
///
/// Treated as an immutable value: a registration or heartbeat replaces the
/// stored descriptor wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Unique key of the service instance.
    #[serde(rename = "serviceName")]
    pub identity: String,
    /// Base address, `host:port` with an optional scheme and trailing slash.
    #[serde(rename = "serviceHome")]
    pub home: String,
    /// API path relative to `home`.
    #[serde(rename = "serviceRoot")]
    pub root: String,
}

impl ServiceDescriptor {
    pub fn new(
        identity: impl Into<String>,
        home: impl Into<String>,
        root: impl Into<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            home: home.into(),
            root: root.into(),
        }
    }

    /// Check the fields a registry can key and route on.
    ///
    /// The identity becomes a path segment of the heartbeat address, so it
    /// must be non-empty, free of `/` and not a `.`/`..` dot segment. The
    /// home address must be non-empty.
    pub fn validate(&self) -> Result<()> {
        if self.identity.trim().is_empty() {
            return Err(SnoopError::InvalidDescriptor {
                field: "serviceName".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.identity.contains('/') {
            return Err(SnoopError::InvalidDescriptor {
                field: "serviceName".to_string(),
                message: format!("'{}' must not contain '/'", self.identity),
            });
        }
        if self.identity == "." || self.identity == ".." {
            return Err(SnoopError::InvalidDescriptor {
                field: "serviceName".to_string(),
                message: format!("'{}' is a dot segment", self.identity),
            });
        }
        if self.home.trim().is_empty() {
            return Err(SnoopError::InvalidDescriptor {
                field: "serviceHome".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Resolve `home` + `root` into the URL callers should target.
    ///
    /// A home without a scheme is treated as plain `http`.
    pub fn service_root(&self) -> Result<Url> {
        let home = if self.home.contains("://") {
            self.home.clone()
        } else {
            format!("http://{}", self.home)
        };
        let home = if home.ends_with('/') {
            home
        } else {
            format!("{}/", home)
        };

        let base = Url::parse(&home).map_err(|e| SnoopError::Url {
            url: home.clone(),
            message: e.to_string(),
        })?;
        base.join(self.root.trim_start_matches('/'))
            .map_err(|e| SnoopError::Url {
                url: format!("{}{}", home, self.root),
                message: e.to_string(),
            })
    }
}

impl std::fmt::Display for ServiceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @ {}{}", self.identity, self.home, self.root)
    }
}
