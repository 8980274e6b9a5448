//! Agent configuration.
//!
//! The agent does not read files, environment variables or properties. A
//! collaborator (the `snoop-agent` binary, or the host application) fills in
//! an [`AgentConfig`] and the agent resolves it once at startup.

use snoop_core::{ClientConfig, RegistryEndpoints, Result, ServiceDescriptor, SnoopError};
use std::time::Duration;

/// Settings handed to the heartbeat agent before it starts.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Whether this process takes part in the registry at all.
    pub enabled: bool,
    /// Base URL of the registry service.
    pub registry_url: String,
    pub identity: Option<String>,
    pub home: Option<String>,
    pub root: Option<String>,
    pub heartbeat_period: Duration,
}

/// A configuration that passed validation.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub descriptor: ServiceDescriptor,
    pub endpoints: RegistryEndpoints,
    pub heartbeat_period: Duration,
}

impl AgentConfig {
    /// An enabled configuration with no descriptor fields set yet.
    pub fn new(registry_url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            registry_url: registry_url.into(),
            identity: None,
            home: None,
            root: None,
            heartbeat_period: ClientConfig::HEARTBEAT_PERIOD,
        }
    }

    /// An enabled configuration for an already built descriptor.
    pub fn for_descriptor(registry_url: impl Into<String>, descriptor: ServiceDescriptor) -> Self {
        Self::new(registry_url)
            .identity(descriptor.identity)
            .home(descriptor.home)
            .root(descriptor.root)
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn home(mut self, home: impl Into<String>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn heartbeat_period(mut self, period: Duration) -> Self {
        self.heartbeat_period = period;
        self
    }

    /// Validate the settings and build the descriptor and registry addresses.
    ///
    /// Every failure is a [`SnoopError::Config`].
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let identity = required("serviceName", &self.identity)?;
        let home = required("serviceHome", &self.home)?;
        let root = self
            .root
            .clone()
            .ok_or_else(|| SnoopError::config("serviceRoot must be configured"))?;

        let descriptor = ServiceDescriptor::new(identity, home, root);
        descriptor
            .validate()
            .map_err(|e| SnoopError::config(e.to_string()))?;

        let endpoints = RegistryEndpoints::parse(&self.registry_url)
            .map_err(|e| SnoopError::config(format!("registry URL: {}", e)))?;

        if self.heartbeat_period.is_zero() {
            return Err(SnoopError::config("heartbeat period must be positive"));
        }

        Ok(ResolvedConfig {
            descriptor,
            endpoints,
            heartbeat_period: self.heartbeat_period,
        })
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::new(ClientConfig::DEFAULT_REGISTRY_URL)
    }
}

fn required(field: &str, value: &Option<String>) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.clone()),
        _ => Err(SnoopError::config(format!("{} must be configured", field))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> AgentConfig {
        AgentConfig::new("http://localhost:8080/")
            .identity("svc-a")
            .home("10.0.0.1:8080")
            .root("api/")
    }

    #[test]
    fn test_resolve_complete_config() {
        let resolved = complete().resolve().unwrap();

        assert_eq!(
            resolved.descriptor,
            ServiceDescriptor::new("svc-a", "10.0.0.1:8080", "api/")
        );
        assert_eq!(resolved.heartbeat_period, Duration::from_secs(10));
        assert_eq!(
            resolved.endpoints.heartbeat("svc-a").unwrap().as_str(),
            "ws://localhost:8080/snoopstatus/svc-a"
        );
    }

    #[test]
    fn test_missing_identity_is_config_error() {
        let config = AgentConfig::new("http://localhost:8080/")
            .home("10.0.0.1:8080")
            .root("api/");
        match config.resolve() {
            Err(SnoopError::Config { message }) => assert!(message.contains("serviceName")),
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    #[test]
    fn test_blank_home_is_config_error() {
        let config = complete().home("  ");
        assert!(matches!(config.resolve(), Err(SnoopError::Config { .. })));
    }

    #[test]
    fn test_dot_segment_identity_is_config_error() {
        let config = complete().identity("..");
        assert!(matches!(config.resolve(), Err(SnoopError::Config { .. })));
    }

    #[test]
    fn test_missing_root_is_config_error() {
        let mut config = complete();
        config.root = None;
        assert!(matches!(config.resolve(), Err(SnoopError::Config { .. })));
    }

    #[test]
    fn test_empty_root_is_allowed() {
        assert!(complete().root("").resolve().is_ok());
    }

    #[test]
    fn test_bad_registry_url_is_config_error() {
        let mut config = complete();
        config.registry_url = "localhost:8080".to_string();
        assert!(matches!(config.resolve(), Err(SnoopError::Config { .. })));
    }

    #[test]
    fn test_zero_period_is_config_error() {
        let config = complete().heartbeat_period(Duration::ZERO);
        assert!(matches!(config.resolve(), Err(SnoopError::Config { .. })));
    }
}
