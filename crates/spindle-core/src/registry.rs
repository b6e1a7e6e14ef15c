//! Service registry contract.
//!
//! After the server starts accepting connections it announces itself to an
//! external service-discovery system through a [`Registry`]; during graceful
//! shutdown it withdraws that announcement again. The default
//! [`NoopRegistry`] does nothing.

use std::collections::HashMap;

use thiserror::Error;

use crate::BoxFuture;

/// Default weight announced for an instance.
pub const DEFAULT_WEIGHT: u32 = 10;

/// Errors reported by a registry client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The registry could not be reached.
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    /// The registry refused the instance.
    #[error("registration rejected: {0}")]
    Rejected(String),
}

/// Instance information announced to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    /// Logical service name.
    pub service_name: String,
    /// Address other services should dial.
    pub addr: String,
    /// Load-balancing weight.
    pub weight: u32,
    /// Free-form metadata.
    pub tags: HashMap<String, String>,
}

impl Info {
    /// Creates instance information with the default weight and no tags.
    pub fn new(service_name: impl Into<String>, addr: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            addr: addr.into(),
            weight: DEFAULT_WEIGHT,
            tags: HashMap::new(),
        }
    }

    /// Sets the weight.
    #[must_use]
    pub fn weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// A service-discovery client.
pub trait Registry: Send + Sync + 'static {
    /// Announces this instance.
    fn register<'a>(&'a self, info: Option<&'a Info>) -> BoxFuture<'a, Result<(), RegistryError>>;

    /// Withdraws this instance.
    fn deregister<'a>(&'a self, info: Option<&'a Info>)
        -> BoxFuture<'a, Result<(), RegistryError>>;
}

/// Registry that accepts every call and does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRegistry;

impl Registry for NoopRegistry {
    fn register<'a>(&'a self, _info: Option<&'a Info>) -> BoxFuture<'a, Result<(), RegistryError>> {
        Box::pin(async { Ok(()) })
    }

    fn deregister<'a>(
        &'a self,
        _info: Option<&'a Info>,
    ) -> BoxFuture<'a, Result<(), RegistryError>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_defaults() {
        let info = Info::new("users", "10.0.0.5:8888");
        assert_eq!(info.weight, DEFAULT_WEIGHT);
        assert!(info.tags.is_empty());
    }

    #[test]
    fn test_info_builder() {
        let info = Info::new("users", "10.0.0.5:8888")
            .weight(50)
            .tag("zone", "eu-1");
        assert_eq!(info.weight, 50);
        assert_eq!(info.tags.get("zone").map(String::as_str), Some("eu-1"));
    }

    #[test]
    fn test_registry_error_messages() {
        assert_eq!(
            RegistryError::Unavailable("consul down".into()).to_string(),
            "registry unavailable: consul down"
        );
        assert_eq!(
            RegistryError::Rejected("orders".into()).to_string(),
            "registration rejected: orders"
        );
    }

    #[tokio::test]
    async fn test_noop_registry() {
        let registry = NoopRegistry;
        let info = Info::new("users", "127.0.0.1:8888");
        assert!(registry.register(Some(&info)).await.is_ok());
        assert!(registry.deregister(None).await.is_ok());
    }
}
