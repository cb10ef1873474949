mod inventory;
mod selector;

use std::collections::BTreeMap;

pub use inventory::{Inventory, InventoryEntry};
pub use selector::{LabelSelector, SelectBy, Selection, TargetSelector};

/// Annotation naming the service a target's profiles are stored under.
pub const ANNOTATION_SERVICE: &str = "profefe.com/service";
/// Annotation overriding the port the pprof endpoints listen on.
pub const ANNOTATION_PORT: &str = "profefe.com/port";

pub const LABEL_SOURCE: &str = "source";
pub const LABEL_NAMESPACE: &str = "namespace";
pub const LABEL_POD: &str = "pod";

/// Value of the `source` label on everything this tool submits.
pub const SOURCE: &str = "evcollect";

/// A process to collect profiles from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub id: String,
    pub address: String,
    pub instance_id: String,
    pub labels: BTreeMap<String, String>,
    pub service_hint: Option<String>,
    pub port_hint: Option<u16>,
}

impl Target {
    pub fn new(
        id: impl Into<String>,
        address: impl Into<String>,
        instance_id: impl Into<String>,
    ) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert(LABEL_SOURCE.to_string(), SOURCE.to_string());

        Self {
            id: id.into(),
            address: address.into(),
            instance_id: instance_id.into(),
            labels,
            service_hint: None,
            port_hint: None,
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Blank hints are ignored.
    pub fn with_service_hint(mut self, service: impl Into<String>) -> Self {
        let service = service.into();
        self.service_hint = if service.trim().is_empty() {
            None
        } else {
            Some(service)
        };
        self
    }

    pub fn with_port_hint(mut self, port: u16) -> Self {
        self.port_hint = Some(port);
        self
    }

    /// The service name profiles are stored under.
    pub fn service_name(&self) -> &str {
        self.service_hint.as_deref().unwrap_or(&self.id)
    }

    pub fn profiling_port(&self, default: u16) -> u16 {
        self.port_hint.unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_target_carries_source_label() {
        let target = Target::new("checkout-7f9", "10.0.0.12", "192.168.1.4");
        assert_eq!(target.labels.get(LABEL_SOURCE).map(String::as_str), Some(SOURCE));
        assert_eq!(target.service_name(), "checkout-7f9");
        assert_eq!(target.profiling_port(6060), 6060);
    }

    #[test]
    fn test_hints() {
        let target = Target::new("checkout-7f9", "10.0.0.12", "192.168.1.4")
            .with_service_hint("checkout")
            .with_port_hint(8080);
        assert_eq!(target.service_name(), "checkout");
        assert_eq!(target.profiling_port(6060), 8080);

        let blank = Target::new("checkout-7f9", "10.0.0.12", "").with_service_hint("  ");
        assert_eq!(blank.service_hint, None);
        assert_eq!(blank.service_name(), "checkout-7f9");
    }
}
