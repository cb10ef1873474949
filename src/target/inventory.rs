use super::{
    SelectBy, Selection, Target, TargetSelector, ANNOTATION_PORT, ANNOTATION_SERVICE,
    LABEL_NAMESPACE,
};
use anyhow::Context;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// One process as listed in an inventory file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct InventoryEntry {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub host_ip: String,
    #[serde(default)]
    pub namespace: Option<String>,
    /// Labels used for selection. They are not submitted with profiles.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl InventoryEntry {
    pub fn to_target(&self) -> Target {
        let mut target = Target::new(&self.name, &self.address, &self.host_ip);

        if let Some(namespace) = &self.namespace {
            target = target.with_label(LABEL_NAMESPACE, namespace);
        }

        if let Some(service) = self.annotations.get(ANNOTATION_SERVICE) {
            target = target.with_service_hint(service);
        }

        if let Some(port) = self.annotations.get(ANNOTATION_PORT) {
            match port.trim().parse::<u16>() {
                Ok(port) if port != 0 => target = target.with_port_hint(port),
                _ => log::warn!(
                    "[{}] ignoring invalid {} annotation {:?}",
                    self.name,
                    ANNOTATION_PORT,
                    port
                ),
            }
        }

        target
    }

    fn in_namespace(&self, namespace: Option<&str>) -> bool {
        match namespace {
            Some(ns) => self.namespace.as_deref() == Some(ns),
            None => true,
        }
    }
}

/// A static list of profiling targets, read from a JSON document of the form
/// `{"targets": [{"name": ..., "address": ..., ...}]}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Inventory {
    targets: Vec<InventoryEntry>,
}

impl Inventory {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read inventory {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("Invalid inventory {}", path.display()))
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl TargetSelector for Inventory {
    fn select(&self, selection: &Selection) -> anyhow::Result<Vec<Target>> {
        let namespace = selection.namespace.as_deref();
        let scoped = self.targets.iter().filter(|e| e.in_namespace(namespace));

        let matched: Vec<&InventoryEntry> = match &selection.by {
            SelectBy::Names(names) => {
                let mut found = Vec::with_capacity(names.len());
                for name in names {
                    let mut hits = scoped.clone().filter(|e| &e.name == name).peekable();
                    if hits.peek().is_none() {
                        log::warn!("Target {} not found, skipping", name);
                        continue;
                    }
                    found.extend(hits);
                }
                found
            }
            SelectBy::Labels(selector) => scoped.filter(|e| selector.matches(&e.labels)).collect(),
        };

        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(matched.len());
        for entry in matched {
            if !seen.insert(entry.name.as_str()) {
                log::debug!("Target {} selected more than once, keeping the first", entry.name);
                continue;
            }
            targets.push(entry.to_target());
        }

        Ok(targets)
    }
}
