// ABOUTME: Resource identity and the parsed manifest body behind it.
// ABOUTME: ResourceId is the persisted identity; Resource adds the full YAML mapping.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResourceRefError {
    #[error("invalid resource reference '{0}', expected Kind/name")]
    InvalidFormat(String),
}

/// Identity of a Kubernetes object as tracked in release history.
///
/// `versioned` marks ConfigMaps/Secrets whose name carries a release-number
/// suffix; versioned resources are never pruned and are deleted when the
/// release that produced them is swept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub versioned: bool,
}

impl ResourceId {
    pub fn new(kind: &str, name: &str, namespace: Option<&str>) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
            versioned: false,
        }
    }

    /// Parses a `Kind/name` reference, e.g. from a scale or delete request.
    pub fn from_ref(reference: &str, namespace: &str) -> Result<Self, ResourceRefError> {
        let mut parts = reference.splitn(2, '/');
        let kind = parts.next().unwrap_or_default().trim();
        let name = parts.next().unwrap_or_default().trim();
        if kind.is_empty() || name.is_empty() {
            return Err(ResourceRefError::InvalidFormat(reference.to_string()));
        }
        Ok(Self::new(kind, name, Some(namespace)))
    }

    /// The `Kind/name` reference used in logs and port calls.
    pub fn kind_name(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }

    /// True when identity matches ignoring the versioned marker.
    pub fn same_object(&self, other: &ResourceId) -> bool {
        self.kind == other.kind && self.name == other.name && self.namespace == other.namespace
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", ns, self.kind, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// A parsed manifest document together with its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub spec: Value,
}

impl Resource {
    pub fn new(id: ResourceId, spec: Value) -> Self {
        Self { id, spec }
    }

    pub fn kind(&self) -> &str {
        &self.id.kind
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.id.namespace.as_deref()
    }

    pub fn field(&self, path: &[&str]) -> Option<&Value> {
        let mut current = &self.spec;
        for part in path {
            current = current.get(*part)?;
        }
        Some(current)
    }

    pub fn field_str(&self, path: &[&str]) -> Option<&str> {
        self.field(path).and_then(Value::as_str)
    }

    pub fn set_field(&mut self, path: &[&str], value: Value) {
        *path_mut(&mut self.spec, path) = value;
    }

    /// Merges `key: value` into the mapping at `path`, creating it if absent.
    pub fn insert_at(&mut self, path: &[&str], key: &str, value: &str) {
        let target = path_mut(&mut self.spec, path);
        if !target.is_mapping() {
            *target = Value::Mapping(Mapping::new());
        }
        if let Value::Mapping(map) = target {
            map.insert(
                Value::String(key.to_string()),
                Value::String(value.to_string()),
            );
        }
    }

    pub fn annotation(&self, key: &str) -> Option<&Value> {
        self.field(&["metadata", "annotations", key])
    }

    /// True when the annotation is present with a truthy value.
    pub fn annotation_flag(&self, key: &str) -> bool {
        match self.annotation(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// Renames the resource, keeping identity and manifest in sync.
    pub fn rename(&mut self, name: &str) {
        self.id.name = name.to_string();
        self.set_field(&["metadata", "name"], Value::String(name.to_string()));
    }

    pub fn set_namespace(&mut self, namespace: &str) {
        self.id.namespace = Some(namespace.to_string());
        self.set_field(
            &["metadata", "namespace"],
            Value::String(namespace.to_string()),
        );
    }
}

fn path_mut<'a>(root: &'a mut Value, path: &[&str]) -> &'a mut Value {
    let mut current = root;
    for part in path {
        if !current.is_mapping() {
            *current = Value::Mapping(Mapping::new());
        }
        current = match current {
            Value::Mapping(map) => map
                .entry(Value::String((*part).to_string()))
                .or_insert(Value::Null),
            // made a mapping just above
            _ => unreachable!(),
        };
    }
    current
}
