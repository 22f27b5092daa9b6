// ABOUTME: Multi-document YAML parsing into resources.
// ABOUTME: Every document needs kind and metadata.name; namespaces default late.

use super::resource::{Resource, ResourceId};
use serde::Deserialize;
use serde_yaml::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to parse manifest YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("manifest document {index} has no kind")]
    MissingKind { index: usize },

    #[error("manifest document {index} ({kind}) has no metadata.name")]
    MissingName { index: usize, kind: String },
}

/// Parses one or more rendered manifest files into resources.
///
/// Documents that are empty or null (a file of only comments) are skipped.
pub fn parse_manifests(files: &[String]) -> Result<Vec<Resource>, ManifestError> {
    let mut resources = Vec::new();
    let mut index = 0;

    for file in files {
        for document in serde_yaml::Deserializer::from_str(file) {
            let value = Value::deserialize(document)?;
            if value.is_null() {
                continue;
            }

            let kind = value
                .get("kind")
                .and_then(Value::as_str)
                .ok_or(ManifestError::MissingKind { index })?
                .to_string();

            let name = value
                .get("metadata")
                .and_then(|m| m.get("name"))
                .and_then(Value::as_str)
                .ok_or_else(|| ManifestError::MissingName {
                    index,
                    kind: kind.clone(),
                })?
                .to_string();

            let namespace = value
                .get("metadata")
                .and_then(|m| m.get("namespace"))
                .and_then(Value::as_str)
                .map(str::to_string);

            let id = ResourceId {
                kind,
                name,
                namespace,
                versioned: false,
            };
            resources.push(Resource::new(id, value));
            index += 1;
        }
    }

    Ok(resources)
}

/// Fills in the task namespace on resources whose manifests omit one.
pub fn set_default_namespace(resources: &mut [Resource], namespace: &str) {
    for resource in resources {
        if resource.namespace().is_none() {
            resource.set_namespace(namespace);
        }
    }
}
