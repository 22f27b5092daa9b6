// ABOUTME: Pre-apply manifest transforms: versioning, release labels, colors, canary clones.
// ABOUTME: Every transform derives new resources from the rendered originals, never mutates them.

use super::resource::Resource;
use crate::types::{labels, Color, ReleaseName, Track};
use serde_yaml::Value;

const TEMPLATE_LABELS: [&str; 4] = ["spec", "template", "metadata", "labels"];

/// Versions ConfigMaps and Secrets by suffixing the release number onto their
/// names. Skipped wholesale when the request disables versioning, and per
/// resource via the skip-versioning annotation.
pub fn version_resources(
    resources: &[Resource],
    release_number: u64,
    skip_versioning: bool,
) -> Vec<Resource> {
    resources
        .iter()
        .map(|resource| {
            let versionable = matches!(resource.kind(), "ConfigMap" | "Secret");
            if skip_versioning
                || !versionable
                || resource.annotation_flag(labels::SKIP_VERSIONING)
            {
                return resource.clone();
            }
            let mut versioned = resource.clone();
            versioned.rename(&format!("{}-{}", resource.name(), release_number));
            versioned.id.versioned = true;
            versioned
        })
        .collect()
}

/// Stamps the release name and number onto every managed workload's pod
/// template so pods can be listed per release.
pub fn stamp_release_labels(
    resources: &[Resource],
    release_name: &ReleaseName,
    release_number: u64,
) -> Vec<Resource> {
    resources
        .iter()
        .map(|resource| {
            if !super::workloads::is_managed_workload(resource) {
                return resource.clone();
            }
            let mut stamped = resource.clone();
            stamped.insert_at(&TEMPLATE_LABELS, labels::RELEASE_NAME, release_name.as_str());
            stamped.insert_at(
                &TEMPLATE_LABELS,
                labels::RELEASE_NUMBER,
                &release_number.to_string(),
            );
            stamped
        })
        .collect()
}

/// Stamps the stable track onto managed workloads rolled out through a
/// canary workflow, so stable pods can be listed apart from canary ones.
pub fn stamp_stable_track(resources: &[Resource]) -> Vec<Resource> {
    resources
        .iter()
        .map(|resource| {
            if !super::workloads::is_managed_workload(resource) {
                return resource.clone();
            }
            let mut stamped = resource.clone();
            stamped.insert_at(&TEMPLATE_LABELS, labels::TRACK, Track::Stable.as_str());
            stamped.insert_at(
                &selector_labels_path(resource),
                labels::TRACK,
                Track::Stable.as_str(),
            );
            stamped
        })
        .collect()
}

/// Derives the stage workload for a blue/green rollout: renamed with the
/// stage color suffix, color label in pod template and selector.
pub fn color_workload(workload: &Resource, stage: Color) -> Resource {
    let mut colored = workload.clone();
    colored.rename(&format!("{}{}", workload.name(), stage.suffix()));
    colored.insert_at(&TEMPLATE_LABELS, labels::COLOR, stage.as_str());
    colored.insert_at(&selector_labels_path(workload), labels::COLOR, stage.as_str());
    colored
}

/// Stamps a color onto a service's pod selector.
pub fn color_service(service: &Resource, color: Color) -> Resource {
    let mut colored = service.clone();
    colored.insert_at(&["spec", "selector"], labels::COLOR, color.as_str());
    colored
}

/// Clones the primary service into the stage service with the `-stage` suffix.
pub fn stage_service_from_primary(primary: &Resource) -> Resource {
    let mut stage = primary.clone();
    stage.rename(&format!("{}{}", primary.name(), labels::STAGE_SERVICE_SUFFIX));
    stage
}

/// Derives the canary workload: renamed with the `-canary` suffix, scaled to
/// the target instance count, track label in pod template and selector.
pub fn canary_workload(workload: &Resource, target_instances: u32) -> Resource {
    let mut canary = workload.clone();
    canary.rename(&format!("{}{}", workload.name(), labels::CANARY_SUFFIX));
    canary.set_field(
        &["spec", "replicas"],
        Value::Number(u64::from(target_instances).into()),
    );
    canary.insert_at(&TEMPLATE_LABELS, labels::TRACK, Track::Canary.as_str());
    canary.insert_at(
        &selector_labels_path(workload),
        labels::TRACK,
        Track::Canary.as_str(),
    );
    canary
}

pub fn replicas(resource: &Resource) -> Option<u32> {
    resource
        .field(&["spec", "replicas"])
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
}

pub fn set_replicas(resource: &Resource, count: u32) -> Resource {
    let mut scaled = resource.clone();
    scaled.set_field(&["spec", "replicas"], Value::Number(u64::from(count).into()));
    scaled
}

// DeploymentConfig selectors are a plain label map, apps/v1 kinds use matchLabels.
fn selector_labels_path(workload: &Resource) -> Vec<&'static str> {
    if workload.kind() == "DeploymentConfig" {
        vec!["spec", "selector"]
    } else {
        vec!["spec", "selector", "matchLabels"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::parse_manifests;

    fn parse_one(yaml: &str) -> Resource {
        parse_manifests(&[yaml.to_string()])
            .unwrap()
            .into_iter()
            .next()
            .unwrap()
    }

    fn web_deployment() -> Resource {
        parse_one(
            r"
kind: Deployment
metadata:
  name: web
spec:
  replicas: 4
  selector:
    matchLabels:
      app: web
  template:
    metadata:
      labels:
        app: web
",
        )
    }

    #[test]
    fn versions_configmaps_and_secrets_only() {
        let resources = parse_manifests(&[
            "kind: ConfigMap\nmetadata:\n  name: cfg\n---\nkind: Secret\nmetadata:\n  name: creds\n---\nkind: Service\nmetadata:\n  name: svc\n".to_string(),
        ])
        .unwrap();

        let versioned = version_resources(&resources, 3, false);
        assert_eq!(versioned[0].name(), "cfg-3");
        assert!(versioned[0].id.versioned);
        assert_eq!(versioned[1].name(), "creds-3");
        assert!(versioned[1].id.versioned);
        assert_eq!(versioned[2].name(), "svc");
        assert!(!versioned[2].id.versioned);
    }

    #[test]
    fn skip_versioning_annotation_wins() {
        let resources = parse_manifests(&[
            "kind: ConfigMap\nmetadata:\n  name: cfg\n  annotations:\n    pidalio.io/skip-versioning: 'true'\n".to_string(),
        ])
        .unwrap();
        let versioned = version_resources(&resources, 7, false);
        assert_eq!(versioned[0].name(), "cfg");
        assert!(!versioned[0].id.versioned);
    }

    #[test]
    fn versioning_never_mutates_the_input() {
        let resources =
            parse_manifests(&["kind: Secret\nmetadata:\n  name: creds\n".to_string()]).unwrap();
        let _ = version_resources(&resources, 2, false);
        assert_eq!(resources[0].name(), "creds");
    }

    #[test]
    fn stamps_release_labels_on_workloads_only() {
        let name = ReleaseName::new("my-app").unwrap();
        let resources = vec![
            web_deployment(),
            parse_one("kind: ConfigMap\nmetadata:\n  name: cfg\n"),
        ];
        let stamped = stamp_release_labels(&resources, &name, 5);

        assert_eq!(
            stamped[0].field_str(&["spec", "template", "metadata", "labels", labels::RELEASE_NAME]),
            Some("my-app")
        );
        assert_eq!(
            stamped[0].field_str(&["spec", "template", "metadata", "labels", labels::RELEASE_NUMBER]),
            Some("5")
        );
        assert!(stamped[1]
            .field(&["spec", "template", "metadata", "labels"])
            .is_none());
    }

    #[test]
    fn stable_track_lands_on_workloads_only() {
        let resources = vec![
            web_deployment(),
            parse_one("kind: ConfigMap\nmetadata:\n  name: cfg\n"),
        ];
        let stamped = stamp_stable_track(&resources);

        assert_eq!(
            stamped[0].field_str(&["spec", "template", "metadata", "labels", labels::TRACK]),
            Some("stable")
        );
        assert_eq!(
            stamped[0].field_str(&["spec", "selector", "matchLabels", labels::TRACK]),
            Some("stable")
        );
        assert!(stamped[1].field(&["spec", "template"]).is_none());
    }

    #[test]
    fn color_workload_renames_and_labels() {
        let colored = color_workload(&web_deployment(), Color::Blue);
        assert_eq!(colored.name(), "web-blue");
        assert_eq!(
            colored.field_str(&["spec", "template", "metadata", "labels", labels::COLOR]),
            Some("blue")
        );
        assert_eq!(
            colored.field_str(&["spec", "selector", "matchLabels", labels::COLOR]),
            Some("blue")
        );
    }

    #[test]
    fn deploymentconfig_selector_is_a_plain_map() {
        let dc = parse_one(
            "kind: DeploymentConfig\nmetadata:\n  name: web\nspec:\n  selector:\n    app: web\n",
        );
        let colored = color_workload(&dc, Color::Green);
        assert_eq!(
            colored.field_str(&["spec", "selector", labels::COLOR]),
            Some("green")
        );
    }

    #[test]
    fn stage_service_is_a_renamed_clone() {
        let primary = parse_one(
            "kind: Service\nmetadata:\n  name: web-svc\nspec:\n  selector:\n    app: web\n",
        );
        let stage = stage_service_from_primary(&primary);
        assert_eq!(stage.name(), "web-svc-stage");
        assert_eq!(stage.field_str(&["spec", "selector", "app"]), Some("web"));
        assert_eq!(primary.name(), "web-svc");
    }

    #[test]
    fn canary_workload_scales_and_tracks() {
        let canary = canary_workload(&web_deployment(), 1);
        assert_eq!(canary.name(), "web-canary");
        assert_eq!(replicas(&canary), Some(1));
        assert_eq!(
            canary.field_str(&["spec", "template", "metadata", "labels", labels::TRACK]),
            Some("canary")
        );
        assert_eq!(
            canary.field_str(&["spec", "selector", "matchLabels", labels::TRACK]),
            Some("canary")
        );
    }

    #[test]
    fn replica_edits_copy() {
        let original = web_deployment();
        let scaled = set_replicas(&original, 9);
        assert_eq!(replicas(&scaled), Some(9));
        assert_eq!(replicas(&original), Some(4));
    }
}
