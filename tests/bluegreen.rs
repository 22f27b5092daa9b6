// ABOUTME: Integration tests for the blue/green controller, selector swap and stage scale-down.
// ABOUTME: Covers service resolution, color assignment, stale stage cleanup and swap detection.

mod support;

use pidalio::deploy::{BlueGreenDeploy, BlueGreenRequest, DeployError, SwapServiceSelectors};
use pidalio::manifest::ResourceId;
use pidalio::release::{LegacyReleaseHandler, ReleaseStatus};
use pidalio::types::Color;
use support::{Call, FakeCluster, MemoryLegacyStore};

const MANIFESTS: &str = r"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  replicas: 2
  selector:
    matchLabels:
      app: web
  template:
    metadata:
      labels:
        app: web
---
apiVersion: v1
kind: Service
metadata:
  name: web-svc
spec:
  selector:
    app: web
";

fn request(manifests: &str) -> BlueGreenRequest {
    BlueGreenRequest {
        release_name: support::release_name("my-app"),
        manifests: vec![manifests.to_string()],
        skip_dry_run: false,
        skip_versioning: false,
    }
}

#[tokio::test]
async fn first_deploy_stages_blue_against_default_green_primary() {
    let cluster = FakeCluster::new();
    let store = MemoryLegacyStore::new();
    let handler = LegacyReleaseHandler::new(store.clone());
    let deploy = BlueGreenDeploy::new(&cluster, &handler);

    let outcome = deploy
        .run(request(MANIFESTS), &support::params())
        .await
        .expect("blue/green deploy should succeed");

    assert_eq!(outcome.primary_color, Color::Green);
    assert_eq!(outcome.stage_color, Color::Blue);
    assert_eq!(outcome.primary_service, "web-svc");
    assert_eq!(outcome.stage_service, "web-svc-stage");
    assert_eq!(outcome.workload.name, "web-blue");

    // Colored workload plus both services go to the cluster.
    let applied = cluster.applied();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].len(), 3);
    assert!(applied[0].iter().any(|id| id.name == "web-blue"));
    assert!(applied[0].iter().any(|id| id.name == "web-svc"));
    assert!(applied[0].iter().any(|id| id.name == "web-svc-stage"));

    let stored = store.stored().expect("history persisted");
    let latest = stored.latest().expect("release");
    assert_eq!(latest.status, ReleaseStatus::Succeeded);
    assert_eq!(latest.color, Some(Color::Blue));
}

#[tokio::test]
async fn live_primary_color_inverts_the_stage() {
    let cluster = FakeCluster::new().with_service("web-svc", Some(Color::Blue));
    let store = MemoryLegacyStore::new();
    let handler = LegacyReleaseHandler::new(store.clone());
    let deploy = BlueGreenDeploy::new(&cluster, &handler);

    let outcome = deploy
        .run(request(MANIFESTS), &support::params())
        .await
        .expect("blue/green deploy should succeed");

    assert_eq!(outcome.primary_color, Color::Blue);
    assert_eq!(outcome.stage_color, Color::Green);
    assert_eq!(outcome.workload.name, "web-green");
}

#[tokio::test]
async fn live_primary_without_color_label_conflicts() {
    let cluster = FakeCluster::new().with_service("web-svc", None);
    let store = MemoryLegacyStore::new();
    let handler = LegacyReleaseHandler::new(store.clone());
    let deploy = BlueGreenDeploy::new(&cluster, &handler);

    let error = deploy
        .run(request(MANIFESTS), &support::params())
        .await
        .expect_err("conflicting service should fail");
    assert!(matches!(error, DeployError::ConflictingService { name } if name == "web-svc"));
}

#[tokio::test]
async fn manifests_without_a_service_fail() {
    let cluster = FakeCluster::new();
    let store = MemoryLegacyStore::new();
    let handler = LegacyReleaseHandler::new(store.clone());
    let deploy = BlueGreenDeploy::new(&cluster, &handler);

    let manifests = "kind: Deployment\nmetadata:\n  name: web\n";
    let error = deploy
        .run(request(manifests), &support::params())
        .await
        .expect_err("no service should fail");
    assert!(matches!(error, DeployError::NoServiceFound));
}

#[tokio::test]
async fn two_plain_services_are_ambiguous() {
    let cluster = FakeCluster::new();
    let store = MemoryLegacyStore::new();
    let handler = LegacyReleaseHandler::new(store.clone());
    let deploy = BlueGreenDeploy::new(&cluster, &handler);

    let manifests = r"
kind: Deployment
metadata:
  name: web
---
kind: Service
metadata:
  name: svc-a
---
kind: Service
metadata:
  name: svc-b
";
    let error = deploy
        .run(request(manifests), &support::params())
        .await
        .expect_err("two unannotated services should fail");
    assert!(matches!(
        error,
        DeployError::AmbiguousPrimaryService { count: 2 }
    ));
}

#[tokio::test]
async fn annotated_services_skip_the_generated_stage_clone() {
    let cluster = FakeCluster::new();
    let store = MemoryLegacyStore::new();
    let handler = LegacyReleaseHandler::new(store.clone());
    let deploy = BlueGreenDeploy::new(&cluster, &handler);

    let manifests = r"
kind: Deployment
metadata:
  name: web
---
kind: Service
metadata:
  name: front
  annotations:
    pidalio.io/primary-service: 'true'
---
kind: Service
metadata:
  name: preview
  annotations:
    pidalio.io/stage-service: 'true'
";
    let outcome = deploy
        .run(request(manifests), &support::params())
        .await
        .expect("blue/green deploy should succeed");

    assert_eq!(outcome.primary_service, "front");
    assert_eq!(outcome.stage_service, "preview");
    let applied = cluster.applied();
    assert!(!applied[0].iter().any(|id| id.name.ends_with("-stage")));
}

#[tokio::test]
async fn multiple_eligible_workloads_fail() {
    let cluster = FakeCluster::new();
    let store = MemoryLegacyStore::new();
    let handler = LegacyReleaseHandler::new(store.clone());
    let deploy = BlueGreenDeploy::new(&cluster, &handler);

    let manifests = r"
kind: Deployment
metadata:
  name: web
---
kind: StatefulSet
metadata:
  name: db
---
kind: Service
metadata:
  name: web-svc
";
    let error = deploy
        .run(request(manifests), &support::params())
        .await
        .expect_err("two eligible workloads should fail");
    assert!(matches!(error, DeployError::MultipleWorkloads { count: 2, .. }));
}

#[tokio::test]
async fn old_stage_releases_are_swept_before_deploying() {
    let cluster = FakeCluster::new();
    let store = MemoryLegacyStore::new();

    let mut stale = support::release(1, ReleaseStatus::Succeeded);
    stale.color = Some(Color::Blue);
    let mut versioned = ResourceId::new("ConfigMap", "web-config-1", Some("default"));
    versioned.versioned = true;
    stale.resource_ids = vec![versioned.clone()];
    store.seed(&support::history_of(vec![stale]));

    let handler = LegacyReleaseHandler::new(store.clone());
    let deploy = BlueGreenDeploy::new(&cluster, &handler);

    // No live primary service, so the new stage is blue as well.
    let outcome = deploy
        .run(request(MANIFESTS), &support::params())
        .await
        .expect("blue/green deploy should succeed");

    assert_eq!(outcome.release_number, 2);
    assert!(cluster
        .calls()
        .iter()
        .any(|c| matches!(c, Call::Delete(ids) if ids.contains(&versioned))));

    let stored = store.stored().expect("history persisted");
    assert_eq!(stored.releases().len(), 1);
    assert_eq!(stored.latest().expect("release").number, 2);
}

#[tokio::test]
async fn swap_exchanges_service_selectors() {
    let cluster = FakeCluster::new()
        .with_service("web-svc", Some(Color::Blue))
        .with_service("web-svc-stage", Some(Color::Green));
    let swap = SwapServiceSelectors::new(&cluster);

    let outcome = swap
        .run("web-svc", "web-svc-stage", &support::params())
        .await
        .expect("swap should succeed");

    assert_eq!(outcome.primary_color, Color::Green);
    assert_eq!(outcome.stage_color, Color::Blue);

    let patches = cluster
        .calls()
        .iter()
        .filter(|c| matches!(c, Call::PatchSelector { .. }))
        .count();
    assert_eq!(patches, 2);

    let services = cluster.services.lock();
    assert_eq!(
        services.get("web-svc").expect("primary").color_selector(),
        Some("green")
    );
    assert_eq!(
        services.get("web-svc-stage").expect("stage").color_selector(),
        Some("blue")
    );
}

#[tokio::test]
async fn scale_down_skips_when_no_swap_happened() {
    // Last release staged blue, primary still serves green: no swap yet.
    let cluster = FakeCluster::new().with_service("web-svc", Some(Color::Green));
    let store = MemoryLegacyStore::new();
    let mut release = support::release(2, ReleaseStatus::Succeeded);
    release.color = Some(Color::Blue);
    store.seed(&support::history_of(vec![release]));
    let handler = LegacyReleaseHandler::new(store.clone());
    let deploy = BlueGreenDeploy::new(&cluster, &handler);

    let outcome = deploy
        .scale_down_stage(&support::release_name("my-app"), "web-svc", &support::params())
        .await
        .expect("scale down should succeed");

    assert_eq!(outcome.color, None);
    assert!(outcome.scaled.is_empty());
    assert!(!cluster.calls().iter().any(|c| matches!(c, Call::Scale { .. })));
}

#[tokio::test]
async fn scale_down_after_swap_scales_workloads_and_deletes_autoscalers() {
    // Release 2 staged blue and the primary now serves blue: green is idle.
    let cluster = FakeCluster::new().with_service("web-svc", Some(Color::Blue));
    let store = MemoryLegacyStore::new();

    let mut green_release = support::release(1, ReleaseStatus::Succeeded);
    green_release.color = Some(Color::Green);
    green_release.resource_ids = vec![
        ResourceId::new("Deployment", "web-green", Some("default")),
        ResourceId::new("HorizontalPodAutoscaler", "web-hpa-green", Some("default")),
    ];
    let mut blue_release = support::release(2, ReleaseStatus::Succeeded);
    blue_release.color = Some(Color::Blue);
    blue_release.resource_ids = vec![ResourceId::new("Deployment", "web-blue", Some("default"))];
    store.seed(&support::history_of(vec![green_release, blue_release]));

    let handler = LegacyReleaseHandler::new(store.clone());
    let deploy = BlueGreenDeploy::new(&cluster, &handler);

    let outcome = deploy
        .scale_down_stage(&support::release_name("my-app"), "web-svc", &support::params())
        .await
        .expect("scale down should succeed");

    assert_eq!(outcome.color, Some(Color::Green));
    assert_eq!(outcome.scaled.len(), 1);
    assert_eq!(outcome.scaled[0].name, "web-green");
    assert_eq!(outcome.deleted.len(), 1);
    assert_eq!(outcome.deleted[0].name, "web-hpa-green");

    assert!(cluster
        .calls()
        .iter()
        .any(|c| matches!(c, Call::Scale { workload, replicas: 0 } if workload.name == "web-green")));
}
