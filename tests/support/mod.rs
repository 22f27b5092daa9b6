// ABOUTME: In-memory fakes of the cluster and store ports, with call recording.
// ABOUTME: Shared fixtures and builders for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use pidalio::manifest::{parse_manifests, Resource, ResourceId};
use pidalio::ports::{
    ApplyOps, ClusterError, DeleteOps, LegacyReleaseStore, PodInfo, PodOps, ReleaseObjectStore,
    ServiceInfo, ServiceOps, StoreError, TaskParams, WorkloadOps,
};
use pidalio::release::{Release, ReleaseHistory, ReleaseStatus};
use pidalio::types::{Color, ReleaseName, Track};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

pub fn params() -> TaskParams {
    TaskParams::new("default", Duration::from_secs(300))
}

pub fn release_name(name: &str) -> ReleaseName {
    ReleaseName::new(name).expect("valid release name")
}

pub fn release(number: u64, status: ReleaseStatus) -> Release {
    let mut release = Release::new(number);
    release.status = status;
    release
}

pub fn history_of(releases: Vec<Release>) -> ReleaseHistory {
    let mut history = ReleaseHistory::new();
    for release in releases {
        history.add(release).expect("monotonic release numbers");
    }
    history
}

pub fn resources(yaml: &str) -> Vec<Resource> {
    parse_manifests(&[yaml.to_string()]).expect("valid manifest fixture")
}

pub fn pod(name: &str) -> PodInfo {
    PodInfo {
        name: name.to_string(),
        namespace: "default".to_string(),
        ip: None,
        new_pod: false,
    }
}

/// What the fake cluster was asked to do, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Apply(Vec<ResourceId>),
    DryRun(Vec<ResourceId>),
    Delete(Vec<ResourceId>),
    DeletePartial(Vec<ResourceId>),
    StatusCheck(Vec<ResourceId>),
    StatusCheckCustom(Vec<ResourceId>),
    RolloutUndo {
        workload: ResourceId,
        revision: Option<String>,
    },
    Scale {
        workload: ResourceId,
        replicas: u32,
    },
    PatchSelector {
        service: String,
        selector: BTreeMap<String, String>,
    },
}

pub struct FakeCluster {
    pub calls: Mutex<Vec<Call>>,
    pub services: Mutex<BTreeMap<String, ServiceInfo>>,
    pub replicas: Mutex<BTreeMap<String, u32>>,
    pub revisions: Mutex<BTreeMap<String, String>>,
    pub direct_apply: Mutex<BTreeSet<String>>,
    /// Default pod answer, and per-call overrides popped front first.
    pub pods: Mutex<Vec<PodInfo>>,
    pub pod_queue: Mutex<Vec<Vec<PodInfo>>>,
    pub fail_apply: Mutex<bool>,
    pub fail_dry_run: Mutex<bool>,
    pub steady: Mutex<bool>,
    pub custom_steady: Mutex<bool>,
}

impl Default for FakeCluster {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            services: Mutex::new(BTreeMap::new()),
            replicas: Mutex::new(BTreeMap::new()),
            revisions: Mutex::new(BTreeMap::new()),
            direct_apply: Mutex::new(BTreeSet::new()),
            pods: Mutex::new(Vec::new()),
            pod_queue: Mutex::new(Vec::new()),
            fail_apply: Mutex::new(false),
            fail_dry_run: Mutex::new(false),
            steady: Mutex::new(true),
            custom_steady: Mutex::new(true),
        }
    }
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(self, name: &str, color: Option<Color>) -> Self {
        let mut selector = BTreeMap::new();
        selector.insert("app".to_string(), "web".to_string());
        if let Some(color) = color {
            selector.insert("pidalio.io/color".to_string(), color.as_str().to_string());
        }
        self.services.lock().insert(
            name.to_string(),
            ServiceInfo {
                name: name.to_string(),
                namespace: "default".to_string(),
                selector,
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn applied(&self) -> Vec<Vec<ResourceId>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Apply(ids) => Some(ids),
                _ => None,
            })
            .collect()
    }

    pub fn undo_calls(&self) -> Vec<(ResourceId, Option<String>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::RolloutUndo { workload, revision } => Some((workload, revision)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn next_pods(&self) -> Vec<PodInfo> {
        let mut queue = self.pod_queue.lock();
        if queue.is_empty() {
            self.pods.lock().clone()
        } else {
            queue.remove(0)
        }
    }

    fn command_failed(command: &str) -> ClusterError {
        ClusterError::CommandFailed {
            command: command.to_string(),
            exit_code: 1,
            output: "simulated failure".to_string(),
        }
    }
}

fn ids(resources: &[Resource]) -> Vec<ResourceId> {
    resources.iter().map(|r| r.id.clone()).collect()
}

#[async_trait]
impl ApplyOps for FakeCluster {
    async fn apply(
        &self,
        resources: &[Resource],
        _params: &TaskParams,
    ) -> Result<(), ClusterError> {
        self.record(Call::Apply(ids(resources)));
        if *self.fail_apply.lock() {
            return Err(Self::command_failed("kubectl apply"));
        }
        Ok(())
    }

    async fn dry_run(
        &self,
        resources: &[Resource],
        _params: &TaskParams,
    ) -> Result<(), ClusterError> {
        self.record(Call::DryRun(ids(resources)));
        if *self.fail_dry_run.lock() {
            return Err(Self::command_failed("kubectl apply --dry-run=server"));
        }
        Ok(())
    }
}

#[async_trait]
impl DeleteOps for FakeCluster {
    async fn delete(&self, ids: &[ResourceId], _params: &TaskParams) -> Result<(), ClusterError> {
        self.record(Call::Delete(ids.to_vec()));
        Ok(())
    }

    async fn delete_handling_partial_execution(
        &self,
        ids: &[ResourceId],
        _params: &TaskParams,
    ) -> Result<Vec<ResourceId>, ClusterError> {
        self.record(Call::DeletePartial(ids.to_vec()));
        Ok(ids.to_vec())
    }
}

#[async_trait]
impl WorkloadOps for FakeCluster {
    async fn status_check(
        &self,
        workloads: &[ResourceId],
        _params: &TaskParams,
    ) -> Result<bool, ClusterError> {
        self.record(Call::StatusCheck(workloads.to_vec()));
        Ok(*self.steady.lock())
    }

    async fn status_check_custom(
        &self,
        workloads: &[Resource],
        _params: &TaskParams,
    ) -> Result<bool, ClusterError> {
        self.record(Call::StatusCheckCustom(ids(workloads)));
        Ok(*self.custom_steady.lock())
    }

    async fn latest_revision(
        &self,
        workload: &ResourceId,
        _params: &TaskParams,
    ) -> Result<String, ClusterError> {
        Ok(self
            .revisions
            .lock()
            .get(&workload.kind_name())
            .cloned()
            .unwrap_or_else(|| "1".to_string()))
    }

    async fn rollout_undo(
        &self,
        workload: &ResourceId,
        revision: Option<&str>,
        _params: &TaskParams,
    ) -> Result<(), ClusterError> {
        self.record(Call::RolloutUndo {
            workload: workload.clone(),
            revision: revision.map(str::to_string),
        });
        Ok(())
    }

    async fn current_replicas(
        &self,
        workload: &ResourceId,
        _params: &TaskParams,
    ) -> Result<Option<u32>, ClusterError> {
        Ok(self.replicas.lock().get(&workload.kind_name()).copied())
    }

    async fn scale(
        &self,
        workload: &ResourceId,
        replicas: u32,
        _params: &TaskParams,
    ) -> Result<(), ClusterError> {
        self.record(Call::Scale {
            workload: workload.clone(),
            replicas,
        });
        self.replicas.lock().insert(workload.kind_name(), replicas);
        Ok(())
    }

    async fn is_direct_apply(
        &self,
        id: &ResourceId,
        _params: &TaskParams,
    ) -> Result<bool, ClusterError> {
        Ok(self.direct_apply.lock().contains(&id.kind_name()))
    }
}

#[async_trait]
impl PodOps for FakeCluster {
    async fn pods(
        &self,
        _namespace: &str,
        _release_name: &str,
        _timeout: Duration,
    ) -> Result<Vec<PodInfo>, ClusterError> {
        Ok(self.next_pods())
    }

    async fn pods_with_color(
        &self,
        _namespace: &str,
        _release_name: &str,
        _color: Color,
        _timeout: Duration,
    ) -> Result<Vec<PodInfo>, ClusterError> {
        Ok(self.next_pods())
    }

    async fn pods_with_track(
        &self,
        _namespace: &str,
        _release_name: &str,
        _track: Track,
        _timeout: Duration,
    ) -> Result<Vec<PodInfo>, ClusterError> {
        Ok(self.next_pods())
    }
}

#[async_trait]
impl ServiceOps for FakeCluster {
    async fn service(
        &self,
        _namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceInfo>, ClusterError> {
        Ok(self.services.lock().get(name).cloned())
    }

    async fn patch_service_selector(
        &self,
        _namespace: &str,
        name: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<(), ClusterError> {
        self.record(Call::PatchSelector {
            service: name.to_string(),
            selector: selector.clone(),
        });
        if let Some(service) = self.services.lock().get_mut(name) {
            service.selector = selector.clone();
        }
        Ok(())
    }
}

/// In-memory legacy blob store, cloneable so tests can inspect it after
/// handing a clone to the handler.
#[derive(Clone, Default)]
pub struct MemoryLegacyStore {
    blob: Arc<Mutex<Option<String>>>,
}

impl MemoryLegacyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, history: &ReleaseHistory) {
        *self.blob.lock() = Some(serde_yaml::to_string(history).expect("serializable history"));
    }

    pub fn seed_raw(&self, blob: &str) {
        *self.blob.lock() = Some(blob.to_string());
    }

    pub fn stored(&self) -> Option<ReleaseHistory> {
        self.blob
            .lock()
            .as_ref()
            .map(|blob| serde_yaml::from_str(blob).expect("parseable stored history"))
    }
}

#[async_trait]
impl LegacyReleaseStore for MemoryLegacyStore {
    async fn read(&self, _release_name: &str) -> Result<Option<String>, StoreError> {
        Ok(self.blob.lock().clone())
    }

    async fn write(&self, _release_name: &str, blob: &str) -> Result<(), StoreError> {
        *self.blob.lock() = Some(blob.to_string());
        Ok(())
    }
}

/// In-memory declarative object store.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<Mutex<BTreeMap<u64, String>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, history: &ReleaseHistory) {
        let mut objects = self.objects.lock();
        for release in history.releases() {
            objects.insert(
                release.number,
                serde_yaml::to_string(release).expect("serializable release"),
            );
        }
    }

    pub fn stored_numbers(&self) -> Vec<u64> {
        self.objects.lock().keys().copied().collect()
    }

    pub fn stored_release(&self, number: u64) -> Option<Release> {
        self.objects
            .lock()
            .get(&number)
            .map(|payload| serde_yaml::from_str(payload).expect("parseable stored release"))
    }
}

#[async_trait]
impl ReleaseObjectStore for MemoryObjectStore {
    async fn list(&self, _release_name: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.objects.lock().values().cloned().collect())
    }

    async fn put(
        &self,
        _release_name: &str,
        number: u64,
        payload: &str,
    ) -> Result<(), StoreError> {
        self.objects.lock().insert(number, payload.to_string());
        Ok(())
    }

    async fn remove(&self, _release_name: &str, number: u64) -> Result<(), StoreError> {
        self.objects.lock().remove(&number);
        Ok(())
    }
}

/// Legacy store backed by a file in a temp directory.
pub struct FileLegacyStore {
    pub dir: tempfile::TempDir,
}

impl FileLegacyStore {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("temp dir"),
        }
    }

    fn path(&self, release_name: &str) -> std::path::PathBuf {
        self.dir.path().join(format!("{release_name}.yaml"))
    }
}

#[async_trait]
impl LegacyReleaseStore for FileLegacyStore {
    async fn read(&self, release_name: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.path(release_name)) {
            Ok(blob) => Ok(Some(blob)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn write(&self, release_name: &str, blob: &str) -> Result<(), StoreError> {
        std::fs::write(self.path(release_name), blob)?;
        Ok(())
    }
}
