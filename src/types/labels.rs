// ABOUTME: Label and annotation keys in the pidalio.io domain.
// ABOUTME: Labels are stamped onto deployed objects; annotations are read from rendered manifests.

/// Label identifying which release a pod belongs to.
pub const RELEASE_NAME: &str = "pidalio.io/release-name";

/// Label carrying the release number that produced a workload's pod template.
pub const RELEASE_NUMBER: &str = "pidalio.io/release-number";

/// Blue/green color label, stamped on workloads and service selectors.
pub const COLOR: &str = "pidalio.io/color";

/// Canary track label, `canary` or `stable`.
pub const TRACK: &str = "pidalio.io/track";

/// Marks a resource to be applied as-is, exempt from workload management.
pub const DIRECT_APPLY: &str = "pidalio.io/direct-apply";

/// Opts a ConfigMap/Secret out of release-number name suffixing.
pub const SKIP_VERSIONING: &str = "pidalio.io/skip-versioning";

/// Opts a resource out of pruning when it disappears from the manifests.
pub const SKIP_PRUNING: &str = "pidalio.io/skip-pruning";

/// Designates the primary service in a multi-service blue/green manifest set.
pub const PRIMARY_SERVICE: &str = "pidalio.io/primary-service";

/// Designates the stage service in a multi-service blue/green manifest set.
pub const STAGE_SERVICE: &str = "pidalio.io/stage-service";

/// Declares a custom resource as a managed workload.
pub const MANAGED_WORKLOAD: &str = "pidalio.io/managed-workload";

/// Steady-state condition expression for custom managed workloads.
pub const STEADY_STATE_CONDITION: &str = "pidalio.io/steady-state-condition";

/// Name suffix of the generated stage service.
pub const STAGE_SERVICE_SUFFIX: &str = "-stage";

/// Name suffix of the generated canary workload.
pub const CANARY_SUFFIX: &str = "-canary";
