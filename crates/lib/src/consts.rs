//! Crate-wide constants.

use std::time::Duration;

/// Application name used for XDG directories and environment variable prefixes.
pub const APP_NAME: &str = "platstate";

/// Length of truncated object hashes used for cache file names.
pub const OBJ_HASH_PREFIX_LEN: usize = 20;

/// Channel used when a component or observation names none.
pub const DEFAULT_CHANNEL: &str = "default";

/// Tag suffix marking the build that is active on a channel.
pub const CURRENT_SUFFIX: &str = "-cur";

/// Suffix identifying version variables in a host environment.
pub const HOST_VERSION_SUFFIX: &str = "_MRV";

/// Command used to read a login-shell environment.
pub const DEFAULT_HOST_ENV_COMMAND: &str = ". /etc/profile && env";

/// Number of rotated snapshots kept in the history directory.
pub const DEFAULT_RETENTION: usize = 4;

/// Upper bound on concurrent registry tag-list requests.
pub const MAX_REGISTRY_WORKERS: usize = 50;

/// Repositories requested per catalog page.
pub const DEFAULT_CATALOG_PAGE_SIZE: usize = 100;

pub const REGISTRY_TIMEOUT: Duration = Duration::from_secs(40);

pub const LOCAL_LISTER_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_IMAGE_LISTER: &str = "crictl images";

pub const DEFAULT_KUBECTL: &str = "kubectl";

/// Cluster resource categories queried for version annotations.
pub const CLUSTER_CATEGORIES: &[&str] = &[
  "statefulset",
  "sparkapplication",
  "objectbucketclaim",
  "storageclass",
  "prometheus",
  "deployment",
  "daemonset",
];

/// Playbook file name at the root of a definition tree.
pub const PLAYBOOK_FILE: &str = "platform.yaml";

/// Snapshot file name for the current state table.
pub const CURRENT_SNAPSHOT_FILE: &str = "state.json";

/// Diagnostic files written next to the snapshot history.
pub const HOST_DATA_FILE: &str = "host_data.json";
pub const CLUSTER_DATA_FILE: &str = "cluster_data.json";
pub const REGISTRY_DATA_FILE: &str = "registry_data.json";
pub const MERGED_DATA_FILE: &str = "merged_data.json";
