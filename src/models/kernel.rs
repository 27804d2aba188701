//! Kernel configuration and kernel choice types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::lenient;

/// Provisioner name that marks the Slurm wrapper kernel in a kernel spec.
pub const SLURM_PROVISIONER_NAME: &str = "slurm-provisioner";

/// Kernel spec name of the Slurm wrapper kernel.
pub const SLURM_KERNEL_NAME: &str = "slurm-provisioner-kernel";

/// Wire sentinel for "no allocation" / "no node".
pub const NONE: &str = "None";

/// Form sentinel for "start a new allocation".
pub const NEW_ALLOCATION: &str = "New";

/// Form sentinel for "any node of the allocation".
pub const ANY_NODE: &str = "Any";

/// Kernel configuration as stored in the Slurm kernel's provisioner metadata
/// and POSTed to the provisioner.
///
/// Every field except `kernel_argv` is a string on the wire, including the
/// numeric resource fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Allocation (job) id, or `"None"` for a new allocation
    #[serde(rename = "jobid", deserialize_with = "lenient::string")]
    pub allocation: String,
    /// Node within the allocation, or `"None"` for any node
    #[serde(deserialize_with = "lenient::string")]
    pub node: String,
    #[serde(deserialize_with = "lenient::string")]
    pub kernel: String,
    #[serde(deserialize_with = "lenient::string_vec")]
    pub kernel_argv: Vec<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub kernel_language: String,
    #[serde(deserialize_with = "lenient::string")]
    pub project: String,
    #[serde(deserialize_with = "lenient::string")]
    pub partition: String,
    #[serde(deserialize_with = "lenient::string")]
    pub nodes: String,
    #[serde(deserialize_with = "lenient::string")]
    pub gpus: String,
    #[serde(deserialize_with = "lenient::string")]
    pub runtime: String,
    #[serde(deserialize_with = "lenient::string")]
    pub reservation: String,
}

impl KernelConfig {
    /// True when nothing has been configured yet (the backend sends `{}`).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Allocation id if the config targets an existing allocation.
    #[must_use]
    pub fn allocation_id(&self) -> Option<&str> {
        non_sentinel(&self.allocation)
    }

    /// Node name if the config pins a specific node.
    #[must_use]
    pub fn pinned_node(&self) -> Option<&str> {
        non_sentinel(&self.node)
    }
}

fn non_sentinel(value: &str) -> Option<&str> {
    if value.is_empty() || value == NONE {
        None
    } else {
        Some(value)
    }
}

/// A kernel the user may run inside an allocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KernelChoice {
    pub display_name: String,
    pub argv: Vec<String>,
    pub language: String,
}

/// Selectable kernels keyed by kernel spec name, in name order.
pub type AvailableKernels = BTreeMap<String, KernelChoice>;
