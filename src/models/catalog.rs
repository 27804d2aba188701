//! Option catalog returned by the provisioner's configure endpoints.
//!
//! The catalog is an immutable snapshot: every fetch replaces it wholesale,
//! nothing is merged. All keys are optional on the wire so that `{}` (what the
//! client falls back to on errors) decodes to an empty, usable catalog.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::kernel::KernelConfig;
use super::lenient;

/// Full option catalog for the configuration form.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OptionCatalog {
    pub dropdown_lists: DropdownLists,

    /// Resource bounds and defaults per partition
    pub resources: BTreeMap<String, PartitionResources>,

    /// Live and recent allocations keyed by allocation (job) id
    pub allocations: BTreeMap<String, Allocation>,

    #[serde(rename = "documentationhref", deserialize_with = "lenient::string")]
    pub documentation_href: String,

    /// Configuration currently stored in the Slurm kernel spec
    pub current_config: KernelConfig,
}

/// Dropdown option lists, cascading project -> partition -> reservation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DropdownLists {
    #[serde(deserialize_with = "lenient::string_vec")]
    pub projects: Vec<String>,
    pub partitions: BTreeMap<String, Vec<String>>,
    pub reservations: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

/// Resource specs of one partition. A missing field means the partition does
/// not expose that resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PartitionResources {
    pub nodes: Option<ResourceSpec>,
    pub gpus: Option<ResourceSpec>,
    pub runtime: Option<ResourceSpec>,
}

impl PartitionResources {
    #[must_use]
    pub fn get(&self, field: ResourceField) -> Option<&ResourceSpec> {
        match field {
            ResourceField::Nodes => self.nodes.as_ref(),
            ResourceField::Gpus => self.gpus.as_ref(),
            ResourceField::Runtime => self.runtime.as_ref(),
        }
    }
}

/// Default value and `[min, max]` bounds of a numeric resource.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ResourceSpec {
    #[serde(deserialize_with = "lenient::string")]
    pub default: String,
    #[serde(deserialize_with = "lenient::min_max")]
    pub minmax: [String; 2],
}

impl Default for ResourceSpec {
    fn default() -> Self {
        Self {
            default: "0".to_string(),
            minmax: ["0".to_string(), "0".to_string()],
        }
    }
}

impl ResourceSpec {
    #[must_use]
    pub fn min(&self) -> &str {
        &self.minmax[0]
    }

    #[must_use]
    pub fn max(&self) -> &str {
        &self.minmax[1]
    }
}

/// The three numeric resource fields of the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceField {
    Nodes,
    Gpus,
    Runtime,
}

impl ResourceField {
    pub const ALL: [ResourceField; 3] = [
        ResourceField::Nodes,
        ResourceField::Gpus,
        ResourceField::Runtime,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nodes => "nodes",
            Self::Gpus => "gpus",
            Self::Runtime => "runtime",
        }
    }

    /// Label shown next to the input control.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Nodes => "Nodes",
            Self::Gpus => "GPUs",
            Self::Runtime => "Runtime (min)",
        }
    }
}

impl fmt::Display for ResourceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Slurm allocation tracked by the provisioner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Allocation {
    /// Configuration the allocation was requested with
    pub config: KernelConfig,
    /// Allocation end time (Unix seconds)
    #[serde(deserialize_with = "lenient::unix_seconds")]
    pub endtime: i64,
    /// Kernels currently running inside the allocation
    #[serde(deserialize_with = "lenient::string_vec")]
    pub kernel_ids: Vec<String>,
    #[serde(deserialize_with = "lenient::string_vec")]
    pub nodelist: Vec<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub state: String,
}

impl OptionCatalog {
    /// Partitions offered for a project (empty if the project is unknown).
    #[must_use]
    pub fn partitions_for(&self, project: &str) -> &[String] {
        self.dropdown_lists
            .partitions
            .get(project)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Reservations offered for a project/partition pair, if any are listed.
    #[must_use]
    pub fn reservations_for(&self, project: &str, partition: &str) -> Option<&[String]> {
        self.dropdown_lists
            .reservations
            .get(project)
            .and_then(|by_partition| by_partition.get(partition))
            .map(Vec::as_slice)
    }

    /// Resource spec of one field of a partition.
    #[must_use]
    pub fn resource(&self, partition: &str, field: ResourceField) -> Option<&ResourceSpec> {
        self.resources.get(partition).and_then(|r| r.get(field))
    }

    #[must_use]
    pub fn allocation(&self, id: &str) -> Option<&Allocation> {
        self.allocations.get(id)
    }

    /// Find the allocation a kernel is running in.
    ///
    /// Allocations are scanned in id order and the first match wins.
    #[must_use]
    pub fn allocation_for_kernel(&self, kernel_id: &str) -> Option<(&str, &Allocation)> {
        self.allocations
            .iter()
            .find(|(_, alloc)| alloc.kernel_ids.iter().any(|k| k == kernel_id))
            .map(|(id, alloc)| (id.as_str(), alloc))
    }

    /// End time of the allocation the current configuration points at.
    #[must_use]
    pub fn current_endtime(&self) -> Option<i64> {
        self.current_config
            .allocation_id()
            .and_then(|id| self.allocation(id))
            .map(|alloc| alloc.endtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "dropdown_lists": {
            "projects": ["alpha", "beta"],
            "partitions": {"alpha": ["batch", "gpus"], "beta": ["batch"]},
            "reservations": {"alpha": {"gpus": ["None", "maint"]}}
        },
        "resources": {
            "batch": {
                "nodes": {"default": 1, "minmax": [1, 8]},
                "runtime": {"default": "30", "minmax": ["10", "120"]}
            },
            "gpus": {
                "nodes": {"default": "1", "minmax": ["1", "4"]},
                "gpus": {"default": "4", "minmax": ["1", "4"]},
                "runtime": {"default": "60", "minmax": ["10", "1440"]}
            }
        },
        "allocations": {
            "4711": {
                "config": {"jobid": "4711", "project": "alpha", "partition": "gpus",
                           "nodes": "2", "gpus": "4", "runtime": "60", "reservation": "None"},
                "endtime": 1700003600,
                "kernel_ids": ["k-1", "k-2"],
                "nodelist": ["node01", "node02"],
                "state": "RUNNING"
            }
        },
        "documentationhref": "https://example.org/docs",
        "current_config": {}
    }"#;

    #[test]
    fn test_empty_object_decodes() {
        let catalog: OptionCatalog = serde_json::from_str("{}").unwrap();
        assert_eq!(catalog, OptionCatalog::default());
        assert!(catalog.current_config.is_empty());
    }

    #[test]
    fn test_sample_catalog_lookups() {
        let catalog: OptionCatalog = serde_json::from_str(SAMPLE).unwrap();

        assert_eq!(catalog.partitions_for("alpha"), ["batch", "gpus"]);
        assert!(catalog.partitions_for("nope").is_empty());
        assert_eq!(
            catalog.reservations_for("alpha", "gpus"),
            Some(["None".to_string(), "maint".to_string()].as_slice())
        );
        assert_eq!(catalog.reservations_for("beta", "batch"), None);

        let nodes = catalog.resource("batch", ResourceField::Nodes).unwrap();
        assert_eq!(nodes.default, "1");
        assert_eq!(nodes.max(), "8");
        assert!(catalog.resource("batch", ResourceField::Gpus).is_none());
        assert_eq!(catalog.documentation_href, "https://example.org/docs");
    }

    #[test]
    fn test_allocation_for_kernel() {
        let catalog: OptionCatalog = serde_json::from_str(SAMPLE).unwrap();
        let (id, alloc) = catalog.allocation_for_kernel("k-2").unwrap();
        assert_eq!(id, "4711");
        assert_eq!(alloc.endtime, 1_700_003_600);
        assert!(catalog.allocation_for_kernel("k-9").is_none());
    }

    #[test]
    fn test_current_endtime_follows_current_config() {
        let mut catalog: OptionCatalog = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(catalog.current_endtime(), None);

        catalog.current_config.allocation = "4711".to_string();
        assert_eq!(catalog.current_endtime(), Some(1_700_003_600));
    }
}
