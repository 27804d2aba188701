//! Data models for the provisioner JSON contract.
//!
//! This module provides the option catalog, kernel configuration and
//! allocation types exchanged with the `slurm-provisioner` REST namespace,
//! plus the application configuration loaded from TOML.

mod catalog;
mod config;
mod kernel;
pub mod lenient;

// Re-export all public types from submodules
pub use catalog::{
    Allocation, DropdownLists, OptionCatalog, PartitionResources, ResourceField, ResourceSpec,
};
pub use config::{AppConfig, BehaviorConfig, DisplayConfig, RefreshConfig, ServerConfig};
pub use kernel::{
    ANY_NODE, AvailableKernels, KernelChoice, KernelConfig, NEW_ALLOCATION, NONE,
    SLURM_KERNEL_NAME, SLURM_PROVISIONER_NAME,
};
