//! Configuration resolver.
//!
//! Turns an option catalog, the table of available kernels and a partial
//! selection into a fully populated [`FormState`], filling every unset field
//! from catalog defaults. Edits go through the `select_*` / `set_number`
//! operations, which re-resolve whatever cascades from the edited field:
//!
//! ```text
//! project ──> partition ──> nodes / gpus / runtime
//!                      └──> reservation
//! allocation ──> node, and (existing allocation) the whole resource block
//! ```
//!
//! The resolver is pure: it never touches the network and never mutates the
//! catalog.

use thiserror::Error;

use crate::models::{
    ANY_NODE, AvailableKernels, KernelConfig, NEW_ALLOCATION, NONE, OptionCatalog, ResourceField,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("'{value}' is not a valid {field}")]
    UnknownOption { field: FormField, value: String },

    #[error("{0} is fixed by the selected allocation")]
    Locked(FormField),

    #[error("{field} must be a non-negative integer, got '{value}'")]
    InvalidNumber { field: FormField, value: String },
}

/// Controls of the configuration form, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormField {
    Allocation,
    Node,
    Kernel,
    Project,
    Partition,
    Nodes,
    Gpus,
    Runtime,
    Reservation,
}

impl FormField {
    pub const ORDER: [FormField; 9] = [
        FormField::Allocation,
        FormField::Node,
        FormField::Kernel,
        FormField::Project,
        FormField::Partition,
        FormField::Nodes,
        FormField::Gpus,
        FormField::Runtime,
        FormField::Reservation,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Allocation => "Allocation",
            Self::Node => "Node",
            Self::Kernel => "Kernel",
            Self::Project => "Project",
            Self::Partition => "Partition",
            Self::Nodes => "Nodes",
            Self::Gpus => "GPUs",
            Self::Runtime => "Runtime (min)",
            Self::Reservation => "Reservation",
        }
    }

    /// Fields taken from the allocation when an existing one is selected.
    #[must_use]
    pub const fn follows_allocation(self) -> bool {
        !matches!(self, Self::Allocation | Self::Node | Self::Kernel)
    }

    #[must_use]
    pub const fn resource(self) -> Option<ResourceField> {
        match self {
            Self::Nodes => Some(ResourceField::Nodes),
            Self::Gpus => Some(ResourceField::Gpus),
            Self::Runtime => Some(ResourceField::Runtime),
            _ => None,
        }
    }
}

impl std::fmt::Display for FormField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label().to_lowercase())
    }
}

/// Partial user selection. `None` means "use the catalog default".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub allocation: Option<String>,
    pub node: Option<String>,
    pub kernel: Option<String>,
    pub project: Option<String>,
    pub partition: Option<String>,
    pub nodes: Option<String>,
    pub gpus: Option<String>,
    pub runtime: Option<String>,
    pub reservation: Option<String>,
}

impl Selection {
    /// Translate a stored kernel configuration back into a selection.
    ///
    /// `"None"` sentinels and empty strings become unset; a config without an
    /// allocation also drops its node.
    #[must_use]
    pub fn from_kernel_config(config: &KernelConfig) -> Self {
        let allocation = config.allocation_id().map(str::to_string);
        let node = allocation
            .as_ref()
            .and_then(|_| config.pinned_node())
            .map(str::to_string);

        Self {
            allocation,
            node,
            kernel: given(&config.kernel),
            project: given(&config.project),
            partition: given(&config.partition),
            nodes: given(&config.nodes),
            gpus: given(&config.gpus),
            runtime: given(&config.runtime),
            reservation: given(&config.reservation),
        }
    }

    fn resource(&self, field: ResourceField) -> Option<&String> {
        match field {
            ResourceField::Nodes => self.nodes.as_ref(),
            ResourceField::Gpus => self.gpus.as_ref(),
            ResourceField::Runtime => self.runtime.as_ref(),
        }
    }
}

fn given(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// A dropdown: the selected value and what it may be changed to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Choice {
    pub value: String,
    pub options: Vec<String>,
}

impl Choice {
    fn contains(&self, value: &str) -> bool {
        self.options.iter().any(|o| o == value)
    }
}

/// A numeric resource input with its bounds, all as displayed strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceValue {
    pub value: String,
    pub min: String,
    pub max: String,
}

impl Default for ResourceValue {
    fn default() -> Self {
        Self {
            value: "0".to_string(),
            min: "0".to_string(),
            max: "0".to_string(),
        }
    }
}

/// Fully resolved configuration form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    pub allocation: Choice,
    pub node: Choice,
    pub kernel: Choice,
    pub project: Choice,
    pub partition: Choice,
    pub nodes: ResourceValue,
    pub gpus: ResourceValue,
    pub runtime: ResourceValue,
    pub reservation: Choice,
    /// False while an existing allocation dictates the resources
    pub resources_editable: bool,
    /// End time of the selected allocation, shown as a countdown
    pub endtime: Option<i64>,
}

impl FormState {
    #[must_use]
    pub fn is_new_allocation(&self) -> bool {
        self.allocation.value == NEW_ALLOCATION
    }

    #[must_use]
    pub fn resource(&self, field: ResourceField) -> &ResourceValue {
        match field {
            ResourceField::Nodes => &self.nodes,
            ResourceField::Gpus => &self.gpus,
            ResourceField::Runtime => &self.runtime,
        }
    }

    fn resource_mut(&mut self, field: ResourceField) -> &mut ResourceValue {
        match field {
            ResourceField::Nodes => &mut self.nodes,
            ResourceField::Gpus => &mut self.gpus,
            ResourceField::Runtime => &mut self.runtime,
        }
    }

    /// Dropdown behind a field, `None` for the numeric inputs.
    #[must_use]
    pub fn choice(&self, field: FormField) -> Option<&Choice> {
        match field {
            FormField::Allocation => Some(&self.allocation),
            FormField::Node => Some(&self.node),
            FormField::Kernel => Some(&self.kernel),
            FormField::Project => Some(&self.project),
            FormField::Partition => Some(&self.partition),
            FormField::Reservation => Some(&self.reservation),
            FormField::Nodes | FormField::Gpus | FormField::Runtime => None,
        }
    }

    /// Current display value of any field.
    #[must_use]
    pub fn value(&self, field: FormField) -> &str {
        match field.resource() {
            Some(resource) => &self.resource(resource).value,
            None => self.choice(field).map_or("", |c| c.value.as_str()),
        }
    }

    #[must_use]
    pub fn is_editable(&self, field: FormField) -> bool {
        self.resources_editable || !field.follows_allocation()
    }

    /// Whether a field is worth showing.
    ///
    /// The GPU row disappears when the partition has no GPUs to offer and the
    /// reservation row when there is nothing to choose between.
    #[must_use]
    pub fn is_visible(&self, field: FormField) -> bool {
        match field {
            FormField::Gpus if self.resources_editable => {
                !(self.gpus.value == "0" && self.gpus.max == "0")
            }
            FormField::Gpus => self.gpus.value != "0",
            FormField::Reservation => self.reservation.options.len() >= 2,
            _ => true,
        }
    }

    /// Fields shown in the dialog, in display order.
    #[must_use]
    pub fn visible_fields(&self) -> Vec<FormField> {
        FormField::ORDER
            .into_iter()
            .filter(|f| self.is_visible(*f))
            .collect()
    }

    /// The selection this form represents, for re-resolving.
    #[must_use]
    pub fn selection(&self) -> Selection {
        let node = (self.node.value != ANY_NODE).then(|| self.node.value.clone());
        Selection {
            allocation: (!self.is_new_allocation()).then(|| self.allocation.value.clone()),
            node,
            kernel: given(&self.kernel.value),
            project: given(&self.project.value),
            partition: given(&self.partition.value),
            nodes: given(&self.nodes.value),
            gpus: given(&self.gpus.value),
            runtime: given(&self.runtime.value),
            reservation: given(&self.reservation.value),
        }
    }

    /// Build the configuration to submit.
    ///
    /// Sentinels are translated to the wire form (`"New"` and `"Any"` become
    /// `"None"`) and the kernel's argv/language are taken from `kernels`.
    #[must_use]
    pub fn to_kernel_config(&self, kernels: &AvailableKernels) -> KernelConfig {
        let sentinel_to_none = |value: &str, sentinel: &str| {
            if value.is_empty() || value == sentinel {
                NONE.to_string()
            } else {
                value.to_string()
            }
        };
        let kernel = kernels.get(&self.kernel.value);

        KernelConfig {
            allocation: sentinel_to_none(&self.allocation.value, NEW_ALLOCATION),
            node: sentinel_to_none(&self.node.value, ANY_NODE),
            kernel: self.kernel.value.clone(),
            kernel_argv: kernel.map(|k| k.argv.clone()).unwrap_or_default(),
            kernel_language: kernel.map(|k| k.language.clone()).unwrap_or_default(),
            project: self.project.value.clone(),
            partition: self.partition.value.clone(),
            nodes: self.nodes.value.clone(),
            gpus: if self.gpus.value.is_empty() {
                "0".to_string()
            } else {
                self.gpus.value.clone()
            },
            runtime: self.runtime.value.clone(),
            reservation: sentinel_to_none(&self.reservation.value, NONE),
        }
    }
}

/// Resolution context: one catalog snapshot plus the kernel table.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    catalog: &'a OptionCatalog,
    kernels: &'a AvailableKernels,
}

/// Resolve `selection` against `catalog` and `kernels`.
#[must_use]
pub fn resolve(
    catalog: &OptionCatalog,
    kernels: &AvailableKernels,
    selection: &Selection,
) -> FormState {
    Resolver::new(catalog, kernels).resolve(selection)
}

impl<'a> Resolver<'a> {
    #[must_use]
    pub fn new(catalog: &'a OptionCatalog, kernels: &'a AvailableKernels) -> Self {
        Self { catalog, kernels }
    }

    /// Form for the configuration currently stored in the catalog.
    #[must_use]
    pub fn resolve_current(&self) -> FormState {
        self.resolve(&Selection::from_kernel_config(&self.catalog.current_config))
    }

    #[must_use]
    pub fn resolve(&self, selection: &Selection) -> FormState {
        let catalog = self.catalog;

        let existing = selection
            .allocation
            .as_deref()
            .and_then(|id| catalog.allocation(id).map(|alloc| (id, alloc)));

        // An existing allocation dictates the resource block; the selection
        // only fills in what the allocation does not record.
        let locked = existing.map(|(_, alloc)| Selection::from_kernel_config(&alloc.config));
        let effective = match locked {
            Some(locked) => Selection {
                project: locked.project.or_else(|| selection.project.clone()),
                partition: locked.partition.or_else(|| selection.partition.clone()),
                nodes: locked.nodes.or_else(|| selection.nodes.clone()),
                gpus: locked.gpus.or_else(|| selection.gpus.clone()),
                runtime: locked.runtime.or_else(|| selection.runtime.clone()),
                reservation: locked.reservation.or_else(|| selection.reservation.clone()),
                ..selection.clone()
            },
            None => selection.clone(),
        };

        let projects = &catalog.dropdown_lists.projects;
        let project = choose(effective.project.as_deref(), projects);
        let partition = choose(
            effective.partition.as_deref(),
            catalog.partitions_for(&project.value),
        );

        let resource = |field: ResourceField| {
            let spec = catalog.resource(&partition.value, field);
            ResourceValue {
                value: effective
                    .resource(field)
                    .cloned()
                    .or_else(|| spec.map(|s| s.default.clone()))
                    .unwrap_or_else(|| "0".to_string()),
                min: spec.map_or_else(|| "0".to_string(), |s| s.min().to_string()),
                max: spec.map_or_else(|| "0".to_string(), |s| s.max().to_string()),
            }
        };
        let nodes = resource(ResourceField::Nodes);
        let gpus = resource(ResourceField::Gpus);
        let runtime = resource(ResourceField::Runtime);

        let reservation_options = catalog
            .reservations_for(&project.value, &partition.value)
            .map(<[String]>::to_vec)
            .unwrap_or_else(|| vec![NONE.to_string()]);
        // A locked reservation is kept even when the catalog no longer offers it
        let reservation = match effective.reservation {
            Some(r) if existing.is_some() => choose(Some(r.as_str()), &reservation_options),
            r => Choice {
                value: r
                    .filter(|r| reservation_options.contains(r))
                    .unwrap_or_else(|| NONE.to_string()),
                options: reservation_options,
            },
        };

        let allocation = Choice {
            value: existing.map_or_else(|| NEW_ALLOCATION.to_string(), |(id, _)| id.to_string()),
            options: std::iter::once(NEW_ALLOCATION.to_string())
                .chain(catalog.allocations.keys().cloned())
                .collect(),
        };

        let node_options: Vec<String> = std::iter::once(ANY_NODE.to_string())
            .chain(
                existing
                    .into_iter()
                    .flat_map(|(_, alloc)| alloc.nodelist.iter().cloned()),
            )
            .collect();
        let node = Choice {
            value: effective
                .node
                .filter(|n| node_options.contains(n))
                .unwrap_or_else(|| ANY_NODE.to_string()),
            options: node_options,
        };

        FormState {
            allocation,
            node,
            kernel: self.choose_kernel(effective.kernel.as_deref()),
            project,
            partition,
            nodes,
            gpus,
            runtime,
            reservation,
            resources_editable: existing.is_none(),
            endtime: existing.map(|(_, alloc)| alloc.endtime),
        }
    }

    fn choose_kernel(&self, kernel: Option<&str>) -> Choice {
        let options: Vec<String> = self.kernels.keys().cloned().collect();
        let value = match kernel {
            Some(k) if self.kernels.contains_key(k) => k.to_string(),
            // Without a kernel table there is nothing to validate against
            Some(k) if options.is_empty() => {
                return Choice {
                    value: k.to_string(),
                    options: vec![k.to_string()],
                };
            }
            _ => options.first().cloned().unwrap_or_default(),
        };
        Choice { value, options }
    }

    /// Pick an allocation. `"New"` after an existing allocation resets the
    /// form to catalog defaults, keeping only the kernel.
    pub fn select_allocation(&self, form: &mut FormState, value: &str) -> Result<(), ResolveError> {
        ensure_option(&form.allocation, FormField::Allocation, value)?;
        if value == form.allocation.value {
            return Ok(());
        }

        let kernel = given(&form.kernel.value);
        *form = if value == NEW_ALLOCATION {
            self.resolve(&Selection {
                kernel,
                ..Selection::default()
            })
        } else {
            self.resolve(&Selection {
                allocation: Some(value.to_string()),
                kernel,
                ..Selection::default()
            })
        };
        Ok(())
    }

    pub fn select_node(&self, form: &mut FormState, value: &str) -> Result<(), ResolveError> {
        ensure_option(&form.node, FormField::Node, value)?;
        form.node.value = value.to_string();
        Ok(())
    }

    pub fn select_kernel(&self, form: &mut FormState, value: &str) -> Result<(), ResolveError> {
        ensure_option(&form.kernel, FormField::Kernel, value)?;
        form.kernel.value = value.to_string();
        Ok(())
    }

    /// Pick a project; partition, resources and reservation reset to its defaults.
    pub fn select_project(&self, form: &mut FormState, value: &str) -> Result<(), ResolveError> {
        ensure_unlocked(form, FormField::Project)?;
        ensure_option(&form.project, FormField::Project, value)?;
        *form = self.resolve(&Selection {
            kernel: given(&form.kernel.value),
            project: Some(value.to_string()),
            ..Selection::default()
        });
        Ok(())
    }

    /// Pick a partition; resources and reservation reset to its defaults.
    pub fn select_partition(&self, form: &mut FormState, value: &str) -> Result<(), ResolveError> {
        ensure_unlocked(form, FormField::Partition)?;
        ensure_option(&form.partition, FormField::Partition, value)?;
        *form = self.resolve(&Selection {
            kernel: given(&form.kernel.value),
            project: given(&form.project.value),
            partition: Some(value.to_string()),
            ..Selection::default()
        });
        Ok(())
    }

    pub fn select_reservation(
        &self,
        form: &mut FormState,
        value: &str,
    ) -> Result<(), ResolveError> {
        ensure_unlocked(form, FormField::Reservation)?;
        ensure_option(&form.reservation, FormField::Reservation, value)?;
        form.reservation.value = value.to_string();
        Ok(())
    }

    /// Select by field; numeric fields go through [`Resolver::set_number`].
    pub fn select(
        &self,
        form: &mut FormState,
        field: FormField,
        value: &str,
    ) -> Result<(), ResolveError> {
        match field {
            FormField::Allocation => self.select_allocation(form, value),
            FormField::Node => self.select_node(form, value),
            FormField::Kernel => self.select_kernel(form, value),
            FormField::Project => self.select_project(form, value),
            FormField::Partition => self.select_partition(form, value),
            FormField::Reservation => self.select_reservation(form, value),
            FormField::Nodes => set_number(form, ResourceField::Nodes, value),
            FormField::Gpus => set_number(form, ResourceField::Gpus, value),
            FormField::Runtime => set_number(form, ResourceField::Runtime, value),
        }
    }
}

/// Set a numeric resource, clamping it to the field's maximum.
///
/// Only non-negative integers are accepted; on error the old value stays.
/// There is no lower clamp.
pub fn set_number(form: &mut FormState, field: ResourceField, text: &str) -> Result<(), ResolveError> {
    let form_field = match field {
        ResourceField::Nodes => FormField::Nodes,
        ResourceField::Gpus => FormField::Gpus,
        ResourceField::Runtime => FormField::Runtime,
    };
    ensure_unlocked(form, form_field)?;

    let text = text.trim();
    let number = text
        .parse::<u64>()
        .map_err(|_| ResolveError::InvalidNumber {
            field: form_field,
            value: text.to_string(),
        })?;

    let resource = form.resource_mut(field);
    resource.value = match resource.max.parse::<u64>() {
        Ok(max) if number > max => max.to_string(),
        _ => number.to_string(),
    };
    Ok(())
}

fn choose(value: Option<&str>, options: &[String]) -> Choice {
    let value = value
        .map(str::to_string)
        .or_else(|| options.first().cloned())
        .unwrap_or_default();
    let options = if options.contains(&value) {
        options.to_vec()
    } else {
        vec![value.clone()]
    };
    Choice { value, options }
}

fn ensure_option(choice: &Choice, field: FormField, value: &str) -> Result<(), ResolveError> {
    if choice.contains(value) {
        Ok(())
    } else {
        Err(ResolveError::UnknownOption {
            field,
            value: value.to_string(),
        })
    }
}

fn ensure_unlocked(form: &FormState, field: FormField) -> Result<(), ResolveError> {
    if form.is_editable(field) {
        Ok(())
    } else {
        Err(ResolveError::Locked(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KernelChoice;

    fn catalog() -> OptionCatalog {
        serde_json::from_str(
            r#"{
            "dropdown_lists": {
                "projects": ["alpha", "beta"],
                "partitions": {"alpha": ["batch", "gpus"], "beta": ["develop"]},
                "reservations": {"alpha": {"gpus": ["None", "maint"]}}
            },
            "resources": {
                "batch": {
                    "nodes": {"default": "1", "minmax": ["1", "8"]},
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
                               "nodes": "2", "gpus": "4", "runtime": "90",
                               "reservation": "maint", "kernel": "ir"},
                    "endtime": 1700003600,
                    "kernel_ids": ["k-1"],
                    "nodelist": ["gpu01", "gpu02"],
                    "state": "RUNNING"
                }
            },
            "current_config": {}
        }"#,
        )
        .unwrap()
    }

    fn kernels() -> AvailableKernels {
        [
            ("ir", "R", "R"),
            ("python3", "Python 3", "python"),
        ]
        .into_iter()
        .map(|(name, display, lang)| {
            (
                name.to_string(),
                KernelChoice {
                    display_name: display.to_string(),
                    argv: vec![format!("{name}-bin")],
                    language: lang.to_string(),
                },
            )
        })
        .collect()
    }

    #[test]
    fn test_empty_selection_takes_first_options() {
        let (catalog, kernels) = (catalog(), kernels());
        let form = resolve(&catalog, &kernels, &Selection::default());

        assert_eq!(form.project.value, "alpha");
        assert_eq!(form.project.options, ["alpha", "beta"]);
        assert_eq!(form.partition.value, "batch");
        assert_eq!(form.nodes.value, "1");
        assert_eq!(form.nodes.max, "8");
        assert_eq!(form.runtime.value, "30");
        assert_eq!(form.reservation.value, NONE);
        assert_eq!(form.reservation.options, [NONE]);
        assert_eq!(form.allocation.value, NEW_ALLOCATION);
        assert_eq!(form.allocation.options, [NEW_ALLOCATION, "4711"]);
        assert_eq!(form.node.options, [ANY_NODE]);
        assert_eq!(form.kernel.value, "ir");
        assert!(form.resources_editable);
        assert_eq!(form.endtime, None);
    }

    #[test]
    fn test_partition_without_resources_defaults_to_zero() {
        let (catalog, kernels) = (catalog(), kernels());
        let form = resolve(
            &catalog,
            &kernels,
            &Selection {
                project: Some("beta".to_string()),
                ..Default::default()
            },
        );

        assert_eq!(form.partition.value, "develop");
        for field in ResourceField::ALL {
            assert_eq!(form.resource(field), &ResourceValue::default(), "{field}");
        }
    }

    #[test]
    fn test_unknown_project_keeps_value_as_only_option() {
        let (catalog, kernels) = (catalog(), kernels());
        let form = resolve(
            &catalog,
            &kernels,
            &Selection {
                project: Some("gamma".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(form.project.options, ["gamma"]);
        assert_eq!(form.partition.value, "");
    }

    #[test]
    fn test_existing_allocation_locks_resources() {
        let (catalog, kernels) = (catalog(), kernels());
        let resolver = Resolver::new(&catalog, &kernels);
        let form = resolver.resolve(&Selection {
            allocation: Some("4711".to_string()),
            node: Some("gpu02".to_string()),
            project: Some("beta".to_string()),
            nodes: Some("1".to_string()),
            ..Default::default()
        });

        assert_eq!(form.project.value, "alpha");
        assert_eq!(form.partition.value, "gpus");
        assert_eq!(form.nodes.value, "2");
        assert_eq!(form.gpus.value, "4");
        assert_eq!(form.runtime.value, "90");
        assert_eq!(form.reservation.value, "maint");
        assert_eq!(form.node.value, "gpu02");
        assert_eq!(form.node.options, [ANY_NODE, "gpu01", "gpu02"]);
        assert!(!form.resources_editable);
        assert_eq!(form.endtime, Some(1_700_003_600));

        let mut locked = form.clone();
        assert_eq!(
            set_number(&mut locked, ResourceField::Nodes, "3"),
            Err(ResolveError::Locked(FormField::Nodes))
        );
        assert_eq!(
            resolver.select_project(&mut locked, "beta"),
            Err(ResolveError::Locked(FormField::Project))
        );
        assert_eq!(locked, form);
    }

    #[test]
    fn test_allocation_keeps_reservation_missing_from_catalog() {
        let mut catalog = catalog();
        catalog.dropdown_lists.reservations.clear();
        let kernels = kernels();
        let form = resolve(
            &catalog,
            &kernels,
            &Selection {
                allocation: Some("4711".to_string()),
                ..Default::default()
            },
        );

        assert_eq!(form.reservation.value, "maint");
        assert_eq!(form.reservation.options, ["maint"]);
        assert_eq!(form.to_kernel_config(&kernels).reservation, "maint");

        // editable forms still fall back
        let form = resolve(
            &catalog,
            &kernels,
            &Selection {
                project: Some("alpha".to_string()),
                partition: Some("gpus".to_string()),
                reservation: Some("maint".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(form.reservation.value, NONE);
    }

    #[test]
    fn test_unknown_allocation_and_node_fall_back() {
        let (catalog, kernels) = (catalog(), kernels());
        let form = resolve(
            &catalog,
            &kernels,
            &Selection {
                allocation: Some("999".to_string()),
                node: Some("gpu01".to_string()),
                kernel: Some("julia".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(form.allocation.value, NEW_ALLOCATION);
        assert_eq!(form.node.value, ANY_NODE);
        assert_eq!(form.kernel.value, "ir");
        assert!(form.resources_editable);
    }

    #[test]
    fn test_switching_back_to_new_keeps_only_kernel() {
        let (catalog, kernels) = (catalog(), kernels());
        let resolver = Resolver::new(&catalog, &kernels);
        let mut form = resolver.resolve(&Selection::default());
        resolver.select_kernel(&mut form, "python3").unwrap();
        resolver.select_allocation(&mut form, "4711").unwrap();
        assert_eq!(form.partition.value, "gpus");
        assert_eq!(form.kernel.value, "python3");

        resolver.select_allocation(&mut form, NEW_ALLOCATION).unwrap();
        let mut expected = resolver.resolve(&Selection::default());
        expected.kernel.value = "python3".to_string();
        assert_eq!(form, expected);
    }

    #[test]
    fn test_project_change_cascades() {
        let (catalog, kernels) = (catalog(), kernels());
        let resolver = Resolver::new(&catalog, &kernels);
        let mut form = resolver.resolve(&Selection::default());
        resolver.select_partition(&mut form, "gpus").unwrap();
        assert_eq!(form.gpus.value, "4");
        assert_eq!(form.reservation.options, [NONE, "maint"]);
        resolver.select_reservation(&mut form, "maint").unwrap();

        resolver.select_project(&mut form, "beta").unwrap();
        assert_eq!(form.partition.value, "develop");
        assert_eq!(form.partition.options, ["develop"]);
        assert_eq!(form.gpus.value, "0");
        assert_eq!(form.reservation.value, NONE);
    }

    #[test]
    fn test_partition_change_resets_resources() {
        let (catalog, kernels) = (catalog(), kernels());
        let resolver = Resolver::new(&catalog, &kernels);
        let mut form = resolver.resolve(&Selection::default());
        set_number(&mut form, ResourceField::Nodes, "5").unwrap();

        resolver.select_partition(&mut form, "gpus").unwrap();
        assert_eq!(form.nodes.value, "1");
        assert_eq!(form.nodes.max, "4");
        assert_eq!(form.runtime.value, "60");
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        let (catalog, kernels) = (catalog(), kernels());
        let resolver = Resolver::new(&catalog, &kernels);
        let mut form = resolver.resolve(&Selection::default());
        let before = form.clone();

        assert!(matches!(
            resolver.select_partition(&mut form, "develop"),
            Err(ResolveError::UnknownOption { field: FormField::Partition, .. })
        ));
        assert!(resolver.select_node(&mut form, "gpu01").is_err());
        assert_eq!(form, before);
    }

    #[test]
    fn test_set_number_clamps_to_max() {
        let (catalog, kernels) = (catalog(), kernels());
        let mut form = resolve(&catalog, &kernels, &Selection::default());

        set_number(&mut form, ResourceField::Nodes, "20").unwrap();
        assert_eq!(form.nodes.value, "8");
        set_number(&mut form, ResourceField::Nodes, "3").unwrap();
        assert_eq!(form.nodes.value, "3");
        // below min is accepted as typed
        set_number(&mut form, ResourceField::Runtime, "5").unwrap();
        assert_eq!(form.runtime.value, "5");
    }

    #[test]
    fn test_set_number_rejects_non_integers() {
        let (catalog, kernels) = (catalog(), kernels());
        let mut form = resolve(&catalog, &kernels, &Selection::default());

        for bad in ["1.5", "-1", "", "abc"] {
            assert!(
                matches!(
                    set_number(&mut form, ResourceField::Nodes, bad),
                    Err(ResolveError::InvalidNumber { .. })
                ),
                "{bad}"
            );
        }
        assert_eq!(form.nodes.value, "1");
    }

    #[test]
    fn test_to_kernel_config_translates_sentinels() {
        let (catalog, kernels) = (catalog(), kernels());
        let form = resolve(&catalog, &kernels, &Selection::default());
        let config = form.to_kernel_config(&kernels);

        assert_eq!(config.allocation, NONE);
        assert_eq!(config.node, NONE);
        assert_eq!(config.kernel, "ir");
        assert_eq!(config.kernel_argv, ["ir-bin"]);
        assert_eq!(config.kernel_language, "R");
        assert_eq!(config.gpus, "0");
        assert_eq!(config.reservation, NONE);
    }

    #[test]
    fn test_submitted_config_resolves_back() {
        let (mut catalog, kernels) = (catalog(), kernels());
        let resolver = Resolver::new(&catalog, &kernels);
        let mut form = resolver.resolve(&Selection::default());
        resolver.select_partition(&mut form, "gpus").unwrap();
        resolver.select_kernel(&mut form, "python3").unwrap();
        set_number(&mut form, ResourceField::Runtime, "120").unwrap();

        catalog.current_config = form.to_kernel_config(&kernels);
        let again = Resolver::new(&catalog, &kernels).resolve_current();
        assert_eq!(again, form);

        // and for an existing allocation with a pinned node
        let resolver = Resolver::new(&catalog, &kernels);
        resolver.select_allocation(&mut form, "4711").unwrap();
        resolver.select_node(&mut form, "gpu01").unwrap();
        catalog.current_config = form.to_kernel_config(&kernels);
        let again = Resolver::new(&catalog, &kernels).resolve_current();
        assert_eq!(again.allocation.value, "4711");
        assert_eq!(again.node.value, "gpu01");
        assert_eq!(again.project.value, form.project.value);
        assert_eq!(again.kernel.value, "python3");
    }

    #[test]
    fn test_visibility_rules() {
        let (catalog, kernels) = (catalog(), kernels());
        let resolver = Resolver::new(&catalog, &kernels);
        let mut form = resolver.resolve(&Selection::default());
        assert!(!form.is_visible(FormField::Gpus));
        assert!(!form.is_visible(FormField::Reservation));

        resolver.select_partition(&mut form, "gpus").unwrap();
        assert!(form.is_visible(FormField::Gpus));
        assert!(form.is_visible(FormField::Reservation));
        assert_eq!(form.visible_fields().len(), FormField::ORDER.len());
    }

    #[test]
    fn test_empty_kernel_table_keeps_given_kernel() {
        let catalog = catalog();
        let form = resolve(
            &catalog,
            &AvailableKernels::new(),
            &Selection {
                kernel: Some("python3".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(form.kernel.value, "python3");
        assert_eq!(form.kernel.options, ["python3"]);
    }
}
