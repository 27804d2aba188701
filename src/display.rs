//! Display and formatting functions for configuration and allocation info

use owo_colors::OwoColorize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, Width, object::Rows},
};

use crate::countdown::{Countdown, Tick};
use crate::models::{
    ANY_NODE, Allocation, AvailableKernels, KernelConfig, NEW_ALLOCATION, NONE, OptionCatalog,
};

/// Message shown when the Slurm kernel has no configuration yet.
pub const NOTHING_CONFIGURED: &str =
    "Nothing configured yet. Run `skconf configure` or press `c` in the TUI and choose a partition.";

/// One-line allocation summary: `<id> (#<kernels>): <state>`
#[must_use]
pub fn allocation_summary(id: &str, alloc: &Allocation) -> String {
    format!("{} (#{}): {}", id, alloc.kernel_ids.len(), alloc.state)
}

/// Wire sentinel to what the form shows (`None` jobid means a new allocation).
#[must_use]
pub fn display_allocation(jobid: &str) -> &str {
    if jobid.is_empty() || jobid == NONE {
        NEW_ALLOCATION
    } else {
        jobid
    }
}

#[must_use]
pub fn display_node(node: &str) -> &str {
    if node.is_empty() || node == NONE {
        ANY_NODE
    } else {
        node
    }
}

/// Rows of the current configuration view as `(label, value)` pairs.
///
/// GPUs are left out when zero and the reservation when unset; the kernel is
/// shown by display name when it is installed locally.
#[must_use]
pub fn current_config_rows(
    config: &KernelConfig,
    kernels: &AvailableKernels,
) -> Vec<(&'static str, String)> {
    let kernel = kernels
        .get(&config.kernel)
        .map_or_else(|| config.kernel.clone(), |k| k.display_name.clone());

    let mut rows = vec![
        ("Allocation", display_allocation(&config.allocation).to_string()),
        ("Node", display_node(&config.node).to_string()),
        ("Kernel", kernel),
        ("Project", config.project.clone()),
        ("Partition", config.partition.clone()),
        ("Nodes", config.nodes.clone()),
    ];
    if !config.gpus.is_empty() && config.gpus != "0" {
        rows.push(("GPUs", config.gpus.clone()));
    }
    rows.push(("Runtime", config.runtime.clone()));
    if !config.reservation.is_empty() && config.reservation != NONE {
        rows.push(("Reservation", config.reservation.clone()));
    }
    rows
}

/// Color a countdown tick (red when urgent).
#[must_use]
pub fn format_tick(tick: &Tick) -> String {
    if tick.urgent {
        tick.text.bright_red().to_string()
    } else {
        tick.text.green().to_string()
    }
}

/// Table row for key/value display
#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Setting")]
    label: String,

    #[tabled(rename = "Value")]
    value: String,
}

/// Format the Slurm kernel's current configuration
pub fn format_current_config(catalog: &OptionCatalog, kernels: &AvailableKernels, now: i64) -> String {
    let config = &catalog.current_config;
    if config.is_empty() {
        return NOTHING_CONFIGURED.yellow().to_string();
    }

    let mut rows: Vec<FieldRow> = current_config_rows(config, kernels)
        .into_iter()
        .map(|(label, value)| FieldRow {
            label: label.to_string(),
            value,
        })
        .collect();

    if let Some(endtime) = catalog.current_endtime() {
        rows.push(FieldRow {
            label: "Time left".to_string(),
            value: format_tick(&Countdown::new(endtime).tick_at(now)),
        });
    }

    let mut output = String::new();
    output.push_str(&format!("{}\n", "Current Configuration".bold()));
    output.push_str(&key_value_table(rows));
    if !catalog.documentation_href.is_empty() {
        output.push_str(&format!(
            "\n{} {}",
            "Documentation:".bright_black(),
            catalog.documentation_href.cyan()
        ));
    }
    output
}

/// Format a kernel configuration about to be submitted
pub fn format_kernel_config(config: &KernelConfig) -> String {
    let argv = if config.kernel_argv.is_empty() {
        "-".to_string()
    } else {
        config.kernel_argv.join(" ")
    };
    let rows = [
        ("jobid", config.allocation.clone()),
        ("node", config.node.clone()),
        ("kernel", config.kernel.clone()),
        ("kernel_argv", argv),
        ("kernel_language", config.kernel_language.clone()),
        ("project", config.project.clone()),
        ("partition", config.partition.clone()),
        ("nodes", config.nodes.clone()),
        ("gpus", config.gpus.clone()),
        ("runtime", config.runtime.clone()),
        ("reservation", config.reservation.clone()),
    ]
    .into_iter()
    .map(|(label, value)| FieldRow {
        label: label.to_string(),
        value,
    })
    .collect();

    key_value_table(rows)
}

fn key_value_table(rows: Vec<FieldRow>) -> String {
    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Width::wrap(120).keep_words(true));
    table.to_string()
}

/// Table row for allocation display
#[derive(Tabled)]
struct AllocationRow {
    #[tabled(rename = "Allocation")]
    id: String,

    #[tabled(rename = "State")]
    state: String,

    #[tabled(rename = "Kernels")]
    kernels: String,

    #[tabled(rename = "Nodes")]
    nodes: String,

    #[tabled(rename = "Project")]
    project: String,

    #[tabled(rename = "Partition")]
    partition: String,

    #[tabled(rename = "Time left")]
    time_left: String,
}

/// Format allocation state with appropriate coloring
fn format_allocation_state(state: &str) -> String {
    match state.to_ascii_uppercase().as_str() {
        "RUNNING" => state.green().to_string(),
        "PENDING" | "CONFIGURING" => state.yellow().to_string(),
        "" => "-".white().to_string(),
        _ => state.bright_black().to_string(),
    }
}

/// Format the allocations table
pub fn format_allocations(catalog: &OptionCatalog, now: i64) -> String {
    if catalog.allocations.is_empty() {
        return "No allocations found".yellow().to_string();
    }

    let rows: Vec<AllocationRow> = catalog
        .allocations
        .iter()
        .map(|(id, alloc)| AllocationRow {
            id: id.clone(),
            state: format_allocation_state(&alloc.state),
            kernels: alloc.kernel_ids.len().to_string(),
            nodes: if alloc.nodelist.is_empty() {
                "-".to_string()
            } else {
                alloc.nodelist.join(",")
            },
            project: alloc.config.project.clone(),
            partition: alloc.config.partition.clone(),
            time_left: format_tick(&Countdown::new(alloc.endtime).tick_at(now)),
        })
        .collect();

    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Width::wrap(200).keep_words(true))
        .with(Modify::new(Rows::first()).with(Alignment::center()));

    table.to_string()
}

/// Table row for kernel display
#[derive(Tabled)]
struct KernelRow {
    #[tabled(rename = "Name")]
    name: String,

    #[tabled(rename = "Display name")]
    display_name: String,

    #[tabled(rename = "Language")]
    language: String,
}

/// Format the kernels that can run inside an allocation
pub fn format_kernels(kernels: &AvailableKernels) -> String {
    if kernels.is_empty() {
        return "No Jupyter kernels found".yellow().to_string();
    }

    let rows: Vec<KernelRow> = kernels
        .iter()
        .map(|(name, kernel)| KernelRow {
            name: name.clone(),
            display_name: kernel.display_name.clone(),
            language: kernel.language.clone(),
        })
        .collect();

    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));

    table.to_string()
}
